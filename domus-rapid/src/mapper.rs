//! Mapping from RapidAPI realtor payloads into domus listing shapes.

use std::sync::LazyLock;

use domus_core::{DomusError, PhotoAsset, PropertyCard};
use regex::Regex;
use serde::Deserialize;

/// Source label stamped on every mapped card.
pub const SOURCE: &str = "rapidapi";

static PHOTO_SIZE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-w\d+_h\d+").expect("valid photo size pattern"));

/// Rewrite any `-w<digits>_h<digits>` size fragment to the largest rendition.
#[must_use]
pub fn upgrade_photo_url(href: &str) -> String {
    if href.is_empty() {
        return String::new();
    }
    PHOTO_SIZE.replace_all(href, "-w2048_h1536").into_owned()
}

#[derive(Debug, Default, Deserialize)]
struct SearchRoot {
    #[serde(default)]
    properties: Option<Vec<RawProperty>>,
}

#[derive(Debug, Default, Deserialize)]
struct RawProperty {
    #[serde(default)]
    listing_id: Option<String>,
    #[serde(default)]
    property_id: Option<String>,
    #[serde(default)]
    list_price: Option<f64>,
    #[serde(default)]
    location: Option<RawLocation>,
    #[serde(default)]
    description: Option<RawDescription>,
    #[serde(default)]
    primary_photo: Option<RawPhoto>,
    #[serde(default)]
    photos: Option<Vec<RawPhoto>>,
}

#[derive(Debug, Default, Deserialize)]
struct RawLocation {
    #[serde(default)]
    address: Option<RawAddress>,
}

#[derive(Debug, Default, Deserialize)]
struct RawAddress {
    #[serde(default)]
    line: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    state_code: Option<String>,
    #[serde(default)]
    postal_code: Option<String>,
    #[serde(default)]
    coordinate: Option<RawCoordinate>,
}

#[derive(Debug, Default, Deserialize)]
struct RawCoordinate {
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawDescription {
    #[serde(default)]
    beds: Option<i64>,
    #[serde(default)]
    baths_consolidated: Option<serde_json::Value>,
    #[serde(default)]
    sqft: Option<i64>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawPhoto {
    #[serde(default)]
    href: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawPhotoAsset {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    href: Option<String>,
    #[serde(default)]
    tags: Option<Vec<RawTag>>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawTag {
    #[serde(default)]
    label: Option<String>,
}

fn non_negative(v: Option<i64>) -> u32 {
    v.and_then(|n| u32::try_from(n).ok()).unwrap_or(0)
}

fn parse_baths(v: Option<&serde_json::Value>) -> u32 {
    match v {
        Some(serde_json::Value::String(s)) => s.trim().parse::<u32>().unwrap_or(0),
        Some(serde_json::Value::Number(n)) => {
            n.as_u64().and_then(|b| u32::try_from(b).ok()).unwrap_or(0)
        }
        _ => 0,
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn price(v: Option<f64>) -> u64 {
    v.filter(|p| p.is_finite() && *p > 0.0)
        .map_or(0, |p| p.round() as u64)
}

fn map_property(p: RawProperty) -> PropertyCard {
    let addr = p.location.and_then(|l| l.address).unwrap_or_default();
    let desc = p.description.unwrap_or_default();
    let coord = addr.coordinate.unwrap_or_default();

    let mut images = Vec::new();
    let primary = p.primary_photo.and_then(|ph| ph.href);
    let inline = p.photos.unwrap_or_default().into_iter().filter_map(|ph| ph.href);
    for href in primary.into_iter().chain(inline) {
        if !href.is_empty() {
            images.push(upgrade_photo_url(&href));
        }
    }

    let state = match addr.state_code {
        Some(code) if !code.is_empty() => code,
        _ => addr.state.unwrap_or_default(),
    };
    let listing_id = p.listing_id.unwrap_or_default();

    PropertyCard {
        id: listing_id.clone(),
        listing_id,
        property_id: p.property_id.unwrap_or_default(),
        address: addr.line.unwrap_or_default(),
        city: addr.city.unwrap_or_default(),
        state,
        zip: addr.postal_code.unwrap_or_default(),
        kind: desc.kind.unwrap_or_default(),
        price: price(p.list_price),
        beds: non_negative(desc.beds),
        baths: parse_baths(desc.baths_consolidated.as_ref()),
        sqft: non_negative(desc.sqft),
        year_built: 0,
        images,
        coords: [coord.lon.unwrap_or_default(), coord.lat.unwrap_or_default()],
        mls: String::new(),
        source: SOURCE.to_string(),
    }
}

/// Map a `{ "properties": [...] }` search payload to cards, in provider order.
///
/// # Errors
/// Returns `DomusError::Mapping` when the payload is not the expected JSON shape.
pub fn map_search_payload(raw: &[u8]) -> Result<Vec<PropertyCard>, DomusError> {
    let root: SearchRoot = serde_json::from_slice(raw)?;
    Ok(root
        .properties
        .unwrap_or_default()
        .into_iter()
        .map(map_property)
        .collect())
}

/// Map a photos payload (a JSON array) to assets.
///
/// Entries without an href are skipped; `position` keeps the upstream index.
///
/// # Errors
/// Returns `DomusError::Mapping` when the payload is not a JSON array of objects.
pub fn map_photos_payload(raw: &[u8]) -> Result<Vec<PhotoAsset>, DomusError> {
    let arr: Vec<RawPhotoAsset> = serde_json::from_slice(raw)?;
    Ok(arr
        .into_iter()
        .enumerate()
        .filter_map(|(idx, it)| {
            let href = it.href.filter(|h| !h.is_empty())?;
            let tags = it
                .tags
                .unwrap_or_default()
                .into_iter()
                .filter_map(|t| t.label.filter(|l| !l.is_empty()))
                .collect();
            Some(PhotoAsset {
                href: upgrade_photo_url(&href),
                description: it.description.unwrap_or_default(),
                title: it.title.unwrap_or_default(),
                kind: it.kind.unwrap_or_default(),
                media_type: String::new(),
                tags,
                position: u32::try_from(idx).unwrap_or(u32::MAX),
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_fragment_is_upgraded() {
        assert_eq!(
            upgrade_photo_url("https://ap.rdcpix.com/abc-w480_h360.jpg"),
            "https://ap.rdcpix.com/abc-w2048_h1536.jpg"
        );
        assert_eq!(upgrade_photo_url("https://x/plain.jpg"), "https://x/plain.jpg");
        assert_eq!(upgrade_photo_url(""), "");
    }

    #[test]
    fn baths_accept_strings_and_numbers() {
        let s = serde_json::json!("2");
        let n = serde_json::json!(3);
        let frac = serde_json::json!("2.5");
        assert_eq!(parse_baths(Some(&s)), 2);
        assert_eq!(parse_baths(Some(&n)), 3);
        assert_eq!(parse_baths(Some(&frac)), 0);
        assert_eq!(parse_baths(None), 0);
    }
}
