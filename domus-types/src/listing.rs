//! Canonical listing shapes produced by connectors and the store.

use serde::{Deserialize, Serialize};

/// Provider-neutral listing summary.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PropertyCard {
    /// Provider listing identifier (or property key for store-served cards).
    pub id: String,
    /// Explicit listing id when it differs from `id`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub listing_id: String,
    /// Provider property id, used to fetch photos.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub property_id: String,
    /// Street line.
    pub address: String,
    /// City.
    pub city: String,
    /// State code or name as reported.
    pub state: String,
    /// Postal code.
    pub zip: String,
    /// Property type label.
    #[serde(rename = "type")]
    pub kind: String,
    /// List price in whole currency units.
    pub price: u64,
    /// Bedrooms.
    pub beds: u32,
    /// Bathrooms, rounded.
    pub baths: u32,
    /// Interior square footage.
    pub sqft: u32,
    /// Year built (`0` when unknown).
    pub year_built: u32,
    /// Ordered image URLs; may be empty.
    #[serde(default)]
    pub images: Vec<String>,
    /// `[lng, lat]`.
    pub coords: [f64; 2],
    /// MLS identifier.
    #[serde(default)]
    pub mls: String,
    /// Origin label, e.g. `"rapidapi"` or `"database"`.
    pub source: String,
}

impl PropertyCard {
    /// True when all four address fields are present.
    #[must_use]
    pub fn has_complete_address(&self) -> bool {
        !(self.address.is_empty()
            || self.city.is_empty()
            || self.state.is_empty()
            || self.zip.is_empty())
    }

    /// Listing id used for photo persistence: `listing_id`, else `id`.
    #[must_use]
    pub fn effective_listing_id(&self) -> &str {
        if self.listing_id.is_empty() {
            &self.id
        } else {
            &self.listing_id
        }
    }

    /// Identifier passed to the photos endpoint: `property_id`, else `id`.
    #[must_use]
    pub fn photo_target_id(&self) -> &str {
        if self.property_id.is_empty() {
            &self.id
        } else {
            &self.property_id
        }
    }
}

/// A single photo returned by the provider's photo endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PhotoAsset {
    /// Image URL.
    pub href: String,
    /// Caption.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Title.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    /// Provider photo type.
    #[serde(default, rename = "type", skip_serializing_if = "String::is_empty")]
    pub kind: String,
    /// MIME-ish media type; falls back to `kind` when persisted.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub media_type: String,
    /// Tag labels.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Index in the provider response.
    pub position: u32,
}
