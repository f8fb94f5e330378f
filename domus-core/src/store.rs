//! Storage seams: the key-value cache and the relational property store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use domus_types::{CanonicalAddress, PhotoAsset, PropertyCard, PropertyKey};

use crate::DomusError;

/// Key-value store backing the resolution cache.
///
/// Implementations must make `set_if_absent` atomic: under concurrent calls
/// for the same key exactly one caller observes `true` until the entry expires.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch a value if present and not expired.
    async fn get(&self, key: &str) -> Result<Option<String>, DomusError>;

    /// Store a value, replacing any previous one, expiring after `ttl`.
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), DomusError>;

    /// True if a live entry exists.
    async fn exists(&self, key: &str) -> Result<bool, DomusError>;

    /// Store only if no live entry exists. Returns whether this call stored it.
    async fn set_if_absent(&self, key: &str, value: String, ttl: Duration)
    -> Result<bool, DomusError>;
}

/// Photo row written on upsert or replace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingPhotoInput {
    /// Image URL. Empty entries are skipped by stores.
    pub href: String,
    /// Caption.
    pub description: String,
    /// Title.
    pub title: String,
    /// Provider photo type.
    pub kind: String,
    /// Media type, defaulting to `kind`.
    pub media_type: String,
    /// Tag labels; duplicates collapse to one row.
    pub tags: Vec<String>,
    /// Display order.
    pub position: u32,
}

impl ListingPhotoInput {
    /// Convert provider photo assets, preserving their order.
    #[must_use]
    pub fn from_assets(assets: &[PhotoAsset]) -> Vec<Self> {
        assets
            .iter()
            .enumerate()
            .filter(|(_, a)| !a.href.is_empty())
            .map(|(idx, a)| Self {
                href: a.href.clone(),
                description: a.description.clone(),
                title: a.title.clone(),
                kind: a.kind.clone(),
                media_type: if a.media_type.is_empty() {
                    a.kind.clone()
                } else {
                    a.media_type.clone()
                },
                tags: a.tags.clone(),
                position: u32::try_from(idx).unwrap_or(u32::MAX),
            })
            .collect()
    }

    /// Convert a plain ordered list of image URLs.
    #[must_use]
    pub fn from_hrefs(hrefs: &[String]) -> Vec<Self> {
        hrefs
            .iter()
            .enumerate()
            .filter(|(_, h)| !h.is_empty())
            .map(|(idx, h)| Self {
                href: h.clone(),
                position: u32::try_from(idx).unwrap_or(u32::MAX),
                ..Self::default()
            })
            .collect()
    }
}

/// Everything written by one atomic snapshot-and-upsert.
#[derive(Debug, Clone)]
pub struct UpsertInput {
    /// Canonical identity of the property.
    pub property_key: PropertyKey,
    /// Canonical address fields.
    pub address: CanonicalAddress,
    /// Latitude.
    pub lat: Option<f64>,
    /// Longitude.
    pub lon: Option<f64>,
    /// Provider identifier, e.g. `rapidapi.realtor16`.
    pub provider: String,
    /// Provider-side source id.
    pub source_id: String,
    /// Provider listing id.
    pub listing_id: Option<String>,
    /// Listing status, e.g. `for_sale`.
    pub status: String,
    /// List price.
    pub list_price: Option<u64>,
    /// Bedrooms.
    pub beds: Option<u32>,
    /// Bathrooms.
    pub baths: Option<f64>,
    /// Interior square footage.
    pub sqft: Option<u32>,
    /// Property type label.
    pub property_type: Option<String>,
    /// Replacement photo set; empty leaves stored photos untouched.
    pub photos: Vec<ListingPhotoInput>,
    /// Endpoint label for the raw snapshot.
    pub endpoint: String,
    /// External id for the raw snapshot.
    pub external_id: String,
    /// Raw provider payload.
    pub payload: Arc<[u8]>,
}

/// Row ids produced by a snapshot-and-upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertResult {
    /// Property row id.
    pub property_id: i64,
    /// Listing row id.
    pub listing_id: i64,
}

/// Filter for [`PropertyStore::listings_by_postal`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingQuery {
    /// Postal code to match exactly.
    pub postal_code: String,
    /// Maximum rows returned.
    pub limit: u32,
    /// Rows skipped.
    pub offset: u32,
    /// Optional property type filter.
    pub property_type: Option<String>,
}

impl ListingQuery {
    /// Default page size for store reads.
    pub const DEFAULT_LIMIT: u32 = 5;

    /// Query the first page for a postal code.
    pub fn new(postal_code: impl Into<String>) -> Self {
        Self {
            postal_code: postal_code.into(),
            limit: Self::DEFAULT_LIMIT,
            offset: 0,
            property_type: None,
        }
    }
}

/// Stored listing joined with its property and ordered photo hrefs.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingRecord {
    /// Property key.
    pub property_key: PropertyKey,
    /// Canonical street line.
    pub address_line1: String,
    /// Canonical city.
    pub city: String,
    /// Canonical state.
    pub state: String,
    /// Canonical zip.
    pub zip: String,
    /// Latitude.
    pub lat: Option<f64>,
    /// Longitude.
    pub lon: Option<f64>,
    /// Listing row id.
    pub listing_row_id: i64,
    /// Provider listing id.
    pub listing_id: Option<String>,
    /// List price.
    pub list_price: Option<u64>,
    /// Bedrooms.
    pub beds: Option<u32>,
    /// Bathrooms.
    pub baths: Option<f64>,
    /// Square footage.
    pub sqft: Option<u32>,
    /// Property type label.
    pub property_type: Option<String>,
    /// Photo hrefs in display order.
    pub photos: Vec<String>,
}

impl ListingRecord {
    /// Render as a card tagged with source `"database"`.
    #[must_use]
    pub fn into_card(self) -> PropertyCard {
        let id = match self.listing_id {
            Some(id) if !id.is_empty() => id,
            _ => self.property_key.to_string(),
        };
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let baths = self.baths.map_or(0, |b| b.round().max(0.0) as u32);
        PropertyCard {
            id,
            property_id: self.property_key.to_string(),
            address: self.address_line1,
            city: self.city,
            state: self.state,
            zip: self.zip,
            kind: self.property_type.unwrap_or_default(),
            price: self.list_price.unwrap_or_default(),
            beds: self.beds.unwrap_or_default(),
            baths,
            sqft: self.sqft.unwrap_or_default(),
            images: self.photos,
            coords: [self.lon.unwrap_or_default(), self.lat.unwrap_or_default()],
            source: "database".to_string(),
            ..PropertyCard::default()
        }
    }
}

/// Relational store for properties, listings, photos, and raw snapshots.
#[async_trait]
pub trait PropertyStore: Send + Sync {
    /// Upsert property and listing, replace photos when supplied, and append a
    /// raw snapshot, all in one transaction.
    async fn write_snapshot_and_upsert(&self, input: UpsertInput)
    -> Result<UpsertResult, DomusError>;

    /// Replace the photo set of the most recently updated listing with this
    /// provider listing id. Returns `false` when no such listing exists.
    async fn replace_listing_photos(
        &self,
        provider_listing_id: &str,
        photos: Vec<ListingPhotoInput>,
    ) -> Result<bool, DomusError>;

    /// Photo hrefs for a provider listing id, in display order.
    async fn listing_photos(&self, provider_listing_id: &str) -> Result<Vec<String>, DomusError>;

    /// Listings in a postal code, newest first, with their photos.
    async fn listings_by_postal(&self, query: &ListingQuery)
    -> Result<Vec<ListingRecord>, DomusError>;

    /// Property key of the most recently updated listing with this provider id.
    async fn property_key_for_listing(
        &self,
        provider_listing_id: &str,
    ) -> Result<Option<PropertyKey>, DomusError>;
}
