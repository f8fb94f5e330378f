//! Read-through listing search: stored rows first, provider on a miss.

use std::sync::Arc;

use domus_core::connector::{ListingConnector, SearchRequest};
use domus_core::store::{ListingPhotoInput, ListingQuery};
use domus_core::{DomusError, PropertyCard, PropertyKey, canonicalize};
use domus_types::{DEFAULT_ENDPOINT, DEFAULT_PROVIDER, ListingFilters};

use crate::hydrator::Hydrator;

/// A postal-code listing search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingsQuery {
    /// Required postal code.
    pub postal_code: String,
    /// 1-based page (`0` is treated as `1`).
    pub page: u32,
    /// Results per page (`0` selects the default of 5).
    pub limit: u32,
    /// Optional property type filter.
    pub property_type: Option<String>,
    /// Optional provider-side ordering.
    pub order_by: Option<String>,
    /// Bed/bath/price filters forwarded to the provider.
    pub filters: ListingFilters,
}

impl ListingsQuery {
    /// First page of five for `postal_code`.
    pub fn new(postal_code: impl Into<String>) -> Self {
        Self {
            postal_code: postal_code.into(),
            page: 1,
            limit: ListingQuery::DEFAULT_LIMIT,
            ..Self::default()
        }
    }
}

/// Where a listings page was served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingsSource {
    /// Stored rows.
    Database,
    /// A provider search made for this call.
    Provider,
}

/// Cards returned by [`ListingsService::search`].
#[derive(Debug, Clone, PartialEq)]
pub struct ListingsPage {
    /// Origin of the cards.
    pub source: ListingsSource,
    /// Listing cards with their photo hrefs.
    pub cards: Vec<PropertyCard>,
}

/// Photo hrefs for one listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingPhotos {
    /// Provider listing id.
    pub listing_id: String,
    /// Property the listing is stored under, when known.
    pub property_key: Option<PropertyKey>,
    /// Hrefs in display order.
    pub photos: Vec<String>,
}

/// Serves listing searches from the store, falling back to the provider.
///
/// Provider results are persisted through the [`Hydrator`] so the next search
/// for the same postal code is answered locally.
pub struct ListingsService {
    connector: Arc<dyn ListingConnector>,
    hydrator: Arc<Hydrator>,
    provider: String,
    endpoint: String,
}

impl ListingsService {
    /// Service over a (quota-gated) connector and a hydrator.
    #[must_use]
    pub fn new(connector: Arc<dyn ListingConnector>, hydrator: Arc<Hydrator>) -> Self {
        Self {
            connector,
            hydrator,
            provider: DEFAULT_PROVIDER.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }

    /// Search one page of listings.
    ///
    /// # Errors
    /// - `Validation` when the postal code is blank.
    /// - Any provider error when the store has no rows, including `QuotaExceeded`.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "domus::listings::search", skip(self, q), fields(zip = %q.postal_code))
    )]
    pub async fn search(&self, q: &ListingsQuery) -> Result<ListingsPage, DomusError> {
        let zip = q.postal_code.trim();
        if zip.is_empty() {
            return Err(DomusError::validation("postalcode is required"));
        }
        let limit = if q.limit == 0 {
            ListingQuery::DEFAULT_LIMIT
        } else {
            q.limit
        };
        let page = q.page.max(1);

        let stored = ListingQuery {
            postal_code: zip.to_string(),
            limit,
            offset: (page - 1).saturating_mul(limit),
            property_type: q.property_type.clone().filter(|t| !t.is_empty()),
        };
        match self.hydrator.store().listings_by_postal(&stored).await {
            Ok(rows) if !rows.is_empty() => {
                #[cfg(feature = "tracing")]
                tracing::info!(count = rows.len(), "serving listings from database");
                return Ok(ListingsPage {
                    source: ListingsSource::Database,
                    cards: rows.into_iter().map(|r| r.into_card()).collect(),
                });
            }
            Ok(_) => {}
            Err(_e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %_e, "database lookup failed; asking provider");
            }
        }

        let req = SearchRequest::new(zip, page, limit)
            .with_property_type(q.property_type.clone().unwrap_or_default())
            .with_order_by(q.order_by.clone())
            .with_filters(q.filters);
        let fetched = self.connector.search_by_postal(&req).await?;

        let mut cards = fetched.cards;
        for card in cards.iter().filter(|c| c.has_complete_address()) {
            let (address, key) = canonicalize(&card.address, &card.city, &card.state, &card.zip);
            if let Err(_e) = self
                .hydrator
                .write(
                    &self.provider,
                    &self.endpoint,
                    Arc::clone(&fetched.payload),
                    &address,
                    &key,
                    card,
                )
                .await
            {
                #[cfg(feature = "tracing")]
                tracing::warn!(listing = %card.id, error = %_e, "unable to persist listing");
            }
        }

        for card in &mut cards {
            let listing_id = card.effective_listing_id().to_string();
            if card.property_id.is_empty() && card.has_complete_address() {
                let (_, key) = canonicalize(&card.address, &card.city, &card.state, &card.zip);
                card.property_id = key.to_string();
            }
            if listing_id.is_empty() && card.property_id.is_empty() {
                continue;
            }
            card.listing_id.clone_from(&listing_id);
            let target = card.photo_target_id().to_string();
            match self.load_photos(&listing_id, &target).await {
                Ok(photos) => card.images = photos,
                Err(_e) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(listing = %listing_id, error = %_e, "unable to load photos");
                }
            }
        }

        #[cfg(feature = "tracing")]
        tracing::info!(count = cards.len(), "served listings from provider");
        Ok(ListingsPage {
            source: ListingsSource::Provider,
            cards,
        })
    }

    /// Photo hrefs for a listing, stored first, then from the provider.
    ///
    /// # Errors
    /// - `Validation` when the listing id is blank.
    /// - Provider errors when nothing is stored for the listing.
    pub async fn listing_photos(&self, listing_id: &str) -> Result<ListingPhotos, DomusError> {
        let listing_id = listing_id.trim();
        if listing_id.is_empty() {
            return Err(DomusError::validation("listing id is required"));
        }
        let property_key = self
            .hydrator
            .store()
            .property_key_for_listing(listing_id)
            .await
            .unwrap_or_else(|_e| {
                #[cfg(feature = "tracing")]
                tracing::warn!(listing = %listing_id, error = %_e, "property lookup failed");
                None
            });
        let photos = self.load_photos(listing_id, listing_id).await?;
        Ok(ListingPhotos {
            listing_id: listing_id.to_string(),
            property_key,
            photos,
        })
    }

    /// Stored hrefs when present; otherwise fetch from the provider by
    /// `target_id` and store them under `listing_id`.
    async fn load_photos(&self, listing_id: &str, target_id: &str) -> Result<Vec<String>, DomusError> {
        let store = self.hydrator.store();
        if !listing_id.is_empty() {
            match store.listing_photos(listing_id).await {
                Ok(urls) if !urls.is_empty() => return Ok(urls),
                Ok(_) => {}
                Err(_e) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(listing = %listing_id, error = %_e, "stored photo lookup failed");
                }
            }
        }
        let target = if target_id.is_empty() {
            listing_id
        } else {
            target_id
        };
        let assets = self.connector.photos(target).await?;
        if !listing_id.is_empty() && !assets.is_empty() {
            let inputs = ListingPhotoInput::from_assets(&assets);
            if let Err(_e) = store.replace_listing_photos(listing_id, inputs).await {
                #[cfg(feature = "tracing")]
                tracing::warn!(listing = %listing_id, error = %_e, "unable to store photos");
            }
        }
        Ok(assets
            .into_iter()
            .filter(|a| !a.href.is_empty())
            .map(|a| a.href)
            .collect())
    }
}
