//! Write-behind persistence of provider cards.

use std::sync::Arc;

use domus_core::store::{ListingPhotoInput, PropertyStore, UpsertInput, UpsertResult};
use domus_core::{
    CanonicalAddress, DomusError, EventPublisher, PropertyCard, PropertyKey, PropertyUpdated,
};

/// Listing status recorded for every write.
pub const LISTING_STATUS: &str = "for_sale";

/// Write-behind persistence for provider cards.
///
/// Each write is one atomic snapshot-and-upsert; on success a
/// [`PropertyUpdated`] event is published if a publisher is attached.
pub struct Hydrator {
    store: Arc<dyn PropertyStore>,
    publisher: Option<Arc<dyn EventPublisher>>,
}

impl Hydrator {
    /// Persist into `store` without publishing events.
    #[must_use]
    pub fn new(store: Arc<dyn PropertyStore>) -> Self {
        Self {
            store,
            publisher: None,
        }
    }

    /// Publish a [`PropertyUpdated`] after every successful write.
    #[must_use]
    pub fn with_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn PropertyStore> {
        &self.store
    }

    /// Persist one card under its canonical identity.
    ///
    /// Zero-valued numeric fields are stored as absent; the card's images
    /// become the listing's ordered photo set when non-empty.
    ///
    /// # Errors
    /// Returns the store's `DomusError::Persistence` on failure.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "domus::hydrator::write",
            skip(self, payload, address, card),
            fields(property_key = %key, listing = %card.id),
        )
    )]
    pub async fn write(
        &self,
        provider: &str,
        endpoint: &str,
        payload: Arc<[u8]>,
        address: &CanonicalAddress,
        key: &PropertyKey,
        card: &PropertyCard,
    ) -> Result<UpsertResult, DomusError> {
        let input = upsert_input(provider, endpoint, payload, address, key, card);
        let res = self.store.write_snapshot_and_upsert(input).await?;
        if let Some(publisher) = &self.publisher {
            publisher.publish_property_updated(PropertyUpdated {
                property_id: res.property_id,
                property_key: key.clone(),
            });
        }
        Ok(res)
    }
}

fn non_zero<T: Default + PartialEq>(v: T) -> Option<T> {
    (v != T::default()).then_some(v)
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

fn upsert_input(
    provider: &str,
    endpoint: &str,
    payload: Arc<[u8]>,
    address: &CanonicalAddress,
    key: &PropertyKey,
    card: &PropertyCard,
) -> UpsertInput {
    let [lon, lat] = card.coords;
    UpsertInput {
        property_key: key.clone(),
        address: address.clone(),
        lat: non_zero(lat),
        lon: non_zero(lon),
        provider: provider.to_string(),
        source_id: card.id.clone(),
        listing_id: non_empty(&card.id),
        status: LISTING_STATUS.to_string(),
        list_price: non_zero(card.price),
        beds: non_zero(card.beds),
        baths: non_zero(card.baths).map(f64::from),
        sqft: non_zero(card.sqft),
        property_type: non_empty(&card.kind),
        photos: ListingPhotoInput::from_hrefs(&card.images),
        endpoint: endpoint.to_string(),
        external_id: card.id.clone(),
        payload,
    }
}
