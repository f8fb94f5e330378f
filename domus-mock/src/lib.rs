//! domus-mock
//!
//! Deterministic connectors and a manual clock for driving domus in tests.
//!
//! - [`MockConnector`]: static fixture pages per postal code with call counters.
//! - [`DynamicMockConnector`]: behaviour scripted at runtime through a
//!   [`DynamicMockController`].
//! - [`ManualClock`]: a [`Clock`](domus_core::Clock) that only moves when told to.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use domus_core::connector::{ListingConnector, SearchPage, SearchRequest};
use domus_core::{DomusError, PhotoAsset, PropertyCard};

mod clock;
mod dynamic;
mod fixtures;

pub use clock::ManualClock;
pub use dynamic::{DynamicMockConnector, DynamicMockController, MockBehavior};

/// Postal code for which the fixture connector fails with a 503.
pub const FAIL_ZIP: &str = "FAIL";
/// Postal code for which the fixture connector answers 429.
pub const QUOTA_ZIP: &str = "QUOTA";

/// Render cards as the raw payload attached to a page.
#[must_use]
pub fn payload_for(cards: &[PropertyCard]) -> Arc<[u8]> {
    serde_json::to_vec(cards).unwrap_or_default().into()
}

/// Slice `all` into the requested 1-based page.
#[must_use]
pub fn page_of(all: &[PropertyCard], page: u32, page_size: u32) -> Vec<PropertyCard> {
    let size = page_size.max(1) as usize;
    let start = (page.max(1) as usize - 1).saturating_mul(size);
    all.iter().skip(start).take(size).cloned().collect()
}

/// Mock connector serving static fixtures.
///
/// Fixture postal codes: `62704` (3 listings), `78701` (7 listings), `10001`
/// (1 listing with no street line). Any other code returns an empty page.
#[derive(Default)]
pub struct MockConnector {
    search_calls: AtomicUsize,
    photo_calls: AtomicUsize,
    delay: Option<Duration>,
}

impl MockConnector {
    /// Create a connector that answers immediately.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a connector that sleeps for `delay` before every answer.
    #[must_use]
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Number of `search_by_postal` calls received.
    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    /// Number of `photos` calls received.
    pub fn photo_calls(&self) -> usize {
        self.photo_calls.load(Ordering::SeqCst)
    }

    /// Fixture listings for `zip`, unpaged.
    #[must_use]
    pub fn fixture_listings(zip: &str) -> Vec<PropertyCard> {
        fixtures::listings(zip)
    }

    /// Fixture photo set for a provider property id.
    #[must_use]
    pub fn fixture_photos(property_id: &str) -> Vec<PhotoAsset> {
        fixtures::photos(property_id)
    }

    async fn maybe_delay(&self) {
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
    }
}

#[async_trait]
impl ListingConnector for MockConnector {
    fn name(&self) -> &'static str {
        "domus-mock"
    }

    fn vendor(&self) -> &'static str {
        "Mock"
    }

    async fn search_by_postal(&self, req: &SearchRequest) -> Result<SearchPage, DomusError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_delay().await;
        match req.postal_code.as_str() {
            FAIL_ZIP => return Err(DomusError::upstream(503, "forced failure: search")),
            QUOTA_ZIP => {
                return Err(DomusError::QuotaExceeded {
                    remaining: 0,
                    reset_in_ms: 0,
                });
            }
            _ => {}
        }
        let mut all = fixtures::listings(&req.postal_code);
        if let Some(kind) = &req.property_type {
            all.retain(|c| &c.kind == kind);
        }
        let cards = page_of(&all, req.page, req.page_size);
        Ok(SearchPage {
            payload: payload_for(&cards),
            cards,
        })
    }

    async fn photos(&self, property_id: &str) -> Result<Vec<PhotoAsset>, DomusError> {
        self.photo_calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_delay().await;
        Ok(fixtures::photos(property_id))
    }
}
