use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use domus_core::connector::{ListingConnector, SearchPage, SearchRequest};
use domus_core::{DomusError, PhotoAsset, PropertyCard};

use crate::{page_of, payload_for};

/// Instruction for how a call should behave.
#[derive(Clone)]
pub enum MockBehavior<T> {
    /// Return the provided value immediately.
    Return(T),
    /// Fail immediately with the provided error.
    Fail(DomusError),
    /// Hang indefinitely (simulate a timeout).
    Hang,
}

#[derive(Default)]
struct InternalState {
    scripted: VecDeque<MockBehavior<Vec<PropertyCard>>>,
    page_rules: HashMap<(String, u32), MockBehavior<Vec<PropertyCard>>>,
    listings: HashMap<String, Vec<PropertyCard>>,
    photo_rules: HashMap<String, MockBehavior<Vec<PhotoAsset>>>,
    search_log: Vec<SearchRequest>,
    photo_log: Vec<String>,
    delay: Option<Duration>,
}

/// Controller handle used by tests to drive the dynamic mock from the outside.
pub struct DynamicMockController {
    state: Arc<Mutex<InternalState>>,
}

impl DynamicMockController {
    /// Serve `cards` for `zip`, paged by each request's page and page size.
    pub async fn set_listings(&self, zip: &str, cards: Vec<PropertyCard>) {
        let mut guard = self.state.lock().await;
        guard.listings.insert(zip.to_string(), cards);
    }

    /// Override one page of one postal code.
    pub async fn set_page_behavior(
        &self,
        zip: &str,
        page: u32,
        behavior: MockBehavior<Vec<PropertyCard>>,
    ) {
        let mut guard = self.state.lock().await;
        guard.page_rules.insert((zip.to_string(), page), behavior);
    }

    /// Queue a one-shot behavior consumed by the next search, whatever its zip.
    pub async fn push_search(&self, behavior: MockBehavior<Vec<PropertyCard>>) {
        let mut guard = self.state.lock().await;
        guard.scripted.push_back(behavior);
    }

    /// Set the behavior for `photos` calls for one property id.
    pub async fn set_photo_behavior(&self, property_id: &str, behavior: MockBehavior<Vec<PhotoAsset>>) {
        let mut guard = self.state.lock().await;
        guard.photo_rules.insert(property_id.to_string(), behavior);
    }

    /// Sleep for `delay` before answering every call.
    pub async fn set_delay(&self, delay: Option<Duration>) {
        self.state.lock().await.delay = delay;
    }

    /// Copy of every search request received, in order.
    pub async fn search_requests(&self) -> Vec<SearchRequest> {
        self.state.lock().await.search_log.clone()
    }

    /// Number of search calls received.
    pub async fn search_calls(&self) -> usize {
        self.state.lock().await.search_log.len()
    }

    /// Property ids passed to `photos`, in order.
    pub async fn photo_requests(&self) -> Vec<String> {
        self.state.lock().await.photo_log.clone()
    }

    /// Clear all configured behaviors and request logs.
    pub async fn clear_all_behaviors(&self) {
        let mut guard = self.state.lock().await;
        *guard = InternalState::default();
    }
}

/// A connector that defers all behavior to an external controller.
///
/// Search resolution order: queued one-shot behaviors, then per-page rules,
/// then the listing set for the zip, then an empty page.
pub struct DynamicMockConnector {
    name: &'static str,
    state: Arc<Mutex<InternalState>>,
}

impl DynamicMockConnector {
    /// Create a new dynamic mock connector and its controller.
    #[must_use]
    pub fn new_with_controller(
        name: &'static str,
    ) -> (Arc<dyn ListingConnector>, DynamicMockController) {
        let state = Arc::new(Mutex::new(InternalState::default()));
        let controller = DynamicMockController {
            state: Arc::clone(&state),
        };
        let me = Arc::new(Self { name, state });
        (me as Arc<dyn ListingConnector>, controller)
    }
}

async fn resolve<T>(behavior: MockBehavior<T>, delay: Option<Duration>) -> Result<T, DomusError> {
    if let Some(d) = delay {
        tokio::time::sleep(d).await;
    }
    match behavior {
        MockBehavior::Return(v) => Ok(v),
        MockBehavior::Fail(e) => Err(e),
        MockBehavior::Hang => std::future::pending().await,
    }
}

#[async_trait]
impl ListingConnector for DynamicMockConnector {
    fn name(&self) -> &'static str {
        self.name
    }

    fn vendor(&self) -> &'static str {
        "DynamicMock"
    }

    async fn search_by_postal(&self, req: &SearchRequest) -> Result<SearchPage, DomusError> {
        // Snapshot the behavior without holding the lock across the delay.
        let (behavior, delay) = {
            let mut guard = self.state.lock().await;
            guard.search_log.push(req.clone());
            let behavior = if let Some(b) = guard.scripted.pop_front() {
                b
            } else if let Some(b) = guard
                .page_rules
                .get(&(req.postal_code.clone(), req.page))
            {
                b.clone()
            } else {
                let all = guard
                    .listings
                    .get(&req.postal_code)
                    .map(|cards| page_of(cards, req.page, req.page_size))
                    .unwrap_or_default();
                MockBehavior::Return(all)
            };
            (behavior, guard.delay)
        };
        let cards = resolve(behavior, delay).await?;
        Ok(SearchPage {
            payload: payload_for(&cards),
            cards,
        })
    }

    async fn photos(&self, property_id: &str) -> Result<Vec<PhotoAsset>, DomusError> {
        let (behavior, delay) = {
            let mut guard = self.state.lock().await;
            guard.photo_log.push(property_id.to_string());
            let behavior = guard
                .photo_rules
                .get(property_id)
                .cloned()
                .unwrap_or(MockBehavior::Return(Vec::new()));
            (behavior, guard.delay)
        };
        resolve(behavior, delay).await
    }
}
