use std::sync::Arc;

use async_trait::async_trait;
use domus_types::{ListingFilters, PhotoAsset, PropertyCard};

use crate::DomusError;

/// One page of a postal-area listing search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchRequest {
    /// Postal code used as the search location.
    pub postal_code: String,
    /// 1-based page number.
    pub page: u32,
    /// Results per page.
    pub page_size: u32,
    /// Optional property type filter.
    pub property_type: Option<String>,
    /// Optional provider-side ordering.
    pub order_by: Option<String>,
    /// Bed/bath/price filters.
    pub filters: ListingFilters,
}

impl SearchRequest {
    /// Build a request for `page` of `postal_code` with `page_size` results.
    pub fn new(postal_code: impl Into<String>, page: u32, page_size: u32) -> Self {
        Self {
            postal_code: postal_code.into(),
            page,
            page_size,
            ..Self::default()
        }
    }

    /// Restrict to one property type; empty strings clear the filter.
    #[must_use]
    pub fn with_property_type(mut self, property_type: impl Into<String>) -> Self {
        let t = property_type.into();
        self.property_type = (!t.is_empty()).then_some(t);
        self
    }

    /// Set provider-side ordering.
    #[must_use]
    pub fn with_order_by(mut self, order_by: Option<String>) -> Self {
        self.order_by = order_by.filter(|o| !o.is_empty());
        self
    }

    /// Set bed/bath/price filters.
    #[must_use]
    pub const fn with_filters(mut self, filters: ListingFilters) -> Self {
        self.filters = filters;
        self
    }
}

/// One page of results plus the raw provider payload it was mapped from.
#[derive(Debug, Clone)]
pub struct SearchPage {
    /// Unmodified response body, kept for raw snapshots.
    pub payload: Arc<[u8]>,
    /// Mapped listing cards, in provider order.
    pub cards: Vec<PropertyCard>,
}

impl SearchPage {
    /// Number of mapped cards on this page.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    /// True when the page carried no results.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

/// Upstream listing provider.
///
/// Every call performs provider I/O; wrap implementations with
/// `domus-middleware` layers to enforce the shared quota and retry policy.
#[async_trait]
pub trait ListingConnector: Send + Sync {
    /// Stable connector name used in logs and error attribution.
    fn name(&self) -> &'static str;

    /// Human-readable vendor name.
    fn vendor(&self) -> &'static str {
        "unknown"
    }

    /// Fetch one page of listings for a postal code.
    async fn search_by_postal(&self, req: &SearchRequest) -> Result<SearchPage, DomusError>;

    /// Fetch the photo set for a provider property id.
    async fn photos(&self, property_id: &str) -> Result<Vec<PhotoAsset>, DomusError>;
}
