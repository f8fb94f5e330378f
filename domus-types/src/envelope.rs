//! Cached resolution payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::address::CanonicalAddress;
use crate::listing::PropertyCard;

/// Source label written into every envelope.
pub const ENVELOPE_SOURCE: &str = "rapidapi";

/// Freshness bookkeeping for a cached envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnvelopeMeta {
    /// When the upstream fetch completed.
    pub last_fetch_at: DateTime<Utc>,
    /// Soft freshness boundary.
    pub stale_after: DateTime<Utc>,
    /// Absolute lifetime in the cache store.
    pub ttl_seconds: u64,
    /// Origin label.
    pub source: String,
}

/// Value stored under `prop:pk:<key>`. Replaced wholesale on every refresh.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheEnvelope {
    /// The matched listing.
    pub data: PropertyCard,
    /// Freshness bookkeeping.
    pub meta: EnvelopeMeta,
    /// Canonical fields of the resolved address.
    pub normalized: CanonicalAddress,
}

impl CacheEnvelope {
    /// True once `now` has reached the soft freshness boundary.
    #[must_use]
    pub fn is_stale_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.meta.stale_after
    }
}
