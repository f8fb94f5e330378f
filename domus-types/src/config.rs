//! Configuration types shared across the engine, middleware, and connectors.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Rate and daily budget applied to every outbound provider call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuotaConfig {
    /// Sustained token refill rate. Values `<= 0` disable rate limiting.
    pub requests_per_second: f64,
    /// Token bucket capacity. Clamped to at least 1.
    pub burst: u32,
    /// Calls permitted per UTC day. `0` disables the daily budget.
    pub daily_limit: u64,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 3.0,
            burst: 3,
            daily_limit: 20_000,
        }
    }
}

/// Snapshot of the daily budget at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuotaState {
    /// Configured maximum calls per day (`0` when unlimited).
    pub limit: u64,
    /// Remaining calls available in the current UTC day.
    pub remaining: u64,
    /// Time remaining until the next UTC midnight.
    pub reset_in: Duration,
}

/// Exponential backoff configuration for upstream retries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackoffConfig {
    /// Minimum backoff delay in milliseconds.
    pub min_backoff_ms: u64,
    /// Maximum backoff delay in milliseconds.
    pub max_backoff_ms: u64,
    /// Exponential factor to increase delay after each failure (>= 1).
    pub factor: u32,
    /// Random jitter percentage [0, 100] added to each delay.
    pub jitter_percent: u8,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            min_backoff_ms: 100,
            max_backoff_ms: 900,
            factor: 2,
            jitter_percent: 20,
        }
    }
}

/// Bounded retry policy for transient upstream failures.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetryConfig {
    /// Retries after the first attempt. `0` disables retrying.
    pub max_retries: u32,
    /// Delay schedule between attempts.
    pub backoff: BackoffConfig,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: BackoffConfig::default(),
        }
    }
}

/// Engine-wide freshness parameters for resolved properties.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct FreshnessConfig {
    /// Absolute lifetime of a cached envelope.
    pub ttl: Duration,
    /// Age after which a cached envelope is served as stale and refreshed.
    pub stale_after: Duration,
    /// Lifetime of a negative-cache marker.
    pub negative_ttl: Duration,
    /// Lifetime of the cold-fetch stampede lock.
    pub lock_ttl: Duration,
}

impl FreshnessConfig {
    /// Default envelope lifetime.
    pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);
    /// Default soft freshness window.
    pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(5 * 60);

    /// Envelope lifetime, falling back to the default when unset.
    #[must_use]
    pub fn effective_ttl(&self) -> Duration {
        if self.ttl.is_zero() {
            Self::DEFAULT_TTL
        } else {
            self.ttl
        }
    }

    /// Freshness window, falling back to the default when unset.
    #[must_use]
    pub fn effective_stale_after(&self) -> Duration {
        if self.stale_after.is_zero() {
            Self::DEFAULT_STALE_AFTER
        } else {
            self.stale_after
        }
    }
}

impl Default for FreshnessConfig {
    fn default() -> Self {
        Self {
            ttl: Self::DEFAULT_TTL,
            stale_after: Self::DEFAULT_STALE_AFTER,
            negative_ttl: Duration::from_secs(10 * 60),
            lock_ttl: Duration::from_secs(8),
        }
    }
}

/// Background revalidation pool sizing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Bounded queue capacity.
    pub capacity: usize,
    /// Number of worker tasks draining the queue.
    pub workers: usize,
    /// Deadline applied to each refresh action.
    pub job_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            capacity: 256,
            workers: 2,
            job_timeout: Duration::from_secs(15),
        }
    }
}

/// Optional search filters forwarded to the provider.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListingFilters {
    /// Minimum bedrooms (`0` = unset).
    pub min_beds: u32,
    /// Minimum bathrooms (`0` = unset).
    pub min_baths: u32,
    /// Minimum list price (`0` = unset).
    pub min_price: u64,
    /// Maximum list price (`0` = unset).
    pub max_price: u64,
}

/// Provider identifier recorded on persisted listings.
pub const DEFAULT_PROVIDER: &str = "rapidapi.realtor16";
/// Endpoint label recorded on raw snapshots.
pub const DEFAULT_ENDPOINT: &str = "search/forsale";

/// Bulk hydration run configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HydrateConfig {
    /// Postal codes to ingest, in order.
    pub zips: Vec<String>,
    /// Property types crossed with every zip. Empty means "no type filter".
    pub property_types: Vec<String>,
    /// Results requested per page.
    pub page_size: u32,
    /// Upper bound on pages fetched per (zip, type) pair.
    pub max_pages: u32,
    /// Re-run period. `None` runs exactly once.
    pub interval: Option<Duration>,
    /// Delay inserted between page fetches within a zip.
    pub pause: Duration,
    /// Deadline for each individual provider call.
    pub request_timeout: Duration,
    /// Fetch the photo set for listings that arrive without images.
    pub fetch_photos: bool,
    /// Provider identifier stored with each listing.
    pub provider: String,
    /// Endpoint label stored with each raw snapshot.
    pub endpoint: String,
    /// Optional provider-side ordering.
    pub order_by: Option<String>,
    /// Bed/bath/price filters.
    pub filters: ListingFilters,
}

impl Default for HydrateConfig {
    fn default() -> Self {
        Self {
            zips: Vec::new(),
            property_types: Vec::new(),
            page_size: 50,
            max_pages: 5,
            interval: None,
            pause: Duration::ZERO,
            request_timeout: Duration::from_secs(10),
            fetch_photos: false,
            provider: DEFAULT_PROVIDER.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            order_by: None,
            filters: ListingFilters::default(),
        }
    }
}
