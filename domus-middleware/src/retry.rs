//! Bounded retry with exponential backoff for transient upstream failures.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use domus_core::connector::{ListingConnector, SearchPage, SearchRequest};
use domus_core::{DomusError, Middleware, PhotoAsset};
use domus_types::{BackoffConfig, RetryConfig};
use rand::Rng;

/// Add up to `jitter_percent` of `base_ms` as random extra delay.
#[must_use]
pub fn jitter_wait(base_ms: u64, jitter_percent: u32) -> u64 {
    let jitter_range = if jitter_percent == 0 {
        1
    } else {
        std::cmp::max(1, (base_ms.saturating_mul(u64::from(jitter_percent))) / 100)
    };
    let mut rng = rand::rng();
    base_ms + rng.random_range(0..jitter_range)
}

/// Delay before retry number `attempt` (0-based), before jitter.
///
/// Starts at `min_backoff_ms`, multiplies by `factor` per attempt and is capped
/// at `max_backoff_ms`.
#[must_use]
pub fn backoff_delay_ms(cfg: &BackoffConfig, attempt: u32) -> u64 {
    let cap = cfg.max_backoff_ms.max(cfg.min_backoff_ms);
    let factor = u64::from(cfg.factor.max(1));
    let mut delay = cfg.min_backoff_ms;
    for _ in 0..attempt {
        delay = delay.saturating_mul(factor);
        if delay >= cap {
            break;
        }
    }
    delay.min(cap)
}

/// Wrapper that retries retryable failures (transport errors and 5xx).
///
/// Quota, mapping and 4xx failures are returned on the first occurrence.
pub struct RetryingConnector {
    inner: Arc<dyn ListingConnector>,
    config: RetryConfig,
}

impl RetryingConnector {
    /// Wrap `inner` with the given retry policy.
    pub const fn new(inner: Arc<dyn ListingConnector>, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    /// Access the inner connector.
    pub fn inner(&self) -> &Arc<dyn ListingConnector> {
        &self.inner
    }

    async fn run<T, F, Fut>(&self, _op: &'static str, mut call: F) -> Result<T, DomusError>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, DomusError>> + Send,
        T: Send,
    {
        let mut attempt: u32 = 0;
        loop {
            match call().await {
                Ok(v) => return Ok(v),
                Err(err) if err.is_retryable() && attempt < self.config.max_retries => {
                    let base = backoff_delay_ms(&self.config.backoff, attempt);
                    let wait_ms =
                        jitter_wait(base, u32::from(self.config.backoff.jitter_percent));
                    #[cfg(feature = "tracing")]
                    tracing::debug!(
                        connector = self.inner.name(),
                        op = _op,
                        attempt,
                        wait_ms,
                        error = %err,
                        "retrying upstream call"
                    );
                    tokio::time::sleep(Duration::from_millis(wait_ms)).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[async_trait]
impl ListingConnector for RetryingConnector {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn vendor(&self) -> &'static str {
        self.inner.vendor()
    }

    async fn search_by_postal(&self, req: &SearchRequest) -> Result<SearchPage, DomusError> {
        self.run("search", || self.inner.search_by_postal(req)).await
    }

    async fn photos(&self, property_id: &str) -> Result<Vec<PhotoAsset>, DomusError> {
        self.run("photos", || self.inner.photos(property_id)).await
    }
}

/// Middleware config for constructing a [`RetryingConnector`].
pub struct RetryMiddleware {
    config: RetryConfig,
}

impl RetryMiddleware {
    /// Build with the given retry policy.
    #[must_use]
    pub const fn new(config: RetryConfig) -> Self {
        Self { config }
    }
}

impl Middleware for RetryMiddleware {
    fn apply(self: Box<Self>, inner: Arc<dyn ListingConnector>) -> Arc<dyn ListingConnector> {
        Arc::new(RetryingConnector::new(inner, self.config))
    }

    fn name(&self) -> &'static str {
        "RetryingConnector"
    }

    fn config_json(&self) -> serde_json::Value {
        let b = self.config.backoff;
        serde_json::json!({
            "max_retries": self.config.max_retries,
            "min_backoff_ms": b.min_backoff_ms,
            "max_backoff_ms": b.max_backoff_ms,
            "factor": b.factor,
            "jitter_percent": b.jitter_percent,
        })
    }
}
