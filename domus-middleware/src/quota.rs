//! Shared quota gate and the connector wrapper that enforces it.
//!
//! One [`QuotaGate`] instance is shared by every call path (interactive resolves,
//! background refreshes, bulk hydration), so the budget is process-wide.

use std::num::NonZeroU32;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use domus_core::connector::{ListingConnector, SearchPage, SearchRequest};
use domus_core::{Clock, DomusError, Middleware, PhotoAsset, SystemClock};
use domus_types::{QuotaConfig, QuotaState};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Pre-flight admission control: token-bucket rate limit plus a UTC-day budget.
pub struct QuotaGate {
    config: QuotaConfig,
    limiter: Option<DirectRateLimiter>,
    clock: Arc<dyn Clock>,
    day: Mutex<DayCounter>,
}

struct DayCounter {
    day: NaiveDate,
    count: u64,
}

impl DayCounter {
    fn roll(&mut self, today: NaiveDate) {
        if self.day != today {
            self.day = today;
            self.count = 0;
        }
    }
}

impl QuotaGate {
    /// Create a gate driven by the system clock.
    #[must_use]
    pub fn new(config: QuotaConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a gate whose day boundaries follow `clock`.
    #[must_use]
    pub fn with_clock(config: QuotaConfig, clock: Arc<dyn Clock>) -> Self {
        let limiter = rate_quota(&config).map(RateLimiter::direct);
        let day = DayCounter {
            day: clock.now().date_naive(),
            count: 0,
        };
        Self {
            config,
            limiter,
            clock,
            day: Mutex::new(day),
        }
    }

    /// Configuration this gate was built with.
    #[must_use]
    pub const fn config(&self) -> &QuotaConfig {
        &self.config
    }

    /// Wait for a rate token and reserve one unit of the daily budget.
    ///
    /// An exhausted day fails immediately without waiting. The unit is reserved
    /// before the caller performs any I/O and is not refunded on failure.
    ///
    /// # Errors
    /// Returns `DomusError::QuotaExceeded` when the daily budget is spent.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "domus::quota::acquire", skip(self), level = "debug")
    )]
    pub async fn acquire(&self) -> Result<(), DomusError> {
        self.admit(false)?;
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
        self.admit(true)
    }

    /// [`acquire`](Self::acquire) bounded by `deadline`.
    ///
    /// # Errors
    /// Returns `ProviderTimeout` when no token became available in time, or
    /// `QuotaExceeded` as for `acquire`.
    pub async fn acquire_within(&self, deadline: Duration) -> Result<(), DomusError> {
        tokio::time::timeout(deadline, self.acquire())
            .await
            .map_err(|_| DomusError::provider_timeout("quota", "acquire"))?
    }

    /// Current daily budget. `remaining` is `u64::MAX` when no daily limit is set.
    #[must_use]
    pub fn snapshot(&self) -> QuotaState {
        let now = self.clock.now();
        let mut counter = self.counter();
        counter.roll(now.date_naive());
        let remaining = self.remaining(&counter);
        drop(counter);
        QuotaState {
            limit: self.config.daily_limit,
            remaining,
            reset_in: until_next_utc_day(now),
        }
    }

    fn admit(&self, reserve: bool) -> Result<(), DomusError> {
        let now = self.clock.now();
        let mut counter = self.counter();
        counter.roll(now.date_naive());
        let limit = self.config.daily_limit;
        if limit > 0 && counter.count >= limit {
            drop(counter);
            let reset_in_ms = u64::try_from(until_next_utc_day(now).as_millis()).unwrap_or(u64::MAX);
            #[cfg(feature = "tracing")]
            tracing::warn!(limit, reset_in_ms, "daily quota exhausted");
            return Err(DomusError::QuotaExceeded {
                remaining: 0,
                reset_in_ms,
            });
        }
        if reserve {
            counter.count += 1;
        }
        Ok(())
    }

    fn remaining(&self, counter: &DayCounter) -> u64 {
        if self.config.daily_limit == 0 {
            u64::MAX
        } else {
            self.config.daily_limit.saturating_sub(counter.count)
        }
    }

    fn counter(&self) -> MutexGuard<'_, DayCounter> {
        self.day.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn rate_quota(config: &QuotaConfig) -> Option<Quota> {
    let rps = config.requests_per_second;
    if !(rps.is_finite() && rps > 0.0) {
        return None;
    }
    let period = Duration::try_from_secs_f64(1.0 / rps).ok()?;
    let burst = NonZeroU32::new(config.burst).unwrap_or(NonZeroU32::MIN);
    Quota::with_period(period).map(|q| q.allow_burst(burst))
}

fn until_next_utc_day(now: DateTime<Utc>) -> Duration {
    now.date_naive()
        .succ_opt()
        .map(|d| d.and_time(NaiveTime::MIN).and_utc())
        .and_then(|midnight| (midnight - now).to_std().ok())
        .unwrap_or_default()
}

/// Wrapper that passes every provider call through a shared [`QuotaGate`].
pub struct QuotaAwareConnector {
    inner: Arc<dyn ListingConnector>,
    gate: Arc<QuotaGate>,
}

impl QuotaAwareConnector {
    /// Wrap `inner` so each call first acquires from `gate`.
    pub fn new(inner: Arc<dyn ListingConnector>, gate: Arc<QuotaGate>) -> Self {
        Self { inner, gate }
    }

    /// Access the inner connector.
    pub fn inner(&self) -> &Arc<dyn ListingConnector> {
        &self.inner
    }

    /// The gate shared with other call paths.
    pub fn gate(&self) -> &Arc<QuotaGate> {
        &self.gate
    }
}

#[async_trait]
impl ListingConnector for QuotaAwareConnector {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn vendor(&self) -> &'static str {
        self.inner.vendor()
    }

    async fn search_by_postal(&self, req: &SearchRequest) -> Result<SearchPage, DomusError> {
        self.gate.acquire().await?;
        self.inner.search_by_postal(req).await
    }

    async fn photos(&self, property_id: &str) -> Result<Vec<PhotoAsset>, DomusError> {
        self.gate.acquire().await?;
        self.inner.photos(property_id).await
    }
}

/// Middleware config for constructing a [`QuotaAwareConnector`].
pub struct QuotaMiddleware {
    gate: Arc<QuotaGate>,
}

impl QuotaMiddleware {
    /// Build from a gate that may also be shared with other connectors.
    #[must_use]
    pub const fn new(gate: Arc<QuotaGate>) -> Self {
        Self { gate }
    }
}

impl Middleware for QuotaMiddleware {
    fn apply(self: Box<Self>, inner: Arc<dyn ListingConnector>) -> Arc<dyn ListingConnector> {
        Arc::new(QuotaAwareConnector::new(inner, self.gate))
    }

    fn name(&self) -> &'static str {
        "QuotaAwareConnector"
    }

    fn config_json(&self) -> serde_json::Value {
        let cfg = self.gate.config();
        serde_json::json!({
            "requests_per_second": cfg.requests_per_second,
            "burst": cfg.burst,
            "daily_limit": cfg.daily_limit,
        })
    }
}
