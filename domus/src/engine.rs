//! Stale-while-revalidate resolution of a single address.
//!
//! Per property key the engine moves through these states, checked in order:
//!
//! | State | Condition | Outcome |
//! |---|---|---|
//! | negative-cached | `prop:miss:<key>` exists | 404 |
//! | fresh hit | envelope present, `now < stale_after` | 200 cache |
//! | stale hit | envelope present, `now >= stale_after` | 200 cache, stale, refresh queued |
//! | cold, lock won | no envelope, `prop:lock:<key>` set | synchronous fetch, 200 fresh or 404 |
//! | cold, lock lost | no envelope, lock already held | 202 |
//!
//! A cold fetch searches only the first page of the address's postal code.
//! A listing that sorts past that page resolves as not-found; going deeper
//! would multiply the upstream cost of every miss.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domus_core::connector::{ListingConnector, SearchPage, SearchRequest};
use domus_core::{
    CacheEnvelope, CacheStore, CanonicalAddress, Clock, DomusError, ENVELOPE_SOURCE,
    EnvelopeMeta, PropertyCard, PropertyKey, SystemClock, canonicalize,
};
use domus_types::{DEFAULT_ENDPOINT, DEFAULT_PROVIDER, DispatcherConfig, FreshnessConfig};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::dispatcher::{RefreshAction, RefreshJob, RevalidationDispatcher};
use crate::hydrator::Hydrator;

/// Results requested by a cold-fetch search.
pub const RESOLVE_PAGE_SIZE: u32 = 20;

/// Raw address to resolve.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveRequest {
    /// Street line, optionally with a unit.
    pub address: String,
    /// City.
    pub city: String,
    /// State name or code.
    pub state: String,
    /// Postal code.
    pub zip: String,
}

impl ResolveRequest {
    /// Build a request from its four fields.
    pub fn new(
        address: impl Into<String>,
        city: impl Into<String>,
        state: impl Into<String>,
        zip: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            city: city.into(),
            state: state.into(),
            zip: zip.into(),
        }
    }

    fn validate(&self) -> Result<(), DomusError> {
        let missing = [&self.address, &self.city, &self.state, &self.zip]
            .iter()
            .any(|f| f.trim().is_empty());
        if missing {
            return Err(DomusError::validation(
                "address, city, state, zip are required",
            ));
        }
        Ok(())
    }
}

/// Where a found property came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveSource {
    /// Served from a cached envelope.
    Cache,
    /// Fetched from the provider during this call.
    Fresh,
}

impl ResolveSource {
    /// Wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cache => "cache",
            Self::Fresh => "fresh",
        }
    }
}

/// Result of a resolve call.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolveOutcome {
    /// No listing matches. `cooldown` is set when answered from the negative cache.
    NotFound {
        /// Canonical key of the request.
        property_key: PropertyKey,
        /// True when a negative-cache marker short-circuited the lookup.
        cooldown: bool,
    },
    /// A matching listing.
    Found {
        /// Cache or provider.
        source: ResolveSource,
        /// True when served past the freshness window.
        stale: bool,
        /// Canonical key of the request.
        property_key: PropertyKey,
        /// Canonical address fields of the request.
        normalized: CanonicalAddress,
        /// The matched listing card.
        data: PropertyCard,
    },
    /// Another caller holds the cold-fetch lock for this key.
    InProgress {
        /// Canonical key of the request.
        property_key: PropertyKey,
    },
}

impl ResolveOutcome {
    /// HTTP status an API layer should answer with.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::Found { .. } => 200,
            Self::InProgress { .. } => 202,
        }
    }

    /// Canonical key of the request.
    #[must_use]
    pub const fn property_key(&self) -> &PropertyKey {
        match self {
            Self::NotFound { property_key, .. }
            | Self::Found { property_key, .. }
            | Self::InProgress { property_key } => property_key,
        }
    }

    /// Response body an API layer should answer with.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::NotFound {
                property_key,
                cooldown,
            } => {
                let mut body = json!({ "error": "not_found", "property_key": property_key });
                if *cooldown {
                    body["cache_miss_cooldown"] = json!(true);
                }
                body
            }
            Self::Found {
                source,
                stale,
                property_key,
                normalized,
                data,
            } => json!({
                "ok": true,
                "source": source.as_str(),
                "stale": stale,
                "property_key": property_key,
                "normalized": normalized,
                "data": data,
            }),
            Self::InProgress { property_key } => json!({
                "ok": false,
                "in_progress": true,
                "property_key": property_key,
            }),
        }
    }
}

/// HTTP status an API layer should answer with for a failed call.
#[must_use]
pub const fn error_status(err: &DomusError) -> u16 {
    match err {
        DomusError::Validation(_) => 400,
        DomusError::QuotaExceeded { .. } => 429,
        DomusError::NotFound { .. } => 404,
        DomusError::Upstream { .. } | DomusError::ProviderTimeout { .. } => 502,
        _ => 500,
    }
}

fn add_std(t: DateTime<Utc>, d: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(d)
        .ok()
        .and_then(|d| t.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Collaborators shared by the request path and background refreshes.
struct Resolver {
    cache: Arc<dyn CacheStore>,
    connector: Arc<dyn ListingConnector>,
    hydrator: Option<Arc<Hydrator>>,
    freshness: FreshnessConfig,
    clock: Arc<dyn Clock>,
    request_timeout: Duration,
    provider: String,
    endpoint: String,
}

impl Resolver {
    /// Search the first page of the postal code and return the first candidate
    /// naming the same street, city, and state.
    async fn fetch_match(
        &self,
        address: &CanonicalAddress,
    ) -> Result<Option<(Arc<[u8]>, PropertyCard)>, DomusError> {
        let req = SearchRequest::new(address.zip.clone(), 1, RESOLVE_PAGE_SIZE);
        let SearchPage { payload, cards } = tokio::time::timeout(
            self.request_timeout,
            self.connector.search_by_postal(&req),
        )
        .await
        .unwrap_or_else(|_| {
            Err(DomusError::provider_timeout(self.connector.name(), "search"))
        })?;

        let found = cards.into_iter().find(|c| {
            let (candidate, _) = canonicalize(&c.address, &c.city, &c.state, &c.zip);
            candidate.same_street(address)
        });
        Ok(found.map(|card| (payload, card)))
    }

    /// Bound one cache round-trip by the request timeout.
    async fn cache_call<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = Result<T, DomusError>>,
    ) -> Result<T, DomusError> {
        tokio::time::timeout(self.request_timeout, fut)
            .await
            .unwrap_or_else(|_| Err(DomusError::cache(format!("{operation} timed out"))))
    }

    async fn cached_envelope(&self, key: &PropertyKey) -> Option<CacheEnvelope> {
        let envelope_key = key.envelope_key();
        match self.cache_call("get", self.cache.get(&envelope_key)).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(env) => Some(env),
                Err(_e) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(property_key = %key, error = %_e, "discarding unreadable envelope");
                    None
                }
            },
            Ok(None) => None,
            Err(_e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(property_key = %key, error = %_e, "envelope read failed");
                None
            }
        }
    }

    async fn negative_cached(&self, key: &PropertyKey) -> bool {
        let miss_key = key.miss_key();
        self.cache_call("exists", self.cache.exists(&miss_key))
            .await
            .unwrap_or_else(|_e| {
                #[cfg(feature = "tracing")]
                tracing::warn!(property_key = %key, error = %_e, "negative cache check failed");
                false
            })
    }

    /// Build and store a fresh envelope. Cache write failures are logged only.
    async fn store_envelope(&self, address: &CanonicalAddress, key: &PropertyKey, card: &PropertyCard) {
        let now = self.clock.now();
        let ttl = self.freshness.effective_ttl();
        let env = CacheEnvelope {
            data: card.clone(),
            meta: EnvelopeMeta {
                last_fetch_at: now,
                stale_after: add_std(now, self.freshness.effective_stale_after()),
                ttl_seconds: ttl.as_secs(),
                source: ENVELOPE_SOURCE.to_string(),
            },
            normalized: address.clone(),
        };
        let stored = match serde_json::to_string(&env) {
            Ok(raw) => {
                let envelope_key = key.envelope_key();
                self.cache_call("set", self.cache.set(&envelope_key, raw, ttl))
                    .await
            }
            Err(e) => Err(e.into()),
        };
        if let Err(_e) = stored {
            #[cfg(feature = "tracing")]
            tracing::warn!(property_key = %key, error = %_e, "envelope write failed");
        }
    }

    /// Persist in the background; the response never waits on the store.
    fn write_behind(
        &self,
        payload: Arc<[u8]>,
        address: CanonicalAddress,
        key: PropertyKey,
        card: PropertyCard,
    ) {
        let Some(hydrator) = self.hydrator.clone() else {
            return;
        };
        let provider = self.provider.clone();
        let endpoint = self.endpoint.clone();
        tokio::spawn(async move {
            if let Err(_e) = hydrator
                .write(&provider, &endpoint, payload, &address, &key, &card)
                .await
            {
                #[cfg(feature = "tracing")]
                tracing::warn!(property_key = %key, error = %_e, "write-behind failed");
            }
        });
    }
}

#[async_trait]
impl RefreshAction for Resolver {
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "domus::engine::refresh",
            skip(self, job),
            fields(property_key = %job.property_key),
        )
    )]
    async fn refresh(&self, job: RefreshJob) {
        match self.fetch_match(&job.address).await {
            Ok(Some((payload, card))) => {
                self.store_envelope(&job.address, &job.property_key, &card)
                    .await;
                self.write_behind(payload, job.address, job.property_key, card);
            }
            Ok(None) => {
                // The envelope keeps serving until its TTL lapses.
                #[cfg(feature = "tracing")]
                tracing::debug!("refresh found no matching listing");
            }
            Err(_e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %_e, "refresh failed");
            }
        }
    }
}

/// Resolves raw addresses to listing cards through the shared cache.
pub struct ResolutionEngine {
    resolver: Arc<Resolver>,
    dispatcher: RevalidationDispatcher,
}

impl ResolutionEngine {
    /// Start building an engine.
    #[must_use]
    pub fn builder() -> ResolutionEngineBuilder {
        ResolutionEngineBuilder::new()
    }

    /// Resolve one address.
    ///
    /// # Errors
    /// - `Validation` when any of the four fields is blank.
    /// - `QuotaExceeded` when a cold fetch is refused by the quota gate.
    /// - `Upstream`, `ProviderTimeout`, or `Mapping` when a cold fetch fails.
    ///   No negative-cache marker is written in that case.
    /// - `Cache` when the stampede lock cannot be taken, including when the
    ///   cache store does not answer within the request timeout.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "domus::engine::resolve", skip(self, req), fields(zip = %req.zip))
    )]
    pub async fn resolve(&self, req: &ResolveRequest) -> Result<ResolveOutcome, DomusError> {
        req.validate()?;
        let (normalized, property_key) =
            canonicalize(&req.address, &req.city, &req.state, &req.zip);
        let r = &self.resolver;

        if r.negative_cached(&property_key).await {
            return Ok(ResolveOutcome::NotFound {
                property_key,
                cooldown: true,
            });
        }

        if let Some(env) = r.cached_envelope(&property_key).await {
            let stale = env.is_stale_at(r.clock.now());
            if stale {
                let _outcome = self.dispatcher.enqueue(RefreshJob {
                    property_key: property_key.clone(),
                    address: normalized.clone(),
                });
                #[cfg(feature = "tracing")]
                if _outcome == crate::dispatcher::EnqueueOutcome::Queued {
                    tracing::debug!(property_key = %property_key, "stale hit; refresh queued");
                }
            }
            return Ok(ResolveOutcome::Found {
                source: ResolveSource::Cache,
                stale,
                property_key,
                normalized,
                data: env.data,
            });
        }

        let lock_key = property_key.lock_key();
        let won = r
            .cache_call(
                "set_if_absent",
                r.cache
                    .set_if_absent(&lock_key, "1".to_string(), r.freshness.lock_ttl),
            )
            .await?;
        if !won {
            return Ok(ResolveOutcome::InProgress { property_key });
        }

        let Some((payload, card)) = r.fetch_match(&normalized).await? else {
            let miss_key = property_key.miss_key();
            if let Err(_e) = r
                .cache_call(
                    "set",
                    r.cache
                        .set(&miss_key, "1".to_string(), r.freshness.negative_ttl),
                )
                .await
            {
                #[cfg(feature = "tracing")]
                tracing::warn!(property_key = %property_key, error = %_e, "negative cache write failed");
            }
            return Ok(ResolveOutcome::NotFound {
                property_key,
                cooldown: false,
            });
        };

        r.store_envelope(&normalized, &property_key, &card).await;
        r.write_behind(
            payload,
            normalized.clone(),
            property_key.clone(),
            card.clone(),
        );
        Ok(ResolveOutcome::Found {
            source: ResolveSource::Fresh,
            stale: false,
            property_key,
            normalized,
            data: card,
        })
    }

    /// The background refresh dispatcher.
    #[must_use]
    pub const fn dispatcher(&self) -> &RevalidationDispatcher {
        &self.dispatcher
    }

    /// Freshness parameters in effect.
    #[must_use]
    pub fn freshness(&self) -> FreshnessConfig {
        self.resolver.freshness
    }

    /// Drain queued refreshes and stop the workers.
    pub async fn shutdown(self) {
        self.dispatcher.shutdown().await;
    }
}

/// Builder for [`ResolutionEngine`].
pub struct ResolutionEngineBuilder {
    cache: Option<Arc<dyn CacheStore>>,
    connector: Option<Arc<dyn ListingConnector>>,
    hydrator: Option<Arc<Hydrator>>,
    freshness: FreshnessConfig,
    dispatcher: DispatcherConfig,
    clock: Arc<dyn Clock>,
    request_timeout: Duration,
    provider: String,
    endpoint: String,
}

impl Default for ResolutionEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ResolutionEngineBuilder {
    /// Default deadline for one provider call.
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

    /// Builder with default freshness and dispatcher settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cache: None,
            connector: None,
            hydrator: None,
            freshness: FreshnessConfig::default(),
            dispatcher: DispatcherConfig::default(),
            clock: Arc::new(SystemClock),
            request_timeout: Self::DEFAULT_REQUEST_TIMEOUT,
            provider: DEFAULT_PROVIDER.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }

    /// Key-value store holding envelopes, markers, and locks.
    #[must_use]
    pub fn cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Provider connector, normally already wrapped with quota and retry layers.
    #[must_use]
    pub fn connector(mut self, connector: Arc<dyn ListingConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Persist matched cards in the background.
    #[must_use]
    pub fn hydrator(mut self, hydrator: Arc<Hydrator>) -> Self {
        self.hydrator = Some(hydrator);
        self
    }

    /// Envelope TTL, freshness window, negative TTL, and lock TTL.
    #[must_use]
    pub const fn freshness(mut self, freshness: FreshnessConfig) -> Self {
        self.freshness = freshness;
        self
    }

    /// Background refresh pool sizing.
    #[must_use]
    pub const fn dispatcher(mut self, cfg: DispatcherConfig) -> Self {
        self.dispatcher = cfg;
        self
    }

    /// Clock used for freshness decisions.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Deadline for each provider call and each cache round-trip.
    #[must_use]
    pub const fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Provider and endpoint labels recorded by write-behind.
    #[must_use]
    pub fn labels(mut self, provider: impl Into<String>, endpoint: impl Into<String>) -> Self {
        self.provider = provider.into();
        self.endpoint = endpoint.into();
        self
    }

    /// Build the engine and start its refresh workers.
    ///
    /// # Errors
    /// Returns `Config` when no cache store or connector was supplied.
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime.
    pub fn build(self) -> Result<ResolutionEngine, DomusError> {
        let cache = self
            .cache
            .ok_or_else(|| DomusError::Config("resolution engine needs a cache store".into()))?;
        let connector = self
            .connector
            .ok_or_else(|| DomusError::Config("resolution engine needs a connector".into()))?;
        let resolver = Arc::new(Resolver {
            cache,
            connector,
            hydrator: self.hydrator,
            freshness: self.freshness,
            clock: self.clock,
            request_timeout: self.request_timeout,
            provider: self.provider,
            endpoint: self.endpoint,
        });
        let action: Arc<dyn RefreshAction> = resolver.clone();
        let dispatcher = RevalidationDispatcher::spawn(self.dispatcher, action);
        Ok(ResolutionEngine {
            resolver,
            dispatcher,
        })
    }
}
