//! Domus resolves real-estate addresses through a shared cache and keeps a
//! relational copy of provider listings.
//!
//! Overview
//! - Canonicalizes raw addresses into a stable property key (`domus_core::canon`).
//! - Serves resolves stale-while-revalidate: fresh hits return at once, stale
//!   hits return at once and queue a deduplicated background refresh, cold
//!   misses take a short lock so only one caller goes upstream.
//! - Remembers confirmed absences with a negative-cache marker.
//! - Persists every matched card behind the response (write-behind) and
//!   publishes a `PropertyUpdated` event per write.
//! - Walks configured postal codes page by page in a quota-bounded bulk job.
//!
//! Key behaviors and trade-offs
//! - Quota: every provider call, interactive or bulk, passes one shared
//!   `QuotaGate`. Retries are layered outside the gate, so each attempt spends
//!   budget; a refusal is terminal and surfaces as `QuotaExceeded` (HTTP 429).
//! - Cold fetch: only the first page of the postal code is searched; a listing
//!   deeper in the results resolves as not-found.
//! - Refresh saturation: when the refresh queue is full the job is dropped and
//!   the stale envelope keeps serving until its TTL.
//!
//! Examples
//! Resolving an address:
//! ```rust,ignore
//! use std::sync::Arc;
//! use domus::{Hydrator, ResolutionEngine, ResolveRequest};
//! use domus_middleware::{ConnectorBuilder, QuotaGate};
//! use domus_store::{MemoryCacheStore, SqliteStore};
//!
//! let gate = Arc::new(QuotaGate::new(Default::default()));
//! let connector = ConnectorBuilder::new(raw)
//!     .with_quota(gate)
//!     .with_retry(Default::default())
//!     .build();
//! let store = Arc::new(SqliteStore::open("domus.db").await?);
//! let engine = ResolutionEngine::builder()
//!     .cache(Arc::new(MemoryCacheStore::default()))
//!     .connector(connector)
//!     .hydrator(Arc::new(Hydrator::new(store)))
//!     .build()?;
//!
//! let outcome = engine
//!     .resolve(&ResolveRequest::new("123 Main St", "Springfield", "IL", "62704"))
//!     .await?;
//! println!("{} {}", outcome.http_status(), outcome.to_json());
//! ```
//!
//! Running one bulk pass:
//! ```rust,ignore
//! let job = domus::BulkJob::new(connector, hydrator, config)?;
//! let (_stop, mut shutdown) = tokio::sync::watch::channel(false);
//! let report = job.run_once(&mut shutdown).await?;
//! ```
#![warn(missing_docs)]

/// Quota-bounded bulk ingestion.
pub mod bulk;
/// Deduplicated background refresh workers.
pub mod dispatcher;
/// Stale-while-revalidate resolution.
pub mod engine;
mod hydrator;
/// Store-first listing search.
pub mod listings;
/// Settings for the `hydrator` binary.
pub mod settings;

pub use bulk::{BulkJob, RunReport};
pub use dispatcher::{EnqueueOutcome, RefreshAction, RefreshJob, RevalidationDispatcher};
pub use engine::{
    RESOLVE_PAGE_SIZE, ResolutionEngine, ResolutionEngineBuilder, ResolveOutcome, ResolveRequest,
    ResolveSource, error_status,
};
pub use hydrator::{Hydrator, LISTING_STATUS};
pub use listings::{ListingPhotos, ListingsPage, ListingsQuery, ListingsService, ListingsSource};
pub use settings::HydratorSettings;

// Re-export core types for convenience
pub use domus_core::{
    CacheEnvelope,
    CacheStore,
    CanonicalAddress,
    Clock,
    DispatcherConfig,
    DomusError,
    EventPublisher,
    FreshnessConfig,
    HydrateConfig,
    InMemoryPublisher,
    ListingConnector,
    ListingFilters,
    PhotoAsset,
    PropertyCard,
    PropertyKey,
    PropertyStore,
    PropertyUpdated,
    QuotaConfig,
    QuotaState,
    RetryConfig,
    SystemClock,
    canonicalize,
};
