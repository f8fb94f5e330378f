//! Domus-specific data transfer objects, configuration primitives, and errors.
#![warn(missing_docs)]

mod address;
mod config;
mod envelope;
mod error;
mod listing;

pub use address::{CanonicalAddress, PropertyKey};
pub use config::{
    BackoffConfig, DEFAULT_ENDPOINT, DEFAULT_PROVIDER, DispatcherConfig, FreshnessConfig,
    HydrateConfig, ListingFilters, QuotaConfig, QuotaState, RetryConfig,
};
pub use envelope::{CacheEnvelope, ENVELOPE_SOURCE, EnvelopeMeta};
pub use error::DomusError;
pub use listing::{PhotoAsset, PropertyCard};
