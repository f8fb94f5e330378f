//! domus-core
//!
//! Core traits and pure logic shared across the domus workspace.
//!
//! - `canon`: address canonicalization and property key derivation.
//! - `connector`: the `ListingConnector` trait and search request/page types.
//! - `store`: the `CacheStore` and `PropertyStore` seams plus their row types.
//! - `events`: best-effort `PropertyUpdated` publication.
//!
//! Async runtime (Tokio)
//! ---------------------
//! `events::InMemoryPublisher` hands out a `tokio::sync::mpsc::Receiver`, so
//! consumers must run under a Tokio 1.x runtime.
#![warn(missing_docs)]

/// Address canonicalization.
pub mod canon;
/// Wall-clock seam.
pub mod clock;
/// Listing provider trait and request/response types.
pub mod connector;
/// Property update events.
pub mod events;
/// Middleware trait implemented by connector wrappers.
pub mod middleware;
/// Cache and relational storage traits.
pub mod store;

pub use canon::canonicalize;
pub use clock::{Clock, SystemClock};
pub use connector::{ListingConnector, SearchPage, SearchRequest};
pub use domus_types::*;
pub use events::{EventPublisher, InMemoryPublisher, PropertyUpdated};
pub use middleware::Middleware;
pub use store::{
    CacheStore, ListingPhotoInput, ListingQuery, ListingRecord, PropertyStore, UpsertInput,
    UpsertResult,
};
