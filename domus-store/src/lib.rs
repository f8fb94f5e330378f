//! Storage backends for domus.
//!
//! - [`SqliteStore`]: the relational [`PropertyStore`](domus_core::PropertyStore),
//!   wrapping [`tokio_rusqlite`] so all database access runs off the async runtime.
//! - [`MemoryCacheStore`]: in-process [`CacheStore`](domus_core::CacheStore) with
//!   per-entry TTL.
//! - `RedisCacheStore` (feature `redis`): shared cache store for multi-process deployments.

mod memory;
#[cfg(feature = "redis")]
mod redis_cache;
mod schema;
mod sqlite;

pub mod error;

pub use error::StoreError;
pub use memory::MemoryCacheStore;
#[cfg(feature = "redis")]
pub use redis_cache::RedisCacheStore;
pub use sqlite::SqliteStore;

#[cfg(test)]
mod tests;
