//! Error type for `domus-store`.

use domus_core::DomusError;
use thiserror::Error;

/// Backend-local failures, converted to [`DomusError`] at the trait boundary.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite failure.
    #[error("database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),

    /// Redis failure.
    #[cfg(feature = "redis")]
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

impl From<StoreError> for DomusError {
    fn from(err: StoreError) -> Self {
        match err {
            #[cfg(feature = "redis")]
            StoreError::Redis(e) => Self::cache(e.to_string()),
            other => Self::persistence(other.to_string()),
        }
    }
}

/// Result alias for backend-local operations.
pub type Result<T, E = StoreError> = std::result::Result<T, E>;
