//! Redis-backed [`CacheStore`] for deployments running several processes.

use std::time::Duration;

use async_trait::async_trait;
use domus_core::{CacheStore, DomusError};
use redis::AsyncCommands;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};

use crate::StoreError;

/// Redis-backed cache store shared by every hydrator process.
#[derive(Clone)]
pub struct RedisCacheStore {
    manager: ConnectionManager,
}

impl RedisCacheStore {
    /// Default deadline for connecting and for each command reply.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

    /// Connect to the Redis server at `url` with [`DEFAULT_TIMEOUT`](Self::DEFAULT_TIMEOUT).
    ///
    /// # Errors
    /// Returns `DomusError::Cache` if the URL is invalid or the server is unreachable.
    pub async fn connect(url: &str) -> Result<Self, DomusError> {
        Self::connect_with_timeout(url, Self::DEFAULT_TIMEOUT).await
    }

    /// Connect to the Redis server at `url`; a command with no reply within
    /// `timeout` fails with `DomusError::Cache`.
    ///
    /// # Errors
    /// Returns `DomusError::Cache` if the URL is invalid or the server is unreachable.
    pub async fn connect_with_timeout(url: &str, timeout: Duration) -> Result<Self, DomusError> {
        let client = redis::Client::open(url).map_err(StoreError::from)?;
        let config = ConnectionManagerConfig::new()
            .set_connection_timeout(timeout)
            .set_response_timeout(timeout);
        let manager = ConnectionManager::new_with_config(client, config)
            .await
            .map_err(StoreError::from)?;
        Ok(Self { manager })
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, DomusError> {
        let mut conn = self.manager.clone();
        let val: Option<String> = conn.get(key).await.map_err(StoreError::from)?;
        Ok(val)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), DomusError> {
        let mut conn = self.manager.clone();
        let secs = ttl.as_secs().max(1);
        let _: () = conn
            .set_ex(key, value, secs)
            .await
            .map_err(StoreError::from)?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, DomusError> {
        let mut conn = self.manager.clone();
        let found: bool = conn.exists(key).await.map_err(StoreError::from)?;
        Ok(found)
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> Result<bool, DomusError> {
        let mut conn = self.manager.clone();
        let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(millis)
            .query_async(&mut conn)
            .await
            .map_err(StoreError::from)?;
        Ok(reply.is_some())
    }
}
