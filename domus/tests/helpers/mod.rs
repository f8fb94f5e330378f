// Shared fixtures so tests can `use helpers::*;`
#![allow(dead_code)]

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use domus::{CacheStore, DomusError, Hydrator, PropertyKey, PropertyStore};
use domus_core::store::{ListingPhotoInput, ListingQuery, ListingRecord, UpsertInput, UpsertResult};
use domus_store::SqliteStore;

/// Fresh in-memory SQLite store.
pub async fn sqlite() -> Arc<SqliteStore> {
    Arc::new(SqliteStore::open_in_memory().await.expect("open in-memory store"))
}

/// Hydrator writing into `store`.
pub fn hydrator_for(store: Arc<dyn PropertyStore>) -> Arc<Hydrator> {
    Arc::new(Hydrator::new(store))
}

/// Poll `check` every 10ms until it holds or `within` elapses.
pub async fn eventually(within: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + within;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Property store that only records what it is asked to write.
///
/// Never touches a blocking thread, so it is safe under a paused clock.
#[derive(Default)]
pub struct RecordingStore {
    upserts: Mutex<Vec<UpsertInput>>,
    photo_sets: Mutex<Vec<(String, Vec<ListingPhotoInput>)>>,
}

impl RecordingStore {
    pub fn upserts(&self) -> Vec<UpsertInput> {
        self.upserts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn photo_sets(&self) -> Vec<(String, Vec<ListingPhotoInput>)> {
        self.photo_sets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl PropertyStore for RecordingStore {
    async fn write_snapshot_and_upsert(
        &self,
        input: UpsertInput,
    ) -> Result<UpsertResult, DomusError> {
        let mut guard = self.upserts.lock().unwrap_or_else(PoisonError::into_inner);
        guard.push(input);
        let id = i64::try_from(guard.len()).unwrap_or(i64::MAX);
        Ok(UpsertResult {
            property_id: id,
            listing_id: id,
        })
    }

    async fn replace_listing_photos(
        &self,
        provider_listing_id: &str,
        photos: Vec<ListingPhotoInput>,
    ) -> Result<bool, DomusError> {
        self.photo_sets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((provider_listing_id.to_string(), photos));
        Ok(true)
    }

    async fn listing_photos(&self, _provider_listing_id: &str) -> Result<Vec<String>, DomusError> {
        Ok(Vec::new())
    }

    async fn listings_by_postal(
        &self,
        _query: &ListingQuery,
    ) -> Result<Vec<ListingRecord>, DomusError> {
        Ok(Vec::new())
    }

    async fn property_key_for_listing(
        &self,
        _provider_listing_id: &str,
    ) -> Result<Option<PropertyKey>, DomusError> {
        Ok(None)
    }
}

/// Cache store whose calls never complete.
pub struct StalledCache;

#[async_trait]
impl CacheStore for StalledCache {
    async fn get(&self, _key: &str) -> Result<Option<String>, DomusError> {
        std::future::pending().await
    }

    async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> Result<(), DomusError> {
        std::future::pending().await
    }

    async fn exists(&self, _key: &str) -> Result<bool, DomusError> {
        std::future::pending().await
    }

    async fn set_if_absent(
        &self,
        _key: &str,
        _value: String,
        _ttl: Duration,
    ) -> Result<bool, DomusError> {
        std::future::pending().await
    }
}
