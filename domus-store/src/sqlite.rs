//! [`SqliteStore`]: the SQLite implementation of [`PropertyStore`].

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use domus_core::store::{
    ListingPhotoInput, ListingQuery, ListingRecord, PropertyStore, UpsertInput, UpsertResult,
};
use domus_core::{Clock, DomusError, PropertyKey, SystemClock};
use rusqlite::{OptionalExtension as _, Transaction, params};
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::schema::SCHEMA;

/// Window after a write during which stored rows count as fresh.
const FRESHNESS_WINDOW_MINUTES: i64 = 5;

/// Property store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
    conn: tokio_rusqlite::Connection,
    clock: Arc<dyn Clock>,
}

impl SqliteStore {
    /// Open (or create) a store at `path` and run schema initialisation.
    ///
    /// # Errors
    /// Returns `DomusError::Persistence` if the file cannot be opened or migrated.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, DomusError> {
        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(crate::StoreError::from)?;
        Self::init(conn).await
    }

    /// Open an in-memory store, useful for testing.
    ///
    /// # Errors
    /// Returns `DomusError::Persistence` if SQLite cannot be initialised.
    pub async fn open_in_memory() -> Result<Self, DomusError> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(crate::StoreError::from)?;
        Self::init(conn).await
    }

    /// Stamp rows using `clock` instead of the system clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    async fn init(conn: tokio_rusqlite::Connection) -> Result<Self, DomusError> {
        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await
        .map_err(crate::StoreError::from)?;
        Ok(Self {
            conn,
            clock: Arc::new(SystemClock),
        })
    }

    fn stamps(&self) -> (String, String) {
        let now = self.clock.now();
        let stale = now + chrono::Duration::minutes(FRESHNESS_WINDOW_MINUTES);
        (encode_dt(now), encode_dt(stale))
    }

    pub(crate) fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    async fn upsert(&self, input: UpsertInput) -> Result<UpsertResult> {
        let (now, stale) = self.stamps();
        let digest = hex::encode(Sha256::digest(&input.payload));

        let res = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;

                let property_id: i64 = tx.query_row(
                    "INSERT INTO properties (
                       property_key, address_line1, city, state, zip, lat, lon,
                       created_at, updated_at, last_fetch_at, stale_after
                     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8, ?8, ?9)
                     ON CONFLICT (property_key) DO UPDATE SET
                       address_line1 = excluded.address_line1,
                       city          = excluded.city,
                       state         = excluded.state,
                       zip           = excluded.zip,
                       lat           = excluded.lat,
                       lon           = excluded.lon,
                       updated_at    = excluded.updated_at,
                       last_fetch_at = excluded.last_fetch_at,
                       stale_after   = excluded.stale_after
                     RETURNING id",
                    params![
                        input.property_key.as_str(),
                        input.address.line1,
                        input.address.city,
                        input.address.state,
                        input.address.zip,
                        input.lat,
                        input.lon,
                        now,
                        stale,
                    ],
                    |r| r.get(0),
                )?;

                let listing_row: i64 = tx.query_row(
                    "INSERT INTO listings (
                       property_id, provider, source_id, listing_id, status,
                       list_price, beds, baths, sqft, property_type,
                       created_at, updated_at, last_fetch_at, stale_after
                     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11, ?11, ?12)
                     ON CONFLICT (provider, source_id, listing_id) DO UPDATE SET
                       property_id   = excluded.property_id,
                       status        = excluded.status,
                       list_price    = excluded.list_price,
                       beds          = excluded.beds,
                       baths         = excluded.baths,
                       sqft          = excluded.sqft,
                       property_type = excluded.property_type,
                       updated_at    = excluded.updated_at,
                       last_fetch_at = excluded.last_fetch_at,
                       stale_after   = excluded.stale_after
                     RETURNING id",
                    params![
                        property_id,
                        input.provider,
                        input.source_id,
                        input.listing_id.as_deref().unwrap_or_default(),
                        input.status,
                        input.list_price.map(clamp_i64),
                        input.beds,
                        input.baths,
                        input.sqft,
                        input.property_type,
                        now,
                        stale,
                    ],
                    |r| r.get(0),
                )?;

                if !input.photos.is_empty() {
                    replace_photos_tx(&tx, listing_row, &input.photos, &now)?;
                }

                tx.execute(
                    "INSERT INTO raw_snapshots (
                       provider, endpoint, external_id, payload, payload_sha256, fetched_at
                     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        input.provider,
                        input.endpoint,
                        input.external_id,
                        &*input.payload,
                        digest,
                        now,
                    ],
                )?;

                tx.commit()?;
                Ok(UpsertResult {
                    property_id,
                    listing_id: listing_row,
                })
            })
            .await?;
        Ok(res)
    }

    async fn replace_photos(
        &self,
        provider_listing_id: String,
        photos: Vec<ListingPhotoInput>,
    ) -> Result<bool> {
        let (now, _) = self.stamps();
        let replaced = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let Some(row) = latest_listing_row(&tx, &provider_listing_id)? else {
                    return Ok(false);
                };
                replace_photos_tx(&tx, row, &photos, &now)?;
                tx.commit()?;
                Ok(true)
            })
            .await?;
        Ok(replaced)
    }

    async fn photos_for(&self, provider_listing_id: String) -> Result<Vec<String>> {
        let hrefs = self
            .conn
            .call(move |conn| {
                let Some(row) = latest_listing_row(conn, &provider_listing_id)? else {
                    return Ok(Vec::new());
                };
                let mut stmt = conn.prepare(
                    "SELECT href FROM listing_photos WHERE listing_id = ?1 ORDER BY position, id",
                )?;
                let hrefs = stmt
                    .query_map(params![row], |r| r.get(0))?
                    .collect::<rusqlite::Result<Vec<String>>>()?;
                Ok(hrefs)
            })
            .await?;
        Ok(hrefs)
    }

    async fn by_postal(&self, query: ListingQuery) -> Result<Vec<ListingRecord>> {
        let limit = if query.limit == 0 {
            ListingQuery::DEFAULT_LIMIT
        } else {
            query.limit
        };
        let records = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT p.property_key, p.address_line1, p.city, p.state, p.zip, p.lat, p.lon,
                            l.id, l.listing_id, l.list_price, l.beds, l.baths, l.sqft, l.property_type
                     FROM properties p
                     JOIN listings l ON l.property_id = p.id
                     WHERE p.zip = ?1 AND (?4 IS NULL OR l.property_type = ?4)
                     ORDER BY l.updated_at DESC, l.id DESC
                     LIMIT ?2 OFFSET ?3",
                )?;
                let mut records = stmt
                    .query_map(
                        params![query.postal_code, limit, query.offset, query.property_type],
                        |r| {
                            Ok(ListingRecord {
                                property_key: PropertyKey::from_raw(r.get::<_, String>(0)?),
                                address_line1: r.get(1)?,
                                city: r.get(2)?,
                                state: r.get(3)?,
                                zip: r.get(4)?,
                                lat: r.get(5)?,
                                lon: r.get(6)?,
                                listing_row_id: r.get(7)?,
                                listing_id: Some(r.get::<_, String>(8)?)
                                    .filter(|id| !id.is_empty()),
                                list_price: r
                                    .get::<_, Option<i64>>(9)?
                                    .and_then(|p| u64::try_from(p).ok()),
                                beds: r.get(10)?,
                                baths: r.get(11)?,
                                sqft: r.get(12)?,
                                property_type: r.get(13)?,
                                photos: Vec::new(),
                            })
                        },
                    )?
                    .collect::<rusqlite::Result<Vec<_>>>()?;

                let mut photo_stmt = conn.prepare(
                    "SELECT href FROM listing_photos WHERE listing_id = ?1 ORDER BY position, id",
                )?;
                for rec in &mut records {
                    rec.photos = photo_stmt
                        .query_map(params![rec.listing_row_id], |r| r.get(0))?
                        .collect::<rusqlite::Result<Vec<String>>>()?;
                }
                Ok(records)
            })
            .await?;
        Ok(records)
    }

    async fn key_for_listing(&self, provider_listing_id: String) -> Result<Option<PropertyKey>> {
        let key = self
            .conn
            .call(move |conn| {
                let key: Option<String> = conn
                    .query_row(
                        "SELECT p.property_key
                         FROM listings l
                         JOIN properties p ON p.id = l.property_id
                         WHERE l.listing_id = ?1 AND l.listing_id <> ''
                         ORDER BY l.updated_at DESC, l.id DESC
                         LIMIT 1",
                        params![provider_listing_id],
                        |r| r.get(0),
                    )
                    .optional()?;
                Ok(key)
            })
            .await?;
        Ok(key.map(PropertyKey::from_raw))
    }
}

fn encode_dt(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn clamp_i64(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

fn latest_listing_row(
    conn: &rusqlite::Connection,
    provider_listing_id: &str,
) -> rusqlite::Result<Option<i64>> {
    conn.query_row(
        "SELECT id FROM listings
         WHERE listing_id = ?1 AND listing_id <> ''
         ORDER BY updated_at DESC, id DESC LIMIT 1",
        params![provider_listing_id],
        |r| r.get(0),
    )
    .optional()
}

/// Delete-then-insert the photo set of one listing row inside `tx`.
///
/// Duplicate hrefs keep their first position; duplicate tag labels collapse.
fn replace_photos_tx(
    tx: &Transaction<'_>,
    listing_row: i64,
    photos: &[ListingPhotoInput],
    now: &str,
) -> rusqlite::Result<()> {
    tx.execute(
        "DELETE FROM listing_photos WHERE listing_id = ?1",
        params![listing_row],
    )?;
    let mut insert_photo = tx.prepare_cached(
        "INSERT INTO listing_photos (
           listing_id, href, description, title, kind, media_type, position, created_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT (listing_id, href) DO NOTHING",
    )?;
    let mut insert_tag = tx.prepare_cached(
        "INSERT INTO listing_photo_tags (photo_id, label) VALUES (?1, ?2)
         ON CONFLICT (photo_id, label) DO NOTHING",
    )?;
    for photo in photos.iter().filter(|p| !p.href.is_empty()) {
        let media_type = if photo.media_type.is_empty() {
            &photo.kind
        } else {
            &photo.media_type
        };
        let inserted = insert_photo.execute(params![
            listing_row,
            photo.href,
            photo.description,
            photo.title,
            photo.kind,
            media_type,
            photo.position,
            now,
        ])?;
        if inserted == 0 {
            continue;
        }
        let photo_id = tx.last_insert_rowid();
        for label in photo.tags.iter().filter(|l| !l.is_empty()) {
            insert_tag.execute(params![photo_id, label])?;
        }
    }
    Ok(())
}

#[async_trait]
impl PropertyStore for SqliteStore {
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "domus_store::upsert",
            skip(self, input),
            fields(property_key = %input.property_key),
        )
    )]
    async fn write_snapshot_and_upsert(
        &self,
        input: UpsertInput,
    ) -> Result<UpsertResult, DomusError> {
        Ok(self.upsert(input).await?)
    }

    async fn replace_listing_photos(
        &self,
        provider_listing_id: &str,
        photos: Vec<ListingPhotoInput>,
    ) -> Result<bool, DomusError> {
        Ok(self
            .replace_photos(provider_listing_id.to_string(), photos)
            .await?)
    }

    async fn listing_photos(&self, provider_listing_id: &str) -> Result<Vec<String>, DomusError> {
        Ok(self.photos_for(provider_listing_id.to_string()).await?)
    }

    async fn listings_by_postal(
        &self,
        query: &ListingQuery,
    ) -> Result<Vec<ListingRecord>, DomusError> {
        Ok(self.by_postal(query.clone()).await?)
    }

    async fn property_key_for_listing(
        &self,
        provider_listing_id: &str,
    ) -> Result<Option<PropertyKey>, DomusError> {
        Ok(self.key_for_listing(provider_listing_id.to_string()).await?)
    }
}
