//! Tests for `SqliteStore` against an in-memory database and for the memory cache.

use std::sync::Arc;
use std::time::Duration;

use domus_core::canonicalize;
use domus_core::store::{ListingPhotoInput, ListingQuery, PropertyStore, UpsertInput};
use domus_core::{CacheStore, DomusError};

use crate::{MemoryCacheStore, SqliteStore};

async fn store() -> SqliteStore {
    SqliteStore::open_in_memory()
        .await
        .expect("in-memory store")
}

async fn count(s: &SqliteStore, table: &'static str) -> i64 {
    s.connection()
        .call(move |c| {
            Ok(c.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| {
                r.get(0)
            })?)
        })
        .await
        .unwrap()
}

fn input(line1: &str, zip: &str, listing_id: &str) -> UpsertInput {
    let (address, property_key) = canonicalize(line1, "Springfield", "IL", zip);
    UpsertInput {
        property_key,
        address,
        lat: Some(39.78),
        lon: Some(-89.65),
        provider: "rapidapi.realtor16".into(),
        source_id: listing_id.into(),
        listing_id: Some(listing_id.into()),
        status: "for_sale".into(),
        list_price: Some(250_000),
        beds: Some(3),
        baths: Some(2.0),
        sqft: Some(1_800),
        property_type: Some("single_family".into()),
        photos: Vec::new(),
        endpoint: "search/forsale".into(),
        external_id: zip.into(),
        payload: Arc::from(&b"{\"properties\":[]}"[..]),
    }
}

fn photo(href: &str, tags: &[&str]) -> ListingPhotoInput {
    ListingPhotoInput {
        href: href.into(),
        kind: "photo".into(),
        tags: tags.iter().map(|t| (*t).to_string()).collect(),
        ..ListingPhotoInput::default()
    }
}

// ─── Upsert ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn upsert_is_idempotent_on_ids() {
    let s = store().await;
    let first = s
        .write_snapshot_and_upsert(input("123 Main St", "62704", "L-1"))
        .await
        .unwrap();
    let mut again = input("123 Main Street", "62704", "L-1");
    again.list_price = Some(240_000);
    let second = s.write_snapshot_and_upsert(again).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(count(&s, "properties").await, 1);
    assert_eq!(count(&s, "listings").await, 1);
    assert_eq!(count(&s, "raw_snapshots").await, 2);

    let rows = s.listings_by_postal(&ListingQuery::new("62704")).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].list_price, Some(240_000));
}

#[tokio::test]
async fn snapshot_records_payload_digest() {
    let s = store().await;
    s.write_snapshot_and_upsert(input("1 Elm St", "62704", "L-9"))
        .await
        .unwrap();
    let (digest, len): (String, i64) = s
        .connection()
        .call(|c| {
            Ok(c.query_row(
                "SELECT payload_sha256, length(payload) FROM raw_snapshots",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )?)
        })
        .await
        .unwrap();
    assert_eq!(digest.len(), 64);
    assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(len, 17);
}

#[tokio::test]
async fn failed_upsert_rolls_back_every_row() {
    let s = store().await;
    s.connection()
        .call(|c| {
            c.execute_batch(
                "CREATE TRIGGER reject_snapshots BEFORE INSERT ON raw_snapshots
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )?;
            Ok(())
        })
        .await
        .unwrap();

    let mut inp = input("5 Oak Ave", "62704", "L-2");
    inp.photos = vec![photo("https://img/a.jpg", &["kitchen"])];
    let err = s.write_snapshot_and_upsert(inp).await.unwrap_err();
    assert!(matches!(err, DomusError::Persistence(_)));

    assert_eq!(count(&s, "properties").await, 0);
    assert_eq!(count(&s, "listings").await, 0);
    assert_eq!(count(&s, "listing_photos").await, 0);
}

#[tokio::test]
async fn upsert_without_photos_keeps_stored_photos() {
    let s = store().await;
    let mut inp = input("8 Pine Rd", "62704", "L-3");
    inp.photos = vec![photo("https://img/a.jpg", &[])];
    s.write_snapshot_and_upsert(inp).await.unwrap();
    s.write_snapshot_and_upsert(input("8 Pine Rd", "62704", "L-3"))
        .await
        .unwrap();
    assert_eq!(
        s.listing_photos("L-3").await.unwrap(),
        vec!["https://img/a.jpg".to_string()]
    );
}

#[tokio::test]
async fn listing_without_provider_id_is_upserted_in_place() {
    let s = store().await;
    let idless = || {
        let mut inp = input("8 Birch Ln", "62704", "");
        inp.listing_id = None;
        inp.photos = vec![photo("https://img/birch.jpg", &[])];
        inp
    };
    let first = s.write_snapshot_and_upsert(idless()).await.unwrap();
    let second = s.write_snapshot_and_upsert(idless()).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(count(&s, "listings").await, 1);
    assert_eq!(count(&s, "listing_photos").await, 1);

    let rows = s.listings_by_postal(&ListingQuery::new("62704")).await.unwrap();
    assert_eq!(rows[0].listing_id, None);
    assert!(s.listing_photos("").await.unwrap().is_empty());
    assert_eq!(s.property_key_for_listing("").await.unwrap(), None);
}

// ─── Photos ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn replacing_photos_twice_converges() {
    let s = store().await;
    let mut inp = input("10 Lake Dr", "62704", "L-4");
    inp.photos = vec![
        photo("https://img/a.jpg", &["house_view", "house_view"]),
        photo("https://img/b.jpg", &["yard"]),
    ];
    s.write_snapshot_and_upsert(inp).await.unwrap();
    assert_eq!(count(&s, "listing_photo_tags").await, 2);

    let next = vec![
        photo("https://img/b.jpg", &["yard", "yard"]),
        photo("https://img/c.jpg", &["garage"]),
        photo("https://img/c.jpg", &["duplicate"]),
        photo("", &["ignored"]),
    ];
    assert!(s.replace_listing_photos("L-4", next.clone()).await.unwrap());
    assert!(s.replace_listing_photos("L-4", next).await.unwrap());

    assert_eq!(
        s.listing_photos("L-4").await.unwrap(),
        vec!["https://img/b.jpg".to_string(), "https://img/c.jpg".to_string()]
    );
    assert_eq!(count(&s, "listing_photos").await, 2);
    assert_eq!(count(&s, "listing_photo_tags").await, 2);
}

#[tokio::test]
async fn replacing_photos_for_unknown_listing_is_a_no_op() {
    let s = store().await;
    let replaced = s
        .replace_listing_photos("missing", vec![photo("https://img/a.jpg", &[])])
        .await
        .unwrap();
    assert!(!replaced);
    assert_eq!(count(&s, "listing_photos").await, 0);
    assert!(s.listing_photos("missing").await.unwrap().is_empty());
}

#[tokio::test]
async fn media_type_defaults_to_kind() {
    let s = store().await;
    let mut inp = input("11 Lake Dr", "62704", "L-5");
    inp.photos = vec![photo("https://img/a.jpg", &[])];
    s.write_snapshot_and_upsert(inp).await.unwrap();
    let media: String = s
        .connection()
        .call(|c| {
            Ok(c.query_row("SELECT media_type FROM listing_photos", [], |r| {
                r.get(0)
            })?)
        })
        .await
        .unwrap();
    assert_eq!(media, "photo");
}

// ─── Reads ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn listings_by_postal_newest_first_with_photos() {
    let s = store().await;
    let mut a = input("1 First St", "62704", "L-10");
    a.photos = vec![photo("https://img/1a.jpg", &[]), photo("https://img/1b.jpg", &[])];
    s.write_snapshot_and_upsert(a).await.unwrap();
    let mut b = input("2 Second St", "62704", "L-11");
    b.property_type = Some("condos".into());
    s.write_snapshot_and_upsert(b).await.unwrap();
    s.write_snapshot_and_upsert(input("3 Third St", "10001", "L-12"))
        .await
        .unwrap();

    let rows = s.listings_by_postal(&ListingQuery::new("62704")).await.unwrap();
    let ids: Vec<_> = rows.iter().map(|r| r.listing_id.clone().unwrap()).collect();
    assert_eq!(ids, vec!["L-11", "L-10"]);
    assert_eq!(
        rows[1].photos,
        vec!["https://img/1a.jpg".to_string(), "https://img/1b.jpg".to_string()]
    );

    let card = rows[1].clone().into_card();
    assert_eq!(card.source, "database");
    assert_eq!(card.address, "1 FIRST ST");
    assert_eq!(card.images.len(), 2);

    let mut condos = ListingQuery::new("62704");
    condos.property_type = Some("condos".into());
    let rows = s.listings_by_postal(&condos).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].listing_id.as_deref(), Some("L-11"));

    let mut paged = ListingQuery::new("62704");
    paged.limit = 1;
    paged.offset = 1;
    let rows = s.listings_by_postal(&paged).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].listing_id.as_deref(), Some("L-10"));
}

#[tokio::test]
async fn property_key_lookup_by_listing_id() {
    let s = store().await;
    let inp = input("123 Main St", "62704", "L-20");
    let key = inp.property_key.clone();
    s.write_snapshot_and_upsert(inp).await.unwrap();

    assert_eq!(s.property_key_for_listing("L-20").await.unwrap(), Some(key));
    assert_eq!(s.property_key_for_listing("nope").await.unwrap(), None);
}

#[tokio::test]
async fn file_backed_store_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("domus.db");
    {
        let s = SqliteStore::open(&path).await.unwrap();
        s.write_snapshot_and_upsert(input("4 Fourth St", "62704", "L-30"))
            .await
            .unwrap();
    }
    let s = SqliteStore::open(&path).await.unwrap();
    let rows = s.listings_by_postal(&ListingQuery::new("62704")).await.unwrap();
    assert_eq!(rows.len(), 1);
}

// ─── Memory cache ────────────────────────────────────────────────────────────

#[tokio::test]
async fn memory_cache_entries_expire() {
    let c = MemoryCacheStore::default();
    c.set("k", "v".into(), Duration::from_millis(50)).await.unwrap();
    assert_eq!(c.get("k").await.unwrap().as_deref(), Some("v"));
    assert!(c.exists("k").await.unwrap());

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(c.get("k").await.unwrap(), None);
    assert!(!c.exists("k").await.unwrap());
}

#[tokio::test]
async fn memory_cache_set_replaces_value_and_ttl() {
    let c = MemoryCacheStore::default();
    c.set("k", "old".into(), Duration::from_millis(50)).await.unwrap();
    c.set("k", "new".into(), Duration::from_secs(60)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(c.get("k").await.unwrap().as_deref(), Some("new"));
}

#[tokio::test]
async fn set_if_absent_admits_exactly_one_caller() {
    let c = MemoryCacheStore::default();
    let mut tasks = Vec::new();
    for i in 0..16 {
        let c = c.clone();
        tasks.push(tokio::spawn(async move {
            c.set_if_absent("lock", format!("holder-{i}"), Duration::from_secs(8))
                .await
                .unwrap()
        }));
    }
    let mut winners = 0;
    for t in tasks {
        if t.await.unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
    assert!(
        !c.set_if_absent("lock", "late".into(), Duration::from_secs(8))
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn set_if_absent_succeeds_after_expiry() {
    let c = MemoryCacheStore::default();
    assert!(
        c.set_if_absent("lock", "a".into(), Duration::from_millis(50))
            .await
            .unwrap()
    );
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(
        c.set_if_absent("lock", "b".into(), Duration::from_millis(50))
            .await
            .unwrap()
    );
}
