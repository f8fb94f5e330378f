mod helpers;

use std::sync::Arc;

use domus::{EventPublisher, Hydrator, InMemoryPublisher, LISTING_STATUS, PropertyCard, canonicalize};
use helpers::*;

fn card() -> PropertyCard {
    PropertyCard {
        id: "L-7".into(),
        address: "7 Elm Street".into(),
        city: "Springfield".into(),
        state: "IL".into(),
        zip: "62704".into(),
        kind: "condos".into(),
        price: 150_000,
        beds: 0,
        baths: 2,
        sqft: 0,
        images: vec!["https://img.example/7-a.jpg".into(), String::new()],
        coords: [-89.6, 39.8],
        ..PropertyCard::default()
    }
}

#[tokio::test]
async fn zero_fields_are_stored_as_absent() {
    let store = Arc::new(RecordingStore::default());
    let hydrator = Hydrator::new(store.clone());
    let c = card();
    let (address, key) = canonicalize(&c.address, &c.city, &c.state, &c.zip);

    hydrator
        .write("prov", "search/forsale", Arc::from(&b"{}"[..]), &address, &key, &c)
        .await
        .unwrap();

    let written = store.upserts();
    assert_eq!(written.len(), 1);
    let input = &written[0];
    assert_eq!(input.property_key, key);
    assert_eq!(input.address.line1, "7 ELM ST");
    assert_eq!(input.status, LISTING_STATUS);
    assert_eq!(input.listing_id.as_deref(), Some("L-7"));
    assert_eq!(input.source_id, "L-7");
    assert_eq!(input.external_id, "L-7");
    assert_eq!(input.list_price, Some(150_000));
    assert_eq!(input.beds, None);
    assert_eq!(input.baths, Some(2.0));
    assert_eq!(input.sqft, None);
    assert_eq!(input.property_type.as_deref(), Some("condos"));
    assert_eq!(input.lon, Some(-89.6));
    assert_eq!(input.lat, Some(39.8));
    assert_eq!(input.photos.len(), 1);
    assert_eq!(&*input.payload, b"{}");
}

#[tokio::test]
async fn every_write_is_announced() {
    let publisher = Arc::new(InMemoryPublisher::new(4));
    let mut events = publisher.subscribe().unwrap();
    let hydrator = Hydrator::new(Arc::new(RecordingStore::default()))
        .with_publisher(Arc::clone(&publisher) as Arc<dyn EventPublisher>);
    let c = card();
    let (address, key) = canonicalize(&c.address, &c.city, &c.state, &c.zip);

    for _ in 0..2 {
        hydrator
            .write("prov", "ep", Arc::from(&b"[]"[..]), &address, &key, &c)
            .await
            .unwrap();
    }

    let first = events.recv().await.unwrap();
    let second = events.recv().await.unwrap();
    assert_eq!(first.property_key, key);
    assert_eq!((first.property_id, second.property_id), (1, 2));
}
