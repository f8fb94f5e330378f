use std::time::Duration;

use domus_core::connector::{ListingConnector, SearchRequest};
use domus_core::{Clock, DomusError};
use domus_mock::{DynamicMockConnector, ManualClock, MockBehavior, MockConnector};

#[tokio::test]
async fn fixture_pages_are_sliced() {
    let mock = MockConnector::new();
    let first = mock
        .search_by_postal(&SearchRequest::new("78701", 1, 5))
        .await
        .unwrap();
    let second = mock
        .search_by_postal(&SearchRequest::new("78701", 2, 5))
        .await
        .unwrap();
    assert_eq!(first.len(), 5);
    assert_eq!(second.len(), 2);
    assert_eq!(mock.search_calls(), 2);
}

#[tokio::test]
async fn unknown_zip_is_empty() {
    let mock = MockConnector::new();
    let page = mock
        .search_by_postal(&SearchRequest::new("99999", 1, 20))
        .await
        .unwrap();
    assert!(page.is_empty());
}

#[tokio::test]
async fn scripted_behaviors_run_before_rules() {
    let (conn, ctl) = DynamicMockConnector::new_with_controller("dyn");
    ctl.set_listings("62704", MockConnector::fixture_listings("62704"))
        .await;
    ctl.push_search(MockBehavior::Fail(DomusError::upstream(503, "boom")))
        .await;

    let req = SearchRequest::new("62704", 1, 20);
    let err = conn.search_by_postal(&req).await.unwrap_err();
    assert!(err.is_retryable());

    let page = conn.search_by_postal(&req).await.unwrap();
    assert_eq!(page.len(), 3);
    assert_eq!(ctl.search_calls().await, 2);
}

#[tokio::test(start_paused = true)]
async fn hang_never_resolves() {
    let (conn, ctl) = DynamicMockConnector::new_with_controller("dyn");
    ctl.set_page_behavior("62704", 1, MockBehavior::Hang).await;
    let req = SearchRequest::new("62704", 1, 20);
    let res = tokio::time::timeout(Duration::from_secs(5), conn.search_by_postal(&req)).await;
    assert!(res.is_err());
}

#[test]
fn manual_clock_advances_only_on_demand() {
    let clock = ManualClock::at(2025, 1, 31, 23, 59, 0);
    let start = clock.now();
    assert_eq!(clock.now(), start);
    clock.advance(Duration::from_secs(120));
    assert_eq!((clock.now() - start).num_seconds(), 120);
}
