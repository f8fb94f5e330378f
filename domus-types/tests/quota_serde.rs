use std::time::Duration;

use domus_types::{QuotaConfig, QuotaState, RetryConfig};

#[test]
fn quota_config_roundtrip() {
    let cfg = QuotaConfig {
        requests_per_second: 1.5,
        burst: 4,
        daily_limit: 500,
    };

    let json = serde_json::to_string(&cfg).expect("serialize quota config");
    let de: QuotaConfig = serde_json::from_str(&json).expect("deserialize quota config");

    assert_eq!(de, cfg);
}

#[test]
fn quota_state_roundtrip() {
    let st = QuotaState {
        limit: 20_000,
        remaining: 321,
        reset_in: Duration::from_millis(8500),
    };

    let json = serde_json::to_string(&st).expect("serialize quota state");
    let de: QuotaState = serde_json::from_str(&json).expect("deserialize quota state");

    assert_eq!(de.limit, 20_000);
    assert_eq!(de.remaining, 321);
    assert_eq!(de.reset_in.as_millis(), 8500);
}

#[test]
fn defaults_match_provider_plan() {
    let q = QuotaConfig::default();
    assert!((q.requests_per_second - 3.0).abs() < f64::EPSILON);
    assert_eq!(q.burst, 3);
    assert_eq!(q.daily_limit, 20_000);

    let r = RetryConfig::default();
    assert_eq!(r.max_retries, 3);
    assert_eq!(r.backoff.min_backoff_ms, 100);
    assert_eq!(r.backoff.max_backoff_ms, 900);
}
