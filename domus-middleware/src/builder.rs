//! Builder for composing connectors with middleware layers.
//!
//! # Middleware Ordering Convention
//!
//! Middleware layers form an "onion" around the raw connector:
//!
//! ```text
//! Caller
//!     ↓
//! Retry      (re-issues transport/5xx failures)
//!     ↓
//! Quota      (admits each attempt through the shared gate)
//!     ↓
//! Raw connector (performs the HTTP call)
//! ```
//!
//! The quota layer always sits directly around the raw connector so every
//! retry attempt is admitted, and charged, individually.
//!
//! ## Storage vs Application Order
//!
//! The `layers` vector stores middleware in **outermost-first** order and they are
//! **applied in reverse** during `build()`:
//!
//! ```text
//! builder.with_retry(..).with_quota(..)
//!
//! Storage: [Retry, Quota]
//! Applied: Raw -> Quota -> Retry
//! Result:  Retry(Quota(Raw))
//! ```

use std::sync::Arc;

use domus_core::Middleware;
use domus_core::connector::ListingConnector;
use domus_types::RetryConfig;
use serde_json::json;

use crate::quota::{QuotaGate, QuotaMiddleware};
use crate::retry::RetryMiddleware;

const QUOTA: &str = "QuotaAwareConnector";
const RETRY: &str = "RetryingConnector";

/// Generic middleware builder for composing a connector with layered wrappers.
///
/// See [module-level documentation](self) for details on middleware ordering.
pub struct ConnectorBuilder {
    raw: Arc<dyn ListingConnector>,
    /// Middleware layers in outermost-first order.
    layers: Vec<Box<dyn Middleware>>,
}

impl ConnectorBuilder {
    /// Create a new builder from a raw, unwrapped connector.
    #[must_use]
    pub fn new(raw: Arc<dyn ListingConnector>) -> Self {
        Self {
            raw,
            layers: Vec::new(),
        }
    }

    /// Add or replace the quota gate.
    ///
    /// The quota layer is placed innermost, directly around the raw connector.
    #[must_use]
    pub fn with_quota(mut self, gate: Arc<QuotaGate>) -> Self {
        self.layers.retain(|m| m.name() != QUOTA);
        self.layers.push(Box::new(QuotaMiddleware::new(gate)));
        self
    }

    /// Remove quota if present.
    #[must_use]
    pub fn without_quota(mut self) -> Self {
        self.layers.retain(|m| m.name() != QUOTA);
        self
    }

    /// Add or replace the retry policy at the outermost position.
    #[must_use]
    pub fn with_retry(mut self, cfg: RetryConfig) -> Self {
        self.layers.retain(|m| m.name() != RETRY);
        self.layers.insert(0, Box::new(RetryMiddleware::new(cfg)));
        self
    }

    /// Remove retry if present.
    #[must_use]
    pub fn without_retry(mut self) -> Self {
        self.layers.retain(|m| m.name() != RETRY);
        self
    }

    /// Add an arbitrary middleware layer at the outermost position.
    #[must_use]
    pub fn layer(mut self, layer: Box<dyn Middleware>) -> Self {
        self.layers.insert(0, layer);
        self
    }

    /// Layer names and configs, outermost first, ending with the raw connector.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut out: Vec<serde_json::Value> = self
            .layers
            .iter()
            .map(|l| json!({ "name": l.name(), "config": l.config_json() }))
            .collect();
        out.push(json!({ "name": "RawConnector", "config": { "name": self.raw.name() } }));
        serde_json::Value::Array(out)
    }

    /// Build the wrapped connector, applying layers innermost first.
    #[must_use]
    pub fn build(self) -> Arc<dyn ListingConnector> {
        let mut acc: Arc<dyn ListingConnector> = Arc::clone(&self.raw);
        for m in self.layers.into_iter().rev() {
            acc = m.apply(acc);
        }
        acc
    }
}
