//! domus-middleware
//!
//! Connector wrappers applied around every outbound provider call:
//!
//! - [`QuotaAwareConnector`]: admits a call only through the shared [`QuotaGate`]
//!   (token-bucket rate plus UTC-day budget).
//! - [`RetryingConnector`]: bounded exponential backoff for transport and 5xx failures.
//! - [`ConnectorBuilder`]: composes the layers so retry sits outside the quota gate,
//!   which makes every attempt consume budget.

mod builder;
mod quota;
mod retry;

pub use crate::builder::ConnectorBuilder;
pub use crate::quota::{QuotaAwareConnector, QuotaGate, QuotaMiddleware};
pub use crate::retry::{RetryMiddleware, RetryingConnector, backoff_delay_ms, jitter_wait};
