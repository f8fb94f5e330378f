use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for the domus workspace.
///
/// Covers input validation, quota admission, upstream provider failures,
/// payload mapping problems, and the storage backends used for write-behind.
#[derive(Debug, Error, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DomusError {
    /// A required input field was missing or malformed.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The daily budget is exhausted or the provider signalled "too many requests".
    #[error("quota exceeded: remaining={remaining} reset_in_ms={reset_in_ms}")]
    QuotaExceeded {
        /// Remaining units at the time of rejection.
        remaining: u64,
        /// Milliseconds until the budget resets (0 when unknown).
        reset_in_ms: u64,
    },

    /// The provider answered with a non-success status, or the transport failed.
    #[error("upstream error (status {status:?}): {msg}")]
    Upstream {
        /// HTTP status code, `None` for transport-level failures.
        status: Option<u16>,
        /// Human-readable error message.
        msg: String,
    },

    /// The provider payload did not have the expected shape.
    #[error("mapping error: {0}")]
    Mapping(String),

    /// A resource could not be found.
    #[error("not found: {what}")]
    NotFound {
        /// Description of the missing resource.
        what: String,
    },

    /// The relational store rejected or failed a write or read.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// The key-value cache store failed.
    #[error("cache error: {0}")]
    Cache(String),

    /// An individual provider call exceeded its deadline.
    #[error("provider timed out: {operation} via {connector}")]
    ProviderTimeout {
        /// Connector name that timed out.
        connector: String,
        /// Operation label (e.g. "search", "photos").
        operation: String,
    },

    /// The surrounding run was cancelled.
    #[error("cancelled")]
    Cancelled,

    /// Invalid configuration supplied at construction time.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl DomusError {
    /// Helper: build a `Validation` error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Helper: build an `Upstream` error carrying an HTTP status.
    pub fn upstream(status: u16, msg: impl Into<String>) -> Self {
        Self::Upstream {
            status: Some(status),
            msg: msg.into(),
        }
    }

    /// Helper: build an `Upstream` error for a transport failure (no status).
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Upstream {
            status: None,
            msg: msg.into(),
        }
    }

    /// Helper: build a `NotFound` error for a description of the missing resource.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Helper: build a `Persistence` error.
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Helper: build a `Cache` error.
    pub fn cache(msg: impl Into<String>) -> Self {
        Self::Cache(msg.into())
    }

    /// Helper: build a `ProviderTimeout` error.
    pub fn provider_timeout(connector: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::ProviderTimeout {
            connector: connector.into(),
            operation: operation.into(),
        }
    }

    /// Returns true for the quota condition, whether raised locally or by the provider.
    #[must_use]
    pub const fn is_quota(&self) -> bool {
        matches!(self, Self::QuotaExceeded { .. })
    }

    /// Returns true for a benign not-found outcome.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true if a retry could plausibly succeed.
    ///
    /// Only transport failures and 5xx responses qualify. Quota, mapping and
    /// 4xx failures are terminal.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Upstream { status: None, .. } => true,
            Self::Upstream {
                status: Some(code), ..
            } => (500..600).contains(code),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for DomusError {
    fn from(err: serde_json::Error) -> Self {
        Self::Mapping(err.to_string())
    }
}
