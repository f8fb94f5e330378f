//! Canonical address identity.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Normalized address fields; see `domus_core::canon::canonicalize`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct CanonicalAddress {
    /// Street line with unit designators removed and suffixes abbreviated.
    pub line1: String,
    /// Uppercase city without punctuation.
    pub city: String,
    /// Two-letter USPS code when recognised, otherwise the uppercased input.
    pub state: String,
    /// First five characters of the postal code.
    pub zip: String,
}

impl CanonicalAddress {
    /// Derive the lookup key for these fields.
    #[must_use]
    pub fn property_key(&self) -> PropertyKey {
        PropertyKey(
            format!("{}|{}|{}|{}", self.line1, self.city, self.state, self.zip).to_lowercase(),
        )
    }

    /// True when `other` names the same street, city, and state.
    ///
    /// Zip is not compared: cold lookups already scope the search to one postal code.
    #[must_use]
    pub fn same_street(&self, other: &Self) -> bool {
        self.line1 == other.line1 && self.city == other.city && self.state == other.state
    }
}

/// Lowercase `line1|city|state|zip` identity string.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct PropertyKey(String);

impl PropertyKey {
    /// Cache key prefix for envelopes.
    pub const ENVELOPE_PREFIX: &'static str = "prop:pk:";
    /// Cache key prefix for negative markers.
    pub const MISS_PREFIX: &'static str = "prop:miss:";
    /// Cache key prefix for stampede locks.
    pub const LOCK_PREFIX: &'static str = "prop:lock:";

    /// Wrap an already-derived key (e.g. read back from storage).
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Borrow the key text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `prop:pk:<key>`
    #[must_use]
    pub fn envelope_key(&self) -> String {
        format!("{}{}", Self::ENVELOPE_PREFIX, self.0)
    }

    /// `prop:miss:<key>`
    #[must_use]
    pub fn miss_key(&self) -> String {
        format!("{}{}", Self::MISS_PREFIX, self.0)
    }

    /// `prop:lock:<key>`
    #[must_use]
    pub fn lock_key(&self) -> String {
        format!("{}{}", Self::LOCK_PREFIX, self.0)
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PropertyKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
