//! Layered settings for the `hydrator` binary.
//!
//! Values come from an optional TOML file, then from `HYDRATOR_*` environment
//! variables. Every value is read as text so that humane durations (`"1500ms"`,
//! `"1h30m"`) and delimited lists (`"62704; 78701"`) work from either source.
//! Unparseable numbers, durations, and booleans fall back to their defaults.

use std::path::Path;
use std::time::Duration;

use domus_core::DomusError;
use domus_types::{DEFAULT_ENDPOINT, DEFAULT_PROVIDER, HydrateConfig, ListingFilters, QuotaConfig};
use serde::Deserialize;

/// Environment prefix shared by every setting.
pub const ENV_PREFIX: &str = "HYDRATOR";

/// Re-run period when none is configured.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(6 * 60 * 60);
/// Delay between page fetches when none is configured.
pub const DEFAULT_PAUSE: Duration = Duration::from_millis(1500);
/// Per-call deadline when none is configured.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(12);

/// A list given either as one delimited string or as a TOML array.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ListSetting {
    /// `"a, b; c"`.
    Joined(String),
    /// `["a", "b"]`.
    Items(Vec<String>),
}

impl ListSetting {
    fn values(&self) -> Vec<String> {
        match self {
            Self::Joined(s) => split_list(s),
            Self::Items(items) => items.iter().flat_map(|s| split_list(s)).collect(),
        }
    }
}

/// Raw, unparsed hydrator settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HydratorSettings {
    /// Postal codes to ingest.
    pub zips: Option<ListSetting>,
    /// Property types crossed with every zip.
    pub property_types: Option<ListSetting>,
    /// Re-run period.
    pub interval: Option<String>,
    /// Results per page.
    pub page_size: Option<String>,
    /// Page cap per (zip, type).
    pub max_pages: Option<String>,
    /// Delay between page fetches.
    pub pause: Option<String>,
    /// Per-call deadline.
    pub request_timeout: Option<String>,
    /// Fetch photos for listings without images.
    pub fetch_photos: Option<String>,
    /// Run a single pass and exit.
    pub run_once: Option<String>,
    /// Provider-side ordering.
    pub order_by: Option<String>,
    /// Provider label stored with listings.
    pub provider: Option<String>,
    /// Endpoint label stored with snapshots.
    pub endpoint: Option<String>,
    /// Minimum bedrooms.
    pub min_beds: Option<String>,
    /// Minimum bathrooms.
    pub min_baths: Option<String>,
    /// Minimum list price.
    pub min_price: Option<String>,
    /// Maximum list price.
    pub max_price: Option<String>,
    /// Sustained provider request rate.
    pub requests_per_second: Option<String>,
    /// Rate limiter burst.
    pub burst: Option<String>,
    /// Calls allowed per UTC day.
    pub daily_limit: Option<String>,
}

impl HydratorSettings {
    /// Load from `file` (if given and present) and the `HYDRATOR_*` environment.
    ///
    /// # Errors
    /// Returns `Config` when the file is malformed or a value has the wrong shape.
    pub fn load(file: Option<&Path>) -> Result<Self, DomusError> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX))
            .build()
            .and_then(config::Config::try_deserialize)
            .map_err(|e| DomusError::Config(format!("hydrator settings: {e}")))
    }

    /// True when only a single pass should run.
    #[must_use]
    pub fn run_once(&self) -> bool {
        parse_bool(self.run_once.as_deref(), false)
    }

    /// Bulk job configuration with binary defaults applied.
    ///
    /// # Errors
    /// Returns `Config` when no zip is configured.
    pub fn hydrate_config(&self) -> Result<HydrateConfig, DomusError> {
        let zips = self.zips.as_ref().map(ListSetting::values).unwrap_or_default();
        if zips.is_empty() {
            return Err(DomusError::Config(format!(
                "{ENV_PREFIX}_ZIPS must be provided"
            )));
        }
        let defaults = HydrateConfig::default();
        let interval = parse_duration(self.interval.as_deref(), DEFAULT_INTERVAL);
        Ok(HydrateConfig {
            zips,
            property_types: self
                .property_types
                .as_ref()
                .map(ListSetting::values)
                .unwrap_or_default(),
            page_size: parse_num(self.page_size.as_deref(), defaults.page_size),
            max_pages: parse_num(self.max_pages.as_deref(), defaults.max_pages),
            interval: (!self.run_once() && !interval.is_zero()).then_some(interval),
            pause: parse_duration(self.pause.as_deref(), DEFAULT_PAUSE),
            request_timeout: parse_duration(self.request_timeout.as_deref(), DEFAULT_REQUEST_TIMEOUT),
            fetch_photos: parse_bool(self.fetch_photos.as_deref(), false),
            provider: text_or(self.provider.as_deref(), DEFAULT_PROVIDER),
            endpoint: text_or(self.endpoint.as_deref(), DEFAULT_ENDPOINT),
            order_by: self
                .order_by
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            filters: ListingFilters {
                min_beds: parse_num(self.min_beds.as_deref(), 0),
                min_baths: parse_num(self.min_baths.as_deref(), 0),
                min_price: parse_num(self.min_price.as_deref(), 0),
                max_price: parse_num(self.max_price.as_deref(), 0),
            },
        })
    }

    /// Quota gate configuration; unset knobs keep the library defaults.
    #[must_use]
    pub fn quota_config(&self) -> QuotaConfig {
        let defaults = QuotaConfig::default();
        QuotaConfig {
            requests_per_second: parse_num(
                self.requests_per_second.as_deref(),
                defaults.requests_per_second,
            ),
            burst: parse_num(self.burst.as_deref(), defaults.burst),
            daily_limit: parse_num(self.daily_limit.as_deref(), defaults.daily_limit),
        }
    }
}

fn text_or(v: Option<&str>, default: &str) -> String {
    v.map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(default)
        .to_string()
}

/// Split on `,` `;` newline, carriage return, and tab; trim; drop blanks.
#[must_use]
pub fn split_list(v: &str) -> Vec<String> {
    v.split([',', ';', '\n', '\r', '\t'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_num<T: std::str::FromStr>(v: Option<&str>, default: T) -> T {
    v.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Accepts `1`/`true`/`yes`/`y`/`on` and their negatives, case-insensitively.
#[must_use]
pub fn parse_bool(v: Option<&str>, default: bool) -> bool {
    let Some(v) = v.map(|s| s.trim().to_ascii_lowercase()) else {
        return default;
    };
    match v.as_str() {
        "1" | "true" | "yes" | "y" | "on" => true,
        "0" | "false" | "no" | "n" | "off" => false,
        _ => default,
    }
}

/// Parse `"1500ms"`, `"1h30m"`, `"2.5s"`, or bare integer seconds.
#[must_use]
pub fn parse_duration(v: Option<&str>, default: Duration) -> Duration {
    let Some(v) = v.map(str::trim).filter(|s| !s.is_empty()) else {
        return default;
    };
    if let Ok(secs) = v.parse::<u64>() {
        return Duration::from_secs(secs);
    }
    humane_duration(v).unwrap_or(default)
}

fn humane_duration(v: &str) -> Option<Duration> {
    let mut total = 0f64;
    let mut rest = v;
    while !rest.is_empty() {
        let num_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if num_len == 0 {
            return None;
        }
        let value: f64 = rest[..num_len].parse().ok()?;
        rest = &rest[num_len..];
        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let scale = match &rest[..unit_len] {
            "ns" => 1e-9,
            "us" | "µs" => 1e-6,
            "ms" => 1e-3,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            _ => return None,
        };
        rest = &rest[unit_len..];
        total += value * scale;
    }
    Duration::try_from_secs_f64(total).ok()
}
