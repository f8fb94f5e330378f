//! domus-rapid
//!
//! `ListingConnector` for the RapidAPI realtor provider. Performs raw HTTP only:
//! quota and retry are applied by wrapping it with `domus-middleware` layers.
#![warn(missing_docs)]

/// Payload mapping into `PropertyCard` and `PhotoAsset`.
pub mod mapper;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use domus_core::connector::{ListingConnector, SearchPage, SearchRequest};
use domus_core::{DomusError, PhotoAsset};
use reqwest::header::ACCEPT;
use reqwest::{Client, Response, StatusCode};
use url::Url;

/// Connection settings for the RapidAPI realtor endpoints.
#[derive(Debug, Clone)]
pub struct RapidConfig {
    /// Value sent as `X-RapidAPI-Key`.
    pub api_key: String,
    /// Scheme and host the endpoint paths are appended to.
    pub base_url: String,
    /// Value sent as `X-RapidAPI-Host`.
    pub host: String,
    /// Whole-request HTTP timeout.
    pub http_timeout: Duration,
    /// Maximum accepted search response body, in bytes.
    pub search_body_limit: usize,
    /// Maximum accepted photos response body, in bytes.
    pub photos_body_limit: usize,
}

impl RapidConfig {
    /// Default base URL.
    pub const DEFAULT_BASE_URL: &'static str = "https://realtor16.p.rapidapi.com";
    /// Default RapidAPI host header.
    pub const DEFAULT_HOST: &'static str = "realtor16.p.rapidapi.com";

    /// Defaults with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Point at a different base URL (e.g. a local test server).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl Default for RapidConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            host: Self::DEFAULT_HOST.to_string(),
            http_timeout: Duration::from_secs(8),
            search_body_limit: 4 << 20,
            photos_body_limit: 6 << 20,
        }
    }
}

/// HTTP connector for the RapidAPI realtor provider.
pub struct RapidConnector {
    client: Client,
    config: RapidConfig,
}

impl RapidConnector {
    /// Connector name used in logs and error attribution.
    pub const NAME: &'static str = "domus-rapid";

    /// Build a connector with its own HTTP client.
    ///
    /// # Errors
    /// Returns `DomusError::Config` when the API key is empty or the HTTP client
    /// cannot be constructed.
    pub fn new(config: RapidConfig) -> Result<Self, DomusError> {
        if config.api_key.trim().is_empty() {
            return Err(DomusError::Config("rapidapi key is required".into()));
        }
        let client = Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| DomusError::Config(format!("http client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Convenience: wrap in an `Arc<dyn ListingConnector>`.
    ///
    /// # Errors
    /// As for [`new`](Self::new).
    pub fn new_arc(config: RapidConfig) -> Result<Arc<dyn ListingConnector>, DomusError> {
        Ok(Arc::new(Self::new(config)?))
    }

    fn endpoint(&self, path: &str, params: &[(&str, String)]) -> Result<Url, DomusError> {
        let base = self.config.base_url.trim_end_matches('/');
        Url::parse_with_params(&format!("{base}/{path}"), params)
            .map_err(|e| DomusError::Config(format!("invalid base url: {e}")))
    }

    async fn fetch(&self, url: Url, limit: usize) -> Result<Vec<u8>, DomusError> {
        let resp = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .header("X-RapidAPI-Key", &self.config.api_key)
            .header("X-RapidAPI-Host", &self.config.host)
            .send()
            .await
            .map_err(|e| DomusError::transport(e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(DomusError::QuotaExceeded {
                remaining: 0,
                reset_in_ms: 0,
            });
        }
        if status.as_u16() >= 400 {
            let body = read_limited(resp, limit)
                .await
                .map(|b| String::from_utf8_lossy(&b).into_owned())
                .unwrap_or_default();
            return Err(DomusError::upstream(
                status.as_u16(),
                format!("rapidapi error {}: {body}", status.as_u16()),
            ));
        }
        read_limited(resp, limit).await
    }
}

async fn read_limited(mut resp: Response, limit: usize) -> Result<Vec<u8>, DomusError> {
    let status = resp.status().as_u16();
    let mut buf = Vec::new();
    while let Some(chunk) = resp
        .chunk()
        .await
        .map_err(|e| DomusError::transport(e.to_string()))?
    {
        if buf.len() + chunk.len() > limit {
            return Err(DomusError::upstream(status, "payload too large"));
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf)
}

/// Query string for one search page. Optional type, ordering, and filters
/// are sent only when set; zero-valued filters are omitted.
fn search_params(req: &SearchRequest) -> Vec<(&'static str, String)> {
    let page = req.page.max(1);
    let size = if req.page_size == 0 { 5 } else { req.page_size };
    let mut params = vec![
        ("location", req.postal_code.clone()),
        ("page", page.to_string()),
        ("limit", size.to_string()),
    ];
    if let Some(t) = &req.property_type {
        params.push(("property_type", t.clone()));
    }
    if let Some(o) = &req.order_by {
        params.push(("sort", o.clone()));
    }
    let f = &req.filters;
    let filters = [
        ("beds_min", u64::from(f.min_beds)),
        ("baths_min", u64::from(f.min_baths)),
        ("price_min", f.min_price),
        ("price_max", f.max_price),
    ];
    params.extend(
        filters
            .into_iter()
            .filter(|(_, v)| *v > 0)
            .map(|(k, v)| (k, v.to_string())),
    );
    params
}

#[async_trait]
impl ListingConnector for RapidConnector {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn vendor(&self) -> &'static str {
        "RapidAPI"
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "domus_rapid::search",
            skip(self, req),
            fields(zip = %req.postal_code, page = req.page),
        )
    )]
    async fn search_by_postal(&self, req: &SearchRequest) -> Result<SearchPage, DomusError> {
        let url = self.endpoint("search/forsale", &search_params(req))?;
        let body = self.fetch(url, self.config.search_body_limit).await?;
        #[cfg(feature = "tracing")]
        tracing::debug!(bytes = body.len(), "search payload received");
        let cards = mapper::map_search_payload(&body)?;
        Ok(SearchPage {
            payload: body.into(),
            cards,
        })
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "domus_rapid::photos", skip(self))
    )]
    async fn photos(&self, property_id: &str) -> Result<Vec<PhotoAsset>, DomusError> {
        let url = self.endpoint("property/photos", &[("property_id", property_id.to_string())])?;
        let body = self.fetch(url, self.config.photos_body_limit).await?;
        mapper::map_photos_payload(&body)
    }
}
