//! Quota-bounded bulk ingestion of postal areas.
//!
//! Zips and property types are walked sequentially; every page and photo call
//! goes through the same connector, and therefore the same quota gate, as
//! interactive resolves.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use domus_core::connector::{ListingConnector, SearchPage, SearchRequest};
use domus_core::store::ListingPhotoInput;
use domus_core::{DomusError, PropertyCard, canonicalize};
use domus_types::{DEFAULT_ENDPOINT, DEFAULT_PROVIDER, HydrateConfig};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::hydrator::Hydrator;

/// Counters for one pass over the configured zips.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    /// Pages fetched.
    pub pages: u32,
    /// Cards persisted.
    pub persisted: u32,
    /// Cards skipped because they could not be persisted.
    pub skipped: u32,
    /// Listings whose photo set was replaced.
    pub photo_sets: u32,
    /// Fetch or mapping failures that ended one (zip, type) pair early.
    pub failures: Vec<(String, DomusError)>,
    /// The pass stopped because shutdown was requested.
    pub cancelled: bool,
}

/// Why a (zip, type) pass stopped before running out of pages.
enum Stop {
    Cancelled,
    Quota(DomusError),
    Failed(DomusError),
}

impl From<DomusError> for Stop {
    fn from(e: DomusError) -> Self {
        if e.is_quota() {
            Self::Quota(e)
        } else {
            Self::Failed(e)
        }
    }
}

/// Resolve once `shutdown` reads `true`. A dropped sender never cancels.
async fn cancelled(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Run `fut` unless shutdown is requested first.
async fn or_cancel<F: Future>(shutdown: &mut watch::Receiver<bool>, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        () = cancelled(shutdown) => None,
        out = fut => Some(out),
    }
}

/// Periodic or one-shot bulk hydration.
pub struct BulkJob {
    connector: Arc<dyn ListingConnector>,
    hydrator: Arc<Hydrator>,
    config: HydrateConfig,
}

impl BulkJob {
    /// Default results per page.
    pub const DEFAULT_PAGE_SIZE: u32 = 50;
    /// Default page cap per (zip, type).
    pub const DEFAULT_MAX_PAGES: u32 = 5;
    /// Default per-call deadline.
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

    /// Validate `config` and fill unset values with defaults.
    ///
    /// # Errors
    /// Returns `Config` when no non-blank zip is configured.
    pub fn new(
        connector: Arc<dyn ListingConnector>,
        hydrator: Arc<Hydrator>,
        mut config: HydrateConfig,
    ) -> Result<Self, DomusError> {
        config.zips = config
            .zips
            .iter()
            .map(|z| z.trim().to_string())
            .filter(|z| !z.is_empty())
            .collect();
        if config.zips.is_empty() {
            return Err(DomusError::Config(
                "bulk job requires at least one zip".into(),
            ));
        }
        if config.provider.is_empty() {
            config.provider = DEFAULT_PROVIDER.to_string();
        }
        if config.endpoint.is_empty() {
            config.endpoint = DEFAULT_ENDPOINT.to_string();
        }
        if config.page_size == 0 {
            config.page_size = Self::DEFAULT_PAGE_SIZE;
        }
        if config.max_pages == 0 {
            config.max_pages = Self::DEFAULT_MAX_PAGES;
        }
        if config.request_timeout.is_zero() {
            config.request_timeout = Self::DEFAULT_REQUEST_TIMEOUT;
        }
        Ok(Self {
            connector,
            hydrator,
            config,
        })
    }

    /// Effective configuration after defaults.
    #[must_use]
    pub const fn config(&self) -> &HydrateConfig {
        &self.config
    }

    /// Run once, or every `interval` until `shutdown` flips to `true`.
    ///
    /// With an interval, a failed pass (including an exhausted quota) is
    /// logged and the next tick tries again.
    ///
    /// # Errors
    /// Without an interval, as for [`run_once`](Self::run_once).
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), DomusError> {
        let Some(interval) = self.config.interval.filter(|d| !d.is_zero()) else {
            return self.run_once(&mut shutdown).await.map(|_| ());
        };

        #[cfg(feature = "tracing")]
        tracing::info!(
            interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
            zips = self.config.zips.len(),
            "bulk job starting"
        );
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            if or_cancel(&mut shutdown, ticker.tick()).await.is_none() {
                #[cfg(feature = "tracing")]
                tracing::info!("bulk job stopping");
                return Ok(());
            }
            match self.run_once(&mut shutdown).await {
                Ok(report) if report.cancelled => return Ok(()),
                Ok(_report) => {
                    #[cfg(feature = "tracing")]
                    tracing::info!(
                        pages = _report.pages,
                        persisted = _report.persisted,
                        skipped = _report.skipped,
                        "bulk pass finished"
                    );
                }
                Err(_e) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(error = %_e, "bulk pass failed");
                }
            }
        }
    }

    /// One pass over zips × property types.
    ///
    /// Cancellation is not an error: the partial report comes back with
    /// `cancelled` set.
    ///
    /// # Errors
    /// Returns `QuotaExceeded` as soon as any call is refused by the quota;
    /// no further calls are made in this pass.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "domus::bulk::run_once", skip(self, shutdown))
    )]
    pub async fn run_once(
        &self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<RunReport, DomusError> {
        let no_filter = [String::new()];
        let types: &[String] = if self.config.property_types.is_empty() {
            &no_filter
        } else {
            &self.config.property_types
        };

        let mut report = RunReport::default();
        for zip in &self.config.zips {
            for property_type in types {
                match self.ingest(zip, property_type, shutdown, &mut report).await {
                    Ok(()) => {}
                    Err(Stop::Cancelled) => {
                        report.cancelled = true;
                        return Ok(report);
                    }
                    Err(Stop::Quota(e)) => return Err(e),
                    Err(Stop::Failed(e)) => {
                        #[cfg(feature = "tracing")]
                        tracing::warn!(zip = %zip, property_type = %property_type, error = %e, "zip ingest failed");
                        report.failures.push((zip.clone(), e));
                    }
                }
            }
        }
        Ok(report)
    }

    async fn ingest(
        &self,
        zip: &str,
        property_type: &str,
        shutdown: &mut watch::Receiver<bool>,
        report: &mut RunReport,
    ) -> Result<(), Stop> {
        let page_size = self.config.page_size;
        #[cfg(feature = "tracing")]
        let persisted_before = report.persisted;
        for page in 1..=self.config.max_pages {
            if *shutdown.borrow() {
                return Err(Stop::Cancelled);
            }
            let req = SearchRequest::new(zip, page, page_size)
                .with_property_type(property_type)
                .with_order_by(self.config.order_by.clone())
                .with_filters(self.config.filters);
            let fetched: SearchPage = self
                .call(shutdown, "search", self.connector.search_by_postal(&req))
                .await?;
            report.pages += 1;

            if fetched.is_empty() {
                #[cfg(feature = "tracing")]
                if page == 1 {
                    tracing::info!(zip = %zip, "zip returned no listings");
                }
                break;
            }

            for card in &fetched.cards {
                if *shutdown.borrow() {
                    return Err(Stop::Cancelled);
                }
                match self.persist_card(&fetched, card).await {
                    Ok(()) => report.persisted += 1,
                    Err(Stop::Failed(_e)) => {
                        report.skipped += 1;
                        #[cfg(feature = "tracing")]
                        tracing::warn!(zip = %zip, listing = %card.id, error = %_e, "listing skipped");
                        continue;
                    }
                    Err(stop) => return Err(stop),
                }
                match self.sync_photos(card, shutdown).await {
                    Ok(true) => report.photo_sets += 1,
                    Ok(false) => {}
                    Err(Stop::Failed(_e)) => {
                        #[cfg(feature = "tracing")]
                        tracing::warn!(zip = %zip, listing = %card.id, error = %_e, "photo sync failed");
                    }
                    Err(stop) => return Err(stop),
                }
            }

            if fetched.len() < page_size as usize {
                break;
            }
            if page < self.config.max_pages
                && !self.config.pause.is_zero()
                && or_cancel(shutdown, tokio::time::sleep(self.config.pause))
                    .await
                    .is_none()
            {
                return Err(Stop::Cancelled);
            }
        }

        #[cfg(feature = "tracing")]
        {
            let persisted = report.persisted - persisted_before;
            if persisted > 0 {
                tracing::info!(zip = %zip, property_type = %property_type, persisted, "zip persisted");
            }
        }
        Ok(())
    }

    async fn persist_card(&self, page: &SearchPage, card: &PropertyCard) -> Result<(), Stop> {
        if !card.has_complete_address() {
            return Err(Stop::Failed(DomusError::validation(
                "incomplete address data",
            )));
        }
        let (address, key) = canonicalize(&card.address, &card.city, &card.state, &card.zip);
        self.hydrator
            .write(
                &self.config.provider,
                &self.config.endpoint,
                Arc::clone(&page.payload),
                &address,
                &key,
                card,
            )
            .await
            .map(|_| ())
            .map_err(Stop::Failed)
    }

    /// Replace the photo set of a listing that arrived without images.
    async fn sync_photos(
        &self,
        card: &PropertyCard,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<bool, Stop> {
        let listing_id = card.effective_listing_id();
        if !self.config.fetch_photos || !card.images.is_empty() || listing_id.is_empty() {
            return Ok(false);
        }
        let assets = self
            .call(shutdown, "photos", self.connector.photos(card.photo_target_id()))
            .await?;
        let inputs = ListingPhotoInput::from_assets(&assets);
        if inputs.is_empty() {
            return Ok(false);
        }
        self.hydrator
            .store()
            .replace_listing_photos(listing_id, inputs)
            .await
            .map_err(Stop::Failed)
    }

    /// Bound one provider call by the request timeout and by shutdown.
    async fn call<T>(
        &self,
        shutdown: &mut watch::Receiver<bool>,
        operation: &'static str,
        fut: impl Future<Output = Result<T, DomusError>>,
    ) -> Result<T, Stop> {
        let timed = tokio::time::timeout(self.config.request_timeout, fut);
        match or_cancel(shutdown, timed).await {
            None => Err(Stop::Cancelled),
            Some(Err(_elapsed)) => Err(Stop::Failed(DomusError::provider_timeout(
                self.connector.name(),
                operation,
            ))),
            Some(Ok(res)) => res.map_err(Stop::from),
        }
    }
}
