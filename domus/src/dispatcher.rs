//! Background revalidation with per-key deduplication.
//!
//! `enqueue` never blocks. A key already queued or running is ignored; a full
//! queue drops the job and forgets the key so the next stale read can retry.
//! Workers remove the key once the refresh has finished, panicked, or been
//! aborted after its timeout.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashSet;
use domus_core::{CanonicalAddress, PropertyKey};
use domus_types::DispatcherConfig;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

/// A property whose cached envelope should be refreshed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshJob {
    /// Deduplication key.
    pub property_key: PropertyKey,
    /// Canonical fields used to re-match the upstream candidate.
    pub address: CanonicalAddress,
}

/// Work executed by the dispatcher for each job.
#[async_trait]
pub trait RefreshAction: Send + Sync {
    /// Refresh one property. Failures are the action's to report.
    async fn refresh(&self, job: RefreshJob);
}

/// Result of [`RevalidationDispatcher::enqueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// The job was placed on the queue.
    Queued,
    /// A refresh for this key is already queued or running.
    AlreadyInFlight,
    /// The queue was full; the job was discarded.
    Dropped,
}

/// Bounded queue plus a fixed worker pool draining it.
pub struct RevalidationDispatcher {
    tx: mpsc::Sender<RefreshJob>,
    in_flight: Arc<DashSet<PropertyKey>>,
    dropped: AtomicU64,
    workers: Vec<JoinHandle<()>>,
}

impl RevalidationDispatcher {
    /// Start `cfg.workers` workers running `action`.
    ///
    /// Zero-valued settings fall back to [`DispatcherConfig::default`].
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime.
    #[must_use]
    pub fn spawn(cfg: DispatcherConfig, action: Arc<dyn RefreshAction>) -> Self {
        let defaults = DispatcherConfig::default();
        let capacity = if cfg.capacity == 0 {
            defaults.capacity
        } else {
            cfg.capacity
        };
        let workers = if cfg.workers == 0 {
            defaults.workers
        } else {
            cfg.workers
        };
        let job_timeout = if cfg.job_timeout.is_zero() {
            defaults.job_timeout
        } else {
            cfg.job_timeout
        };

        let (tx, rx) = mpsc::channel(capacity);
        let rx = Arc::new(Mutex::new(rx));
        let in_flight = Arc::new(DashSet::new());
        let workers = (0..workers)
            .map(|_| {
                tokio::spawn(worker(
                    Arc::clone(&rx),
                    Arc::clone(&in_flight),
                    Arc::clone(&action),
                    job_timeout,
                ))
            })
            .collect();

        Self {
            tx,
            in_flight,
            dropped: AtomicU64::new(0),
            workers,
        }
    }

    /// Submit a refresh without waiting.
    pub fn enqueue(&self, job: RefreshJob) -> EnqueueOutcome {
        if !self.in_flight.insert(job.property_key.clone()) {
            return EnqueueOutcome::AlreadyInFlight;
        }
        let key = job.property_key.clone();
        match self.tx.try_send(job) {
            Ok(()) => EnqueueOutcome::Queued,
            Err(_e) => {
                self.in_flight.remove(&key);
                self.dropped.fetch_add(1, Ordering::Relaxed);
                #[cfg(feature = "tracing")]
                tracing::warn!(property_key = %key, error = %_e, "refresh dropped");
                EnqueueOutcome::Dropped
            }
        }
    }

    /// True while a refresh for `key` is queued or running.
    #[must_use]
    pub fn is_in_flight(&self, key: &PropertyKey) -> bool {
        self.in_flight.contains(key)
    }

    /// Number of keys queued or running.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Jobs discarded because the queue was full.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Stop accepting work, let queued jobs finish, and wait for the workers.
    pub async fn shutdown(self) {
        let Self { tx, workers, .. } = self;
        drop(tx);
        for w in workers {
            let _ = w.await;
        }
    }
}

async fn worker(
    rx: Arc<Mutex<mpsc::Receiver<RefreshJob>>>,
    in_flight: Arc<DashSet<PropertyKey>>,
    action: Arc<dyn RefreshAction>,
    job_timeout: Duration,
) {
    loop {
        let next = rx.lock().await.recv().await;
        let Some(job) = next else { break };
        let key = job.property_key.clone();

        // Run detached so a panicking action cannot take the worker down.
        let action = Arc::clone(&action);
        let mut task = tokio::spawn(async move { action.refresh(job).await });
        match tokio::time::timeout(job_timeout, &mut task).await {
            Ok(Ok(())) => {}
            Ok(Err(_e)) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(property_key = %key, error = %_e, "refresh task failed");
            }
            Err(_) => {
                task.abort();
                // The key stays claimed until the aborted action is dropped.
                let _ = task.await;
                #[cfg(feature = "tracing")]
                tracing::warn!(property_key = %key, "refresh timed out");
            }
        }
        in_flight.remove(&key);
    }
}
