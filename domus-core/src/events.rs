//! Best-effort property update notifications.
//!
//! Publication never blocks the write path: when the buffer is full the event
//! is discarded and counted.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use domus_types::PropertyKey;
use tokio::sync::mpsc;

/// Emitted after a property row has been written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyUpdated {
    /// Property row id.
    pub property_id: i64,
    /// Canonical identity.
    pub property_key: PropertyKey,
}

/// Sink for property update events.
pub trait EventPublisher: Send + Sync {
    /// Publish without blocking; may drop the event.
    fn publish_property_updated(&self, evt: PropertyUpdated);
}

/// Bounded in-process channel publisher.
pub struct InMemoryPublisher {
    tx: mpsc::Sender<PropertyUpdated>,
    rx: Mutex<Option<mpsc::Receiver<PropertyUpdated>>>,
    dropped: AtomicU64,
}

impl InMemoryPublisher {
    /// Default buffer size.
    pub const DEFAULT_BUFFER: usize = 256;

    /// Create a publisher buffering up to `buffer` events (`0` selects the default).
    #[must_use]
    pub fn new(buffer: usize) -> Self {
        let buffer = if buffer == 0 {
            Self::DEFAULT_BUFFER
        } else {
            buffer
        };
        let (tx, rx) = mpsc::channel(buffer);
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
            dropped: AtomicU64::new(0),
        }
    }

    /// Take the single receiver. Returns `None` after the first call.
    pub fn subscribe(&self) -> Option<mpsc::Receiver<PropertyUpdated>> {
        self.rx
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take()
    }

    /// Number of events discarded because the buffer was full or closed.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for InMemoryPublisher {
    fn default() -> Self {
        Self::new(Self::DEFAULT_BUFFER)
    }
}

impl EventPublisher for InMemoryPublisher {
    fn publish_property_updated(&self, evt: PropertyUpdated) {
        if let Err(_e) = self.tx.try_send(evt) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            #[cfg(feature = "tracing")]
            tracing::debug!(error = %_e, "property update dropped");
        }
    }
}
