//! Async channel bridge between the host thread and a Tokio consumer
//!
//! Mouse notifications are produced on the host's processing thread, inside
//! a completion handler that must never block. The publisher side therefore
//! only ever uses `try_send`; when the consumer falls behind, the newest
//! event is dropped and counted.

use async_channel::{Receiver, Sender, TrySendError, bounded};
use protocol::MouseEvent;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{trace, warn};

/// Default bridge capacity
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Publishing half, owned by observers running on the host thread
#[derive(Clone)]
pub struct EventPublisher {
    tx: Sender<MouseEvent>,
    dropped: Arc<AtomicU64>,
}

impl EventPublisher {
    /// Publish an event without blocking
    ///
    /// Returns false if the event was dropped.
    pub fn publish(&self, event: MouseEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => {
                trace!("Published {:?}", event);
                true
            }
            Err(TrySendError::Full(event)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(
                    "Event bridge full, dropped {:?} (total dropped: {})",
                    event, dropped
                );
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Number of events dropped because the bridge was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Consuming half, owned by the Tokio runtime
#[derive(Clone)]
pub struct EventSubscriber {
    rx: Receiver<MouseEvent>,
}

impl EventSubscriber {
    /// Receive the next event
    pub async fn recv(&self) -> crate::Result<MouseEvent> {
        self.rx
            .recv()
            .await
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }

    /// Try to receive an event without waiting
    pub fn try_recv(&self) -> Option<MouseEvent> {
        self.rx.try_recv().ok()
    }
}

/// Create the event bridge
///
/// Returns (EventPublisher for the host thread, EventSubscriber for Tokio)
pub fn create_event_bridge(capacity: usize) -> (EventPublisher, EventSubscriber) {
    let (tx, rx) = bounded(capacity.max(1));

    (
        EventPublisher {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        },
        EventSubscriber { rx },
    )
}
