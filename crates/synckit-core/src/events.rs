//! Store lifecycle events
//!
//! Stores report what they do over a bounded channel so that hosts can
//! observe loads, saves and swallowed selector failures without polling.
//! When the channel is full, events are dropped with a warning; a slow
//! observer never blocks a store.

use crate::error::ErrorPayload;
use tokio::sync::mpsc;
use tracing::warn;

/// Default capacity of a store's event channel
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Events emitted by fetch and settings stores
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    /// A network load started for a resource key
    LoadStarted {
        operation: String,
        fingerprint: String,
    },

    /// A resource key resolved with a value
    LoadSucceeded {
        operation: String,
        fingerprint: String,
        from_snapshot: bool,
    },

    /// A resource key resolved with an error
    LoadFailed {
        operation: String,
        fingerprint: String,
        error: ErrorPayload,
    },

    /// A save round-trip started
    SaveStarted {
        store: String,
    },

    /// A save round-trip completed and the baseline was replaced
    SaveSucceeded {
        store: String,
    },

    /// A save round-trip failed; local state is untouched
    SaveFailed {
        store: String,
        error: ErrorPayload,
    },

    /// A resilient selector swallowed a failure and returned its fallback
    SelectorFailed {
        selector: String,
        error: String,
    },
}

/// Sending half of a store's event channel
///
/// Cloned into every component of a store. A sink without a channel
/// discards events.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::Sender<StoreEvent>>,
}

impl EventSink {
    /// Create a sink and the receiver observers read from
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<StoreEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx: Some(tx) }, rx)
    }

    /// A sink that discards everything
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Emit an event
    pub fn emit(&self, event: StoreEvent) {
        let Some(tx) = &self.tx else {
            return;
        };

        match tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Store event channel full, dropping event. Consider increasing the event channel capacity.");
            }
            // Nobody is listening any more
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}
