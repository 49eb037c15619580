//! # Notification channel of the process supervisor.
//!
//! [`Notifier`] is a thin wrapper around [`tokio::sync::broadcast`] through
//! which the supervisor surfaces lifecycle, output and status notifications.
//! The supervisor does not know who listens; the orchestration layer usually
//! forwards everything onto an [`EventBus`](crate::EventBus) via
//! [`EventBridge`](crate::EventBridge).
//!
//! ```text
//! observers (many):                       receivers (many):
//!   stdout reader ──┐
//!   stderr reader ──┼──► Notifier ──────► EventBridge ──► EventBus
//!   exit observer ──┤   (broadcast)  └──► custom receiver
//!   terminate()   ──┘
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never blocks.
//! - **Bounded capacity**: slow receivers get `RecvError::Lagged(n)` and skip `n` oldest items.
//! - **No persistence**: notifications are lost if there are no receivers at send time.

use tokio::sync::broadcast;

use crate::process::ProcessEvent;

/// Broadcast channel for supervisor notifications.
#[derive(Clone, Debug)]
pub struct Notifier {
    tx: broadcast::Sender<ProcessEvent>,
}

impl Notifier {
    /// Creates a new channel; capacity is clamped to a minimum of 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _rx) = broadcast::channel::<ProcessEvent>(capacity);
        Self { tx }
    }

    /// Publishes a notification to all active receivers.
    ///
    /// If there are no receivers, the notification is dropped.
    pub fn publish(&self, ev: ProcessEvent) {
        let _ = self.tx.send(ev);
    }

    /// Creates a receiver that observes notifications sent after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<ProcessEvent> {
        self.tx.subscribe()
    }
}
