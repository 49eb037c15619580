//! # EventBridge: forwards supervisor notifications onto the event bus.
//!
//! The supervisor only knows its [`Notifier`](crate::Notifier). The bridge
//! subscribes to it and republishes every [`ProcessEvent`] on an
//! [`EventBus`] under a `process:*` topic, so bus listeners can react to
//! process lifecycle, output and status markers with ordinary patterns.
//!
//! ```text
//! ProcessSupervisor ──► Notifier ──► bridge task ──► EventBus.publish_with(topic, json)
//!                                       │                 publisher = "process-supervisor"
//!                                       └─ Lagged(n) ──► warn, continue
//! ```
//!
//! | Notification           | Topic                          |
//! |------------------------|--------------------------------|
//! | `Spawned`              | `process:spawned`              |
//! | `Output`               | `process:output:<stream>`      |
//! | `StatusMarker`         | `process:status:<marker>`      |
//! | `TerminationRequested` | `process:terminating`          |
//! | `ForceKilled`          | `process:killed`               |
//! | `Exited`               | `process:exited` / `process:failed` |
//! | `Error`                | `process:error`                |
//! | `Purged`               | `process:purged`               |
//!
//! ## Rules
//! - Notifications are forwarded in `seq` order, one publish call at a time.
//! - The bus decides the fan-out mode (topic overrides apply).
//! - The task stops when the token is cancelled or the supervisor is dropped.

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::bus::{EventBus, PublishOptions};
use crate::process::{ProcessEvent, ProcessSupervisor};

/// Publisher id recorded on every forwarded envelope.
pub const BRIDGE_PUBLISHER: &str = "process-supervisor";

/// Forwarder from supervisor notifications to bus topics.
pub struct EventBridge;

impl EventBridge {
    /// Starts forwarding; the returned task ends once `token` is cancelled.
    ///
    /// Only notifications published after this call are forwarded.
    pub fn spawn(
        supervisor: &ProcessSupervisor,
        bus: EventBus,
        token: CancellationToken,
    ) -> JoinHandle<()> {
        let mut rx = supervisor.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    msg = rx.recv() => match msg {
                        Ok(ev) => forward(&bus, &ev).await,
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "event bridge lagged; notifications dropped");
                            continue;
                        }
                    }
                }
            }
            debug!("event bridge stopped");
        })
    }
}

async fn forward(bus: &EventBus, ev: &ProcessEvent) {
    let opts = PublishOptions::default().with_publisher(BRIDGE_PUBLISHER);
    bus.publish_with(&ev.topic(), ev.to_json(), opts).await;
}
