//! # LogWriter: envelope printer
//!
//! A minimal listener that writes every envelope it receives through
//! `tracing`. Use it for tests or demos: `bus.on("**", Arc::new(LogWriter::new()))`.
//!
//! ## Example output
//! ```text
//! INFO agentvisor::bus::log: [event] topic=process:spawned seq=1 publisher=Some("process-supervisor")
//! WARN agentvisor::bus::log: [listener-error] seq=7 data={"error":"listener failed: boom",...}
//! INFO agentvisor::bus::log: [event-cancelled] seq=9 data={"reason":"not yet",...}
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::bus::{Dispatch, EVENT_CANCELLED, EventEnvelope, LISTENER_ERROR, Listen, ListenerResult};

/// Envelope writer listener.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Listen for LogWriter {
    async fn on_event(&self, e: Arc<EventEnvelope>) -> ListenerResult {
        let seq = e.metadata.sequence;
        match e.topic() {
            LISTENER_ERROR => warn!("[listener-error] seq={seq} data={}", e.data),
            EVENT_CANCELLED => info!("[event-cancelled] seq={seq} data={}", e.data),
            topic => info!(
                "[event] topic={topic} seq={seq} publisher={:?} data={}",
                e.metadata.publisher_id, e.data
            ),
        }
        Ok(Dispatch::Continue)
    }

    fn name(&self) -> &str {
        "LogWriter"
    }
}
