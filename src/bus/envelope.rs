//! # Event envelopes.
//!
//! Every publish call wraps its payload in an [`EventEnvelope`] carrying
//! delivery metadata.
//!
//! ## Ordering guarantees
//! `sequence` comes from a counter owned by the bus instance: it starts at 1
//! and increases by exactly one per publish call, whatever the topic. Use it
//! to restore publish order when listeners observe envelopes out of order.
//!
//! ## Example
//! ```rust
//! use agentvisor::EventEnvelope;
//! use serde_json::json;
//!
//! let env = EventEnvelope::new("task:completed", json!({"task": "t-1"}), 7)
//!     .with_publisher("scheduler");
//!
//! assert_eq!(env.topic(), "task:completed");
//! assert_eq!(env.metadata.sequence, 7);
//! assert_eq!(env.metadata.publisher_id.as_deref(), Some("scheduler"));
//! ```

use std::sync::Arc;
use std::time::SystemTime;

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// Delivery metadata attached to every envelope.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMetadata {
    /// Unique per envelope.
    pub event_id: Uuid,
    /// Wall-clock publish time.
    pub timestamp: SystemTime,
    /// Bus-instance monotonic counter, starting at 1.
    #[serde(rename = "sequenceNumber")]
    pub sequence: u64,
    /// Optional identity of the publisher.
    pub publisher_id: Option<String>,
}

/// Topic + payload + metadata, shared by every listener of one publish call.
#[derive(Debug, Clone, Serialize)]
pub struct EventEnvelope {
    pub topic: Arc<str>,
    pub data: Value,
    pub metadata: EventMetadata,
}

impl EventEnvelope {
    /// Creates an envelope with a fresh event id and the current timestamp.
    pub fn new(topic: impl Into<Arc<str>>, data: Value, sequence: u64) -> Self {
        Self {
            topic: topic.into(),
            data,
            metadata: EventMetadata {
                event_id: Uuid::new_v4(),
                timestamp: SystemTime::now(),
                sequence,
                publisher_id: None,
            },
        }
    }

    /// Attaches a publisher id.
    #[inline]
    pub fn with_publisher(mut self, publisher: impl Into<String>) -> Self {
        self.metadata.publisher_id = Some(publisher.into());
        self
    }

    #[inline]
    pub fn topic(&self) -> &str {
        &self.topic
    }
}
