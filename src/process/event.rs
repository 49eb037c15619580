//! # Notifications emitted by the process supervisor.
//!
//! The [`ProcessEventKind`] enum classifies notifications across three categories:
//! - **Lifecycle**: registration, termination requests, exit, purge
//! - **Output**: accepted output lines and status markers found in them
//! - **Failures**: spawn-level errors and undeliverable signals
//!
//! The [`ProcessEvent`] struct carries additional metadata such as the agent
//! id, stream, line, marker and exit details.
//!
//! ## Ordering guarantees
//! Each notification has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when notifications are observed out of order.
//!
//! ## Example
//! ```rust
//! use agentvisor::{ProcessEvent, ProcessEventKind, StatusMarker, StreamKind};
//!
//! let ev = ProcessEvent::new(ProcessEventKind::StatusMarker, "impl-1")
//!     .with_stream(StreamKind::Stdout)
//!     .with_marker(StatusMarker::Ready)
//!     .with_line("[APM_STATUS:READY] agent booted");
//!
//! assert_eq!(ev.topic(), "process:status:ready");
//! assert_eq!(ev.marker, Some(StatusMarker::Ready));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use serde_json::{Value, json};

use crate::process::{ProcessStatus, StatusMarker, StreamKind};

/// Global sequence counter for notification ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(1);

/// Classification of supervisor notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessEventKind {
    /// Process registered and now `Running`.
    ///
    /// Sets:
    /// - `pid`: process identifier
    Spawned,

    /// A non-blank output line was buffered.
    ///
    /// Sets:
    /// - `stream`: stdout or stderr
    /// - `line`: the buffered line
    Output,

    /// An output line contained a status marker.
    ///
    /// Sets:
    /// - `stream`, `line`, `marker`
    StatusMarker,

    /// Graceful stop requested.
    ///
    /// Sets:
    /// - `timeout_ms`: escalation timeout
    TerminationRequested,

    /// Escalation timer fired; forceful stop sent.
    ForceKilled,

    /// Process exited.
    ///
    /// Sets:
    /// - `status`: `Exited` (code 0) or `Failed`
    /// - `exit_code` / `exit_signal`
    Exited,

    /// Spawn-level error or undeliverable signal.
    ///
    /// Sets:
    /// - `reason`: error message
    Error,

    /// Terminal entry removed from the registry after the grace delay.
    Purged,
}

/// Supervisor notification with optional metadata.
#[derive(Debug, Clone)]
pub struct ProcessEvent {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Notification classification.
    pub kind: ProcessEventKind,
    /// Agent the notification is about.
    pub agent_id: Arc<str>,

    pub pid: Option<u32>,
    pub stream: Option<StreamKind>,
    pub line: Option<Arc<str>>,
    pub marker: Option<StatusMarker>,
    pub status: Option<ProcessStatus>,
    pub exit_code: Option<i32>,
    pub exit_signal: Option<Arc<str>>,
    /// Escalation timeout in milliseconds (compact).
    pub timeout_ms: Option<u32>,
    /// Human-readable reason (errors, signal failures).
    pub reason: Option<Arc<str>>,
}

impl ProcessEvent {
    /// Creates a notification with current timestamp and next sequence number.
    pub fn new(kind: ProcessEventKind, agent_id: impl Into<Arc<str>>) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            agent_id: agent_id.into(),
            pid: None,
            stream: None,
            line: None,
            marker: None,
            status: None,
            exit_code: None,
            exit_signal: None,
            timeout_ms: None,
            reason: None,
        }
    }

    #[inline]
    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    #[inline]
    pub fn with_stream(mut self, stream: StreamKind) -> Self {
        self.stream = Some(stream);
        self
    }

    #[inline]
    pub fn with_line(mut self, line: impl Into<Arc<str>>) -> Self {
        self.line = Some(line.into());
        self
    }

    #[inline]
    pub fn with_marker(mut self, marker: StatusMarker) -> Self {
        self.marker = Some(marker);
        self
    }

    /// Attaches exit details and the resulting terminal status.
    #[inline]
    pub fn with_exit(
        mut self,
        status: ProcessStatus,
        code: Option<i32>,
        signal: Option<&str>,
    ) -> Self {
        self.status = Some(status);
        self.exit_code = code;
        self.exit_signal = signal.map(Arc::from);
        self
    }

    /// Attaches a timeout duration (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.timeout_ms = Some(ms);
        self
    }

    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Bus topic this notification is published under by the bridge.
    pub fn topic(&self) -> String {
        match self.kind {
            ProcessEventKind::Spawned => "process:spawned".to_string(),
            ProcessEventKind::Output => format!(
                "process:output:{}",
                self.stream.map_or("unknown", |s| s.as_str())
            ),
            ProcessEventKind::StatusMarker => format!(
                "process:status:{}",
                self.marker
                    .map_or_else(|| "unknown".to_string(), |m| m.as_str().to_lowercase())
            ),
            ProcessEventKind::TerminationRequested => "process:terminating".to_string(),
            ProcessEventKind::ForceKilled => "process:killed".to_string(),
            ProcessEventKind::Exited => match self.status {
                Some(ProcessStatus::Exited) => "process:exited".to_string(),
                _ => "process:failed".to_string(),
            },
            ProcessEventKind::Error => "process:error".to_string(),
            ProcessEventKind::Purged => "process:purged".to_string(),
        }
    }

    /// JSON payload carrying every field that is set.
    pub fn to_json(&self) -> Value {
        let mut data = json!({
            "agentId": &*self.agent_id,
            "seq": self.seq,
        });
        let Some(obj) = data.as_object_mut() else {
            return data;
        };
        if let Some(pid) = self.pid {
            obj.insert("pid".into(), json!(pid));
        }
        if let Some(stream) = self.stream {
            obj.insert("stream".into(), json!(stream));
        }
        if let Some(line) = &self.line {
            obj.insert("line".into(), json!(&**line));
        }
        if let Some(marker) = self.marker {
            obj.insert("marker".into(), json!(marker));
        }
        if let Some(status) = self.status {
            obj.insert("status".into(), json!(status));
        }
        if let Some(code) = self.exit_code {
            obj.insert("exitCode".into(), json!(code));
        }
        if let Some(signal) = &self.exit_signal {
            obj.insert("exitSignal".into(), json!(&**signal));
        }
        if let Some(ms) = self.timeout_ms {
            obj.insert("timeoutMs".into(), json!(ms));
        }
        if let Some(reason) = &self.reason {
            obj.insert("reason".into(), json!(&**reason));
        }
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_increases() {
        let a = ProcessEvent::new(ProcessEventKind::Spawned, "a");
        let b = ProcessEvent::new(ProcessEventKind::Spawned, "a");
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_topics() {
        let out = ProcessEvent::new(ProcessEventKind::Output, "a").with_stream(StreamKind::Stderr);
        assert_eq!(out.topic(), "process:output:stderr");

        let ok = ProcessEvent::new(ProcessEventKind::Exited, "a").with_exit(
            ProcessStatus::Exited,
            Some(0),
            None,
        );
        assert_eq!(ok.topic(), "process:exited");

        let killed = ProcessEvent::new(ProcessEventKind::Exited, "a").with_exit(
            ProcessStatus::Failed,
            None,
            Some("SIGKILL"),
        );
        assert_eq!(killed.topic(), "process:failed");
    }

    #[test]
    fn test_json_payload() {
        let ev = ProcessEvent::new(ProcessEventKind::StatusMarker, "impl-1")
            .with_stream(StreamKind::Stdout)
            .with_marker(StatusMarker::Blocked)
            .with_line("[APM_STATUS:BLOCKED] waiting");
        let data = ev.to_json();
        assert_eq!(data["agentId"], "impl-1");
        assert_eq!(data["stream"], "stdout");
        assert_eq!(data["marker"], "BLOCKED");
        assert_eq!(data["line"], "[APM_STATUS:BLOCKED] waiting");
        assert!(data.get("exitCode").is_none());
    }
}
