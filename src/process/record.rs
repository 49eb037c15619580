use std::time::SystemTime;

use serde::Serialize;

/// Lifecycle state of a tracked process.
///
/// ```text
/// Spawning ──► Running ──► Exited   (exit code 0)
///                     └──► Failed   (non-zero exit, signal, spawn error)
/// ```
/// `Exited` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ProcessStatus {
    Spawning,
    Running,
    Exited,
    Failed,
}

impl ProcessStatus {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessStatus::Exited | ProcessStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessStatus::Spawning => "spawning",
            ProcessStatus::Running => "running",
            ProcessStatus::Exited => "exited",
            ProcessStatus::Failed => "failed",
        }
    }
}

/// Snapshot of one tracked process; always a copy of supervisor state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRecord {
    pub agent_id: String,
    pub pid: u32,
    pub spawned_at: SystemTime,
    pub status: ProcessStatus,
    pub exit_code: Option<i32>,
    pub exit_signal: Option<String>,
}

impl ProcessRecord {
    pub(crate) fn new(agent_id: &str, pid: u32) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            pid,
            spawned_at: SystemTime::now(),
            status: ProcessStatus::Spawning,
            exit_code: None,
            exit_signal: None,
        }
    }

    /// Records an exit; status becomes `Exited` only for exit code 0.
    pub(crate) fn finish(&mut self, code: Option<i32>, signal: Option<String>) {
        self.status = if code == Some(0) {
            ProcessStatus::Exited
        } else {
            ProcessStatus::Failed
        };
        self.exit_code = code;
        self.exit_signal = signal;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_classifies_exit() {
        let mut ok = ProcessRecord::new("a", 1);
        ok.finish(Some(0), None);
        assert_eq!(ok.status, ProcessStatus::Exited);

        let mut bad = ProcessRecord::new("b", 2);
        bad.finish(Some(3), None);
        assert_eq!(bad.status, ProcessStatus::Failed);

        let mut killed = ProcessRecord::new("c", 3);
        killed.finish(None, Some("SIGKILL".into()));
        assert_eq!(killed.status, ProcessStatus::Failed);
        assert_eq!(killed.exit_signal.as_deref(), Some("SIGKILL"));
        assert!(killed.status.is_terminal());
    }
}
