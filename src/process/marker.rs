//! # Status marker protocol.
//!
//! Agents announce lifecycle conditions by printing a literal marker anywhere
//! in an output line:
//!
//! ```text
//! [APM_STATUS:READY]      agent finished booting
//! [APM_STATUS:ERROR]      agent hit an unrecoverable error
//! [APM_STATUS:COMPLETE]   unit of work done
//! [APM_STATUS:BLOCKED]    agent waits on something external
//! ```
//!
//! Detection is a plain substring match per line: no escaping, no payload
//! beyond the marker name and the raw line.

use serde::Serialize;

/// One of the fixed status markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StatusMarker {
    Ready,
    Error,
    Complete,
    Blocked,
}

impl StatusMarker {
    /// Every marker, in scan order.
    pub const ALL: [StatusMarker; 4] = [
        StatusMarker::Ready,
        StatusMarker::Error,
        StatusMarker::Complete,
        StatusMarker::Blocked,
    ];

    /// Literal text searched for in output lines.
    pub fn pattern(&self) -> &'static str {
        match self {
            StatusMarker::Ready => "[APM_STATUS:READY]",
            StatusMarker::Error => "[APM_STATUS:ERROR]",
            StatusMarker::Complete => "[APM_STATUS:COMPLETE]",
            StatusMarker::Blocked => "[APM_STATUS:BLOCKED]",
        }
    }

    /// Marker name (`READY`, `ERROR`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusMarker::Ready => "READY",
            StatusMarker::Error => "ERROR",
            StatusMarker::Complete => "COMPLETE",
            StatusMarker::Blocked => "BLOCKED",
        }
    }

    /// Returns every marker contained in `line`.
    pub fn scan(line: &str) -> impl Iterator<Item = StatusMarker> + '_ {
        Self::ALL.into_iter().filter(move |m| line.contains(m.pattern()))
    }
}

impl std::fmt::Display for StatusMarker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_marker() {
        let found: Vec<_> = StatusMarker::scan("[APM_STATUS:READY] agent booted").collect();
        assert_eq!(found, vec![StatusMarker::Ready]);
    }

    #[test]
    fn test_multiple_markers_in_one_line() {
        let found: Vec<_> =
            StatusMarker::scan("[APM_STATUS:COMPLETE] then [APM_STATUS:BLOCKED]").collect();
        assert_eq!(found, vec![StatusMarker::Complete, StatusMarker::Blocked]);
    }

    #[test]
    fn test_near_misses_do_not_match() {
        assert_eq!(StatusMarker::scan("APM_STATUS:READY").count(), 0);
        assert_eq!(StatusMarker::scan("[apm_status:ready]").count(), 0);
        assert_eq!(StatusMarker::scan("[APM_STATUS:DONE]").count(), 0);
    }
}
