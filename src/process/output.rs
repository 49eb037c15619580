use std::collections::VecDeque;

use serde::Serialize;

/// Which output stream a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl StreamKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamKind::Stdout => "stdout",
            StreamKind::Stderr => "stderr",
        }
    }
}

/// Bounded line buffer with strict FIFO eviction.
///
/// `len() <= capacity()` always holds: pushing into a full buffer drops the
/// oldest line first.
#[derive(Debug, Clone)]
pub struct OutputBuffer {
    capacity: usize,
    lines: VecDeque<String>,
}

impl OutputBuffer {
    /// Creates an empty buffer; `capacity` is clamped to a minimum of 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            lines: VecDeque::with_capacity(capacity.min(1024)),
        }
    }

    /// Appends a line, evicting the oldest one when full.
    pub fn push(&mut self, line: String) {
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    /// Copy of the retained lines, oldest first.
    pub fn lines(&self) -> Vec<String> {
        self.lines.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Copy of both output buffers of one process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OutputSnapshot {
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_eviction_keeps_most_recent() {
        let mut buf = OutputBuffer::new(1000);
        for i in 0..1001 {
            buf.push(format!("line {i}"));
        }
        let lines = buf.lines();
        assert_eq!(lines.len(), 1000);
        assert_eq!(lines.first().map(String::as_str), Some("line 1"));
        assert_eq!(lines.last().map(String::as_str), Some("line 1000"));
        assert!(lines.windows(2).all(|w| w[0] != w[1]));
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut buf = OutputBuffer::new(0);
        buf.push("a".into());
        buf.push("b".into());
        assert_eq!(buf.capacity(), 1);
        assert_eq!(buf.lines(), vec!["b".to_string()]);
    }

    #[test]
    fn test_lines_is_a_copy() {
        let mut buf = OutputBuffer::new(4);
        buf.push("a".into());
        let mut copy = buf.lines();
        copy.push("mutated".into());
        assert_eq!(buf.len(), 1);
    }
}
