//! # Topic patterns.
//!
//! Topics are colon-delimited strings (`agent:spawned:manager`). Patterns use
//! the same syntax plus two wildcard segments:
//!
//! | Segment | Matches                                        |
//! |---------|------------------------------------------------|
//! | `*`     | exactly one topic segment                      |
//! | `**`    | zero or more segments from that position on    |
//! | other   | the identical literal segment                  |
//!
//! ```text
//! agent:*    ─► agent:spawned          (not agent:spawned:manager)
//! agent:**   ─► agent:spawned, agent:spawned:manager, agent:terminated:impl
//! **         ─► every topic
//! ```

/// Segment separator for topics and patterns.
pub const SEPARATOR: char = ':';

const ONE: &str = "*";
const MANY: &str = "**";

/// Returns true if `topic` matches `pattern`.
///
/// Matching is recomputed on every call; nothing is cached.
pub fn matches(pattern: &str, topic: &str) -> bool {
    if pattern == topic {
        return true;
    }
    let pat: Vec<&str> = pattern.split(SEPARATOR).collect();
    let top: Vec<&str> = topic.split(SEPARATOR).collect();
    match_segments(&pat, &top)
}

/// Greedy glob match over segments with a single backtrack point.
///
/// Only the most recent `**` is ever revisited, so the cost is bounded by
/// `O(pattern segments × topic segments)`.
fn match_segments(pat: &[&str], top: &[&str]) -> bool {
    let (mut p, mut t) = (0, 0);
    // (pattern index after the last `**`, topic index it currently absorbs up to)
    let mut backtrack: Option<(usize, usize)> = None;

    while t < top.len() {
        match pat.get(p) {
            Some(&MANY) => {
                p += 1;
                backtrack = Some((p, t));
            }
            Some(&seg) if seg == ONE || seg == top[t] => {
                p += 1;
                t += 1;
            }
            _ => match backtrack {
                Some((resume, absorbed)) => {
                    p = resume;
                    t = absorbed + 1;
                    backtrack = Some((resume, t));
                }
                None => return false,
            },
        }
    }
    pat[p..].iter().all(|seg| *seg == MANY)
}

/// Returns true if `pattern` contains a wildcard segment.
pub fn is_wildcard(pattern: &str) -> bool {
    pattern
        .split(SEPARATOR)
        .any(|seg| seg == ONE || seg == MANY)
}

/// Ordering key for "most specific pattern" decisions.
///
/// Higher is more specific: more literal segments first, then more `*`
/// segments, then patterns without `**`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Specificity {
    literals: usize,
    singles: usize,
    bounded: bool,
}

impl Specificity {
    /// Computes the specificity of a pattern.
    pub fn of(pattern: &str) -> Self {
        let mut spec = Specificity {
            literals: 0,
            singles: 0,
            bounded: true,
        };
        for seg in pattern.split(SEPARATOR) {
            match seg {
                MANY => spec.bounded = false,
                ONE => spec.singles += 1,
                _ => spec.literals += 1,
            }
        }
        spec
    }
}
