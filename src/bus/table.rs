//! # Subscription table.
//!
//! Maps the **literal** pattern string used at registration to the ordered
//! list of listeners registered under it. Wildcards are never expanded at
//! registration time; matching against a published topic happens in
//! [`SubscriptionTable::resolve`] on every publish call.
//!
//! ## Rules
//! - `SubscriptionId` doubles as the registration order (monotonic per table).
//! - `resolve` returns matches sorted by registration order across all patterns.
//! - `resolve` never mutates the table; a `once` subscription is claimed
//!   (removed) by the dispatcher right before it is invoked, so listeners a
//!   cancelled `Sync` dispatch never reached stay registered.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::bus::ListenerRef;
use crate::bus::topic;

/// Handle returned by `on`/`once`, accepted by `off`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    #[inline]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

struct Subscription {
    id: SubscriptionId,
    listener: ListenerRef,
    once: bool,
}

/// A matched subscription, detached from the table.
#[derive(Clone)]
pub(crate) struct Matched {
    pub(crate) id: SubscriptionId,
    pub(crate) pattern: Arc<str>,
    pub(crate) listener: ListenerRef,
    pub(crate) once: bool,
}

#[derive(Default)]
pub(crate) struct SubscriptionTable {
    by_pattern: HashMap<Arc<str>, Vec<Subscription>>,
    next_id: u64,
}

impl SubscriptionTable {
    /// Registers `listener` under `pattern`; returns the id and the new per-pattern count.
    pub(crate) fn insert(
        &mut self,
        pattern: &str,
        listener: ListenerRef,
        once: bool,
    ) -> (SubscriptionId, usize) {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        let subs = self.by_pattern.entry(Arc::from(pattern)).or_default();
        subs.push(Subscription { id, listener, once });
        (id, subs.len())
    }

    /// Removes one subscription from the exact `pattern` key.
    pub(crate) fn remove(&mut self, pattern: &str, id: SubscriptionId) -> bool {
        let Some(subs) = self.by_pattern.get_mut(pattern) else {
            return false;
        };
        let before = subs.len();
        subs.retain(|s| s.id != id);
        let removed = subs.len() != before;
        if subs.is_empty() {
            self.by_pattern.remove(pattern);
        }
        removed
    }

    /// Clears one pattern, or everything when `pattern` is `None`.
    pub(crate) fn clear(&mut self, pattern: Option<&str>) {
        match pattern {
            Some(p) => {
                self.by_pattern.remove(p);
            }
            None => self.by_pattern.clear(),
        }
    }

    /// Listener count under the literal `pattern`, or bus-wide.
    pub(crate) fn count(&self, pattern: Option<&str>) -> usize {
        match pattern {
            Some(p) => self.by_pattern.get(p).map_or(0, Vec::len),
            None => self.by_pattern.values().map(Vec::len).sum(),
        }
    }

    /// Sorted list of pattern keys with at least one listener.
    pub(crate) fn patterns(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .by_pattern
            .iter()
            .filter(|(_, subs)| !subs.is_empty())
            .map(|(p, _)| p.to_string())
            .collect();
        names.sort_unstable();
        names
    }

    /// Collects every subscription whose pattern matches `topic`, in registration order.
    pub(crate) fn resolve(&self, topic_name: &str) -> Vec<Matched> {
        let mut matched = Vec::new();
        for (pattern, subs) in &self.by_pattern {
            if !topic::matches(pattern, topic_name) {
                continue;
            }
            matched.extend(subs.iter().map(|s| Matched {
                id: s.id,
                pattern: pattern.clone(),
                listener: s.listener.clone(),
                once: s.once,
            }));
        }
        matched.sort_unstable_by_key(|m| m.id);
        matched
    }

    /// Takes the right to invoke `m`.
    ///
    /// Always granted for persistent subscriptions. A `once` subscription is
    /// removed here and granted only to the first caller.
    pub(crate) fn claim(&mut self, m: &Matched) -> bool {
        !m.once || self.remove(&m.pattern, m.id)
    }
}
