//! # EventBus: hierarchical publish/subscribe with three fan-out modes.
//!
//! [`EventBus`] owns a subscription table (literal pattern → ordered listeners),
//! per-topic mode overrides and delivery statistics. A standalone dispatch
//! routine resolves matching listeners on every publish call and fans the
//! envelope out according to the effective [`EmitMode`].
//!
//! ## Architecture
//! ```text
//! publish(topic, data, opts)
//!     │
//!     ├─► seq += 1, build EventEnvelope, stats.record_publish(topic)
//!     ├─► mode = opts.mode > most specific set_topic_mode() > cfg.default_mode
//!     ├─► table.resolve(topic)  ──► [L1, L2, ... LN] (registration order)
//!     │
//!     ├─ Async    ──► tokio::spawn(L1) ... tokio::spawn(LN)      return N now
//!     ├─ Sync     ──► L1.await ─► L2.await ─► ...                 stop on Cancel
//!     │                              └─ Cancel(reason) ─► "event-cancelled"
//!     └─ Parallel ──► join_all(L1 .. LN)                          settle all
//!
//! any listener Err / panic ──► caught ──► "listener-error"
//! ```
//!
//! ## Rules
//! - `publish` returns the number of matched subscriptions, whatever the mode.
//! - Meta-topics (`event-cancelled`, `listener-error`) are always dispatched `Async`.
//! - A failure inside a `listener-error` listener is logged, never re-published.
//! - Locks are never held across `.await`; every accessor returns a copy.
//!
//! ## Example
//! ```rust
//! use agentvisor::{Dispatch, EmitMode, EventBus, ListenerFn, PublishOptions};
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let bus = EventBus::default();
//! bus.on("agent:**", ListenerFn::arc("audit", |env| async move {
//!     println!("{} #{}", env.topic, env.metadata.sequence);
//!     Ok(Dispatch::Continue)
//! }));
//!
//! let opts = PublishOptions::default().with_mode(EmitMode::Sync);
//! let delivered = bus.publish_with("agent:spawned:manager", json!({"pid": 42}), opts).await;
//! assert_eq!(delivered, 1);
//! # }
//! ```

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use futures::FutureExt;
use futures::future::join_all;
use serde_json::{Value, json};
use tracing::{debug, error, warn};

use crate::bus::stats::{BusStats, StatsRecorder};
use crate::bus::table::{Matched, SubscriptionId, SubscriptionTable};
use crate::bus::topic::{self, Specificity};
use crate::bus::{Dispatch, EmitMode, EventEnvelope, ListenerRef, ListenerResult};
use crate::config::BusConfig;
use crate::error::ListenerError;

/// Reserved meta-topic published when a `Sync` listener cancels dispatch.
pub const EVENT_CANCELLED: &str = "event-cancelled";

/// Reserved meta-topic published when a listener fails or panics.
pub const LISTENER_ERROR: &str = "listener-error";

/// Optional arguments of [`EventBus::publish_with`].
#[derive(Debug, Clone, Default)]
pub struct PublishOptions {
    /// Identity recorded in the envelope metadata.
    pub publisher_id: Option<String>,
    /// Explicit fan-out mode; wins over topic overrides and the bus default.
    pub mode: Option<EmitMode>,
}

impl PublishOptions {
    #[inline]
    pub fn with_publisher(mut self, publisher: impl Into<String>) -> Self {
        self.publisher_id = Some(publisher.into());
        self
    }

    #[inline]
    pub fn with_mode(mut self, mode: EmitMode) -> Self {
        self.mode = Some(mode);
        self
    }
}

struct Inner {
    cfg: BusConfig,
    table: Mutex<SubscriptionTable>,
    modes: Mutex<Vec<(String, EmitMode)>>,
    stats: Mutex<StatsRecorder>,
    seq: AtomicU64,
}

/// Hierarchical publish/subscribe dispatcher.
///
/// ### Properties
/// - **Cloneable**: clones share the same table, statistics and sequence counter.
/// - **Isolated listeners**: a failing listener never affects the publisher or its siblings.
/// - **Per-instance ordering**: `sequence` increases by one per publish call.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Inner>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(BusConfig::default())
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("default_mode", &self.inner.cfg.default_mode)
            .field("listeners", &self.listener_count(None))
            .finish()
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl EventBus {
    /// Creates an empty bus.
    pub fn new(cfg: BusConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                cfg,
                table: Mutex::new(SubscriptionTable::default()),
                modes: Mutex::new(Vec::new()),
                stats: Mutex::new(StatsRecorder::default()),
                seq: AtomicU64::new(0),
            }),
        }
    }

    /// Registers `listener` under the literal `pattern`.
    pub fn on(&self, pattern: &str, listener: ListenerRef) -> SubscriptionId {
        self.subscribe(pattern, listener, false)
    }

    /// Registers `listener` under `pattern` for a single matching publish.
    pub fn once(&self, pattern: &str, listener: ListenerRef) -> SubscriptionId {
        self.subscribe(pattern, listener, true)
    }

    fn subscribe(&self, pattern: &str, listener: ListenerRef, once: bool) -> SubscriptionId {
        let name = listener.name().to_string();
        let (id, count) = lock(&self.inner.table).insert(pattern, listener, once);
        debug!(pattern, listener = %name, id = id.as_u64(), once, "listener registered");

        if let Some(limit) = self.inner.cfg.warn_threshold() {
            if count == limit + 1 {
                warn!(pattern, count, limit, "possible listener leak: too many listeners on one pattern");
            }
        }
        id
    }

    /// Removes one listener from the exact `pattern` key.
    ///
    /// Returns `false` if no such subscription exists under that key.
    pub fn off(&self, pattern: &str, id: SubscriptionId) -> bool {
        lock(&self.inner.table).remove(pattern, id)
    }

    /// Clears one pattern's listeners, or every listener when `pattern` is `None`.
    pub fn remove_all_listeners(&self, pattern: Option<&str>) {
        lock(&self.inner.table).clear(pattern);
    }

    /// Counts listeners under the literal `pattern` key, or bus-wide when `None`.
    pub fn listener_count(&self, pattern: Option<&str>) -> usize {
        lock(&self.inner.table).count(pattern)
    }

    /// Returns the sorted pattern keys that have at least one listener.
    pub fn event_names(&self) -> Vec<String> {
        lock(&self.inner.table).patterns()
    }

    /// Overrides the fan-out mode for topics matching `pattern`.
    ///
    /// Setting the same pattern again replaces its mode in place.
    pub fn set_topic_mode(&self, pattern: &str, mode: EmitMode) {
        let mut modes = lock(&self.inner.modes);
        if let Some(entry) = modes.iter_mut().find(|(p, _)| p == pattern) {
            entry.1 = mode;
        } else {
            modes.push((pattern.to_string(), mode));
        }
        debug!(pattern, mode = mode.as_str(), "topic mode set");
    }

    /// Drops a mode override; returns `false` if none was set for `pattern`.
    pub fn clear_topic_mode(&self, pattern: &str) -> bool {
        let mut modes = lock(&self.inner.modes);
        let before = modes.len();
        modes.retain(|(p, _)| p != pattern);
        modes.len() != before
    }

    /// Effective mode for `topic` when the publisher does not pick one.
    pub fn mode_for(&self, topic_name: &str) -> EmitMode {
        let modes = lock(&self.inner.modes);
        let mut best: Option<(Specificity, EmitMode)> = None;
        for (pattern, mode) in modes.iter() {
            if !topic::matches(pattern, topic_name) {
                continue;
            }
            let spec = Specificity::of(pattern);
            match best {
                Some((current, _)) if current >= spec => {}
                _ => best = Some((spec, *mode)),
            }
        }
        best.map_or(self.inner.cfg.default_mode, |(_, mode)| mode)
    }

    /// Publishes `data` on `topic` with default options.
    pub async fn publish(&self, topic_name: &str, data: Value) -> usize {
        self.publish_with(topic_name, data, PublishOptions::default())
            .await
    }

    /// Publishes `data` on `topic`; returns the number of matched subscriptions.
    ///
    /// - `Async`: resolves right after the listeners are spawned.
    /// - `Sync`: resolves after the last listener (or a cancellation).
    /// - `Parallel`: resolves after every listener settled.
    pub async fn publish_with(&self, topic_name: &str, data: Value, opts: PublishOptions) -> usize {
        let mode = opts.mode.unwrap_or_else(|| self.mode_for(topic_name));
        let (envelope, matched) = self.prepare(topic_name, data, opts.publisher_id);
        if matched.is_empty() {
            return 0;
        }

        let delivered = matched.len();
        let started = Instant::now();
        match mode {
            EmitMode::Async => self.dispatch_async(&envelope, matched),
            EmitMode::Sync => self.dispatch_sync(&envelope, matched).await,
            EmitMode::Parallel => self.dispatch_parallel(&envelope, matched).await,
        }
        lock(&self.inner.stats).record_delivery(started.elapsed());
        delivered
    }

    /// Returns a copy of the delivery statistics.
    pub fn stats(&self) -> BusStats {
        lock(&self.inner.stats).snapshot()
    }

    /// Zeroes every counter; subscriptions are untouched.
    pub fn reset_stats(&self) {
        lock(&self.inner.stats).reset();
    }

    /// Clears subscriptions, mode overrides, statistics and the sequence counter.
    ///
    /// The bus stays usable, as if newly constructed.
    pub fn shutdown(&self) {
        *lock(&self.inner.table) = SubscriptionTable::default();
        lock(&self.inner.modes).clear();
        lock(&self.inner.stats).reset();
        self.inner.seq.store(0, Ordering::SeqCst);
        debug!("event bus shut down");
    }

    /// Assigns the next sequence number, counts the publish and resolves listeners.
    fn prepare(
        &self,
        topic_name: &str,
        data: Value,
        publisher_id: Option<String>,
    ) -> (Arc<EventEnvelope>, Vec<Matched>) {
        let seq = self.inner.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let mut envelope = EventEnvelope::new(topic_name, data, seq);
        envelope.metadata.publisher_id = publisher_id;

        lock(&self.inner.stats).record_publish(topic_name);
        let matched = lock(&self.inner.table).resolve(topic_name);
        (Arc::new(envelope), matched)
    }

    /// Claims `m` for invocation; see [`SubscriptionTable::claim`].
    fn claim(&self, m: &Matched) -> bool {
        lock(&self.inner.table).claim(m)
    }

    fn dispatch_async(&self, envelope: &Arc<EventEnvelope>, matched: Vec<Matched>) {
        for m in matched {
            if !self.claim(&m) {
                continue;
            }
            let bus = self.clone();
            let env = Arc::clone(envelope);
            tokio::spawn(async move {
                if let Err(err) = invoke(&m.listener, Arc::clone(&env)).await {
                    bus.report_failure(&env, &m, &err);
                }
            });
        }
    }

    async fn dispatch_sync(&self, envelope: &Arc<EventEnvelope>, matched: Vec<Matched>) {
        for m in matched {
            if !self.claim(&m) {
                continue;
            }
            match invoke(&m.listener, Arc::clone(envelope)).await {
                Ok(Dispatch::Continue) => {}
                Ok(Dispatch::Cancel(reason)) => {
                    debug!(
                        topic = %envelope.topic,
                        listener = m.listener.name(),
                        %reason,
                        "dispatch cancelled"
                    );
                    self.emit_meta(
                        EVENT_CANCELLED,
                        json!({
                            "topic": envelope.topic(),
                            "eventId": envelope.metadata.event_id,
                            "reason": reason,
                        }),
                    );
                    break;
                }
                Err(err) => self.report_failure(envelope, &m, &err),
            }
        }
    }

    async fn dispatch_parallel(&self, envelope: &Arc<EventEnvelope>, matched: Vec<Matched>) {
        let claimed: Vec<Matched> = matched.into_iter().filter(|m| self.claim(m)).collect();
        let runs = claimed.into_iter().map(|m| async move {
            if let Err(err) = invoke(&m.listener, Arc::clone(envelope)).await {
                self.report_failure(envelope, &m, &err);
            }
        });
        join_all(runs).await;
    }

    /// Logs a listener failure and republishes it on `listener-error`.
    fn report_failure(&self, envelope: &EventEnvelope, m: &Matched, err: &ListenerError) {
        if envelope.topic() == LISTENER_ERROR {
            error!(
                listener = m.listener.name(),
                error = %err,
                "listener failed while handling listener-error; not re-published"
            );
            return;
        }
        warn!(
            topic = %envelope.topic,
            listener = m.listener.name(),
            label = err.as_label(),
            error = %err,
            "listener failed"
        );
        self.emit_meta(
            LISTENER_ERROR,
            json!({
                "topic": envelope.topic(),
                "eventId": envelope.metadata.event_id,
                "listener": m.listener.name(),
                "error": err.to_string(),
            }),
        );
    }

    /// Publishes a bus-owned meta event without waiting for its listeners.
    fn emit_meta(&self, topic_name: &'static str, data: Value) {
        let (envelope, matched) = self.prepare(topic_name, data, None);
        if matched.is_empty() {
            return;
        }
        let started = Instant::now();
        self.dispatch_async(&envelope, matched);
        lock(&self.inner.stats).record_delivery(started.elapsed());
    }
}

/// Runs one listener, turning a panic into [`ListenerError::Panicked`].
async fn invoke(listener: &ListenerRef, envelope: Arc<EventEnvelope>) -> ListenerResult {
    match AssertUnwindSafe(listener.on_event(envelope))
        .catch_unwind()
        .await
    {
        Ok(res) => res,
        Err(panic) => Err(ListenerError::Panicked {
            info: panic_message(panic.as_ref()),
        }),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
