//! # Runtime configuration.
//!
//! Provides [`BusConfig`] and [`SupervisorConfig`], centralized settings for
//! the event bus and the process supervisor.
//!
//! ## Sentinel values
//! - `listener_warn_threshold = 0` → leak warning disabled
//! - `buffer_capacity` / `event_capacity` are clamped to a minimum of 1

use std::time::Duration;

use crate::bus::EmitMode;

/// Configuration for an [`EventBus`](crate::EventBus).
///
/// ## Field semantics
/// - `default_mode`: fan-out mode used when neither the publish call nor a topic override picks one
/// - `listener_warn_threshold`: warn once a single pattern has more listeners than this (`0` = never)
#[derive(Clone, Debug)]
pub struct BusConfig {
    /// Fan-out mode applied when nothing more specific is configured.
    pub default_mode: EmitMode,

    /// Number of listeners per pattern above which a possible leak is logged.
    ///
    /// - `0` = disabled
    /// - `n > 0` = `tracing::warn!` when the `n + 1`-th listener is added to one pattern
    pub listener_warn_threshold: usize,
}

impl BusConfig {
    /// Returns the leak-warning threshold as an `Option`.
    #[inline]
    pub fn warn_threshold(&self) -> Option<usize> {
        match self.listener_warn_threshold {
            0 => None,
            n => Some(n),
        }
    }
}

impl Default for BusConfig {
    /// Default configuration:
    ///
    /// - `default_mode = EmitMode::Async`
    /// - `listener_warn_threshold = 10`
    fn default() -> Self {
        Self {
            default_mode: EmitMode::Async,
            listener_warn_threshold: 10,
        }
    }
}

/// Configuration for a [`ProcessSupervisor`](crate::ProcessSupervisor).
///
/// ## Field semantics
/// - `buffer_capacity`: lines retained per stream per process (FIFO eviction)
/// - `purge_grace`: delay between a terminal status and removal from the registry
/// - `terminate_timeout`: default wait between graceful and forceful stop
/// - `event_capacity`: ring buffer size of the notification channel
#[derive(Clone, Debug)]
pub struct SupervisorConfig {
    /// Maximum number of lines kept per output stream.
    pub buffer_capacity: usize,

    /// How long an exited process stays queryable before it is purged.
    ///
    /// Lets output that is still in flight when the exit is observed be captured.
    pub purge_grace: Duration,

    /// Escalation timeout used by `ProcessSupervisor::terminate`.
    pub terminate_timeout: Duration,

    /// Capacity of the notification broadcast channel.
    ///
    /// Slow receivers that lag behind more than `event_capacity` notifications
    /// skip the oldest ones.
    pub event_capacity: usize,
}

impl SupervisorConfig {
    /// Output buffer capacity clamped to a minimum of 1.
    #[inline]
    pub fn buffer_capacity_clamped(&self) -> usize {
        self.buffer_capacity.max(1)
    }

    /// Notification channel capacity clamped to a minimum of 1.
    #[inline]
    pub fn event_capacity_clamped(&self) -> usize {
        self.event_capacity.max(1)
    }
}

impl Default for SupervisorConfig {
    /// Default configuration:
    ///
    /// - `buffer_capacity = 1000`
    /// - `purge_grace = 5s`
    /// - `terminate_timeout = 10s`
    /// - `event_capacity = 1024`
    fn default() -> Self {
        Self {
            buffer_capacity: 1000,
            purge_grace: Duration::from_secs(5),
            terminate_timeout: Duration::from_secs(10),
            event_capacity: 1024,
        }
    }
}
