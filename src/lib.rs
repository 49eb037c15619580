//! # agentvisor
//!
//! **Agentvisor** is the runtime plumbing of an agent orchestrator: a
//! hierarchical publish/subscribe [`EventBus`] and a [`ProcessSupervisor`]
//! that tracks agent subprocesses, captures their output and stops them.
//!
//! The crate is a building block. It does not schedule agents, persist
//! state or launch processes on its own; collaborators hand it
//! [`ProcessHandle`]s and subscribe to topics.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   collaborator                                          listeners
//!  (scheduler, CLI)                                   (audit, state machine)
//!        │ spawn                                                ▲
//!        ▼                                                      │ on("process:**")
//!  ProcessHandle ──► ┌───────────────────────────────┐          │
//!                    │  ProcessSupervisor            │          │
//!                    │  - registry (agent id ─► rec) │          │
//!                    │  - stdout/stderr buffers      │          │
//!                    │  - status marker scan         │          │
//!                    │  - graceful/force terminate   │          │
//!                    └───────────────┬───────────────┘          │
//!                                    │ Notifier (broadcast)     │
//!                                    ▼                          │
//!                              EventBridge ──► ┌────────────────┴─────────────┐
//!                                              │  EventBus                    │
//!  other publishers ─► publish(topic, data) ─► │  - subscription table        │
//!                                              │  - `*` / `**` topic matching │
//!                                              │  - Async / Sync / Parallel   │
//!                                              │  - statistics, meta-topics   │
//!                                              └──────────────────────────────┘
//! ```
//!
//! ### Process lifecycle
//! ```text
//! register_process ──► Spawning ──► Running ──┬─► Exited  (code 0)
//!                                             └─► Failed  (code ≠ 0, signal, spawn error)
//!                                                   │
//!                                                   └─ purge after SupervisorConfig::purge_grace
//! ```
//!
//! ## Features
//! | Area            | Description                                                 | Key types / traits                          |
//! |-----------------|-------------------------------------------------------------|---------------------------------------------|
//! | **Event bus**   | Topic patterns, fan-out modes, cancellation, statistics.    | [`EventBus`], [`EmitMode`], [`Dispatch`]    |
//! | **Listeners**   | Async handlers, closures or trait objects.                  | [`Listen`], [`ListenerFn`]                  |
//! | **Supervision** | Register, observe, query and terminate agent processes.     | [`ProcessSupervisor`], [`ProcessHandle`]    |
//! | **Bridge**      | Supervisor notifications as `process:*` bus topics.         | [`EventBridge`]                             |
//! | **Errors**      | Typed errors for supervisor commands and listeners.         | [`SupervisorError`], [`ListenerError`]      |
//! | **Configuration** | Centralized bus and supervisor settings.                  | [`BusConfig`], [`SupervisorConfig`]         |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] listener _(demo/reference only)_.
//!
//! ## Example
//! ```rust,no_run
//! use std::time::Duration;
//! use tokio::process::Command;
//! use tokio_util::sync::CancellationToken;
//! use agentvisor::{
//!     Dispatch, EventBridge, EventBus, ListenerFn, ProcessHandle, ProcessSupervisor,
//!     SupervisorConfig,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bus = EventBus::default();
//!     let sup = ProcessSupervisor::new(SupervisorConfig::default());
//!     let token = CancellationToken::new();
//!     EventBridge::spawn(&sup, bus.clone(), token.clone());
//!
//!     bus.on("process:status:*", ListenerFn::arc("status", |env| async move {
//!         println!("{} reported {}", env.data["agentId"], env.topic);
//!         Ok(Dispatch::Continue)
//!     }));
//!
//!     let mut cmd = Command::new("sh");
//!     cmd.arg("-c").arg("echo '[APM_STATUS:READY]'; sleep 30");
//!     let handle = ProcessHandle::spawn(&mut cmd)?;
//!     sup.register_process("impl-1", handle)?;
//!
//!     tokio::time::sleep(Duration::from_millis(200)).await;
//!     sup.terminate_process("impl-1", Duration::from_secs(2)).await?;
//!     token.cancel();
//!     Ok(())
//! }
//! ```
mod bridge;
mod bus;
mod config;
mod error;
mod process;

// ---- Public re-exports ----

pub use bridge::{BRIDGE_PUBLISHER, EventBridge};
pub use bus::topic;
pub use bus::{
    BusStats, Dispatch, EVENT_CANCELLED, EmitMode, EventBus, EventEnvelope, EventMetadata,
    LISTENER_ERROR, Listen, ListenerFn, ListenerRef, ListenerResult, PublishOptions,
    SubscriptionId,
};
pub use config::{BusConfig, SupervisorConfig};
pub use error::{ListenerError, SupervisorError};
pub use process::{
    Lifecycle, LifecycleSender, Notifier, OutputBuffer, OutputReader, OutputSnapshot,
    ProcessControl, ProcessEvent, ProcessEventKind, ProcessHandle, ProcessRecord, ProcessStatus,
    ProcessSupervisor, StatusMarker, StopLevel, StreamKind,
};

// Optional: expose a simple built-in logger listener (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use bus::LogWriter;
