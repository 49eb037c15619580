//! Agent process supervision.
//!
//! This module groups the **data model** of tracked processes, the handle
//! seam through which launched processes are handed over, and the
//! [`ProcessSupervisor`] that observes them.
//!
//! ## Contents
//! - [`ProcessHandle`], [`ProcessControl`], [`StopLevel`], [`LifecycleSender`] launch seam
//! - [`ProcessRecord`], [`ProcessStatus`] lifecycle snapshot
//! - [`OutputBuffer`], [`OutputSnapshot`], [`StreamKind`] bounded output capture
//! - [`StatusMarker`] in-band status protocol
//! - [`ProcessEvent`], [`ProcessEventKind`], [`Notifier`] notifications
//! - [`ProcessSupervisor`] registry and lifecycle manager
//!
//! ## Quick reference
//! - **Launchers**: [`ProcessHandle::spawn`] for real children, [`ProcessHandle::new`] for anything else.
//! - **Consumers**: [`ProcessSupervisor::subscribe`] or the [`EventBridge`](crate::EventBridge).

mod event;
mod handle;
mod marker;
mod notify;
mod output;
mod record;
mod supervisor;

pub use event::{ProcessEvent, ProcessEventKind};
pub use handle::{
    Lifecycle, LifecycleSender, OutputReader, ProcessControl, ProcessHandle, StopLevel,
};
pub use marker::StatusMarker;
pub use notify::Notifier;
pub use output::{OutputBuffer, OutputSnapshot, StreamKind};
pub use record::{ProcessRecord, ProcessStatus};
pub use supervisor::ProcessSupervisor;
