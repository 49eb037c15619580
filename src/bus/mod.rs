//! Hierarchical publish/subscribe bus.
//!
//! This module groups the envelope **data model**, the listener extension
//! point and the [`EventBus`] dispatcher used to decouple process/state
//! events from their consumers.
//!
//! ## Contents
//! - [`EventEnvelope`], [`EventMetadata`] payload plus delivery metadata
//! - [`EmitMode`], [`Dispatch`] fan-out discipline and listener verdict
//! - [`Listen`], [`ListenerFn`], [`ListenerRef`] listener extension point
//! - [`EventBus`], [`PublishOptions`], [`BusStats`] dispatcher and its counters
//! - [`topic`] pattern matching helpers
//!
//! ## Quick reference
//! - **Publishers**: collaborators (scheduler, state machine), [`EventBridge`](crate::EventBridge).
//! - **Consumers**: any [`Listen`] implementation registered with `on`/`once`.
//! - **Meta-topics**: [`EVENT_CANCELLED`], [`LISTENER_ERROR`] are produced by the bus only.

mod envelope;
mod event_bus;
mod listener;
#[cfg(feature = "logging")]
mod log;
mod mode;
mod stats;
mod table;
pub mod topic;

pub use envelope::{EventEnvelope, EventMetadata};
pub use event_bus::{EVENT_CANCELLED, EventBus, LISTENER_ERROR, PublishOptions};
pub use listener::{Listen, ListenerFn, ListenerRef, ListenerResult};
#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use mode::{Dispatch, EmitMode};
pub use stats::BusStats;
pub use table::SubscriptionId;
