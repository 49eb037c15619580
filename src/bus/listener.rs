//! # Bus listeners.
//!
//! Provides [`Listen`], the extension point for handling envelopes published
//! on an [`EventBus`](crate::EventBus), and [`ListenerFn`], a closure-backed
//! implementation.
//!
//! ## Rules
//! - A listener returns [`Dispatch::Continue`] or [`Dispatch::Cancel`]; only
//!   `Sync` dispatch honors cancellation.
//! - Errors and panics are caught per listener and reported on the
//!   `listener-error` meta-topic; they never reach the publisher.
//! - Listeners must not block the executor; use async I/O.
//!
//! ## Example
//! ```rust
//! use agentvisor::{Dispatch, ListenerFn, ListenerRef};
//!
//! let audit: ListenerRef = ListenerFn::arc("audit", |env| async move {
//!     if env.data.is_null() {
//!         return Ok(Dispatch::cancel("empty payload"));
//!     }
//!     Ok(Dispatch::Continue)
//! });
//! assert_eq!(audit.name(), "audit");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::bus::{Dispatch, EventEnvelope};
use crate::error::ListenerError;

/// Outcome of one listener invocation.
pub type ListenerResult = Result<Dispatch, ListenerError>;

/// Shared handle to a listener.
pub type ListenerRef = Arc<dyn Listen>;

/// Handler for bus envelopes.
///
/// The same envelope (`Arc`) is shared by every listener of one publish call.
#[async_trait]
pub trait Listen: Send + Sync + 'static {
    /// Handles a single envelope.
    async fn on_event(&self, envelope: Arc<EventEnvelope>) -> ListenerResult;

    /// Returns the listener name used in logs and `listener-error` payloads.
    ///
    /// The default uses `type_name::<Self>()`, which can be verbose; override it when possible.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Closure-backed listener.
///
/// Wraps `F: Fn(Arc<EventEnvelope>) -> Fut`, creating a fresh future per event.
/// Shared state goes into an explicit `Arc<...>` captured by the closure.
pub struct ListenerFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F, Fut> ListenerFn<F>
where
    F: Fn(Arc<EventEnvelope>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ListenerResult> + Send + 'static,
{
    /// Creates a new closure-backed listener.
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the listener and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

impl<F> std::fmt::Debug for ListenerFn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerFn").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F, Fut> Listen for ListenerFn<F>
where
    F: Fn(Arc<EventEnvelope>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ListenerResult> + Send + 'static,
{
    async fn on_event(&self, envelope: Arc<EventEnvelope>) -> ListenerResult {
        (self.f)(envelope).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}
