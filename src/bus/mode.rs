use serde::{Deserialize, Serialize};

/// Fan-out discipline for one publish call.
///
/// | Mode       | Invocation                      | `publish` resolves            | Cancellation |
/// |------------|---------------------------------|-------------------------------|--------------|
/// | `Async`    | every listener spawned          | immediately                   | ignored      |
/// | `Sync`     | one at a time, registration order | after the last listener     | honored      |
/// | `Parallel` | all at once                     | after every listener settled  | ignored      |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmitMode {
    #[default]
    Async,
    Sync,
    Parallel,
}

impl EmitMode {
    /// Returns a short stable label for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            EmitMode::Async => "async",
            EmitMode::Sync => "sync",
            EmitMode::Parallel => "parallel",
        }
    }
}

/// Listener verdict on the current dispatch.
///
/// Only [`EmitMode::Sync`] looks at it: `Cancel` stops the remaining
/// listeners and is reported on the `event-cancelled` meta-topic. Other
/// modes treat it as ordinary data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Dispatch {
    #[default]
    Continue,
    Cancel(String),
}

impl Dispatch {
    /// Shorthand for `Dispatch::Cancel(reason.into())`.
    pub fn cancel(reason: impl Into<String>) -> Self {
        Dispatch::Cancel(reason.into())
    }

    #[inline]
    pub fn is_cancel(&self) -> bool {
        matches!(self, Dispatch::Cancel(_))
    }
}
