//! Error types used by the event bus and the process supervisor.
//!
//! This module defines two main error enums:
//!
//! - [`SupervisorError`]: precondition violations reported by [`ProcessSupervisor`](crate::ProcessSupervisor).
//! - [`ListenerError`]: failures raised inside an [`EventBus`](crate::EventBus) listener.
//!
//! Both types provide helper methods (`as_label`, `as_message`) for logging/metrics.

use thiserror::Error;

/// # Errors produced by the process supervisor.
///
/// These are synchronous precondition failures. They are fatal to the single
/// call that produced them and never leave the supervisor's tables modified.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SupervisorError {
    /// An agent with this id is still tracked (running, or exited but not yet purged).
    #[error("agent {agent_id:?} is already registered")]
    AlreadyRegistered {
        /// The duplicated agent id.
        agent_id: String,
    },

    /// The supplied process handle carries no process identifier.
    #[error("process handle for agent {agent_id:?} has no pid")]
    MissingPid {
        /// The agent id the handle was offered for.
        agent_id: String,
    },

    /// No tracked process exists under this agent id.
    #[error("agent {agent_id:?} is not tracked")]
    NotFound {
        /// The unknown agent id.
        agent_id: String,
    },
}

impl SupervisorError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use agentvisor::SupervisorError;
    ///
    /// let err = SupervisorError::NotFound { agent_id: "impl-1".into() };
    /// assert_eq!(err.as_label(), "supervisor_not_found");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            SupervisorError::AlreadyRegistered { .. } => "supervisor_already_registered",
            SupervisorError::MissingPid { .. } => "supervisor_missing_pid",
            SupervisorError::NotFound { .. } => "supervisor_not_found",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            SupervisorError::AlreadyRegistered { agent_id } => {
                format!("duplicate registration: agent={agent_id}")
            }
            SupervisorError::MissingPid { agent_id } => {
                format!("handle without pid: agent={agent_id}")
            }
            SupervisorError::NotFound { agent_id } => format!("unknown agent: agent={agent_id}"),
        }
    }

    /// Agent id the failed call was addressed to.
    pub fn agent_id(&self) -> &str {
        match self {
            SupervisorError::AlreadyRegistered { agent_id }
            | SupervisorError::MissingPid { agent_id }
            | SupervisorError::NotFound { agent_id } => agent_id,
        }
    }
}

/// # Errors produced by bus listeners.
///
/// The bus catches these per listener and reports them on the
/// `listener-error` meta-topic; they never reach the publisher.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ListenerError {
    /// The listener returned an error.
    #[error("listener failed: {error}")]
    Failed {
        /// The underlying error message.
        error: String,
    },

    /// The listener panicked while handling an event.
    #[error("listener panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text.
        info: String,
    },
}

impl ListenerError {
    /// Builds a [`ListenerError::Failed`] from anything displayable.
    ///
    /// # Example
    /// ```
    /// use agentvisor::ListenerError;
    ///
    /// let err = ListenerError::fail("db unavailable");
    /// assert_eq!(err.as_label(), "listener_failed");
    /// ```
    pub fn fail(error: impl std::fmt::Display) -> Self {
        ListenerError::Failed {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ListenerError::Failed { .. } => "listener_failed",
            ListenerError::Panicked { .. } => "listener_panicked",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            ListenerError::Failed { error } => format!("error: {error}"),
            ListenerError::Panicked { info } => format!("panic: {info}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supervisor_error_exposes_agent_id() {
        let err = SupervisorError::AlreadyRegistered {
            agent_id: "manager".into(),
        };
        assert_eq!(err.agent_id(), "manager");
        assert_eq!(err.as_label(), "supervisor_already_registered");
        assert_eq!(err.to_string(), "agent \"manager\" is already registered");
    }

    #[test]
    fn test_listener_error_messages() {
        let err = ListenerError::Panicked { info: "boom".into() };
        assert_eq!(err.as_label(), "listener_panicked");
        assert_eq!(err.as_message(), "panic: boom");
    }
}
