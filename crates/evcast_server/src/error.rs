//! Error types for the producer node.

use evcast_core::CoreError;
use evcast_dispatch::DispatchError;
use evcast_protocol::ProtocolError;
use thiserror::Error;

/// Result type for producer-node operations.
pub type NodeResult<T> = Result<T, NodeError>;

/// Errors surfaced by the producer node.
#[derive(Error, Debug)]
pub enum NodeError {
    /// Malformed registration input. Reported to the caller, never
    /// retried.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The local store could not persist a record. Fatal to the
    /// current operation.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Updating the remote mirror failed. Surfaced, never
    /// auto-retried; the next genuine local update re-attempts it.
    #[error("reconciliation failed for {consumer}: {message}")]
    Reconciliation {
        /// Callback URL of the consumer being reconciled.
        consumer: String,
        /// What went wrong.
        message: String,
    },

    /// Registry error.
    #[error(transparent)]
    Registry(#[from] CoreError),

    /// Wire protocol error.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Remote transport error outside the reconciliation path.
    #[error(transparent)]
    Transport(#[from] DispatchError),
}

impl NodeError {
    /// Builds a reconciliation error for one consumer.
    pub fn reconciliation(consumer: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Reconciliation {
            consumer: consumer.into(),
            message: message.to_string(),
        }
    }

    /// Returns true if this is the caller's fault (4xx).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            NodeError::Validation(_)
                | NodeError::Protocol(_)
                | NodeError::Registry(CoreError::DuplicateConsumer(_))
                | NodeError::Registry(CoreError::UnknownConsumer(_))
        )
    }

    /// Returns true if this is the node's fault (5xx).
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            NodeError::Persistence(_) | NodeError::Reconciliation { .. } | NodeError::Transport(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_classification() {
        assert!(NodeError::Validation("bad input".into()).is_client_error());
        assert!(!NodeError::Validation("bad input".into()).is_server_error());

        let err = NodeError::reconciliation("https://c.example.com", "mirror unreachable");
        assert!(err.is_server_error());
        assert!(err.to_string().contains("c.example.com"));
    }

    #[test]
    fn registry_errors_pass_through() {
        let err = NodeError::from(CoreError::UnknownConsumer("https://c.example.com".into()));
        assert!(err.is_client_error());
        assert_eq!(err.to_string(), "unknown consumer: https://c.example.com");
    }
}
