//! Error types for dispatch operations.

use thiserror::Error;

/// Result type for dispatch operations.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Errors that can occur while talking to a remote site.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The remote node answered with something unintelligible.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The remote node rejected the call.
    #[error("remote rejected call: {0}")]
    Rejected(String),
}

impl DispatchError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            DispatchError::Transport { retryable, .. } => *retryable,
            DispatchError::Rejected(_) => true,
            DispatchError::Protocol(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(DispatchError::transport_retryable("connection reset").is_retryable());
        assert!(!DispatchError::transport_fatal("bad certificate").is_retryable());
        assert!(!DispatchError::Protocol("truncated body".into()).is_retryable());
    }

    #[test]
    fn error_display() {
        let err = DispatchError::transport_retryable("connection reset");
        assert_eq!(err.to_string(), "transport error: connection reset");
    }
}
