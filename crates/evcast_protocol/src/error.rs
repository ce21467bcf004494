//! Error types for the wire protocol.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while encoding, decoding, or validating messages.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Message body is not valid JSON or is missing required fields.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// Status value outside the closed enumeration.
    #[error("invalid subscription status: {0:?}")]
    InvalidStatus(String),

    /// Remote command name not recognized.
    #[error("unknown remote command: {0:?}")]
    UnknownCommand(String),

    /// Registration input failed validation.
    #[error("validation failed: {0}")]
    Validation(String),
}

impl ProtocolError {
    /// Wraps a serde_json error as a malformed-message error.
    pub fn malformed(err: impl std::fmt::Display) -> Self {
        Self::Malformed(err.to_string())
    }
}
