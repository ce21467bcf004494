//! Error types for evcast core.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in core operations.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A consumer record with this callback URL already exists.
    #[error("consumer already registered: {0}")]
    DuplicateConsumer(String),

    /// No consumer record with this callback URL.
    #[error("unknown consumer: {0}")]
    UnknownConsumer(String),

    /// A subscription entry for this doctype already exists on the
    /// consumer.
    #[error("duplicate subscription for {ref_doctype} on consumer {consumer}")]
    DuplicateSubscription {
        /// Consumer callback URL.
        consumer: String,
        /// Document type of the duplicate entry.
        ref_doctype: String,
    },

    /// The consumer holds no subscription entry for this doctype.
    #[error("no subscription for {ref_doctype} on consumer {consumer}")]
    UnknownSubscription {
        /// Consumer callback URL.
        consumer: String,
        /// Document type looked up.
        ref_doctype: String,
    },

    /// The backing store could not persist the record.
    #[error("persistence error: {0}")]
    Persistence(String),
}
