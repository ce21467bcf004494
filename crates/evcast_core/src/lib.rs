//! # evcast Core
//!
//! Consumer records, the subscription registry, and the committed-event
//! log for evcast.
//!
//! This crate provides:
//! - The [`Consumer`] record and its subscription entries
//! - The [`SubscriptionRegistry`] with write-origin tracking
//! - The [`UpdateLog`] of committed events and sync-cursor computation
//!
//! ## Key Invariants
//!
//! - At most one active consumer record per callback URL
//! - Document types are unique within one consumer's subscriptions
//! - A registry read-modify-write runs under the record's write lock
//!   (single writer at a time)
//! - A write tagged [`WriteOrigin::Reconciliation`] never asks for an
//!   outward reconciliation pass; a genuine local write asks for
//!   exactly one

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod consumer;
mod error;
mod registry;
mod update_log;

pub use consumer::{Consumer, SubscriptionEntry};
pub use error::{CoreError, CoreResult};
pub use registry::{ReconcileHint, SubscriptionRegistry, WriteOrigin};
pub use update_log::{now_millis, UpdateLog, UpdateLogEntry};
