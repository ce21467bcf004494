//! # evcast Dispatch
//!
//! Notification dispatch state machine and retry scheduling for evcast.
//!
//! This crate provides:
//! - Delivery state machine (candidate → probed → attempted → terminal)
//! - Liveness probing abstraction
//! - Remote site client abstraction (mock for testing)
//! - Retry queue with atomic compare-and-enqueue
//! - Backoff policy with ceiling and dead-letter transition
//!
//! ## Architecture
//!
//! When an event is committed, the dispatcher enumerates every consumer
//! holding an approved subscription for the event's document type and
//! attempts one delivery per consumer, independently. A failed attempt
//! is handed to the retry queue with a cooldown delay instead of
//! blocking a worker; the queue's compare-and-enqueue keeps at most one
//! retry outstanding per consumer.
//!
//! ## Key Invariants
//!
//! - At most one outstanding retry per consumer
//! - Delivery failure is an outcome, never an error — it feeds the
//!   retry loop rather than aborting it
//! - A retry fires as a fresh attempt and re-checks the consumer's
//!   approval state first, so revocation turns it into a no-op

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod dispatcher;
mod error;
mod prober;
mod queue;
mod site_client;

pub use config::{DispatchConfig, RetryPolicy};
pub use dispatcher::{
    DeliveryOutcome, DeliveryState, DispatchStats, NotificationAttempt, NotificationDispatcher,
};
pub use error::{DispatchError, DispatchResult};
pub use prober::{LivenessProber, MockProber, ProbeOutcome};
pub use queue::{MemoryRetryQueue, RetryJob, RetryQueue};
pub use site_client::{MockSiteClient, RemoteSite, RemoteSiteClient};
