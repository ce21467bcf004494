//! The subscription registry.

use crate::consumer::Consumer;
use crate::error::{CoreError, CoreResult};
use evcast_protocol::SubscriptionStatus;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Origin of a consumer-record write.
///
/// The origin replaces a persisted "incoming change" flag on the
/// record: it is an explicit parameter of every write, so concurrent
/// writers can never misread a stale flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOrigin {
    /// A genuine local change, e.g. an administrative approval.
    Local,
    /// A change caused by an incoming reconciliation push (or by
    /// registration itself), which must not echo back outward.
    Reconciliation,
}

/// Whether a completed write must trigger an outward reconciliation
/// pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileHint {
    /// Push the consumer's statuses to its remote mirror record.
    Trigger,
    /// Do nothing; the write was an echo.
    Suppress,
}

impl ReconcileHint {
    fn for_origin(origin: WriteOrigin) -> Self {
        match origin {
            WriteOrigin::Local => ReconcileHint::Trigger,
            WriteOrigin::Reconciliation => ReconcileHint::Suppress,
        }
    }

    /// Returns true if reconciliation must run.
    pub fn should_reconcile(&self) -> bool {
        matches!(self, ReconcileHint::Trigger)
    }
}

/// Local store of consumer records, keyed by callback URL.
///
/// The registry owns two invariants: at most one active record per
/// callback URL, and single-writer-at-a-time semantics for each
/// record's read-modify-write (all mutation runs under the registry's
/// write lock).
#[derive(Default)]
pub struct SubscriptionRegistry {
    consumers: RwLock<HashMap<String, Consumer>>,
}

impl SubscriptionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            consumers: RwLock::new(HashMap::new()),
        }
    }

    /// Inserts a new consumer record.
    pub fn insert(&self, consumer: Consumer) -> CoreResult<()> {
        let mut consumers = self.consumers.write();
        if consumers.contains_key(&consumer.callback_url) {
            return Err(CoreError::DuplicateConsumer(consumer.callback_url));
        }
        consumers.insert(consumer.callback_url.clone(), consumer);
        Ok(())
    }

    /// Returns a snapshot of a consumer record.
    pub fn get(&self, callback_url: &str) -> Option<Consumer> {
        self.consumers.read().get(callback_url).cloned()
    }

    /// Applies a mutation to a consumer record under the write lock.
    ///
    /// Returns whether the caller must run an outward reconciliation
    /// pass for this write. A failed mutation leaves the record
    /// untouched.
    pub fn update<F>(
        &self,
        callback_url: &str,
        origin: WriteOrigin,
        mutate: F,
    ) -> CoreResult<ReconcileHint>
    where
        F: FnOnce(&mut Consumer) -> CoreResult<()>,
    {
        let mut consumers = self.consumers.write();
        let consumer = consumers
            .get_mut(callback_url)
            .ok_or_else(|| CoreError::UnknownConsumer(callback_url.to_string()))?;

        let mut staged = consumer.clone();
        mutate(&mut staged)?;
        *consumer = staged;

        Ok(ReconcileHint::for_origin(origin))
    }

    /// Sets one subscription status on a consumer record.
    pub fn set_status(
        &self,
        callback_url: &str,
        ref_doctype: &str,
        status: SubscriptionStatus,
        origin: WriteOrigin,
    ) -> CoreResult<ReconcileHint> {
        self.update(callback_url, origin, |consumer| {
            consumer.set_status(ref_doctype, status)
        })
    }

    /// Returns the callback URLs of all consumers holding an approved
    /// subscription for a doctype.
    pub fn approved_for(&self, ref_doctype: &str) -> Vec<String> {
        self.consumers
            .read()
            .values()
            .filter(|consumer| consumer.is_approved_for(ref_doctype))
            .map(|consumer| consumer.callback_url.clone())
            .collect()
    }

    /// Removes a consumer record (external administrative action).
    ///
    /// Outstanding retries for the consumer become no-ops when they
    /// fire; they are not cancelled here.
    pub fn remove(&self, callback_url: &str) -> Option<Consumer> {
        self.consumers.write().remove(callback_url)
    }

    /// Returns the number of registered consumers.
    pub fn len(&self) -> usize {
        self.consumers.read().len()
    }

    /// Returns true if no consumers are registered.
    pub fn is_empty(&self) -> bool {
        self.consumers.read().is_empty()
    }
}
