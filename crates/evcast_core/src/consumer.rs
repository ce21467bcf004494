//! Consumer records.

use crate::error::{CoreError, CoreResult};
use evcast_protocol::SubscriptionStatus;

/// One (document type, status) subscription of a consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionEntry {
    /// Document type the consumer wants events for.
    pub ref_doctype: String,
    /// Approval status of this subscription.
    pub status: SubscriptionStatus,
}

impl SubscriptionEntry {
    /// Creates a pending entry for a doctype.
    pub fn pending(ref_doctype: impl Into<String>) -> Self {
        Self {
            ref_doctype: ref_doctype.into(),
            status: SubscriptionStatus::Pending,
        }
    }
}

/// A remote node that wants to be notified of new events.
///
/// The callback URL is the record's stable identity and the endpoint
/// used for both liveness probing and delivery notification. The
/// credential pair is issued at registration and authenticates the
/// producer's outbound calls to the consumer's node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Consumer {
    /// Callback URL; unique, stable identity.
    pub callback_url: String,
    /// User on whose behalf the consumer registered.
    pub user: String,
    /// Issued API key.
    pub api_key: String,
    /// Issued API secret.
    pub api_secret: String,
    /// Per-doctype subscriptions, doctypes unique within the record.
    pub subscriptions: Vec<SubscriptionEntry>,
}

impl Consumer {
    /// Creates a consumer with no subscriptions.
    pub fn new(
        callback_url: impl Into<String>,
        user: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        Self {
            callback_url: callback_url.into(),
            user: user.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            subscriptions: Vec::new(),
        }
    }

    /// Appends a pending subscription entry.
    ///
    /// Doctypes are unique within a consumer: a second entry for the
    /// same doctype is rejected rather than collapsed.
    pub fn add_subscription(&mut self, ref_doctype: impl Into<String>) -> CoreResult<()> {
        let ref_doctype = ref_doctype.into();
        if self.subscription_status(&ref_doctype).is_some() {
            return Err(CoreError::DuplicateSubscription {
                consumer: self.callback_url.clone(),
                ref_doctype,
            });
        }
        self.subscriptions.push(SubscriptionEntry::pending(ref_doctype));
        Ok(())
    }

    /// Returns the status of the subscription for a doctype, if any.
    pub fn subscription_status(&self, ref_doctype: &str) -> Option<SubscriptionStatus> {
        self.subscriptions
            .iter()
            .find(|entry| entry.ref_doctype == ref_doctype)
            .map(|entry| entry.status)
    }

    /// Sets the status of an existing subscription entry.
    pub fn set_status(
        &mut self,
        ref_doctype: &str,
        status: SubscriptionStatus,
    ) -> CoreResult<()> {
        let entry = self
            .subscriptions
            .iter_mut()
            .find(|entry| entry.ref_doctype == ref_doctype)
            .ok_or_else(|| CoreError::UnknownSubscription {
                consumer: self.callback_url.clone(),
                ref_doctype: ref_doctype.to_string(),
            })?;
        entry.status = status;
        Ok(())
    }

    /// Returns true if the doctype is subscribed and approved.
    pub fn is_approved_for(&self, ref_doctype: &str) -> bool {
        self.subscription_status(ref_doctype)
            .is_some_and(|status| status.is_approved())
    }

    /// Returns true if any subscription is approved.
    ///
    /// Used as the cancellation guard before a delivery attempt: a
    /// consumer whose approvals were all revoked is skipped, not
    /// retried.
    pub fn has_any_approved(&self) -> bool {
        self.subscriptions
            .iter()
            .any(|entry| entry.status.is_approved())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn consumer() -> Consumer {
        Consumer::new("https://c.example.com", "ops@example.com", "key", "secret")
    }

    #[test]
    fn subscriptions_start_pending() {
        let mut c = consumer();
        c.add_subscription("order").unwrap();

        assert_eq!(
            c.subscription_status("order"),
            Some(SubscriptionStatus::Pending)
        );
        assert!(!c.is_approved_for("order"));
        assert!(!c.has_any_approved());
    }

    #[test]
    fn duplicate_doctype_is_rejected() {
        let mut c = consumer();
        c.add_subscription("order").unwrap();

        let err = c.add_subscription("order").unwrap_err();
        assert!(matches!(err, CoreError::DuplicateSubscription { .. }));
        assert_eq!(c.subscriptions.len(), 1);
    }

    #[test]
    fn status_updates() {
        let mut c = consumer();
        c.add_subscription("order").unwrap();
        c.set_status("order", SubscriptionStatus::Approved).unwrap();

        assert!(c.is_approved_for("order"));
        assert!(c.has_any_approved());

        c.set_status("order", SubscriptionStatus::Rejected).unwrap();
        assert!(!c.has_any_approved());
    }

    #[test]
    fn unknown_doctype_status_update_fails() {
        let mut c = consumer();
        let err = c
            .set_status("invoice", SubscriptionStatus::Approved)
            .unwrap_err();
        assert!(matches!(err, CoreError::UnknownSubscription { .. }));
    }
}
