//! Subscription status enumeration.

use crate::error::{ProtocolError, ProtocolResult};
use serde::{Deserialize, Serialize};

/// Approval status of one (consumer, document type) subscription.
///
/// This is a closed enumeration: wire values other than `"Pending"`,
/// `"Approved"`, and `"Rejected"` are invalid input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubscriptionStatus {
    /// Requested at registration, awaiting an approval decision.
    Pending,
    /// Approved; the consumer is notified of matching events.
    Approved,
    /// Rejected; the consumer is never notified.
    Rejected,
}

impl SubscriptionStatus {
    /// Returns the wire form of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Pending => "Pending",
            SubscriptionStatus::Approved => "Approved",
            SubscriptionStatus::Rejected => "Rejected",
        }
    }

    /// Parses a wire value.
    pub fn parse(value: &str) -> ProtocolResult<Self> {
        match value {
            "Pending" => Ok(SubscriptionStatus::Pending),
            "Approved" => Ok(SubscriptionStatus::Approved),
            "Rejected" => Ok(SubscriptionStatus::Rejected),
            other => Err(ProtocolError::InvalidStatus(other.to_string())),
        }
    }

    /// Returns true if notifications may be delivered under this status.
    pub fn is_approved(&self) -> bool {
        matches!(self, SubscriptionStatus::Approved)
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
