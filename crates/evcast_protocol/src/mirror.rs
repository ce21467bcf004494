//! The remote mirror record.

use crate::error::{ProtocolError, ProtocolResult};
use crate::status::SubscriptionStatus;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One entry of a mirror's event configuration.
///
/// An entry references a document type either directly or through a
/// named doctype mapping on the consumer's node. The producer writes
/// the approval status back under the original entry key, never under
/// the resolved one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventConfigEntry {
    /// Document type as the consumer's node names it.
    pub ref_doctype: String,
    /// Named doctype mapping, when the consumer's name differs from
    /// the producer's.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapping: Option<String>,
    /// Approval status projected from the producer's registry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<SubscriptionStatus>,
}

impl EventConfigEntry {
    /// Creates an entry that references a doctype directly.
    pub fn direct(ref_doctype: impl Into<String>) -> Self {
        Self {
            ref_doctype: ref_doctype.into(),
            mapping: None,
            status: None,
        }
    }

    /// Creates an entry that resolves through a named mapping.
    pub fn via_mapping(ref_doctype: impl Into<String>, mapping: impl Into<String>) -> Self {
        Self {
            ref_doctype: ref_doctype.into(),
            mapping: Some(mapping.into()),
            status: None,
        }
    }

    /// Returns true if the entry resolves through a mapping.
    pub fn has_mapping(&self) -> bool {
        self.mapping.is_some()
    }
}

/// The consumer node's mirrored record of one producer.
///
/// This record lives on the consumer's node and is read and written
/// only through the remote site client during a reconciliation pass;
/// it is never cached locally beyond the duration of one pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProducerMirror {
    /// URL identifying the producer this record mirrors.
    pub producer_url: String,
    /// Per-doctype subscription configuration.
    #[serde(default)]
    pub event_configuration: Vec<EventConfigEntry>,
    /// One-shot echo marker: set by the producer's reconciliation push
    /// so the consumer's update handler skips re-triggering
    /// reconciliation back toward the producer.
    #[serde(default)]
    pub incoming_change: bool,
}

impl ProducerMirror {
    /// Document type of mirror records on the consumer's node.
    pub const DOCTYPE: &'static str = "producer_mirror";

    /// Document type of named doctype mappings on the consumer's node.
    pub const MAPPING_DOCTYPE: &'static str = "doctype_mapping";

    /// Field of a mapping document naming the producer-side doctype.
    pub const MAPPING_FIELD: &'static str = "remote_doctype";

    /// Creates a new mirror record.
    pub fn new(producer_url: impl Into<String>, event_configuration: Vec<EventConfigEntry>) -> Self {
        Self {
            producer_url: producer_url.into(),
            event_configuration,
            incoming_change: false,
        }
    }

    /// Converts the record to a JSON document.
    pub fn to_value(&self) -> ProtocolResult<Value> {
        serde_json::to_value(self).map_err(ProtocolError::malformed)
    }

    /// Reads the record from a JSON document.
    pub fn from_value(value: Value) -> ProtocolResult<Self> {
        serde_json::from_value(value).map_err(ProtocolError::malformed)
    }
}
