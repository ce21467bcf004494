//! Typed remote commands.

use crate::error::{ProtocolError, ProtocolResult};
use serde_json::Value;

/// A command invoked on a remote node.
///
/// Both ends of the protocol share this enum; the string command name
/// exists only at the wire boundary, via [`RemoteCommand::wire_name`]
/// and [`RemoteCommand::from_wire`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCommand {
    /// Signals that new events are available to pull. Carries the
    /// producer's identity so the consumer knows which node to pull
    /// from; no event data is transferred.
    NewEventNotification {
        /// URL of the producer that committed the events.
        producer_url: String,
    },
}

impl RemoteCommand {
    /// Returns the wire name of the command.
    pub fn wire_name(&self) -> &'static str {
        match self {
            RemoteCommand::NewEventNotification { .. } => "evcast.new_event_notification",
        }
    }

    /// Returns the command arguments as a JSON document.
    pub fn to_args(&self) -> Value {
        match self {
            RemoteCommand::NewEventNotification { producer_url } => {
                serde_json::json!({ "producer_url": producer_url })
            }
        }
    }

    /// Reconstructs a command from its wire name and arguments.
    pub fn from_wire(name: &str, args: &Value) -> ProtocolResult<Self> {
        match name {
            "evcast.new_event_notification" => {
                let producer_url = args
                    .get("producer_url")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        ProtocolError::Malformed("new_event_notification missing producer_url".into())
                    })?;
                Ok(RemoteCommand::NewEventNotification {
                    producer_url: producer_url.to_string(),
                })
            }
            other => Err(ProtocolError::UnknownCommand(other.to_string())),
        }
    }
}
