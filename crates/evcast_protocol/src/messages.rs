//! Registration and trigger messages.

use crate::error::{ProtocolError, ProtocolResult};
use serde::{Deserialize, Serialize};

/// Registration request from a consumer node.
///
/// Sent to the producer's guest-accessible registration endpoint. The
/// callback URL doubles as the consumer's stable identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRequest {
    /// Endpoint used for liveness probing and delivery notification.
    pub callback_url: String,
    /// User on whose behalf the consumer registers.
    pub user: String,
    /// Document types the consumer wants events for.
    pub subscribed_doctypes: Vec<String>,
}

impl RegisterRequest {
    /// Creates a new registration request.
    pub fn new(
        callback_url: impl Into<String>,
        user: impl Into<String>,
        subscribed_doctypes: Vec<String>,
    ) -> Self {
        Self {
            callback_url: callback_url.into(),
            user: user.into(),
            subscribed_doctypes,
        }
    }

    /// Validates the request.
    ///
    /// The doctype list must be non-empty once de-duplicated, and the
    /// callback URL must be a syntactically valid http(s) endpoint.
    pub fn validate(&self) -> ProtocolResult<()> {
        if self.normalized_doctypes().is_empty() {
            return Err(ProtocolError::Validation(
                "subscribed_doctypes must not be empty".into(),
            ));
        }
        validate_endpoint(&self.callback_url)?;
        if self.user.trim().is_empty() {
            return Err(ProtocolError::Validation("user must not be empty".into()));
        }
        Ok(())
    }

    /// Returns the requested doctypes as a de-duplicated set,
    /// preserving first-seen order.
    pub fn normalized_doctypes(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.subscribed_doctypes
            .iter()
            .filter(|d| !d.trim().is_empty())
            .filter(|d| seen.insert(d.as_str()))
            .cloned()
            .collect()
    }

    /// Encodes to JSON.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(ProtocolError::malformed)
    }

    /// Decodes from JSON.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        serde_json::from_slice(bytes).map_err(ProtocolError::malformed)
    }
}

/// Registration response from the producer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterResponse {
    /// Issued API key.
    pub api_key: String,
    /// Issued API secret.
    pub api_secret: String,
    /// Sync cursor: the consumer's future pulls start strictly after
    /// this point in the producer's event log (unix millis).
    pub last_update: u64,
}

impl RegisterResponse {
    /// Creates a new registration response.
    pub fn new(
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        last_update: u64,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            last_update,
        }
    }

    /// Encodes to JSON.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(ProtocolError::malformed)
    }

    /// Decodes from JSON.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        serde_json::from_slice(bytes).map_err(ProtocolError::malformed)
    }
}

/// Internal notification-trigger message.
///
/// Posted service-to-service when an event for `ref_doctype` has been
/// committed; the side effect is asynchronous dispatch to all approved
/// subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyTrigger {
    /// Document type of the committed event.
    pub ref_doctype: String,
}

impl NotifyTrigger {
    /// Creates a new trigger message.
    pub fn new(ref_doctype: impl Into<String>) -> Self {
        Self {
            ref_doctype: ref_doctype.into(),
        }
    }

    /// Encodes to JSON.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(ProtocolError::malformed)
    }

    /// Decodes from JSON.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        serde_json::from_slice(bytes).map_err(ProtocolError::malformed)
    }
}

/// Validates that a callback address is a syntactically plausible
/// http(s) endpoint.
fn validate_endpoint(url: &str) -> ProtocolResult<()> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or_else(|| {
            ProtocolError::Validation(format!("callback_url must be http(s): {url:?}"))
        })?;

    let host = rest.split('/').next().unwrap_or("");
    if host.is_empty() || url.chars().any(char::is_whitespace) {
        return Err(ProtocolError::Validation(format!(
            "callback_url is not a valid endpoint: {url:?}"
        )));
    }
    Ok(())
}
