//! Remote site client abstraction.

use crate::error::{DispatchError, DispatchResult};
use evcast_core::Consumer;
use evcast_protocol::RemoteCommand;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Connection parameters for one consumer's node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSite {
    /// Base URL of the consumer's node.
    pub url: String,
    /// API key issued at registration.
    pub api_key: String,
    /// API secret issued at registration.
    pub api_secret: String,
}

impl From<&Consumer> for RemoteSite {
    fn from(consumer: &Consumer) -> Self {
        Self {
            url: consumer.callback_url.clone(),
            api_key: consumer.api_key.clone(),
            api_secret: consumer.api_secret.clone(),
        }
    }
}

/// Authenticated client for documents and methods on a remote node.
///
/// This trait abstracts the transport, allowing different
/// implementations (HTTP, loopback for testing). Failures surface as
/// transport errors; nothing is silently swallowed here — the
/// dispatcher decides which failures feed its retry loop.
pub trait RemoteSiteClient: Send + Sync {
    /// Fetches a document from the remote node.
    fn get_document(&self, site: &RemoteSite, doctype: &str, name: &str)
        -> DispatchResult<Value>;

    /// Fetches a single field of a remote document. `Ok(None)` means
    /// the document or field does not exist.
    fn get_field_value(
        &self,
        site: &RemoteSite,
        doctype: &str,
        name: &str,
        field: &str,
    ) -> DispatchResult<Option<String>>;

    /// Writes a document back to the remote node.
    fn update_document(
        &self,
        site: &RemoteSite,
        doctype: &str,
        name: &str,
        doc: &Value,
    ) -> DispatchResult<()>;

    /// Invokes a command on the remote node.
    fn invoke_remote_method(&self, site: &RemoteSite, command: &RemoteCommand)
        -> DispatchResult<()>;
}

type DocKey = (String, String);

/// A scriptable site client for testing.
///
/// Documents and field values are seeded ahead of a test; every
/// update and method invocation is recorded for assertions. A failure
/// switch makes all calls return a retryable transport error.
#[derive(Default)]
pub struct MockSiteClient {
    documents: Mutex<HashMap<DocKey, Value>>,
    field_values: Mutex<HashMap<(String, String, String), String>>,
    updates: Mutex<Vec<(DocKey, Value)>>,
    invocations: Mutex<Vec<(String, RemoteCommand)>>,
    failing: AtomicBool,
}

impl MockSiteClient {
    /// Creates an empty mock client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a remote document.
    pub fn put_document(&self, doctype: &str, name: &str, doc: Value) {
        self.documents
            .lock()
            .unwrap()
            .insert((doctype.to_string(), name.to_string()), doc);
    }

    /// Seeds a remote field value.
    pub fn put_field_value(&self, doctype: &str, name: &str, field: &str, value: &str) {
        self.field_values.lock().unwrap().insert(
            (doctype.to_string(), name.to_string(), field.to_string()),
            value.to_string(),
        );
    }

    /// Makes every call fail with a retryable transport error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Returns the recorded document updates.
    pub fn updates(&self) -> Vec<(DocKey, Value)> {
        self.updates.lock().unwrap().clone()
    }

    /// Returns the recorded method invocations.
    pub fn invocations(&self) -> Vec<(String, RemoteCommand)> {
        self.invocations.lock().unwrap().clone()
    }

    fn check_up(&self) -> DispatchResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(DispatchError::transport_retryable("mock transport down"))
        } else {
            Ok(())
        }
    }
}

impl RemoteSiteClient for MockSiteClient {
    fn get_document(
        &self,
        _site: &RemoteSite,
        doctype: &str,
        name: &str,
    ) -> DispatchResult<Value> {
        self.check_up()?;
        self.documents
            .lock()
            .unwrap()
            .get(&(doctype.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| {
                DispatchError::Rejected(format!("no such document: {doctype}/{name}"))
            })
    }

    fn get_field_value(
        &self,
        _site: &RemoteSite,
        doctype: &str,
        name: &str,
        field: &str,
    ) -> DispatchResult<Option<String>> {
        self.check_up()?;
        Ok(self
            .field_values
            .lock()
            .unwrap()
            .get(&(doctype.to_string(), name.to_string(), field.to_string()))
            .cloned())
    }

    fn update_document(
        &self,
        _site: &RemoteSite,
        doctype: &str,
        name: &str,
        doc: &Value,
    ) -> DispatchResult<()> {
        self.check_up()?;
        self.updates
            .lock()
            .unwrap()
            .push(((doctype.to_string(), name.to_string()), doc.clone()));
        Ok(())
    }

    fn invoke_remote_method(
        &self,
        site: &RemoteSite,
        command: &RemoteCommand,
    ) -> DispatchResult<()> {
        self.check_up()?;
        self.invocations
            .lock()
            .unwrap()
            .push((site.url.clone(), command.clone()));
        Ok(())
    }
}
