//! HTTP implementations of the remote-site boundary.
//!
//! The actual HTTP stack is abstracted behind [`HttpBackend`] so
//! different clients (reqwest, ureq, a loopback for tests) can carry
//! the same signed protocol. Requests are authenticated with the
//! consumer's issued credentials: the API key travels in a header and
//! the payload is signed with HMAC-SHA256.

use crate::auth::RequestSigner;
use evcast_dispatch::{
    DispatchError, DispatchResult, LivenessProber, ProbeOutcome, RemoteSite, RemoteSiteClient,
};
use evcast_protocol::RemoteCommand;
use serde_json::Value;

/// Header carrying the issued API key.
pub const API_KEY_HEADER: &str = "x-evcast-key";
/// Header carrying the request signature.
pub const SIGNATURE_HEADER: &str = "x-evcast-signature";

/// A minimal HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client abstraction.
///
/// Implementations own connection pooling and timeouts; errors are
/// reported as strings and mapped to transport errors by the caller.
pub trait HttpBackend: Send + Sync {
    /// Sends a GET request.
    fn get(&self, url: &str, headers: &[(String, String)]) -> Result<HttpResponse, String>;

    /// Sends a POST request with a JSON body.
    fn post(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: Vec<u8>,
    ) -> Result<HttpResponse, String>;
}

/// Liveness prober over an HTTP backend.
///
/// A single unauthenticated GET against the callback URL; HTTP 200
/// means online, anything else — including transport errors — means
/// offline.
pub struct HttpProber<B: HttpBackend> {
    backend: B,
}

impl<B: HttpBackend> HttpProber<B> {
    /// Creates a prober over the given backend.
    pub fn new(backend: B) -> Self {
        Self { backend }
    }
}

impl<B: HttpBackend> LivenessProber for HttpProber<B> {
    fn probe(&self, callback_url: &str) -> ProbeOutcome {
        match self.backend.get(callback_url, &[]) {
            Ok(response) if response.status == 200 => ProbeOutcome::Online,
            _ => ProbeOutcome::Offline,
        }
    }
}

/// Remote site client over an HTTP backend with signed requests.
pub struct HttpSiteClient<B: HttpBackend> {
    backend: B,
}

impl<B: HttpBackend> HttpSiteClient<B> {
    /// Creates a client over the given backend.
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    fn signed_headers(site: &RemoteSite, payload: &[u8]) -> Vec<(String, String)> {
        let signature = RequestSigner::new(site.api_secret.as_bytes()).sign(payload);
        vec![
            (API_KEY_HEADER.to_string(), site.api_key.clone()),
            (SIGNATURE_HEADER.to_string(), signature),
        ]
    }

    fn get_json(&self, site: &RemoteSite, url: &str) -> DispatchResult<Value> {
        let headers = Self::signed_headers(site, url.as_bytes());
        let response = self
            .backend
            .get(url, &headers)
            .map_err(DispatchError::transport_retryable)?;

        if !response.is_success() {
            return Err(DispatchError::Rejected(format!(
                "GET {url} answered {}",
                response.status
            )));
        }

        serde_json::from_slice(&response.body)
            .map_err(|e| DispatchError::Protocol(format!("invalid JSON from {url}: {e}")))
    }

    fn post_json(&self, site: &RemoteSite, url: &str, body: Vec<u8>) -> DispatchResult<HttpResponse> {
        let headers = Self::signed_headers(site, &body);
        let response = self
            .backend
            .post(url, &headers, body)
            .map_err(DispatchError::transport_retryable)?;

        if !response.is_success() {
            return Err(DispatchError::Rejected(format!(
                "POST {url} answered {}",
                response.status
            )));
        }
        Ok(response)
    }
}

impl<B: HttpBackend> RemoteSiteClient for HttpSiteClient<B> {
    fn get_document(
        &self,
        site: &RemoteSite,
        doctype: &str,
        name: &str,
    ) -> DispatchResult<Value> {
        let url = format!("{}/api/resource/{doctype}/{name}", site.url);
        self.get_json(site, &url)
    }

    fn get_field_value(
        &self,
        site: &RemoteSite,
        doctype: &str,
        name: &str,
        field: &str,
    ) -> DispatchResult<Option<String>> {
        let url = format!("{}/api/resource/{doctype}/{name}/{field}", site.url);
        let headers = Self::signed_headers(site, url.as_bytes());

        let response = self
            .backend
            .get(&url, &headers)
            .map_err(DispatchError::transport_retryable)?;

        if response.status == 404 {
            return Ok(None);
        }
        if !response.is_success() {
            return Err(DispatchError::Rejected(format!(
                "GET {url} answered {}",
                response.status
            )));
        }

        let value: Value = serde_json::from_slice(&response.body)
            .map_err(|e| DispatchError::Protocol(format!("invalid JSON from {url}: {e}")))?;
        Ok(value.as_str().map(str::to_string))
    }

    fn update_document(
        &self,
        site: &RemoteSite,
        doctype: &str,
        name: &str,
        doc: &Value,
    ) -> DispatchResult<()> {
        let url = format!("{}/api/resource/{doctype}/{name}", site.url);
        let body = serde_json::to_vec(doc)
            .map_err(|e| DispatchError::Protocol(format!("unencodable document: {e}")))?;
        self.post_json(site, &url, body)?;
        Ok(())
    }

    fn invoke_remote_method(
        &self,
        site: &RemoteSite,
        command: &RemoteCommand,
    ) -> DispatchResult<()> {
        // The typed command meets its wire name only here.
        let url = format!("{}/api/method/{}", site.url, command.wire_name());
        let body = serde_json::to_vec(&command.to_args())
            .map_err(|e| DispatchError::Protocol(format!("unencodable command: {e}")))?;
        self.post_json(site, &url, body)?;
        Ok(())
    }
}
