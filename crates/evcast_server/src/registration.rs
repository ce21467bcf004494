//! Consumer self-registration.

use crate::auth::CredentialPair;
use crate::error::{NodeError, NodeResult};
use evcast_core::{Consumer, CoreError, SubscriptionRegistry, UpdateLog};
use evcast_protocol::{ProtocolError, RegisterRequest, RegisterResponse};
use std::sync::Arc;
use tracing::info;

/// Handles a consumer's first contact with the producer.
///
/// Registration issues credentials, records one pending subscription
/// per requested doctype, and computes the sync cursor the consumer
/// starts pulling from. Creating the record never triggers an outward
/// reconciliation pass — there is nothing on the remote side to
/// reconcile yet.
pub struct RegistrationService {
    registry: Arc<SubscriptionRegistry>,
    update_log: Arc<UpdateLog>,
    credential_len: usize,
}

impl RegistrationService {
    /// Creates a registration service over the shared registry and
    /// event log.
    pub fn new(
        registry: Arc<SubscriptionRegistry>,
        update_log: Arc<UpdateLog>,
        credential_len: usize,
    ) -> Self {
        Self {
            registry,
            update_log,
            credential_len,
        }
    }

    /// Registers a new consumer.
    ///
    /// Re-registering an existing callback URL is rejected: the
    /// registry owns the one-record-per-identity invariant.
    pub fn register(&self, request: &RegisterRequest) -> NodeResult<RegisterResponse> {
        request
            .validate()
            .map_err(|e| NodeError::Validation(e.to_string()))?;

        let credentials = CredentialPair::generate(self.credential_len);
        let mut consumer = Consumer::new(
            &request.callback_url,
            &request.user,
            &credentials.api_key,
            &credentials.api_secret,
        );
        for doctype in request.normalized_doctypes() {
            consumer.add_subscription(doctype)?;
        }

        self.registry.insert(consumer).map_err(|err| match err {
            CoreError::DuplicateConsumer(url) => {
                NodeError::Validation(format!("consumer already registered: {url}"))
            }
            CoreError::Persistence(message) => NodeError::Persistence(message),
            other => NodeError::from(other),
        })?;

        // The cursor points at the newest existing event, so pulls
        // start strictly after history that predates the subscription.
        let last_update = self.update_log.last_update();

        info!(
            consumer = %request.callback_url,
            doctypes = request.normalized_doctypes().len(),
            "registered event consumer"
        );

        Ok(RegisterResponse::new(
            credentials.api_key,
            credentials.api_secret,
            last_update,
        ))
    }

    /// JSON surface of [`RegistrationService::register`] for the
    /// guest-accessible endpoint.
    pub fn register_json(&self, body: &[u8]) -> NodeResult<Vec<u8>> {
        let request = RegisterRequest::decode(body)
            .map_err(|e: ProtocolError| NodeError::Validation(e.to_string()))?;
        let response = self.register(&request)?;
        Ok(response.encode()?)
    }
}
