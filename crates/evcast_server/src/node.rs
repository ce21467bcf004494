//! The producer node facade.

use crate::config::NodeConfig;
use crate::error::{NodeError, NodeResult};
use crate::reconcile::{ReconcileReport, Reconciler};
use crate::registration::RegistrationService;
use evcast_core::{
    Consumer, SubscriptionRegistry, UpdateLog, UpdateLogEntry, WriteOrigin,
};
use evcast_dispatch::{
    DispatchConfig, DispatchStats, LivenessProber, NotificationAttempt, NotificationDispatcher,
    RemoteSiteClient, RetryJob, RetryQueue,
};
use evcast_protocol::{NotifyTrigger, RegisterRequest, RegisterResponse, SubscriptionStatus};
use std::sync::Arc;
use tracing::debug;

/// A producer node.
///
/// Ties the subscription registry, the committed-event log, the
/// notification dispatcher, and the reconciler together behind the
/// three operations the outside world sees: register a consumer,
/// commit an event, and change a subscription status.
///
/// The prober, site client, and retry queue are injected so transports
/// stay at the boundary (HTTP in production, loopback in tests).
pub struct ProducerNode<P: LivenessProber, C: RemoteSiteClient, Q: RetryQueue> {
    registry: Arc<SubscriptionRegistry>,
    update_log: Arc<UpdateLog>,
    registration: RegistrationService,
    dispatcher: NotificationDispatcher<P, C, Q>,
    reconciler: Reconciler<C>,
}

impl<P: LivenessProber, C: RemoteSiteClient, Q: RetryQueue> ProducerNode<P, C, Q> {
    /// Creates a producer node with the given collaborators.
    pub fn new(config: NodeConfig, prober: Arc<P>, client: Arc<C>, queue: Arc<Q>) -> Self {
        let registry = Arc::new(SubscriptionRegistry::new());
        let update_log = Arc::new(UpdateLog::new());

        let registration = RegistrationService::new(
            Arc::clone(&registry),
            Arc::clone(&update_log),
            config.credential_len,
        );

        let dispatch_config = DispatchConfig::new(&config.producer_url)
            .with_retry(config.retry.clone())
            .with_probe_timeout(config.probe_timeout);
        let dispatcher = NotificationDispatcher::new(
            dispatch_config,
            Arc::clone(&registry),
            prober,
            Arc::clone(&client),
            queue,
        );

        let reconciler = Reconciler::new(Arc::clone(&registry), client, config.producer_url);

        Self {
            registry,
            update_log,
            registration,
            dispatcher,
            reconciler,
        }
    }

    /// Registers a new consumer. See [`RegistrationService::register`].
    pub fn register(&self, request: &RegisterRequest) -> NodeResult<RegisterResponse> {
        self.registration.register(request)
    }

    /// JSON surface of the registration endpoint.
    pub fn register_json(&self, body: &[u8]) -> NodeResult<Vec<u8>> {
        self.registration.register_json(body)
    }

    /// Commits an event and dispatches notifications to all approved
    /// subscribers of its doctype.
    ///
    /// The event is appended to the log before any notification goes
    /// out, so a consumer that reacts immediately can already see it.
    pub fn record_event(
        &self,
        ref_doctype: &str,
    ) -> (UpdateLogEntry, Vec<NotificationAttempt>) {
        let entry = self.update_log.append(ref_doctype);
        debug!(doctype = ref_doctype, seq = entry.seq, "event committed");

        let attempts = self.dispatcher.notify_event_consumers(ref_doctype);
        (entry, attempts)
    }

    /// The internal notification-trigger surface: dispatches for a
    /// doctype without committing anything.
    pub fn handle_notify_trigger(&self, ref_doctype: &str) -> Vec<NotificationAttempt> {
        self.dispatcher.notify_event_consumers(ref_doctype)
    }

    /// JSON surface of the notification-trigger endpoint.
    pub fn handle_notify_trigger_json(
        &self,
        body: &[u8],
    ) -> NodeResult<Vec<NotificationAttempt>> {
        let trigger =
            NotifyTrigger::decode(body).map_err(|e| NodeError::Validation(e.to_string()))?;
        Ok(self.handle_notify_trigger(&trigger.ref_doctype))
    }

    /// Administrative approve/reject of one subscription.
    ///
    /// This is a genuine local change: it runs exactly one
    /// reconciliation pass toward the consumer's mirror record.
    /// Reconciliation failures surface here and are not retried; the
    /// next genuine change re-attempts the push.
    pub fn set_subscription_status(
        &self,
        consumer_id: &str,
        ref_doctype: &str,
        status: SubscriptionStatus,
    ) -> NodeResult<Option<ReconcileReport>> {
        let hint = self.registry.set_status(
            consumer_id,
            ref_doctype,
            status,
            WriteOrigin::Local,
        )?;

        if hint.should_reconcile() {
            return Ok(Some(self.reconciler.reconcile(consumer_id)?));
        }
        Ok(None)
    }

    /// Applies statuses pushed by the consumer's node.
    ///
    /// This is a reconciliation echo: the write is applied locally and
    /// never triggers an outbound pass of its own.
    pub fn apply_incoming_statuses(
        &self,
        consumer_id: &str,
        statuses: &[(String, SubscriptionStatus)],
    ) -> NodeResult<()> {
        let hint = self
            .registry
            .update(consumer_id, WriteOrigin::Reconciliation, |consumer| {
                for (ref_doctype, status) in statuses {
                    consumer.set_status(ref_doctype, *status)?;
                }
                Ok(())
            })?;

        debug_assert!(!hint.should_reconcile());
        Ok(())
    }

    /// Removes a consumer record (administrative action).
    ///
    /// Any outstanding retry becomes a no-op when it fires.
    pub fn remove_consumer(&self, consumer_id: &str) -> Option<Consumer> {
        self.registry.remove(consumer_id)
    }

    /// Re-runs delivery for a due retry job.
    pub fn run_retry(&self, job: &RetryJob) -> NotificationAttempt {
        self.dispatcher.run_retry(job)
    }

    /// Returns the subscription registry.
    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    /// Returns the committed-event log.
    pub fn update_log(&self) -> &Arc<UpdateLog> {
        &self.update_log
    }

    /// Returns a snapshot of the dispatch counters.
    pub fn dispatch_stats(&self) -> DispatchStats {
        self.dispatcher.stats()
    }
}
