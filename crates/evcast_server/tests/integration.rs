//! End-to-end tests: a producer node against a loopback consumer node.

use evcast_dispatch::{
    DeliveryOutcome, DispatchError, DispatchResult, LivenessProber, MemoryRetryQueue,
    ProbeOutcome, RemoteSite, RemoteSiteClient, RetryPolicy,
};
use evcast_protocol::{
    EventConfigEntry, ProducerMirror, RegisterRequest, RemoteCommand, SubscriptionStatus,
};
use evcast_server::{NodeConfig, ProducerNode};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const CONSUMER: &str = "https://consumer.example.com";
const PRODUCER: &str = "https://producer.example.com";

/// An in-memory consumer node.
///
/// Holds the mirror record, the doctype-mapping table, an
/// online/offline switch, and a log of received commands — everything
/// the producer touches through the remote-site boundary.
#[derive(Default)]
struct LoopbackConsumer {
    online: AtomicBool,
    mirror: Mutex<Option<ProducerMirror>>,
    mappings: Mutex<HashMap<String, String>>,
    received: Mutex<Vec<RemoteCommand>>,
    mirror_writes: Mutex<Vec<ProducerMirror>>,
}

impl LoopbackConsumer {
    fn new() -> Self {
        let consumer = Self::default();
        consumer.online.store(true, Ordering::SeqCst);
        consumer
    }

    fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    fn seed_mirror(&self, entries: Vec<EventConfigEntry>) {
        *self.mirror.lock().unwrap() = Some(ProducerMirror::new(PRODUCER, entries));
    }

    fn add_mapping(&self, name: &str, remote_doctype: &str) {
        self.mappings
            .lock()
            .unwrap()
            .insert(name.to_string(), remote_doctype.to_string());
    }

    fn received(&self) -> Vec<RemoteCommand> {
        self.received.lock().unwrap().clone()
    }

    fn mirror_writes(&self) -> Vec<ProducerMirror> {
        self.mirror_writes.lock().unwrap().clone()
    }

    fn check_online(&self) -> DispatchResult<()> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DispatchError::transport_retryable("consumer node is down"))
        }
    }
}

impl LivenessProber for LoopbackConsumer {
    fn probe(&self, _callback_url: &str) -> ProbeOutcome {
        if self.online.load(Ordering::SeqCst) {
            ProbeOutcome::Online
        } else {
            ProbeOutcome::Offline
        }
    }
}

impl RemoteSiteClient for LoopbackConsumer {
    fn get_document(
        &self,
        _site: &RemoteSite,
        doctype: &str,
        name: &str,
    ) -> DispatchResult<Value> {
        self.check_online()?;
        if doctype != ProducerMirror::DOCTYPE || name != PRODUCER {
            return Err(DispatchError::Rejected(format!(
                "no such document: {doctype}/{name}"
            )));
        }
        let mirror = self.mirror.lock().unwrap();
        let mirror = mirror
            .as_ref()
            .ok_or_else(|| DispatchError::Rejected("mirror not provisioned".into()))?;
        mirror
            .to_value()
            .map_err(|e| DispatchError::Protocol(e.to_string()))
    }

    fn get_field_value(
        &self,
        _site: &RemoteSite,
        doctype: &str,
        name: &str,
        field: &str,
    ) -> DispatchResult<Option<String>> {
        self.check_online()?;
        if doctype != ProducerMirror::MAPPING_DOCTYPE || field != ProducerMirror::MAPPING_FIELD {
            return Ok(None);
        }
        Ok(self.mappings.lock().unwrap().get(name).cloned())
    }

    fn update_document(
        &self,
        _site: &RemoteSite,
        doctype: &str,
        name: &str,
        doc: &Value,
    ) -> DispatchResult<()> {
        self.check_online()?;
        if doctype != ProducerMirror::DOCTYPE || name != PRODUCER {
            return Err(DispatchError::Rejected(format!(
                "no such document: {doctype}/{name}"
            )));
        }
        let updated = ProducerMirror::from_value(doc.clone())
            .map_err(|e| DispatchError::Protocol(e.to_string()))?;

        self.mirror_writes.lock().unwrap().push(updated.clone());
        *self.mirror.lock().unwrap() = Some(updated);
        Ok(())
    }

    fn invoke_remote_method(
        &self,
        _site: &RemoteSite,
        command: &RemoteCommand,
    ) -> DispatchResult<()> {
        self.check_online()?;
        self.received.lock().unwrap().push(command.clone());
        Ok(())
    }
}

struct Cluster {
    consumer: Arc<LoopbackConsumer>,
    queue: Arc<MemoryRetryQueue>,
    node: ProducerNode<LoopbackConsumer, LoopbackConsumer, MemoryRetryQueue>,
}

fn cluster(retry: RetryPolicy) -> Cluster {
    let consumer = Arc::new(LoopbackConsumer::new());
    let queue = Arc::new(MemoryRetryQueue::new());

    let config = NodeConfig::new(PRODUCER)
        .with_retry(retry.with_cooldown(Duration::ZERO).without_jitter());
    let node = ProducerNode::new(
        config,
        Arc::clone(&consumer),
        Arc::clone(&consumer),
        Arc::clone(&queue),
    );

    Cluster {
        consumer,
        queue,
        node,
    }
}

/// Registers the consumer, seeds its mirror, and approves a doctype.
fn register_and_approve(cluster: &Cluster, doctype: &str) {
    cluster
        .node
        .register(&RegisterRequest::new(
            CONSUMER,
            "ops@example.com",
            vec![doctype.to_string()],
        ))
        .unwrap();
    cluster
        .consumer
        .seed_mirror(vec![EventConfigEntry::direct(doctype)]);
    cluster
        .node
        .set_subscription_status(CONSUMER, doctype, SubscriptionStatus::Approved)
        .unwrap();
}

#[test]
fn registration_returns_credentials_and_cursor() {
    let c = cluster(RetryPolicy::unbounded());

    // Events committed before registration must not be replayed
    c.node.record_event("order");
    let newest = c.node.update_log().last_update();

    let response = c
        .node
        .register(&RegisterRequest::new(
            CONSUMER,
            "ops@example.com",
            vec!["order".into()],
        ))
        .unwrap();

    assert_eq!(response.last_update, newest);
    assert_eq!(response.api_key.len(), 16);

    let stored = c.node.registry().get(CONSUMER).unwrap();
    assert_eq!(stored.api_secret, response.api_secret);
    assert_eq!(
        stored.subscription_status("order"),
        Some(SubscriptionStatus::Pending)
    );

    // Registration itself must not have touched the consumer's node
    assert!(c.consumer.mirror_writes().is_empty());
}

#[test]
fn online_consumer_delivery_end_to_end() {
    let c = cluster(RetryPolicy::unbounded());
    register_and_approve(&c, "order");

    let (_, attempts) = c.node.record_event("order");
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].outcome, DeliveryOutcome::Delivered);
    assert!(!attempts[0].queued_for_retry);
    assert!(c.queue.is_empty());

    let received = c.consumer.received();
    assert_eq!(received.len(), 1);
    assert_eq!(
        received[0],
        RemoteCommand::NewEventNotification {
            producer_url: PRODUCER.into()
        }
    );
}

#[test]
fn offline_consumer_is_retried_until_delivered() {
    let c = cluster(RetryPolicy::unbounded());
    register_and_approve(&c, "order");
    c.consumer.set_online(false);

    let (_, attempts) = c.node.record_event("order");
    assert_eq!(attempts[0].outcome, DeliveryOutcome::ConsumerOffline);
    assert!(attempts[0].queued_for_retry);
    assert_eq!(c.queue.len(), 1);
    assert!(c.consumer.received().is_empty());

    // The consumer comes back; the due retry delivers
    c.consumer.set_online(true);
    let jobs = c.queue.take_all();
    assert_eq!(jobs.len(), 1);

    let retry = c.node.run_retry(&jobs[0]);
    assert_eq!(retry.outcome, DeliveryOutcome::Delivered);
    assert!(c.queue.is_empty());
    assert_eq!(c.consumer.received().len(), 1);
}

#[test]
fn second_event_does_not_double_schedule_retry() {
    let c = cluster(RetryPolicy::unbounded());
    register_and_approve(&c, "order");
    c.consumer.set_online(false);

    c.node.record_event("order");
    assert_eq!(c.queue.len(), 1);

    // A second event while the retry is outstanding must not enqueue
    // another job for the same consumer
    let (_, attempts) = c.node.record_event("order");
    assert!(!attempts[0].queued_for_retry);
    assert_eq!(c.queue.len(), 1);

    let stats = c.node.dispatch_stats();
    assert_eq!(stats.retries_scheduled, 1);
    assert_eq!(stats.retries_suppressed, 1);
}

#[test]
fn approval_pushes_projected_statuses_to_mirror() {
    let c = cluster(RetryPolicy::unbounded());
    c.node
        .register(&RegisterRequest::new(
            CONSUMER,
            "ops@example.com",
            vec!["order".into(), "billing-doc".into()],
        ))
        .unwrap();

    // The consumer's node knows "billing-doc" as "invoice" through a
    // named mapping
    c.consumer.add_mapping("invoice-map", "billing-doc");
    c.consumer.seed_mirror(vec![
        EventConfigEntry::direct("order"),
        EventConfigEntry::via_mapping("invoice", "invoice-map"),
    ]);

    let report = c
        .node
        .set_subscription_status(CONSUMER, "order", SubscriptionStatus::Approved)
        .unwrap()
        .expect("genuine change must reconcile");

    assert_eq!(
        report.projected,
        vec![
            ("order".to_string(), Some(SubscriptionStatus::Approved)),
            ("invoice".to_string(), Some(SubscriptionStatus::Pending)),
        ]
    );

    let writes = c.consumer.mirror_writes();
    assert_eq!(writes.len(), 1);
    assert!(writes[0].incoming_change);
    assert_eq!(writes[0].event_configuration[0].status, Some(SubscriptionStatus::Approved));
    // Status lands under the consumer's own entry key
    assert_eq!(writes[0].event_configuration[1].ref_doctype, "invoice");
    assert_eq!(writes[0].event_configuration[1].status, Some(SubscriptionStatus::Pending));
}

#[test]
fn one_genuine_change_means_one_mirror_write() {
    let c = cluster(RetryPolicy::unbounded());
    register_and_approve(&c, "order");
    assert_eq!(c.consumer.mirror_writes().len(), 1);

    // An incoming echo applies locally without writing back
    c.node
        .apply_incoming_statuses(
            CONSUMER,
            &[("order".to_string(), SubscriptionStatus::Rejected)],
        )
        .unwrap();
    assert_eq!(c.consumer.mirror_writes().len(), 1);
    assert!(!c.node.registry().get(CONSUMER).unwrap().is_approved_for("order"));

    // The next genuine change reconciles exactly once more
    c.node
        .set_subscription_status(CONSUMER, "order", SubscriptionStatus::Approved)
        .unwrap();
    assert_eq!(c.consumer.mirror_writes().len(), 2);
}

#[test]
fn reconciliation_failure_surfaces_and_is_not_retried() {
    let c = cluster(RetryPolicy::unbounded());
    c.node
        .register(&RegisterRequest::new(
            CONSUMER,
            "ops@example.com",
            vec!["order".into()],
        ))
        .unwrap();
    c.consumer.set_online(false);

    let err = c
        .node
        .set_subscription_status(CONSUMER, "order", SubscriptionStatus::Approved)
        .unwrap_err();
    assert!(err.is_server_error());

    // The local status change stuck; only the mirror push failed
    assert!(c.node.registry().get(CONSUMER).unwrap().is_approved_for("order"));
    assert!(c.consumer.mirror_writes().is_empty());

    // Next genuine change re-attempts the push
    c.consumer.set_online(true);
    c.consumer.seed_mirror(vec![EventConfigEntry::direct("order")]);
    c.node
        .set_subscription_status(CONSUMER, "order", SubscriptionStatus::Approved)
        .unwrap();
    assert_eq!(c.consumer.mirror_writes().len(), 1);
}

#[test]
fn revocation_turns_outstanding_retry_into_noop() {
    let c = cluster(RetryPolicy::unbounded());
    register_and_approve(&c, "order");
    c.consumer.set_online(false);

    c.node.record_event("order");
    let jobs = c.queue.take_all();
    assert_eq!(jobs.len(), 1);

    c.node
        .set_subscription_status(CONSUMER, "order", SubscriptionStatus::Rejected)
        .unwrap();
    c.consumer.set_online(true);

    let attempt = c.node.run_retry(&jobs[0]);
    assert_eq!(attempt.outcome, DeliveryOutcome::Skipped);
    assert!(c.consumer.received().is_empty());
    assert!(c.queue.is_empty());
}

#[test]
fn removed_consumer_retry_is_noop() {
    let c = cluster(RetryPolicy::unbounded());
    register_and_approve(&c, "order");
    c.consumer.set_online(false);

    c.node.record_event("order");
    let jobs = c.queue.take_all();

    c.node.remove_consumer(CONSUMER);
    c.consumer.set_online(true);

    let attempt = c.node.run_retry(&jobs[0]);
    assert_eq!(attempt.outcome, DeliveryOutcome::Skipped);
    assert!(c.consumer.received().is_empty());
}

#[test]
fn permanently_offline_consumer_dead_letters_at_the_ceiling() {
    let c = cluster(RetryPolicy::new(3));
    register_and_approve(&c, "order");
    c.consumer.set_online(false);

    let (_, attempts) = c.node.record_event("order");
    let mut last = attempts.into_iter().next().unwrap();

    // Drain retries until the policy gives up
    while last.queued_for_retry {
        let jobs = c.queue.take_all();
        assert_eq!(jobs.len(), 1);
        last = c.node.run_retry(&jobs[0]);
    }

    assert_eq!(last.outcome, DeliveryOutcome::DeadLettered);
    assert_eq!(last.attempt, 2);
    assert!(c.queue.is_empty());
    assert_eq!(c.node.dispatch_stats().dead_lettered, 1);
    assert!(c.consumer.received().is_empty());
}

#[test]
fn duplicate_registration_is_rejected_end_to_end() {
    let c = cluster(RetryPolicy::unbounded());
    register_and_approve(&c, "order");

    let err = c
        .node
        .register(&RegisterRequest::new(
            CONSUMER,
            "someone-else@example.com",
            vec!["invoice".into()],
        ))
        .unwrap_err();

    assert!(err.is_client_error());
    // The original record, approvals included, is untouched
    assert!(c.node.registry().get(CONSUMER).unwrap().is_approved_for("order"));
}

#[test]
fn json_notify_trigger_surface() {
    let c = cluster(RetryPolicy::unbounded());
    register_and_approve(&c, "order");

    let body = evcast_protocol::NotifyTrigger::new("order").encode().unwrap();
    let attempts = c.node.handle_notify_trigger_json(&body).unwrap();

    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].outcome, DeliveryOutcome::Delivered);
    assert!(c.node.handle_notify_trigger_json(b"not json").is_err());
}

#[test]
fn json_registration_surface() {
    let c = cluster(RetryPolicy::unbounded());

    let body = RegisterRequest::new(CONSUMER, "ops@example.com", vec!["order".into()])
        .encode()
        .unwrap();
    let response_body = c.node.register_json(&body).unwrap();

    let response = evcast_protocol::RegisterResponse::decode(&response_body).unwrap();
    assert_eq!(
        c.node.registry().get(CONSUMER).unwrap().api_key,
        response.api_key
    );
}
