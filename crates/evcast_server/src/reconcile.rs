//! Subscription-status reconciliation against remote mirror records.

use crate::error::{NodeError, NodeResult};
use evcast_core::{Consumer, SubscriptionRegistry};
use evcast_dispatch::{DispatchResult, RemoteSite, RemoteSiteClient};
use evcast_protocol::{ProducerMirror, SubscriptionStatus};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Per-pass doctype translation view.
///
/// A mirror entry may reference its doctype through a named mapping on
/// the consumer's node (the consumer calls the type one thing, the
/// producer another). This view resolves mapping names through the
/// remote site client and memoizes the answers — but only for the
/// duration of one reconciliation pass; nothing survives the pass.
pub struct DoctypeMapping<'a, C: RemoteSiteClient> {
    client: &'a C,
    site: &'a RemoteSite,
    resolved: HashMap<String, Option<String>>,
}

impl<'a, C: RemoteSiteClient> DoctypeMapping<'a, C> {
    /// Creates an empty view for one pass against one site.
    pub fn new(client: &'a C, site: &'a RemoteSite) -> Self {
        Self {
            client,
            site,
            resolved: HashMap::new(),
        }
    }

    /// Resolves a mapping name to the producer-side doctype.
    pub fn resolve(&mut self, mapping: &str) -> DispatchResult<Option<String>> {
        if let Some(found) = self.resolved.get(mapping) {
            return Ok(found.clone());
        }

        let found = self.client.get_field_value(
            self.site,
            ProducerMirror::MAPPING_DOCTYPE,
            mapping,
            ProducerMirror::MAPPING_FIELD,
        )?;
        self.resolved.insert(mapping.to_string(), found.clone());
        Ok(found)
    }

    /// Reverse lookup over the mappings resolved so far in this pass.
    pub fn local_name_for(&self, producer_doctype: &str) -> Option<&str> {
        self.resolved
            .iter()
            .find(|(_, resolved)| resolved.as_deref() == Some(producer_doctype))
            .map(|(mapping, _)| mapping.as_str())
    }
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Callback URL of the reconciled consumer.
    pub consumer: String,
    /// Statuses written back, keyed by the mirror entry's own doctype
    /// name (not the resolved one).
    pub projected: Vec<(String, Option<SubscriptionStatus>)>,
}

/// Pushes local subscription statuses to a consumer's mirror record.
///
/// A pass runs after every genuine local change to a consumer record.
/// Failures are surfaced as reconciliation errors and never retried
/// automatically: retrying here would amplify exactly the update loops
/// the protocol is built to prevent, so the next genuine change is the
/// retry.
pub struct Reconciler<C: RemoteSiteClient> {
    registry: Arc<SubscriptionRegistry>,
    client: Arc<C>,
    producer_url: String,
}

impl<C: RemoteSiteClient> Reconciler<C> {
    /// Creates a reconciler for this producer.
    pub fn new(
        registry: Arc<SubscriptionRegistry>,
        client: Arc<C>,
        producer_url: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            client,
            producer_url: producer_url.into(),
        }
    }

    /// Runs one reconciliation pass for one consumer.
    pub fn reconcile(&self, consumer_id: &str) -> NodeResult<ReconcileReport> {
        let consumer = self
            .registry
            .get(consumer_id)
            .ok_or_else(|| NodeError::reconciliation(consumer_id, "consumer not in registry"))?;

        let site = RemoteSite::from(&consumer);

        let raw = self
            .client
            .get_document(&site, ProducerMirror::DOCTYPE, &self.producer_url)
            .map_err(|e| NodeError::reconciliation(consumer_id, e))?;
        let mut mirror = ProducerMirror::from_value(raw)
            .map_err(|e| NodeError::reconciliation(consumer_id, e))?;

        let projected = self
            .project_statuses(&consumer, &site, &mut mirror)
            .map_err(|e| NodeError::reconciliation(consumer_id, e))?;

        // One-shot echo marker: the remote update handler consumes it
        // instead of reconciling back toward us.
        mirror.incoming_change = true;

        let value = mirror
            .to_value()
            .map_err(|e| NodeError::reconciliation(consumer_id, e))?;
        self.client
            .update_document(&site, ProducerMirror::DOCTYPE, &self.producer_url, &value)
            .map_err(|e| NodeError::reconciliation(consumer_id, e))?;

        info!(
            consumer = consumer_id,
            entries = projected.len(),
            "pushed subscription statuses to mirror"
        );

        Ok(ReconcileReport {
            consumer: consumer_id.to_string(),
            projected,
        })
    }

    /// Writes local statuses into the mirror's entries.
    ///
    /// Each entry's doctype is resolved through the mapping indirection
    /// where present, but the status lands under the original entry
    /// key.
    fn project_statuses(
        &self,
        consumer: &Consumer,
        site: &RemoteSite,
        mirror: &mut ProducerMirror,
    ) -> DispatchResult<Vec<(String, Option<SubscriptionStatus>)>> {
        let mut mapping_view = DoctypeMapping::new(self.client.as_ref(), site);
        let mut projected = Vec::with_capacity(mirror.event_configuration.len());

        for entry in &mut mirror.event_configuration {
            let effective = match &entry.mapping {
                Some(mapping) => mapping_view.resolve(mapping)?,
                None => Some(entry.ref_doctype.clone()),
            };

            entry.status = effective
                .as_deref()
                .and_then(|doctype| consumer.subscription_status(doctype));

            debug!(
                entry = %entry.ref_doctype,
                resolved = effective.as_deref().unwrap_or("<unresolved>"),
                status = ?entry.status,
                "projected subscription status"
            );
            projected.push((entry.ref_doctype.clone(), entry.status));
        }

        Ok(projected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evcast_core::WriteOrigin;
    use evcast_dispatch::MockSiteClient;
    use evcast_protocol::EventConfigEntry;

    const CONSUMER: &str = "https://consumer.example.com";
    const PRODUCER: &str = "https://producer.example.com";

    struct Fixture {
        registry: Arc<SubscriptionRegistry>,
        client: Arc<MockSiteClient>,
        reconciler: Reconciler<MockSiteClient>,
    }

    fn fixture() -> Fixture {
        let registry = Arc::new(SubscriptionRegistry::new());
        let client = Arc::new(MockSiteClient::new());
        let reconciler = Reconciler::new(Arc::clone(&registry), Arc::clone(&client), PRODUCER);
        Fixture {
            registry,
            client,
            reconciler,
        }
    }

    fn register(fixture: &Fixture, doctypes: &[(&str, SubscriptionStatus)]) {
        let mut consumer = Consumer::new(CONSUMER, "ops@example.com", "key", "secret");
        for (doctype, _) in doctypes {
            consumer.add_subscription(*doctype).unwrap();
        }
        fixture.registry.insert(consumer).unwrap();
        for (doctype, status) in doctypes {
            fixture
                .registry
                .set_status(CONSUMER, doctype, *status, WriteOrigin::Reconciliation)
                .unwrap();
        }
    }

    fn seed_mirror(fixture: &Fixture, entries: Vec<EventConfigEntry>) {
        let mirror = ProducerMirror::new(PRODUCER, entries);
        fixture.client.put_document(
            ProducerMirror::DOCTYPE,
            PRODUCER,
            mirror.to_value().unwrap(),
        );
    }

    #[test]
    fn direct_entries_get_local_status() {
        let f = fixture();
        register(&f, &[("order", SubscriptionStatus::Approved)]);
        seed_mirror(&f, vec![EventConfigEntry::direct("order")]);

        let report = f.reconciler.reconcile(CONSUMER).unwrap();
        assert_eq!(
            report.projected,
            vec![("order".to_string(), Some(SubscriptionStatus::Approved))]
        );

        let updates = f.client.updates();
        assert_eq!(updates.len(), 1);
        let pushed = ProducerMirror::from_value(updates[0].1.clone()).unwrap();
        assert!(pushed.incoming_change);
        assert_eq!(
            pushed.event_configuration[0].status,
            Some(SubscriptionStatus::Approved)
        );
    }

    #[test]
    fn mapped_entries_resolve_but_keep_their_key() {
        let f = fixture();
        register(
            &f,
            &[
                ("order", SubscriptionStatus::Approved),
                ("billing-doc", SubscriptionStatus::Pending),
            ],
        );
        // The consumer calls it "invoice" and maps it to our
        // "billing-doc" through the named mapping "invoice-map".
        f.client.put_field_value(
            ProducerMirror::MAPPING_DOCTYPE,
            "invoice-map",
            ProducerMirror::MAPPING_FIELD,
            "billing-doc",
        );
        seed_mirror(
            &f,
            vec![
                EventConfigEntry::direct("order"),
                EventConfigEntry::via_mapping("invoice", "invoice-map"),
            ],
        );

        let report = f.reconciler.reconcile(CONSUMER).unwrap();
        assert_eq!(
            report.projected,
            vec![
                ("order".to_string(), Some(SubscriptionStatus::Approved)),
                ("invoice".to_string(), Some(SubscriptionStatus::Pending)),
            ]
        );

        let pushed = ProducerMirror::from_value(f.client.updates()[0].1.clone()).unwrap();
        // Status attached under the original entry key, not the
        // resolved one
        assert_eq!(pushed.event_configuration[1].ref_doctype, "invoice");
        assert_eq!(
            pushed.event_configuration[1].status,
            Some(SubscriptionStatus::Pending)
        );
    }

    #[test]
    fn unknown_doctype_projects_no_status() {
        let f = fixture();
        register(&f, &[("order", SubscriptionStatus::Approved)]);
        seed_mirror(&f, vec![EventConfigEntry::direct("unrelated")]);

        let report = f.reconciler.reconcile(CONSUMER).unwrap();
        assert_eq!(report.projected, vec![("unrelated".to_string(), None)]);
    }

    #[test]
    fn unresolvable_mapping_projects_no_status() {
        let f = fixture();
        register(&f, &[("order", SubscriptionStatus::Approved)]);
        seed_mirror(&f, vec![EventConfigEntry::via_mapping("order", "ghost-map")]);

        let report = f.reconciler.reconcile(CONSUMER).unwrap();
        assert_eq!(report.projected, vec![("order".to_string(), None)]);
    }

    #[test]
    fn transport_failure_surfaces_as_reconciliation_error() {
        let f = fixture();
        register(&f, &[("order", SubscriptionStatus::Approved)]);
        seed_mirror(&f, vec![EventConfigEntry::direct("order")]);
        f.client.set_failing(true);

        let err = f.reconciler.reconcile(CONSUMER).unwrap_err();
        assert!(matches!(err, NodeError::Reconciliation { .. }));
        assert!(err.is_server_error());
    }

    #[test]
    fn unknown_consumer_fails() {
        let f = fixture();
        let err = f.reconciler.reconcile("https://ghost.example.com").unwrap_err();
        assert!(matches!(err, NodeError::Reconciliation { .. }));
    }

    #[test]
    fn mapping_view_memoizes_within_a_pass() {
        let f = fixture();
        f.client.put_field_value(
            ProducerMirror::MAPPING_DOCTYPE,
            "m",
            ProducerMirror::MAPPING_FIELD,
            "order",
        );

        let site = RemoteSite {
            url: CONSUMER.into(),
            api_key: "key".into(),
            api_secret: "secret".into(),
        };
        let mut view = DoctypeMapping::new(f.client.as_ref(), &site);

        assert_eq!(view.resolve("m").unwrap().as_deref(), Some("order"));
        // Second resolve answers from the memo even if the remote
        // stops responding
        f.client.set_failing(true);
        assert_eq!(view.resolve("m").unwrap().as_deref(), Some("order"));

        assert_eq!(view.local_name_for("order"), Some("m"));
        assert_eq!(view.local_name_for("ghost"), None);
    }
}
