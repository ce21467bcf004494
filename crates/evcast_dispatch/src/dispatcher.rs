//! Notification dispatch state machine.

use crate::config::DispatchConfig;
use crate::prober::{LivenessProber, ProbeOutcome};
use crate::queue::{RetryJob, RetryQueue};
use crate::site_client::{RemoteSite, RemoteSiteClient};
use evcast_core::{now_millis, Consumer, SubscriptionRegistry};
use evcast_protocol::RemoteCommand;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Progress of one delivery attempt for one consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    /// Selected for notification, nothing attempted yet.
    Candidate,
    /// Liveness probe finished.
    Probed(ProbeOutcome),
    /// Delivery finished with an outcome.
    Attempted(DeliveryOutcome),
    /// A retry has been enqueued for this consumer.
    Rescheduled,
    /// No further work will happen for this attempt.
    Terminal,
}

impl DeliveryState {
    /// Returns true once the attempt needs no further processing.
    pub fn is_settled(&self) -> bool {
        matches!(self, DeliveryState::Rescheduled | DeliveryState::Terminal)
    }
}

/// Outcome of one delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The consumer acknowledged the notification.
    Delivered,
    /// The liveness probe classified the consumer as offline.
    ConsumerOffline,
    /// The notification call itself failed.
    TransportFailure,
    /// The consumer is gone or has no approved subscription left; the
    /// attempt became a no-op.
    Skipped,
    /// The retry ceiling was reached; no further retries.
    DeadLettered,
}

impl DeliveryOutcome {
    /// Returns true for outcomes that feed the retry loop.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            DeliveryOutcome::ConsumerOffline | DeliveryOutcome::TransportFailure
        )
    }
}

/// Record of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationAttempt {
    /// Callback URL of the consumer.
    pub consumer_id: String,
    /// 0-indexed attempt number.
    pub attempt: u32,
    /// When the attempt ran, unix millis.
    pub attempted_at: u64,
    /// How the attempt ended.
    pub outcome: DeliveryOutcome,
    /// Whether a retry was enqueued for this failure.
    pub queued_for_retry: bool,
}

/// Counters exposed for observability.
///
/// A consumer stuck permanently offline is visible only here and in
/// the logs; no synchronous caller ever waits on delivery.
#[derive(Debug, Clone, Default)]
pub struct DispatchStats {
    /// Successful deliveries.
    pub delivered: u64,
    /// Attempts that found the consumer offline.
    pub offline: u64,
    /// Attempts that failed in the notification call.
    pub transport_failures: u64,
    /// Retries handed to the queue.
    pub retries_scheduled: u64,
    /// Retries dropped because one was already outstanding.
    pub retries_suppressed: u64,
    /// Attempts that became no-ops after revocation or removal.
    pub skipped: u64,
    /// Consumers dropped after exhausting the retry ceiling.
    pub dead_lettered: u64,
    /// Last transport error message.
    pub last_error: Option<String>,
}

/// The per-consumer notification state machine.
///
/// For each committed event the dispatcher probes every approved
/// subscriber and pushes a "new event available" signal to the ones
/// that answer. Failures never propagate to the caller; they are
/// recorded as outcomes and fed to the retry queue with a cooldown.
pub struct NotificationDispatcher<P: LivenessProber, C: RemoteSiteClient, Q: RetryQueue> {
    config: DispatchConfig,
    registry: Arc<SubscriptionRegistry>,
    prober: Arc<P>,
    client: Arc<C>,
    queue: Arc<Q>,
    stats: RwLock<DispatchStats>,
}

impl<P: LivenessProber, C: RemoteSiteClient, Q: RetryQueue> NotificationDispatcher<P, C, Q> {
    /// Creates a new dispatcher.
    pub fn new(
        config: DispatchConfig,
        registry: Arc<SubscriptionRegistry>,
        prober: Arc<P>,
        client: Arc<C>,
        queue: Arc<Q>,
    ) -> Self {
        Self {
            config,
            registry,
            prober,
            client,
            queue,
            stats: RwLock::new(DispatchStats::default()),
        }
    }

    /// Returns a snapshot of the dispatch counters.
    pub fn stats(&self) -> DispatchStats {
        self.stats.read().clone()
    }

    /// Returns the retry queue.
    pub fn queue(&self) -> &Arc<Q> {
        &self.queue
    }

    /// Notifies every consumer holding an approved subscription for
    /// the doctype.
    ///
    /// Consumers are independent units of work: one consumer's failure
    /// never blocks or aborts another's attempt, and no ordering
    /// between consumers is guaranteed.
    pub fn notify_event_consumers(&self, ref_doctype: &str) -> Vec<NotificationAttempt> {
        let consumers = self.registry.approved_for(ref_doctype);
        debug!(
            doctype = ref_doctype,
            consumers = consumers.len(),
            "dispatching event notification"
        );

        consumers
            .iter()
            .map(|consumer_id| self.notify(consumer_id, 0))
            .collect()
    }

    /// Runs one delivery attempt for one consumer.
    ///
    /// `attempt` is 0 for a fresh notification and counts up through
    /// retries. The cooldown before a retry is delegated to the queue;
    /// this method never sleeps.
    pub fn notify(&self, consumer_id: &str, attempt: u32) -> NotificationAttempt {
        let attempted_at = now_millis();

        // Revoked or removed consumers turn outstanding retries into
        // no-ops; there is no cancellation channel into the queue.
        let consumer = match self.registry.get(consumer_id) {
            Some(consumer) if consumer.has_any_approved() => consumer,
            _ => {
                debug!(consumer = consumer_id, "skipping revoked or removed consumer");
                self.stats.write().skipped += 1;
                return NotificationAttempt {
                    consumer_id: consumer_id.to_string(),
                    attempt,
                    attempted_at,
                    outcome: DeliveryOutcome::Skipped,
                    queued_for_retry: false,
                };
            }
        };

        let mut state = DeliveryState::Candidate;
        let mut outcome = DeliveryOutcome::Skipped;
        let mut queued_for_retry = false;

        while !state.is_settled() {
            state = match state {
                DeliveryState::Candidate => {
                    DeliveryState::Probed(self.prober.probe(&consumer.callback_url))
                }

                DeliveryState::Probed(probe) => {
                    DeliveryState::Attempted(if probe.is_online() {
                        self.attempt_delivery(&consumer)
                    } else {
                        DeliveryOutcome::ConsumerOffline
                    })
                }

                DeliveryState::Attempted(attempted) => {
                    outcome = attempted;
                    if attempted.is_failure() {
                        let (next, dead_lettered, queued) =
                            self.after_failure(consumer_id, attempt, attempted);
                        if dead_lettered {
                            outcome = DeliveryOutcome::DeadLettered;
                        }
                        queued_for_retry = queued;
                        next
                    } else {
                        info!(consumer = consumer_id, attempt, "notification delivered");
                        self.stats.write().delivered += 1;
                        DeliveryState::Terminal
                    }
                }

                settled => settled,
            };
        }

        NotificationAttempt {
            consumer_id: consumer_id.to_string(),
            attempt,
            attempted_at,
            outcome,
            queued_for_retry,
        }
    }

    /// Re-runs delivery for a due retry job.
    pub fn run_retry(&self, job: &RetryJob) -> NotificationAttempt {
        self.notify(&job.consumer_id, job.attempt)
    }

    /// Pushes the "new event available" signal to one consumer.
    fn attempt_delivery(&self, consumer: &Consumer) -> DeliveryOutcome {
        let site = RemoteSite::from(consumer);
        let command = RemoteCommand::NewEventNotification {
            producer_url: self.config.producer_url.clone(),
        };

        match self.client.invoke_remote_method(&site, &command) {
            Ok(()) => DeliveryOutcome::Delivered,
            Err(err) => {
                warn!(consumer = %consumer.callback_url, error = %err, "notification call failed");
                self.stats.write().last_error = Some(err.to_string());
                DeliveryOutcome::TransportFailure
            }
        }
    }

    /// Decides between dead-lettering and scheduling a retry.
    ///
    /// Returns the settled state, whether the consumer was
    /// dead-lettered, and whether a retry was enqueued.
    fn after_failure(
        &self,
        consumer_id: &str,
        attempt: u32,
        outcome: DeliveryOutcome,
    ) -> (DeliveryState, bool, bool) {
        {
            let mut stats = self.stats.write();
            match outcome {
                DeliveryOutcome::ConsumerOffline => stats.offline += 1,
                DeliveryOutcome::TransportFailure => stats.transport_failures += 1,
                _ => {}
            }
        }

        if self.config.retry.exhausted(attempt) {
            warn!(
                consumer = consumer_id,
                attempt, "retry ceiling reached, dead-lettering consumer"
            );
            self.stats.write().dead_lettered += 1;
            return (DeliveryState::Terminal, true, false);
        }

        let delay = self.config.retry.delay_for_attempt(attempt);
        let queued = self
            .queue
            .enqueue(RetryJob::new(consumer_id, attempt + 1, delay));

        if queued {
            debug!(consumer = consumer_id, attempt, ?delay, "retry scheduled");
            self.stats.write().retries_scheduled += 1;
            (DeliveryState::Rescheduled, false, true)
        } else {
            debug!(consumer = consumer_id, "retry already outstanding, dropping");
            self.stats.write().retries_suppressed += 1;
            (DeliveryState::Terminal, false, false)
        }
    }
}
