//! Retry queue with atomic compare-and-enqueue.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// One scheduled re-delivery for a consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryJob {
    /// Callback URL of the consumer to retry.
    pub consumer_id: String,
    /// 0-indexed attempt number the retry will run as.
    pub attempt: u32,
    /// Cooldown before the job becomes due.
    pub delay: Duration,
}

impl RetryJob {
    /// Creates a new retry job.
    pub fn new(consumer_id: impl Into<String>, attempt: u32, delay: Duration) -> Self {
        Self {
            consumer_id: consumer_id.into(),
            attempt,
            delay,
        }
    }
}

/// The background-job collaborator boundary for retry scheduling.
///
/// Contract for executors:
/// - [`RetryQueue::enqueue`] is an atomic compare-and-enqueue: the
///   "already outstanding?" check and the insertion happen under one
///   guard, so a race between two failed attempts for the same
///   consumer can never double-schedule (at most one outstanding retry
///   per consumer).
/// - A due job must only run after the transaction enclosing the
///   triggering event commit has committed, so a half-applied event
///   never produces a notification for data the consumer cannot see.
/// - A job re-enters delivery as a fresh attempt; it is never replayed
///   on failure — the fresh attempt schedules its own successor.
pub trait RetryQueue: Send + Sync {
    /// Enqueues a retry unless one is already outstanding for the
    /// consumer. Returns false (and does nothing) on a duplicate.
    fn enqueue(&self, job: RetryJob) -> bool;

    /// Returns true if a retry for the consumer is outstanding.
    fn is_outstanding(&self, consumer_id: &str) -> bool;

    /// Returns the consumers with an outstanding retry.
    fn outstanding(&self) -> Vec<String>;
}

struct QueuedJob {
    job: RetryJob,
    due_at: Instant,
}

/// In-process retry queue used by tests and single-node deployments.
///
/// Jobs live in a single mutex-guarded map keyed by consumer id, which
/// makes the compare-and-enqueue trivially atomic.
#[derive(Default)]
pub struct MemoryRetryQueue {
    jobs: Mutex<HashMap<String, QueuedJob>>,
}

impl MemoryRetryQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns all jobs whose cooldown has elapsed.
    pub fn take_due(&self) -> Vec<RetryJob> {
        let now = Instant::now();
        let mut jobs = self.jobs.lock().unwrap();
        let due: Vec<String> = jobs
            .iter()
            .filter(|(_, queued)| queued.due_at <= now)
            .map(|(id, _)| id.clone())
            .collect();

        due.iter()
            .filter_map(|id| jobs.remove(id))
            .map(|queued| queued.job)
            .collect()
    }

    /// Removes and returns all jobs regardless of cooldown.
    pub fn take_all(&self) -> Vec<RetryJob> {
        let mut jobs = self.jobs.lock().unwrap();
        jobs.drain().map(|(_, queued)| queued.job).collect()
    }

    /// Returns the number of outstanding jobs.
    pub fn len(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }

    /// Returns true if no jobs are outstanding.
    pub fn is_empty(&self) -> bool {
        self.jobs.lock().unwrap().is_empty()
    }
}

impl RetryQueue for MemoryRetryQueue {
    fn enqueue(&self, job: RetryJob) -> bool {
        let mut jobs = self.jobs.lock().unwrap();
        if jobs.contains_key(&job.consumer_id) {
            return false;
        }
        let due_at = Instant::now() + job.delay;
        jobs.insert(job.consumer_id.clone(), QueuedJob { job, due_at });
        true
    }

    fn is_outstanding(&self, consumer_id: &str) -> bool {
        self.jobs.lock().unwrap().contains_key(consumer_id)
    }

    fn outstanding(&self) -> Vec<String> {
        self.jobs.lock().unwrap().keys().cloned().collect()
    }
}
