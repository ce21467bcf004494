//! Configuration for the notification dispatcher.

use std::time::Duration;

/// Configuration for dispatch operations.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// This producer's own identity, carried in every notification so
    /// the consumer knows which node to pull from.
    pub producer_url: String,
    /// Retry behavior for failed deliveries.
    pub retry: RetryPolicy,
    /// Timeout for one liveness probe.
    pub probe_timeout: Duration,
}

impl DispatchConfig {
    /// Creates a new dispatch configuration.
    pub fn new(producer_url: impl Into<String>) -> Self {
        Self {
            producer_url: producer_url.into(),
            retry: RetryPolicy::default(),
            probe_timeout: Duration::from_secs(5),
        }
    }

    /// Sets the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the probe timeout.
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self::new("")
    }
}

/// Retry behavior for failed delivery attempts.
///
/// The first retry waits the fixed cooldown; later retries back off
/// exponentially up to a ceiling. A bounded policy dead-letters the
/// consumer once `max_attempts` is reached instead of re-queueing;
/// [`RetryPolicy::unbounded`] keeps retrying until delivery or
/// revocation.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of delivery attempts; 0 means unbounded.
    pub max_attempts: u32,
    /// Cooldown before the first retry.
    pub cooldown: Duration,
    /// Ceiling for backoff delays.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Whether to add jitter to delays.
    pub add_jitter: bool,
}

impl RetryPolicy {
    /// Creates a bounded policy with the given attempt ceiling.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            cooldown: Duration::from_secs(20),
            max_delay: Duration::from_secs(300),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }

    /// Creates a policy that retries until delivery or revocation.
    pub fn unbounded() -> Self {
        Self::new(0)
    }

    /// Sets the cooldown before the first retry.
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Sets the backoff ceiling.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Disables delay jitter.
    pub fn without_jitter(mut self) -> Self {
        self.add_jitter = false;
        self
    }

    /// Returns true if a failure on this 0-indexed attempt exhausts
    /// the policy.
    pub fn exhausted(&self, attempt: u32) -> bool {
        self.max_attempts != 0 && attempt + 1 >= self.max_attempts
    }

    /// Returns the cooldown before the retry following the given
    /// 0-indexed failed attempt.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.cooldown.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
        let delay_secs = base.min(self.max_delay.as_secs_f64());

        if self.add_jitter {
            // Up to 25% jitter
            let jitter = delay_secs * 0.25 * clock_jitter();
            Duration::from_secs_f64(delay_secs + jitter)
        } else {
            Duration::from_secs_f64(delay_secs)
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(8)
    }
}

/// Cheap pseudo-jitter derived from the clock (no RNG dependency).
fn clock_jitter() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    (nanos % 1000) as f64 / 1000.0
}
