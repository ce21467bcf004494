//! Liveness probing.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Result of one reachability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProbeOutcome {
    /// The callback address answered successfully.
    #[default]
    Online,
    /// Any non-success response or transport error.
    Offline,
}

impl ProbeOutcome {
    /// Returns true for [`ProbeOutcome::Online`].
    pub fn is_online(&self) -> bool {
        matches!(self, ProbeOutcome::Online)
    }
}

/// A liveness prober classifies a consumer's callback address as
/// online or offline.
///
/// A probe is a single bounded-timeout reachability request with no
/// side effects and no internal retries; retrying is the dispatcher's
/// responsibility.
pub trait LivenessProber: Send + Sync {
    /// Probes a callback address.
    fn probe(&self, callback_url: &str) -> ProbeOutcome;
}

/// A scriptable prober for testing.
///
/// Outcomes can be scripted per URL as a sequence that is consumed one
/// probe at a time; once a sequence runs dry, the default outcome
/// applies.
#[derive(Default)]
pub struct MockProber {
    scripted: Mutex<HashMap<String, VecDeque<ProbeOutcome>>>,
    default: Mutex<ProbeOutcome>,
    probes: Mutex<Vec<String>>,
}

impl MockProber {
    /// Creates a prober that reports everything online.
    pub fn new() -> Self {
        Self {
            scripted: Mutex::new(HashMap::new()),
            default: Mutex::new(ProbeOutcome::Online),
            probes: Mutex::new(Vec::new()),
        }
    }

    /// Sets the outcome reported for unscripted probes.
    pub fn set_default(&self, outcome: ProbeOutcome) {
        *self.default.lock().unwrap() = outcome;
    }

    /// Scripts a sequence of outcomes for one URL.
    pub fn script(&self, callback_url: &str, outcomes: impl IntoIterator<Item = ProbeOutcome>) {
        self.scripted
            .lock()
            .unwrap()
            .entry(callback_url.to_string())
            .or_default()
            .extend(outcomes);
    }

    /// Returns the URLs probed so far.
    pub fn probes(&self) -> Vec<String> {
        self.probes.lock().unwrap().clone()
    }
}

impl LivenessProber for MockProber {
    fn probe(&self, callback_url: &str) -> ProbeOutcome {
        self.probes.lock().unwrap().push(callback_url.to_string());

        if let Some(queue) = self.scripted.lock().unwrap().get_mut(callback_url) {
            if let Some(outcome) = queue.pop_front() {
                return outcome;
            }
        }
        *self.default.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_outcome() {
        let prober = MockProber::new();
        assert!(prober.probe("https://c.example.com").is_online());

        prober.set_default(ProbeOutcome::Offline);
        assert!(!prober.probe("https://c.example.com").is_online());
    }

    #[test]
    fn scripted_sequence_then_default() {
        let prober = MockProber::new();
        prober.script(
            "https://c.example.com",
            [ProbeOutcome::Offline, ProbeOutcome::Online],
        );

        assert_eq!(prober.probe("https://c.example.com"), ProbeOutcome::Offline);
        assert_eq!(prober.probe("https://c.example.com"), ProbeOutcome::Online);
        // Sequence exhausted, falls back to default
        assert_eq!(prober.probe("https://c.example.com"), ProbeOutcome::Online);
    }

    #[test]
    fn records_probed_urls() {
        let prober = MockProber::new();
        prober.probe("https://a.example.com");
        prober.probe("https://b.example.com");

        assert_eq!(
            prober.probes(),
            vec!["https://a.example.com", "https://b.example.com"]
        );
    }
}
