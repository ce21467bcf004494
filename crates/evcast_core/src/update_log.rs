//! Committed-event log and sync-cursor computation.

use parking_lot::RwLock;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Returns the current unix time in milliseconds.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// One committed event in the producer's log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateLogEntry {
    /// Monotonic sequence number, from 1.
    pub seq: u64,
    /// Unique event id.
    pub event_id: Uuid,
    /// Document type of the committed event.
    pub ref_doctype: String,
    /// Commit time, unix millis.
    pub created_at: u64,
}

/// Append-only log of committed events.
///
/// The log records only that an event happened for a doctype; event
/// payloads live in the storage layer, outside this crate. Its main
/// consumer here is the sync-cursor computation: a newly registered
/// consumer starts pulling strictly after the newest existing entry.
pub struct UpdateLog {
    entries: RwLock<Vec<UpdateLogEntry>>,
    next_seq: RwLock<u64>,
}

impl UpdateLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            next_seq: RwLock::new(1),
        }
    }

    /// Appends an entry for a committed event and returns it.
    pub fn append(&self, ref_doctype: impl Into<String>) -> UpdateLogEntry {
        let mut entries = self.entries.write();
        let mut next = self.next_seq.write();

        let entry = UpdateLogEntry {
            seq: *next,
            event_id: Uuid::new_v4(),
            ref_doctype: ref_doctype.into(),
            created_at: now_millis(),
        };
        *next += 1;
        entries.push(entry.clone());
        entry
    }

    /// Returns the sync cursor for a consumer registering now.
    ///
    /// This is the creation time of the newest existing entry, so the
    /// consumer's future pulls start strictly after events that predate
    /// its subscription. With an empty log it is the current time —
    /// never zero/epoch, which would replay all history.
    pub fn last_update(&self) -> u64 {
        self.entries
            .read()
            .last()
            .map(|entry| entry.created_at)
            .unwrap_or_else(now_millis)
    }

    /// Returns the newest sequence number, 0 when empty.
    pub fn latest_seq(&self) -> u64 {
        *self.next_seq.read() - 1
    }

    /// Returns entries with `seq > cursor`, up to `limit`.
    ///
    /// Consumers pull through this boundary; the pull transport itself
    /// is outside this crate.
    pub fn entries_since(&self, cursor: u64, limit: usize) -> Vec<UpdateLogEntry> {
        self.entries
            .read()
            .iter()
            .filter(|entry| entry.seq > cursor)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if the log is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Default for UpdateLog {
    fn default() -> Self {
        Self::new()
    }
}
