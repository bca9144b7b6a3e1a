//! Causally ordered chat history

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::membership::PeerId;

/// A single chat line as stored in every node's log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub lamport: u64,
    pub origin_id: PeerId,
    pub origin_name: String,
    pub text: String,
    /// Sender's raw wall clock, seconds since the epoch
    pub wall_time: f64,
    /// Sender's corrected clock, seconds since the epoch
    pub corrected_time: f64,
}

impl HistoryEntry {
    fn key(&self) -> (u64, PeerId, String) {
        (self.lamport, self.origin_id, self.text.clone())
    }

    fn order(&self) -> (u64, PeerId) {
        (self.lamport, self.origin_id)
    }
}

#[derive(Debug, Default)]
struct LogInner {
    entries: Vec<HistoryEntry>,
    seen: HashSet<(u64, PeerId, String)>,
}

/// Append-only log, ordered by `(lamport, origin_id)` and de-duplicated on
/// `(lamport, origin_id, text)`.
#[derive(Debug, Default)]
pub struct HistoryLog {
    inner: Mutex<LogInner>,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one entry; returns `false` if it was already present
    pub fn append(&self, entry: HistoryEntry) -> bool {
        let mut inner = self.inner.lock();
        Self::insert_locked(&mut inner, entry)
    }

    /// Merge a batch and return how many entries were new
    pub fn merge(&self, batch: Vec<HistoryEntry>) -> usize {
        let mut inner = self.inner.lock();
        batch
            .into_iter()
            .filter(|entry| Self::insert_locked(&mut inner, entry.clone()))
            .count()
    }

    fn insert_locked(inner: &mut LogInner, entry: HistoryEntry) -> bool {
        if !inner.seen.insert(entry.key()) {
            return false;
        }
        // Stable position after every entry that sorts at or before this one
        let pos = inner
            .entries
            .partition_point(|existing| existing.order() <= entry.order());
        inner.entries.insert(pos, entry);
        true
    }

    /// Snapshot in `(lamport, origin_id)` order
    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.inner.lock().entries.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }
}
