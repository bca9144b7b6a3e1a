//! Kick vote state and resolution rule
//!
//! Every node that learns of a vote tracks its own copy and resolves it
//! independently. The resolution rule, checked in this order:
//!
//! ```text
//!   favor   >= min_favorable + 1        -> evicted
//!   against >  known_peers / 2          -> kept
//!   elapsed >= duration                 -> evicted iff favor >= min_favorable + 1
//!   otherwise                           -> still open
//! ```

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

use crate::error::{ParleyError, ParleyResult};
use crate::membership::PeerId;

/// One eviction vote against a single target
#[derive(Debug, Clone)]
pub struct KickVote {
    pub target_id: PeerId,
    pub target_name: String,
    pub initiator_id: PeerId,
    pub initiator_name: String,
    pub started: Instant,
    pub duration: Duration,
    votes: HashMap<PeerId, bool>,
    closed: bool,
}

impl KickVote {
    /// Open a vote with the initiator's YES already recorded
    pub fn new(
        target_id: PeerId,
        target_name: impl Into<String>,
        initiator_id: PeerId,
        initiator_name: impl Into<String>,
        duration: Duration,
    ) -> Self {
        let mut votes = HashMap::new();
        votes.insert(initiator_id, true);
        Self {
            target_id,
            target_name: target_name.into(),
            initiator_id,
            initiator_name: initiator_name.into(),
            started: Instant::now(),
            duration,
            votes,
            closed: false,
        }
    }

    /// Record a ballot; the last ballot per voter wins. Ignored once closed.
    pub fn record(&mut self, voter: PeerId, vote: bool) -> bool {
        if self.closed {
            return false;
        }
        self.votes.insert(voter, vote);
        true
    }

    /// `(favor, against)`
    pub fn tally(&self) -> (usize, usize) {
        let favor = self.votes.values().filter(|v| **v).count();
        (favor, self.votes.len() - favor)
    }

    /// Apply the resolution rule. `None` means the vote is still open.
    pub fn evaluate(&self, known_peers: usize, now: Instant, threshold: usize) -> Option<bool> {
        let (favor, against) = self.tally();

        if favor >= threshold {
            return Some(true);
        }
        if against > known_peers / 2 {
            return Some(false);
        }
        if now.saturating_duration_since(self.started) >= self.duration {
            return Some(favor >= threshold);
        }
        None
    }

    /// Stop accepting ballots
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        self.duration
            .saturating_sub(now.saturating_duration_since(self.started))
    }
}

/// Outcome of a resolved vote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub target_id: PeerId,
    pub target_name: String,
    pub evicted: bool,
    pub favor_count: usize,
    pub against_count: usize,
}

/// Snapshot returned by the vote status command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteStatus {
    pub target_id: PeerId,
    pub target_name: String,
    pub initiator_name: String,
    pub favor_count: usize,
    pub against_count: usize,
    pub remaining: Duration,
}

/// What a vote monitor should do after one check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorStep {
    Pending,
    Resolved(Resolution),
    /// The vote this monitor watched is gone or was replaced
    Finished,
}

#[derive(Debug)]
struct ActiveVote {
    generation: u64,
    vote: KickVote,
}

#[derive(Debug, Default)]
struct SlotInner {
    active: Option<ActiveVote>,
    next_generation: u64,
}

/// Holds at most one active vote per node
#[derive(Debug, Default)]
pub struct VoteSlot {
    inner: Mutex<SlotInner>,
}

impl VoteSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a vote and return its generation for the monitor
    pub fn open(&self, vote: KickVote) -> ParleyResult<u64> {
        let mut inner = self.inner.lock();
        if let Some(active) = &inner.active {
            return Err(ParleyError::VoteInProgress {
                target_name: active.vote.target_name.clone(),
            });
        }
        inner.next_generation += 1;
        let generation = inner.next_generation;
        inner.active = Some(ActiveVote { generation, vote });
        Ok(generation)
    }

    pub fn is_active(&self) -> bool {
        self.inner.lock().active.is_some()
    }

    /// Record a ballot in the active vote
    pub fn record(&self, voter: PeerId, vote: bool) -> ParleyResult<()> {
        let mut inner = self.inner.lock();
        let active = inner.active.as_mut().ok_or(ParleyError::NoActiveVote)?;
        if !active.vote.record(voter, vote) {
            return Err(ParleyError::VoteClosed {
                target_name: active.vote.target_name.clone(),
            });
        }
        Ok(())
    }

    /// One monitor tick for `generation`. A resolved vote is closed and cleared.
    pub fn check(
        &self,
        generation: u64,
        known_peers: usize,
        now: Instant,
        threshold: usize,
    ) -> MonitorStep {
        let mut inner = self.inner.lock();
        let Some(active) = inner.active.as_mut() else {
            return MonitorStep::Finished;
        };
        if active.generation != generation || active.vote.is_closed() {
            return MonitorStep::Finished;
        }

        let Some(evicted) = active.vote.evaluate(known_peers, now, threshold) else {
            return MonitorStep::Pending;
        };

        active.vote.close();
        let (favor_count, against_count) = active.vote.tally();
        let resolution = Resolution {
            target_id: active.vote.target_id,
            target_name: active.vote.target_name.clone(),
            evicted,
            favor_count,
            against_count,
        };
        inner.active = None;
        MonitorStep::Resolved(resolution)
    }

    /// Drop the active vote if it targets `target_id`
    pub fn clear_for(&self, target_id: PeerId) -> bool {
        let mut inner = self.inner.lock();
        if inner
            .active
            .as_ref()
            .is_some_and(|a| a.vote.target_id == target_id)
        {
            inner.active = None;
            return true;
        }
        false
    }

    pub fn status(&self, now: Instant) -> Option<VoteStatus> {
        let inner = self.inner.lock();
        inner.active.as_ref().map(|active| {
            let (favor_count, against_count) = active.vote.tally();
            VoteStatus {
                target_id: active.vote.target_id,
                target_name: active.vote.target_name.clone(),
                initiator_name: active.vote.initiator_name.clone(),
                favor_count,
                against_count,
                remaining: active.vote.remaining(now),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn vote() -> KickVote {
        KickVote::new(4, "dave", 1, "alice", Duration::from_secs(30))
    }

    #[test]
    fn test_initiator_ballot_is_yes() {
        let mut v = vote();
        assert_eq!(v.tally(), (1, 0));
        v.record(1, false);
        assert_eq!(v.tally(), (0, 1));
    }

    #[test]
    fn test_threshold_reached_evicts() {
        let mut v = vote();
        assert_eq!(v.evaluate(5, v.started, 2), None);
        v.record(2, true);
        assert_eq!(v.evaluate(5, v.started, 2), Some(true));
    }

    #[test]
    fn test_majority_against_keeps() {
        let mut v = vote();
        v.record(2, false);
        v.record(3, false);
        assert_eq!(v.evaluate(5, v.started, 3), None);
        v.record(4, false);
        assert_eq!(v.evaluate(5, v.started, 3), Some(false));
    }

    #[test]
    fn test_deadline_applies_threshold() {
        let v = vote();
        let later = v.started + Duration::from_secs(31);
        assert_eq!(v.evaluate(10, later, 2), Some(false));
        assert_eq!(v.evaluate(10, later, 1), Some(true));
    }

    #[test]
    fn test_last_ballot_wins_and_closed_rejects() {
        let mut v = vote();
        v.record(2, true);
        v.record(2, false);
        assert_eq!(v.tally(), (1, 1));

        v.close();
        assert!(v.is_closed());
        assert!(!v.record(3, true));
        assert_eq!(v.tally(), (1, 1));
    }

    #[test]
    fn test_slot_allows_one_vote() {
        let slot = VoteSlot::new();
        slot.open(vote()).unwrap();
        assert!(matches!(
            slot.open(vote()),
            Err(ParleyError::VoteInProgress { .. })
        ));
    }

    #[test]
    fn test_slot_record_without_vote() {
        let slot = VoteSlot::new();
        assert!(matches!(slot.record(2, true), Err(ParleyError::NoActiveVote)));
    }

    #[test]
    fn test_slot_check_resolves_and_clears() {
        let slot = VoteSlot::new();
        let generation = slot.open(vote()).unwrap();
        let now = Instant::now();

        assert_eq!(slot.check(generation, 3, now, 2), MonitorStep::Pending);
        slot.record(2, true).unwrap();

        match slot.check(generation, 3, now, 2) {
            MonitorStep::Resolved(r) => {
                assert!(r.evicted);
                assert_eq!((r.favor_count, r.against_count), (2, 0));
            }
            other => panic!("unexpected step {:?}", other),
        }
        assert!(!slot.is_active());
        assert_eq!(slot.check(generation, 3, now, 2), MonitorStep::Finished);
    }

    #[test]
    fn test_stale_monitor_does_not_touch_new_vote() {
        let slot = VoteSlot::new();
        let first = slot.open(vote()).unwrap();
        assert!(slot.clear_for(4));
        let second = slot.open(vote()).unwrap();

        assert_ne!(first, second);
        assert_eq!(slot.check(first, 3, Instant::now(), 1), MonitorStep::Finished);
        assert!(slot.is_active());
    }

    #[test]
    fn test_status_reports_tally() {
        let slot = VoteSlot::new();
        assert!(slot.status(Instant::now()).is_none());
        slot.open(vote()).unwrap();
        slot.record(3, false).unwrap();

        let status = slot.status(Instant::now()).unwrap();
        assert_eq!(status.target_name, "dave");
        assert_eq!((status.favor_count, status.against_count), (1, 1));
        assert!(status.remaining <= Duration::from_secs(30));
    }
}
