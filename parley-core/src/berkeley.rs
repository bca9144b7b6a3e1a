//! Berkeley clock averaging
//!
//! The coordinator polls every follower for its wall clock, averages the
//! readings with its own corrected time and hands each responder the
//! difference between the mean and what it reported.

use parking_lot::Mutex;
use rand::Rng;
use std::collections::HashMap;
use std::time::Duration;

use crate::membership::PeerId;

/// Result of one averaging round
#[derive(Debug, Clone, PartialEq)]
pub struct SyncRound {
    pub mean: f64,
    /// Delta the coordinator applies to its own offset
    pub own_delta: f64,
    /// Correction for each responder, `mean - reported`
    pub adjustments: Vec<(PeerId, f64)>,
}

/// Average `own_time` with the collected readings.
///
/// Returns `None` when nobody answered; the round is then abandoned.
pub fn compute_round(own_time: f64, responses: &HashMap<PeerId, f64>) -> Option<SyncRound> {
    let readings: Vec<(PeerId, f64)> = responses
        .iter()
        .filter(|(_, t)| t.is_finite())
        .map(|(id, t)| (*id, *t))
        .collect();

    if readings.is_empty() {
        return None;
    }

    let sum: f64 = own_time + readings.iter().map(|(_, t)| t).sum::<f64>();
    let mean = sum / (readings.len() + 1) as f64;

    let mut adjustments: Vec<(PeerId, f64)> =
        readings.into_iter().map(|(id, t)| (id, mean - t)).collect();
    adjustments.sort_by_key(|(id, _)| *id);

    Some(SyncRound {
        mean,
        own_delta: mean - own_time,
        adjustments,
    })
}

/// Delay before the next round: `interval` shifted by a uniform value in `[-jitter, +jitter]`
pub fn next_delay(interval: Duration, jitter: Duration) -> Duration {
    if jitter.is_zero() {
        return interval;
    }
    let jitter_ms = jitter.as_millis() as i64;
    let shift = rand::thread_rng().gen_range(-jitter_ms..=jitter_ms);
    let millis = (interval.as_millis() as i64 + shift).max(1);
    Duration::from_millis(millis as u64)
}

/// Collection window for TIME_RESPONSE replies
#[derive(Debug, Default)]
pub struct ResponseCollector {
    window: Mutex<Option<HashMap<PeerId, f64>>>,
}

impl ResponseCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a fresh window, discarding anything left from a previous round
    pub fn open(&self) {
        *self.window.lock() = Some(HashMap::new());
    }

    /// Record a reading; ignored when no window is open
    pub fn record(&self, id: PeerId, local_time: f64) -> bool {
        match self.window.lock().as_mut() {
            Some(window) => {
                window.insert(id, local_time);
                true
            }
            None => false,
        }
    }

    pub fn count(&self) -> usize {
        self.window.lock().as_ref().map_or(0, |w| w.len())
    }

    /// Close the window and take what was collected
    pub fn close(&self) -> HashMap<PeerId, f64> {
        self.window.lock().take().unwrap_or_default()
    }
}
