//! Clamped clock offset maintained by Berkeley synchronization

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::clock::WallClock;

#[derive(Debug, Default, Clone, Copy)]
struct Correction {
    offset: f64,
    last_sync: Option<f64>,
}

/// Snapshot returned by the `time` command
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeStatus {
    pub corrected: f64,
    pub wall: f64,
    pub offset: f64,
    /// Corrected time of the last applied adjustment
    pub last_sync: Option<f64>,
}

/// Offset applied on top of the wall clock, bounded by `max_correction`
#[derive(Debug)]
pub struct TimeCorrection {
    clock: Arc<dyn WallClock>,
    max_correction: f64,
    state: Mutex<Correction>,
}

impl TimeCorrection {
    pub fn new(clock: Arc<dyn WallClock>, max_correction: f64) -> Self {
        Self {
            clock,
            max_correction: max_correction.abs(),
            state: Mutex::new(Correction::default()),
        }
    }

    /// Raw wall clock reading
    pub fn wall_time(&self) -> f64 {
        self.clock.now()
    }

    /// Wall clock plus the current offset
    pub fn now(&self) -> f64 {
        let offset = self.state.lock().offset;
        self.clock.now() + offset
    }

    pub fn offset(&self) -> f64 {
        self.state.lock().offset
    }

    /// Replace the offset with `correction`, clamped. Returns the applied value.
    pub fn set_offset(&self, correction: f64) -> f64 {
        let applied = self.clamp(correction);
        let wall = self.clock.now();
        let mut state = self.state.lock();
        state.offset = applied;
        state.last_sync = Some(wall + applied);
        applied
    }

    /// Shift the offset by `delta`, keeping the result clamped. Returns the new offset.
    pub fn adjust(&self, delta: f64) -> f64 {
        let wall = self.clock.now();
        let mut state = self.state.lock();
        let applied = self.clamp(state.offset + delta);
        state.offset = applied;
        state.last_sync = Some(wall + applied);
        applied
    }

    pub fn status(&self) -> TimeStatus {
        let wall = self.clock.now();
        let state = *self.state.lock();
        TimeStatus {
            corrected: wall + state.offset,
            wall,
            offset: state.offset,
            last_sync: state.last_sync,
        }
    }

    fn clamp(&self, value: f64) -> f64 {
        if !value.is_finite() {
            return 0.0;
        }
        value.clamp(-self.max_correction, self.max_correction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SkewedClock;

    fn correction() -> TimeCorrection {
        TimeCorrection::new(Arc::new(SkewedClock::new(0.0)), 10.0)
    }

    #[test]
    fn test_set_offset_is_clamped() {
        let tc = correction();
        assert_eq!(tc.set_offset(25.0), 10.0);
        assert_eq!(tc.set_offset(-25.0), -10.0);
        assert_eq!(tc.set_offset(2.5), 2.5);
        assert_eq!(tc.offset(), 2.5);
    }

    #[test]
    fn test_set_offset_replaces_previous() {
        let tc = correction();
        tc.set_offset(4.0);
        tc.set_offset(1.0);
        assert_eq!(tc.offset(), 1.0);
    }

    #[test]
    fn test_adjust_accumulates_within_bound() {
        let tc = correction();
        tc.adjust(6.0);
        assert_eq!(tc.adjust(6.0), 10.0);
        assert_eq!(tc.adjust(-3.0), 7.0);
    }

    #[test]
    fn test_status_reports_last_sync() {
        let tc = correction();
        assert!(tc.status().last_sync.is_none());
        tc.set_offset(1.0);
        let status = tc.status();
        assert_eq!(status.offset, 1.0);
        assert!(status.last_sync.is_some());
        assert!((status.corrected - status.wall - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_non_finite_correction_is_ignored() {
        let tc = correction();
        assert_eq!(tc.set_offset(f64::NAN), 0.0);
    }
}
