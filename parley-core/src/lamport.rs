//! Lamport logical clock

use parking_lot::Mutex;

/// Process-wide logical clock.
///
/// `tick` is called before every send, `observe` after every receive.
#[derive(Debug, Default)]
pub struct LamportClock {
    counter: Mutex<u64>,
}

impl LamportClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the clock for a local event and return the new value
    pub fn tick(&self) -> u64 {
        let mut counter = self.counter.lock();
        *counter = counter.saturating_add(1);
        *counter
    }

    /// Merge a received timestamp: `max(local, remote) + 1`
    ///
    /// Saturates at `u64::MAX`. The codec never hands out `u64::MAX`, so a
    /// decoded remote value always leaves room for the increment.
    pub fn observe(&self, remote: u64) -> u64 {
        let mut counter = self.counter.lock();
        *counter = (*counter).max(remote).saturating_add(1);
        *counter
    }

    pub fn current(&self) -> u64 {
        *self.counter.lock()
    }
}
