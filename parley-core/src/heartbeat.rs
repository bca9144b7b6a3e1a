//! Last-heartbeat bookkeeping for the failure detector

use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Time of the last sign of life from the coordinator
#[derive(Debug)]
pub struct HeartbeatTimer {
    last: Mutex<Instant>,
}

impl Default for HeartbeatTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl HeartbeatTimer {
    pub fn new() -> Self {
        Self {
            last: Mutex::new(Instant::now()),
        }
    }

    pub fn reset(&self) {
        *self.last.lock() = Instant::now();
    }

    pub fn elapsed(&self) -> Duration {
        self.last.lock().elapsed()
    }

    /// True when more than `timeout` has passed since the last reset
    pub fn expired(&self, timeout: Duration) -> bool {
        self.elapsed() > timeout
    }
}
