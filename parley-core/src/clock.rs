//! Wall clock abstraction
//!
//! Clock synchronization reads the wall clock through [`WallClock`] so nodes
//! with deliberately divergent clocks can run side by side in one process.

use chrono::{DateTime, Local, TimeZone, Utc};
use std::sync::Arc;

/// Source of wall-clock time in seconds since the Unix epoch
pub trait WallClock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> f64;
}

/// The host clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now(&self) -> f64 {
        let now = Utc::now();
        now.timestamp() as f64 + f64::from(now.timestamp_subsec_micros()) / 1_000_000.0
    }
}

/// The host clock shifted by a fixed number of seconds
#[derive(Debug, Clone, Copy)]
pub struct SkewedClock {
    skew: f64,
}

impl SkewedClock {
    pub fn new(skew: f64) -> Self {
        Self { skew }
    }
}

impl WallClock for SkewedClock {
    fn now(&self) -> f64 {
        SystemClock.now() + self.skew
    }
}

pub fn system_clock() -> Arc<dyn WallClock> {
    Arc::new(SystemClock)
}

/// Render epoch seconds as local `HH:MM:SS`
pub fn format_hms(epoch_secs: f64) -> String {
    to_local(epoch_secs)
        .map(|dt| dt.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string())
}

/// Render epoch seconds as local `YYYY-MM-DD HH:MM:SS`
pub fn format_datetime(epoch_secs: f64) -> String {
    to_local(epoch_secs)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn to_local(epoch_secs: f64) -> Option<DateTime<Local>> {
    if !epoch_secs.is_finite() {
        return None;
    }
    let secs = epoch_secs.floor();
    let nanos = ((epoch_secs - secs) * 1_000_000_000.0) as u32;
    Local.timestamp_opt(secs as i64, nanos).single()
}
