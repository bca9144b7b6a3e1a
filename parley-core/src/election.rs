//! Bully election bookkeeping
//!
//! The election algorithm itself runs on the node (see `node::election`);
//! this holds the re-entry guard and the OK signal a candidate waits on.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

#[derive(Debug, Default)]
pub struct ElectionState {
    in_progress: AtomicBool,
    ok_received: AtomicBool,
    ok_notify: Notify,
}

/// Releases the re-entry guard when the election finishes
#[derive(Debug)]
pub struct ElectionGuard<'a> {
    state: &'a ElectionState,
}

impl Drop for ElectionGuard<'_> {
    fn drop(&mut self) {
        self.state.in_progress.store(false, Ordering::SeqCst);
    }
}

impl ElectionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the election; `None` when one is already running
    pub fn try_begin(&self) -> Option<ElectionGuard<'_>> {
        if self.in_progress.swap(true, Ordering::SeqCst) {
            return None;
        }
        self.ok_received.store(false, Ordering::SeqCst);
        Some(ElectionGuard { state: self })
    }

    pub fn in_progress(&self) -> bool {
        self.in_progress.load(Ordering::SeqCst)
    }

    /// Signal that a higher node answered OK
    pub fn record_ok(&self) {
        self.ok_received.store(true, Ordering::SeqCst);
        self.ok_notify.notify_waiters();
    }

    /// Wait up to `timeout` for an OK. Returns whether one arrived.
    pub async fn wait_for_ok(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.ok_notify.notified();
            if self.ok_received.load(Ordering::SeqCst) {
                return true;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.ok_received.load(Ordering::SeqCst);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_guard_prevents_reentry() {
        let state = ElectionState::new();
        let guard = state.try_begin().unwrap();
        assert!(state.try_begin().is_none());
        drop(guard);
        assert!(state.try_begin().is_some());
    }

    #[tokio::test]
    async fn test_wait_for_ok_times_out() {
        let state = ElectionState::new();
        let _guard = state.try_begin().unwrap();
        assert!(!state.wait_for_ok(Duration::from_millis(30)).await);
    }

    #[tokio::test]
    async fn test_wait_for_ok_wakes_on_ok() {
        let state = Arc::new(ElectionState::new());
        let _guard = state.try_begin().unwrap();

        let signaller = state.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            signaller.record_ok();
        });

        assert!(state.wait_for_ok(Duration::from_secs(5)).await);
    }
}
