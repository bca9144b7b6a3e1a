//! Node-local set of evicted peer ids

use parking_lot::Mutex;
use std::collections::BTreeSet;

use crate::membership::PeerId;

/// Append-only; an id is never unbanned
#[derive(Debug, Default)]
pub struct BanList {
    ids: Mutex<BTreeSet<PeerId>>,
}

impl BanList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` the first time an id is banned
    pub fn insert(&self, id: PeerId) -> bool {
        self.ids.lock().insert(id)
    }

    pub fn contains(&self, id: PeerId) -> bool {
        self.ids.lock().contains(&id)
    }

    pub fn snapshot(&self) -> Vec<PeerId> {
        self.ids.lock().iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_once() {
        let bans = BanList::new();
        assert!(bans.insert(4));
        assert!(!bans.insert(4));
        assert!(bans.contains(4));
        assert_eq!(bans.snapshot(), vec![4]);
    }
}
