//! Membership directory
//!
//! The coordinator is authoritative for the table. Followers only ever
//! replace their copy with a snapshot received from the coordinator.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;

/// Identifier assigned to a peer by the coordinator
pub type PeerId = u64;

/// A member of the group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    pub id: PeerId,
    pub address: SocketAddr,
    pub name: String,
}

impl Peer {
    pub fn new(id: PeerId, address: SocketAddr, name: impl Into<String>) -> Self {
        Self {
            id,
            address,
            name: name.into(),
        }
    }
}

#[derive(Debug)]
struct DirectoryInner {
    peers: BTreeMap<PeerId, Peer>,
    next_id: PeerId,
}

/// Table of known peers plus the next id to hand out
#[derive(Debug)]
pub struct MembershipDirectory {
    inner: RwLock<DirectoryInner>,
}

impl Default for MembershipDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl MembershipDirectory {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(DirectoryInner {
                peers: BTreeMap::new(),
                next_id: 1,
            }),
        }
    }

    /// Allocate an id for a joining address.
    ///
    /// An address that is already registered keeps its id; the returned flag
    /// is `true` only when a new entry was created. Fresh ids for which
    /// `retired` holds are skipped, so an evicted id is never handed out again.
    pub fn allocate<F>(&self, address: SocketAddr, name: &str, retired: F) -> (PeerId, bool)
    where
        F: Fn(PeerId) -> bool,
    {
        let mut inner = self.inner.write();

        if let Some(existing) = inner.peers.values_mut().find(|p| p.address == address) {
            existing.name = name.to_string();
            return (existing.id, false);
        }

        let mut id = inner.next_id;
        while retired(id) || inner.peers.contains_key(&id) {
            id += 1;
        }
        inner.next_id = id + 1;
        inner.peers.insert(id, Peer::new(id, address, name));
        (id, true)
    }

    /// Insert or overwrite a peer, keeping `next_id` ahead of every id
    pub fn insert(&self, peer: Peer) {
        let mut inner = self.inner.write();
        if peer.id >= inner.next_id {
            inner.next_id = peer.id + 1;
        }
        inner.peers.insert(peer.id, peer);
    }

    pub fn remove(&self, id: PeerId) -> Option<Peer> {
        self.inner.write().peers.remove(&id)
    }

    /// Replace the whole table with a snapshot.
    ///
    /// `next_id` moves up to `max(id) + 1` but never back down, so ids that
    /// left the table are not reused.
    pub fn replace(&self, snapshot: Vec<Peer>) {
        let mut inner = self.inner.write();
        inner.peers = snapshot.into_iter().map(|p| (p.id, p)).collect();
        if let Some(max) = inner.peers.keys().next_back().copied() {
            inner.next_id = inner.next_id.max(max + 1);
        }
    }

    pub fn get(&self, id: PeerId) -> Option<Peer> {
        self.inner.read().peers.get(&id).cloned()
    }

    pub fn contains(&self, id: PeerId) -> bool {
        self.inner.read().peers.contains_key(&id)
    }

    /// Case-insensitive lookup by display name
    pub fn find_by_name(&self, name: &str) -> Option<Peer> {
        self.inner
            .read()
            .peers
            .values()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .cloned()
    }

    /// All peers ordered by id
    pub fn snapshot(&self) -> Vec<Peer> {
        self.inner.read().peers.values().cloned().collect()
    }

    pub fn higher_than(&self, id: PeerId) -> Vec<Peer> {
        self.inner
            .read()
            .peers
            .range(id + 1..)
            .map(|(_, p)| p.clone())
            .collect()
    }

    /// Every peer except `id`
    pub fn others(&self, id: PeerId) -> Vec<Peer> {
        self.inner
            .read()
            .peers
            .values()
            .filter(|p| p.id != id)
            .cloned()
            .collect()
    }

    pub fn next_id(&self) -> PeerId {
        self.inner.read().next_id
    }

    pub fn len(&self) -> usize {
        self.inner.read().peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().peers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    fn none(_: PeerId) -> bool {
        false
    }

    #[test]
    fn test_allocate_assigns_sequential_ids() {
        let dir = MembershipDirectory::new();
        assert_eq!(dir.allocate(addr(6001), "a", none), (1, true));
        assert_eq!(dir.allocate(addr(6002), "b", none), (2, true));
        assert_eq!(dir.next_id(), 3);
    }

    #[test]
    fn test_duplicate_join_reuses_id() {
        let dir = MembershipDirectory::new();
        let (id, _) = dir.allocate(addr(6001), "a", none);
        assert_eq!(dir.allocate(addr(6001), "a-renamed", none), (id, false));
        assert_eq!(dir.len(), 1);
        assert_eq!(dir.get(id).unwrap().name, "a-renamed");
    }

    #[test]
    fn test_replace_recomputes_next_id() {
        let dir = MembershipDirectory::new();
        dir.replace(vec![Peer::new(4, addr(1), "x"), Peer::new(7, addr(2), "y")]);
        assert_eq!(dir.next_id(), 8);
        assert_eq!(dir.snapshot().len(), 2);

        dir.replace(Vec::new());
        assert!(dir.is_empty());
        assert_eq!(dir.next_id(), 8);

        dir.replace(vec![Peer::new(2, addr(3), "z")]);
        assert_eq!(dir.next_id(), 8);
    }

    #[test]
    fn test_allocate_skips_retired_ids() {
        let dir = MembershipDirectory::new();
        dir.replace(vec![Peer::new(1, addr(1), "a"), Peer::new(2, addr(2), "b")]);
        assert_eq!(dir.allocate(addr(4), "d", |id| id == 3 || id == 4), (5, true));
        assert_eq!(dir.next_id(), 6);
    }

    #[test]
    fn test_replace_drops_stale_entries() {
        let dir = MembershipDirectory::new();
        dir.allocate(addr(1), "gone", none);
        dir.replace(vec![Peer::new(2, addr(2), "kept")]);
        assert!(!dir.contains(1));
        assert!(dir.contains(2));
    }

    #[test]
    fn test_higher_than_and_others() {
        let dir = MembershipDirectory::new();
        for (port, name) in [(1, "a"), (2, "b"), (3, "c")] {
            dir.allocate(addr(port), name, none);
        }
        let higher: Vec<_> = dir.higher_than(1).into_iter().map(|p| p.id).collect();
        assert_eq!(higher, vec![2, 3]);
        let others: Vec<_> = dir.others(2).into_iter().map(|p| p.id).collect();
        assert_eq!(others, vec![1, 3]);
    }

    #[test]
    fn test_find_by_name_is_case_insensitive() {
        let dir = MembershipDirectory::new();
        dir.allocate(addr(1), "Alice", none);
        assert_eq!(dir.find_by_name("alice").map(|p| p.id), Some(1));
        assert!(dir.find_by_name("bob").is_none());
    }

    #[test]
    fn test_insert_advances_next_id() {
        let dir = MembershipDirectory::new();
        dir.insert(Peer::new(5, addr(1), "self"));
        assert_eq!(dir.next_id(), 6);
        assert_eq!(dir.get(5).map(|p| p.address), Some(addr(1)));
    }
}
