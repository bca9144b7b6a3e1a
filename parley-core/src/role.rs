//! Node role and cached coordinator identity

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;

use crate::membership::PeerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Follower,
    Candidate,
    Coordinator,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Follower => write!(f, "follower"),
            Role::Candidate => write!(f, "candidate"),
            Role::Coordinator => write!(f, "coordinator"),
        }
    }
}

/// Who this node currently believes is coordinator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorInfo {
    pub id: PeerId,
    pub address: SocketAddr,
    pub name: String,
}

#[derive(Debug)]
struct RoleInner {
    role: Role,
    coordinator: Option<CoordinatorInfo>,
}

/// Role plus coordinator cache, kept under one lock so they change together
#[derive(Debug)]
pub struct RoleState {
    inner: Mutex<RoleInner>,
}

impl Default for RoleState {
    fn default() -> Self {
        Self::new()
    }
}

impl RoleState {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RoleInner {
                role: Role::Follower,
                coordinator: None,
            }),
        }
    }

    pub fn role(&self) -> Role {
        self.inner.lock().role
    }

    pub fn is_coordinator(&self) -> bool {
        self.role() == Role::Coordinator
    }

    /// Set the role, returning the previous one
    pub fn set_role(&self, role: Role) -> Role {
        std::mem::replace(&mut self.inner.lock().role, role)
    }

    /// Move from `Candidate` back to `Follower`; any other role is kept
    pub fn stand_down(&self) {
        let mut inner = self.inner.lock();
        if inner.role == Role::Candidate {
            inner.role = Role::Follower;
        }
    }

    pub fn coordinator(&self) -> Option<CoordinatorInfo> {
        self.inner.lock().coordinator.clone()
    }

    pub fn coordinator_id(&self) -> Option<PeerId> {
        self.inner.lock().coordinator.as_ref().map(|c| c.id)
    }

    /// Cache a coordinator identity and return the previously cached one
    pub fn set_coordinator(&self, info: CoordinatorInfo) -> Option<CoordinatorInfo> {
        self.inner.lock().coordinator.replace(info)
    }

    /// Adopt `info` as coordinator and derive the role from whether it names us.
    ///
    /// Returns the previous role.
    pub fn adopt(&self, info: CoordinatorInfo, self_id: Option<PeerId>) -> Role {
        let mut inner = self.inner.lock();
        let role = if Some(info.id) == self_id {
            Role::Coordinator
        } else {
            Role::Follower
        };
        inner.coordinator = Some(info);
        std::mem::replace(&mut inner.role, role)
    }

    pub fn clear_coordinator(&self) {
        self.inner.lock().coordinator = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(id: PeerId) -> CoordinatorInfo {
        CoordinatorInfo {
            id,
            address: SocketAddr::from(([127, 0, 0, 1], 6000 + id as u16)),
            name: format!("n{}", id),
        }
    }

    #[test]
    fn test_adopt_self_becomes_coordinator() {
        let state = RoleState::new();
        assert_eq!(state.adopt(info(3), Some(3)), Role::Follower);
        assert!(state.is_coordinator());
        assert_eq!(state.coordinator_id(), Some(3));
    }

    #[test]
    fn test_adopt_other_steps_down() {
        let state = RoleState::new();
        state.set_role(Role::Coordinator);
        assert_eq!(state.adopt(info(5), Some(2)), Role::Coordinator);
        assert_eq!(state.role(), Role::Follower);
    }

    #[test]
    fn test_stand_down_only_affects_candidates() {
        let state = RoleState::new();
        state.set_role(Role::Coordinator);
        state.stand_down();
        assert_eq!(state.role(), Role::Coordinator);

        state.set_role(Role::Candidate);
        state.stand_down();
        assert_eq!(state.role(), Role::Follower);
    }
}
