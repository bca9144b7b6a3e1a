use parking_lot::RwLock;
use serde::Serialize;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch, Notify};

use crate::ban_list::BanList;
use crate::berkeley::ResponseCollector;
use crate::clock::{system_clock, WallClock};
use crate::codec;
use crate::config::ParleyConfig;
use crate::election::ElectionState;
use crate::events::NodeEvent;
use crate::heartbeat::HeartbeatTimer;
use crate::history::HistoryLog;
use crate::kick_vote::VoteSlot;
use crate::lamport::LamportClock;
use crate::membership::{MembershipDirectory, PeerId};
use crate::message::{Envelope, Message};
use crate::role::{CoordinatorInfo, Role, RoleState};
use crate::time_correction::TimeCorrection;
use crate::transport::Transport;

/// A Parley chat node
///
/// Cheap to clone; every clone drives the same node.
#[derive(Clone)]
pub struct Node {
    pub(super) shared: Arc<NodeShared>,
}

/// Summary returned by the `status` command
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeStatus {
    pub id: Option<PeerId>,
    pub name: String,
    pub address: SocketAddr,
    pub role: Role,
    pub coordinator: Option<CoordinatorInfo>,
    pub peer_count: usize,
    pub history_len: usize,
    pub lamport: u64,
    pub clock_offset: f64,
    pub banned: Vec<PeerId>,
    pub running: bool,
}

/// State shared by every task a node runs.
///
/// Each component guards itself; no code path holds two component locks.
pub(crate) struct NodeShared {
    pub(super) config: ParleyConfig,
    pub(super) name: String,
    pub(super) address: SocketAddr,
    pub(super) transport: Arc<dyn Transport>,

    pub(super) id: RwLock<Option<PeerId>>,
    pub(super) lamport: LamportClock,
    pub(super) history: HistoryLog,
    pub(super) directory: MembershipDirectory,
    pub(super) time: TimeCorrection,
    pub(super) role: RoleState,
    pub(super) heartbeat: HeartbeatTimer,
    pub(super) election: ElectionState,
    pub(super) berkeley: ResponseCollector,
    pub(super) votes: VoteSlot,
    pub(super) bans: BanList,

    pub(super) events: broadcast::Sender<NodeEvent>,
    pub(super) assigned: Notify,
    pub(super) running: AtomicBool,
    pub(super) started: AtomicBool,
    /// Bumped on every promotion; coordinator loops exit when it moves on
    pub(super) coordinator_term: AtomicU64,
    pub(super) shutdown_tx: watch::Sender<bool>,
}

impl Node {
    /// Create a node reading the host wall clock
    pub fn new(config: ParleyConfig, transport: Arc<dyn Transport>) -> Self {
        Self::with_clock(config, transport, system_clock())
    }

    /// Create a node reading wall-clock time from `clock`
    pub fn with_clock(
        config: ParleyConfig,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn WallClock>,
    ) -> Self {
        let (events, _) = broadcast::channel(crate::config::DEFAULT_EVENT_CHANNEL_CAPACITY);
        let (shutdown_tx, _) = watch::channel(false);
        let max_correction = config.clock_sync.max_correction_secs;

        Self {
            shared: Arc::new(NodeShared {
                name: config.node.display_name(),
                address: transport.local_addr(),
                transport,
                config,
                id: RwLock::new(None),
                lamport: LamportClock::new(),
                history: HistoryLog::new(),
                directory: MembershipDirectory::new(),
                time: TimeCorrection::new(clock, max_correction),
                role: RoleState::new(),
                heartbeat: HeartbeatTimer::new(),
                election: ElectionState::new(),
                berkeley: ResponseCollector::new(),
                votes: VoteSlot::new(),
                bans: BanList::new(),
                events,
                assigned: Notify::new(),
                running: AtomicBool::new(false),
                started: AtomicBool::new(false),
                coordinator_term: AtomicU64::new(0),
                shutdown_tx,
            }),
        }
    }

    pub fn id(&self) -> Option<PeerId> {
        self.shared.id()
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn address(&self) -> SocketAddr {
        self.shared.address
    }

    pub fn role(&self) -> Role {
        self.shared.role.role()
    }

    pub fn coordinator(&self) -> Option<CoordinatorInfo> {
        self.shared.role.coordinator()
    }

    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    pub fn config(&self) -> &ParleyConfig {
        &self.shared.config
    }

    /// Subscribe to node events
    pub fn subscribe(&self) -> broadcast::Receiver<NodeEvent> {
        self.shared.events.subscribe()
    }

    pub fn is_banned(&self, id: PeerId) -> bool {
        self.shared.bans.contains(id)
    }

    pub fn banned(&self) -> Vec<PeerId> {
        self.shared.bans.snapshot()
    }

    pub fn lamport(&self) -> u64 {
        self.shared.lamport.current()
    }

    pub fn status(&self) -> NodeStatus {
        let shared = &self.shared;
        NodeStatus {
            id: shared.id(),
            name: shared.name.clone(),
            address: shared.address,
            role: shared.role.role(),
            coordinator: shared.role.coordinator(),
            peer_count: shared.directory.len(),
            history_len: shared.history.len(),
            lamport: shared.lamport.current(),
            clock_offset: shared.time.offset(),
            banned: shared.bans.snapshot(),
            running: shared.is_running(),
        }
    }
}

impl NodeShared {
    pub(super) fn id(&self) -> Option<PeerId> {
        *self.id.read()
    }

    pub(super) fn set_id(&self, id: PeerId) {
        *self.id.write() = Some(id);
    }

    pub(super) fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub(super) fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    pub(super) fn emit(&self, event: NodeEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    pub(super) fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(future);
    }

    /// Stamp a message with our identity and a fresh Lamport value
    pub(super) fn envelope(&self, message: Message) -> Envelope {
        Envelope {
            origin_id: self.id(),
            origin_address: self.address,
            origin_name: self.name.clone(),
            lamport: self.lamport.tick(),
            message,
        }
    }

    pub(super) async fn broadcast(&self, message: Message) {
        let envelope = self.envelope(message);
        self.broadcast_envelope(&envelope).await;
    }

    pub(super) async fn broadcast_envelope(&self, envelope: &Envelope) {
        let bytes = match codec::encode(envelope) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!("Failed to encode {}: {}", envelope.kind(), e);
                return;
            }
        };
        if let Err(e) = self.transport.broadcast(&bytes).await {
            tracing::warn!("Broadcast of {} failed: {}", envelope.kind(), e);
        }
    }

    pub(super) async fn send_to(&self, addr: SocketAddr, message: Message) {
        let envelope = self.envelope(message);
        let bytes = match codec::encode(&envelope) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!("Failed to encode {}: {}", envelope.kind(), e);
                return;
            }
        };
        if let Err(e) = self.transport.send_to(addr, &bytes).await {
            tracing::warn!("Sending {} to {} failed: {}", envelope.kind(), addr, e);
        }
    }

    /// Our own entry as a coordinator identity
    pub(super) fn self_info(&self, id: PeerId) -> CoordinatorInfo {
        CoordinatorInfo {
            id,
            address: self.address,
            name: self.name.clone(),
        }
    }
}
