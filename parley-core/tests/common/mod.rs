//! Shared helpers for multi-node tests over the in-memory network
#![allow(dead_code)]

use parking_lot::Mutex;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};

use parley_core::clock::WallClock;
use parley_core::codec;
use parley_core::message::{Envelope, Message, MessageKind};
use parley_core::transport::{Channel, MemoryNetwork, MemoryTransport, Transport};
use parley_core::{Node, ParleyConfig, ParleyConfigBuilder, PeerId};

/// Timeouts are multiplied by this in CI, where schedulers are slower
pub fn timeout_multiplier() -> u32 {
    if std::env::var("CI").is_ok() {
        return 3;
    }
    std::env::var("TEST_TIMEOUT_MULTIPLIER")
        .ok()
        .and_then(|m| m.parse().ok())
        .unwrap_or(1)
}

pub fn scaled_timeout(base: Duration) -> Duration {
    base * timeout_multiplier()
}

/// Poll `condition` until it holds or `timeout` elapses
pub async fn wait_for_condition<F, Fut>(mut condition: F, timeout: Duration) -> Result<(), String>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let timeout = scaled_timeout(timeout);
    let start = Instant::now();

    while start.elapsed() < timeout {
        if condition().await {
            return Ok(());
        }
        sleep(Duration::from_millis(20)).await;
    }

    Err(format!("Timeout waiting for condition after {:?}", timeout))
}

/// Short timings so elections and votes finish in well under a second
pub fn fast_config(name: &str) -> ParleyConfig {
    ParleyConfigBuilder::from_config(ParleyConfig::test())
        .name(name)
        .build()
        .expect("test config is valid")
}

/// A set of nodes attached to one in-memory network
pub struct TestCluster {
    pub network: Arc<MemoryNetwork>,
    pub nodes: Vec<Node>,
}

impl TestCluster {
    pub fn new() -> Self {
        Self {
            network: MemoryNetwork::new(),
            nodes: Vec::new(),
        }
    }

    pub fn node(&self, config: ParleyConfig) -> Node {
        Node::new(config, Arc::new(self.network.endpoint()))
    }

    pub fn node_with_clock(&self, config: ParleyConfig, clock: Arc<dyn WallClock>) -> Node {
        Node::with_clock(config, Arc::new(self.network.endpoint()), clock)
    }

    /// Create and join a node with the fast test timings
    pub async fn join(&mut self, name: &str) -> Node {
        let node = self.node(fast_config(name));
        self.admit(node).await
    }

    pub async fn join_with_clock(&mut self, name: &str, clock: Arc<dyn WallClock>) -> Node {
        let node = self.node_with_clock(fast_config(name), clock);
        self.admit(node).await
    }

    pub async fn admit(&mut self, node: Node) -> Node {
        node.join().await.expect("join succeeds");
        self.nodes.push(node.clone());
        node
    }

    /// Join `names` one after the other
    pub async fn join_all(&mut self, names: &[&str]) -> Vec<Node> {
        let mut joined = Vec::new();
        for name in names {
            joined.push(self.join(name).await);
        }
        joined
    }

    pub fn raw_peer(&self) -> RawPeer {
        RawPeer::attach(&self.network)
    }

    pub async fn shutdown(&self) {
        for node in &self.nodes {
            node.shutdown().await;
        }
    }
}

/// Wait until every node lists exactly `ids` in its directory
pub async fn wait_for_directories(nodes: &[Node], ids: &[PeerId]) -> Result<(), String> {
    let nodes = nodes.to_vec();
    let expected = ids.to_vec();
    wait_for_condition(
        || {
            let nodes = nodes.clone();
            let expected = expected.clone();
            async move {
                nodes.iter().all(|n| {
                    let ids: Vec<PeerId> = n.peers().into_iter().map(|p| p.id).collect();
                    ids == expected
                })
            }
        },
        Duration::from_secs(5),
    )
    .await
}

/// Wait until every node agrees that `id` is coordinator
pub async fn wait_for_coordinator(nodes: &[Node], id: PeerId) -> Result<(), String> {
    let nodes = nodes.to_vec();
    wait_for_condition(
        || {
            let nodes = nodes.clone();
            async move {
                nodes.iter().all(|n| n.coordinator().map(|c| c.id) == Some(id))
            }
        },
        Duration::from_secs(5),
    )
    .await
}

/// A raw endpoint that records traffic and injects hand-made envelopes
pub struct RawPeer {
    transport: Arc<MemoryTransport>,
    seen: Arc<Mutex<Vec<(Channel, Envelope)>>>,
    lamport: AtomicU64,
}

impl RawPeer {
    fn attach(network: &Arc<MemoryNetwork>) -> Self {
        let transport = Arc::new(network.endpoint());
        let seen = Arc::new(Mutex::new(Vec::new()));

        for channel in [Channel::Broadcast, Channel::Unicast] {
            let transport = transport.clone();
            let seen = seen.clone();
            tokio::spawn(async move {
                while let Ok((bytes, _)) = transport.recv(channel).await {
                    if let Ok(envelope) = codec::decode(&bytes) {
                        if envelope.origin_address != transport.local_addr() {
                            seen.lock().push((channel, envelope));
                        }
                    }
                }
            });
        }

        Self {
            transport,
            seen,
            lamport: AtomicU64::new(1000),
        }
    }

    pub fn address(&self) -> SocketAddr {
        self.transport.local_addr()
    }

    fn envelope(&self, origin_id: Option<PeerId>, name: &str, message: Message) -> Vec<u8> {
        let envelope = Envelope {
            origin_id,
            origin_address: self.address(),
            origin_name: name.to_string(),
            lamport: self.lamport.fetch_add(1, Ordering::SeqCst),
            message,
        };
        codec::encode(&envelope).expect("raw envelope encodes")
    }

    pub async fn broadcast(&self, origin_id: Option<PeerId>, name: &str, message: Message) {
        let bytes = self.envelope(origin_id, name, message);
        self.transport.broadcast(&bytes).await.expect("raw broadcast");
    }

    pub async fn send_to(
        &self,
        addr: SocketAddr,
        origin_id: Option<PeerId>,
        name: &str,
        message: Message,
    ) {
        let bytes = self.envelope(origin_id, name, message);
        self.transport.send_to(addr, &bytes).await.expect("raw send");
    }

    /// Send bytes as-is, bypassing the codec
    pub async fn send_raw(&self, addr: SocketAddr, bytes: &[u8]) {
        self.transport.send_to(addr, bytes).await.expect("raw send");
    }

    /// Envelopes received so far, excluding our own broadcasts
    pub fn seen(&self) -> Vec<(Channel, Envelope)> {
        self.seen.lock().clone()
    }

    pub fn count_kind(&self, kind: MessageKind) -> usize {
        self.seen.lock().iter().filter(|(_, e)| e.kind() == kind).count()
    }

    pub fn count<F>(&self, predicate: F) -> usize
    where
        F: Fn(&Envelope) -> bool,
    {
        self.seen.lock().iter().filter(|(_, e)| predicate(e)).count()
    }

    pub async fn close(&self) {
        self.transport.close().await;
    }
}
