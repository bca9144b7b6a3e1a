//! In-process transport
//!
//! A [`MemoryNetwork`] hands out endpoints with distinct loopback addresses.
//! Broadcasts reach every attached endpoint, the sender included, so the
//! node's own loopback suppression is exercised exactly as with multicast.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::watch;

use super::{Channel, Transport};
use crate::error::{ParleyError, ParleyResult};

type Datagram = (Vec<u8>, SocketAddr);

#[derive(Debug, Clone)]
struct Inbox {
    broadcast: mpsc::UnboundedSender<Datagram>,
    unicast: mpsc::UnboundedSender<Datagram>,
}

/// Shared hub every [`MemoryTransport`] is attached to
#[derive(Debug)]
pub struct MemoryNetwork {
    endpoints: Mutex<HashMap<SocketAddr, Inbox>>,
    next_port: AtomicU16,
}

impl MemoryNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            endpoints: Mutex::new(HashMap::new()),
            next_port: AtomicU16::new(40000),
        })
    }

    /// Attach a new endpoint with a fresh address
    pub fn endpoint(self: &Arc<Self>) -> MemoryTransport {
        let port = self.next_port.fetch_add(1, Ordering::SeqCst);
        self.endpoint_at(SocketAddr::from(([127, 0, 0, 1], port)))
    }

    /// Attach an endpoint at a chosen address, replacing any previous one
    pub fn endpoint_at(self: &Arc<Self>, addr: SocketAddr) -> MemoryTransport {
        let (broadcast_tx, broadcast_rx) = mpsc::unbounded_channel();
        let (unicast_tx, unicast_rx) = mpsc::unbounded_channel();
        self.endpoints.lock().insert(
            addr,
            Inbox {
                broadcast: broadcast_tx,
                unicast: unicast_tx,
            },
        );

        let (closed_tx, closed_rx) = watch::channel(false);
        MemoryTransport {
            network: Arc::clone(self),
            addr,
            broadcast_rx: tokio::sync::Mutex::new(broadcast_rx),
            unicast_rx: tokio::sync::Mutex::new(unicast_rx),
            closed_tx,
            closed_rx,
        }
    }

    /// Addresses currently attached
    pub fn attached(&self) -> Vec<SocketAddr> {
        self.endpoints.lock().keys().copied().collect()
    }

    fn detach(&self, addr: SocketAddr) {
        self.endpoints.lock().remove(&addr);
    }

    fn deliver_all(&self, from: SocketAddr, bytes: &[u8]) {
        let inboxes: Vec<Inbox> = self.endpoints.lock().values().cloned().collect();
        for inbox in inboxes {
            let _ = inbox.broadcast.send((bytes.to_vec(), from));
        }
    }

    fn deliver_to(&self, from: SocketAddr, to: SocketAddr, bytes: &[u8]) {
        let inbox = self.endpoints.lock().get(&to).cloned();
        match inbox {
            Some(inbox) => {
                let _ = inbox.unicast.send((bytes.to_vec(), from));
            }
            None => tracing::trace!("Dropping datagram to detached endpoint {}", to),
        }
    }
}

/// One endpoint of a [`MemoryNetwork`]
#[derive(Debug)]
pub struct MemoryTransport {
    network: Arc<MemoryNetwork>,
    addr: SocketAddr,
    broadcast_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Datagram>>,
    unicast_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Datagram>>,
    closed_tx: watch::Sender<bool>,
    closed_rx: watch::Receiver<bool>,
}

impl MemoryTransport {
    fn ensure_open(&self) -> ParleyResult<()> {
        if *self.closed_rx.borrow() {
            return Err(ParleyError::TransportClosed);
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    async fn broadcast(&self, bytes: &[u8]) -> ParleyResult<()> {
        self.ensure_open()?;
        self.network.deliver_all(self.addr, bytes);
        Ok(())
    }

    async fn send_to(&self, addr: SocketAddr, bytes: &[u8]) -> ParleyResult<()> {
        self.ensure_open()?;
        self.network.deliver_to(self.addr, addr, bytes);
        Ok(())
    }

    async fn recv(&self, channel: Channel) -> ParleyResult<(Vec<u8>, SocketAddr)> {
        self.ensure_open()?;
        let mut closed = self.closed_rx.clone();

        let mut rx = match channel {
            Channel::Broadcast => self.broadcast_rx.lock().await,
            Channel::Unicast => self.unicast_rx.lock().await,
        };

        tokio::select! {
            datagram = rx.recv() => datagram.ok_or(ParleyError::TransportClosed),
            _ = closed.changed() => Err(ParleyError::TransportClosed),
        }
    }

    async fn close(&self) {
        self.network.detach(self.addr);
        let _ = self.closed_tx.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_broadcast_reaches_everyone_including_sender() {
        let net = MemoryNetwork::new();
        let a = net.endpoint();
        let b = net.endpoint();

        a.broadcast(b"hello").await.unwrap();

        let (bytes, from) = b.recv(Channel::Broadcast).await.unwrap();
        assert_eq!(bytes, b"hello");
        assert_eq!(from, a.local_addr());

        let (bytes, _) = a.recv(Channel::Broadcast).await.unwrap();
        assert_eq!(bytes, b"hello");
    }

    #[tokio::test]
    async fn test_unicast_is_point_to_point() {
        let net = MemoryNetwork::new();
        let a = net.endpoint();
        let b = net.endpoint();
        let c = net.endpoint();

        a.send_to(b.local_addr(), b"direct").await.unwrap();
        let (bytes, _) = b.recv(Channel::Unicast).await.unwrap();
        assert_eq!(bytes, b"direct");

        let nothing =
            tokio::time::timeout(Duration::from_millis(50), c.recv(Channel::Unicast)).await;
        assert!(nothing.is_err());
    }

    #[tokio::test]
    async fn test_close_wakes_pending_recv() {
        let net = MemoryNetwork::new();
        let a = Arc::new(net.endpoint());

        let waiter = {
            let a = a.clone();
            tokio::spawn(async move { a.recv(Channel::Unicast).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        a.close().await;

        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(ParleyError::TransportClosed)));
        assert!(net.attached().is_empty());
    }

    #[tokio::test]
    async fn test_send_to_detached_endpoint_is_silent() {
        let net = MemoryNetwork::new();
        let a = net.endpoint();
        let gone = net.endpoint();
        let gone_addr = gone.local_addr();
        gone.close().await;

        assert!(a.send_to(gone_addr, b"lost").await.is_ok());
    }
}
