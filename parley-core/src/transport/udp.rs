//! UDP transport: one multicast receive socket, one unicast socket

use async_trait::async_trait;
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use tokio::net::UdpSocket;
use tokio::sync::watch;

use super::{Channel, Transport};
use crate::config::{NetworkConfig, NodeSettings};
use crate::error::{ParleyError, ParleyResult};

#[derive(Debug)]
pub struct UdpTransport {
    unicast: UdpSocket,
    multicast: UdpSocket,
    group: SocketAddr,
    local_addr: SocketAddr,
    recv_buffer_size: usize,
    closed_tx: watch::Sender<bool>,
    closed_rx: watch::Receiver<bool>,
}

impl UdpTransport {
    /// Bind the unicast socket and join the multicast group
    pub fn bind(node: &NodeSettings, network: &NetworkConfig) -> ParleyResult<Self> {
        let unicast = Self::unicast_socket(node, network)?;
        let multicast = Self::multicast_socket(network)?;
        let local_addr = unicast.local_addr()?;

        tracing::info!(
            "UDP transport bound: unicast {} multicast {}",
            local_addr,
            network.group_addr()
        );

        let (closed_tx, closed_rx) = watch::channel(false);
        Ok(Self {
            unicast,
            multicast,
            group: SocketAddr::V4(network.group_addr()),
            local_addr,
            recv_buffer_size: network.recv_buffer_size,
            closed_tx,
            closed_rx,
        })
    }

    fn unicast_socket(node: &NodeSettings, network: &NetworkConfig) -> ParleyResult<UdpSocket> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_multicast_if_v4(&network.interface)?;
        socket.set_multicast_loop_v4(true)?;
        socket.set_multicast_ttl_v4(1)?;
        socket.set_nonblocking(true)?;
        socket.bind(&SockAddr::from(node.bind_addr()))?;

        Ok(UdpSocket::from_std(socket.into())?)
    }

    fn multicast_socket(network: &NetworkConfig) -> ParleyResult<UdpSocket> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        // Several nodes on one host share the group port
        socket.set_reuse_address(true)?;
        #[cfg(all(unix, not(any(target_os = "solaris", target_os = "illumos"))))]
        socket.set_reuse_port(true)?;
        socket.set_nonblocking(true)?;

        let bind = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, network.multicast_port);
        socket.bind(&SockAddr::from(bind))?;
        socket.join_multicast_v4(&network.multicast_group, &network.interface)?;

        Ok(UdpSocket::from_std(socket.into())?)
    }

    fn socket(&self, channel: Channel) -> &UdpSocket {
        match channel {
            Channel::Broadcast => &self.multicast,
            Channel::Unicast => &self.unicast,
        }
    }
}

#[async_trait]
impl Transport for UdpTransport {
    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    async fn broadcast(&self, bytes: &[u8]) -> ParleyResult<()> {
        self.send_to(self.group, bytes).await
    }

    async fn send_to(&self, addr: SocketAddr, bytes: &[u8]) -> ParleyResult<()> {
        if *self.closed_rx.borrow() {
            return Err(ParleyError::TransportClosed);
        }
        self.unicast
            .send_to(bytes, addr)
            .await
            .map_err(|e| ParleyError::send_failure(addr, e))?;
        Ok(())
    }

    async fn recv(&self, channel: Channel) -> ParleyResult<(Vec<u8>, SocketAddr)> {
        let mut closed = self.closed_rx.clone();
        if *closed.borrow() {
            return Err(ParleyError::TransportClosed);
        }

        let mut buf = vec![0u8; self.recv_buffer_size];
        tokio::select! {
            result = self.socket(channel).recv_from(&mut buf) => {
                let (len, from) = result?;
                buf.truncate(len);
                Ok((buf, from))
            }
            _ = closed.changed() => Err(ParleyError::TransportClosed),
        }
    }

    async fn close(&self) {
        let _ = self.closed_tx.send(true);
    }
}
