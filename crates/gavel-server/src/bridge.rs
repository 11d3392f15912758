//! Multicast bridge.
//!
//! Publishes every state change onto a UDP multicast group and hands
//! inbound group traffic back to the driver for relay. The group is a peer
//! bus: any other publisher on it reaches every connected participant
//! without protocol-specific parsing, so inbound payloads stay opaque.
//!
//! Because this process is itself a member of the group it publishes to,
//! inbound datagrams whose sender address equals our own bound address are
//! dropped (self-echo suppression).

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use gavel_proto::AuctionItem;
use tokio::net::UdpSocket;

use crate::error::ServerError;

/// Maximum datagram payload we accept from the group.
const MAX_DATAGRAM_SIZE: usize = 64 * 1024;

/// UDP multicast publisher/receiver.
pub struct MulticastBridge {
    socket: Arc<UdpSocket>,
    group: Ipv4Addr,
    port: u16,
    local_addr: SocketAddr,
}

impl MulticastBridge {
    /// Bind to the multicast port and join the group.
    pub async fn bind(group: Ipv4Addr, port: u16) -> Result<Self, ServerError> {
        if !group.is_multicast() {
            return Err(ServerError::Config(format!("{group} is not a multicast address")));
        }

        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, port)).await?;
        socket.join_multicast_v4(group, Ipv4Addr::UNSPECIFIED)?;
        let local_addr = socket.local_addr()?;

        tracing::info!(%group, port, "joined multicast group");

        Ok(Self { socket: Arc::new(socket), group, port, local_addr })
    }

    /// The address this bridge is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The group address clients must join (the rendezvous address).
    pub fn group(&self) -> Ipv4Addr {
        self.group
    }

    /// Publish the item as one UTF-8 JSON datagram to the group.
    ///
    /// Fire-and-forget: a failed send is logged and recovered locally,
    /// never propagated to connections or auction state.
    pub async fn publish(&self, item: &AuctionItem) {
        let wire = item.to_wire();
        if let Err(e) = self.socket.send_to(wire.as_bytes(), (self.group, self.port)).await {
            tracing::warn!("multicast send failed: {}", e);
        }
    }

    /// Receive one datagram from the group.
    ///
    /// The payload is treated as an opaque string; no validation happens
    /// before relay.
    pub async fn recv(&self) -> Result<(String, SocketAddr), ServerError> {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        let (len, sender) = self.socket.recv_from(&mut buf).await?;
        Ok((String::from_utf8_lossy(&buf[..len]).into_owned(), sender))
    }

    /// Whether a datagram originated from this process.
    pub fn is_self_echo(&self, sender: SocketAddr) -> bool {
        is_self_echo(sender, self.local_addr)
    }
}

impl std::fmt::Debug for MulticastBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MulticastBridge")
            .field("group", &self.group)
            .field("port", &self.port)
            .field("local_addr", &self.local_addr)
            .finish()
    }
}

/// Self-echo decision: a sender address with our own IP is our own
/// publication looping back through the group.
fn is_self_echo(sender: SocketAddr, local: SocketAddr) -> bool {
    sender.ip() == local.ip()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(ip: &str, port: u16) -> SocketAddr {
        SocketAddr::new(ip.parse().expect("test address"), port)
    }

    #[test]
    fn own_address_is_suppressed() {
        let local = addr("192.168.1.7", 41234);
        assert!(is_self_echo(addr("192.168.1.7", 41234), local));
        // Port differs, IP is what identifies the process on the bus.
        assert!(is_self_echo(addr("192.168.1.7", 50000), local));
    }

    #[test]
    fn peer_address_is_relayed() {
        let local = addr("192.168.1.7", 41234);
        assert!(!is_self_echo(addr("192.168.1.8", 41234), local));
    }

    #[tokio::test]
    async fn bind_rejects_non_multicast_group() {
        let result = MulticastBridge::bind(Ipv4Addr::new(10, 0, 0, 1), 0).await;
        assert!(matches!(result, Err(ServerError::Config(_))));
    }

    #[tokio::test]
    async fn publish_is_fire_and_forget() {
        let bridge = MulticastBridge::bind(Ipv4Addr::new(224, 0, 0, 5), 0).await;
        let Ok(bridge) = bridge else {
            // Environments without multicast support skip here.
            return;
        };

        assert_eq!(bridge.group(), Ipv4Addr::new(224, 0, 0, 5));
        // Send failures are logged and swallowed, never surfaced.
        bridge.publish(&AuctionItem::seed()).await;
    }
}
