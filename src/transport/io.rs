//! Async socket shell for the transport.
//!
//! The protocol core is I/O-free; this module is the boundary that moves
//! wire bytes. Real deployments speak raw IP protocol 88 — that framing
//! lives outside this crate — so the socket here is a UDP stand-in that
//! preserves the addressing model: one socket per process, joined to the
//! all-EIGRP-routers multicast group on each active interface.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;

use tokio::net::UdpSocket;

use crate::core::constants::EIGRP_MULTICAST;

use super::Outbound;

/// Default receive buffer size.
pub const DEFAULT_RECV_BUFFER_SIZE: usize = 65535;

/// Async UDP/multicast socket for the event loop.
#[derive(Debug)]
pub struct EigrpSocket {
    socket: Arc<UdpSocket>,
    recv_buffer: Vec<u8>,
    port: u16,
}

impl EigrpSocket {
    /// Bind to `port` on all interfaces and join the EIGRP multicast
    /// group on each listed interface address.
    pub async fn bind(port: u16, iface_addrs: &[Ipv4Addr]) -> io::Result<Self> {
        let socket = UdpSocket::bind(SocketAddr::from(([0, 0, 0, 0], port))).await?;
        for addr in iface_addrs {
            socket.join_multicast_v4(EIGRP_MULTICAST, *addr)?;
        }
        socket.set_multicast_loop_v4(false)?;
        // Port 0 binds ephemerally; keep what the OS actually assigned.
        let port = socket.local_addr()?.port();
        Ok(Self {
            socket: Arc::new(socket),
            recv_buffer: vec![0u8; DEFAULT_RECV_BUFFER_SIZE],
            port,
        })
    }

    /// Local address the socket is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Transmit one datagram.
    pub async fn send(&self, out: &Outbound) -> io::Result<usize> {
        let dest = SocketAddrV4::new(out.dest, self.port);
        self.socket.send_to(&out.bytes, dest).await
    }

    /// Receive one datagram, returning the payload and its IPv4 source.
    /// Non-IPv4 sources are skipped.
    pub async fn recv(&mut self) -> io::Result<(Vec<u8>, Ipv4Addr)> {
        loop {
            let (len, addr) = self.socket.recv_from(&mut self.recv_buffer).await?;
            if let SocketAddr::V4(v4) = addr {
                return Ok((self.recv_buffer[..len].to_vec(), *v4.ip()));
            }
        }
    }
}
