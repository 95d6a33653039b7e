//! RTP session layer: sequenced reliable delivery over multicast/unicast.

pub mod retransmit;
pub mod session;

#[cfg(feature = "runtime")]
#[cfg_attr(docsrs, doc(cfg(feature = "runtime")))]
pub mod io;

pub use retransmit::{RetransmitEntry, RetransmitQueue};
pub use session::{Receive, RtpTransport};

#[cfg(feature = "runtime")]
pub use io::EigrpSocket;

use std::net::Ipv4Addr;

use crate::core::constants::EIGRP_MULTICAST;

/// A datagram handed to the I/O boundary for transmission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    /// Destination: a neighbor's unicast address or the multicast group.
    pub dest: Ipv4Addr,
    /// Encoded packet.
    pub bytes: Vec<u8>,
}

impl Outbound {
    /// Datagram addressed to the all-EIGRP-routers group.
    pub fn multicast(bytes: Vec<u8>) -> Self {
        Self {
            dest: EIGRP_MULTICAST,
            bytes,
        }
    }

    /// Datagram addressed to a single neighbor.
    pub fn unicast(dest: Ipv4Addr, bytes: Vec<u8>) -> Self {
        Self { dest, bytes }
    }

    /// True when addressed to the multicast group.
    pub fn is_multicast(&self) -> bool {
        self.dest == EIGRP_MULTICAST
    }
}
