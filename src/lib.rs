//! # EIGRP over RTP
//!
//! A distance-vector routing process: EIGRP's diffusing update
//! algorithm (DUAL) running on top of RTP, the reliable multicast
//! transport it was designed with. It provides:
//!
//! - **Reliable transport**: sequenced delivery with per-neighbor
//!   retransmission, cumulative acks and reliable multicast
//! - **Neighbor sessions**: Hello discovery, parameter negotiation,
//!   hold timers and restart detection
//! - **Loop-free routing**: per-destination Passive/Active state
//!   machine with feasible-successor failover and query diffusion
//! - **Testability**: the whole protocol core is synchronous and
//!   I/O-free; the async shell is a thin feature-gated layer
//!
//! ## Feature Flags
//!
//! - `runtime` (default): tokio event loop and multicast socket
//!
//! ## Modules
//!
//! - [`core`]: identifiers, constants, configuration and error types
//! - [`packet`]: wire codec for the RTP header and TLV payloads
//! - [`transport`]: RTP session layer (sequencing, acks, retransmission)
//! - [`neighbor`]: neighbor table and session lifecycle
//! - [`dual`]: topology table and the DUAL state machine
//! - [`export`]: route export boundary to the forwarding table
//! - [`router`]: process instance and event loop
//!
//! ## Example Usage
//!
//! ```rust
//! use std::net::Ipv4Addr;
//! use std::time::Instant;
//!
//! use eigrp_rtp::prelude::*;
//!
//! let config = Config::new(
//!     1,
//!     100,
//!     vec![IfaceConfig::new(IfaceIndex(0), Ipv4Addr::new(10, 0, 0, 1))],
//! )
//! .unwrap()
//! .with_local_route(Prefix::new(Ipv4Addr::new(192, 168, 1, 0), 24), IfaceIndex(0));
//!
//! let mut router = Router::new(config, Box::new(LogExport), Instant::now());
//!
//! // The first Hello on each interface is due immediately.
//! let datagrams = router.handle_timer(Instant::now());
//! assert!(datagrams[0].is_multicast());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod core;
pub mod dual;
pub mod export;
pub mod neighbor;
pub mod packet;
pub mod router;
pub mod transport;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::core::config::{Config, IfaceConfig, LocalRoute};
    pub use crate::core::error::EigrpError;
    pub use crate::core::types::{AsNumber, IfaceIndex, NeighborId, Prefix, RouterId};
    pub use crate::dual::{DualEngine, DualState};
    pub use crate::export::{LogExport, RouteExport};
    pub use crate::neighbor::{NeighborManager, SessionState};
    pub use crate::packet::{Opcode, RtpHeader, RtpPacket, Tlv, WireMetric};
    pub use crate::router::Router;
    pub use crate::transport::{Outbound, RtpTransport};
}

pub use crate::core::config::Config;
pub use crate::core::error::EigrpError;
pub use crate::core::types::{AsNumber, IfaceIndex, NeighborId, Prefix, RouterId};
pub use crate::export::{LogExport, RouteExport};
pub use crate::router::Router;

#[cfg(feature = "runtime")]
pub use crate::router::{run, DEFAULT_PORT};
