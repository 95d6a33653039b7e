//! Protocol constants for EIGRP and its reliable transport.
//!
//! Wire-level values are fixed by the protocol and MUST NOT be changed.

use std::net::Ipv4Addr;
use std::time::Duration;

// =============================================================================
// WIRE CONSTANTS
// =============================================================================

/// IP protocol number EIGRP runs over.
pub const EIGRP_PROTOCOL: u8 = 88;

/// The all-EIGRP-routers multicast group.
pub const EIGRP_MULTICAST: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 10);

/// RTP header version implemented here. Only version 2 is supported.
pub const RTP_HEADER_VERSION: u8 = 2;

/// RTP header length in bytes.
pub const RTP_HEADER_LEN: usize = 20;

/// TLV header length (protocol class, type, length).
pub const TLV_HEADER_LEN: usize = 4;

// =============================================================================
// RTP FLAGS
// =============================================================================

/// First packet exchanged with a new neighbor; also signals a restart.
pub const FLAG_INIT: u32 = 0x0000_0001;

/// Conditional receive (multicast sequencing). Decoded, not acted on.
pub const FLAG_CR: u32 = 0x0000_0002;

// =============================================================================
// METRIC CONSTANTS
// =============================================================================

/// Default K-value weights (K1..K6).
pub const DEFAULT_K_VALUES: [u8; 6] = [1, 74, 1, 0, 0, 0];

/// Delay value advertised for an unreachable destination.
pub const DELAY_UNREACHABLE: u32 = u32::MAX;

/// Composite metric of an unreachable destination.
pub const METRIC_UNREACHABLE: u32 = u32::MAX;

// =============================================================================
// TIMING
// =============================================================================

/// Default interval between periodic Hello packets.
pub const DEFAULT_HELLO_INTERVAL: Duration = Duration::from_secs(5);

/// Hold time advertised to neighbors is this multiple of the hello interval.
pub const HOLDTIME_MULTIPLIER: u32 = 3;

/// Fixed retransmission interval for unacknowledged reliable packets.
/// An RTT-derived variable timer is a known gap.
pub const RETRANSMIT_INTERVAL: Duration = Duration::from_secs(5);

/// Retransmission attempts before the neighbor is declared unreachable.
pub const MAX_RETRANSMITS: u32 = 16;

/// How long an ack obligation may wait for a packet to piggyback on
/// before a dedicated ack packet is sent.
pub const DELAYED_ACK_WINDOW: Duration = Duration::from_millis(400);

// =============================================================================
// SOFTWARE VERSION TLV
// =============================================================================

/// IOS-style major release advertised in the software version TLV.
pub const SW_VERSION_MAJOR: u8 = 12;

/// IOS-style minor release advertised in the software version TLV.
pub const SW_VERSION_MINOR: u8 = 4;

/// TLV format revision advertised in the software version TLV.
pub const SW_TLV_VERSION: u8 = 1;
