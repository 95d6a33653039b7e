//! Error types for the EIGRP/RTP stack.
//!
//! Nothing here is process-fatal: transport- and neighbor-level failures
//! are recovered by state transitions, and a malformed packet never
//! affects unrelated neighbors or destinations.

use thiserror::Error;

use super::types::NeighborId;

/// Codec-level failures. The offending packet is dropped with no state
/// change.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MalformedPacket {
    /// Datagram is shorter than the fixed RTP header.
    #[error("truncated header: expected {expected} bytes, got {actual}")]
    TruncatedHeader {
        /// Minimum bytes required.
        expected: usize,
        /// Actual bytes received.
        actual: usize,
    },

    /// TLV length field is inconsistent with the remaining payload.
    #[error("TLV length {claimed} exceeds remaining {remaining} bytes")]
    TlvLength {
        /// Length claimed by the TLV header.
        claimed: usize,
        /// Bytes actually remaining.
        remaining: usize,
    },

    /// TLV body is shorter than its fixed layout requires.
    #[error("TLV body too short for type {tlv_type:#06x}")]
    TlvTooShort {
        /// Combined protocol-class/type identifier.
        tlv_type: u16,
    },

    /// Opcode not defined by the RTP header specification.
    #[error("unknown opcode {0}")]
    UnknownOpcode(u8),

    /// Unrecognized TLV type within a protocol class we own. Unknown
    /// protocol classes are upper-layer TLVs and pass through instead.
    #[error("unknown mandatory TLV type {tlv_type:#06x}")]
    UnknownMandatoryTlv {
        /// Combined protocol-class/type identifier.
        tlv_type: u16,
    },

    /// Prefix length outside 0..=32.
    #[error("invalid prefix length {0}")]
    InvalidPrefixLength(u8),
}

/// The neighbor relationship was refused.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolMismatch {
    /// K-value weights differ from ours.
    #[error("incompatible K-values {theirs:?} (ours {ours:?})")]
    KValues {
        /// The neighbor's advertised weights.
        theirs: [u8; 6],
        /// Our configured weights.
        ours: [u8; 6],
    },

    /// Unsupported RTP header version.
    #[error("incompatible RTP header version {0}")]
    HeaderVersion(u8),
}

/// Errors raised by the transport and neighbor layers. All of these drive
/// a Down transition for the neighbor involved.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Retransmission retry count exceeded.
    #[error("neighbor {neighbor} unresponsive after {retries} retransmissions")]
    RetryExceeded {
        /// The unresponsive neighbor.
        neighbor: NeighborId,
        /// Number of retransmissions attempted.
        retries: u32,
    },
}

/// Errors from startup configuration validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Router ID or AS number out of the 16-bit header field range.
    #[error("{field} must be a positive number less than 65536")]
    FieldRange {
        /// Which field failed validation.
        field: &'static str,
    },

    /// Hello interval incompatible with the 16-bit holdtime field.
    #[error("hello interval must be between 1 and {max} seconds")]
    HelloInterval {
        /// Largest legal interval in seconds.
        max: u64,
    },

    /// All six K-values are zero.
    #[error("at least one K-value must be non-zero")]
    AllKValuesZero,

    /// No interfaces were configured.
    #[error("at least one interface is required")]
    NoInterfaces,
}

/// Top-level error type.
#[derive(Debug, Error)]
pub enum EigrpError {
    /// Packet could not be decoded.
    #[error("malformed packet: {0}")]
    Malformed(#[from] MalformedPacket),

    /// Neighbor relationship refused.
    #[error("protocol mismatch: {0}")]
    Mismatch(#[from] ProtocolMismatch),

    /// Hold timer expired without traffic from the neighbor.
    #[error("hold timer expired for neighbor {0}")]
    NeighborTimeout(NeighborId),

    /// Reliable delivery gave up on a neighbor.
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    /// The external routing-table manager reported an error. Logged and
    /// swallowed; never affects DUAL's internal state.
    #[error("route export failure: {0}")]
    RouteExport(String),

    /// Bad startup configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error from the socket layer.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
