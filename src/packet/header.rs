//! RTP fixed header (version 2).
//!
//! Wire format, big-endian, 20 bytes:
//! ```text
//! +0   Version (1 byte)
//! +1   Opcode (1 byte)
//! +2   Checksum (2 bytes, ones' complement over header + TLVs)
//! +4   Flags (4 bytes)
//! +8   Sequence (4 bytes)
//! +12  Acknowledgment (4 bytes)
//! +16  Router ID (2 bytes)
//! +18  AS Number (2 bytes)
//! ```

use crate::core::constants::{FLAG_CR, FLAG_INIT, RTP_HEADER_LEN, RTP_HEADER_VERSION};
use crate::core::error::MalformedPacket;
use crate::core::types::{AsNumber, RouterId};

/// RTP packet opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    /// Topology information, sent reliably.
    Update = 1,
    /// Request for specific routes. Decoded; no originator here.
    Request = 2,
    /// Diffusing computation query, sent reliably.
    Query = 3,
    /// Answer to a query, sent reliably.
    Reply = 4,
    /// Neighbor discovery and keepalive; also carries pure acks.
    Hello = 5,
    /// Probe. Decoded for completeness, never originated.
    Probe = 7,
    /// Stuck-in-active query. Decoded; SIA handling is unimplemented.
    SiaQuery = 10,
    /// Stuck-in-active reply. Decoded; SIA handling is unimplemented.
    SiaReply = 11,
}

impl Opcode {
    /// Parse a wire opcode.
    pub fn from_u8(value: u8) -> Result<Self, MalformedPacket> {
        match value {
            1 => Ok(Self::Update),
            2 => Ok(Self::Request),
            3 => Ok(Self::Query),
            4 => Ok(Self::Reply),
            5 => Ok(Self::Hello),
            7 => Ok(Self::Probe),
            10 => Ok(Self::SiaQuery),
            11 => Ok(Self::SiaReply),
            other => Err(MalformedPacket::UnknownOpcode(other)),
        }
    }

    /// True for opcodes that are always delivered reliably when they carry
    /// payload (Update, Query, Reply and the SIA pair).
    pub fn is_reliable(&self) -> bool {
        matches!(
            self,
            Self::Update | Self::Query | Self::Reply | Self::SiaQuery | Self::SiaReply
        )
    }
}

/// The fixed RTP header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtpHeader {
    /// Header version; only version 2 is produced or accepted.
    pub version: u8,
    /// Packet opcode.
    pub opcode: Opcode,
    /// Header + TLV checksum. Zero while computing.
    pub checksum: u16,
    /// INIT / CR flags.
    pub flags: u32,
    /// Sender's sequence number; zero on unreliable packets.
    pub seq: u32,
    /// Highest sequence number received from the packet's destination.
    pub ack: u32,
    /// Sending router's ID.
    pub router_id: RouterId,
    /// Sending router's autonomous system.
    pub as_number: AsNumber,
}

impl RtpHeader {
    /// Create a header for an outgoing packet.
    pub fn new(opcode: Opcode, router_id: RouterId, as_number: AsNumber) -> Self {
        Self {
            version: RTP_HEADER_VERSION,
            opcode,
            checksum: 0,
            flags: 0,
            seq: 0,
            ack: 0,
            router_id,
            as_number,
        }
    }

    /// True if the INIT flag is set.
    pub fn is_init(&self) -> bool {
        self.flags & FLAG_INIT != 0
    }

    /// True if the conditional-receive flag is set.
    pub fn is_cr(&self) -> bool {
        self.flags & FLAG_CR != 0
    }

    /// Encode into a 20-byte buffer.
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.push(self.version);
        buf.push(self.opcode as u8);
        buf.extend_from_slice(&self.checksum.to_be_bytes());
        buf.extend_from_slice(&self.flags.to_be_bytes());
        buf.extend_from_slice(&self.seq.to_be_bytes());
        buf.extend_from_slice(&self.ack.to_be_bytes());
        buf.extend_from_slice(&self.router_id.0.to_be_bytes());
        buf.extend_from_slice(&self.as_number.0.to_be_bytes());
    }

    /// Decode from the start of a datagram.
    pub fn decode(data: &[u8]) -> Result<Self, MalformedPacket> {
        if data.len() < RTP_HEADER_LEN {
            return Err(MalformedPacket::TruncatedHeader {
                expected: RTP_HEADER_LEN,
                actual: data.len(),
            });
        }
        Ok(Self {
            version: data[0],
            opcode: Opcode::from_u8(data[1])?,
            checksum: u16::from_be_bytes([data[2], data[3]]),
            flags: u32::from_be_bytes([data[4], data[5], data[6], data[7]]),
            seq: u32::from_be_bytes([data[8], data[9], data[10], data[11]]),
            ack: u32::from_be_bytes([data[12], data[13], data[14], data[15]]),
            router_id: RouterId(u16::from_be_bytes([data[16], data[17]])),
            as_number: AsNumber(u16::from_be_bytes([data[18], data[19]])),
        })
    }
}

/// 16-bit ones' complement checksum over the packed header (checksum field
/// zeroed) and TLVs. Odd trailing byte is padded high.
pub fn internet_checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    let mut chunks = data.chunks_exact(2);
    for chunk in &mut chunks {
        sum += u16::from_be_bytes([chunk[0], chunk[1]]) as u32;
    }
    if let [last] = chunks.remainder() {
        sum += (*last as u32) << 8;
    }
    while sum >> 16 != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    !(sum as u16)
}
