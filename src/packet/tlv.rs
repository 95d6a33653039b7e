//! TLV payload fields.
//!
//! Every TLV starts with a four-byte header: protocol class (1 byte),
//! type (1 byte), and a length (2 bytes) that covers the whole TLV
//! including this header. The class/type pair reads as one 16-bit
//! identifier: 0x0001 is the generic parameter TLV, 0x0102 the IPv4
//! internal-route TLV, and so on.
//!
//! TLVs are a flat tagged variant with one encode/decode table below;
//! there is deliberately no type hierarchy here. TLVs in protocol
//! classes this crate does not own (anything other than generic/IPv4)
//! are carried opaquely so upper layers reusing the transport can define
//! their own.

use std::net::Ipv4Addr;

use crate::core::constants::TLV_HEADER_LEN;
use crate::core::error::MalformedPacket;
use crate::core::types::Prefix;

/// Protocol class prefix of generic (transport-level) TLVs.
pub const CLASS_GENERIC: u8 = 0;
/// Protocol class prefix of IPv4 routing TLVs.
pub const CLASS_IPV4: u8 = 1;
/// Protocol class prefix of IPv6 routing TLVs. Recognized, unsupported.
pub const CLASS_IPV6: u8 = 4;

/// Combined class/type identifiers for the TLVs we own.
pub mod tlv_type {
    /// K-values and holdtime.
    pub const PARAMETERS: u16 = 0x0001;
    /// Authentication data. Recognized, not processed.
    pub const AUTHENTICATION: u16 = 0x0002;
    /// Address list for conditional receive.
    pub const SEQUENCE: u16 = 0x0003;
    /// Sender software release.
    pub const SOFTWARE_VERSION: u16 = 0x0004;
    /// Sequence number the next reliable multicast will carry.
    pub const NEXT_MULTICAST_SEQ: u16 = 0x0005;
    /// Graceful neighbor shutdown.
    pub const PEER_TERMINATION: u16 = 0x0007;
    /// IPv4 internal route.
    pub const INTERNAL_ROUTE: u16 = 0x0102;
}

/// Vector metric components carried in a route TLV.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireMetric {
    /// Cumulative delay in tens of microseconds. `u32::MAX` marks the
    /// destination unreachable.
    pub delay: u32,
    /// Minimum bandwidth along the path, in scaled Kbps units.
    pub bandwidth: u32,
    /// Minimum MTU along the path (24 bits on the wire).
    pub mtu: u32,
    /// Hop count to the destination.
    pub hop_count: u8,
    /// Path reliability, 255 = 100%.
    pub reliability: u8,
    /// Path load, 1 = minimally loaded.
    pub load: u8,
}

/// A single decoded TLV.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tlv {
    /// K-value weights and advertised hold time.
    Parameters {
        /// K1..K6 metric weights.
        k_values: [u8; 6],
        /// Hold time in seconds.
        holdtime: u16,
    },

    /// Sender's software release, informational.
    SoftwareVersion {
        /// IOS-style major release.
        major: u8,
        /// IOS-style minor release.
        minor: u8,
        /// TLV format revision.
        tlv_version: u8,
    },

    /// Listed neighbors should not accept the next CR multicast.
    Sequence {
        /// Addresses excluded from conditional receive.
        addresses: Vec<Ipv4Addr>,
    },

    /// Sequence number the next reliable multicast will carry.
    NextMulticastSeq {
        /// The upcoming sequence number.
        seq: u32,
    },

    /// The sender is tearing the adjacency down.
    PeerTermination,

    /// An IPv4 internal route advertisement.
    InternalRoute {
        /// Next hop, 0.0.0.0 meaning the packet's originator.
        next_hop: Ipv4Addr,
        /// Vector metric as seen by the sender.
        metric: WireMetric,
        /// The destination prefix.
        prefix: Prefix,
    },

    /// A TLV in a protocol class we do not own, carried opaquely.
    Opaque {
        /// Protocol class byte.
        class: u8,
        /// Type byte within the class.
        kind: u8,
        /// Raw body, excluding the TLV header.
        data: Vec<u8>,
    },
}

impl Tlv {
    /// The combined class/type identifier this TLV encodes as.
    pub fn type_id(&self) -> u16 {
        match self {
            Tlv::Parameters { .. } => tlv_type::PARAMETERS,
            Tlv::SoftwareVersion { .. } => tlv_type::SOFTWARE_VERSION,
            Tlv::Sequence { .. } => tlv_type::SEQUENCE,
            Tlv::NextMulticastSeq { .. } => tlv_type::NEXT_MULTICAST_SEQ,
            Tlv::PeerTermination => tlv_type::PEER_TERMINATION,
            Tlv::InternalRoute { .. } => tlv_type::INTERNAL_ROUTE,
            Tlv::Opaque { class, kind, .. } => ((*class as u16) << 8) | *kind as u16,
        }
    }

    /// Encode this TLV, header included, appending to `buf`.
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        let start = buf.len();
        let id = self.type_id();
        buf.push((id >> 8) as u8);
        buf.push(id as u8);
        buf.extend_from_slice(&[0, 0]); // length patched below

        match self {
            Tlv::Parameters { k_values, holdtime } => {
                buf.extend_from_slice(k_values);
                buf.extend_from_slice(&holdtime.to_be_bytes());
            }
            Tlv::SoftwareVersion {
                major,
                minor,
                tlv_version,
            } => {
                buf.extend_from_slice(&[*major, *minor, *tlv_version, 0]);
            }
            Tlv::Sequence { addresses } => {
                for addr in addresses {
                    buf.push(4);
                    buf.extend_from_slice(&addr.octets());
                }
            }
            Tlv::NextMulticastSeq { seq } => {
                buf.extend_from_slice(&seq.to_be_bytes());
            }
            Tlv::PeerTermination => {}
            Tlv::InternalRoute {
                next_hop,
                metric,
                prefix,
            } => {
                buf.extend_from_slice(&next_hop.octets());
                buf.extend_from_slice(&metric.delay.to_be_bytes());
                buf.extend_from_slice(&metric.bandwidth.to_be_bytes());
                buf.extend_from_slice(&metric.mtu.to_be_bytes()[1..4]);
                buf.push(metric.hop_count);
                buf.push(metric.reliability);
                buf.push(metric.load);
                buf.extend_from_slice(&[0, 0]);
                buf.push(prefix.mask_len);
                buf.extend_from_slice(&prefix.network.octets()[..prefix.wire_octets()]);
            }
            Tlv::Opaque { data, .. } => {
                buf.extend_from_slice(data);
            }
        }

        let len = (buf.len() - start) as u16;
        buf[start + 2..start + 4].copy_from_slice(&len.to_be_bytes());
    }

    /// Decode one TLV from the front of `data`, returning it and the
    /// number of bytes consumed.
    pub fn decode(data: &[u8]) -> Result<(Self, usize), MalformedPacket> {
        if data.len() < TLV_HEADER_LEN {
            return Err(MalformedPacket::TlvLength {
                claimed: TLV_HEADER_LEN,
                remaining: data.len(),
            });
        }
        let class = data[0];
        let kind = data[1];
        let id = ((class as u16) << 8) | kind as u16;
        let len = u16::from_be_bytes([data[2], data[3]]) as usize;
        if len < TLV_HEADER_LEN || len > data.len() {
            return Err(MalformedPacket::TlvLength {
                claimed: len,
                remaining: data.len(),
            });
        }
        let body = &data[TLV_HEADER_LEN..len];

        let tlv = match id {
            tlv_type::PARAMETERS => {
                if body.len() < 8 {
                    return Err(MalformedPacket::TlvTooShort { tlv_type: id });
                }
                let mut k_values = [0u8; 6];
                k_values.copy_from_slice(&body[..6]);
                Tlv::Parameters {
                    k_values,
                    holdtime: u16::from_be_bytes([body[6], body[7]]),
                }
            }
            tlv_type::SOFTWARE_VERSION => {
                if body.len() < 3 {
                    return Err(MalformedPacket::TlvTooShort { tlv_type: id });
                }
                Tlv::SoftwareVersion {
                    major: body[0],
                    minor: body[1],
                    tlv_version: body[2],
                }
            }
            tlv_type::SEQUENCE => {
                let mut addresses = Vec::new();
                let mut rest = body;
                while !rest.is_empty() {
                    if rest[0] != 4 || rest.len() < 5 {
                        return Err(MalformedPacket::TlvTooShort { tlv_type: id });
                    }
                    addresses.push(Ipv4Addr::new(rest[1], rest[2], rest[3], rest[4]));
                    rest = &rest[5..];
                }
                Tlv::Sequence { addresses }
            }
            tlv_type::NEXT_MULTICAST_SEQ => {
                if body.len() < 4 {
                    return Err(MalformedPacket::TlvTooShort { tlv_type: id });
                }
                Tlv::NextMulticastSeq {
                    seq: u32::from_be_bytes([body[0], body[1], body[2], body[3]]),
                }
            }
            tlv_type::PEER_TERMINATION => Tlv::PeerTermination,
            tlv_type::AUTHENTICATION => {
                // Out of scope beyond recognizing the type; carried opaquely.
                Tlv::Opaque {
                    class,
                    kind,
                    data: body.to_vec(),
                }
            }
            tlv_type::INTERNAL_ROUTE => {
                if body.len() < 21 {
                    return Err(MalformedPacket::TlvTooShort { tlv_type: id });
                }
                let next_hop = Ipv4Addr::new(body[0], body[1], body[2], body[3]);
                let metric = WireMetric {
                    delay: u32::from_be_bytes([body[4], body[5], body[6], body[7]]),
                    bandwidth: u32::from_be_bytes([body[8], body[9], body[10], body[11]]),
                    mtu: u32::from_be_bytes([0, body[12], body[13], body[14]]),
                    hop_count: body[15],
                    reliability: body[16],
                    load: body[17],
                };
                // body[18..20] reserved
                let mask_len = body[20];
                if mask_len > 32 {
                    return Err(MalformedPacket::InvalidPrefixLength(mask_len));
                }
                let octets = mask_len.div_ceil(8) as usize;
                if body.len() < 21 + octets {
                    return Err(MalformedPacket::TlvTooShort { tlv_type: id });
                }
                let mut addr = [0u8; 4];
                addr[..octets].copy_from_slice(&body[21..21 + octets]);
                Tlv::InternalRoute {
                    next_hop,
                    metric,
                    prefix: Prefix::new(Ipv4Addr::from(addr), mask_len),
                }
            }
            _ if class == CLASS_GENERIC || class == CLASS_IPV4 || class == CLASS_IPV6 => {
                // Unrecognized type in a class we own is mandatory.
                return Err(MalformedPacket::UnknownMandatoryTlv { tlv_type: id });
            }
            _ => Tlv::Opaque {
                class,
                kind,
                data: body.to_vec(),
            },
        };

        Ok((tlv, len))
    }
}
