//! Whole-packet assembly: header plus TLV sequence, with checksum.
//!
//! The checksum is computed on encode only; decode does not verify it
//! and leaves bad-checksum rejection to lower layers.

use crate::core::constants::RTP_HEADER_LEN;
use crate::core::error::MalformedPacket;

use super::header::{internet_checksum, RtpHeader};
use super::tlv::Tlv;

/// A decoded RTP packet: the fixed header and its TLV payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpPacket {
    /// The fixed header.
    pub header: RtpHeader,
    /// Payload TLVs, possibly empty (pure acks, handshake updates).
    pub tlvs: Vec<Tlv>,
}

impl RtpPacket {
    /// Create a packet from a header and payload.
    pub fn new(header: RtpHeader, tlvs: Vec<Tlv>) -> Self {
        Self { header, tlvs }
    }

    /// True when the packet carries no TLVs; a Hello with an empty
    /// payload and a nonzero ack field is a pure acknowledgment.
    pub fn is_payload_empty(&self) -> bool {
        self.tlvs.is_empty()
    }

    /// Encode to wire bytes. The checksum field is computed over the
    /// packed header (checksum zeroed) and all TLVs.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(RTP_HEADER_LEN + 32 * self.tlvs.len());
        let mut header = self.header;
        header.checksum = 0;
        header.encode_into(&mut buf);
        for tlv in &self.tlvs {
            tlv.encode_into(&mut buf);
        }
        let checksum = internet_checksum(&buf);
        buf[2..4].copy_from_slice(&checksum.to_be_bytes());
        buf
    }

    /// Decode a datagram. Fails with [`MalformedPacket`] on a truncated
    /// header, TLV length inconsistency, or an unknown mandatory TLV.
    pub fn decode(data: &[u8]) -> Result<Self, MalformedPacket> {
        let header = RtpHeader::decode(data)?;
        let mut tlvs = Vec::new();
        let mut offset = RTP_HEADER_LEN;
        while offset < data.len() {
            let (tlv, consumed) = Tlv::decode(&data[offset..])?;
            tlvs.push(tlv);
            offset += consumed;
        }
        Ok(Self { header, tlvs })
    }
}
