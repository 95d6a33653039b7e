//! Packet codec: RTP headers and EIGRP TLVs to and from wire bytes.

pub mod header;
pub mod packet;
pub mod tlv;

pub use header::{internet_checksum, Opcode, RtpHeader};
pub use packet::RtpPacket;
pub use tlv::{Tlv, WireMetric};
