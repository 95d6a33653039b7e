//! Core identifier and address types.

use std::fmt;
use std::net::Ipv4Addr;

/// Router ID carried in the RTP header (16-bit in header version 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RouterId(pub u16);

impl fmt::Display for RouterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Autonomous system number carried in the RTP header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AsNumber(pub u16);

impl fmt::Display for AsNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index of a local interface the process is active on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IfaceIndex(pub u32);

impl fmt::Display for IfaceIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "if{}", self.0)
    }
}

/// Identity of a neighbor: the interface it was heard on plus its
/// source address. Neighbors are owned by the neighbor manager; the
/// transport and DUAL layers refer to them by this key only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NeighborId {
    /// Interface the neighbor was discovered on.
    pub iface: IfaceIndex,
    /// The neighbor's source address.
    pub addr: Ipv4Addr,
}

impl NeighborId {
    /// Create a neighbor identity.
    pub fn new(iface: IfaceIndex, addr: Ipv4Addr) -> Self {
        Self { iface, addr }
    }
}

impl fmt::Display for NeighborId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%{}", self.addr, self.iface)
    }
}

/// An IPv4 destination prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Prefix {
    /// Network address. Host bits below `mask_len` are expected to be zero.
    pub network: Ipv4Addr,
    /// Prefix length, 0..=32.
    pub mask_len: u8,
}

impl Prefix {
    /// Create a prefix, masking off any host bits.
    pub fn new(network: Ipv4Addr, mask_len: u8) -> Self {
        let mask_len = mask_len.min(32);
        let mask = if mask_len == 0 {
            0
        } else {
            u32::MAX << (32 - mask_len)
        };
        Self {
            network: Ipv4Addr::from(u32::from(network) & mask),
            mask_len,
        }
    }

    /// Number of address octets needed to carry this prefix on the wire.
    pub fn wire_octets(&self) -> usize {
        self.mask_len.div_ceil(8) as usize
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.mask_len)
    }
}

/// Serial-number comparison for RTP sequence numbers.
///
/// Returns `true` if `a` is newer than `b` under modular (RFC 1982 style)
/// arithmetic, so ordering stays consistent across the 32-bit wrap.
pub fn seq_newer(a: u32, b: u32) -> bool {
    a != b && a.wrapping_sub(b) < 0x8000_0000
}
