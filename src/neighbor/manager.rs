//! Neighbor table and Hello processing.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::core::config::Config;
use crate::core::constants::{SW_TLV_VERSION, SW_VERSION_MAJOR, SW_VERSION_MINOR};
use crate::core::error::ProtocolMismatch;
use crate::core::types::NeighborId;
use crate::packet::{Opcode, RtpHeader, RtpPacket, Tlv};

use super::neighbor::{Neighbor, SessionState};

/// What a received Hello did to the neighbor table.
#[derive(Debug, PartialEq, Eq)]
pub enum HelloOutcome {
    /// First compatible Hello from this address; an INIT Update is owed.
    NewNeighbor,
    /// Hello from an existing neighbor, hold timer refreshed.
    Known,
    /// K-values disagree; the sender is ignored.
    Incompatible(ProtocolMismatch),
}

/// Tracks every neighbor and builds our periodic Hellos.
#[derive(Debug)]
pub struct NeighborManager {
    k_values: [u8; 6],
    holdtime: u16,
    advertise_parameters: bool,
    extra_tlvs: Vec<Tlv>,
    neighbors: HashMap<NeighborId, Neighbor>,
}

impl NeighborManager {
    /// Build the manager from the startup configuration.
    pub fn new(config: &Config) -> Self {
        Self {
            k_values: config.k_values,
            holdtime: config.holdtime_secs(),
            advertise_parameters: true,
            extra_tlvs: Vec::new(),
            neighbors: HashMap::new(),
        }
    }

    /// Carry an additional TLV in every outgoing Hello from now on.
    /// Upper layers riding the transport announce themselves this way.
    pub fn add_hello_tlv(&mut self, tlv: Tlv) {
        self.extra_tlvs.push(tlv);
    }

    /// Stop advertising the Parameters TLV. An upper layer reusing the
    /// transport without session negotiation sends bare Hellos.
    pub fn suppress_parameters(&mut self) {
        self.advertise_parameters = false;
    }

    /// Build the periodic Hello. The Parameters TLV carries our
    /// K-values and hold time, followed by the software version TLV,
    /// unless suppressed; injected upper-layer TLVs come last.
    pub fn build_hello(&self, header: RtpHeader) -> RtpPacket {
        let mut tlvs = Vec::new();
        if self.advertise_parameters {
            tlvs.push(Tlv::Parameters {
                k_values: self.k_values,
                holdtime: self.holdtime,
            });
            tlvs.push(Tlv::SoftwareVersion {
                major: SW_VERSION_MAJOR,
                minor: SW_VERSION_MINOR,
                tlv_version: SW_TLV_VERSION,
            });
        }
        tlvs.extend(self.extra_tlvs.iter().cloned());
        RtpPacket::new(header, tlvs)
    }

    /// Process a Hello. Creates a Pending neighbor on the first
    /// compatible Hello from an unknown address, refreshes the hold
    /// timer for known ones, and rejects K-value mismatches.
    pub fn on_hello(
        &mut self,
        id: NeighborId,
        k_values: [u8; 6],
        holdtime: u16,
        now: Instant,
    ) -> HelloOutcome {
        if k_values != self.k_values {
            warn!(neighbor = %id, theirs = ?k_values, ours = ?self.k_values,
                  "ignoring hello with mismatched k-values");
            return HelloOutcome::Incompatible(ProtocolMismatch::KValues {
                theirs: k_values,
                ours: self.k_values,
            });
        }
        let hold = Duration::from_secs(u64::from(holdtime));
        match self.neighbors.get_mut(&id) {
            Some(neighbor) => {
                neighbor.set_holdtime(hold, now);
                HelloOutcome::Known
            }
            None => {
                info!(neighbor = %id, holdtime, "new neighbor discovered");
                self.neighbors
                    .insert(id, Neighbor::new(id, hold, k_values, now));
                HelloOutcome::NewNeighbor
            }
        }
    }

    /// Refresh the hold timer for any valid packet from the neighbor.
    pub fn touch(&mut self, id: NeighborId, now: Instant) {
        if let Some(neighbor) = self.neighbors.get_mut(&id) {
            neighbor.touch(now);
        }
    }

    /// Whether the neighbor is known at all.
    pub fn contains(&self, id: NeighborId) -> bool {
        self.neighbors.contains_key(&id)
    }

    /// Look up a neighbor.
    pub fn get(&self, id: NeighborId) -> Option<&Neighbor> {
        self.neighbors.get(&id)
    }

    /// Look up a neighbor mutably.
    pub fn get_mut(&mut self, id: NeighborId) -> Option<&mut Neighbor> {
        self.neighbors.get_mut(&id)
    }

    /// Remove a neighbor, returning it (marked Down) if present.
    pub fn remove(&mut self, id: NeighborId) -> Option<Neighbor> {
        let mut neighbor = self.neighbors.remove(&id)?;
        neighbor.set_down();
        Some(neighbor)
    }

    /// Neighbors whose hold timer has run out. They are removed from
    /// the table; the caller owes DUAL a link-down event for each.
    pub fn take_expired(&mut self, now: Instant) -> Vec<NeighborId> {
        let expired: Vec<NeighborId> = self
            .neighbors
            .values()
            .filter(|n| n.hold_expired(now))
            .map(|n| n.id())
            .collect();
        for id in &expired {
            debug!(neighbor = %id, "hold timer expired");
            self.remove(*id);
        }
        expired
    }

    /// All neighbors currently Up.
    pub fn up_neighbors(&self) -> Vec<NeighborId> {
        self.neighbors
            .values()
            .filter(|n| n.is_up())
            .map(|n| n.id())
            .collect()
    }

    /// Earliest hold deadline across the table.
    pub fn next_hold_deadline(&self) -> Option<Instant> {
        self.neighbors.values().map(|n| n.hold_deadline()).min()
    }

    /// Number of known neighbors in any state.
    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    /// True when no neighbor is known.
    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }

    /// Iterate over all neighbors.
    pub fn iter(&self) -> impl Iterator<Item = &Neighbor> {
        self.neighbors.values()
    }
}

/// Extract the first Parameters TLV from a Hello, if any. A Hello with
/// no Parameters TLV is an ack or a probe, not a neighbor announcement.
pub fn hello_parameters(packet: &RtpPacket) -> Option<([u8; 6], u16)> {
    if packet.header.opcode != Opcode::Hello {
        return None;
    }
    packet.tlvs.iter().find_map(|tlv| match tlv {
        Tlv::Parameters { k_values, holdtime } => Some((*k_values, *holdtime)),
        _ => None,
    })
}
