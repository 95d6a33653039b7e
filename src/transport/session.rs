//! Reliable transport session state.
//!
//! One [`RtpTransport`] per process owns the router-wide sequence counter
//! and the per-neighbor delivery state: the highest sequence accepted
//! from each neighbor, outstanding ack obligations, and the
//! retransmission queue of reliably-sent packets. A reliable send never
//! blocks; delivery is confirmed asynchronously by later ack events.

use std::collections::HashMap;
use std::time::Instant;

use crate::core::constants::DELAYED_ACK_WINDOW;
use crate::core::error::TransportError;
use crate::core::types::{seq_newer, NeighborId};
use crate::packet::{RtpHeader, RtpPacket};

use super::retransmit::RetransmitQueue;

/// Verdict for a received packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Receive {
    /// In-order (or unsequenced) packet: deliver the payload upward.
    Deliver,
    /// Duplicate or out-of-order: drop the payload, but the sequence is
    /// still considered for ack piggybacking.
    Discard,
}

/// Per-neighbor transport state.
#[derive(Debug, Default)]
struct PeerState {
    /// Highest sequence number accepted from this neighbor; zero means
    /// nothing sequenced has been received yet.
    last_seq_seen: u32,
    /// Deadline by which the current ack obligation must be satisfied
    /// with a dedicated ack packet if nothing piggybacks first.
    ack_deadline: Option<Instant>,
    /// Reliably-sent packets this neighbor has not acknowledged.
    rtx: RetransmitQueue,
}

/// Process-wide reliable transport state.
#[derive(Debug, Default)]
pub struct RtpTransport {
    /// Last sequence number assigned; shared by every reliable packet
    /// this router originates, on any interface.
    seq: u32,
    peers: HashMap<NeighborId, PeerState>,
}

impl RtpTransport {
    /// Create an empty transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a neighbor.
    pub fn add_peer(&mut self, neighbor: NeighborId) {
        self.peers.entry(neighbor).or_default();
    }

    /// Stop tracking a neighbor: flush its retransmission queue and drop
    /// any pending ack obligation. No retransmission fires after this.
    pub fn remove_peer(&mut self, neighbor: NeighborId) {
        self.peers.remove(&neighbor);
    }

    /// Assign the next sequence number. Zero is reserved for unsequenced
    /// packets and skipped at wraparound.
    pub fn next_seq(&mut self) -> u32 {
        self.seq = self.seq.wrapping_add(1);
        if self.seq == 0 {
            self.seq = 1;
        }
        self.seq
    }

    /// Finish an outgoing unicast packet: piggyback the pending ack (if
    /// any), assign a sequence number when `reliable`, and retain the
    /// encoded copy for retransmission. Returns the wire bytes.
    pub fn prepare_unicast(
        &mut self,
        mut packet: RtpPacket,
        neighbor: NeighborId,
        reliable: bool,
        now: Instant,
    ) -> Vec<u8> {
        if reliable {
            packet.header.seq = self.next_seq();
        }
        let mut seq = 0;
        if let Some(peer) = self.peers.get_mut(&neighbor) {
            packet.header.ack = peer.last_seq_seen;
            // Any outgoing packet satisfies the ack obligation.
            peer.ack_deadline = None;
            seq = packet.header.seq;
        }
        let bytes = packet.encode();
        if reliable {
            if let Some(peer) = self.peers.get_mut(&neighbor) {
                peer.rtx.register(seq, bytes.clone(), now);
            }
        }
        bytes
    }

    /// Finish an outgoing multicast packet. When `reliable`, the packet
    /// gets a sequence number and is retained against every neighbor in
    /// `recipients` (the neighbors that were Up at send time); each one
    /// must ack, or the packet is re-sent to it as unicast. Multicast
    /// cannot piggyback per-neighbor acks, so the ack field stays zero.
    pub fn prepare_multicast(
        &mut self,
        mut packet: RtpPacket,
        recipients: &[NeighborId],
        reliable: bool,
        now: Instant,
    ) -> Vec<u8> {
        if reliable {
            packet.header.seq = self.next_seq();
        }
        packet.header.ack = 0;
        let bytes = packet.encode();
        if reliable {
            for neighbor in recipients {
                if let Some(peer) = self.peers.get_mut(neighbor) {
                    peer.rtx.register(packet.header.seq, bytes.clone(), now);
                }
            }
        }
        bytes
    }

    /// Process the transport fields of a received header: clear acked
    /// retransmissions, dedup the sequence number, and record the ack
    /// obligation. Returns whether the payload should be delivered.
    pub fn on_receive(&mut self, neighbor: NeighborId, header: &RtpHeader, now: Instant) -> Receive {
        let Some(peer) = self.peers.get_mut(&neighbor) else {
            // Unknown peers carry no transport state; deliver and let the
            // neighbor layer decide what to do with the packet.
            return Receive::Deliver;
        };

        if header.ack != 0 {
            peer.rtx.acknowledge(header.ack);
        }

        if header.seq == 0 {
            return Receive::Deliver;
        }

        // Sequenced packet: it must be acked either way.
        if peer.ack_deadline.is_none() {
            peer.ack_deadline = Some(now + DELAYED_ACK_WINDOW);
        }

        if peer.last_seq_seen == 0 || seq_newer(header.seq, peer.last_seq_seen) {
            peer.last_seq_seen = header.seq;
            Receive::Deliver
        } else {
            Receive::Discard
        }
    }

    /// Neighbors whose delayed-ack window has expired. Clears the
    /// obligation; the caller must send each one a dedicated ack packet
    /// carrying the returned sequence number.
    pub fn take_due_acks(&mut self, now: Instant) -> Vec<(NeighborId, u32)> {
        let mut due = Vec::new();
        for (neighbor, peer) in &mut self.peers {
            if let Some(deadline) = peer.ack_deadline {
                if deadline <= now {
                    peer.ack_deadline = None;
                    due.push((*neighbor, peer.last_seq_seen));
                }
            }
        }
        due
    }

    /// Packets due for retransmission, as (neighbor, wire bytes) pairs.
    /// Retransmissions always go as unicast to the outstanding neighbor.
    pub fn take_due_retransmits(&mut self, now: Instant) -> Vec<(NeighborId, Vec<u8>)> {
        let mut out = Vec::new();
        for (neighbor, peer) in &mut self.peers {
            for (_seq, bytes) in peer.rtx.take_due(now) {
                out.push((*neighbor, bytes));
            }
        }
        out
    }

    /// Neighbors that have exhausted their retry budget and must be
    /// declared down.
    pub fn failed_peers(&self) -> Vec<TransportError> {
        self.peers
            .iter()
            .filter(|(_, p)| p.rtx.exhausted())
            .map(|(n, p)| TransportError::RetryExceeded {
                neighbor: *n,
                retries: p.rtx.max_retries(),
            })
            .collect()
    }

    /// True while `neighbor` still owes acks for reliable packets.
    pub fn has_pending(&self, neighbor: NeighborId) -> bool {
        self.peers
            .get(&neighbor)
            .map(|p| p.rtx.has_pending())
            .unwrap_or(false)
    }

    /// Earliest transport deadline: retransmission or delayed ack.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.peers
            .values()
            .flat_map(|p| p.rtx.next_deadline().into_iter().chain(p.ack_deadline))
            .min()
    }
}
