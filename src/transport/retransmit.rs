//! Per-neighbor retransmission queue.
//!
//! A reliably-sent packet is retained here until the neighbor
//! acknowledges it or goes down. The retransmission interval is fixed;
//! an RTT-derived variable timer is a known gap.

use std::time::Instant;

use crate::core::constants::{MAX_RETRANSMITS, RETRANSMIT_INTERVAL};
use crate::core::types::seq_newer;

/// One unacknowledged reliable packet.
#[derive(Debug, Clone)]
pub struct RetransmitEntry {
    /// Sequence number the packet was sent with.
    pub seq: u32,
    /// Encoded packet, resent as-is (as unicast) on timeout.
    pub bytes: Vec<u8>,
    /// Retransmissions performed so far.
    pub retry_count: u32,
    /// When the next retransmission is due.
    pub deadline: Instant,
}

impl RetransmitEntry {
    fn new(seq: u32, bytes: Vec<u8>, now: Instant) -> Self {
        Self {
            seq,
            bytes,
            retry_count: 0,
            deadline: now + RETRANSMIT_INTERVAL,
        }
    }
}

/// Retransmission queue for a single neighbor.
#[derive(Debug, Default)]
pub struct RetransmitQueue {
    entries: Vec<RetransmitEntry>,
}

impl RetransmitQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Retain a reliably-sent packet until acknowledged.
    pub fn register(&mut self, seq: u32, bytes: Vec<u8>, now: Instant) {
        if self.entries.iter().any(|e| e.seq == seq) {
            return;
        }
        self.entries.push(RetransmitEntry::new(seq, bytes, now));
    }

    /// Process a cumulative acknowledgment: everything at or below
    /// `ack` (under serial-number order) is delivered.
    pub fn acknowledge(&mut self, ack: u32) {
        self.entries.retain(|e| seq_newer(e.seq, ack));
    }

    /// Entries whose retransmission deadline has passed. Re-arms each
    /// returned entry and bumps its retry count; check [`Self::exhausted`]
    /// afterwards.
    pub fn take_due(&mut self, now: Instant) -> Vec<(u32, Vec<u8>)> {
        let mut due = Vec::new();
        for entry in &mut self.entries {
            if entry.deadline <= now && entry.retry_count < MAX_RETRANSMITS {
                entry.retry_count += 1;
                entry.deadline = now + RETRANSMIT_INTERVAL;
                due.push((entry.seq, entry.bytes.clone()));
            }
        }
        due
    }

    /// True once any entry has used up its retry budget, meaning the
    /// neighbor must be declared down.
    pub fn exhausted(&self) -> bool {
        self.entries.iter().any(|e| e.retry_count >= MAX_RETRANSMITS)
    }

    /// Highest retry count across pending entries.
    pub fn max_retries(&self) -> u32 {
        self.entries.iter().map(|e| e.retry_count).max().unwrap_or(0)
    }

    /// Earliest pending retransmission deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries
            .iter()
            .filter(|e| e.retry_count < MAX_RETRANSMITS)
            .map(|e| e.deadline)
            .min()
    }

    /// Whether any packet is still awaiting acknowledgment.
    pub fn has_pending(&self) -> bool {
        !self.entries.is_empty()
    }

    /// Number of packets awaiting acknowledgment.
    pub fn pending_count(&self) -> usize {
        self.entries.len()
    }

    /// Drop everything; used on neighbor teardown.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
