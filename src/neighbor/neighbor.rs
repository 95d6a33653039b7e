//! Per-neighbor session state.

use std::time::{Duration, Instant};

use crate::core::types::NeighborId;

/// Neighbor session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Hello seen, INIT-flagged Update exchange still in progress.
    Pending,
    /// Adjacency established; hold timer running, normal traffic flows.
    Up,
    /// Hold timer expired or the peering was torn down.
    Down,
}

/// A discovered neighbor.
#[derive(Debug)]
pub struct Neighbor {
    /// Identity: interface plus source address.
    id: NeighborId,
    /// Session state.
    state: SessionState,
    /// Hold time the neighbor advertised in its Hello.
    holdtime: Duration,
    /// K-values the neighbor advertised.
    k_values: [u8; 6],
    /// Deadline after which the neighbor is declared down.
    hold_deadline: Instant,
    /// Sequence number of our INIT-flagged Update, until it is acked.
    init_seq: Option<u32>,
    /// We received the peer's INIT-flagged Update.
    init_received: bool,
    /// Our INIT-flagged Update was acknowledged.
    init_acked: bool,
}

impl Neighbor {
    /// Create a neighbor in Pending state from its first valid Hello.
    pub fn new(id: NeighborId, holdtime: Duration, k_values: [u8; 6], now: Instant) -> Self {
        Self {
            id,
            state: SessionState::Pending,
            holdtime,
            k_values,
            hold_deadline: now + holdtime,
            init_seq: None,
            init_received: false,
            init_acked: false,
        }
    }

    /// Neighbor identity.
    pub fn id(&self) -> NeighborId {
        self.id
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Negotiated hold time.
    pub fn holdtime(&self) -> Duration {
        self.holdtime
    }

    /// The neighbor's advertised K-values.
    pub fn k_values(&self) -> [u8; 6] {
        self.k_values
    }

    /// Reset the hold timer. Called for every valid packet from the
    /// neighbor, not only Hellos.
    pub fn touch(&mut self, now: Instant) {
        self.hold_deadline = now + self.holdtime;
    }

    /// Update the hold time from a fresh Hello.
    pub fn set_holdtime(&mut self, holdtime: Duration, now: Instant) {
        self.holdtime = holdtime;
        self.hold_deadline = now + holdtime;
    }

    /// Deadline after which the neighbor is down.
    pub fn hold_deadline(&self) -> Instant {
        self.hold_deadline
    }

    /// True once the hold timer has run out.
    pub fn hold_expired(&self, now: Instant) -> bool {
        now >= self.hold_deadline
    }

    /// Record the sequence number of the INIT-flagged Update we sent.
    pub fn init_update_sent(&mut self, seq: u32) {
        if self.init_seq.is_none() {
            self.init_seq = Some(seq);
        }
    }

    /// Record receipt of the peer's INIT-flagged Update.
    pub fn init_update_received(&mut self) {
        self.init_received = true;
    }

    /// Feed an acknowledgment number; completes our half of the
    /// handshake when it covers our INIT Update.
    pub fn on_ack(&mut self, ack: u32) {
        if let Some(seq) = self.init_seq {
            if !crate::core::types::seq_newer(seq, ack) {
                self.init_acked = true;
            }
        }
    }

    /// Promote Pending to Up once both halves of the INIT exchange are
    /// done. Returns true on the transition.
    pub fn try_promote(&mut self) -> bool {
        if self.state == SessionState::Pending && self.init_received && self.init_acked {
            self.state = SessionState::Up;
            true
        } else {
            false
        }
    }

    /// Force the neighbor down.
    pub fn set_down(&mut self) {
        self.state = SessionState::Down;
    }

    /// True while the adjacency is usable for routing.
    pub fn is_up(&self) -> bool {
        self.state == SessionState::Up
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::IfaceIndex;
    use std::net::Ipv4Addr;

    fn neighbor(now: Instant) -> Neighbor {
        Neighbor::new(
            NeighborId::new(IfaceIndex(0), Ipv4Addr::new(10, 0, 0, 2)),
            Duration::from_secs(15),
            [1, 74, 1, 0, 0, 0],
            now,
        )
    }

    #[test]
    fn test_starts_pending() {
        let now = Instant::now();
        let n = neighbor(now);
        assert_eq!(n.state(), SessionState::Pending);
        assert!(!n.is_up());
    }

    #[test]
    fn test_handshake_promotion() {
        let now = Instant::now();
        let mut n = neighbor(now);

        n.init_update_sent(7);
        assert!(!n.try_promote());

        n.init_update_received();
        assert!(!n.try_promote());

        // Ack below our init seq does not complete the handshake.
        n.on_ack(6);
        assert!(!n.try_promote());

        n.on_ack(7);
        assert!(n.try_promote());
        assert!(n.is_up());

        // Promotion happens once.
        assert!(!n.try_promote());

        n.set_down();
        assert_eq!(n.state(), SessionState::Down);
        assert!(!n.is_up());
    }

    #[test]
    fn test_hold_timer() {
        let now = Instant::now();
        let mut n = neighbor(now);
        assert!(!n.hold_expired(now));
        assert!(n.hold_expired(now + Duration::from_secs(15)));

        // Any traffic resets the timer.
        n.touch(now + Duration::from_secs(10));
        assert!(!n.hold_expired(now + Duration::from_secs(15)));
        assert!(n.hold_expired(now + Duration::from_secs(25)));
    }
}
