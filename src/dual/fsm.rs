//! Per-destination Passive/Active state machine.
//!
//! Inputs are topology changes already stored in the entry (an update, a
//! query, a reply, a neighbor loss); outputs are action lists the engine
//! turns into packets and route-export calls. A destination goes Active
//! only when its successor is lost and no feasible successor exists, and
//! returns to Passive only once every neighbor in the reply-status set
//! has answered.
//!
//! There is no stuck-in-active timeout: a queried neighbor that never
//! replies leaves the destination Active until its hold timer tears the
//! adjacency down.

use std::net::Ipv4Addr;

use tracing::debug;

use crate::core::constants::METRIC_UNREACHABLE;
use crate::core::types::{IfaceIndex, NeighborId, Prefix};
use crate::packet::WireMetric;

use super::topology::TopologyEntry;

/// Diffusion state of one destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DualState {
    /// Stable; the installed successor satisfies the feasibility condition.
    Passive,
    /// A diffusing computation is in flight; replies are outstanding.
    Active,
}

/// Who triggered the diffusing computation. Determines whether a Reply
/// is owed when it completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOrigin {
    /// We detected the loss ourselves; nobody is owed a Reply.
    Local,
    /// The old successor queried us; it gets a Reply on completion.
    FromSuccessor(NeighborId),
}

/// What the state machine wants done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Install or replace the forwarding entry for a prefix.
    Install {
        prefix: Prefix,
        next_hop: Ipv4Addr,
        iface: IfaceIndex,
        distance: u32,
    },
    /// Withdraw the forwarding entry for a prefix.
    Uninstall { prefix: Prefix },
    /// Advertise the prefix's new metric to all neighbors.
    SendUpdate { prefix: Prefix, metric: WireMetric },
    /// Start or propagate a diffusing computation.
    SendQuery {
        prefix: Prefix,
        metric: WireMetric,
        exclude: Option<NeighborId>,
    },
    /// Answer a query with our best-known metric.
    SendReply {
        prefix: Prefix,
        metric: WireMetric,
        to: NeighborId,
    },
}

impl TopologyEntry {
    /// Re-run successor selection after a stored topology change while
    /// Passive. `up_neighbors` is the query fan-out set should the entry
    /// need to go Active; `trigger` is the neighbor whose report caused
    /// the change (excluded from any query).
    pub fn reevaluate(
        &mut self,
        up_neighbors: &[NeighborId],
        trigger: Option<NeighborId>,
    ) -> Vec<Action> {
        if self.state == DualState::Active {
            // Stored only; the in-flight computation owns the decision.
            return Vec::new();
        }
        if self.local().is_some() {
            // Locally originated prefixes keep their connected metric.
            return Vec::new();
        }
        let prev = (self.successor, self.advertised_distance());

        // FD only ever decreases while Passive.
        if let Some(p) = self.successor_path() {
            self.fd = self.fd.min(p.full_distance);
        }

        let successor_ok = self
            .successor_path()
            .is_some_and(|p| p.reported_distance < self.fd && p.full_distance < METRIC_UNREACHABLE);
        if successor_ok {
            return self.emit_if_changed(prev);
        }

        // Successor lost or no longer feasible; try a feasible successor.
        if let Some((neighbor, path)) = self.best_feasible() {
            let full_distance = path.full_distance;
            self.successor = Some(neighbor);
            self.fd = self.fd.min(full_distance);
            debug!(prefix = %self.prefix(), successor = %neighbor, distance = full_distance,
                   "feasible successor promoted");
            return self.emit_if_changed(prev);
        }

        // No feasible successor: diffuse. FD keeps its last good value
        // so late advertisements are still judged against it.
        let pending: Vec<NeighborId> = up_neighbors
            .iter()
            .copied()
            .filter(|n| Some(*n) != trigger)
            .collect();
        if pending.is_empty() {
            // Nobody to ask; the computation completes degenerately.
            return self.complete_diffusion(prev);
        }
        self.state = DualState::Active;
        self.replies_pending = pending.into_iter().collect();
        self.query_origin = QueryOrigin::Local;
        debug!(prefix = %self.prefix(), pending = self.replies_pending.len(),
               "destination went active");
        vec![Action::SendQuery {
            prefix: self.prefix(),
            metric: self.advertised_metric(),
            exclude: trigger,
        }]
    }

    /// Handle a query from `from` whose metric has already been stored
    /// as that neighbor's path.
    pub fn on_query(&mut self, from: NeighborId, up_neighbors: &[NeighborId]) -> Vec<Action> {
        if self.state == DualState::Active {
            // Already diffusing; answer with what we currently know
            // rather than stacking a second computation.
            return vec![Action::SendReply {
                prefix: self.prefix(),
                metric: self.advertised_metric(),
                to: from,
            }];
        }
        if self.successor == Some(from) {
            // The successor itself is reporting a change.
            let mut actions = self.reevaluate(up_neighbors, Some(from));
            if self.state == DualState::Active {
                // Reply deferred until the diffusion completes.
                self.query_origin = QueryOrigin::FromSuccessor(from);
            } else {
                actions.push(Action::SendReply {
                    prefix: self.prefix(),
                    metric: self.advertised_metric(),
                    to: from,
                });
            }
            return actions;
        }
        vec![Action::SendReply {
            prefix: self.prefix(),
            metric: self.advertised_metric(),
            to: from,
        }]
    }

    /// Handle a reply (or the loss of a queried neighbor, which counts
    /// as its reply). The stored path already reflects the answer.
    pub fn on_reply(&mut self, from: NeighborId) -> Vec<Action> {
        if self.state != DualState::Active || !self.replies_pending.remove(&from) {
            // Stale or duplicate; no transition.
            return Vec::new();
        }
        if !self.replies_pending.is_empty() {
            return Vec::new();
        }
        let prev = (self.successor, self.advertised_distance());
        self.complete_diffusion(prev)
    }

    /// All replies are in: reset FD from the now-complete topology data,
    /// pick the best path outright, and go Passive.
    fn complete_diffusion(
        &mut self,
        prev: (Option<NeighborId>, u32),
    ) -> Vec<Action> {
        self.state = DualState::Passive;
        self.replies_pending.clear();
        let origin = std::mem::replace(&mut self.query_origin, QueryOrigin::Local);

        match self.best_path() {
            Some((neighbor, path)) => {
                let full_distance = path.full_distance;
                self.successor = Some(neighbor);
                self.fd = full_distance;
                debug!(prefix = %self.prefix(), successor = %neighbor, distance = full_distance,
                       "diffusion complete");
            }
            None => {
                self.successor = None;
                self.fd = METRIC_UNREACHABLE;
                debug!(prefix = %self.prefix(), "diffusion complete, destination unreachable");
            }
        }

        let mut actions = self.emit_if_changed(prev);
        if let QueryOrigin::FromSuccessor(to) = origin {
            actions.push(Action::SendReply {
                prefix: self.prefix(),
                metric: self.advertised_metric(),
                to,
            });
        }
        actions
    }

    /// Emit install/withdraw and a triggered Update when the selected
    /// route actually changed. Unchanged state emits nothing, keeping
    /// replayed updates silent.
    fn emit_if_changed(&self, prev: (Option<NeighborId>, u32)) -> Vec<Action> {
        let now = (self.successor, self.advertised_distance());
        if now == prev {
            return Vec::new();
        }
        let mut actions = Vec::new();
        if let (Some(neighbor), Some(path)) = (self.successor, self.successor_path()) {
            actions.push(Action::Install {
                prefix: self.prefix(),
                next_hop: path.next_hop,
                iface: neighbor.iface,
                distance: path.full_distance,
            });
        } else if prev.0.is_some() {
            actions.push(Action::Uninstall {
                prefix: self.prefix(),
            });
        }
        actions.push(Action::SendUpdate {
            prefix: self.prefix(),
            metric: self.advertised_metric(),
        });
        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dual::topology::PathInfo;

    fn nid(last: u8) -> NeighborId {
        NeighborId::new(IfaceIndex(0), Ipv4Addr::new(10, 0, 0, last))
    }

    fn path(next_hop_last: u8, reported_distance: u32, full_distance: u32) -> PathInfo {
        PathInfo {
            next_hop: Ipv4Addr::new(10, 0, 0, next_hop_last),
            reported: WireMetric::connected(100_000, 10),
            full: WireMetric::connected(100_000, 20),
            reported_distance,
            full_distance,
        }
    }

    fn prefix() -> Prefix {
        Prefix::new(Ipv4Addr::new(10, 99, 0, 0), 16)
    }

    #[test]
    fn test_first_path_installs_route() {
        let mut entry = TopologyEntry::new(prefix());
        entry.store_path(nid(2), path(2, 50, 100));

        let actions = entry.reevaluate(&[nid(2)], Some(nid(2)));
        assert_eq!(entry.state(), DualState::Passive);
        assert_eq!(entry.successor(), Some(nid(2)));
        assert_eq!(entry.feasible_distance(), 100);
        assert!(actions
            .iter()
            .any(|a| matches!(a, Action::Install { distance: 100, .. })));
        assert!(actions
            .iter()
            .any(|a| matches!(a, Action::SendUpdate { .. })));
    }

    #[test]
    fn test_unchanged_path_is_silent() {
        let mut entry = TopologyEntry::new(prefix());
        entry.store_path(nid(2), path(2, 50, 100));
        entry.reevaluate(&[nid(2)], Some(nid(2)));

        entry.store_path(nid(2), path(2, 50, 100));
        let actions = entry.reevaluate(&[nid(2)], Some(nid(2)));
        assert!(actions.is_empty());
    }

    #[test]
    fn test_successor_loss_promotes_feasible_successor() {
        let mut entry = TopologyEntry::new(prefix());
        entry.store_path(nid(2), path(2, 50, 100));
        entry.reevaluate(&[nid(2)], Some(nid(2)));
        entry.store_path(nid(3), path(3, 80, 180));
        entry.reevaluate(&[nid(2), nid(3)], Some(nid(3)));

        entry.remove_path(nid(2));
        let actions = entry.reevaluate(&[nid(3)], Some(nid(2)));

        // RD 80 < FD 100, promoted without diffusing.
        assert_eq!(entry.state(), DualState::Passive);
        assert_eq!(entry.successor(), Some(nid(3)));
        assert!(actions
            .iter()
            .any(|a| matches!(a, Action::Install { distance: 180, .. })));
    }

    #[test]
    fn test_successor_loss_without_feasible_goes_active() {
        let mut entry = TopologyEntry::new(prefix());
        entry.store_path(nid(2), path(2, 50, 100));
        entry.reevaluate(&[nid(2)], Some(nid(2)));
        // RD 150 >= FD 100, stored but not feasible.
        entry.store_path(nid(3), path(3, 150, 150));
        entry.reevaluate(&[nid(2), nid(3)], Some(nid(3)));
        assert_eq!(entry.successor(), Some(nid(2)));

        entry.remove_path(nid(2));
        let actions = entry.reevaluate(&[nid(3)], Some(nid(2)));

        assert_eq!(entry.state(), DualState::Active);
        assert!(matches!(
            actions.as_slice(),
            [Action::SendQuery { exclude: Some(e), .. }] if *e == nid(2)
        ));
    }

    #[test]
    fn test_reply_completes_diffusion() {
        let mut entry = TopologyEntry::new(prefix());
        entry.store_path(nid(2), path(2, 50, 100));
        entry.reevaluate(&[nid(2)], Some(nid(2)));
        entry.store_path(nid(3), path(3, 150, 150));
        entry.reevaluate(&[nid(2), nid(3)], Some(nid(3)));
        entry.remove_path(nid(2));
        entry.reevaluate(&[nid(3)], Some(nid(2)));
        assert_eq!(entry.state(), DualState::Active);

        // Reply stored as the refreshed path, then fed to the machine.
        entry.store_path(nid(3), path(3, 150, 150));
        let actions = entry.on_reply(nid(3));

        assert_eq!(entry.state(), DualState::Passive);
        assert_eq!(entry.successor(), Some(nid(3)));
        assert_eq!(entry.feasible_distance(), 150);
        assert!(actions
            .iter()
            .any(|a| matches!(a, Action::Install { distance: 150, .. })));
    }

    #[test]
    fn test_stays_active_until_every_reply_arrives() {
        let mut entry = TopologyEntry::new(prefix());
        entry.store_path(nid(2), path(2, 50, 100));
        entry.reevaluate(&[nid(2)], Some(nid(2)));
        // Two more neighbors know the destination, neither feasibly.
        entry.store_path(nid(3), path(3, 150, 150));
        entry.reevaluate(&[nid(2), nid(3)], Some(nid(3)));
        entry.store_path(nid(4), path(4, 200, 200));
        entry.reevaluate(&[nid(2), nid(3), nid(4)], Some(nid(4)));

        entry.remove_path(nid(2));
        entry.reevaluate(&[nid(3), nid(4)], Some(nid(2)));
        assert_eq!(entry.state(), DualState::Active);

        // First reply drains only half the reply-status set: no
        // transition, no actions, route decision still on hold.
        entry.store_path(nid(3), path(3, 150, 150));
        let actions = entry.on_reply(nid(3));
        assert!(actions.is_empty());
        assert_eq!(entry.state(), DualState::Active);
        assert_eq!(entry.successor(), Some(nid(2)));

        // The last reply completes the computation.
        entry.store_path(nid(4), path(4, 200, 200));
        let actions = entry.on_reply(nid(4));
        assert_eq!(entry.state(), DualState::Passive);
        assert_eq!(entry.successor(), Some(nid(3)));
        assert!(actions
            .iter()
            .any(|a| matches!(a, Action::Install { distance: 150, .. })));
    }

    #[test]
    fn test_duplicate_reply_is_ignored() {
        let mut entry = TopologyEntry::new(prefix());
        entry.store_path(nid(2), path(2, 50, 100));
        entry.reevaluate(&[nid(2)], Some(nid(2)));
        assert!(entry.on_reply(nid(2)).is_empty());
    }

    #[test]
    fn test_query_from_non_successor_gets_immediate_reply() {
        let mut entry = TopologyEntry::new(prefix());
        entry.store_path(nid(2), path(2, 50, 100));
        entry.reevaluate(&[nid(2)], Some(nid(2)));
        entry.store_path(nid(3), path(3, 150, 150));

        let actions = entry.on_query(nid(3), &[nid(2), nid(3)]);
        assert!(matches!(
            actions.as_slice(),
            [Action::SendReply { to, .. }] if *to == nid(3)
        ));
        assert_eq!(entry.state(), DualState::Passive);
    }

    #[test]
    fn test_query_from_successor_defers_reply_until_complete() {
        let mut entry = TopologyEntry::new(prefix());
        entry.store_path(nid(2), path(2, 50, 100));
        entry.reevaluate(&[nid(2)], Some(nid(2)));
        entry.store_path(nid(3), path(3, 150, 150));
        entry.reevaluate(&[nid(2), nid(3)], Some(nid(3)));

        // Successor reports loss via query.
        entry.store_path(nid(2), path(2, METRIC_UNREACHABLE, METRIC_UNREACHABLE));
        let actions = entry.on_query(nid(2), &[nid(2), nid(3)]);

        assert_eq!(entry.state(), DualState::Active);
        assert!(matches!(actions.as_slice(), [Action::SendQuery { .. }]));
        assert!(!actions
            .iter()
            .any(|a| matches!(a, Action::SendReply { .. })));

        // Completion answers the old successor.
        entry.store_path(nid(3), path(3, 150, 150));
        let actions = entry.on_reply(nid(3));
        assert!(actions
            .iter()
            .any(|a| matches!(a, Action::SendReply { to, .. } if *to == nid(2))));
        assert_eq!(entry.successor(), Some(nid(3)));
    }

    #[test]
    fn test_no_neighbors_to_query_goes_unreachable() {
        let mut entry = TopologyEntry::new(prefix());
        entry.store_path(nid(2), path(2, 50, 100));
        entry.reevaluate(&[nid(2)], Some(nid(2)));

        entry.remove_path(nid(2));
        let actions = entry.reevaluate(&[], Some(nid(2)));

        assert_eq!(entry.state(), DualState::Passive);
        assert_eq!(entry.successor(), None);
        assert!(actions
            .iter()
            .any(|a| matches!(a, Action::Uninstall { .. })));
        assert!(actions.iter().any(|a| matches!(
            a,
            Action::SendUpdate { metric, .. } if metric.is_unreachable()
        )));
    }
}
