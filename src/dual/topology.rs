//! Per-destination topology table.
//!
//! Each prefix maps every advertising neighbor to the distances heard
//! from it. The table also carries the per-destination diffusion state:
//! feasible distance, current successor, and the reply-status set while
//! a computation is in flight.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::net::Ipv4Addr;

use crate::core::constants::METRIC_UNREACHABLE;
use crate::core::types::{IfaceIndex, NeighborId, Prefix};
use crate::packet::WireMetric;

use super::fsm::{DualState, QueryOrigin};

/// One neighbor's path to a destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathInfo {
    /// Next hop to use when forwarding through this neighbor.
    pub next_hop: Ipv4Addr,
    /// Metric vector as the neighbor advertised it.
    pub reported: WireMetric,
    /// Metric vector with our link cost added.
    pub full: WireMetric,
    /// Composite of `reported`; the feasibility check runs on this.
    pub reported_distance: u32,
    /// Composite of `full`; successor selection runs on this.
    pub full_distance: u32,
}

/// A route originated locally rather than learned from a neighbor.
#[derive(Debug, Clone, Copy)]
pub struct LocalPath {
    /// Interface the destination is directly reachable through.
    pub iface: IfaceIndex,
    /// Connected-link metric vector.
    pub metric: WireMetric,
    /// Composite of `metric`.
    pub distance: u32,
}

/// Everything known about one destination prefix.
#[derive(Debug)]
pub struct TopologyEntry {
    prefix: Prefix,
    paths: HashMap<NeighborId, PathInfo>,
    local: Option<LocalPath>,
    pub(super) state: DualState,
    pub(super) fd: u32,
    pub(super) successor: Option<NeighborId>,
    pub(super) replies_pending: HashSet<NeighborId>,
    pub(super) query_origin: QueryOrigin,
}

impl TopologyEntry {
    /// Fresh Passive entry with no paths and an infinite FD.
    pub fn new(prefix: Prefix) -> Self {
        Self {
            prefix,
            paths: HashMap::new(),
            local: None,
            state: DualState::Passive,
            fd: METRIC_UNREACHABLE,
            successor: None,
            replies_pending: HashSet::new(),
            query_origin: QueryOrigin::Local,
        }
    }

    /// Destination prefix this entry describes.
    pub fn prefix(&self) -> Prefix {
        self.prefix
    }

    /// Passive or Active.
    pub fn state(&self) -> DualState {
        self.state
    }

    /// Current feasible distance.
    pub fn feasible_distance(&self) -> u32 {
        self.fd
    }

    /// Current successor, if any.
    pub fn successor(&self) -> Option<NeighborId> {
        self.successor
    }

    /// Local origination, if this prefix is connected.
    pub fn local(&self) -> Option<&LocalPath> {
        self.local.as_ref()
    }

    /// Mark the prefix as locally originated.
    pub fn set_local(&mut self, local: LocalPath) {
        self.fd = self.fd.min(local.distance);
        self.local = Some(local);
    }

    /// The path advertised by a specific neighbor.
    pub fn path(&self, neighbor: NeighborId) -> Option<&PathInfo> {
        self.paths.get(&neighbor)
    }

    /// Insert or replace a neighbor's path. Returns the previous path.
    pub fn store_path(&mut self, neighbor: NeighborId, path: PathInfo) -> Option<PathInfo> {
        self.paths.insert(neighbor, path)
    }

    /// Drop a neighbor's path.
    pub fn remove_path(&mut self, neighbor: NeighborId) -> Option<PathInfo> {
        self.paths.remove(&neighbor)
    }

    /// Neighbors currently advertising this prefix.
    pub fn neighbors(&self) -> impl Iterator<Item = NeighborId> + '_ {
        self.paths.keys().copied()
    }

    /// The successor's path, if the successor still advertises one.
    pub fn successor_path(&self) -> Option<&PathInfo> {
        self.successor.and_then(|s| self.paths.get(&s))
    }

    /// Lowest-full-distance path satisfying the feasibility condition
    /// (reported distance strictly below the current FD).
    pub fn best_feasible(&self) -> Option<(NeighborId, &PathInfo)> {
        self.paths
            .iter()
            .filter(|(_, p)| p.reported_distance < self.fd && p.full_distance < METRIC_UNREACHABLE)
            .min_by_key(|(_, p)| p.full_distance)
            .map(|(n, p)| (*n, p))
    }

    /// Lowest-full-distance path regardless of feasibility. Used when a
    /// diffusing computation completes and FD is reset.
    pub fn best_path(&self) -> Option<(NeighborId, &PathInfo)> {
        self.paths
            .iter()
            .filter(|(_, p)| p.full_distance < METRIC_UNREACHABLE)
            .min_by_key(|(_, p)| p.full_distance)
            .map(|(n, p)| (*n, p))
    }

    /// Metric vector we advertise for this prefix: the local path when
    /// we originate it, otherwise the successor's full vector.
    pub fn advertised_metric(&self) -> WireMetric {
        if let Some(local) = &self.local {
            return local.metric;
        }
        self.successor_path()
            .map(|p| p.full)
            .unwrap_or_else(WireMetric::unreachable)
    }

    /// Composite distance we advertise for this prefix.
    pub fn advertised_distance(&self) -> u32 {
        if let Some(local) = &self.local {
            return local.distance;
        }
        self.successor_path()
            .map(|p| p.full_distance)
            .unwrap_or(METRIC_UNREACHABLE)
    }
}

/// The table of every known destination, ordered for stable iteration.
#[derive(Debug, Default)]
pub struct TopologyTable {
    entries: BTreeMap<Prefix, TopologyEntry>,
}

impl TopologyTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an entry.
    pub fn entry(&self, prefix: Prefix) -> Option<&TopologyEntry> {
        self.entries.get(&prefix)
    }

    /// Look up an entry mutably.
    pub fn entry_mut(&mut self, prefix: Prefix) -> Option<&mut TopologyEntry> {
        self.entries.get_mut(&prefix)
    }

    /// Fetch or create the entry for a prefix.
    pub fn entry_or_insert(&mut self, prefix: Prefix) -> &mut TopologyEntry {
        self.entries
            .entry(prefix)
            .or_insert_with(|| TopologyEntry::new(prefix))
    }

    /// Remove an entry outright.
    pub fn remove(&mut self, prefix: Prefix) -> Option<TopologyEntry> {
        self.entries.remove(&prefix)
    }

    /// Prefixes that a given neighbor contributes paths to, or whose
    /// diffusing computation is waiting on it.
    pub fn prefixes_involving(&self, neighbor: NeighborId) -> Vec<Prefix> {
        self.entries
            .values()
            .filter(|e| e.paths.contains_key(&neighbor) || e.replies_pending.contains(&neighbor))
            .map(|e| e.prefix)
            .collect()
    }

    /// All entries in prefix order.
    pub fn iter(&self) -> impl Iterator<Item = &TopologyEntry> {
        self.entries.values()
    }

    /// Number of known destinations.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no destination is known.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
