//! Diffusing-update engine.
//!
//! Owns the topology table and feeds stored changes through the
//! per-destination state machine. Inputs are route TLVs already decoded
//! by the caller plus neighbor lifecycle events; outputs are the action
//! lists the router turns into packets and route-export calls.

use std::collections::HashMap;
use std::net::Ipv4Addr;

use tracing::{debug, warn};

use crate::core::config::Config;
use crate::core::types::{IfaceIndex, NeighborId, Prefix};
use crate::packet::WireMetric;

use super::fsm::{Action, DualState};
use super::metric::{add_link_cost, composite};
use super::topology::{LocalPath, PathInfo, TopologyTable};

/// A destination/metric pair as carried in an Update, Query or Reply.
#[derive(Debug, Clone, Copy)]
pub struct RouteAdvert {
    /// Destination being advertised.
    pub prefix: Prefix,
    /// Next hop to forward through; unspecified means the packet source.
    pub next_hop: Ipv4Addr,
    /// Metric as reported by the sender, before link cost is added.
    pub metric: WireMetric,
}

/// Per-interface link cost inputs.
#[derive(Debug, Clone, Copy)]
struct LinkCost {
    bandwidth: u32,
    delay: u32,
}

/// The DUAL computation for one process instance.
#[derive(Debug)]
pub struct DualEngine {
    k_values: [u8; 6],
    links: HashMap<IfaceIndex, LinkCost>,
    table: TopologyTable,
}

impl DualEngine {
    /// Build the engine and originate the configured local routes.
    pub fn new(config: &Config) -> Self {
        let links = config
            .interfaces
            .iter()
            .map(|i| {
                (
                    i.index,
                    LinkCost {
                        bandwidth: i.bandwidth,
                        delay: i.delay,
                    },
                )
            })
            .collect();
        let mut engine = Self {
            k_values: config.k_values,
            links,
            table: TopologyTable::new(),
        };
        for route in &config.local_routes {
            engine.originate(route.prefix, route.iface);
        }
        engine
    }

    /// Import a locally connected prefix and advertise it from now on.
    pub fn originate(&mut self, prefix: Prefix, iface: IfaceIndex) {
        let cost = self.link_cost(iface);
        let metric = WireMetric::connected(cost.bandwidth, cost.delay);
        let distance = composite(&metric, &self.k_values);
        self.table.entry_or_insert(prefix).set_local(LocalPath {
            iface,
            metric,
            distance,
        });
        debug!(%prefix, %iface, distance, "local route originated");
    }

    /// Read access to the topology table.
    pub fn table(&self) -> &TopologyTable {
        &self.table
    }

    /// Every reachable destination with the metric we advertise for it.
    /// Feeds the full-table Update sent to a newly Up neighbor.
    pub fn advertised_routes(&self) -> Vec<(Prefix, WireMetric)> {
        self.table
            .iter()
            .filter(|e| e.state() == DualState::Passive)
            .map(|e| (e.prefix(), e.advertised_metric()))
            .filter(|(_, m)| !m.is_unreachable())
            .collect()
    }

    /// Process the route TLVs of an Update.
    pub fn handle_update(
        &mut self,
        from: NeighborId,
        routes: &[RouteAdvert],
        up_neighbors: &[NeighborId],
    ) -> Vec<Action> {
        let mut actions = Vec::new();
        for advert in routes {
            if self.store_advert(from, advert) {
                let entry = self.table.entry_or_insert(advert.prefix);
                actions.extend(entry.reevaluate(up_neighbors, Some(from)));
            }
        }
        actions
    }

    /// Process the route TLVs of a Query. Each queried destination gets
    /// a Reply action, possibly after going Active ourselves.
    pub fn handle_query(
        &mut self,
        from: NeighborId,
        routes: &[RouteAdvert],
        up_neighbors: &[NeighborId],
    ) -> Vec<Action> {
        let mut actions = Vec::new();
        for advert in routes {
            self.store_advert(from, advert);
            let entry = self.table.entry_or_insert(advert.prefix);
            actions.extend(entry.on_query(from, up_neighbors));
        }
        actions
    }

    /// Process the route TLVs of a Reply.
    pub fn handle_reply(&mut self, from: NeighborId, routes: &[RouteAdvert]) -> Vec<Action> {
        let mut actions = Vec::new();
        for advert in routes {
            self.store_advert(from, advert);
            let entry = self.table.entry_or_insert(advert.prefix);
            actions.extend(entry.on_reply(from));
        }
        actions
    }

    /// Tear down everything learned from a lost neighbor. Equivalent to
    /// an Update advertising every one of its destinations unreachable,
    /// and counts as its Reply for any computation waiting on it.
    pub fn handle_neighbor_down(
        &mut self,
        neighbor: NeighborId,
        up_neighbors: &[NeighborId],
    ) -> Vec<Action> {
        let mut actions = Vec::new();
        for prefix in self.table.prefixes_involving(neighbor) {
            let Some(entry) = self.table.entry_mut(prefix) else {
                continue;
            };
            entry.remove_path(neighbor);
            if entry.state() == DualState::Active {
                actions.extend(entry.on_reply(neighbor));
            } else {
                actions.extend(entry.reevaluate(up_neighbors, Some(neighbor)));
            }
        }
        if !actions.is_empty() {
            warn!(%neighbor, "neighbor loss triggered route recomputation");
        }
        actions
    }

    /// Store an advert as the neighbor's path for its prefix. Returns
    /// false when it matches what is already stored, so replayed
    /// updates stay silent.
    fn store_advert(&mut self, from: NeighborId, advert: &RouteAdvert) -> bool {
        let cost = self.link_cost(from.iface);
        let full = add_link_cost(&advert.metric, cost.bandwidth, cost.delay);
        let next_hop = if advert.next_hop.is_unspecified() {
            from.addr
        } else {
            advert.next_hop
        };
        let path = PathInfo {
            next_hop,
            reported: advert.metric,
            full,
            reported_distance: composite(&advert.metric, &self.k_values),
            full_distance: composite(&full, &self.k_values),
        };
        let entry = self.table.entry_or_insert(advert.prefix);
        match entry.path(from) {
            Some(existing) if *existing == path => false,
            _ => {
                entry.store_path(from, path);
                true
            }
        }
    }

    fn link_cost(&self, iface: IfaceIndex) -> LinkCost {
        self.links.get(&iface).copied().unwrap_or(LinkCost {
            bandwidth: 100_000,
            delay: 10,
        })
    }
}
