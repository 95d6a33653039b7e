//! The EIGRP process instance.
//!
//! One [`Router`] owns every piece of process state: the reliable
//! transport, the neighbor table, the DUAL engine and the hello
//! schedule. It exposes a synchronous event API driven by the runtime
//! loop (or directly by tests): feed it a packet or a tick, get back the
//! datagrams to transmit. No I/O happens here.

use std::net::Ipv4Addr;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::core::config::Config;
use crate::core::constants::{FLAG_INIT, RTP_HEADER_VERSION};
use crate::core::error::{ProtocolMismatch, TransportError};
use crate::core::types::{IfaceIndex, NeighborId};
use crate::dual::{Action, DualEngine, RouteAdvert};
use crate::export::{export_add, export_remove, RouteExport};
use crate::neighbor::{hello_parameters, HelloOutcome, NeighborManager};
use crate::packet::{Opcode, RtpHeader, RtpPacket, Tlv};
use crate::transport::{Outbound, Receive, RtpTransport};

use super::timers::TimerQueue;

/// A single EIGRP process.
pub struct Router {
    config: Config,
    transport: RtpTransport,
    neighbors: NeighborManager,
    dual: DualEngine,
    hellos: TimerQueue<IfaceIndex>,
    export: Box<dyn RouteExport + Send>,
}

impl Router {
    /// Create the process. The first Hello on every interface is due
    /// immediately.
    pub fn new(config: Config, export: Box<dyn RouteExport + Send>, now: Instant) -> Self {
        let mut hellos = TimerQueue::new();
        for iface in &config.interfaces {
            hellos.set(iface.index, now);
        }
        info!(router_id = %config.router_id, as_number = %config.as_number,
              interfaces = config.interfaces.len(), "process starting");
        Self {
            transport: RtpTransport::new(),
            neighbors: NeighborManager::new(&config),
            dual: DualEngine::new(&config),
            hellos,
            export,
            config,
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Read access to the neighbor table.
    pub fn neighbors(&self) -> &NeighborManager {
        &self.neighbors
    }

    /// Read access to the route computation state.
    pub fn dual(&self) -> &DualEngine {
        &self.dual
    }

    /// Carry an upper-layer TLV in every outgoing Hello from now on.
    pub fn add_hello_tlv(&mut self, tlv: Tlv) {
        self.neighbors.add_hello_tlv(tlv);
    }

    /// Send bare Hellos without the Parameters TLV. For upper layers
    /// reusing the transport without EIGRP session negotiation.
    pub fn suppress_hello_parameters(&mut self) {
        self.neighbors.suppress_parameters();
    }

    /// Earliest deadline across every timer the process runs.
    pub fn next_deadline(&self) -> Option<Instant> {
        [
            self.hellos.next_deadline(),
            self.neighbors.next_hold_deadline(),
            self.transport.next_deadline(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    /// Process one received datagram. Malformed packets are logged and
    /// dropped without touching any state; they are never fatal.
    pub fn handle_packet(
        &mut self,
        iface: IfaceIndex,
        src: Ipv4Addr,
        bytes: &[u8],
        now: Instant,
    ) -> Vec<Outbound> {
        if self.config.is_local_address(src) {
            return Vec::new();
        }
        let packet = match RtpPacket::decode(bytes) {
            Ok(packet) => packet,
            Err(err) => {
                warn!(%src, %err, "dropping malformed packet");
                return Vec::new();
            }
        };
        if packet.header.version != RTP_HEADER_VERSION {
            let err = ProtocolMismatch::HeaderVersion(packet.header.version);
            warn!(%src, %err, "dropping packet");
            return Vec::new();
        }
        if packet.header.as_number != self.config.as_number {
            debug!(%src, as_number = %packet.header.as_number, "ignoring foreign AS");
            return Vec::new();
        }

        let nid = NeighborId::new(iface, src);
        let mut out = Vec::new();

        // Hello TLVs run first so that a brand-new sender exists in the
        // table before any transport bookkeeping.
        if let Some((k_values, holdtime)) = hello_parameters(&packet) {
            match self.neighbors.on_hello(nid, k_values, holdtime, now) {
                HelloOutcome::NewNeighbor => {
                    self.transport.add_peer(nid);
                    out.extend(self.send_init_update(nid, now));
                }
                HelloOutcome::Known => {}
                HelloOutcome::Incompatible(_) => return out,
            }
        }
        if !self.neighbors.contains(nid) {
            debug!(neighbor = %nid, opcode = ?packet.header.opcode,
                   "ignoring packet from unknown sender");
            return out;
        }
        if packet.tlvs.iter().any(|t| matches!(t, Tlv::PeerTermination)) {
            info!(neighbor = %nid, "peer announced termination");
            out.extend(self.tear_down(nid, now));
            return out;
        }

        // An INIT-flagged packet from an established neighbor means it
        // restarted and lost all sequence state. Tear the adjacency down;
        // its next Hello rebuilds it from scratch.
        if packet.header.is_init() && self.neighbors.get(nid).is_some_and(|n| n.is_up()) {
            info!(neighbor = %nid, "init flag from established neighbor, restarting adjacency");
            out.extend(self.tear_down(nid, now));
            return out;
        }

        // Any valid packet refreshes the hold timer.
        self.neighbors.touch(nid, now);

        let verdict = self.transport.on_receive(nid, &packet.header, now);

        if packet.header.ack != 0 {
            if let Some(neighbor) = self.neighbors.get_mut(nid) {
                neighbor.on_ack(packet.header.ack);
            }
        }
        if packet.header.opcode == Opcode::Update && packet.header.is_init() {
            if let Some(neighbor) = self.neighbors.get_mut(nid) {
                neighbor.init_update_received();
            }
        }
        if self.neighbors.get_mut(nid).is_some_and(|n| n.try_promote()) {
            info!(neighbor = %nid, "adjacency established");
            out.extend(self.send_full_table(nid, now));
        }

        if verdict == Receive::Discard {
            // Duplicate payload; the ack obligation is already recorded.
            return out;
        }
        out.extend(self.dispatch(nid, &packet, now));
        out
    }

    /// Drive every due timer: hellos, hold expiries, retransmissions,
    /// retry exhaustion and delayed acks.
    pub fn handle_timer(&mut self, now: Instant) -> Vec<Outbound> {
        let mut out = Vec::new();

        for iface in self.hellos.due(now) {
            self.hellos.set(iface, now + self.config.hello_interval);
            let hello = self.neighbors.build_hello(self.header(Opcode::Hello));
            let bytes = self.transport.prepare_multicast(hello, &[], false, now);
            out.push(Outbound::multicast(bytes));
        }

        for nid in self.neighbors.take_expired(now) {
            warn!(neighbor = %nid, "hold timer expired");
            out.extend(self.tear_down(nid, now));
        }

        for (nid, bytes) in self.transport.take_due_retransmits(now) {
            debug!(neighbor = %nid, "retransmitting as unicast");
            out.push(Outbound::unicast(nid.addr, bytes));
        }

        for err in self.transport.failed_peers() {
            warn!(%err, "giving up on unresponsive neighbor");
            let TransportError::RetryExceeded { neighbor, .. } = err;
            out.extend(self.tear_down(neighbor, now));
        }

        for (nid, seq) in self.transport.take_due_acks(now) {
            let mut packet = RtpPacket::new(self.header(Opcode::Hello), Vec::new());
            packet.header.ack = seq;
            out.push(Outbound::unicast(nid.addr, packet.encode()));
        }

        out
    }

    /// Gracefully stop: announce termination to the multicast group so
    /// neighbors drop the adjacency without waiting for hold expiry.
    pub fn shutdown(&mut self, now: Instant) -> Vec<Outbound> {
        info!("process shutting down");
        let packet = RtpPacket::new(self.header(Opcode::Hello), vec![Tlv::PeerTermination]);
        let bytes = self.transport.prepare_multicast(packet, &[], false, now);
        vec![Outbound::multicast(bytes)]
    }

    fn header(&self, opcode: Opcode) -> RtpHeader {
        RtpHeader::new(opcode, self.config.router_id, self.config.as_number)
    }

    /// Dispatch a delivered payload by opcode.
    fn dispatch(&mut self, nid: NeighborId, packet: &RtpPacket, now: Instant) -> Vec<Outbound> {
        // Routing TLVs only count once the adjacency is established.
        let routing_ready = self.neighbors.get(nid).is_some_and(|n| n.is_up());
        let up = self.neighbors.up_neighbors();
        match packet.header.opcode {
            Opcode::Hello => Vec::new(),
            Opcode::Update if routing_ready => {
                let routes = route_adverts(packet);
                let actions = self.dual.handle_update(nid, &routes, &up);
                self.apply_actions(actions, now)
            }
            Opcode::Query if routing_ready => {
                let routes = route_adverts(packet);
                let actions = self.dual.handle_query(nid, &routes, &up);
                self.apply_actions(actions, now)
            }
            Opcode::Reply if routing_ready => {
                let routes = route_adverts(packet);
                let actions = self.dual.handle_reply(nid, &routes);
                self.apply_actions(actions, now)
            }
            Opcode::Update | Opcode::Query | Opcode::Reply => {
                debug!(neighbor = %nid, "routing payload before adjacency, ignored");
                Vec::new()
            }
            Opcode::SiaQuery | Opcode::SiaReply => {
                warn!(neighbor = %nid, opcode = ?packet.header.opcode,
                      "stuck-in-active handling not implemented, payload ignored");
                Vec::new()
            }
            Opcode::Request | Opcode::Probe => {
                debug!(neighbor = %nid, opcode = ?packet.header.opcode, "not originated here, ignored");
                Vec::new()
            }
        }
    }

    /// Turn DUAL actions into export calls and packets. All SendUpdate
    /// actions batch into a single reliable multicast; queries and
    /// replies go as reliable unicast.
    fn apply_actions(&mut self, actions: Vec<Action>, now: Instant) -> Vec<Outbound> {
        let mut out = Vec::new();
        let mut update_tlvs = Vec::new();
        for action in actions {
            match action {
                Action::Install {
                    prefix,
                    next_hop,
                    iface,
                    distance,
                } => export_add(self.export.as_mut(), prefix, next_hop, iface, distance),
                Action::Uninstall { prefix } => export_remove(self.export.as_mut(), prefix),
                Action::SendUpdate { prefix, metric } => {
                    update_tlvs.push(Tlv::InternalRoute {
                        next_hop: Ipv4Addr::UNSPECIFIED,
                        metric,
                        prefix,
                    });
                }
                Action::SendQuery {
                    prefix,
                    metric,
                    exclude,
                } => {
                    let tlv = Tlv::InternalRoute {
                        next_hop: Ipv4Addr::UNSPECIFIED,
                        metric,
                        prefix,
                    };
                    for nid in self.neighbors.up_neighbors() {
                        if Some(nid) == exclude {
                            continue;
                        }
                        let packet =
                            RtpPacket::new(self.header(Opcode::Query), vec![tlv.clone()]);
                        let bytes = self.transport.prepare_unicast(packet, nid, true, now);
                        out.push(Outbound::unicast(nid.addr, bytes));
                    }
                }
                Action::SendReply { prefix, metric, to } => {
                    let packet = RtpPacket::new(
                        self.header(Opcode::Reply),
                        vec![Tlv::InternalRoute {
                            next_hop: Ipv4Addr::UNSPECIFIED,
                            metric,
                            prefix,
                        }],
                    );
                    let bytes = self.transport.prepare_unicast(packet, to, true, now);
                    out.push(Outbound::unicast(to.addr, bytes));
                }
            }
        }
        if !update_tlvs.is_empty() {
            let recipients = self.neighbors.up_neighbors();
            if !recipients.is_empty() {
                let packet = RtpPacket::new(self.header(Opcode::Update), update_tlvs);
                let bytes = self
                    .transport
                    .prepare_multicast(packet, &recipients, true, now);
                out.push(Outbound::multicast(bytes));
            }
        }
        out
    }

    /// First half of the adjacency handshake: an empty INIT-flagged
    /// Update, sent reliably.
    fn send_init_update(&mut self, nid: NeighborId, now: Instant) -> Vec<Outbound> {
        let mut packet = RtpPacket::new(self.header(Opcode::Update), Vec::new());
        packet.header.flags = FLAG_INIT;
        let bytes = self.transport.prepare_unicast(packet, nid, true, now);
        if let Ok(header) = RtpHeader::decode(&bytes) {
            if let Some(neighbor) = self.neighbors.get_mut(nid) {
                neighbor.init_update_sent(header.seq);
            }
        }
        debug!(neighbor = %nid, "init update sent");
        vec![Outbound::unicast(nid.addr, bytes)]
    }

    /// Advertise the whole topology table to a freshly established
    /// neighbor, as one reliable unicast Update.
    fn send_full_table(&mut self, nid: NeighborId, now: Instant) -> Vec<Outbound> {
        let routes = self.dual.advertised_routes();
        if routes.is_empty() {
            return Vec::new();
        }
        let tlvs = routes
            .into_iter()
            .map(|(prefix, metric)| Tlv::InternalRoute {
                next_hop: Ipv4Addr::UNSPECIFIED,
                metric,
                prefix,
            })
            .collect();
        let packet = RtpPacket::new(self.header(Opcode::Update), tlvs);
        let bytes = self.transport.prepare_unicast(packet, nid, true, now);
        vec![Outbound::unicast(nid.addr, bytes)]
    }

    /// Remove a neighbor everywhere and rerun DUAL without it. Nothing
    /// belonging to the neighbor can fire after this returns.
    fn tear_down(&mut self, nid: NeighborId, now: Instant) -> Vec<Outbound> {
        self.neighbors.remove(nid);
        self.transport.remove_peer(nid);
        let up = self.neighbors.up_neighbors();
        let actions = self.dual.handle_neighbor_down(nid, &up);
        self.apply_actions(actions, now)
    }
}

/// Pull the route advertisements out of a packet's TLVs.
fn route_adverts(packet: &RtpPacket) -> Vec<RouteAdvert> {
    packet
        .tlvs
        .iter()
        .filter_map(|tlv| match tlv {
            Tlv::InternalRoute {
                next_hop,
                metric,
                prefix,
            } => Some(RouteAdvert {
                prefix: *prefix,
                next_hop: *next_hop,
                metric: *metric,
            }),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::IfaceConfig;
    use crate::core::types::{AsNumber, RouterId};
    use crate::export::testing::RecordingExport;
    use crate::packet::WireMetric;
    use crate::core::types::Prefix;

    fn config() -> Config {
        Config::new(
            1,
            100,
            vec![IfaceConfig::new(IfaceIndex(0), Ipv4Addr::new(10, 0, 0, 1))],
        )
        .unwrap()
    }

    fn router(now: Instant) -> Router {
        Router::new(config(), Box::new(RecordingExport::default()), now)
    }

    fn peer_hello(router_id: u16) -> Vec<u8> {
        RtpPacket::new(
            RtpHeader::new(Opcode::Hello, RouterId(router_id), AsNumber(100)),
            vec![Tlv::Parameters {
                k_values: [1, 74, 1, 0, 0, 0],
                holdtime: 15,
            }],
        )
        .encode()
    }

    #[test]
    fn test_first_hello_is_scheduled_immediately() {
        let now = Instant::now();
        let mut r = router(now);
        assert_eq!(r.next_deadline(), Some(now));

        let out = r.handle_timer(now);
        assert_eq!(out.len(), 1);
        assert!(out[0].is_multicast());
        let hello = RtpPacket::decode(&out[0].bytes).unwrap();
        assert_eq!(hello.header.opcode, Opcode::Hello);
        assert!(hello_parameters(&hello).is_some());
    }

    #[test]
    fn test_injected_tlv_rides_periodic_hello() {
        let now = Instant::now();
        let mut r = router(now);
        r.add_hello_tlv(Tlv::Opaque {
            class: 0x0a,
            kind: 0x01,
            data: vec![7],
        });

        let out = r.handle_timer(now);
        let hello = RtpPacket::decode(&out[0].bytes).unwrap();
        assert!(hello_parameters(&hello).is_some());
        assert!(hello
            .tlvs
            .iter()
            .any(|t| matches!(t, Tlv::Opaque { class: 0x0a, .. })));
    }

    #[test]
    fn test_hello_from_peer_triggers_init_update() {
        let now = Instant::now();
        let mut r = router(now);
        let src = Ipv4Addr::new(10, 0, 0, 2);

        let out = r.handle_packet(IfaceIndex(0), src, &peer_hello(2), now);
        assert_eq!(out.len(), 1);
        let init = RtpPacket::decode(&out[0].bytes).unwrap();
        assert_eq!(init.header.opcode, Opcode::Update);
        assert!(init.header.is_init());
        assert!(init.tlvs.is_empty());
        assert!(r.neighbors().contains(NeighborId::new(IfaceIndex(0), src)));
    }

    #[test]
    fn test_own_packets_ignored() {
        let now = Instant::now();
        let mut r = router(now);
        let out = r.handle_packet(IfaceIndex(0), Ipv4Addr::new(10, 0, 0, 1), &peer_hello(1), now);
        assert!(out.is_empty());
        assert!(r.neighbors().is_empty());
    }

    #[test]
    fn test_foreign_as_ignored() {
        let now = Instant::now();
        let mut r = router(now);
        let bytes = RtpPacket::new(
            RtpHeader::new(Opcode::Hello, RouterId(9), AsNumber(200)),
            vec![Tlv::Parameters {
                k_values: [1, 74, 1, 0, 0, 0],
                holdtime: 15,
            }],
        )
        .encode();
        let out = r.handle_packet(IfaceIndex(0), Ipv4Addr::new(10, 0, 0, 9), &bytes, now);
        assert!(out.is_empty());
        assert!(r.neighbors().is_empty());
    }

    #[test]
    fn test_malformed_packet_dropped_without_state_change() {
        let now = Instant::now();
        let mut r = router(now);
        let out = r.handle_packet(IfaceIndex(0), Ipv4Addr::new(10, 0, 0, 2), &[0xFF; 7], now);
        assert!(out.is_empty());
        assert!(r.neighbors().is_empty());
    }

    #[test]
    fn test_update_from_unknown_sender_ignored() {
        let now = Instant::now();
        let mut r = router(now);
        let bytes = RtpPacket::new(
            RtpHeader::new(Opcode::Update, RouterId(2), AsNumber(100)),
            vec![Tlv::InternalRoute {
                next_hop: Ipv4Addr::UNSPECIFIED,
                metric: WireMetric::connected(100_000, 10),
                prefix: Prefix::new(Ipv4Addr::new(10, 9, 0, 0), 16),
            }],
        )
        .encode();
        let out = r.handle_packet(IfaceIndex(0), Ipv4Addr::new(10, 0, 0, 2), &bytes, now);
        assert!(out.is_empty());
        assert!(r.dual().table().is_empty());
    }
}
