//! End-to-end protocol behavior, driven packet by packet.
//!
//! One real process instance talks to scripted peers: the tests build the
//! peers' wire bytes by hand, feed them in, and assert on the datagrams
//! and route-export calls that come out.

use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use eigrp_rtp::core::config::{Config, IfaceConfig};
use eigrp_rtp::core::types::{AsNumber, IfaceIndex, NeighborId, Prefix, RouterId};
use eigrp_rtp::dual::DualState;
use eigrp_rtp::export::RouteExport;
use eigrp_rtp::neighbor::SessionState;
use eigrp_rtp::packet::{Opcode, RtpHeader, RtpPacket, Tlv, WireMetric};
use eigrp_rtp::router::Router;
use eigrp_rtp::transport::Outbound;
use eigrp_rtp::EigrpError;

const AS: u16 = 100;
const K: [u8; 6] = [1, 74, 1, 0, 0, 0];

/// Route-export sink shareable with the test body.
#[derive(Debug, Default)]
struct SharedExport {
    added: Arc<Mutex<Vec<(Prefix, Ipv4Addr)>>>,
    removed: Arc<Mutex<Vec<Prefix>>>,
}

impl RouteExport for SharedExport {
    fn add_route(
        &mut self,
        prefix: Prefix,
        next_hop: Ipv4Addr,
        _iface: IfaceIndex,
        _distance: u32,
    ) -> Result<(), EigrpError> {
        self.added.lock().unwrap().push((prefix, next_hop));
        Ok(())
    }

    fn remove_route(&mut self, prefix: Prefix) -> Result<(), EigrpError> {
        self.removed.lock().unwrap().push(prefix);
        Ok(())
    }
}

/// A scripted neighbor that builds raw packets.
struct Peer {
    addr: Ipv4Addr,
    router_id: RouterId,
    seq: u32,
}

impl Peer {
    fn new(last_octet: u8, router_id: u16) -> Self {
        Self {
            addr: Ipv4Addr::new(10, 0, 0, last_octet),
            router_id: RouterId(router_id),
            seq: 0,
        }
    }

    fn id(&self) -> NeighborId {
        NeighborId::new(IfaceIndex(0), self.addr)
    }

    fn header(&self, opcode: Opcode) -> RtpHeader {
        RtpHeader::new(opcode, self.router_id, AsNumber(AS))
    }

    fn hello(&self) -> Vec<u8> {
        RtpPacket::new(
            self.header(Opcode::Hello),
            vec![Tlv::Parameters {
                k_values: K,
                holdtime: 15,
            }],
        )
        .encode()
    }

    /// INIT-flagged empty Update acknowledging the router's own INIT.
    fn init_update(&mut self, ack: u32) -> Vec<u8> {
        self.seq += 1;
        let mut packet = RtpPacket::new(self.header(Opcode::Update), Vec::new());
        packet.header.flags = 0x1;
        packet.header.seq = self.seq;
        packet.header.ack = ack;
        packet.encode()
    }

    fn route_packet(
        &mut self,
        opcode: Opcode,
        prefix: Prefix,
        metric: WireMetric,
        ack: u32,
    ) -> Vec<u8> {
        self.seq += 1;
        let mut packet = RtpPacket::new(
            self.header(opcode),
            vec![Tlv::InternalRoute {
                next_hop: Ipv4Addr::UNSPECIFIED,
                metric,
                prefix,
            }],
        );
        packet.header.seq = self.seq;
        packet.header.ack = ack;
        packet.encode()
    }

    fn ack_only(&self, ack: u32) -> Vec<u8> {
        let mut packet = RtpPacket::new(self.header(Opcode::Hello), Vec::new());
        packet.header.ack = ack;
        packet.encode()
    }
}

struct Harness {
    router: Router,
    added: Arc<Mutex<Vec<(Prefix, Ipv4Addr)>>>,
    removed: Arc<Mutex<Vec<Prefix>>>,
    /// Highest sequence number the router has sent so far.
    router_seq: u32,
}

impl Harness {
    fn new(now: Instant) -> Self {
        Self::with_config(
            Config::new(
                1,
                u32::from(AS),
                vec![IfaceConfig::new(IfaceIndex(0), Ipv4Addr::new(10, 0, 0, 1))],
            )
            .unwrap(),
            now,
        )
    }

    fn with_config(config: Config, now: Instant) -> Self {
        let export = SharedExport::default();
        let added = export.added.clone();
        let removed = export.removed.clone();
        Self {
            router: Router::new(config, Box::new(export), now),
            added,
            removed,
            router_seq: 0,
        }
    }

    /// Feed one datagram, recording any sequence numbers the router
    /// sends back so peers can ack them.
    fn feed(&mut self, from: &Peer, bytes: &[u8], now: Instant) -> Vec<Outbound> {
        let out = self.router.handle_packet(IfaceIndex(0), from.addr, bytes, now);
        self.observe(&out);
        out
    }

    fn tick(&mut self, now: Instant) -> Vec<Outbound> {
        let out = self.router.handle_timer(now);
        self.observe(&out);
        out
    }

    fn observe(&mut self, out: &[Outbound]) {
        for datagram in out {
            if let Ok(header) = RtpHeader::decode(&datagram.bytes) {
                if header.seq != 0 {
                    self.router_seq = header.seq;
                }
            }
        }
    }

    /// Bring a peer's adjacency fully up.
    fn establish(&mut self, peer: &mut Peer, now: Instant) {
        let hello = peer.hello();
        let out = self.feed(peer, &hello, now);
        let init = decode(&out[0]);
        assert!(init.header.is_init());
        let answer = peer.init_update(init.header.seq);
        self.feed(peer, &answer, now);
        assert_eq!(
            self.router.neighbors().get(peer.id()).unwrap().state(),
            SessionState::Up
        );
    }

    fn state_of(&self, prefix: Prefix) -> DualState {
        self.router.dual().table().entry(prefix).unwrap().state()
    }
}

fn decode(out: &Outbound) -> RtpPacket {
    RtpPacket::decode(&out.bytes).unwrap()
}

fn reachable(delay: u32) -> WireMetric {
    WireMetric {
        delay,
        bandwidth: 100_000,
        mtu: 1500,
        hop_count: 1,
        reliability: 255,
        load: 1,
    }
}

#[test]
fn test_adjacency_handshake() {
    let t0 = Instant::now();
    let mut h = Harness::new(t0);
    let mut peer = Peer::new(2, 2);

    // Hello discovers the neighbor and triggers our INIT Update.
    let hello = peer.hello();
    let out = h.feed(&peer, &hello, t0);
    assert_eq!(
        h.router.neighbors().get(peer.id()).unwrap().state(),
        SessionState::Pending
    );
    let init = decode(&out[0]);
    assert_eq!(init.header.opcode, Opcode::Update);
    assert!(init.header.is_init());

    // The peer's INIT Update both completes its half and acks ours.
    let answer = peer.init_update(init.header.seq);
    h.feed(&peer, &answer, t0);
    assert_eq!(
        h.router.neighbors().get(peer.id()).unwrap().state(),
        SessionState::Up
    );
}

#[test]
fn test_received_update_installs_and_readvertises() {
    let t0 = Instant::now();
    let mut h = Harness::new(t0);
    let mut peer = Peer::new(2, 2);
    h.establish(&mut peer, t0);
    let prefix = Prefix::new(Ipv4Addr::new(10, 9, 0, 0), 16);

    let update = peer.route_packet(Opcode::Update, prefix, reachable(100), h.router_seq);
    let out = h.feed(&peer, &update, t0);

    // Installed through the peer, and re-advertised reliably.
    assert_eq!(h.added.lock().unwrap().as_slice(), &[(prefix, peer.addr)]);
    let advert = out
        .iter()
        .map(decode)
        .find(|p| p.header.opcode == Opcode::Update)
        .unwrap();
    assert!(advert.header.seq != 0);
    assert!(advert
        .tlvs
        .iter()
        .any(|t| matches!(t, Tlv::InternalRoute { prefix: p, .. } if *p == prefix)));
}

#[test]
fn test_replayed_update_produces_nothing() {
    let t0 = Instant::now();
    let mut h = Harness::new(t0);
    let mut peer = Peer::new(2, 2);
    h.establish(&mut peer, t0);
    let prefix = Prefix::new(Ipv4Addr::new(10, 9, 0, 0), 16);

    let first = peer.route_packet(Opcode::Update, prefix, reachable(100), h.router_seq);
    h.feed(&peer, &first, t0);
    let installs = h.added.lock().unwrap().len();

    // Same metric again, new sequence number: acked but otherwise silent.
    let replay = peer.route_packet(Opcode::Update, prefix, reachable(100), h.router_seq);
    let out = h.feed(&peer, &replay, t0);
    assert!(out.is_empty());
    assert_eq!(h.added.lock().unwrap().len(), installs);
}

#[test]
fn test_failover_via_query_diffusion() {
    let t0 = Instant::now();
    let mut h = Harness::new(t0);
    let mut n1 = Peer::new(2, 2);
    let mut n2 = Peer::new(3, 3);
    h.establish(&mut n1, t0);
    h.establish(&mut n2, t0);
    let prefix = Prefix::new(Ipv4Addr::new(10, 9, 0, 0), 16);

    // N1 offers the good path; N2's is too slow to be feasible.
    let good = n1.route_packet(Opcode::Update, prefix, reachable(100), h.router_seq);
    h.feed(&n1, &good, t0);
    let ack = n2.ack_only(h.router_seq);
    h.feed(&n2, &ack, t0);
    let slow = n2.route_packet(Opcode::Update, prefix, reachable(100_000), h.router_seq);
    h.feed(&n2, &slow, t0);
    assert_eq!(h.added.lock().unwrap().as_slice(), &[(prefix, n1.addr)]);

    // Only N2 keeps talking; N1's hold timer runs out.
    let t1 = t0 + Duration::from_secs(10);
    let keepalive = n2.hello();
    h.feed(&n2, &keepalive, t1);
    let t2 = t0 + Duration::from_secs(15);
    let out = h.tick(t2);

    // No feasible successor: a query goes to N2 and the destination
    // sits Active, with the old route still installed.
    let query = out
        .iter()
        .map(decode)
        .find(|p| p.header.opcode == Opcode::Query)
        .expect("query toward remaining neighbor");
    assert!(query
        .tlvs
        .iter()
        .any(|t| matches!(t, Tlv::InternalRoute { prefix: p, .. } if *p == prefix)));
    assert_eq!(h.state_of(prefix), DualState::Active);
    assert!(h.removed.lock().unwrap().is_empty());

    // N2's reply completes the diffusion; it becomes the successor.
    let reply = n2.route_packet(Opcode::Reply, prefix, reachable(100_000), h.router_seq);
    h.feed(&n2, &reply, t2);
    assert_eq!(h.state_of(prefix), DualState::Passive);
    assert_eq!(h.added.lock().unwrap().last().unwrap(), &(prefix, n2.addr));
}

#[test]
fn test_diffusion_blocks_until_all_replies() {
    let t0 = Instant::now();
    let mut h = Harness::new(t0);
    let mut n1 = Peer::new(2, 2);
    let mut n2 = Peer::new(3, 3);
    let mut n3 = Peer::new(4, 4);
    h.establish(&mut n1, t0);
    h.establish(&mut n2, t0);
    h.establish(&mut n3, t0);
    let prefix = Prefix::new(Ipv4Addr::new(10, 9, 0, 0), 16);

    // N1 carries the route; N2 and N3 both know it, neither feasibly.
    let good = n1.route_packet(Opcode::Update, prefix, reachable(100), h.router_seq);
    h.feed(&n1, &good, t0);
    let ack = n2.ack_only(h.router_seq);
    h.feed(&n2, &ack, t0);
    let slow = n2.route_packet(Opcode::Update, prefix, reachable(2_000), h.router_seq);
    h.feed(&n2, &slow, t0);
    let ack = n3.ack_only(h.router_seq);
    h.feed(&n3, &ack, t0);
    let slower = n3.route_packet(Opcode::Update, prefix, reachable(3_000), h.router_seq);
    h.feed(&n3, &slower, t0);

    // N1 goes quiet; both survivors get queried.
    let t1 = t0 + Duration::from_secs(10);
    let keepalive = n2.hello();
    h.feed(&n2, &keepalive, t1);
    let keepalive = n3.hello();
    h.feed(&n3, &keepalive, t1);
    let t2 = t0 + Duration::from_secs(15);
    let out = h.tick(t2);
    let queries = out
        .iter()
        .map(decode)
        .filter(|p| p.header.opcode == Opcode::Query)
        .count();
    assert_eq!(queries, 2);

    // One reply in, one still outstanding: the destination must hold
    // Active and change nothing.
    let installs = h.added.lock().unwrap().len();
    let reply = n2.route_packet(Opcode::Reply, prefix, reachable(2_000), h.router_seq);
    let out = h.feed(&n2, &reply, t2);
    assert_eq!(h.state_of(prefix), DualState::Active);
    assert_eq!(h.added.lock().unwrap().len(), installs);
    assert!(out
        .iter()
        .map(decode)
        .all(|p| p.header.opcode != Opcode::Update));

    // The second reply drains the set and converges on N2.
    let reply = n3.route_packet(Opcode::Reply, prefix, reachable(3_000), h.router_seq);
    h.feed(&n3, &reply, t2);
    assert_eq!(h.state_of(prefix), DualState::Passive);
    assert_eq!(h.added.lock().unwrap().last().unwrap(), &(prefix, n2.addr));
}

#[test]
fn test_last_neighbor_loss_withdraws_route() {
    let t0 = Instant::now();
    let mut h = Harness::new(t0);
    let mut peer = Peer::new(2, 2);
    h.establish(&mut peer, t0);
    let prefix = Prefix::new(Ipv4Addr::new(10, 9, 0, 0), 16);
    let update = peer.route_packet(Opcode::Update, prefix, reachable(100), h.router_seq);
    h.feed(&peer, &update, t0);

    // Nobody left to query once the only neighbor dies.
    let out = h.tick(t0 + Duration::from_secs(15));
    assert_eq!(h.removed.lock().unwrap().as_slice(), &[prefix]);
    assert!(out
        .iter()
        .map(decode)
        .all(|p| p.header.opcode != Opcode::Query));
}

#[test]
fn test_retry_exhaustion_declares_neighbor_down() {
    let t0 = Instant::now();
    let mut h = Harness::new(t0);
    let mut peer = Peer::new(2, 2);
    h.establish(&mut peer, t0);
    let prefix = Prefix::new(Ipv4Addr::new(10, 9, 0, 0), 16);
    let update = peer.route_packet(Opcode::Update, prefix, reachable(100), h.router_seq);
    h.feed(&peer, &update, t0);

    // The triggered Update is never acked. Keep the hold timer alive
    // with hellos while the retransmission budget burns down.
    let mut clock = t0;
    let mut saw_retransmit = false;
    for _ in 0..20 {
        clock += Duration::from_secs(5);
        let keepalive = peer.hello();
        h.feed(&peer, &keepalive, clock);
        let out = h.tick(clock);
        saw_retransmit |= out.iter().any(|o| {
            !o.is_multicast()
                && RtpHeader::decode(&o.bytes).is_ok_and(|hd| hd.opcode == Opcode::Update)
        });
        if h.router.neighbors().is_empty() {
            break;
        }
    }

    assert!(saw_retransmit);
    assert!(h.router.neighbors().is_empty());
    assert_eq!(h.removed.lock().unwrap().as_slice(), &[prefix]);
}

#[test]
fn test_duplicate_sequence_is_acked_but_not_reprocessed() {
    let t0 = Instant::now();
    let mut h = Harness::new(t0);
    let mut peer = Peer::new(2, 2);
    h.establish(&mut peer, t0);
    let prefix = Prefix::new(Ipv4Addr::new(10, 9, 0, 0), 16);

    let bytes = peer.route_packet(Opcode::Update, prefix, reachable(100), h.router_seq);
    h.feed(&peer, &bytes, t0);
    let installs = h.added.lock().unwrap().len();

    // Identical bytes again: same sequence number, dropped as duplicate.
    let out = h.feed(&peer, &bytes, t0);
    assert!(out.is_empty());
    assert_eq!(h.added.lock().unwrap().len(), installs);

    // The ack obligation still falls due.
    let acks = h.tick(t0 + Duration::from_millis(400));
    let ack = acks
        .iter()
        .map(decode)
        .find(|p| p.header.opcode == Opcode::Hello && p.tlvs.is_empty())
        .expect("dedicated ack");
    assert_eq!(ack.header.ack, peer.seq);
}

#[test]
fn test_init_from_established_neighbor_restarts_adjacency() {
    let t0 = Instant::now();
    let mut h = Harness::new(t0);
    let mut peer = Peer::new(2, 2);
    h.establish(&mut peer, t0);
    let prefix = Prefix::new(Ipv4Addr::new(10, 9, 0, 0), 16);
    let update = peer.route_packet(Opcode::Update, prefix, reachable(100), h.router_seq);
    h.feed(&peer, &update, t0);

    // The peer restarts: a fresh INIT tears everything down.
    let mut restarted = Peer::new(2, 2);
    let init = restarted.init_update(0);
    h.feed(&restarted, &init, t0);
    assert!(h.router.neighbors().is_empty());
    assert_eq!(h.removed.lock().unwrap().as_slice(), &[prefix]);

    // Its next Hello starts a new handshake.
    let hello = restarted.hello();
    let out = h.feed(&restarted, &hello, t0);
    assert!(decode(&out[0]).header.is_init());
}

#[test]
fn test_local_route_advertised_to_new_neighbor() {
    let t0 = Instant::now();
    let prefix = Prefix::new(Ipv4Addr::new(192, 168, 7, 0), 24);
    let config = Config::new(
        1,
        u32::from(AS),
        vec![IfaceConfig::new(IfaceIndex(0), Ipv4Addr::new(10, 0, 0, 1))],
    )
    .unwrap()
    .with_local_route(prefix, IfaceIndex(0));
    let mut h = Harness::with_config(config, t0);

    let mut peer = Peer::new(2, 2);
    let hello = peer.hello();
    let out = h.feed(&peer, &hello, t0);
    let init_seq = decode(&out[0]).header.seq;
    let answer = peer.init_update(init_seq);
    let out = h.feed(&peer, &answer, t0);

    // Adjacency up: the full-table Update carries the local prefix.
    let full = out
        .iter()
        .map(decode)
        .find(|p| p.header.opcode == Opcode::Update && !p.tlvs.is_empty())
        .expect("full-table update");
    assert!(full
        .tlvs
        .iter()
        .any(|t| matches!(t, Tlv::InternalRoute { prefix: p, .. } if *p == prefix)));
}
