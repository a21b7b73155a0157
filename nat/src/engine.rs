// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The translation engine (C5): per-packet classify → lookup → (allocate) → rewrite → dispatch,
//! for both directions.

use crate::error::EngineError;
use crate::pair::PortPair;
use crate::port::NatPort;
use crate::portmap::{PortExhausted, PortMap, TerminationDir};
use crate::tuple::Tuple;
use crate::{dump, metrics};
use net::Protocol;
use net::eth::mac::Mac;
use std::net::Ipv4Addr;

/// TCP control bits relevant to teardown accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TcpFlags {
    /// FIN bit.
    pub fin: bool,
    /// RST bit.
    pub rst: bool,
}

/// Stands in for the "Packet Library" collaborator: the minimal view of an already-Ethernet/IPv4
/// parsed frame the engine needs to classify, look up, and rewrite. A host links a real
/// zero-copy packet type implementing this trait; `net::checksum::Checksum` is the primitive a
/// real implementation of `recompute_ipv4_checksum`/`recompute_l4_checksum` would use internally.
pub trait PacketHeaders {
    /// `Some(proto)` for ICMP/TCP/UDP; `None` for anything else (classified UNKNOWN, dropped).
    fn protocol(&self) -> Option<Protocol>;

    /// True for a non-leading IP fragment, which carries no L4 port information.
    fn is_fragment_non_first(&self) -> bool;

    /// The source IPv4 address.
    fn src_ip(&self) -> Ipv4Addr;
    /// The destination IPv4 address.
    fn dst_ip(&self) -> Ipv4Addr;
    /// The source L4 port, or the ICMP Identifier for ICMP.
    fn src_port(&self) -> u16;
    /// The destination L4 port, or the ICMP Identifier for ICMP.
    fn dst_port(&self) -> u16;

    /// Overwrite the source IPv4 address.
    fn set_src_ip(&mut self, addr: Ipv4Addr);
    /// Overwrite the destination IPv4 address.
    fn set_dst_ip(&mut self, addr: Ipv4Addr);
    /// Overwrite the source L4 port (or ICMP Identifier).
    fn set_src_port(&mut self, port: u16);
    /// Overwrite the destination L4 port (or ICMP Identifier).
    fn set_dst_port(&mut self, port: u16);

    /// `Some` for TCP segments; `None` otherwise.
    fn tcp_flags(&self) -> Option<TcpFlags>;

    /// The observed source MAC of the frame, for ARP-table learning.
    fn src_mac(&self) -> Mac;
    /// Overwrite the frame's source MAC.
    fn set_src_mac(&mut self, mac: Mac);
    /// Overwrite the frame's destination MAC.
    fn set_dst_mac(&mut self, mac: Mac);
    /// Whether the frame's destination MAC equals a given local MAC (used for the
    /// sideband-on-unsolicited-inbound edge case).
    fn dst_mac_is(&self, mac: Mac) -> bool;

    /// Recompute the IPv4 header checksum. Always invoked by the engine after rewriting
    /// addresses, regardless of HW offload.
    fn recompute_ipv4_checksum(&mut self);
    /// Recompute the L4 (TCP/UDP/ICMP) checksum. Skipped when HW TX-checksum offload applies.
    fn recompute_l4_checksum(&mut self);

    /// Raw packet bytes, for the [`dump::DumpSink`] collaborator.
    fn raw(&self) -> &[u8];
}

/// The engine's per-packet verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Drop the packet.
    Drop,
    /// Forward the (rewritten) packet across the pair.
    Send,
    /// Deliver the packet, unmodified, to the local sideband.
    Sideband,
}

/// Process-level flags set once during config validation and read-only thereafter: modeled as
/// an immutable snapshot rather than true mutable globals.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalFlags {
    /// Disables all checksum recomputation (testing/benchmarking escape hatch).
    pub no_calculate_checksum: bool,
    /// Disables reliance on HW TX-checksum offload even when the runtime advertises it.
    pub no_hw_tx_checksum: bool,
}

fn classify<P: PacketHeaders>(pkt: &P) -> Result<Protocol, EngineError> {
    if pkt.is_fragment_non_first() {
        return Err(EngineError::MalformedPacket);
    }
    pkt.protocol().ok_or(EngineError::MalformedPacket)
}

fn recompute_checksums<P: PacketHeaders>(
    pkt: &mut P,
    flags: GlobalFlags,
    hw_tx_checksum_capable: bool,
) {
    if flags.no_calculate_checksum {
        return;
    }
    pkt.recompute_ipv4_checksum();
    if !(hw_tx_checksum_capable && !flags.no_hw_tx_checksum) {
        pkt.recompute_l4_checksum();
    }
}

fn account_tcp_teardown(port_map: Option<&PortMap>, port: u16, tcp: TcpFlags, dir: TerminationDir) {
    let Some(port_map) = port_map else { return };
    let Some(entry) = port_map.entry(port) else { return };
    if tcp.rst {
        entry.mark_rst();
    } else if tcp.fin {
        entry.mark_fin(dir);
    }
}

fn drop_with(reason: dump::DumpReason, port_label: &str, sink: &dyn dump::DumpSink, pkt: &impl PacketHeaders) -> Decision {
    match reason {
        dump::DumpReason::PortExhausted => metrics::record_port_exhausted(),
        dump::DumpReason::Unmapped => metrics::record_unmapped(),
        dump::DumpReason::MalformedPacket => metrics::record_malformed_packet(),
    }
    sink.dump(port_label, reason, pkt.raw());
    Decision::Drop
}

/// Translate and dispatch a packet arriving on the private side, private-to-public direction.
pub fn translate_private_to_public<P: PacketHeaders>(
    pair: &PortPair,
    pkt: &mut P,
    now_ms: u64,
    flags: GlobalFlags,
    hw_tx_checksum_capable: bool,
    dump_sink: &dyn dump::DumpSink,
) -> Decision {
    let private = pair.private();
    let public = pair.public();

    if !private.subnet().contains(pkt.src_ip()) {
        return drop_with(dump::DumpReason::MalformedPacket, "private", dump_sink, pkt);
    }
    private.arp().learn(pkt.src_ip(), pkt.src_mac());

    let proto = match classify(pkt) {
        Ok(proto) => proto,
        Err(_) => return drop_with(dump::DumpReason::MalformedPacket, "private", dump_sink, pkt),
    };

    let key = match NatPort::for_protocol(proto, pkt.src_port()) {
        Ok(port) => Tuple::new(pkt.src_ip(), port),
        Err(_) => return drop_with(dump::DumpReason::MalformedPacket, "private", dump_sink, pkt),
    };

    let public_tuple = match private.forward().lookup(proto, key) {
        Some(v) => v,
        None => match pair.allocate_public_port(proto, key, now_ms) {
            Ok(v) => v,
            Err(PortExhausted) => {
                return drop_with(dump::DumpReason::PortExhausted, "private", dump_sink, pkt);
            }
        },
    };

    if let Some(entry) = public.port_map().and_then(|pm| pm.entry(public_tuple.port.as_u16())) {
        entry.touch(now_ms);
    }
    if let Some(tcp) = pkt.tcp_flags() {
        account_tcp_teardown(
            public.port_map(),
            public_tuple.port.as_u16(),
            tcp,
            TerminationDir::Pri2Pub,
        );
    }

    pkt.set_src_ip(public.addr());
    pkt.set_src_port(public_tuple.port.as_u16());
    recompute_checksums(pkt, flags, hw_tx_checksum_capable);

    let next_hop = if public.subnet().contains(pkt.dst_ip()) {
        Some(pkt.dst_ip())
    } else {
        public.default_next_hop()
    };
    match next_hop.and_then(|hop| public.arp().resolve(hop)) {
        Some(mac) => pkt.set_dst_mac(mac),
        None => return Decision::Drop,
    }
    pkt.set_src_mac(public.mac());
    Decision::Send
}

/// Translate and dispatch a packet arriving on the public side, public-to-private direction.
#[allow(clippy::too_many_arguments)]
pub fn translate_public_to_private<P: PacketHeaders>(
    pair: &PortPair,
    pkt: &mut P,
    now_ms: u64,
    flags: GlobalFlags,
    hw_tx_checksum_capable: bool,
    sideband_available: bool,
    dump_sink: &dyn dump::DumpSink,
) -> Decision {
    let private = pair.private();
    let public = pair.public();

    public.arp().learn(pkt.src_ip(), pkt.src_mac());

    let proto = match classify(pkt) {
        Ok(proto) => proto,
        Err(_) => return drop_with(dump::DumpReason::MalformedPacket, "public", dump_sink, pkt),
    };

    let key = match NatPort::for_protocol(proto, pkt.dst_port()) {
        Ok(port) => Tuple::new(pkt.dst_ip(), port),
        Err(_) => return drop_with(dump::DumpReason::MalformedPacket, "public", dump_sink, pkt),
    };

    if public.sideband_marks().is_marked(proto, key) {
        return Decision::Sideband;
    }

    let Some(private_tuple) = public.forward().lookup(proto, key) else {
        return if sideband_available && pkt.dst_mac_is(public.mac()) {
            Decision::Sideband
        } else {
            drop_with(dump::DumpReason::Unmapped, "public", dump_sink, pkt)
        };
    };

    if let Some(entry) = public.port_map().and_then(|pm| pm.entry(key.port.as_u16())) {
        entry.touch(now_ms);
    }
    if let Some(tcp) = pkt.tcp_flags() {
        account_tcp_teardown(public.port_map(), key.port.as_u16(), tcp, TerminationDir::Pub2Pri);
    }

    pkt.set_dst_ip(private_tuple.addr);
    pkt.set_dst_port(private_tuple.port.as_u16());
    recompute_checksums(pkt, flags, hw_tx_checksum_capable);

    let next_hop = if private.subnet().contains(pkt.dst_ip()) {
        Some(pkt.dst_ip())
    } else {
        private.default_next_hop()
    };
    match next_hop.and_then(|hop| private.arp().resolve(hop)) {
        Some(mac) => pkt.set_dst_mac(mac),
        None => return Decision::Drop,
    }
    pkt.set_src_mac(private.mac());
    Decision::Send
}

#[cfg(test)]
mod test {
    use super::{Decision, GlobalFlags, PacketHeaders, TcpFlags, translate_private_to_public, translate_public_to_private};
    use crate::dump::NullDumpSink;
    use crate::pair::{Port, PortKind, PortPair};
    use crate::portmap::PortMap;
    use net::Protocol;
    use net::eth::mac::Mac;
    use net::subnet::Subnet;
    use std::net::Ipv4Addr;

    #[derive(Debug, Clone)]
    struct TestPacket {
        proto: Option<Protocol>,
        fragment: bool,
        src_ip: Ipv4Addr,
        dst_ip: Ipv4Addr,
        src_port: u16,
        dst_port: u16,
        tcp: Option<TcpFlags>,
        src_mac: Mac,
        dst_mac: Mac,
    }

    impl PacketHeaders for TestPacket {
        fn protocol(&self) -> Option<Protocol> {
            self.proto
        }
        fn is_fragment_non_first(&self) -> bool {
            self.fragment
        }
        fn src_ip(&self) -> Ipv4Addr {
            self.src_ip
        }
        fn dst_ip(&self) -> Ipv4Addr {
            self.dst_ip
        }
        fn src_port(&self) -> u16 {
            self.src_port
        }
        fn dst_port(&self) -> u16 {
            self.dst_port
        }
        fn set_src_ip(&mut self, addr: Ipv4Addr) {
            self.src_ip = addr;
        }
        fn set_dst_ip(&mut self, addr: Ipv4Addr) {
            self.dst_ip = addr;
        }
        fn set_src_port(&mut self, port: u16) {
            self.src_port = port;
        }
        fn set_dst_port(&mut self, port: u16) {
            self.dst_port = port;
        }
        fn tcp_flags(&self) -> Option<TcpFlags> {
            self.tcp
        }
        fn src_mac(&self) -> Mac {
            self.src_mac
        }
        fn set_src_mac(&mut self, mac: Mac) {
            self.src_mac = mac;
        }
        fn set_dst_mac(&mut self, mac: Mac) {
            self.dst_mac = mac;
        }
        fn dst_mac_is(&self, mac: Mac) -> bool {
            self.dst_mac == mac
        }
        fn recompute_ipv4_checksum(&mut self) {}
        fn recompute_l4_checksum(&mut self) {}
        fn raw(&self) -> &[u8] {
            &[]
        }
    }

    fn build_pair() -> PortPair {
        let private = Port::new(
            0,
            Subnet::from_cidr(Ipv4Addr::new(10, 0, 0, 0), 24).unwrap(),
            0,
            None,
            Mac::from([0, 0, 0, 0, 0, 1]),
            PortKind::Private,
            None,
            None,
        );
        let public = Port::new(
            1,
            Subnet::host(Ipv4Addr::new(203, 0, 113, 5)),
            0,
            None,
            Mac::from([0, 0, 0, 0, 0, 2]),
            PortKind::Public,
            Some(PortMap::new(1024, 65535)),
            None,
        );
        PortPair::new(private, public, 1024)
    }

    #[test]
    fn outbound_tcp_syn_allocates_and_rewrites() {
        let pair = build_pair();
        let mut pkt = TestPacket {
            proto: Some(Protocol::Tcp),
            fragment: false,
            src_ip: Ipv4Addr::new(10, 0, 0, 7),
            dst_ip: Ipv4Addr::new(8, 8, 8, 8),
            src_port: 5555,
            dst_port: 80,
            tcp: Some(TcpFlags { fin: false, rst: false }),
            src_mac: Mac::from([0xaa; 6]),
            dst_mac: Mac::ZERO,
        };
        pair.public().arp().learn(Ipv4Addr::new(8, 8, 8, 8), Mac::from([0xbb; 6]));

        let decision = translate_private_to_public(
            &pair,
            &mut pkt,
            1_000,
            GlobalFlags::default(),
            false,
            &NullDumpSink,
        );

        assert_eq!(decision, Decision::Send);
        assert_eq!(pkt.src_ip, Ipv4Addr::new(203, 0, 113, 5));
        assert_eq!(pkt.src_port, 1024);
        assert_eq!(
            pair.public().port_map().unwrap().entry(1024).unwrap().private_addr(),
            Some(Ipv4Addr::new(10, 0, 0, 7))
        );
    }

    #[test]
    fn unsolicited_inbound_is_dropped_as_unmapped() {
        let pair = build_pair();
        let mut pkt = TestPacket {
            proto: Some(Protocol::Tcp),
            fragment: false,
            src_ip: Ipv4Addr::new(9, 9, 9, 9),
            dst_ip: Ipv4Addr::new(203, 0, 113, 5),
            src_port: 1234,
            dst_port: 4000,
            tcp: Some(TcpFlags { fin: false, rst: false }),
            src_mac: Mac::from([0xcc; 6]),
            dst_mac: Mac::from([0, 0, 0, 0, 0, 2]),
        };
        let decision = translate_public_to_private(
            &pair,
            &mut pkt,
            1_000,
            GlobalFlags::default(),
            false,
            false,
            &NullDumpSink,
        );
        assert_eq!(decision, Decision::Drop);
    }

    #[test]
    fn anti_spoofing_drops_out_of_subnet_source() {
        let pair = build_pair();
        let mut pkt = TestPacket {
            proto: Some(Protocol::Udp),
            fragment: false,
            src_ip: Ipv4Addr::new(172, 16, 0, 5),
            dst_ip: Ipv4Addr::new(8, 8, 8, 8),
            src_port: 53,
            dst_port: 53,
            tcp: None,
            src_mac: Mac::from([0xaa; 6]),
            dst_mac: Mac::ZERO,
        };
        let decision = translate_private_to_public(
            &pair,
            &mut pkt,
            1_000,
            GlobalFlags::default(),
            false,
            &NullDumpSink,
        );
        assert_eq!(decision, Decision::Drop);
    }

    #[test]
    fn static_sideband_rule_is_delivered_unmodified() {
        let pair = build_pair();
        let listen = crate::port::NatPort::new_port_checked(67).unwrap();
        let destination = crate::tuple::Tuple::new(Ipv4Addr::UNSPECIFIED, listen);
        pair.install_static_rule(Protocol::Udp, listen, destination, true);

        let mut pkt = TestPacket {
            proto: Some(Protocol::Udp),
            fragment: false,
            src_ip: Ipv4Addr::new(198, 51, 100, 9),
            dst_ip: Ipv4Addr::new(203, 0, 113, 5),
            src_port: 68,
            dst_port: 67,
            tcp: None,
            src_mac: Mac::from([0xdd; 6]),
            dst_mac: Mac::from([0, 0, 0, 0, 0, 2]),
        };
        let decision = translate_public_to_private(
            &pair,
            &mut pkt,
            1_000,
            GlobalFlags::default(),
            false,
            false,
            &NullDumpSink,
        );

        assert_eq!(decision, Decision::Sideband);
        // unmodified: the engine never rewrites a sideband-bound packet.
        assert_eq!(pkt.dst_ip, Ipv4Addr::new(203, 0, 113, 5));
        assert_eq!(pkt.dst_port, 67);
    }

    #[test]
    fn fragment_without_ports_is_malformed() {
        let pair = build_pair();
        let mut pkt = TestPacket {
            proto: Some(Protocol::Udp),
            fragment: true,
            src_ip: Ipv4Addr::new(10, 0, 0, 7),
            dst_ip: Ipv4Addr::new(8, 8, 8, 8),
            src_port: 53,
            dst_port: 53,
            tcp: None,
            src_mac: Mac::from([0xaa; 6]),
            dst_mac: Mac::ZERO,
        };
        let decision = translate_private_to_public(
            &pair,
            &mut pkt,
            1_000,
            GlobalFlags::default(),
            false,
            &NullDumpSink,
        );
        assert_eq!(decision, Decision::Drop);
    }
}
