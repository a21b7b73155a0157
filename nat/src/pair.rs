// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! `Port` and `PortPair`: the runtime state owned by one (private, public) port duo.

use crate::port::NatPort;
use crate::portmap::{PortExhausted, PortMap};
use crate::tables::{ArpTable, ForwardMaps, SidebandMarks};
use crate::tuple::Tuple;
use concurrency::sync::Mutex;
use net::Protocol;
use net::eth::mac::Mac;
use net::subnet::Subnet;
use std::net::Ipv4Addr;

/// Which side of a pair a [`Port`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortKind {
    /// The inward-facing, NATed side.
    Private,
    /// The outward-facing, shared-address side.
    Public,
}

/// One side of a pair: private or public. Owns its forward maps, ARP cache, and (public side
/// only) its port map.
#[derive(Debug)]
pub struct Port {
    index: u16,
    subnet: Subnet,
    vlan: u16,
    sideband_name: Option<String>,
    mac: Mac,
    kind: PortKind,
    forward: ForwardMaps,
    arp: ArpTable,
    port_map: Option<PortMap>,
    default_next_hop: Option<Ipv4Addr>,
    sideband_marks: SidebandMarks,
}

impl Port {
    /// Build a [`Port`]. `port_map` should be `Some` only for [`PortKind::Public`].
    ///
    /// `default_next_hop` is the gateway used when a rewritten packet's destination falls
    /// outside this port's subnet. See DESIGN.md.
    #[must_use]
    pub fn new(
        index: u16,
        subnet: Subnet,
        vlan: u16,
        sideband_name: Option<String>,
        mac: Mac,
        kind: PortKind,
        port_map: Option<PortMap>,
        default_next_hop: Option<Ipv4Addr>,
    ) -> Port {
        Port {
            index,
            subnet,
            vlan,
            sideband_name,
            mac,
            kind,
            forward: ForwardMaps::new(),
            arp: ArpTable::new(),
            port_map,
            default_next_hop,
            sideband_marks: SidebandMarks::new(),
        }
    }

    /// This port's index, as configured.
    #[must_use]
    pub fn index(&self) -> u16 {
        self.index
    }

    /// The subnet this port faces.
    #[must_use]
    pub fn subnet(&self) -> Subnet {
        self.subnet
    }

    /// This port's own address: the network address of its configured subnet (for the public
    /// side, the shared NAT address; for the private side, normally unused for rewriting).
    #[must_use]
    pub fn addr(&self) -> Ipv4Addr {
        self.subnet.addr()
    }

    /// 0 if untagged.
    #[must_use]
    pub fn vlan(&self) -> u16 {
        self.vlan
    }

    /// The sideband device name, if one is configured on this port.
    #[must_use]
    pub fn sideband_name(&self) -> Option<&str> {
        self.sideband_name.as_deref()
    }

    /// This port's own MAC address.
    #[must_use]
    pub fn mac(&self) -> Mac {
        self.mac
    }

    /// Private or public.
    #[must_use]
    pub fn kind(&self) -> PortKind {
        self.kind
    }

    /// This port's forward maps.
    #[must_use]
    pub fn forward(&self) -> &ForwardMaps {
        &self.forward
    }

    /// This port's ARP cache.
    #[must_use]
    pub fn arp(&self) -> &ArpTable {
        &self.arp
    }

    /// Forward-map keys on this port that are bound to local sideband delivery rather than
    /// rewrite-and-forward.
    #[must_use]
    pub fn sideband_marks(&self) -> &SidebandMarks {
        &self.sideband_marks
    }

    /// This port's port map, if one was installed (only expected on the public side).
    #[must_use]
    pub fn port_map(&self) -> Option<&PortMap> {
        self.port_map.as_ref()
    }

    /// The gateway to ARP-resolve against when a packet's destination falls outside this port's
    /// subnet.
    #[must_use]
    pub fn default_next_hop(&self) -> Option<Ipv4Addr> {
        self.default_next_hop
    }
}

/// Per-protocol allocator scan cursors, guarded by [`PortPair`]'s mutex alongside allocation
/// itself.
#[derive(Debug, Default, Clone, Copy)]
struct LastPorts {
    icmp: u16,
    tcp: u16,
    udp: u16,
}

impl LastPorts {
    fn get(&self, proto: Protocol) -> u16 {
        match proto {
            Protocol::Icmp => self.icmp,
            Protocol::Tcp => self.tcp,
            Protocol::Udp => self.udp,
        }
    }

    fn set(&mut self, proto: Protocol, value: u16) {
        match proto {
            Protocol::Icmp => self.icmp = value,
            Protocol::Tcp => self.tcp = value,
            Protocol::Udp => self.udp = value,
        }
    }
}

/// A (private, public) port duo sharing translation state and a single egress public address.
///
/// Allocation uses one scan cursor per protocol rather than a single shared one: each protocol
/// owns an independent dense port-map array, so a single cursor would make "resume scanning
/// where the last allocation left off" meaningless across protocols. See DESIGN.md.
#[derive(Debug)]
pub struct PortPair {
    private: Port,
    public: Port,
    alloc_state: Mutex<LastPorts>,
}

impl PortPair {
    /// Build a pair. `last_port_start` seeds every protocol's scan cursor (normally `portStart`).
    #[must_use]
    pub fn new(private: Port, public: Port, last_port_start: u16) -> PortPair {
        let seed = LastPorts {
            icmp: last_port_start,
            tcp: last_port_start,
            udp: last_port_start,
        };
        PortPair {
            private,
            public,
            alloc_state: Mutex::new(seed),
        }
    }

    /// The private-side port.
    #[must_use]
    pub fn private(&self) -> &Port {
        &self.private
    }

    /// The public-side port.
    #[must_use]
    pub fn public(&self) -> &Port {
        &self.public
    }

    /// The port named by `kind`.
    #[must_use]
    pub fn side(&self, kind: PortKind) -> &Port {
        match kind {
            PortKind::Private => &self.private,
            PortKind::Public => &self.public,
        }
    }

    /// The port opposite `kind`.
    #[must_use]
    pub fn opposite(&self, kind: PortKind) -> &Port {
        match kind {
            PortKind::Private => &self.public,
            PortKind::Public => &self.private,
        }
    }

    /// Allocate a fresh public port for `proto`, claim its port-map slot, and install the
    /// symmetric forward-map entries as one operation under the pair mutex. `private_key` is the
    /// private-side 5-tuple half that triggered the allocation.
    ///
    /// Caller must not hold `alloc_state` already; this takes the pair mutex internally.
    ///
    /// # Errors
    ///
    /// Returns [`PortExhausted`] if no slot is reusable within a full sweep.
    #[allow(clippy::significant_drop_tightening)]
    pub fn allocate_public_port(
        &self,
        proto: Protocol,
        private_key: Tuple,
        now_ms: u64,
    ) -> Result<Tuple, PortExhausted> {
        let port_map = self
            .public
            .port_map()
            .expect("public port always carries a port map");
        let mut state = self.alloc_state.lock().unwrap_or_else(|poison| poison.into_inner());
        let hint = state.get(proto);
        let (port, next_hint) = port_map.allocate(hint, now_ms, private_key.addr)?;
        state.set(proto, next_hint);
        drop(state);

        let nat_port = NatPort::for_protocol(proto, port)
            .unwrap_or_else(|_| unreachable!("allocator only returns non-zero L4 ports"));
        let public_tuple = Tuple::new(self.public.addr(), nat_port);

        self.private.forward.insert(proto, private_key, public_tuple);
        self.public.forward.insert(proto, public_tuple, private_key);
        Ok(public_tuple)
    }

    /// Install a static forwarding-rule reservation at startup: marks the public port-map slot
    /// static and pre-populates both forward maps (I1, I2), unless `sideband` is set, in which
    /// case only the public-side entry is created and marked for sideband delivery (sideband-bound
    /// rules are exempt from I1 and never rewritten by the engine).
    pub fn install_static_rule(
        &self,
        proto: Protocol,
        listen_port: NatPort,
        destination: Tuple,
        sideband: bool,
    ) {
        if let Some(port_map) = self.public.port_map() {
            if let Some(entry) = port_map.entry(listen_port.as_u16()) {
                entry.install_static(destination.addr);
            }
        }
        let public_key = Tuple::new(self.public.addr(), listen_port);
        self.public.forward.insert(proto, public_key, destination);
        if sideband {
            self.public.sideband_marks.mark(proto, public_key);
        } else {
            self.private.forward.insert(proto, destination, public_key);
        }
    }
}

#[cfg(test)]
mod test {
    use super::{Port, PortKind, PortPair};
    use crate::port::NatPort;
    use crate::portmap::PortMap;
    use crate::tuple::Tuple;
    use net::Protocol;
    use net::eth::mac::Mac;
    use net::subnet::Subnet;
    use std::net::Ipv4Addr;

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
    fn allocate_public_port_installs_symmetric_entries() {
        let pair = build_pair();
        let key = Tuple::new(Ipv4Addr::new(10, 0, 0, 7), NatPort::new_port_checked(5555).unwrap());
        let public_tuple = pair.allocate_public_port(Protocol::Tcp, key, 1_000).unwrap();
        assert_eq!(public_tuple.addr, Ipv4Addr::new(203, 0, 113, 5));
        assert_eq!(pair.private().forward().lookup(Protocol::Tcp, key), Some(public_tuple));
        assert_eq!(
            pair.public().forward().lookup(Protocol::Tcp, public_tuple),
            Some(key)
        );
    }

    #[test]
    fn install_static_rule_skips_private_entry_for_sideband() {
        let pair = build_pair();
        let listen = NatPort::new_port_checked(67).unwrap();
        let destination = Tuple::new(Ipv4Addr::UNSPECIFIED, NatPort::new_port_checked(67).unwrap());
        pair.install_static_rule(Protocol::Udp, listen, destination, true);
        let public_key = Tuple::new(Ipv4Addr::new(203, 0, 113, 5), listen);
        assert_eq!(pair.public().forward().lookup(Protocol::Udp, public_key), Some(destination));
        assert_eq!(pair.private().forward().lookup(Protocol::Udp, destination), None);
        assert!(pair.public().sideband_marks().is_marked(Protocol::Udp, public_key));
    }

    #[test]
    fn install_static_rule_leaves_non_sideband_rules_unmarked() {
        let pair = build_pair();
        let listen = NatPort::new_port_checked(22).unwrap();
        let destination = Tuple::new(Ipv4Addr::new(10, 0, 0, 9), listen);
        pair.install_static_rule(Protocol::Tcp, listen, destination, false);
        let public_key = Tuple::new(Ipv4Addr::new(203, 0, 113, 5), listen);
        assert!(!pair.public().sideband_marks().is_marked(Protocol::Tcp, public_key));
    }
}
