// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Translation tables (C3): per-protocol concurrent forward maps and the ARP cache.

use crate::tuple::Tuple;
use dashmap::DashMap;
use net::Protocol;
use net::eth::mac::Mac;
use std::net::Ipv4Addr;

/// The three per-protocol forward maps owned by one [`crate::pair::Port`].
///
/// Lookups are wait-free reads; `dashmap` gives us single-writer-per-shard semantics, which is
/// enough to satisfy "single writer per key" without a global lock on the hot path.
#[derive(Debug, Default)]
pub struct ForwardMaps {
    icmp: DashMap<Tuple, Tuple>,
    tcp: DashMap<Tuple, Tuple>,
    udp: DashMap<Tuple, Tuple>,
}

impl ForwardMaps {
    /// Build empty forward maps.
    #[must_use]
    pub fn new() -> ForwardMaps {
        ForwardMaps::default()
    }

    fn map(&self, proto: Protocol) -> &DashMap<Tuple, Tuple> {
        match proto {
            Protocol::Icmp => &self.icmp,
            Protocol::Tcp => &self.tcp,
            Protocol::Udp => &self.udp,
        }
    }

    /// Wait-free lookup: constant-time, many concurrent readers.
    #[must_use]
    pub fn lookup(&self, proto: Protocol, key: Tuple) -> Option<Tuple> {
        self.map(proto).get(&key).map(|entry| *entry.value())
    }

    /// Insert `key -> value` into this table only (the caller is responsible for the symmetric
    /// insert on the opposite port, see [`crate::pair::PortPair::insert_pair`]).
    pub fn insert(&self, proto: Protocol, key: Tuple, value: Tuple) {
        self.map(proto).insert(key, value);
    }

    /// Erase `key -> value` from this table only, if that is indeed the current mapping.
    pub fn remove(&self, proto: Protocol, key: Tuple) {
        self.map(proto).remove(&key);
    }

    /// The number of live entries for `proto`, used for the active-entry gauge.
    #[must_use]
    pub fn len(&self, proto: Protocol) -> usize {
        self.map(proto).len()
    }

    /// Returns `true` iff `proto`'s table holds no entries.
    #[must_use]
    pub fn is_empty(&self, proto: Protocol) -> bool {
        self.map(proto).is_empty()
    }
}

/// Marks forward-map keys that are bound to local sideband delivery rather than rewrite-and-
/// forward. Populated only by a static rule installed with `to_sideband == true`; a public-side
/// forward-map hit alone isn't enough to tell the two apart, since a sideband rule still installs
/// a (trivial) public forward entry.
#[derive(Debug, Default)]
pub struct SidebandMarks {
    icmp: DashMap<Tuple, ()>,
    tcp: DashMap<Tuple, ()>,
    udp: DashMap<Tuple, ()>,
}

impl SidebandMarks {
    /// Build an empty set of marks.
    #[must_use]
    pub fn new() -> SidebandMarks {
        SidebandMarks::default()
    }

    fn map(&self, proto: Protocol) -> &DashMap<Tuple, ()> {
        match proto {
            Protocol::Icmp => &self.icmp,
            Protocol::Tcp => &self.tcp,
            Protocol::Udp => &self.udp,
        }
    }

    /// Mark `key` as sideband-bound for `proto`.
    pub fn mark(&self, proto: Protocol, key: Tuple) {
        self.map(proto).insert(key, ());
    }

    /// Whether `key` is marked sideband-bound for `proto`.
    #[must_use]
    pub fn is_marked(&self, proto: Protocol, key: Tuple) -> bool {
        self.map(proto).contains_key(&key)
    }
}

/// `map<u32, MacAddress>`, populated by observing source MAC/IP of received frames and consulted
/// when rewriting the destination MAC of outbound frames.
#[derive(Debug, Default)]
pub struct ArpTable(DashMap<Ipv4Addr, Mac>);

impl ArpTable {
    /// Build an empty ARP cache.
    #[must_use]
    pub fn new() -> ArpTable {
        ArpTable::default()
    }

    /// Record (or refresh) the MAC observed for `addr`.
    pub fn learn(&self, addr: Ipv4Addr, mac: Mac) {
        self.0.insert(addr, mac);
    }

    /// Resolve the MAC for `addr`. Readers tolerate a miss (the caller drops the packet).
    #[must_use]
    pub fn resolve(&self, addr: Ipv4Addr) -> Option<Mac> {
        self.0.get(&addr).map(|entry| *entry.value())
    }
}

#[cfg(test)]
mod test {
    use super::{ArpTable, ForwardMaps};
    use crate::port::NatPort;
    use crate::tuple::Tuple;
    use net::Protocol;
    use net::eth::mac::Mac;
    use std::net::Ipv4Addr;

    #[test]
    fn lookup_misses_on_empty_table() {
        let maps = ForwardMaps::new();
        let key = Tuple::new(Ipv4Addr::new(10, 0, 0, 1), NatPort::new_port_checked(80).unwrap());
        assert_eq!(maps.lookup(Protocol::Tcp, key), None);
    }

    #[test]
    fn insert_then_lookup_round_trips() {
        let maps = ForwardMaps::new();
        let k = Tuple::new(Ipv4Addr::new(10, 0, 0, 1), NatPort::new_port_checked(5555).unwrap());
        let v = Tuple::new(
            Ipv4Addr::new(203, 0, 113, 5),
            NatPort::new_port_checked(1024).unwrap(),
        );
        maps.insert(Protocol::Tcp, k, v);
        assert_eq!(maps.lookup(Protocol::Tcp, k), Some(v));
        assert_eq!(maps.lookup(Protocol::Udp, k), None);
    }

    #[test]
    fn arp_table_misses_until_learned() {
        let arp = ArpTable::new();
        let ip = Ipv4Addr::new(10, 0, 0, 1);
        assert_eq!(arp.resolve(ip), None);
        arp.learn(ip, Mac::from([0, 1, 2, 3, 4, 5]));
        assert_eq!(arp.resolve(ip), Some(Mac::from([0, 1, 2, 3, 4, 5])));
    }
}
