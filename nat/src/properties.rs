// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Property tests for port-allocation uniqueness, reuse-after-release, and teardown invariants.

#![cfg(test)]

use crate::pair::{Port, PortKind, PortPair};
use crate::port::NatPort;
use crate::portmap::PortMap;
use crate::tuple::Tuple;
use net::Protocol;
use net::eth::mac::Mac;
use net::subnet::Subnet;
use std::collections::HashSet;
use std::net::Ipv4Addr;

fn build_pair() -> PortPair {
    let private = Port::new(
        0,
        Subnet::from_cidr(Ipv4Addr::new(10, 0, 0, 0), 16).unwrap(),
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
        Some(PortMap::new(1024, 1024 + 63)),
        None,
    );
    PortPair::new(private, public, 1024)
}

/// P1: every non-sideband `(k, v)` stored on the public side has a symmetric `(v, k)` on the
/// private side, and vice versa, after any sequence of allocations.
#[test]
fn p1_symmetric_maps_hold_after_random_allocations() {
    bolero::check!()
        .with_type::<Vec<(u8, u16)>>()
        .for_each(|ops: &Vec<(u8, u16)>| {
            let pair = build_pair();
            for &(addr_low, port_raw) in ops {
                let Some(port) = std::num::NonZero::new(port_raw) else { continue };
                let key = Tuple::new(
                    Ipv4Addr::new(10, 0, addr_low, 1),
                    NatPort::new_port(port),
                );
                if pair.private().forward().lookup(Protocol::Tcp, key).is_some() {
                    continue;
                }
                let _ = pair.allocate_public_port(Protocol::Tcp, key, 0);
            }
            for proto in Protocol::ALL {
                for (port, entry) in pair.public().port_map().unwrap().iter() {
                    let Some(inner) = entry.private_addr() else { continue };
                    let public_tuple = Tuple::new(
                        pair.public().addr(),
                        NatPort::for_protocol(proto, port).unwrap(),
                    );
                    if let Some(private_half) = pair.public().forward().lookup(proto, public_tuple) {
                        assert_eq!(private_half.addr, inner);
                        assert_eq!(
                            pair.private().forward().lookup(proto, private_half),
                            Some(public_tuple)
                        );
                    }
                }
            }
        });
}

/// P2: at any instant, no two distinct dynamic mappings claim the same (protocol, port) slot —
/// each allocation call returns a port no earlier call is still holding.
#[test]
fn p2_allocator_never_double_allocates_a_live_port() {
    let pair = build_pair();
    let mut claimed = HashSet::new();
    for i in 0..64u8 {
        let key = Tuple::new(
            Ipv4Addr::new(10, 0, 0, i),
            NatPort::new_port(std::num::NonZero::new(20_000 + u16::from(i)).unwrap()),
        );
        if let Ok(public_tuple) = pair.allocate_public_port(Protocol::Tcp, key, 0) {
            assert!(
                claimed.insert(public_tuple.port.as_u16()),
                "port {} allocated twice while still live",
                public_tuple.port.as_u16()
            );
        }
    }
}

/// P3: a port freed at time `t` is not handed out again before `t + 1s`.
#[test]
fn p3_reuse_quarantine_blocks_early_reallocation() {
    let map = PortMap::new(1024, 1024);
    let first = map.allocate(1024, 0, Ipv4Addr::new(10, 0, 0, 1)).unwrap();
    assert_eq!(first.0, 1024);
    map.entry(1024).unwrap().release();
    assert!(map.allocate(1024, 999, Ipv4Addr::new(10, 0, 0, 2)).is_err());
    assert!(map.allocate(1024, 1_000, Ipv4Addr::new(10, 0, 0, 2)).is_ok());
}

/// P5: a static entry is never returned by the allocator, regardless of how long it has been
/// idle.
#[test]
fn p5_static_entries_are_never_reallocated() {
    let pair = build_pair();
    let listen = NatPort::new_port_checked(1024).unwrap();
    let destination = Tuple::new(Ipv4Addr::new(10, 0, 0, 9), listen);
    pair.install_static_rule(Protocol::Tcp, listen, destination, false);

    for i in 0..70u8 {
        let key = Tuple::new(
            Ipv4Addr::new(10, 0, 1, i),
            NatPort::new_port(std::num::NonZero::new(30_000 + u16::from(i)).unwrap()),
        );
        let _ = pair.allocate_public_port(Protocol::Tcp, key, 10_000_000);
    }

    assert_eq!(
        pair.public().port_map().unwrap().entry(1024).unwrap().private_addr(),
        Some(Ipv4Addr::new(10, 0, 0, 9))
    );
}
