// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Maintenance (C7): periodic reclamation of idle or torn-down dynamic entries.
//!
//! Exposed as a type a host can `tick()` on its own schedule, or drive with [`Sweeper::run`] on a
//! dedicated thread; the core itself exposes no CLI and is driven entirely by the host binary.

use crate::clock::Clock;
use crate::metrics;
use crate::pair::PortPair;
use crate::portmap::CONNECTION_TIMEOUT_MS;
use crate::tuple::Tuple;
use concurrency::sync::Arc;
use net::Protocol;
use std::time::Duration;
use tracing::debug;

/// One sweep over a single pair's dynamic entries.
///
/// Reclaims any non-static entry that is either reclaimable by TCP teardown or idle past the
/// connection timeout. The sweep tolerates the forward map transiently lagging `last_used`: a
/// reader hitting a slot maintenance is mid-way through reclaiming still gets a usable answer.
pub fn sweep_pair(pair: &PortPair, label: &str, now_ms: u64) {
    let public = pair.public();
    let private = pair.private();
    let Some(port_map) = public.port_map() else { return };

    for proto in Protocol::ALL {
        let mut reclaimed = 0u64;
        for (port, entry) in port_map.iter() {
            if entry.is_static() || entry.private_addr().is_none() {
                continue;
            }
            let idle = now_ms.saturating_sub(entry.last_used()) >= CONNECTION_TIMEOUT_MS;
            if !(entry.reclaimable_by_teardown() || idle) {
                continue;
            }
            let Some(inner_addr) = entry.private_addr() else { continue };
            let public_tuple = Tuple::new(public.addr(), match_port(proto, port));
            if let Some(private_half) = public.forward().lookup(proto, public_tuple) {
                public.forward().remove(proto, public_tuple);
                private.forward().remove(proto, private_half);
            }
            entry.release();
            reclaimed += 1;
            debug!(pair = label, proto = ?proto, port, "reclaimed dynamic entry");
        }
        if reclaimed > 0 {
            metrics::record_reclaimed(label, proto.as_str(), reclaimed);
        }
        metrics::set_active_entries(label, proto.as_str(), port_map.iter().filter(|(_, e)| e.private_addr().is_some()).count());
    }
}

fn match_port(proto: Protocol, raw: u16) -> crate::port::NatPort {
    crate::port::NatPort::for_protocol(proto, raw)
        .unwrap_or_else(|_| crate::port::NatPort::new_identifier(raw))
}

/// Drives [`sweep_pair`] on a fixed interval for a fixed set of pairs, until stopped.
pub struct Sweeper {
    pairs: Vec<(String, Arc<PortPair>)>,
    clock: Arc<dyn Clock>,
    interval: Duration,
}

impl Sweeper {
    /// Build a sweeper over `pairs`, each labeled for metrics/logging, firing every `interval`.
    #[must_use]
    pub fn new(pairs: Vec<(String, Arc<PortPair>)>, clock: Arc<dyn Clock>, interval: Duration) -> Sweeper {
        Sweeper { pairs, clock, interval }
    }

    /// Run one sweep across all pairs. A host can call this from its own scheduler.
    pub fn tick(&self) {
        let now_ms = self.clock.now_ms();
        for (label, pair) in &self.pairs {
            sweep_pair(pair, label, now_ms);
        }
    }

    /// Block the current thread, ticking every `interval` until the process exits. Intended to be
    /// spawned on a dedicated maintenance thread by the host.
    pub fn run(&self) -> ! {
        loop {
            self.tick();
            std::thread::sleep(self.interval);
        }
    }
}

#[cfg(test)]
mod test {
    use super::sweep_pair;
    use crate::pair::{Port, PortKind, PortPair};
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
    fn sweep_reclaims_idle_dynamic_entry() {
        let pair = build_pair();
        let key = Tuple::new(Ipv4Addr::new(10, 0, 0, 7), NatPort::new_port_checked(5555).unwrap());
        pair.allocate_public_port(Protocol::Tcp, key, 0).unwrap();

        sweep_pair(&pair, "test", 60_000);
        assert_eq!(pair.private().forward().lookup(Protocol::Tcp, key), None);
        assert_eq!(pair.public().port_map().unwrap().entry(1024).unwrap().private_addr(), None);
    }

    #[test]
    fn sweep_preserves_static_entries() {
        let pair = build_pair();
        let listen = NatPort::new_port_checked(22).unwrap();
        let destination = Tuple::new(Ipv4Addr::new(10, 0, 0, 9), listen);
        pair.install_static_rule(Protocol::Tcp, listen, destination, false);

        sweep_pair(&pair, "test", 1_000_000);

        let public_key = Tuple::new(Ipv4Addr::new(203, 0, 113, 5), listen);
        assert_eq!(pair.public().forward().lookup(Protocol::Tcp, public_key), Some(destination));
    }

    #[test]
    fn sweep_spares_recently_active_entries() {
        let pair = build_pair();
        let key = Tuple::new(Ipv4Addr::new(10, 0, 0, 7), NatPort::new_port_checked(5555).unwrap());
        pair.allocate_public_port(Protocol::Tcp, key, 59_000).unwrap();

        sweep_pair(&pair, "test", 60_000);
        assert_eq!(pair.private().forward().lookup(Protocol::Tcp, key), Some(Tuple::new(
            Ipv4Addr::new(203, 0, 113, 5),
            NatPort::new_port_checked(1024).unwrap(),
        )));
    }
}
