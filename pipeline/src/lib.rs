// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Pipeline wiring: the Dataplane Runtime contract ([`runtime`]) and the wiring logic
//! ([`wiring`]) that turns a validated configuration into a live graph of Rx/Splitter/Tx stages
//! per port pair, with the NAT engine as the splitter's classifier.

#![deny(
    unsafe_code,
    missing_docs,
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic
)]

pub mod runtime;
pub mod wiring;

pub use runtime::{ClassifyFn, DataplaneRuntime, FlowHandle, RuntimeFatal, SidebandHandle};
pub use wiring::{WiredPair, wire_pair};

#[cfg(test)]
mod test {
    use super::runtime::{ClassifyFn, DataplaneRuntime, FlowHandle, RuntimeFatal, SidebandHandle};
    use super::wiring::wire_pair;
    use config::validated::{PortSide, ValidatedFwdRule, ValidatedPort, ValidatedPortPair};
    use nat::dump::NullDumpSink;
    use nat::engine::GlobalFlags;
    use net::Protocol;
    use net::eth::mac::Mac;
    use net::subnet::Subnet;
    use std::net::Ipv4Addr;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct FakeRuntime {
        next_flow: Mutex<u64>,
        splits: Mutex<Vec<(u16, usize)>>,
        merges: Mutex<usize>,
    }

    impl FakeRuntime {
        fn alloc(&self) -> FlowHandle {
            let mut next = self.next_flow.lock().unwrap();
            let handle = FlowHandle(*next);
            *next += 1;
            handle
        }
    }

    impl DataplaneRuntime for FakeRuntime {
        fn rx(&self, _port_index: u16) -> Result<FlowHandle, RuntimeFatal> {
            Ok(self.alloc())
        }
        fn tx(&self, _flow: FlowHandle, _port_index: u16) -> Result<(), RuntimeFatal> {
            Ok(())
        }
        fn tx_sideband(&self, _flow: FlowHandle, _sideband: SidebandHandle) -> Result<(), RuntimeFatal> {
            Ok(())
        }
        fn splitter(
            &self,
            _flow: FlowHandle,
            _classify: ClassifyFn,
            n_outputs: usize,
            ctx: u16,
        ) -> Result<Vec<FlowHandle>, RuntimeFatal> {
            self.splits.lock().unwrap().push((ctx, n_outputs));
            Ok((0..n_outputs).map(|_| self.alloc()).collect())
        }
        fn merger(&self, _a: FlowHandle, _b: FlowHandle) -> Result<FlowHandle, RuntimeFatal> {
            *self.merges.lock().unwrap() += 1;
            Ok(self.alloc())
        }
        fn create_sideband(&self, _port_index: u16, _name: &str) -> Result<SidebandHandle, RuntimeFatal> {
            Ok(SidebandHandle(0))
        }
        fn rx_sideband(&self, _sideband: SidebandHandle) -> Result<FlowHandle, RuntimeFatal> {
            Ok(self.alloc())
        }
        fn mac_of(&self, port_index: u16) -> Result<Mac, RuntimeFatal> {
            Ok(Mac::from([0, 0, 0, 0, 0, port_index as u8]))
        }
        fn hw_tx_checksum_capable(&self, _ports: &[u16]) -> bool {
            false
        }
    }

    fn validated_pair(with_sideband: bool) -> ValidatedPortPair {
        let private = ValidatedPort {
            index: 0,
            subnet: Subnet::from_cidr(Ipv4Addr::new(10, 0, 0, 0), 24).unwrap(),
            vlan: 0,
            sideband_name: None,
            kind: PortSide::Private,
            forward_rules: vec![],
        };
        let mut public = ValidatedPort {
            index: 1,
            subnet: Subnet::host(Ipv4Addr::new(203, 0, 113, 5)),
            vlan: 0,
            sideband_name: None,
            kind: PortSide::Public,
            forward_rules: vec![ValidatedFwdRule {
                listen_port: 22,
                destination_addr: Ipv4Addr::new(10, 0, 0, 9),
                destination_port: 22,
                protocol: Protocol::Tcp,
                to_sideband: false,
            }],
        };
        if with_sideband {
            public.sideband_name = Some("kni0".to_string());
            public.forward_rules.push(ValidatedFwdRule {
                listen_port: 53,
                destination_addr: Ipv4Addr::UNSPECIFIED,
                destination_port: 53,
                protocol: Protocol::Udp,
                to_sideband: true,
            });
        }
        ValidatedPortPair { private, public }
    }

    #[test]
    fn wires_a_pair_without_sideband() {
        let runtime = FakeRuntime::default();
        let validated = validated_pair(false);
        let wired = wire_pair(
            &runtime,
            0,
            &validated,
            GlobalFlags::default(),
            Arc::new(nat::clock::SystemClock),
            Arc::new(NullDumpSink),
        )
        .expect("should wire");

        assert_eq!(wired.label, "0/1");
        let splits = runtime.splits.lock().unwrap();
        assert_eq!(splits.len(), 2);
        assert!(splits.iter().all(|&(ctx, n)| ctx == 0 && n == 2));

        let public_key = nat::Tuple::new(
            Ipv4Addr::new(203, 0, 113, 5),
            nat::NatPort::new_port_checked(22).unwrap(),
        );
        assert_eq!(
            wired.pair.public().forward().lookup(Protocol::Tcp, public_key),
            Some(nat::Tuple::new(
                Ipv4Addr::new(10, 0, 0, 9),
                nat::NatPort::new_port_checked(22).unwrap()
            ))
        );
    }

    #[test]
    fn wires_a_pair_with_sideband_on_the_public_side() {
        let runtime = FakeRuntime::default();
        let validated = validated_pair(true);
        let wired = wire_pair(
            &runtime,
            3,
            &validated,
            GlobalFlags::default(),
            Arc::new(nat::clock::SystemClock),
            Arc::new(NullDumpSink),
        )
        .expect("should wire");

        let splits = runtime.splits.lock().unwrap();
        // private->public direction still has no sideband leg (2 outputs); public->private does (3).
        assert!(splits.contains(&(3, 2)));
        assert!(splits.contains(&(3, 3)));
        assert_eq!(*runtime.merges.lock().unwrap(), 1);
    }
}
