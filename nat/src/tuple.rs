// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The forward-map key/value type: one half of a 5-tuple, within a single protocol's table.

use crate::port::NatPort;
use std::fmt::{Display, Formatter};
use std::net::Ipv4Addr;

/// `{addr, port}`, indexed separately per protocol so the stored key need not carry a protocol
/// tag of its own.
#[cfg_attr(test, derive(bolero::TypeGenerator))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tuple {
    /// The IPv4 address half of the tuple.
    pub addr: Ipv4Addr,
    /// The port (or, for ICMP, Identifier) half of the tuple.
    pub port: NatPort,
}

impl Tuple {
    /// Build a [`Tuple`].
    #[must_use]
    pub fn new(addr: Ipv4Addr, port: NatPort) -> Tuple {
        Tuple { addr, port }
    }
}

impl Display for Tuple {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.addr, self.port.as_u16())
    }
}
