// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Type for configuration / validation failures. Any result returned by the validator in this
//! crate is a `ConfigError`.

use net::protocol::BadProtocol;
use net::subnet::SubnetError;
use thiserror::Error;

/// The reasons a configuration document may be rejected.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// A `subnet` field was not a valid bare IPv4 address or CIDR block.
    #[error("invalid subnet: {0}")]
    InvalidSubnet(#[from] SubnetError),
    /// A `destination` field was not a valid `host[:port]` string.
    #[error("invalid destination: {0}")]
    InvalidDestination(String),
    /// A `protocol` field named something other than `TCP`/`UDP`.
    #[error(transparent)]
    BadProtocol(#[from] BadProtocol),
    /// Exactly one side of a pair carried a nonzero `vlan-tag` (violates I3).
    #[error("VLAN asymmetry in pair: private vlan={0}, public vlan={1}")]
    VlanAsymmetry(u16, u16),
    /// A non-sideband forwarding rule was configured on the private side; only sideband-bound
    /// rules are legal there (inbound private-side connections are never statically forwarded).
    #[error("private-side forwarding rule on port {0} must be sideband-bound")]
    PrivateSideNonSidebandRule(u16),
    /// A sideband-bound rule omitted `kni-name`, or named a port's sideband explicitly blank.
    #[error("sideband-bound rule on port {0} requires a non-empty sideband name")]
    MissingSidebandName(u16),
    /// A sideband-bound rule's destination port did not equal its `listen_port`.
    #[error("sideband-bound rule on port {listen_port} must target itself, got port {got}")]
    SidebandPortMismatch {
        /// The rule's `listen_port`.
        listen_port: u16,
        /// The destination port actually given.
        got: u16,
    },
    /// A public forwarding rule's destination address fell outside the private subnet (I4).
    #[error("forwarding rule on public port {listen_port} targets {destination}, outside subnet {subnet}")]
    DestinationOutsideSubnet {
        /// The rule's `listen_port`.
        listen_port: u16,
        /// The offending destination address.
        destination: std::net::Ipv4Addr,
        /// The opposite port's subnet the destination should have fallen within.
        subnet: net::Subnet,
    },
}
