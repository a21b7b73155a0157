// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The validated, normalized shape the validator produces: one step closer to what `pipeline`
//! needs to build live [`nat`](https://docs.rs/natpair-nat) tables from, but still inert data —
//! this crate never constructs runtime state itself.

use net::Protocol;
use net::Subnet;
use std::net::Ipv4Addr;

/// Which side of a pair a [`ValidatedPort`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortSide {
    /// The inward-facing, NATed side.
    Private,
    /// The outward-facing, shared-address side.
    Public,
}

/// A single validated, normalized forwarding rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedFwdRule {
    /// The port this rule listens on.
    pub listen_port: u16,
    /// The destination address. `Ipv4Addr::UNSPECIFIED` means "deliver to the local sideband".
    pub destination_addr: Ipv4Addr,
    /// The destination port; zero in the document is normalized to `listen_port` here.
    pub destination_port: u16,
    /// The rule's protocol.
    pub protocol: Protocol,
    /// Set when `destination_addr` is `Ipv4Addr::UNSPECIFIED`.
    pub to_sideband: bool,
}

/// A validated, normalized port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedPort {
    /// This port's index, as configured.
    pub index: u16,
    /// The subnet this port faces.
    pub subnet: Subnet,
    /// 0 if untagged.
    pub vlan: u16,
    /// The sideband device name, if one is configured on this port.
    pub sideband_name: Option<String>,
    /// Private or public.
    pub kind: PortSide,
    /// This port's validated forwarding rules.
    pub forward_rules: Vec<ValidatedFwdRule>,
}

/// A validated pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedPortPair {
    /// The inward-facing side.
    pub private: ValidatedPort,
    /// The outward-facing side.
    pub public: ValidatedPort,
}

/// The fully validated configuration document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedConfig {
    /// The validated pairs, in document order.
    pub pairs: Vec<ValidatedPortPair>,
    /// Set if any rule, anywhere, is sideband-bound; read once at startup to decide whether the
    /// host must wire sideband devices at all.
    pub needs_sideband: bool,
}
