// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The raw, as-parsed configuration document shape. A host's Config Loader (out of scope) is
//! expected to hand this crate an already-deserialized [`Config`]; this crate performs no file
//! I/O of its own.

use serde::Deserialize;

/// `Config := { port-pairs: [ PortPair, ... ] }`
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// The ordered list of port-pair descriptors.
    #[serde(rename = "port-pairs")]
    pub port_pairs: Vec<PortPairSpec>,
}

/// `PortPair := { private-port: PortSpec, public-port: PortSpec }`
#[derive(Debug, Clone, Deserialize)]
pub struct PortPairSpec {
    /// The inward-facing side.
    #[serde(rename = "private-port")]
    pub private_port: PortSpec,
    /// The outward-facing, shared-address side.
    #[serde(rename = "public-port")]
    pub public_port: PortSpec,
}

/// `PortSpec := { index, subnet, vlan-tag?, kni-name?, forward-ports?: [FwdSpec] }`
#[derive(Debug, Clone, Deserialize)]
pub struct PortSpec {
    /// The port's index on the runtime.
    pub index: u16,
    /// A bare IPv4 address (implicit `/32`) or CIDR block (`A.B.C.D/N`).
    pub subnet: String,
    /// 0 means untagged.
    #[serde(rename = "vlan-tag", default)]
    pub vlan_tag: u16,
    /// The sideband device name, if this port has one.
    #[serde(rename = "kni-name", default)]
    pub kni_name: Option<String>,
    /// Static forwarding rules bound to this port.
    #[serde(rename = "forward-ports", default)]
    pub forward_ports: Vec<FwdSpec>,
}

/// `FwdSpec := { port, destination: "A.B.C.D:P", protocol: "TCP"|"UDP" }`
#[derive(Debug, Clone, Deserialize)]
pub struct FwdSpec {
    /// The port this rule listens on.
    pub port: u16,
    /// `host:port`; port may be omitted (interpreted as 0, meaning "same as `port`").
    pub destination: String,
    /// `"TCP"` or `"UDP"`; anything else is rejected with [`crate::errors::ConfigError::BadProtocol`].
    pub protocol: String,
}
