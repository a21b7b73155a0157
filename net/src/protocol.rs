// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Layer-4 protocol tag.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// The layer-4 protocols the NAT core understands.
///
/// Anything else observed on the wire (or named in a configuration document) is `UNKNOWN` and
/// dropped/rejected; it has no variant here by design.
#[cfg_attr(any(test, feature = "arbitrary"), derive(bolero::TypeGenerator))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Protocol {
    /// Internet Control Message Protocol.
    Icmp,
    /// Transmission Control Protocol.
    Tcp,
    /// User Datagram Protocol.
    Udp,
}

impl Protocol {
    /// All protocol tags, in the order the engine maintains their per-port tables.
    pub const ALL: [Protocol; 3] = [Protocol::Icmp, Protocol::Tcp, Protocol::Udp];

    /// The protocol's name as used in metric labels and config documents.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Icmp => "ICMP",
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
        }
    }
}

/// A protocol string outside `{TCP, UDP}` (or, where ICMP is accepted, `{TCP, UDP, ICMP}`).
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("unrecognized protocol: {0}")]
pub struct BadProtocol(pub String);

impl FromStr for Protocol {
    type Err = BadProtocol;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TCP" => Ok(Protocol::Tcp),
            "UDP" => Ok(Protocol::Udp),
            "ICMP" => Ok(Protocol::Icmp),
            _ => Err(BadProtocol(s.to_string())),
        }
    }
}

impl Display for Protocol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Protocol::Icmp => "ICMP",
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod test {
    use super::{BadProtocol, Protocol};

    #[test]
    fn parses_known_protocols_case_insensitively() {
        assert_eq!("tcp".parse::<Protocol>().unwrap(), Protocol::Tcp);
        assert_eq!("Udp".parse::<Protocol>().unwrap(), Protocol::Udp);
        assert_eq!("ICMP".parse::<Protocol>().unwrap(), Protocol::Icmp);
    }

    #[test]
    fn rejects_unknown_protocol_strings() {
        assert_eq!(
            "SCTP".parse::<Protocol>(),
            Err(BadProtocol("SCTP".to_string()))
        );
    }
}
