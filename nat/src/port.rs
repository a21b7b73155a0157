// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! NAT port: a type to represent the "port" half of a [`crate::tuple::Tuple`], covering both
//! TCP/UDP ports and the ICMP Identifier field, which the engine treats as a port for table
//! purposes.

use net::tcp::port::{TcpPort, TcpPortError};
use net::udp::port::{UdpPort, UdpPortError};
use std::num::NonZero;

/// A port could not be represented as a [`NatPort`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum NatPortError {
    /// TCP/UDP port zero has no on-wire representation.
    #[error("invalid port ({0})")]
    InvalidPort(u16),
}

/// `NatPort` represents either an L4 port (TCP/UDP, which must be non-zero) or an ICMP
/// Identifier (which may legally be zero).
#[cfg_attr(test, derive(bolero::TypeGenerator))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NatPort {
    /// A TCP or UDP port.
    Port(NonZero<u16>),
    /// An ICMP Echo/Echo-Reply Identifier, used as the port for ICMP table entries.
    Identifier(u16),
}

impl NatPort {
    /// Build a [`NatPort::Port`].
    #[must_use]
    pub fn new_port(port: NonZero<u16>) -> NatPort {
        NatPort::Port(port)
    }

    /// Build a [`NatPort::Port`], rejecting zero.
    ///
    /// # Errors
    ///
    /// Returns [`NatPortError::InvalidPort`] if `port == 0`.
    pub fn new_port_checked(port: u16) -> Result<NatPort, NatPortError> {
        NonZero::new(port).map_or(Err(NatPortError::InvalidPort(port)), |port| {
            Ok(NatPort::Port(port))
        })
    }

    /// Build a [`NatPort::Identifier`] (ICMP). Zero is a legal identifier value.
    #[must_use]
    pub fn new_identifier(identifier: u16) -> NatPort {
        NatPort::Identifier(identifier)
    }

    /// Build a [`NatPort`] appropriate to `proto`: an ICMP Identifier for [`net::Protocol::Icmp`]
    /// (zero allowed), otherwise a TCP/UDP port (zero rejected).
    ///
    /// # Errors
    ///
    /// Returns [`NatPortError::InvalidPort`] if `proto` is TCP/UDP and `raw == 0`.
    pub fn for_protocol(proto: net::Protocol, raw: u16) -> Result<NatPort, NatPortError> {
        match proto {
            net::Protocol::Icmp => Ok(NatPort::new_identifier(raw)),
            net::Protocol::Tcp | net::Protocol::Udp => NatPort::new_port_checked(raw),
        }
    }

    /// The raw `u16` value, regardless of variant.
    #[must_use]
    pub fn as_u16(self) -> u16 {
        match self {
            NatPort::Port(port) => port.into(),
            NatPort::Identifier(id) => id,
        }
    }
}

impl From<TcpPort> for NatPort {
    fn from(port: TcpPort) -> Self {
        Self::new_port(port.into())
    }
}

impl TryFrom<NatPort> for TcpPort {
    type Error = TcpPortError;

    fn try_from(port: NatPort) -> Result<Self, Self::Error> {
        TcpPort::new_checked(port.as_u16())
    }
}

impl From<UdpPort> for NatPort {
    fn from(port: UdpPort) -> Self {
        Self::new_port(port.into())
    }
}

impl TryFrom<NatPort> for UdpPort {
    type Error = UdpPortError;

    fn try_from(port: NatPort) -> Result<Self, Self::Error> {
        UdpPort::new_checked(port.as_u16())
    }
}

impl From<NatPort> for u16 {
    fn from(port: NatPort) -> Self {
        port.as_u16()
    }
}
