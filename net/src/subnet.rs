// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! IPv4 subnet type and membership test.

use std::fmt::{Display, Formatter};
use std::net::Ipv4Addr;

/// An IPv4 subnet, represented as an address/mask pair.
///
/// Membership is `(candidate & mask) == (addr & mask)`. A single host is represented with
/// `mask = 255.255.255.255`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Subnet {
    addr: u32,
    mask: u32,
}

/// Errors which may occur while building a [`Subnet`] from a CIDR prefix length.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SubnetError {
    /// A CIDR prefix length must be in `0..=32`.
    #[error("prefix length {0} out of range (expected 0..=32)")]
    PrefixOutOfRange(u8),
}

impl Subnet {
    /// Build a [`Subnet`] from an address and an explicit mask.
    #[must_use]
    pub fn new(addr: Ipv4Addr, mask: Ipv4Addr) -> Subnet {
        Subnet {
            addr: addr.into(),
            mask: mask.into(),
        }
    }

    /// Build a [`Subnet`] from an address and a CIDR prefix length.
    ///
    /// # Errors
    ///
    /// Returns [`SubnetError::PrefixOutOfRange`] if `prefix_len > 32`.
    pub fn from_cidr(addr: Ipv4Addr, prefix_len: u8) -> Result<Subnet, SubnetError> {
        if prefix_len > 32 {
            return Err(SubnetError::PrefixOutOfRange(prefix_len));
        }
        let mask = if prefix_len == 0 {
            0
        } else {
            u32::MAX << (32 - prefix_len)
        };
        Ok(Subnet {
            addr: u32::from(addr),
            mask,
        })
    }

    /// A subnet consisting of exactly one host (`/32`).
    #[must_use]
    pub fn host(addr: Ipv4Addr) -> Subnet {
        Subnet {
            addr: addr.into(),
            mask: u32::MAX,
        }
    }

    /// Returns `true` iff `candidate` falls within this subnet.
    #[must_use]
    pub fn contains(&self, candidate: Ipv4Addr) -> bool {
        (u32::from(candidate) & self.mask) == (self.addr & self.mask)
    }

    /// The network address this subnet was built from (not masked to the network boundary).
    #[must_use]
    pub fn addr(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.addr)
    }

    /// The subnet mask.
    #[must_use]
    pub fn mask(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.mask)
    }

    /// The CIDR prefix length implied by the mask, if the mask is contiguous.
    #[must_use]
    pub fn prefix_len(&self) -> u32 {
        self.mask.count_ones()
    }
}

impl Display for Subnet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.addr(), self.prefix_len())
    }
}
