// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![deny(clippy::all, clippy::pedantic)]
#![deny(rustdoc::all)]

//! The stateful port-pair NAT core: translation tables (C3), public-port allocator (C4),
//! translation engine (C5), and maintenance (C7).
//!
//! `config` (C2) and `pipeline` (C6) build on top of the types exported here: `config` validates
//! a document into the `PortSpec`/`FwdSpec` shape this crate's [`pair::PortPair`] is built from,
//! and `pipeline` wires [`engine::translate_private_to_public`]/[`engine::translate_public_to_private`]
//! into a host's receive/send graph.

pub mod clock;
pub mod dump;
pub mod engine;
pub mod error;
pub mod maintenance;
pub mod metrics;
pub mod pair;
pub mod port;
pub mod portmap;
#[cfg(test)]
mod properties;
pub mod tables;
pub mod tuple;

pub use engine::{Decision, GlobalFlags, PacketHeaders, TcpFlags};
pub use error::EngineError;
pub use pair::{Port, PortKind, PortPair};
pub use port::NatPort;
pub use portmap::{PortExhausted, PortMap, PortMapEntry, TerminationDir};
pub use tables::{ArpTable, ForwardMaps, SidebandMarks};
pub use tuple::Tuple;
