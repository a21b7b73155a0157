// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Per-packet error outcomes. None of these are ever surfaced to a caller as a `Result`: the
//! engine counts them and drops the packet (see spec on error propagation).

use crate::portmap::PortExhausted;

/// Reasons a packet may be dropped by the translation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// The public-port allocator found no reusable slot.
    #[error("port allocator exhausted")]
    PortExhausted,
    /// A public→private packet matched no forward-map entry.
    #[error("no forward mapping for inbound packet")]
    Unmapped,
    /// The packet could not be parsed, used an unsupported protocol, or was a non-leading
    /// fragment with no port information.
    #[error("malformed or unsupported packet")]
    MalformedPacket,
}

impl From<PortExhausted> for EngineError {
    fn from(_: PortExhausted) -> Self {
        EngineError::PortExhausted
    }
}
