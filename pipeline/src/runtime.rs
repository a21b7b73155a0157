// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The Dataplane Runtime contract: the host-provided collaborator for NIC Rx/Tx, flow graph
//! construction, and sideband device plumbing. This crate never implements it; a host binary
//! links a concrete runtime (DPDK, AF_XDP, a test double, ...) and hands it to
//! [`crate::wiring::wire_pair`].

use net::eth::mac::Mac;
use nat::PacketHeaders;
use thiserror::Error;

/// An opaque handle to a flow of packets moving through the runtime's graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlowHandle(pub u64);

/// An opaque handle to a sideband (KNI-style) device bound to one port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SidebandHandle(pub u64);

/// A failure returned by the Dataplane Runtime while building a pair's graph. Always fatal: the
/// caller aborts startup.
#[derive(Debug, Error)]
#[error("dataplane runtime failure: {0}")]
pub struct RuntimeFatal(pub String);

/// A per-packet classifier installed into a splitter stage. Returns one of the bit-exact
/// splitter output indices: `0 = DROP`, `1 = SEND`, `2 = SIDEBAND`.
pub type ClassifyFn = Box<dyn Fn(&mut dyn PacketHeaders) -> usize + Send + Sync>;

/// The collaborator the NAT core consumes but never implements. Method names and signatures
/// mirror the external interface it exposes to a host runtime.
pub trait DataplaneRuntime {
    /// Open a receive flow on `port_index`.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeFatal`] if the port cannot be opened.
    fn rx(&self, port_index: u16) -> Result<FlowHandle, RuntimeFatal>;

    /// Bind `flow` to the transmit side of `port_index`.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeFatal`] if the port cannot be opened.
    fn tx(&self, flow: FlowHandle, port_index: u16) -> Result<(), RuntimeFatal>;

    /// Bind `flow` to the transmit side of a sideband device.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeFatal`] if the sideband cannot be opened.
    fn tx_sideband(&self, flow: FlowHandle, sideband: SidebandHandle) -> Result<(), RuntimeFatal>;

    /// Fan `flow` out into `n_outputs` flows, dispatched per-packet by `classify`. `ctx` is
    /// opaque per-handler context (the pair index, in practice).
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeFatal`] if the splitter stage cannot be constructed.
    fn splitter(
        &self,
        flow: FlowHandle,
        classify: ClassifyFn,
        n_outputs: usize,
        ctx: u16,
    ) -> Result<Vec<FlowHandle>, RuntimeFatal>;

    /// Merge two flows into one.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeFatal`] if the merger stage cannot be constructed.
    fn merger(&self, a: FlowHandle, b: FlowHandle) -> Result<FlowHandle, RuntimeFatal>;

    /// Create a sideband device bound to `port_index`, named `name`.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeFatal`] if the device cannot be created.
    fn create_sideband(&self, port_index: u16, name: &str) -> Result<SidebandHandle, RuntimeFatal>;

    /// Open a receive flow on a sideband device.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeFatal`] if the sideband cannot be opened.
    fn rx_sideband(&self, sideband: SidebandHandle) -> Result<FlowHandle, RuntimeFatal>;

    /// The MAC address bound to `port_index`.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeFatal`] if the port does not exist.
    fn mac_of(&self, port_index: u16) -> Result<Mac, RuntimeFatal>;

    /// Whether HW TX-checksum offload is available across `ports`.
    fn hw_tx_checksum_capable(&self, ports: &[u16]) -> bool;
}
