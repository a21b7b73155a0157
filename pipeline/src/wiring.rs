// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Pipeline wiring: turns one validated port pair into live NAT state plus a Dataplane Runtime
//! graph that drives packets through it.

use crate::runtime::{ClassifyFn, DataplaneRuntime, FlowHandle, RuntimeFatal};
use concurrency::sync::Arc;
use config::{PortSide, ValidatedFwdRule, ValidatedPort, ValidatedPortPair};
use nat::clock::Clock;
use nat::dump::DumpSink;
use nat::engine::{Decision, GlobalFlags, translate_private_to_public, translate_public_to_private};
use nat::{NatPort, Port, PortKind, PortMap, PortPair, Tuple};
use net::eth::mac::Mac;
use tracing::info;

/// The default dynamic-allocation window: well-known ports are never handed out dynamically.
pub const DEFAULT_PORT_RANGE_START: u16 = 1024;
/// The top of the dynamic-allocation window.
pub const DEFAULT_PORT_RANGE_END: u16 = 65535;

/// Splitter output indices, bit-exact per the external interface contract.
mod splitter_index {
    pub const DROP: usize = 0;
    pub const SEND: usize = 1;
    pub const SIDEBAND: usize = 2;
}

/// Everything `wire_pair` hands back: the live NAT state plus the handles a host may still need
/// (e.g. to later tear the graph down).
pub struct WiredPair {
    /// The live translation state for this pair.
    pub pair: Arc<PortPair>,
    /// A short label for metrics/logging (`"private_idx/public_idx"`).
    pub label: String,
}

fn build_port(spec: &ValidatedPort, mac: Mac, side: PortSide, port_range: (u16, u16)) -> Port {
    let port_map = matches!(side, PortSide::Public).then(|| PortMap::new(port_range.0, port_range.1));
    Port::new(
        spec.index,
        spec.subnet,
        spec.vlan,
        spec.sideband_name.clone(),
        mac,
        match side {
            PortSide::Private => PortKind::Private,
            PortSide::Public => PortKind::Public,
        },
        port_map,
        None,
    )
}

fn install_static_rules(pair: &PortPair, rules: &[ValidatedFwdRule]) -> Result<(), RuntimeFatal> {
    for rule in rules {
        let listen = NatPort::for_protocol(rule.protocol, rule.listen_port)
            .map_err(|e| RuntimeFatal(format!("bad static rule listen port: {e}")))?;
        let dest_port = NatPort::for_protocol(rule.protocol, rule.destination_port)
            .map_err(|e| RuntimeFatal(format!("bad static rule destination port: {e}")))?;
        let destination = Tuple::new(rule.destination_addr, dest_port);
        pair.install_static_rule(rule.protocol, listen, destination, rule.to_sideband);
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn make_classifier(
    pair: Arc<PortPair>,
    direction: Direction,
    clock: Arc<dyn Clock>,
    flags: GlobalFlags,
    hw_tx_checksum_capable: bool,
    sideband_available: bool,
    dump_sink: Arc<dyn DumpSink>,
) -> ClassifyFn {
    Box::new(move |pkt| {
        let now_ms = clock.now_ms();
        let decision = match direction {
            Direction::PrivateToPublic => translate_private_to_public(
                &pair,
                pkt,
                now_ms,
                flags,
                hw_tx_checksum_capable,
                dump_sink.as_ref(),
            ),
            Direction::PublicToPrivate => translate_public_to_private(
                &pair,
                pkt,
                now_ms,
                flags,
                hw_tx_checksum_capable,
                sideband_available,
                dump_sink.as_ref(),
            ),
        };
        match decision {
            Decision::Drop => splitter_index::DROP,
            Decision::Send => splitter_index::SEND,
            Decision::Sideband => splitter_index::SIDEBAND,
        }
    })
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    PrivateToPublic,
    PublicToPrivate,
}

/// Wire one validated pair: build its live NAT state, install static forwarding rules, and
/// assemble the runtime's Rx/Splitter/Tx graph in both directions, with sideband legs wired in
/// where configured.
///
/// # Errors
///
/// Returns [`RuntimeFatal`] if any runtime call fails, or if a static rule names a port that
/// cannot be represented.
pub fn wire_pair(
    runtime: &dyn DataplaneRuntime,
    pair_index: u16,
    validated: &ValidatedPortPair,
    flags: GlobalFlags,
    clock: Arc<dyn Clock>,
    dump_sink: Arc<dyn DumpSink>,
) -> Result<WiredPair, RuntimeFatal> {
    let private_mac = runtime.mac_of(validated.private.index)?;
    let public_mac = runtime.mac_of(validated.public.index)?;
    let port_range = (DEFAULT_PORT_RANGE_START, DEFAULT_PORT_RANGE_END);

    let private_port = build_port(&validated.private, private_mac, PortSide::Private, port_range);
    let public_port = build_port(&validated.public, public_mac, PortSide::Public, port_range);
    let pair = Arc::new(PortPair::new(private_port, public_port, port_range.0));

    install_static_rules(&pair, &validated.private.forward_rules)?;
    install_static_rules(&pair, &validated.public.forward_rules)?;

    let hw_tx_checksum_capable =
        runtime.hw_tx_checksum_capable(&[validated.private.index, validated.public.index]);

    let private_sideband = match pair.private().sideband_name() {
        Some(name) => Some(runtime.create_sideband(validated.private.index, name)?),
        None => None,
    };
    let public_sideband = match pair.public().sideband_name() {
        Some(name) => Some(runtime.create_sideband(validated.public.index, name)?),
        None => None,
    };

    wire_direction(
        runtime,
        &pair,
        Direction::PrivateToPublic,
        validated.private.index,
        validated.public.index,
        pair_index,
        Arc::clone(&clock),
        flags,
        hw_tx_checksum_capable,
        public_sideband,
        dump_sink.clone(),
    )?;
    wire_direction(
        runtime,
        &pair,
        Direction::PublicToPrivate,
        validated.public.index,
        validated.private.index,
        pair_index,
        clock,
        flags,
        hw_tx_checksum_capable,
        private_sideband,
        dump_sink,
    )?;

    let label = format!("{}/{}", validated.private.index, validated.public.index);
    info!(pair = %label, "wired port pair");
    Ok(WiredPair { pair, label })
}

#[allow(clippy::too_many_arguments)]
fn wire_direction(
    runtime: &dyn DataplaneRuntime,
    pair: &Arc<PortPair>,
    direction: Direction,
    rx_port_index: u16,
    tx_port_index: u16,
    pair_index: u16,
    clock: Arc<dyn Clock>,
    flags: GlobalFlags,
    hw_tx_checksum_capable: bool,
    egress_sideband: Option<crate::runtime::SidebandHandle>,
    dump_sink: Arc<dyn DumpSink>,
) -> Result<(), RuntimeFatal> {
    let rx = runtime.rx(rx_port_index)?;
    let n_outputs = if egress_sideband.is_some() { 3 } else { 2 };
    let classify = make_classifier(
        Arc::clone(pair),
        direction,
        clock,
        flags,
        hw_tx_checksum_capable,
        egress_sideband.is_some(),
        dump_sink,
    );
    let outs = runtime.splitter(rx, classify, n_outputs, pair_index)?;

    let send_leg = outs[splitter_index::SEND];
    let mut egress = send_leg;
    if let Some(sideband) = egress_sideband {
        if let Some(&sideband_leg) = outs.get(splitter_index::SIDEBAND) {
            runtime.tx_sideband(sideband_leg, sideband)?;
        }
        let sideband_rx = runtime.rx_sideband(sideband)?;
        egress = runtime.merger(send_leg, sideband_rx)?;
    }
    runtime.tx(egress, tx_port_index)?;
    // outs[splitter_index::DROP] is left unconsumed; the runtime is expected to free flows that
    // no stage ever binds to a Tx or merger.
    let _: FlowHandle = outs[splitter_index::DROP];
    Ok(())
}
