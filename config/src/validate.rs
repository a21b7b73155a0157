// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The config validator (C2): enforces VLAN symmetry, forwarding-rule sanity, and subnet
//! containment, failing with [`ConfigError`] on the first violation encountered.

use crate::errors::ConfigError;
use crate::model::{Config, FwdSpec, PortPairSpec, PortSpec};
use crate::validated::{PortSide, ValidatedConfig, ValidatedFwdRule, ValidatedPort, ValidatedPortPair};
use net::Protocol;
use net::Subnet;
use std::net::Ipv4Addr;
use std::str::FromStr;
use tracing::{debug, info, warn};

fn parse_subnet(raw: &str) -> Result<Subnet, ConfigError> {
    if let Some((addr, prefix)) = raw.split_once('/') {
        let addr: Ipv4Addr = addr
            .parse()
            .map_err(|_| ConfigError::InvalidDestination(raw.to_string()))?;
        let prefix: u8 = prefix
            .parse()
            .map_err(|_| ConfigError::InvalidDestination(raw.to_string()))?;
        Ok(Subnet::from_cidr(addr, prefix)?)
    } else {
        let addr: Ipv4Addr = raw
            .parse()
            .map_err(|_| ConfigError::InvalidDestination(raw.to_string()))?;
        Ok(Subnet::host(addr))
    }
}

fn parse_destination(raw: &str) -> Result<(Ipv4Addr, u16), ConfigError> {
    match raw.rsplit_once(':') {
        Some((host, port)) => {
            let addr: Ipv4Addr = host
                .parse()
                .map_err(|_| ConfigError::InvalidDestination(raw.to_string()))?;
            let port: u16 = port
                .parse()
                .map_err(|_| ConfigError::InvalidDestination(raw.to_string()))?;
            Ok((addr, port))
        }
        None => {
            let addr: Ipv4Addr = raw
                .parse()
                .map_err(|_| ConfigError::InvalidDestination(raw.to_string()))?;
            Ok((addr, 0))
        }
    }
}

fn parse_fwd_protocol(raw: &str) -> Result<Protocol, ConfigError> {
    let proto = Protocol::from_str(raw)?;
    if proto == Protocol::Icmp {
        return Err(ConfigError::BadProtocol(net::protocol::BadProtocol(raw.to_string())));
    }
    Ok(proto)
}

/// Validate one side's forwarding rules. `opposite_subnet` is used for the destination-containment
/// check on the public side.
fn validate_forward_rules(
    side: PortSide,
    listen_index: u16,
    rules: &[FwdSpec],
    opposite_subnet: Subnet,
    needs_sideband: &mut bool,
) -> Result<Vec<ValidatedFwdRule>, ConfigError> {
    rules
        .iter()
        .map(|rule| {
            let (dest_addr, mut dest_port) = parse_destination(&rule.destination)?;
            let protocol = parse_fwd_protocol(&rule.protocol)?;
            if dest_port == 0 {
                dest_port = rule.port;
            }

            if dest_addr.is_unspecified() {
                debug!(port = listen_index, listen = rule.port, "sideband-bound rule");
                if dest_port != rule.port {
                    return Err(ConfigError::SidebandPortMismatch {
                        listen_port: rule.port,
                        got: dest_port,
                    });
                }
                *needs_sideband = true;
                return Ok(ValidatedFwdRule {
                    listen_port: rule.port,
                    destination_addr: dest_addr,
                    destination_port: dest_port,
                    protocol,
                    to_sideband: true,
                });
            }

            if side == PortSide::Private {
                return Err(ConfigError::PrivateSideNonSidebandRule(rule.port));
            }

            if !opposite_subnet.contains(dest_addr) {
                return Err(ConfigError::DestinationOutsideSubnet {
                    listen_port: rule.port,
                    destination: dest_addr,
                    subnet: opposite_subnet,
                });
            }
            Ok(ValidatedFwdRule {
                listen_port: rule.port,
                destination_addr: dest_addr,
                destination_port: dest_port,
                protocol,
                to_sideband: false,
            })
        })
        .collect()
}

fn validate_port(
    spec: &PortSpec,
    side: PortSide,
    opposite_subnet: Subnet,
    needs_sideband: &mut bool,
) -> Result<ValidatedPort, ConfigError> {
    let subnet = parse_subnet(&spec.subnet)?;
    let forward_rules =
        validate_forward_rules(side, spec.index, &spec.forward_ports, opposite_subnet, needs_sideband)?;

    let has_sideband_rule = forward_rules.iter().any(|r| r.to_sideband);
    let sideband_name_set = spec.kni_name.as_deref().is_some_and(|name| !name.is_empty());
    if has_sideband_rule && !sideband_name_set {
        return Err(ConfigError::MissingSidebandName(spec.index));
    }

    Ok(ValidatedPort {
        index: spec.index,
        subnet,
        vlan: spec.vlan_tag,
        sideband_name: spec.kni_name.clone(),
        kind: side,
        forward_rules,
    })
}

/// Validate a whole configuration document, pair by pair, side by side. Fails with the first
/// [`ConfigError`] encountered.
///
/// # Errors
///
/// Returns a [`ConfigError`] on the first structural violation found.
pub fn validate(config: &Config) -> Result<ValidatedConfig, ConfigError> {
    let mut needs_sideband = false;
    let mut pairs = Vec::with_capacity(config.port_pairs.len());

    for PortPairSpec { private_port, public_port } in &config.port_pairs {
        if (private_port.vlan_tag == 0) != (public_port.vlan_tag == 0) {
            return Err(ConfigError::VlanAsymmetry(private_port.vlan_tag, public_port.vlan_tag));
        }

        // Parse subnets up front so each side's rule validation can consult the other's.
        let private_subnet = parse_subnet(&private_port.subnet)?;
        let public_subnet = parse_subnet(&public_port.subnet)?;

        let private = validate_port(private_port, PortSide::Private, public_subnet, &mut needs_sideband)?;
        let public = validate_port(public_port, PortSide::Public, private_subnet, &mut needs_sideband)?;

        info!(
            private_index = private.index,
            public_index = public.index,
            "validated port pair"
        );
        pairs.push(ValidatedPortPair { private, public });
    }

    if needs_sideband {
        warn!("configuration requires a sideband; host must provide create_sideband/rx_sideband");
    }

    Ok(ValidatedConfig { pairs, needs_sideband })
}
