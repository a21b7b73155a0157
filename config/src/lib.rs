// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The port-pair NAT configuration model (C2): a raw, serde-deserializable document shape
//! ([`model`]), the validator that checks it against the invariants a live runtime depends on
//! ([`validate`]), and the validated, normalized shape the validator produces ([`validated`]).
//!
//! This crate performs no file I/O and holds no live runtime state; it exists purely to turn an
//! already-deserialized document into something `natpair-nat` and the pipeline wiring can trust.

#![deny(
    unsafe_code,
    clippy::all,
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic
)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]

pub mod errors;
pub mod model;
pub mod validate;
pub mod validated;

pub use errors::ConfigError;
pub use model::Config;
pub use validate::validate;
pub use validated::{PortSide, ValidatedConfig, ValidatedFwdRule, ValidatedPort, ValidatedPortPair};
