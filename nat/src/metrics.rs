// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Counters and gauges for the per-packet error outcomes and the maintenance sweep.

use metrics::{counter, describe_counter, describe_gauge, gauge};

/// Incremented each time the public-port allocator finds no reusable slot.
pub const PORT_EXHAUSTED_TOTAL: &str = "port_exhausted_total";
/// Incremented on each public→private packet with no matching forward-map entry.
pub const UNMAPPED_TOTAL: &str = "unmapped_total";
/// Incremented on each unparsable or unsupported-protocol packet.
pub const MALFORMED_PACKET_TOTAL: &str = "malformed_packet_total";
/// Incremented by maintenance for each dynamic entry reclaimed in a sweep.
pub const DYNAMIC_ENTRIES_RECLAIMED_TOTAL: &str = "dynamic_entries_reclaimed_total";
/// Gauge: the number of live dynamic entries, labeled by pair and protocol.
pub const ACTIVE_DYNAMIC_ENTRIES: &str = "active_dynamic_entries";

/// Register metric descriptions once, at pipeline-wiring time.
pub fn describe() {
    describe_counter!(PORT_EXHAUSTED_TOTAL, "Packets dropped due to public port exhaustion");
    describe_counter!(UNMAPPED_TOTAL, "Inbound packets with no matching forward mapping");
    describe_counter!(MALFORMED_PACKET_TOTAL, "Packets dropped for parse or protocol reasons");
    describe_counter!(
        DYNAMIC_ENTRIES_RECLAIMED_TOTAL,
        "Dynamic forward-map entries reclaimed by maintenance"
    );
    describe_gauge!(ACTIVE_DYNAMIC_ENTRIES, "Live dynamic forward-map entries");
}

/// Bump [`PORT_EXHAUSTED_TOTAL`].
pub fn record_port_exhausted() {
    counter!(PORT_EXHAUSTED_TOTAL).increment(1);
}

/// Bump [`UNMAPPED_TOTAL`].
pub fn record_unmapped() {
    counter!(UNMAPPED_TOTAL).increment(1);
}

/// Bump [`MALFORMED_PACKET_TOTAL`].
pub fn record_malformed_packet() {
    counter!(MALFORMED_PACKET_TOTAL).increment(1);
}

/// Bump [`DYNAMIC_ENTRIES_RECLAIMED_TOTAL`] by `count`, labeled by `pair` and `protocol`.
pub fn record_reclaimed(pair: &str, protocol: &'static str, count: u64) {
    counter!(DYNAMIC_ENTRIES_RECLAIMED_TOTAL, "pair" => pair.to_string(), "protocol" => protocol)
        .increment(count);
}

/// Set [`ACTIVE_DYNAMIC_ENTRIES`] for `pair`/`protocol`.
#[allow(clippy::cast_precision_loss)]
pub fn set_active_entries(pair: &str, protocol: &'static str, count: usize) {
    gauge!(ACTIVE_DYNAMIC_ENTRIES, "pair" => pair.to_string(), "protocol" => protocol)
        .set(count as f64);
}
