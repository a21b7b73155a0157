// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The public-side port map (C4): a dense, per-protocol array of [`PortMapEntry`], and the
//! reuse-quarantined linear-scan allocator that hands out slots from it.

use concurrency::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, AtomicU64, Ordering};
use std::net::Ipv4Addr;

/// 1 second: protects against stale-peer retransmissions arriving after a connection ends from
/// being misread as traffic on a freshly reassigned port.
pub const PORT_REUSE_TIMEOUT_MS: u64 = 1_000;

/// 60 seconds: idle threshold after which maintenance reclaims a dynamic entry.
pub const CONNECTION_TIMEOUT_MS: u64 = 60_000;

const NO_ADDR: u32 = 0;

/// Direction of the first FIN observed on a TCP entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationDir {
    /// No FIN observed yet.
    None,
    /// First FIN was private-to-public.
    Pri2Pub,
    /// First FIN was public-to-private.
    Pub2Pri,
}

impl TerminationDir {
    const NONE: u8 = 0x00;
    const PRI2PUB: u8 = 0x0f;
    const PUB2PRI: u8 = 0xf0;

    fn from_raw(raw: u8) -> TerminationDir {
        match raw {
            Self::PRI2PUB => TerminationDir::Pri2Pub,
            Self::PUB2PRI => TerminationDir::Pub2Pri,
            _ => TerminationDir::None,
        }
    }

    fn as_raw(self) -> u8 {
        match self {
            TerminationDir::None => Self::NONE,
            TerminationDir::Pri2Pub => Self::PRI2PUB,
            TerminationDir::Pub2Pri => Self::PUB2PRI,
        }
    }
}

/// One slot of the public-side port map: liveness and ownership metadata for `(protocol,
/// public_port)`.
///
/// All fields are atomics so the hot path can update `last_used`/`fin_count` without taking the
/// pair mutex; only the allocator (on miss) and maintenance hold the mutex while touching these.
#[derive(Debug)]
pub struct PortMapEntry {
    last_used: AtomicU64,
    private_addr: AtomicU32,
    fin_count: AtomicU8,
    termination_dir: AtomicU8,
    is_static: AtomicBool,
}

impl Default for PortMapEntry {
    fn default() -> Self {
        PortMapEntry {
            last_used: AtomicU64::new(0),
            private_addr: AtomicU32::new(NO_ADDR),
            fin_count: AtomicU8::new(0),
            termination_dir: AtomicU8::new(TerminationDir::NONE),
            is_static: AtomicBool::new(false),
        }
    }
}

impl PortMapEntry {
    /// The private address bound to this slot, or `None` if it is free.
    #[must_use]
    pub fn private_addr(&self) -> Option<Ipv4Addr> {
        match self.private_addr.load(Ordering::Acquire) {
            NO_ADDR => None,
            bits => Some(Ipv4Addr::from_bits(bits)),
        }
    }

    /// True iff this slot backs a static forwarding rule (never reclaimed, never reallocated).
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.is_static.load(Ordering::Acquire)
    }

    /// Milliseconds timestamp of the most recent packet matched to this slot.
    #[must_use]
    pub fn last_used(&self) -> u64 {
        self.last_used.load(Ordering::Acquire)
    }

    /// Record that a packet was just matched to this slot.
    pub fn touch(&self, now_ms: u64) {
        self.last_used.store(now_ms, Ordering::Release);
    }

    /// Number of FIN segments observed on this entry (TCP only).
    #[must_use]
    pub fn fin_count(&self) -> u8 {
        self.fin_count.load(Ordering::Acquire)
    }

    /// The direction of the first FIN observed, if any.
    #[must_use]
    pub fn termination_dir(&self) -> TerminationDir {
        TerminationDir::from_raw(self.termination_dir.load(Ordering::Acquire))
    }

    /// Account a FIN segment observed travelling in `dir`. The first FIN on an entry sets the
    /// recorded direction and counts toward teardown; a retransmission of that same FIN (same
    /// direction) is a no-op. Only a FIN seen in the *opposite* direction advances the count to
    /// the reclaimable threshold, matching "FIN in the opposite direction to `termination_dir`".
    /// Returns the updated FIN count.
    pub fn mark_fin(&self, dir: TerminationDir) -> u8 {
        match self.termination_dir.compare_exchange(
            TerminationDir::NONE,
            dir.as_raw(),
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => self.fin_count.fetch_add(1, Ordering::AcqRel) + 1,
            Err(existing) if existing == dir.as_raw() => self.fin_count.load(Ordering::Acquire),
            Err(_) => self.fin_count.fetch_add(1, Ordering::AcqRel) + 1,
        }
    }

    /// Account a RST: always makes the entry immediately reclaimable.
    pub fn mark_rst(&self) {
        self.fin_count.store(2, Ordering::Release);
    }

    /// True once both sides of a TCP connection have been observed to tear down (two FINs, or a
    /// RST), making this entry eligible for immediate reclamation by maintenance.
    #[must_use]
    pub fn reclaimable_by_teardown(&self) -> bool {
        self.fin_count() >= 2
    }

    /// True if this slot is free for allocation: not static, and either never used or idle past
    /// the reuse quarantine.
    #[must_use]
    pub fn reusable(&self, now_ms: u64) -> bool {
        if self.is_static() {
            return false;
        }
        match self.private_addr() {
            None => true,
            Some(_) => now_ms.saturating_sub(self.last_used()) >= PORT_REUSE_TIMEOUT_MS,
        }
    }

    /// Claim a free slot for a new dynamic mapping. Caller must hold the pair mutex.
    pub fn claim(&self, now_ms: u64, inner_ip: Ipv4Addr) {
        self.private_addr.store(inner_ip.to_bits(), Ordering::Release);
        self.last_used.store(now_ms, Ordering::Release);
        self.fin_count.store(0, Ordering::Release);
        self.termination_dir.store(TerminationDir::NONE, Ordering::Release);
        self.is_static.store(false, Ordering::Release);
    }

    /// Install a static reservation backing a forwarding rule. Caller must hold the pair mutex.
    pub fn install_static(&self, inner_ip: Ipv4Addr) {
        self.private_addr.store(inner_ip.to_bits(), Ordering::Release);
        self.is_static.store(true, Ordering::Release);
    }

    /// Release this slot back to the free pool. `last_used` is preserved, per spec, so the reuse
    /// quarantine still applies to the port that was just freed.
    pub fn release(&self) {
        self.private_addr.store(NO_ADDR, Ordering::Release);
        self.fin_count.store(0, Ordering::Release);
        self.termination_dir.store(TerminationDir::NONE, Ordering::Release);
        self.is_static.store(false, Ordering::Release);
    }
}

/// A dense, per-protocol array of [`PortMapEntry`], indexed directly by `u16` port number.
#[derive(Debug)]
pub struct PortMap {
    entries: Vec<PortMapEntry>,
    start: u16,
    end: u16,
}

/// The allocator found no reusable slot in a full sweep of the port range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("no reusable public port in range")]
pub struct PortExhausted;

impl PortMap {
    /// Build a port map covering `[start, end]` inclusive. The backing array has `end + 1`
    /// entries, indexed directly by port number (ports below `start` exist in the array but are
    /// never scanned or allocated).
    #[must_use]
    pub fn new(start: u16, end: u16) -> PortMap {
        let len = usize::from(end) + 1;
        let mut entries = Vec::with_capacity(len);
        entries.resize_with(len, PortMapEntry::default);
        PortMap { entries, start, end }
    }

    /// The inclusive allocatable range.
    #[must_use]
    pub fn range(&self) -> (u16, u16) {
        (self.start, self.end)
    }

    /// Access the entry for `port`, if it is within range.
    #[must_use]
    pub fn entry(&self, port: u16) -> Option<&PortMapEntry> {
        self.entries.get(usize::from(port))
    }

    /// All entries, in port order, for maintenance sweeps.
    pub fn iter(&self) -> impl Iterator<Item = (u16, &PortMapEntry)> {
        (self.start..=self.end).filter_map(|p| self.entry(p).map(|e| (p, e)))
    }

    /// Find and claim a reusable slot, starting the scan at `hint` and wrapping at `end` back to
    /// `start`, bounded by one full sweep of the range.
    ///
    /// The caller must hold the pair mutex: this is only invoked on a forward-map miss, off the
    /// hot read path.
    ///
    /// Returns the claimed port and the new scan hint to store back into `PortPair::last_port`.
    ///
    /// # Errors
    ///
    /// Returns [`PortExhausted`] if no slot is reusable within one full sweep.
    pub fn allocate(
        &self,
        hint: u16,
        now_ms: u64,
        inner_ip: Ipv4Addr,
    ) -> Result<(u16, u16), PortExhausted> {
        let span = u32::from(self.end) - u32::from(self.start) + 1;
        let mut candidate = hint.clamp(self.start, self.end);
        for _ in 0..span {
            if let Some(entry) = self.entry(candidate) {
                if entry.reusable(now_ms) {
                    entry.claim(now_ms, inner_ip);
                    let next = if candidate == self.end { self.start } else { candidate + 1 };
                    return Ok((candidate, next));
                }
            }
            candidate = if candidate == self.end { self.start } else { candidate + 1 };
        }
        Err(PortExhausted)
    }
}
