// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! A millisecond clock abstraction, so the allocator's 1s reuse quarantine and the maintenance
//! sweep's 60s idle timeout can be driven by a fake clock in tests.

use std::time::{SystemTime, UNIX_EPOCH};

/// A source of monotonically-nondecreasing milliseconds, used for `last_used` timestamps.
pub trait Clock: Send + Sync {
    /// The current time, in milliseconds, relative to an unspecified epoch.
    fn now_ms(&self) -> u64;
}

/// The real wall clock, backed by [`SystemTime`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::Clock;
    use concurrency::sync::atomic::{AtomicU64, Ordering};

    /// A clock a test can advance by hand.
    #[derive(Debug, Default)]
    pub(crate) struct FakeClock(AtomicU64);

    impl FakeClock {
        pub(crate) fn new(start_ms: u64) -> FakeClock {
            FakeClock(AtomicU64::new(start_ms))
        }

        pub(crate) fn advance(&self, delta_ms: u64) {
            self.0.fetch_add(delta_ms, Ordering::Relaxed);
        }
    }

    impl Clock for FakeClock {
        fn now_ms(&self) -> u64 {
            self.0.load(Ordering::Relaxed)
        }
    }
}
