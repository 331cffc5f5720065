use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, TimeZone, Utc};

/// Milliseconds between the unix epoch and 2015-01-01T00:00:00Z.
pub const EPOCH_MS: i64 = 1_420_070_400_000;

const INCREMENT_BITS: u32 = 12;
const INCREMENT_MASK: u64 = (1 << INCREMENT_BITS) - 1;
const PROCESS_SHIFT: u32 = 12;
const WORKER_SHIFT: u32 = 17;
const TIMESTAMP_SHIFT: u32 = 22;

/// Mints time-ordered 64-bit identities.
///
/// Layout: `timestamp(42) | worker(5) | process(5) | increment(12)`.
/// Ids from one generator strictly increase. Once 4096 ids have been minted
/// in one millisecond the generator spins until the clock moves on, and a
/// clock that steps backwards is held at the last millisecond used.
#[derive(Debug)]
pub struct SnowflakeGenerator {
    worker: u8,
    process: u8,
    // `elapsed_ms << 12 | increment` of the last id minted.
    last: AtomicU64,
}

impl SnowflakeGenerator {
    pub fn new(worker: u8, process: u8) -> Self {
        Self {
            worker: worker & 0x1F,
            process: process & 0x1F,
            last: AtomicU64::new(0),
        }
    }

    pub fn generate(&self) -> i64 {
        self.generate_with(Utc::now)
    }

    /// Mints an id reading the time from `clock`.
    pub fn generate_with(&self, clock: impl Fn() -> DateTime<Utc>) -> i64 {
        let mut last = self.last.load(Ordering::Acquire);
        loop {
            let elapsed = (clock().timestamp_millis() - EPOCH_MS).max(0) as u64;
            let last_ms = last >> INCREMENT_BITS;
            let last_increment = last & INCREMENT_MASK;

            let next = if elapsed > last_ms {
                elapsed << INCREMENT_BITS
            } else if last_increment < INCREMENT_MASK {
                last + 1
            } else {
                std::hint::spin_loop();
                last = self.last.load(Ordering::Acquire);
                continue;
            };

            match self
                .last
                .compare_exchange(last, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return self.compose(next),
                Err(current) => last = current,
            }
        }
    }

    fn compose(&self, state: u64) -> i64 {
        let elapsed = (state >> INCREMENT_BITS) as i64;
        let increment = (state & INCREMENT_MASK) as i64;

        (elapsed << TIMESTAMP_SHIFT)
            | (i64::from(self.worker) << WORKER_SHIFT)
            | (i64::from(self.process) << PROCESS_SHIFT)
            | increment
    }

    /// Recovers the minting instant of an id.
    pub fn timestamp_of(id: i64) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt((id >> TIMESTAMP_SHIFT) + EPOCH_MS).single()
    }
}

impl Default for SnowflakeGenerator {
    fn default() -> Self {
        Self::new(1, 1)
    }
}
