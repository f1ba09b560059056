use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use checkmark_core::clock::Clock;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Configuration for a simulated wall clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockConfig {
    /// Base timestamp in milliseconds.
    pub base_millis: i64,
    /// Milliseconds the clock advances on every read.
    pub tick_millis: i64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            base_millis: 1_700_000_000_000,
            tick_millis: 100,
        }
    }
}

/// Wall clock that advances a fixed tick per read, so consecutive writes
/// always carry strictly increasing timestamps unless frozen.
#[derive(Debug)]
pub struct SimulatedClock {
    config: ClockConfig,
    next_millis: AtomicI64,
    frozen: AtomicBool,
}

impl SimulatedClock {
    #[must_use]
    pub const fn new(config: ClockConfig) -> Self {
        Self {
            config,
            next_millis: AtomicI64::new(config.base_millis),
            frozen: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub const fn config(&self) -> ClockConfig {
        self.config
    }

    /// Stop advancing; every read returns the same instant.
    pub fn freeze(&self) {
        self.frozen.store(true, Ordering::SeqCst);
    }

    pub fn unfreeze(&self) {
        self.frozen.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::SeqCst)
    }

    /// Milliseconds the next read will return.
    #[must_use]
    pub fn peek_millis(&self) -> i64 {
        self.next_millis.load(Ordering::SeqCst)
    }

    fn read_millis(&self) -> i64 {
        if self.is_frozen() {
            return self.peek_millis();
        }
        self.next_millis
            .fetch_add(self.config.tick_millis, Ordering::SeqCst)
    }
}

impl Default for SimulatedClock {
    fn default() -> Self {
        Self::new(ClockConfig::default())
    }
}

impl Clock for SimulatedClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.read_millis()).unwrap_or_default()
    }
}
