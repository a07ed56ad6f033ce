//! Injectable wall-clock time source
//!
//! Record timestamps are taken through the [`Clock`] trait so tests can run
//! the whole pipeline against a deterministic clock instead of the system
//! time.

use std::sync::atomic::{ AtomicI64, Ordering };
use std::time::{ SystemTime, UNIX_EPOCH };

/// Source of wall-clock time in milliseconds since the Unix epoch
pub trait Clock: Send + Sync {
    /// Current time in milliseconds since the Unix epoch
    fn now_millis(&self) -> i64;
}

/// Real system clock
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }
}

/// Manually advanced clock for tests
#[derive(Debug)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    /// Create a manual clock starting at the given millisecond timestamp
    pub fn new(start_millis: i64) -> Self {
        Self {
            millis: AtomicI64::new(start_millis),
        }
    }

    /// Set the absolute time
    pub fn set(&self, millis: i64) {
        self.millis.store(millis, Ordering::Release);
    }

    /// Advance the clock by the given number of milliseconds
    pub fn advance(&self, delta_millis: i64) {
        self.millis.fetch_add(delta_millis, Ordering::AcqRel);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.millis.load(Ordering::Acquire)
    }
}
