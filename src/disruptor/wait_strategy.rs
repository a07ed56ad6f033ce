//! Wait strategies for the ring consumer
//!
//! A wait strategy controls how the consumer waits for the next published
//! sequence. Each offers a different trade-off between latency and CPU
//! usage; all of them observe the halt flag on every loop iteration and
//! fail with a shutdown error once it is set.

use std::sync::atomic::{ AtomicBool, AtomicI64, Ordering };
use std::thread;
use std::time::Duration;

use crate::config::WaitStrategyKind;
use crate::error::{ FluxlogError, Result };

use super::Sequence;

/// How the consumer waits for `sequence` to be published
pub trait WaitStrategy: Send + Sync {
    /// Wait until the publish cursor reaches at least `sequence`.
    ///
    /// Returns the cursor value actually observed, which may be higher
    /// than requested when publications have advanced further. Fails with
    /// `Shutdown` once `halt` is set.
    fn wait_for(&self, sequence: Sequence, cursor: &AtomicI64, halt: &AtomicBool) -> Result<Sequence>;

    /// Wake any consumer parked in `wait_for`
    fn signal_all_when_blocking(&self);
}

/// Build the strategy selected in the config
pub(crate) fn create(kind: WaitStrategyKind, await_timeout: Duration) -> Box<dyn WaitStrategy> {
    match kind {
        WaitStrategyKind::BusySpin => Box::new(BusySpinWaitStrategy::new()),
        WaitStrategyKind::Yielding => Box::new(YieldingWaitStrategy::new()),
        WaitStrategyKind::Sleeping => Box::new(SleepingWaitStrategy::new()),
        WaitStrategyKind::Blocking => Box::new(BlockingWaitStrategy::new(await_timeout)),
    }
}

/// Busy spin wait strategy - lowest latency, highest CPU usage.
/// Continuously checks the publish cursor in a tight loop; ideal when
/// latency is critical and a core can be dedicated to the consumer.
pub struct BusySpinWaitStrategy;

impl BusySpinWaitStrategy {
    /// Create a new busy spin wait strategy
    pub fn new() -> Self {
        Self
    }
}

impl Default for BusySpinWaitStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitStrategy for BusySpinWaitStrategy {
    fn wait_for(&self, sequence: Sequence, cursor: &AtomicI64, halt: &AtomicBool) -> Result<Sequence> {
        loop {
            if halt.load(Ordering::Acquire) {
                return Err(FluxlogError::Shutdown);
            }
            let available = cursor.load(Ordering::Acquire);
            if available >= sequence {
                return Ok(available);
            }
            std::hint::spin_loop();
        }
    }

    fn signal_all_when_blocking(&self) {
        // No-op for busy spin - no blocking threads to signal
    }
}

/// Yielding wait strategy - moderate CPU usage and latency.
/// Spins a bounded number of iterations, then yields the CPU to other
/// threads between checks.
pub struct YieldingWaitStrategy {
    spin_tries: usize,
}

impl YieldingWaitStrategy {
    /// Create a new yielding wait strategy
    pub fn new() -> Self {
        Self { spin_tries: 100 }
    }

    /// Create a new yielding wait strategy with a custom spin count
    pub fn with_spin_tries(spin_tries: usize) -> Self {
        Self { spin_tries }
    }
}

impl Default for YieldingWaitStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitStrategy for YieldingWaitStrategy {
    fn wait_for(&self, sequence: Sequence, cursor: &AtomicI64, halt: &AtomicBool) -> Result<Sequence> {
        let mut counter = 0usize;
        loop {
            if halt.load(Ordering::Acquire) {
                return Err(FluxlogError::Shutdown);
            }
            let available = cursor.load(Ordering::Acquire);
            if available >= sequence {
                return Ok(available);
            }
            if counter < self.spin_tries {
                std::hint::spin_loop();
                counter += 1;
            } else {
                thread::yield_now();
            }
        }
    }

    fn signal_all_when_blocking(&self) {
        // No-op for yielding - threads will wake up naturally
    }
}

/// Sleeping wait strategy - lowest CPU usage, higher latency.
/// Spins, then yields, then sleeps in exponentially increasing intervals
/// (capped at 1ms) between checks.
pub struct SleepingWaitStrategy {
    spin_tries: usize,
    yield_tries: usize,
    max_sleep: Duration,
}

impl SleepingWaitStrategy {
    /// Create a new sleeping wait strategy with the default backoff
    pub fn new() -> Self {
        Self {
            spin_tries: 100,
            yield_tries: 100,
            max_sleep: Duration::from_millis(1),
        }
    }
}

impl Default for SleepingWaitStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitStrategy for SleepingWaitStrategy {
    fn wait_for(&self, sequence: Sequence, cursor: &AtomicI64, halt: &AtomicBool) -> Result<Sequence> {
        let mut counter = 0usize;
        let mut sleep = Duration::from_micros(1);
        loop {
            if halt.load(Ordering::Acquire) {
                return Err(FluxlogError::Shutdown);
            }
            let available = cursor.load(Ordering::Acquire);
            if available >= sequence {
                return Ok(available);
            }
            if counter < self.spin_tries {
                std::hint::spin_loop();
                counter += 1;
            } else if counter < self.spin_tries + self.yield_tries {
                thread::yield_now();
                counter += 1;
            } else {
                thread::sleep(sleep);
                sleep = (sleep * 2).min(self.max_sleep);
            }
        }
    }

    fn signal_all_when_blocking(&self) {
        // No-op for sleeping - threads will wake up naturally
    }
}

/// Blocking wait strategy - lowest CPU at low throughput.
/// Parks the consumer on a condition variable signalled at publish. The
/// park is bounded by the configured await timeout, which also bounds the
/// window of a signal racing a consumer about to park.
pub struct BlockingWaitStrategy {
    mutex: parking_lot::Mutex<()>,
    condvar: parking_lot::Condvar,
    await_timeout: Duration,
}

impl BlockingWaitStrategy {
    /// Create a new blocking wait strategy with the given park timeout
    pub fn new(await_timeout: Duration) -> Self {
        Self {
            mutex: parking_lot::Mutex::new(()),
            condvar: parking_lot::Condvar::new(),
            await_timeout,
        }
    }
}

impl WaitStrategy for BlockingWaitStrategy {
    fn wait_for(&self, sequence: Sequence, cursor: &AtomicI64, halt: &AtomicBool) -> Result<Sequence> {
        loop {
            if halt.load(Ordering::Acquire) {
                return Err(FluxlogError::Shutdown);
            }
            let available = cursor.load(Ordering::Acquire);
            if available >= sequence {
                return Ok(available);
            }

            let mut guard = self.mutex.lock();
            // re-check under the lock so a publish that raced the park is
            // not missed
            let available = cursor.load(Ordering::Acquire);
            if available >= sequence {
                return Ok(available);
            }
            if halt.load(Ordering::Acquire) {
                return Err(FluxlogError::Shutdown);
            }
            self.condvar.wait_for(&mut guard, self.await_timeout);
        }
    }

    fn signal_all_when_blocking(&self) {
        self.condvar.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn wait_in_thread(
        strategy: Arc<dyn WaitStrategy>,
        cursor: Arc<AtomicI64>,
        halt: Arc<AtomicBool>,
        sequence: Sequence,
    ) -> thread::JoinHandle<Result<Sequence>> {
        thread::spawn(move || strategy.wait_for(sequence, &cursor, &halt))
    }

    fn check_wakes_on_publish(strategy: Arc<dyn WaitStrategy>) {
        let cursor = Arc::new(AtomicI64::new(-1));
        let halt = Arc::new(AtomicBool::new(false));

        let handle = wait_in_thread(
            Arc::clone(&strategy),
            Arc::clone(&cursor),
            Arc::clone(&halt),
            3,
        );

        thread::sleep(Duration::from_millis(10));
        cursor.store(5, Ordering::Release);
        strategy.signal_all_when_blocking();

        let observed = handle.join().unwrap().unwrap();
        assert!(observed >= 3);
    }

    #[test]
    fn test_busy_spin_wakes() {
        check_wakes_on_publish(Arc::new(BusySpinWaitStrategy::new()));
    }

    #[test]
    fn test_yielding_wakes() {
        check_wakes_on_publish(Arc::new(YieldingWaitStrategy::new()));
    }

    #[test]
    fn test_sleeping_wakes() {
        check_wakes_on_publish(Arc::new(SleepingWaitStrategy::new()));
    }

    #[test]
    fn test_blocking_wakes() {
        check_wakes_on_publish(Arc::new(BlockingWaitStrategy::new(Duration::from_millis(5))));
    }

    #[test]
    fn test_already_available_returns_immediately() {
        let strategy = BusySpinWaitStrategy::new();
        let cursor = AtomicI64::new(10);
        let halt = AtomicBool::new(false);
        assert_eq!(strategy.wait_for(7, &cursor, &halt).unwrap(), 10);
    }

    #[test]
    fn test_shutdown_handling() {
        let cursor = Arc::new(AtomicI64::new(-1));
        let halt = Arc::new(AtomicBool::new(false));
        let strategy: Arc<dyn WaitStrategy> =
            Arc::new(BlockingWaitStrategy::new(Duration::from_millis(5)));

        let handle = wait_in_thread(
            Arc::clone(&strategy),
            Arc::clone(&cursor),
            Arc::clone(&halt),
            0,
        );

        thread::sleep(Duration::from_millis(10));
        halt.store(true, Ordering::Release);
        strategy.signal_all_when_blocking();

        assert!(matches!(handle.join().unwrap(), Err(FluxlogError::Shutdown)));
    }
}
