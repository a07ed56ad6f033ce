//! Claim/publish sequencing over a power-of-two ring
//!
//! Three monotonic cursors govern the ring, all starting at −1:
//!
//! - `claim`: highest sequence handed to a producer
//! - `publish`: highest sequence any producer has made visible
//! - `consumer`: highest sequence fully drained and released
//!
//! Invariant: `consumer ≤ publish ≤ claim` and
//! `claim − consumer ≤ ring_size` (the backpressure gate).
//!
//! In multi-producer mode publications can complete out of claim order, so
//! a per-cell availability marker records which sequence a cell last
//! published; the consumer only advances across a contiguous run of
//! available cells.

use std::sync::atomic::{ AtomicBool, AtomicI64, Ordering };

use crossbeam_utils::CachePadded;

use crate::config::ProducerMode;
use crate::error::{ FluxlogError, Result };

use super::{ Sequence, INITIAL_SEQUENCE };

// Spin briefly, then get out of the scheduler's way.
#[inline]
fn backoff(spins: &mut u32) {
    *spins = spins.wrapping_add(1);
    if *spins < 100 {
        std::hint::spin_loop();
    } else {
        std::thread::yield_now();
    }
}

/// Sequencer for exactly one producer thread: claims are plain stores
pub struct SingleProducerSequencer {
    ring_size: i64,
    claim: CachePadded<AtomicI64>,
    publish: CachePadded<AtomicI64>,
    consumer: CachePadded<AtomicI64>,
}

impl SingleProducerSequencer {
    fn new(ring_size: usize) -> Self {
        Self {
            ring_size: ring_size as i64,
            claim: CachePadded::new(AtomicI64::new(INITIAL_SEQUENCE)),
            publish: CachePadded::new(AtomicI64::new(INITIAL_SEQUENCE)),
            consumer: CachePadded::new(AtomicI64::new(INITIAL_SEQUENCE)),
        }
    }
}

/// Sequencer for any number of producer threads: claims are CAS-advanced
/// and publication is tracked per cell
pub struct MultiProducerSequencer {
    ring_size: i64,
    mask: usize,
    claim: CachePadded<AtomicI64>,
    publish: CachePadded<AtomicI64>,
    consumer: CachePadded<AtomicI64>,
    available: Box<[AtomicI64]>,
}

impl MultiProducerSequencer {
    fn new(ring_size: usize) -> Self {
        let available = (0..ring_size)
            .map(|_| AtomicI64::new(INITIAL_SEQUENCE))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            ring_size: ring_size as i64,
            mask: ring_size - 1,
            claim: CachePadded::new(AtomicI64::new(INITIAL_SEQUENCE)),
            publish: CachePadded::new(AtomicI64::new(INITIAL_SEQUENCE)),
            consumer: CachePadded::new(AtomicI64::new(INITIAL_SEQUENCE)),
            available,
        }
    }
}

/// Claim/publish coordinator, dispatching on the producer mode chosen at
/// ring construction
pub enum Sequencer {
    /// One producer thread, no CAS
    Single(SingleProducerSequencer),
    /// CAS-arbitrated claims with per-cell availability
    Multi(MultiProducerSequencer),
}

impl Sequencer {
    /// Create a sequencer for the given mode and ring size (power of 2)
    pub fn new(mode: ProducerMode, ring_size: usize) -> Self {
        debug_assert!(ring_size.is_power_of_two());
        match mode {
            ProducerMode::Single => Sequencer::Single(SingleProducerSequencer::new(ring_size)),
            ProducerMode::Multi => Sequencer::Multi(MultiProducerSequencer::new(ring_size)),
        }
    }

    /// Claim the next `n` sequences, spinning while the ring is full.
    ///
    /// Returns the highest claimed sequence; the claimed range is
    /// `(returned - n, returned]`. Fails with `Shutdown` once `halt` is
    /// set.
    pub fn claim(&self, n: usize, halt: &AtomicBool) -> Result<Sequence> {
        let n = n as i64;
        match self {
            Sequencer::Single(s) => {
                let next = s.claim.load(Ordering::Relaxed) + n;
                let mut spins = 0u32;
                loop {
                    if halt.load(Ordering::Acquire) {
                        return Err(FluxlogError::Shutdown);
                    }
                    if next - s.consumer.load(Ordering::Acquire) <= s.ring_size {
                        break;
                    }
                    backoff(&mut spins);
                }
                s.claim.store(next, Ordering::Relaxed);
                Ok(next)
            }
            Sequencer::Multi(m) => {
                let mut spins = 0u32;
                loop {
                    if halt.load(Ordering::Acquire) {
                        return Err(FluxlogError::Shutdown);
                    }
                    let current = m.claim.load(Ordering::Relaxed);
                    let next = current + n;
                    if next - m.consumer.load(Ordering::Acquire) > m.ring_size {
                        backoff(&mut spins);
                        continue;
                    }
                    match
                        m.claim.compare_exchange_weak(
                            current,
                            next,
                            Ordering::AcqRel,
                            Ordering::Relaxed
                        )
                    {
                        Ok(_) => {
                            return Ok(next);
                        }
                        Err(_) => std::hint::spin_loop(),
                    }
                }
            }
        }
    }

    /// Claim without blocking: fails with `RingFull` when backpressure
    /// denies the claim
    pub fn try_claim(&self, n: usize, halt: &AtomicBool) -> Result<Sequence> {
        if halt.load(Ordering::Acquire) {
            return Err(FluxlogError::Shutdown);
        }
        let n = n as i64;
        match self {
            Sequencer::Single(s) => {
                let next = s.claim.load(Ordering::Relaxed) + n;
                if next - s.consumer.load(Ordering::Acquire) > s.ring_size {
                    return Err(FluxlogError::RingFull);
                }
                s.claim.store(next, Ordering::Relaxed);
                Ok(next)
            }
            Sequencer::Multi(m) => {
                loop {
                    let current = m.claim.load(Ordering::Relaxed);
                    let next = current + n;
                    if next - m.consumer.load(Ordering::Acquire) > m.ring_size {
                        return Err(FluxlogError::RingFull);
                    }
                    match
                        m.claim.compare_exchange_weak(
                            current,
                            next,
                            Ordering::AcqRel,
                            Ordering::Relaxed
                        )
                    {
                        Ok(_) => {
                            return Ok(next);
                        }
                        Err(_) => std::hint::spin_loop(),
                    }
                }
            }
        }
    }

    /// Make the claimed range `[lo, hi]` visible to the consumer.
    ///
    /// The release store here is what publishes the producer's payload
    /// writes.
    pub fn publish(&self, lo: Sequence, hi: Sequence) {
        match self {
            Sequencer::Single(s) => {
                s.publish.store(hi, Ordering::Release);
            }
            Sequencer::Multi(m) => {
                for seq in lo..=hi {
                    m.available[(seq as usize) & m.mask].store(seq, Ordering::Release);
                }
                // Advance the shared publish cursor to at least hi so
                // waiting consumers wake; contiguity is resolved by
                // highest_published.
                let mut current = m.publish.load(Ordering::Relaxed);
                while current < hi {
                    match
                        m.publish.compare_exchange_weak(
                            current,
                            hi,
                            Ordering::Release,
                            Ordering::Relaxed
                        )
                    {
                        Ok(_) => {
                            break;
                        }
                        Err(actual) => {
                            current = actual;
                        }
                    }
                }
            }
        }
    }

    /// Highest sequence in `[from, to]` such that every sequence up to it
    /// has actually been published. In multi-producer mode this scans the
    /// availability markers; gaps left by in-flight producers stop the
    /// scan.
    pub fn highest_published(&self, from: Sequence, to: Sequence) -> Sequence {
        match self {
            Sequencer::Single(_) => to,
            Sequencer::Multi(m) => {
                for seq in from..=to {
                    let marker = m.available[(seq as usize) & m.mask].load(Ordering::Acquire);
                    debug_assert!(marker <= seq, "availability marker corruption at {seq}");
                    if marker != seq {
                        return seq - 1;
                    }
                }
                to
            }
        }
    }

    /// Release every sequence up to and including `seq` back to producers
    pub fn release(&self, seq: Sequence) {
        self.consumer_cursor().store(seq, Ordering::Release);
    }

    /// The publish cursor the wait strategies poll
    pub fn publish_cursor(&self) -> &AtomicI64 {
        match self {
            Sequencer::Single(s) => &s.publish,
            Sequencer::Multi(m) => &m.publish,
        }
    }

    /// The consumer (release) cursor backpressure reads
    pub fn consumer_cursor(&self) -> &AtomicI64 {
        match self {
            Sequencer::Single(s) => &s.consumer,
            Sequencer::Multi(m) => &m.consumer,
        }
    }

    /// Highest claimed sequence
    pub fn claim_cursor_value(&self) -> Sequence {
        match self {
            Sequencer::Single(s) => s.claim.load(Ordering::Acquire),
            Sequencer::Multi(m) => m.claim.load(Ordering::Acquire),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn no_halt() -> AtomicBool {
        AtomicBool::new(false)
    }

    #[test]
    fn test_initial_cursors() {
        let seq = Sequencer::new(ProducerMode::Multi, 8);
        assert_eq!(seq.claim_cursor_value(), INITIAL_SEQUENCE);
        assert_eq!(seq.publish_cursor().load(Ordering::Acquire), INITIAL_SEQUENCE);
        assert_eq!(seq.consumer_cursor().load(Ordering::Acquire), INITIAL_SEQUENCE);
    }

    #[test]
    fn test_single_claim_publish() {
        let halt = no_halt();
        let seq = Sequencer::new(ProducerMode::Single, 8);

        assert_eq!(seq.claim(1, &halt).unwrap(), 0);
        assert_eq!(seq.claim(1, &halt).unwrap(), 1);
        seq.publish(0, 1);
        assert_eq!(seq.publish_cursor().load(Ordering::Acquire), 1);
        assert_eq!(seq.highest_published(0, 1), 1);
    }

    #[test]
    fn test_backpressure_bound() {
        let halt = no_halt();
        let seq = Sequencer::new(ProducerMode::Multi, 4);

        for expected in 0..4 {
            assert_eq!(seq.try_claim(1, &halt).unwrap(), expected);
        }
        // ring is full until the consumer releases
        assert!(matches!(seq.try_claim(1, &halt), Err(FluxlogError::RingFull)));

        seq.release(0);
        assert_eq!(seq.try_claim(1, &halt).unwrap(), 4);
        assert!(matches!(seq.try_claim(1, &halt), Err(FluxlogError::RingFull)));
    }

    #[test]
    fn test_claim_fails_after_halt() {
        let halt = AtomicBool::new(true);
        let seq = Sequencer::new(ProducerMode::Single, 4);
        assert!(matches!(seq.claim(1, &halt), Err(FluxlogError::Shutdown)));
        assert!(matches!(seq.try_claim(1, &halt), Err(FluxlogError::Shutdown)));
    }

    #[test]
    fn test_multi_gap_hidden_until_contiguous() {
        let halt = no_halt();
        let seq = Sequencer::new(ProducerMode::Multi, 8);

        assert_eq!(seq.claim(1, &halt).unwrap(), 0);
        assert_eq!(seq.claim(1, &halt).unwrap(), 1);

        // second claim publishes first: the frontier must not move
        seq.publish(1, 1);
        assert_eq!(seq.highest_published(0, seq.publish_cursor().load(Ordering::Acquire)), -1);

        seq.publish(0, 0);
        assert_eq!(seq.highest_published(0, seq.publish_cursor().load(Ordering::Acquire)), 1);
    }

    #[test]
    fn test_multi_concurrent_claims_are_distinct() {
        let seq = Arc::new(Sequencer::new(ProducerMode::Multi, 1024));
        let halt = Arc::new(no_halt());
        let mut handles = Vec::new();

        for _ in 0..4 {
            let seq = Arc::clone(&seq);
            let halt = Arc::clone(&halt);
            handles.push(
                thread::spawn(move || {
                    let mut claimed = Vec::with_capacity(256);
                    for _ in 0..256 {
                        let s = seq.claim(1, &halt).unwrap();
                        claimed.push(s);
                        seq.publish(s, s);
                    }
                    // release is normally the consumer's job; emulate it so
                    // backpressure never triggers in this test
                    claimed
                })
            );
        }

        let mut all: Vec<Sequence> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort_unstable();
        let expected: Vec<Sequence> = (0..1024).collect();
        assert_eq!(all, expected);
        assert_eq!(seq.highest_published(0, 1023), 1023);
    }
}
