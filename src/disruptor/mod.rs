//! Lock-free ring plumbing based on the LMAX Disruptor pattern.
//!
//! The ring decouples application threads from I/O:
//!
//! | Piece | Role |
//! |-------|------|
//! | `sequencer` | Monotonic claim/publish coordination, single- or multi-producer |
//! | `wait_strategy` | How the consumer waits for the next published sequence |
//! | `dispatcher` | The consumer thread pumping published slots into the appender |
//!
//! Producers claim a sequence, write the slot it addresses, then publish;
//! the consumer drains contiguous published sequences and releases them.
//! All cursors are cache-line padded to avoid false sharing.
//!
//! ## Safety
//!
//! Slot access uses `unsafe` interior mutability. The claim/publish
//! protocol guarantees no two threads ever address the same slot at the
//! same time; see `SlotArray::get`.

pub mod sequencer;
pub mod wait_strategy;

pub(crate) mod dispatcher;

pub use sequencer::Sequencer;
pub use wait_strategy::{
    BlockingWaitStrategy,
    BusySpinWaitStrategy,
    SleepingWaitStrategy,
    WaitStrategy,
    YieldingWaitStrategy,
};

use std::sync::atomic::AtomicBool;

use crate::config::Config;
use crate::slot::SlotArray;

/// Sequence number type for ring positions
pub type Sequence = i64;

/// Value of every cursor and availability marker before anything is
/// claimed or published
pub const INITIAL_SEQUENCE: Sequence = -1;

/// Everything producers and the consumer share: the slot array, the
/// sequencer, the wait strategy and the shutdown flags.
pub(crate) struct Ring {
    pub(crate) slots: SlotArray,
    pub(crate) sequencer: Sequencer,
    pub(crate) wait: Box<dyn WaitStrategy>,
    /// Producers stop claiming and the consumer starts its final drain
    pub(crate) halt: AtomicBool,
    /// Set when the stop timeout expired; the final drain abandons the tail
    pub(crate) abandon: AtomicBool,
}

impl Ring {
    pub(crate) fn new(config: &Config) -> Self {
        Self {
            slots: SlotArray::new(config.ring_size, config.slot_capacity(), config.multibyte),
            sequencer: Sequencer::new(config.producer_mode, config.ring_size),
            wait: wait_strategy::create(config.wait_strategy, config.await_timeout),
            halt: AtomicBool::new(false),
            abandon: AtomicBool::new(false),
        }
    }
}
