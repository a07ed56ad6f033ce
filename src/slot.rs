//! Record slots and the slot array
//!
//! One [`RecordSlot`] per ring cell, preallocated at startup. A slot is
//! mutated by exactly one thread at a time: the claiming producer until it
//! publishes, then the consumer until it releases. The claim/publish
//! protocol in the sequencer is what makes the [`SlotArray`]'s interior
//! mutability sound.

use std::cell::UnsafeCell;

use crate::buffer::{ LogBuffer, Payload };
use crate::constants::MAX_THREAD_NAME_LEN;
use crate::disruptor::Sequence;
use crate::level::Level;

/// One in-flight log record
#[derive(Debug)]
pub struct RecordSlot {
    pub(crate) level: Level,
    pub(crate) timestamp_millis: i64,
    pub(crate) logger_id: u32,
    pub(crate) thread_name: [u8; MAX_THREAD_NAME_LEN],
    pub(crate) thread_name_len: u8,
    pub(crate) truncated: bool,
    pub(crate) payload: Payload,
}

impl RecordSlot {
    pub(crate) fn new(payload_capacity: usize, multibyte: bool) -> Self {
        Self {
            level: Level::default(),
            timestamp_millis: 0,
            logger_id: 0,
            thread_name: [0; MAX_THREAD_NAME_LEN],
            thread_name_len: 0,
            truncated: false,
            payload: Payload::new(payload_capacity, multibyte),
        }
    }

    /// Prepare the slot for a fresh record: clear the payload and stamp the
    /// header fields. Called by the producer right after a claim.
    pub(crate) fn reset_for_claim(&mut self, level: Level, timestamp_millis: i64, logger_id: u32) {
        self.level = level;
        self.timestamp_millis = timestamp_millis;
        self.logger_id = logger_id;
        self.truncated = false;
        self.payload.clear();
        self.stamp_current_thread();
    }

    fn stamp_current_thread(&mut self) {
        let thread = std::thread::current();
        let name = thread.name().unwrap_or("");
        let mut len = name.len().min(MAX_THREAD_NAME_LEN);
        // truncate on a character boundary so the stored bytes stay UTF-8
        while len > 0 && !name.is_char_boundary(len) {
            len -= 1;
        }
        self.thread_name[..len].copy_from_slice(&name.as_bytes()[..len]);
        self.thread_name_len = len as u8;
    }

    /// Record severity
    pub fn level(&self) -> Level {
        self.level
    }

    /// Wall-clock milliseconds at claim time
    pub fn timestamp_millis(&self) -> i64 {
        self.timestamp_millis
    }

    /// Id assigned by the service's logger registry
    pub fn logger_id(&self) -> u32 {
        self.logger_id
    }

    /// Name of the producing thread, possibly truncated
    pub fn thread_name(&self) -> &str {
        std::str::from_utf8(&self.thread_name[..self.thread_name_len as usize]).unwrap_or("?")
    }

    /// True when a payload append ran out of slot capacity
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    /// The record's payload buffer
    pub fn payload(&self) -> &Payload {
        &self.payload
    }
}

/// The preallocated ring of record slots, addressed by
/// `sequence & (ring_size - 1)`
pub(crate) struct SlotArray {
    slots: Box<[UnsafeCell<RecordSlot>]>,
    mask: usize,
}

impl SlotArray {
    pub(crate) fn new(ring_size: usize, payload_capacity: usize, multibyte: bool) -> Self {
        debug_assert!(ring_size.is_power_of_two());
        let slots = (0..ring_size)
            .map(|_| UnsafeCell::new(RecordSlot::new(payload_capacity, multibyte)))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            slots,
            mask: ring_size - 1,
        }
    }

    /// Exclusive access to the slot for a sequence.
    ///
    /// # Safety
    ///
    /// The caller must hold the slot under the claim/publish protocol: a
    /// producer between claim and publish, or the consumer between the
    /// published frontier and release. No other thread may address the same
    /// sequence at the same time.
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn get(&self, sequence: Sequence) -> &mut RecordSlot {
        let idx = (sequence as usize) & self.mask;
        &mut *self.slots[idx].get()
    }
}

// Slots are handed across threads strictly by the claim/publish protocol.
unsafe impl Send for SlotArray {}
unsafe impl Sync for SlotArray {}
