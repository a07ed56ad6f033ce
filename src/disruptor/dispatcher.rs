//! The consumer thread
//!
//! One dispatcher owns one consumer thread. The loop waits for the next
//! published sequence, hands each slot of the contiguous published run to
//! the appender, then releases the run back to producers in one store.
//! On halt the consumer drains everything already published before it
//! exits, unless the stop timeout has marked the tail abandoned.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{ self, JoinHandle };
use std::time::{ Duration, Instant };

use crate::appender::{ Appender, ErrorHandler };
use crate::error::{ FluxlogError, Result };

use super::{ Ring, Sequence, INITIAL_SEQUENCE };

// Pin the calling thread to one CPU so the consumer keeps its cache warm.
#[cfg(target_os = "linux")]
fn pin_to_cpu(cpu_id: usize) -> Result<()> {
    use std::mem;

    let rc = unsafe {
        let mut cpu_set: libc::cpu_set_t = mem::zeroed();
        libc::CPU_ZERO(&mut cpu_set);
        libc::CPU_SET(cpu_id, &mut cpu_set);
        libc::sched_setaffinity(0, mem::size_of::<libc::cpu_set_t>(), &cpu_set)
    };
    if rc != 0 {
        return Err(
            FluxlogError::system_resource(
                format!(
                    "Failed to pin consumer thread to CPU {cpu_id}: {}",
                    std::io::Error::last_os_error()
                )
            )
        );
    }
    Ok(())
}

#[cfg(target_os = "macos")]
fn pin_to_cpu(cpu_id: usize) -> Result<()> {
    let mut policy = libc::thread_affinity_policy_data_t {
        affinity_tag: cpu_id as i32,
    };
    let rc = unsafe {
        libc::thread_policy_set(
            libc::pthread_self() as libc::mach_port_t,
            libc::THREAD_AFFINITY_POLICY as u32,
            &mut policy as *mut _ as *mut i32,
            1,
        )
    };
    if rc != 0 {
        return Err(
            FluxlogError::system_resource(
                format!("Failed to pin consumer thread to CPU {cpu_id}: code {rc}")
            )
        );
    }
    Ok(())
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn pin_to_cpu(_cpu_id: usize) -> Result<()> {
    Ok(())
}

pub(crate) struct Dispatcher {
    handle: Option<JoinHandle<()>>,
}

impl Dispatcher {
    /// Spawn the consumer thread and start pumping published slots
    pub(crate) fn start(
        ring: Arc<Ring>,
        mut appender: Appender,
        thread_name: String,
        cpu: Option<usize>,
        error_handler: ErrorHandler,
    ) -> Result<Self> {
        let handle = thread::Builder
            ::new()
            .name(thread_name)
            .spawn(move || {
                if let Some(cpu_id) = cpu {
                    if let Err(e) = pin_to_cpu(cpu_id) {
                        (error_handler)(&e);
                    }
                }
                Self::run(&ring, &mut appender);
                appender.close();
            })
            .map_err(|e| {
                FluxlogError::system_resource(format!("Failed to spawn consumer thread: {e}"))
            })?;

        Ok(Self {
            handle: Some(handle),
        })
    }

    fn run(ring: &Ring, appender: &mut Appender) {
        let mut next: Sequence = INITIAL_SEQUENCE + 1;
        loop {
            match ring.wait.wait_for(next, ring.sequencer.publish_cursor(), &ring.halt) {
                Ok(available) => {
                    let highest = ring.sequencer.highest_published(next, available);
                    if highest >= next {
                        for seq in next..=highest {
                            // Sole reader of published, unreleased slots.
                            let slot = unsafe { ring.slots.get(seq) };
                            appender.process(slot);
                        }
                        appender.end_of_batch();
                        ring.sequencer.release(highest);
                        next = highest + 1;
                    }
                }
                Err(_) => {
                    Self::final_drain(ring, appender, next);
                    return;
                }
            }
        }
    }

    // Everything published at the moment of halt is still written out.
    fn final_drain(ring: &Ring, appender: &mut Appender, next: Sequence) {
        let published = ring.sequencer.publish_cursor().load(Ordering::Acquire);
        let highest = ring.sequencer.highest_published(next, published);
        if highest < next {
            return;
        }
        for seq in next..=highest {
            if ring.abandon.load(Ordering::Acquire) {
                break;
            }
            let slot = unsafe { ring.slots.get(seq) };
            appender.process(slot);
        }
        appender.end_of_batch();
        ring.sequencer.release(highest);
    }

    /// Signal halt and wait for the final drain.
    ///
    /// On timeout the remaining tail is marked abandoned and a timeout
    /// error is returned; the caller surfaces the warning.
    pub(crate) fn stop(&mut self, ring: &Ring, timeout: Duration) -> Result<()> {
        ring.halt.store(true, Ordering::Release);
        ring.wait.signal_all_when_blocking();

        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        let deadline = Instant::now() + timeout;
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                ring.abandon.store(true, Ordering::Release);
                // consumer finishes detached; its tail is dropped
                return Err(FluxlogError::Timeout);
            }
            thread::sleep(Duration::from_millis(1));
        }
        handle
            .join()
            .map_err(|_| FluxlogError::system_resource("Consumer thread panicked"))
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        debug_assert!(self.handle.is_none(), "dispatcher dropped without stop");
    }
}
