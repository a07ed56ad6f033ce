//! Global constants for fluxlog
//!
//! Central location for sizing defaults and limits used across the crate.
//! Runtime-tunable values live in [`crate::config::Config`]; these are the
//! fallbacks it starts from.

/// Default number of slots in the ring (must be power of 2)
pub const DEFAULT_RING_SIZE: usize = 1024;

/// Default total payload arena in bytes, split evenly across ring slots
/// (1 MiB / 1024 slots = 1 KiB per record)
pub const DEFAULT_BUFFER_SIZE: usize = 1 << 20;

/// Smallest per-slot payload capacity the config will accept
pub const MIN_SLOT_CAPACITY: usize = 64;

/// Maximum bytes of a producer thread's name stored per record;
/// longer names are truncated at a character boundary
pub const MAX_THREAD_NAME_LEN: usize = 32;

/// Default output-buffer fill level that forces a sink flush
pub const DEFAULT_BUFFERED_IO_THRESHOLD: usize = 64 * 1024;

/// Default park interval for the blocking wait strategy, in milliseconds
pub const DEFAULT_AWAIT_TIMEOUT_MS: u64 = 10;

/// How long `LoggerService` drop waits for the final drain, in milliseconds
pub const DEFAULT_STOP_TIMEOUT_MS: u64 = 5_000;

/// Marker appended to a record whose payload ran out of slot capacity
pub const TRUNCATION_MARKER: &str = ">>";

/// Default layout pattern (see `layout` module for the specifier subset)
pub const DEFAULT_PATTERN: &str = "%d %p [%t] %c - %m%n";

/// Default strftime format for the `%d` layout specifier
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Default name of the consumer thread
pub const DEFAULT_CONSUMER_THREAD_NAME: &str = "fluxlog-appender";

/// Extra output-buffer headroom reserved for the rendered record header
pub const HEADER_MARGIN: usize = 1024;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_size_power_of_two() {
        assert!(DEFAULT_RING_SIZE.is_power_of_two());
    }

    #[test]
    fn test_slot_capacity_default() {
        assert!(DEFAULT_BUFFER_SIZE / DEFAULT_RING_SIZE >= MIN_SLOT_CAPACITY);
    }
}
