//! Logger service configuration
//!
//! Configuration is an explicit value handed to [`crate::service::LoggerService`];
//! there is no process-global lookup. `Config::from_properties` understands
//! the classic `gflogger.*` property keys so deployments carrying those can
//! keep them.

use std::str::FromStr;
use std::time::Duration;

use chrono::Locale;
use chrono_tz::Tz;
use serde::{ Deserialize, Serialize };

use crate::constants::{
    DEFAULT_AWAIT_TIMEOUT_MS,
    DEFAULT_BUFFERED_IO_THRESHOLD,
    DEFAULT_BUFFER_SIZE,
    DEFAULT_CONSUMER_THREAD_NAME,
    DEFAULT_PATTERN,
    DEFAULT_RING_SIZE,
    MIN_SLOT_CAPACITY,
};
use crate::error::{ FluxlogError, Result };
use crate::level::Level;

/// How many application threads publish into the ring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProducerMode {
    /// Exactly one logging thread. No CAS on claim; the caller guarantees
    /// single-threaded use of the producer API.
    Single,
    /// Any number of logging threads; claims are CAS-arbitrated and
    /// publication is tracked per cell.
    Multi,
}

/// Available wait strategies for the consumer thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaitStrategyKind {
    /// Busy spin for lowest latency, burns a core
    BusySpin,
    /// Bounded spin, then yield to the scheduler
    Yielding,
    /// Spin, yield, then sleep with exponential backoff
    Sleeping,
    /// Park on a condition variable signalled at publish
    Blocking,
}

/// Configuration for a logger service instance
#[derive(Debug, Clone)]
pub struct Config {
    /// Number of ring slots (power of 2)
    pub ring_size: usize,
    /// Total payload arena in bytes, split evenly across slots
    pub buffer_size: usize,
    /// Slots hold char buffers instead of byte buffers
    pub multibyte: bool,
    /// Minimum level the appender will render
    pub level: Level,
    /// Time zone used by the layout's `%d` specifier
    pub time_zone: Tz,
    /// Locale used when rendering localized date parts
    pub locale: Locale,
    /// Layout pattern string
    pub pattern: String,
    /// Flush the output buffer after every record
    pub immediate_flush: bool,
    /// Output-buffer fill level that forces a flush
    pub buffered_io_threshold: usize,
    /// Park interval of the blocking wait strategy
    pub await_timeout: Duration,
    /// Producer arbitration mode
    pub producer_mode: ProducerMode,
    /// Consumer wait strategy
    pub wait_strategy: WaitStrategyKind,
    /// Name given to the consumer thread
    pub consumer_thread_name: String,
    /// Pin the consumer thread to this CPU, if set
    pub consumer_cpu: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ring_size: DEFAULT_RING_SIZE,
            buffer_size: DEFAULT_BUFFER_SIZE,
            multibyte: false,
            level: Level::default(),
            time_zone: Tz::UTC,
            locale: Locale::POSIX,
            pattern: DEFAULT_PATTERN.to_string(),
            immediate_flush: false,
            buffered_io_threshold: DEFAULT_BUFFERED_IO_THRESHOLD,
            await_timeout: Duration::from_millis(DEFAULT_AWAIT_TIMEOUT_MS),
            producer_mode: ProducerMode::Multi,
            wait_strategy: WaitStrategyKind::Blocking,
            consumer_thread_name: DEFAULT_CONSUMER_THREAD_NAME.to_string(),
            consumer_cpu: None,
        }
    }
}

impl Config {
    /// Create a new configuration with the specified ring size
    pub fn new(ring_size: usize) -> Result<Self> {
        if ring_size == 0 {
            return Err(FluxlogError::config("Ring size must be greater than 0"));
        }
        if !ring_size.is_power_of_two() {
            return Err(FluxlogError::config("Ring size must be power of 2"));
        }

        Ok(Self {
            ring_size,
            ..Default::default()
        })
    }

    /// Set the total payload arena size in bytes
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Result<Self> {
        if buffer_size / self.ring_size < MIN_SLOT_CAPACITY {
            return Err(
                FluxlogError::config(
                    format!(
                        "Buffer size {} leaves less than {} bytes per slot",
                        buffer_size,
                        MIN_SLOT_CAPACITY
                    )
                )
            );
        }
        self.buffer_size = buffer_size;
        Ok(self)
    }

    /// Use char-buffer slots instead of byte-buffer slots
    pub fn with_multibyte(mut self, multibyte: bool) -> Self {
        self.multibyte = multibyte;
        self
    }

    /// Set the minimum level the appender renders
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Set the layout time zone
    pub fn with_time_zone(mut self, time_zone: Tz) -> Self {
        self.time_zone = time_zone;
        self
    }

    /// Set the layout locale
    pub fn with_locale(mut self, locale: Locale) -> Self {
        self.locale = locale;
        self
    }

    /// Set the layout pattern
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    /// Flush the output buffer after every record
    pub fn with_immediate_flush(mut self, immediate_flush: bool) -> Self {
        self.immediate_flush = immediate_flush;
        self
    }

    /// Set the output-buffer fill level that forces a flush
    pub fn with_buffered_io_threshold(mut self, threshold: usize) -> Result<Self> {
        if threshold == 0 {
            return Err(FluxlogError::config("Buffered I/O threshold must be greater than 0"));
        }
        self.buffered_io_threshold = threshold;
        Ok(self)
    }

    /// Set the blocking wait strategy's park interval
    pub fn with_await_timeout(mut self, await_timeout: Duration) -> Self {
        self.await_timeout = await_timeout;
        self
    }

    /// Set the producer arbitration mode
    pub fn with_producer_mode(mut self, mode: ProducerMode) -> Self {
        self.producer_mode = mode;
        self
    }

    /// Set the consumer wait strategy
    pub fn with_wait_strategy(mut self, strategy: WaitStrategyKind) -> Self {
        self.wait_strategy = strategy;
        self
    }

    /// Set the consumer thread name
    pub fn with_consumer_thread_name(mut self, name: impl Into<String>) -> Self {
        self.consumer_thread_name = name.into();
        self
    }

    /// Pin the consumer thread to a CPU
    pub fn with_consumer_cpu(mut self, cpu: usize) -> Self {
        self.consumer_cpu = Some(cpu);
        self
    }

    /// Per-slot payload capacity, in bytes (byte mode) or chars (multibyte)
    pub fn slot_capacity(&self) -> usize {
        self.buffer_size / self.ring_size
    }

    /// Build a configuration from `gflogger.*` property key/value pairs.
    ///
    /// Unrecognized keys are rejected so typos surface at startup instead of
    /// silently falling back to defaults.
    pub fn from_properties<'a, I>(properties: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut config = Config::default();

        for (key, value) in properties {
            match key {
                "gflogger.buffer.size" => {
                    let size = parse_number(key, value)?;
                    config = config.with_buffer_size(size)?;
                }
                "gflogger.multibyte" => {
                    config.multibyte = parse_bool(key, value)?;
                }
                "gflogger.loglevel" => {
                    config.level = Level::from_str(value)?;
                }
                "gflogger.timeZoneId" => {
                    config.time_zone = value
                        .parse::<Tz>()
                        .map_err(|_| {
                            FluxlogError::config(format!("Unknown time zone: {value}"))
                        })?;
                }
                "gflogger.language" => {
                    config.locale = Locale::try_from(value).map_err(|_| {
                        FluxlogError::config(format!("Unknown locale: {value}"))
                    })?;
                }
                "gflogger.pattern" => {
                    config.pattern = value.to_string();
                }
                "gflogger.immediateFlush" => {
                    config.immediate_flush = parse_bool(key, value)?;
                }
                "gflogger.bufferedIOThreshold" => {
                    let threshold = parse_number(key, value)?;
                    config = config.with_buffered_io_threshold(threshold)?;
                }
                "gflogger.awaitTimeout" => {
                    let millis = parse_number(key, value)? as u64;
                    config.await_timeout = Duration::from_millis(millis);
                }
                other => {
                    return Err(FluxlogError::config(format!("Unknown property: {other}")));
                }
            }
        }

        Ok(config)
    }
}

fn parse_number(key: &str, value: &str) -> Result<usize> {
    value
        .trim()
        .parse::<usize>()
        .map_err(|_| FluxlogError::config(format!("{key}: expected a number, got {value:?}")))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(FluxlogError::config(format!("{key}: expected true/false, got {other:?}"))),
    }
}
