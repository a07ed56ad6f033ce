//! The logger service: wiring, lifecycle, and the producer entry points
//!
//! A [`LoggerService`] allocates the ring, slots, sequencer and output
//! buffer once at startup, spawns the consumer thread, and hands producers
//! record builders. Everything injectable — sink, layout, clock, error
//! handler — comes in through the builder so tests run the whole pipeline
//! deterministically.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use crate::appender::{ stderr_error_handler, Appender, ConsoleSink, ConsoleStream, ErrorHandler, Sink };
use crate::clock::{ Clock, SystemClock };
use crate::config::Config;
use crate::constants::DEFAULT_STOP_TIMEOUT_MS;
use crate::disruptor::dispatcher::Dispatcher;
use crate::disruptor::{ Ring, Sequence };
use crate::error::Result;
use crate::layout::{ Layout, TextLayout };
use crate::level::Level;
use crate::pattern::Template;
use crate::record::{ RecordBuilder, TemplateBuilder };

/// Maps logger names to the compact ids carried in slots
pub struct LoggerRegistry {
    names: RwLock<Vec<String>>,
}

impl LoggerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            names: RwLock::new(Vec::new()),
        }
    }

    /// Register a logger name, returning its id; registering the same name
    /// twice returns the same id
    pub fn register(&self, name: &str) -> u32 {
        let mut names = self.names.write();
        if let Some(idx) = names.iter().position(|n| n == name) {
            return idx as u32;
        }
        names.push(name.to_string());
        (names.len() - 1) as u32
    }

    /// Run `f` on the name for an id; unknown ids resolve to `root`
    pub fn with_name<R>(&self, id: u32, f: impl FnOnce(&str) -> R) -> R {
        let names = self.names.read();
        f(names.get(id as usize).map(String::as_str).unwrap_or("root"))
    }
}

impl Default for LoggerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for a [`LoggerService`]
pub struct LoggerServiceBuilder {
    config: Config,
    registry: Arc<LoggerRegistry>,
    sink: Option<Box<dyn Sink>>,
    layout: Option<Box<dyn Layout>>,
    clock: Arc<dyn Clock>,
    error_handler: ErrorHandler,
}

impl LoggerServiceBuilder {
    fn new(config: Config) -> Self {
        Self {
            config,
            registry: Arc::new(LoggerRegistry::new()),
            sink: None,
            layout: None,
            clock: Arc::new(SystemClock),
            error_handler: stderr_error_handler(),
        }
    }

    /// The registry the service (and default layout) will use; custom
    /// layouts resolve logger names through this
    pub fn registry(&self) -> Arc<LoggerRegistry> {
        Arc::clone(&self.registry)
    }

    /// Replace the default console sink
    pub fn sink(mut self, sink: impl Sink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Replace the default text layout
    pub fn layout(mut self, layout: impl Layout + 'static) -> Self {
        self.layout = Some(Box::new(layout));
        self
    }

    /// Replace the system clock
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the stderr fallback error handler
    pub fn error_handler(mut self, handler: ErrorHandler) -> Self {
        self.error_handler = handler;
        self
    }

    /// Allocate the ring and start the consumer thread
    pub fn start(self) -> Result<LoggerService> {
        let layout: Box<dyn Layout> = match self.layout {
            Some(layout) => layout,
            None =>
                Box::new(
                    TextLayout::new(
                        &self.config.pattern,
                        self.config.time_zone,
                        self.config.locale,
                        Arc::clone(&self.registry),
                    )?
                ),
        };
        let sink: Box<dyn Sink> = match self.sink {
            Some(sink) => sink,
            None => Box::new(ConsoleSink::new(ConsoleStream::Stdout)),
        };

        let ring = Arc::new(Ring::new(&self.config));
        let appender = Appender::new(&self.config, layout, sink, Arc::clone(&self.error_handler));
        let dispatcher = Dispatcher::start(
            Arc::clone(&ring),
            appender,
            self.config.consumer_thread_name.clone(),
            self.config.consumer_cpu,
            Arc::clone(&self.error_handler),
        )?;

        Ok(LoggerService {
            ring,
            registry: self.registry,
            clock: self.clock,
            error_handler: self.error_handler,
            dispatcher: Some(dispatcher),
        })
    }
}

/// One ring, one consumer thread, any number of producers
pub struct LoggerService {
    ring: Arc<Ring>,
    registry: Arc<LoggerRegistry>,
    clock: Arc<dyn Clock>,
    error_handler: ErrorHandler,
    dispatcher: Option<Dispatcher>,
}

impl LoggerService {
    /// Start configuring a service
    pub fn builder(config: Config) -> LoggerServiceBuilder {
        LoggerServiceBuilder::new(config)
    }

    /// Start a service with all defaults for the given config
    pub fn start(config: Config) -> Result<Self> {
        Self::builder(config).start()
    }

    /// Register a logger name, returning the id to log under
    pub fn register_logger(&self, name: &str) -> u32 {
        self.registry.register(name)
    }

    /// Claim the next slot, blocking while the ring is full.
    ///
    /// Fails with `Shutdown` once the service is stopping; producers are
    /// expected to drop that silently.
    pub fn record(&self, level: Level, logger_id: u32) -> Result<RecordBuilder<'_>> {
        let sequence = self.ring.sequencer.claim(1, &self.ring.halt)?;
        // Claimed and unpublished: this thread is the slot's only owner.
        let slot = unsafe { self.ring.slots.get(sequence) };
        slot.reset_for_claim(level, self.clock.now_millis(), logger_id);
        Ok(RecordBuilder::new(self.ring.as_ref(), slot, sequence))
    }

    /// Claim without blocking; fails with `RingFull` when backpressure
    /// would block
    pub fn try_record(&self, level: Level, logger_id: u32) -> Result<RecordBuilder<'_>> {
        let sequence = self.ring.sequencer.try_claim(1, &self.ring.halt)?;
        let slot = unsafe { self.ring.slots.get(sequence) };
        slot.reset_for_claim(level, self.clock.now_millis(), logger_id);
        Ok(RecordBuilder::new(self.ring.as_ref(), slot, sequence))
    }

    /// Claim a slot and bind it to a parsed message template
    pub fn record_with<'a>(
        &'a self,
        level: Level,
        logger_id: u32,
        template: &'a Template,
    ) -> Result<TemplateBuilder<'a>> {
        let builder = self.record(level, logger_id)?;
        Ok(TemplateBuilder::new(builder, template))
    }

    /// Highest published sequence (diagnostic)
    pub fn published(&self) -> Sequence {
        self.ring.sequencer.publish_cursor().load(Ordering::Acquire)
    }

    /// Halt producers, drain everything already published, and join the
    /// consumer thread.
    ///
    /// On timeout the undrained tail is discarded and the timeout is also
    /// reported through the fallback error handler.
    pub fn stop(mut self, timeout: Duration) -> Result<()> {
        self.stop_internal(timeout)
    }

    fn stop_internal(&mut self, timeout: Duration) -> Result<()> {
        let Some(mut dispatcher) = self.dispatcher.take() else {
            return Ok(());
        };
        let result = dispatcher.stop(&self.ring, timeout);
        if let Err(e) = &result {
            (self.error_handler)(e);
        }
        result
    }
}

impl Drop for LoggerService {
    fn drop(&mut self) {
        let _ = self.stop_internal(Duration::from_millis(DEFAULT_STOP_TIMEOUT_MS));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appender::VecSink;
    use crate::clock::ManualClock;
    use crate::config::ProducerMode;

    fn quiet_handler() -> ErrorHandler {
        Arc::new(|_| {})
    }

    fn small_config() -> Config {
        Config::new(8)
            .unwrap()
            .with_buffer_size(8 * 256)
            .unwrap()
            .with_pattern("%m%n")
    }

    #[test]
    fn test_registry_dedupes() {
        let registry = LoggerRegistry::new();
        let a = registry.register("app.core");
        let b = registry.register("app.net");
        assert_ne!(a, b);
        assert_eq!(registry.register("app.core"), a);
        registry.with_name(b, |name| assert_eq!(name, "app.net"));
        registry.with_name(999, |name| assert_eq!(name, "root"));
    }

    #[test]
    fn test_end_to_end_roundtrip() {
        let sink = VecSink::new();
        let service = LoggerService::builder(small_config())
            .sink(sink.clone())
            .clock(Arc::new(ManualClock::new(1_000)))
            .error_handler(quiet_handler())
            .start()
            .unwrap();

        let id = service.register_logger("test");
        service
            .record(Level::Info, id)
            .unwrap()
            .append_str("count=")
            .append_i64(42)
            .commit();
        service.record(Level::Warn, id).unwrap().append_str("second").commit();

        service.stop(Duration::from_secs(5)).unwrap();
        assert_eq!(sink.contents_string(), "count=42\nsecond\n");
    }

    #[test]
    fn test_try_record_ring_full() {
        let sink = VecSink::new();
        // single producer, tiny ring, and a builder per claim we never
        // commit until the ring fills
        let config = Config::new(2)
            .unwrap()
            .with_buffer_size(2 * 128)
            .unwrap()
            .with_pattern("%m%n")
            .with_producer_mode(ProducerMode::Single);
        let service = LoggerService::builder(config)
            .sink(sink.clone())
            .error_handler(quiet_handler())
            .start()
            .unwrap();

        // fill the ring faster than the consumer can drain: claim two
        // without committing, so the consumer cannot advance past them
        let first = service.try_record(Level::Info, 0).unwrap();
        let second = service.try_record(Level::Info, 0).unwrap();
        {
            let third = service.try_record(Level::Info, 0);
            assert!(matches!(third, Err(crate::error::FluxlogError::RingFull)));
        }

        first.append_str("a").commit();
        second.append_str("b").commit();
        service.stop(Duration::from_secs(5)).unwrap();
        assert_eq!(sink.contents_string(), "a\nb\n");
    }

    #[test]
    fn test_multibyte_mode_roundtrip() {
        let sink = VecSink::new();
        let config = Config::new(8)
            .unwrap()
            .with_buffer_size(8 * 128)
            .unwrap()
            .with_pattern("%m%n")
            .with_multibyte(true);
        let service = LoggerService::builder(config)
            .sink(sink.clone())
            .error_handler(quiet_handler())
            .start()
            .unwrap();

        service
            .record(Level::Info, 0)
            .unwrap()
            .append_str("héllo ")
            .append_i64(-5)
            .commit();
        service.stop(Duration::from_secs(5)).unwrap();
        assert_eq!(sink.contents_string(), "héllo -5\n");
    }

    #[test]
    fn test_oversized_append_truncates_with_marker() {
        let sink = VecSink::new();
        // 64-byte payloads
        let config = Config::new(8)
            .unwrap()
            .with_buffer_size(8 * 64)
            .unwrap()
            .with_pattern("%m%n");
        let service = LoggerService::builder(config)
            .sink(sink.clone())
            .error_handler(quiet_handler())
            .start()
            .unwrap();

        let oversized = "x".repeat(100);
        service
            .record(Level::Info, 0)
            .unwrap()
            .append_str("head ")
            .append_str(&oversized)
            .commit();
        service.stop(Duration::from_secs(5)).unwrap();

        // the oversized append is dropped whole; the marker flags the loss
        assert_eq!(sink.contents_string(), "head >>\n");
    }

    #[test]
    fn test_consumer_cpu_pin_still_logs() {
        let sink = VecSink::new();
        let config = small_config().with_consumer_cpu(0);
        let service = LoggerService::builder(config)
            .sink(sink.clone())
            .error_handler(quiet_handler())
            .start()
            .unwrap();

        service.record(Level::Info, 0).unwrap().append_str("pinned").commit();
        service.stop(Duration::from_secs(5)).unwrap();
        assert_eq!(sink.contents_string(), "pinned\n");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_consumer_cpu_pin_sets_affinity() {
        use std::io;
        use std::sync::atomic::AtomicBool;

        // Samples the affinity mask from inside a sink write, which runs
        // on the consumer thread.
        struct AffinityProbeSink {
            pinned_to_zero: Arc<AtomicBool>,
            inner: VecSink,
        }

        impl Sink for AffinityProbeSink {
            fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
                let mut cpu_set: libc::cpu_set_t = unsafe { std::mem::zeroed() };
                let rc = unsafe {
                    libc::sched_getaffinity(
                        0,
                        std::mem::size_of::<libc::cpu_set_t>(),
                        &mut cpu_set,
                    )
                };
                if rc == 0 {
                    let on_zero_only = unsafe {
                        libc::CPU_ISSET(0, &cpu_set) && libc::CPU_COUNT(&cpu_set) == 1
                    };
                    self.pinned_to_zero.store(on_zero_only, Ordering::Release);
                }
                self.inner.write(bytes)
            }

            fn flush(&mut self) -> io::Result<()> {
                self.inner.flush()
            }

            fn close(&mut self) -> io::Result<()> {
                self.inner.close()
            }
        }

        let sink = VecSink::new();
        let pinned_to_zero = Arc::new(AtomicBool::new(false));
        let probe = AffinityProbeSink {
            pinned_to_zero: Arc::clone(&pinned_to_zero),
            inner: sink.clone(),
        };

        // if the host forbids pinning (restricted cpuset), the error handler
        // hears about it and the affinity assertion is skipped
        let pin_failed = Arc::new(AtomicBool::new(false));
        let failed = Arc::clone(&pin_failed);
        let handler: ErrorHandler = Arc::new(move |e| {
            if matches!(e, crate::error::FluxlogError::SystemResource { .. }) {
                failed.store(true, Ordering::Release);
            }
        });

        let config = small_config().with_consumer_cpu(0);
        let service = LoggerService::builder(config)
            .sink(probe)
            .error_handler(handler)
            .start()
            .unwrap();

        service.record(Level::Info, 0).unwrap().append_str("affine").commit();
        service.stop(Duration::from_secs(5)).unwrap();

        assert_eq!(sink.contents_string(), "affine\n");
        if !pin_failed.load(Ordering::Acquire) {
            assert!(
                pinned_to_zero.load(Ordering::Acquire),
                "consumer thread not pinned to CPU 0"
            );
        }
    }

    #[test]
    fn test_stop_halts_the_ring() {
        let sink = VecSink::new();
        let service = LoggerService::builder(small_config())
            .sink(sink.clone())
            .error_handler(quiet_handler())
            .start()
            .unwrap();

        let id = service.register_logger("late");
        service.record(Level::Info, id).unwrap().append_str("before").commit();

        // drop halts the consumer; a fresh service is needed afterwards
        let ring = Arc::clone(&service.ring);
        service.stop(Duration::from_secs(5)).unwrap();
        assert!(ring.halt.load(Ordering::Acquire));
        assert_eq!(sink.contents_string(), "before\n");
    }
}
