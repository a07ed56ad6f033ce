//! Appender pipeline and sinks
//!
//! The consumer thread feeds drained slots through one [`Appender`]: level
//! filter, layout into the reusable output buffer, then a flush to the
//! sink under the batching policy. Sink failures go to the fallback error
//! handler and never halt the consumer.

use std::fs::{ File, OpenOptions };
use std::io::{ self, Write };
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::buffer::OutputBuf;
use crate::config::Config;
use crate::constants::HEADER_MARGIN;
use crate::error::{ FluxlogError, Result };
use crate::layout::Layout;
use crate::level::Level;
use crate::slot::RecordSlot;

/// Callback for errors that cannot be returned to any caller: sink
/// failures on the consumer thread, discarded shutdown tails
pub type ErrorHandler = Arc<dyn Fn(&FluxlogError) + Send + Sync>;

/// The default error handler writes to stderr
pub fn stderr_error_handler() -> ErrorHandler {
    Arc::new(|e| eprintln!("fluxlog: {e}"))
}

/// Terminal byte stream for rendered records
pub trait Sink: Send {
    /// Write all bytes
    fn write(&mut self, bytes: &[u8]) -> io::Result<()>;
    /// Push buffered bytes to the device
    fn flush(&mut self) -> io::Result<()>;
    /// Flush and release the underlying resource
    fn close(&mut self) -> io::Result<()>;
}

/// Console stream choice for [`ConsoleSink`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleStream {
    /// Standard output
    Stdout,
    /// Standard error
    Stderr,
}

/// Sink writing to stdout or stderr
pub struct ConsoleSink {
    stream: ConsoleStream,
}

impl ConsoleSink {
    /// Create a console sink on the chosen stream
    pub fn new(stream: ConsoleStream) -> Self {
        Self { stream }
    }
}

impl Sink for ConsoleSink {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        match self.stream {
            ConsoleStream::Stdout => io::stdout().lock().write_all(bytes),
            ConsoleStream::Stderr => io::stderr().lock().write_all(bytes),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.stream {
            ConsoleStream::Stdout => io::stdout().lock().flush(),
            ConsoleStream::Stderr => io::stderr().lock().flush(),
        }
    }

    fn close(&mut self) -> io::Result<()> {
        self.flush()
    }
}

/// Sink appending to a file
pub struct FileSink {
    file: Option<File>,
}

impl FileSink {
    /// Open (or create) the file for appending
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file: Some(file) })
    }
}

impl Sink for FileSink {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.write_all(bytes),
            None => Err(io::Error::other("file sink closed")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }

    fn close(&mut self) -> io::Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
            file.sync_all()?;
        }
        Ok(())
    }
}

/// In-memory sink for tests and examples; clones share the same storage
#[derive(Clone, Default)]
pub struct VecSink {
    data: Arc<Mutex<Vec<u8>>>,
}

impl VecSink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything written so far
    pub fn contents(&self) -> Vec<u8> {
        self.data.lock().clone()
    }

    /// Everything written so far, interpreted as UTF-8
    pub fn contents_string(&self) -> String {
        String::from_utf8_lossy(&self.contents()).into_owned()
    }
}

impl Sink for VecSink {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.data.lock().extend_from_slice(bytes);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Per-consumer pipeline: level filter, layout, batched flushing
pub struct Appender {
    level: Level,
    immediate_flush: bool,
    threshold: usize,
    max_record_estimate: usize,
    layout: Box<dyn Layout>,
    sink: Box<dyn Sink>,
    out: OutputBuf,
    error_handler: ErrorHandler,
}

impl Appender {
    pub(crate) fn new(
        config: &Config,
        layout: Box<dyn Layout>,
        sink: Box<dyn Sink>,
        error_handler: ErrorHandler,
    ) -> Self {
        // Worst-case rendered size of one record: the payload (chars may
        // expand to four UTF-8 bytes each), plus header fields and pattern
        // literals.
        let payload_bytes = if config.multibyte {
            config.slot_capacity() * 4
        } else {
            config.slot_capacity()
        };
        let max_record_estimate = payload_bytes + config.pattern.len() + HEADER_MARGIN;
        let capacity = config.buffered_io_threshold + max_record_estimate;

        Self {
            level: config.level,
            immediate_flush: config.immediate_flush,
            threshold: config.buffered_io_threshold,
            max_record_estimate,
            layout,
            sink,
            out: OutputBuf::new(capacity),
            error_handler,
        }
    }

    /// Render one slot, flushing as the batching policy dictates
    pub(crate) fn process(&mut self, slot: &RecordSlot) {
        if slot.level() < self.level {
            return;
        }
        if self.out.len() + self.max_record_estimate > self.out.capacity() {
            self.flush_buffer();
        }
        self.layout.format(slot, &mut self.out);
        if self.immediate_flush || self.out.len() >= self.threshold {
            self.flush_buffer();
        }
    }

    /// A drained batch ended; push whatever is buffered
    pub(crate) fn end_of_batch(&mut self) {
        self.flush_buffer();
    }

    /// Final flush and sink release at consumer exit
    pub(crate) fn close(&mut self) {
        self.flush_buffer();
        if let Err(e) = self.sink.close() {
            (self.error_handler)(&FluxlogError::Io(e));
        }
    }

    fn flush_buffer(&mut self) {
        if self.out.is_empty() {
            return;
        }
        let result = self
            .sink
            .write(self.out.as_slice())
            .and_then(|_| self.sink.flush());
        if let Err(e) = result {
            (self.error_handler)(&FluxlogError::Io(e));
        }
        // Reset either way so a failed write is never re-emitted partially.
        self.out.clear();
    }
}
