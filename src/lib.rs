//! fluxlog - Garbage-free low-latency application logging
//!
//! Application threads write log records into preallocated slots in a
//! lock-free ring; one background consumer drains them, applies a layout,
//! and writes to a sink. No steady-state allocation happens on the
//! producer path.
//!
//! ## Components
//!
//! | Module | Role |
//! |--------|------|
//! | `formatter` | Primitives to bytes/chars straight into fixed buffers |
//! | `disruptor` | Claim/publish sequencing, wait strategies, the consumer thread |
//! | `slot` | Preallocated per-record scratch buffers |
//! | `record` | Fluent producer builders, plain and templated |
//! | `layout` / `appender` | Rendering, batching, sinks |
//! | `service` | Wiring and lifecycle |
//!
//! ## Example
//!
//! ```no_run
//! use std::time::Duration;
//! use fluxlog::{ Config, Level, LoggerService };
//!
//! let service = LoggerService::start(Config::new(1024)?)?;
//! let logger = service.register_logger("app.engine");
//!
//! service.record(Level::Info, logger)?
//!     .append_str("orders processed: ")
//!     .append_i64(128)
//!     .commit();
//!
//! service.stop(Duration::from_secs(5))?;
//! # Ok::<(), fluxlog::FluxlogError>(())
//! ```

pub mod appender;
pub mod buffer;
pub mod clock;
pub mod config;
pub mod constants;
pub mod disruptor;
pub mod error;
pub mod formatter;
pub mod layout;
pub mod level;
pub mod pattern;
pub mod record;
pub mod service;
pub mod slot;

// Re-export main components
pub use appender::{ ConsoleSink, ConsoleStream, ErrorHandler, FileSink, Sink, VecSink };
pub use clock::{ Clock, ManualClock, SystemClock };
pub use config::{ Config, ProducerMode, WaitStrategyKind };
pub use error::{ FluxlogError, Result };
pub use layout::{ Layout, TextLayout };
pub use level::Level;
pub use pattern::Template;
pub use record::{ RecordBuilder, TemplateBuilder, TemplateValue };
pub use service::{ LoggerRegistry, LoggerService };

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
