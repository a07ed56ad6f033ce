//! Error types and handling for the fluxlog library

use thiserror::Error;

/// Result type alias for fluxlog operations
pub type Result<T> = std::result::Result<T, FluxlogError>;

/// Main error type for the fluxlog library
#[derive(Error, Debug)]
pub enum FluxlogError {
    /// I/O errors from sink writes and flushes
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Ring is full and a non-blocking claim was requested
    #[error("Ring is full")]
    RingFull,

    /// A payload append did not fit into the slot's remaining capacity
    #[error("Payload buffer overflow")]
    PayloadOverflow,

    /// Template misuse: wrong number of `with` calls, or a malformed pattern
    #[error("Pattern misuse: {message}")]
    PatternMisuse {
        /// What the caller did wrong
        message: String,
    },

    /// Invalid configuration parameter
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Error message describing the configuration issue
        message: String,
    },

    /// The logger service is shutting down; the record was dropped
    #[error("Logger service is shut down")]
    Shutdown,

    /// System resource errors (thread spawn, CPU pinning)
    #[error("System resource error: {message}")]
    SystemResource {
        /// Error message describing the system resource issue
        message: String,
    },

    /// The consumer did not finish draining within the stop timeout
    #[error("Operation timed out")]
    Timeout,
}

impl FluxlogError {
    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a new pattern misuse error
    pub fn pattern_misuse(message: impl Into<String>) -> Self {
        Self::PatternMisuse {
            message: message.into(),
        }
    }

    /// Create a new system resource error
    pub fn system_resource(message: impl Into<String>) -> Self {
        Self::SystemResource {
            message: message.into(),
        }
    }

    /// Check if this error is recoverable.
    ///
    /// A recoverable error means the same call may succeed if retried later
    /// (the ring drains, the sink comes back). Everything else indicates a
    /// caller bug or terminal state.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::RingFull | Self::Timeout | Self::Io(_))
    }

    /// Check if this error came from the producer side of the pipeline
    pub fn is_producer_error(&self) -> bool {
        matches!(
            self,
            Self::RingFull | Self::PayloadOverflow | Self::PatternMisuse { .. } | Self::Shutdown
        )
    }
}
