//! Log severity levels

use std::fmt;
use std::str::FromStr;

use serde::{ Deserialize, Serialize };

use crate::error::FluxlogError;

/// Log severity, ordered from most verbose to most severe.
///
/// The derived `Ord` gives `Trace < Debug < Info < Warn < Error < Fatal`,
/// which is what the appender's level filter relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Level {
    /// Finest-grained tracing
    Trace = 0,
    /// Diagnostic detail
    Debug = 1,
    /// Routine operational messages
    Info = 2,
    /// Something unexpected but survivable
    Warn = 3,
    /// An operation failed
    Error = 4,
    /// The application cannot continue
    Fatal = 5,
}

impl Level {
    /// Upper-case name as it appears in rendered output
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Fatal => "FATAL",
        }
    }
}

impl Default for Level {
    fn default() -> Self {
        Level::Info
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = FluxlogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TRACE" => Ok(Level::Trace),
            "DEBUG" => Ok(Level::Debug),
            "INFO" => Ok(Level::Info),
            "WARN" | "WARNING" => Ok(Level::Warn),
            "ERROR" => Ok(Level::Error),
            "FATAL" => Ok(Level::Fatal),
            other => Err(FluxlogError::config(format!("Unknown log level: {other}"))),
        }
    }
}
