//! # meterd Error Handling
//!
//! This module defines the MeterError enum, which represents the different error
//! types that can occur in the meterd crate.
//!
//! Only `Config` and `Transport` are fatal for the ingestion loop. `Interrupted`
//! is a retry signal, and storage write failures are logged by the aggregation
//! engine rather than propagated.

use thiserror::Error;

/// Represents the different error types that can occur in the meterd crate.
#[derive(Debug, Error)]
pub enum MeterError {
    /// Bad or missing settings. Fatal at startup.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The serial device could not be opened or read.
    #[error("Serial transport error: {0}")]
    Transport(String),

    /// A blocking read was interrupted; the caller may retry.
    #[error("Read interrupted")]
    Interrupted,

    /// A series store could not be created, opened, written or queried.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid tool-level input, such as a malformed command line value.
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MeterError {
    /// Whether the ingestion loop must stop on this error.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, MeterError::Interrupted)
    }
}

impl From<rusqlite::Error> for MeterError {
    fn from(err: rusqlite::Error) -> Self {
        MeterError::Storage(err.to_string())
    }
}

impl From<tokio_serial::Error> for MeterError {
    fn from(err: tokio_serial::Error) -> Self {
        MeterError::Transport(err.to_string())
    }
}
