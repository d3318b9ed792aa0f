//! Unit tests for the `MeterError` enum and its `Display` implementation.

use meterd::error::MeterError;
use std::io;

/// Tests that the `Config` variant is correctly formatted.
#[test]
fn test_config_error() {
    let err = MeterError::Config("No serial port specified".to_string());
    assert_eq!(err.to_string(), "Configuration error: No serial port specified");
}

/// Tests that the `Transport` variant is correctly formatted.
#[test]
fn test_transport_error() {
    let err = MeterError::Transport("Serial device closed".to_string());
    assert_eq!(err.to_string(), "Serial transport error: Serial device closed");
}

#[test]
fn test_interrupted_error() {
    assert_eq!(MeterError::Interrupted.to_string(), "Read interrupted");
}

/// Tests that the `Storage` variant is correctly formatted.
#[test]
fn test_storage_error() {
    let err = MeterError::Storage("disk full".to_string());
    assert_eq!(err.to_string(), "Storage error: disk full");
}

#[test]
fn test_parse_error() {
    let err = MeterError::Parse("bad interval".to_string());
    assert_eq!(err.to_string(), "Parse error: bad interval");
}

/// Tests the conversion from `std::io::Error`.
#[test]
fn test_io_error_conversion() {
    let err: MeterError = io::Error::new(io::ErrorKind::NotFound, "gone").into();
    assert!(matches!(err, MeterError::Io(_)));
    assert_eq!(err.to_string(), "I/O error: gone");
}

/// Storage errors raised by SQLite surface as `Storage`.
#[test]
fn test_rusqlite_error_conversion() {
    let err: MeterError = rusqlite::Error::QueryReturnedNoRows.into();
    assert!(matches!(err, MeterError::Storage(_)));
}

/// Only an interrupted read may be retried by the ingestion loop.
#[test]
fn test_fatal_classification() {
    assert!(!MeterError::Interrupted.is_fatal());
    assert!(MeterError::Transport("closed".into()).is_fatal());
    assert!(MeterError::Config("bad".into()).is_fatal());
    assert!(MeterError::Storage("locked".into()).is_fatal());
}
