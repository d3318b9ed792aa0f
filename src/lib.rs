//! # meterd-rs - Smart Meter Monitoring for DSMR P1 Ports
//!
//! The meterd-rs crate reads the telegrams a Dutch/Belgian (DSMR) smart meter
//! sends on its P1 port, decodes the electricity and gas counters they carry,
//! and records them as time series in SQLite databases.
//!
//! ## Features
//!
//! - Frame telegrams from a serial port (or any `AsyncRead` source)
//! - Decode OBIS-style counter lines, including the deferred gas value line
//! - Record raw samples plus 5-minute and hourly averages of instantaneous counters
//! - Snapshot cumulative consumption/production registers periodically
//! - Run scheduled external commands alongside ingestion
//! - Export stored series as CSV or gnuplot data
//!
//! ## Usage
//!
//! ```rust
//! use meterd::{parse_telegram, Aggregator, CounterSpec, CounterType, SeriesSinks, Telegram};
//!
//! let telegram = Telegram::from_lines(["/ISk5\\2MT382-1000", "1-0:1.7.0(01.193*kW)"]);
//! let readings = parse_telegram(&telegram, None);
//!
//! let specs = vec![CounterSpec::new("1.7.0", "Current consumption", CounterType::Raw)];
//! let mut aggregator = Aggregator::new(specs, SeriesSinks::default(), 300);
//! aggregator.process(&readings, 1_415_000_000);
//! assert_eq!(aggregator.state("1.7.0").unwrap().last_value, Some(1.193));
//! ```

pub mod config;
pub mod constants;
pub mod counter;
pub mod error;
pub mod logging;
pub mod measure;
pub mod output;
pub mod p1;
pub mod storage;
pub mod tasksched;
pub mod util;

pub use crate::config::{MeterdConfig, SerialSettings};
pub use crate::counter::{table_name, CounterSpec, CounterType};
pub use crate::error::MeterError;
pub use crate::logging::{init_logger, log_info};
pub use crate::measure::{Aggregator, Measurement, SeriesSinks, ShutdownHandle};
pub use crate::p1::{parse_telegram, P1DeviceHandle, Reading, Telegram, TelegramParser, TelegramSource};
pub use crate::storage::{SeriesPoint, SeriesStore, SqliteStore};
pub use crate::tasksched::TaskScheduler;

/// Open the meter's P1 port.
///
/// # Arguments
/// * `settings` - Serial line settings, usually from [`MeterdConfig::serial_settings`]
///
/// # Returns
/// * `Ok(P1DeviceHandle)` - Open port, flushed of stale input
/// * `Err(MeterError)` - The port could not be opened
pub async fn connect(settings: &SerialSettings) -> Result<P1DeviceHandle, MeterError> {
    P1DeviceHandle::open(settings).await
}
