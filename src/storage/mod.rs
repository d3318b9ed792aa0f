//! # Series Storage
//!
//! Every aggregation tier (raw samples, 5-minute averages, hourly averages and
//! cumulative snapshots) is written to its own series store. A store holds one
//! table per counter, keyed by [`table_name`](crate::counter::table_name), and
//! a `CONFIGURATION` table mapping counter ids to those tables.
//!
//! Each store handle owns its own connection and is used from one task at a
//! time. Stores are created in WAL mode and every connection waits on a busy
//! timeout, so the daemon, scheduled commands and the export tool may access
//! the same files concurrently.

pub mod memory;
pub mod provision;
pub mod sqlite;

use crate::error::MeterError;

pub use memory::MemoryStore;
pub use provision::create_databases;
pub use sqlite::SqliteStore;

/// One stored point of a series.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesPoint {
    pub timestamp: i64,
    pub value: f64,
    pub unit: String,
}

/// Durable time-series sink and source.
pub trait SeriesStore: Send {
    /// Appends one point to the table `table`.
    fn record(&self, table: &str, timestamp: i64, value: f64, unit: &str) -> Result<(), MeterError>;

    /// Points of counter `counter_id` with a timestamp at or after `since`,
    /// oldest first.
    fn query(&self, counter_id: &str, since: i64) -> Result<Vec<SeriesPoint>, MeterError>;
}
