//! meterd Constants
//!
//! This module defines constants used by the P1 telegram handling, the
//! aggregation engine and the series storage layer.

/// First character of a telegram header line (`/XMX5LGBBFFB231215493`)
pub const P1_TELEGRAM_START: u8 = b'/';

/// First character of a telegram trailer line (`!` optionally followed by a CRC)
pub const P1_TELEGRAM_END: u8 = b'!';

/// Upper bound on a single telegram line; longer lines are dropped
pub const P1_MAX_LINE_LEN: usize = 6 * 1024;

/// Size of a single read from the serial device
pub const P1_READ_CHUNK_SIZE: usize = 4096;

/// Captured values or units at or above this length are treated as malformed
pub const P1_MAX_FIELD_LEN: usize = 256;

// ----------------------------------------------------------------------------
// Units
// ----------------------------------------------------------------------------

/// Unit reported for the gas register, which carries no unit of its own
pub const UNIT_M3: &str = "m3";

// ----------------------------------------------------------------------------
// Storage table prefixes
// ----------------------------------------------------------------------------

pub const TABLE_PREFIX_RAW: &str = "RAW_";
pub const TABLE_PREFIX_CONSUMED: &str = "CONSUMED_";
pub const TABLE_PREFIX_PRODUCED: &str = "PRODUCED_";

// ----------------------------------------------------------------------------
// Aggregation windows (seconds)
// ----------------------------------------------------------------------------

pub const FIVEMIN_WINDOW_SECS: i64 = 300;
pub const HOURLY_WINDOW_SECS: i64 = 3600;

/// Default interval between cumulative register snapshots
pub const DEFAULT_TOTAL_INTERVAL_SECS: i64 = 300;

// ----------------------------------------------------------------------------
// Serial line defaults
// ----------------------------------------------------------------------------

pub const DEFAULT_BAUD_RATE: u32 = 9600;
pub const DEFAULT_DATA_BITS: u8 = 7;

/// Line speeds accepted in the `[meter]` section
pub const SUPPORTED_BAUD_RATES: &[u32] = &[
    50, 75, 110, 134, 150, 200, 300, 600, 1200, 2400, 4800, 9600, 19200, 38400, 57600, 115200,
    230400,
];

pub const DEFAULT_CONFIG_PATH: &str = "/etc/meterd.conf";
