//! # Counter Specifications
//!
//! A [`CounterSpec`] is the static definition of one tracked meter quantity.
//! Specs are built once from the configuration and shared by the aggregation
//! engine (which attaches running state to them) and the provisioning tool
//! (which creates one storage table per spec).

use crate::constants::{TABLE_PREFIX_CONSUMED, TABLE_PREFIX_PRODUCED, TABLE_PREFIX_RAW};
use std::fmt;

/// How readings of a counter are aggregated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CounterType {
    /// Instantaneous quantity, averaged over 5-minute and hourly windows.
    Raw,
    /// Monotonic consumption register, snapshotted periodically.
    Consumed,
    /// Monotonic production register, snapshotted periodically.
    Produced,
}

impl CounterType {
    /// Storage table prefix for this counter type.
    pub fn table_prefix(&self) -> &'static str {
        match self {
            CounterType::Raw => TABLE_PREFIX_RAW,
            CounterType::Consumed => TABLE_PREFIX_CONSUMED,
            CounterType::Produced => TABLE_PREFIX_PRODUCED,
        }
    }

    /// Integer code stored in the `CONFIGURATION` table.
    pub fn as_code(&self) -> i64 {
        match self {
            CounterType::Raw => 0,
            CounterType::Consumed => 1,
            CounterType::Produced => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(CounterType::Raw),
            1 => Some(CounterType::Consumed),
            2 => Some(CounterType::Produced),
            _ => None,
        }
    }

    /// Whether the counter is a cumulative register rather than a sampled value.
    pub fn is_cumulative(&self) -> bool {
        !matches!(self, CounterType::Raw)
    }
}

impl fmt::Display for CounterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CounterType::Raw => "raw",
            CounterType::Consumed => "consumed",
            CounterType::Produced => "produced",
        };
        f.write_str(name)
    }
}

/// Derives the storage table key for a counter.
///
/// Every `.` in the id is replaced by `_` and the per-type prefix is prepended,
/// so `("1.2.3", Raw)` becomes `"RAW_1_2_3"`.
pub fn table_name(id: &str, counter_type: CounterType) -> String {
    format!("{}{}", counter_type.table_prefix(), id.replace('.', "_"))
}

/// Static definition of one tracked quantity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterSpec {
    pub id: String,
    pub description: String,
    pub counter_type: CounterType,
    pub table_name: String,
}

impl CounterSpec {
    pub fn new(id: &str, description: &str, counter_type: CounterType) -> Self {
        CounterSpec {
            id: id.to_string(),
            description: description.to_string(),
            counter_type,
            table_name: table_name(id, counter_type),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_name_per_type() {
        assert_eq!(table_name("1.2.3", CounterType::Raw), "RAW_1_2_3");
        assert_eq!(table_name("1.8.1", CounterType::Consumed), "CONSUMED_1_8_1");
        assert_eq!(table_name("2.8.2", CounterType::Produced), "PRODUCED_2_8_2");
    }

    #[test]
    fn test_table_name_is_pure() {
        let first = table_name("24.3.0", CounterType::Consumed);
        let second = table_name("24.3.0", CounterType::Consumed);
        assert_eq!(first, second);
    }

    #[test]
    fn test_spec_derives_table_name() {
        let spec = CounterSpec::new("1.7.0", "Current consumption", CounterType::Raw);
        assert_eq!(spec.table_name, "RAW_1_7_0");
        assert!(!spec.counter_type.is_cumulative());
    }

    #[test]
    fn test_type_codes_round_trip() {
        for t in [CounterType::Raw, CounterType::Consumed, CounterType::Produced] {
            assert_eq!(CounterType::from_code(t.as_code()), Some(t));
        }
        assert_eq!(CounterType::from_code(7), None);
    }
}
