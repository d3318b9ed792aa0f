//! In-memory series store for tests and dry runs.
//!
//! Clones share the same data, so a test can hand one clone to the
//! aggregation engine and inspect the other.

use crate::counter::CounterSpec;
use crate::error::MeterError;
use crate::storage::{SeriesPoint, SeriesStore};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct MemoryState {
    tables: HashMap<String, Vec<SeriesPoint>>,
    counters: HashMap<String, String>,
    failing: bool,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that knows the tables of `counters`, so `query` can resolve them.
    pub fn with_counters(counters: &[CounterSpec]) -> Self {
        let store = Self::new();
        {
            let mut state = store.state();
            for spec in counters {
                state.counters.insert(spec.id.clone(), spec.table_name.clone());
            }
        }
        store
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Makes every subsequent write fail.
    pub fn set_failing(&self, failing: bool) {
        self.state().failing = failing;
    }

    /// Points written to `table`, in write order.
    pub fn points(&self, table: &str) -> Vec<SeriesPoint> {
        self.state().tables.get(table).cloned().unwrap_or_default()
    }

    /// Total number of points written across all tables.
    pub fn len(&self) -> usize {
        self.state().tables.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SeriesStore for MemoryStore {
    fn record(&self, table: &str, timestamp: i64, value: f64, unit: &str) -> Result<(), MeterError> {
        let mut state = self.state();
        if state.failing {
            return Err(MeterError::Storage(format!("Write to {table} failed")));
        }

        state.tables.entry(table.to_string()).or_default().push(SeriesPoint {
            timestamp,
            value,
            unit: unit.to_string(),
        });
        Ok(())
    }

    fn query(&self, counter_id: &str, since: i64) -> Result<Vec<SeriesPoint>, MeterError> {
        let state = self.state();
        let table = state
            .counters
            .get(counter_id)
            .ok_or_else(|| MeterError::Storage(format!("Counter {counter_id} is not present")))?;

        let mut points: Vec<SeriesPoint> = state
            .tables
            .get(table)
            .map(|points| points.iter().filter(|p| p.timestamp >= since).cloned().collect())
            .unwrap_or_default();
        points.sort_by_key(|p| p.timestamp);

        Ok(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::CounterType;

    #[test]
    fn test_clones_share_data() {
        let store = MemoryStore::new();
        let writer = store.clone();
        writer.record("RAW_1_7_0", 1, 0.5, "kW").unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.points("RAW_1_7_0")[0].value, 0.5);
    }

    #[test]
    fn test_query_resolves_counter() {
        let spec = CounterSpec::new("1.7.0", "Current consumption", CounterType::Raw);
        let store = MemoryStore::with_counters(&[spec]);
        store.record("RAW_1_7_0", 20, 2.0, "kW").unwrap();
        store.record("RAW_1_7_0", 10, 1.0, "kW").unwrap();

        let points = store.query("1.7.0", 0).unwrap();
        assert_eq!(points.iter().map(|p| p.timestamp).collect::<Vec<_>>(), vec![10, 20]);
        assert!(store.query("2.7.0", 0).is_err());
    }

    #[test]
    fn test_failing_store() {
        let store = MemoryStore::new();
        store.set_failing(true);
        assert!(matches!(
            store.record("RAW_1_7_0", 1, 1.0, "kW"),
            Err(MeterError::Storage(_))
        ));
        assert!(store.is_empty());
    }
}
