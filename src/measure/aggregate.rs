//! # Aggregation Engine
//!
//! Turns the stream of readings into stored series. Every tracked counter
//! carries its own running state:
//!
//! - RAW counters are written verbatim to the raw series and averaged over
//!   5-minute and hourly windows.
//! - CONSUMED/PRODUCED counters are registers. They are never averaged; their
//!   value is snapshotted to the cumulative series every `total_interval`
//!   seconds.
//!
//! Windows are checked against wall-clock time on every reading. The first
//! reading at or past the threshold flushes the window and opens the next
//! one, so a window covers at least its nominal length.
//!
//! Storage failures never stall ingestion. They are logged, rate limited per
//! series, and the state advances as if the write had succeeded.

use crate::config::SeriesKind;
use crate::constants::{FIVEMIN_WINDOW_SECS, HOURLY_WINDOW_SECS};
use crate::counter::CounterSpec;
use crate::p1::telegram::Reading;
use crate::storage::SeriesStore;
use crate::util::logging::ThrottleManager;
use log::{debug, warn};

/// The series stores the engine writes to. Absent stores are skipped.
#[derive(Default)]
pub struct SeriesSinks {
    pub raw: Option<Box<dyn SeriesStore>>,
    pub five_minute: Option<Box<dyn SeriesStore>>,
    pub hourly: Option<Box<dyn SeriesStore>>,
    pub cumulative: Option<Box<dyn SeriesStore>>,
}

impl SeriesSinks {
    pub fn get(&self, kind: SeriesKind) -> Option<&dyn SeriesStore> {
        let sink = match kind {
            SeriesKind::Raw => &self.raw,
            SeriesKind::FiveMinute => &self.five_minute,
            SeriesKind::Hourly => &self.hourly,
            SeriesKind::Cumulative => &self.cumulative,
        };
        sink.as_deref()
    }

    pub fn set(&mut self, kind: SeriesKind, store: Box<dyn SeriesStore>) {
        let sink = match kind {
            SeriesKind::Raw => &mut self.raw,
            SeriesKind::FiveMinute => &mut self.five_minute,
            SeriesKind::Hourly => &mut self.hourly,
            SeriesKind::Cumulative => &mut self.cumulative,
        };
        *sink = Some(store);
    }

    /// Number of stores present.
    pub fn len(&self) -> usize {
        SeriesKind::all()
            .iter()
            .filter(|kind| self.get(**kind).is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Running average over one window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Window {
    pub sum: f64,
    pub count: u32,
    /// `None` until the first reading opens the window
    pub start: Option<i64>,
}

impl Window {
    /// Flushes the window if `length` seconds have passed since it opened and
    /// it holds at least one sample, then adds `value` to the (possibly new)
    /// window. Returns the average of the flushed window.
    fn accumulate(&mut self, value: f64, now: i64, length: i64) -> Option<f64> {
        let mut flushed = None;

        match self.start {
            Some(start) if self.count > 0 && now - start >= length => {
                flushed = Some(self.sum / f64::from(self.count));
                self.sum = 0.0;
                self.count = 0;
                self.start = Some(now);
            }
            Some(_) => {}
            None => self.start = Some(now),
        }

        self.sum += value;
        self.count += 1;
        flushed
    }
}

/// Aggregation state of one counter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregationState {
    pub last_value: Option<f64>,
    pub last_ts: Option<i64>,
    pub five_minute: Window,
    pub hourly: Window,
    /// `None` until the first snapshot, so the first register reading of a
    /// session is always recorded
    pub last_cumulative_record_ts: Option<i64>,
}

/// A counter definition together with its running state.
#[derive(Debug, Clone)]
pub struct TrackedCounter {
    pub spec: CounterSpec,
    pub state: AggregationState,
}

pub struct Aggregator {
    counters: Vec<TrackedCounter>,
    sinks: SeriesSinks,
    total_interval: i64,
    throttle: ThrottleManager,
}

impl Aggregator {
    pub fn new(specs: Vec<CounterSpec>, sinks: SeriesSinks, total_interval: i64) -> Self {
        let counters = specs
            .into_iter()
            .map(|spec| TrackedCounter {
                spec,
                state: AggregationState::default(),
            })
            .collect();

        Aggregator {
            counters,
            sinks,
            total_interval,
            throttle: ThrottleManager::default(),
        }
    }

    /// State of the first counter tracking `id`.
    pub fn state(&self, id: &str) -> Option<&AggregationState> {
        self.counters
            .iter()
            .find(|c| c.spec.id == id)
            .map(|c| &c.state)
    }

    pub fn sinks(&self) -> &SeriesSinks {
        &self.sinks
    }

    /// Feeds the readings of one telegram, received at UNIX time `now`.
    pub fn process(&mut self, readings: &[Reading], now: i64) {
        for reading in readings {
            self.process_reading(reading, now);
        }
    }

    fn process_reading(&mut self, reading: &Reading, now: i64) {
        let Aggregator {
            counters,
            sinks,
            total_interval,
            throttle,
        } = self;

        let mut matched = false;

        for counter in counters.iter_mut().filter(|c| c.spec.id == reading.id) {
            matched = true;
            let table = counter.spec.table_name.as_str();
            let state = &mut counter.state;

            state.last_value = Some(reading.value);
            state.last_ts = Some(now);

            if counter.spec.counter_type.is_cumulative() {
                let due = match state.last_cumulative_record_ts {
                    None => true,
                    Some(last) => now - last >= *total_interval,
                };
                if due {
                    write_point(sinks, throttle, SeriesKind::Cumulative, table, now, reading.value, &reading.unit);
                    state.last_cumulative_record_ts = Some(now);
                }
                continue;
            }

            write_point(sinks, throttle, SeriesKind::Raw, table, now, reading.value, &reading.unit);

            if let Some(avg) = state.five_minute.accumulate(reading.value, now, FIVEMIN_WINDOW_SECS) {
                write_point(sinks, throttle, SeriesKind::FiveMinute, table, now, avg, &reading.unit);
            }
            if let Some(avg) = state.hourly.accumulate(reading.value, now, HOURLY_WINDOW_SECS) {
                write_point(sinks, throttle, SeriesKind::Hourly, table, now, avg, &reading.unit);
            }
        }

        if !matched {
            debug!("Ignoring reading for untracked counter {}", reading.id);
        }
    }
}

fn write_point(
    sinks: &SeriesSinks,
    throttle: &mut ThrottleManager,
    kind: SeriesKind,
    table: &str,
    now: i64,
    value: f64,
    unit: &str,
) {
    let Some(store) = sinks.get(kind) else {
        return;
    };

    match store.record(table, now, value, unit) {
        Ok(()) => debug!("Recorded {value} {unit} in {} series {table}", kind.config_key()),
        Err(e) => {
            if throttle.allow(kind.config_key()) {
                warn!("Failed to record {value} {unit} in {} series {table}: {e}", kind.config_key());
            }
        }
    }
}
