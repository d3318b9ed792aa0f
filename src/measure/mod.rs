//! # Measurement
//!
//! The ingestion loop: receive a telegram, decode it, feed the readings to the
//! [`Aggregator`] and repeat until shutdown is requested or the transport
//! fails.
//!
//! Shutdown is cooperative. [`ShutdownHandle::interrupt`] clears the running
//! flag and wakes a pending read, which then surfaces as
//! [`MeterError::Interrupted`] and ends the loop.

pub mod aggregate;

use crate::config::{MeterdConfig, SeriesKind};
use crate::error::MeterError;
use crate::p1::serial::TelegramSource;
use crate::p1::telegram::{Telegram, TelegramParser};
use crate::storage::{SeriesStore, SqliteStore};
use chrono::Utc;
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

pub use aggregate::{AggregationState, Aggregator, SeriesSinks, TrackedCounter, Window};

/// Shared stop request for the ingestion loop and the task scheduler.
#[derive(Clone, Debug)]
pub struct ShutdownHandle {
    running: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownHandle {
    pub fn new() -> Self {
        ShutdownHandle {
            running: Arc::new(AtomicBool::new(true)),
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Requests a stop and wakes everything waiting in [`interrupted`](Self::interrupted).
    pub fn interrupt(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Completes once a stop has been requested.
    pub async fn interrupted(&self) {
        loop {
            // Registered before the flag check so a concurrent interrupt is not missed
            let notified = self.notify.notified();
            if !self.is_running() {
                return;
            }
            notified.await;
        }
    }
}

pub struct Measurement {
    parser: TelegramParser,
    aggregator: Aggregator,
}

impl Measurement {
    pub fn new(parser: TelegramParser, aggregator: Aggregator) -> Self {
        Measurement { parser, aggregator }
    }

    /// Opens every configured series store and sets up the tracked counters.
    ///
    /// A store that fails to open is logged and left out. At least one store
    /// must be available.
    pub fn init(config: &MeterdConfig) -> Result<Self, MeterError> {
        let mut sinks = SeriesSinks::default();
        let mut configured = 0;

        for kind in SeriesKind::all() {
            let Some(path) = config.series_path(kind) else {
                continue;
            };
            configured += 1;

            match SqliteStore::open(path) {
                Ok(store) => {
                    info!("Writing {} values to {}", kind.config_key(), path.display());
                    sinks.set(kind, Box::new(store) as Box<dyn SeriesStore>);
                }
                Err(e) => error!("Failed to open {} as {} database: {e}", path.display(), kind.config_key()),
            }
        }

        if configured == 0 {
            return Err(MeterError::Config(
                "No databases configured, please fix the configuration".into(),
            ));
        }
        if sinks.is_empty() {
            return Err(MeterError::Storage("Failed to open any of the configured databases".into()));
        }

        let specs = config.counter_specs()?;
        if specs.is_empty() {
            warn!("No counters configured, telegrams will be read but nothing is recorded");
        }

        let parser = TelegramParser::new(config.gas_id());
        let aggregator = Aggregator::new(specs, sinks, config.total_interval());

        Ok(Measurement::new(parser, aggregator))
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    /// Decodes one telegram and aggregates its readings at time `now`.
    pub fn handle_telegram(&mut self, telegram: &Telegram, now: i64) {
        for line in telegram.lines() {
            debug!("P1: {line}");
        }

        let readings = self.parser.parse(telegram);
        debug!("Decoded {} reading(s) from telegram", readings.len());
        self.aggregator.process(&readings, now);
    }

    /// Runs the ingestion loop until `shutdown` is interrupted or the source
    /// fails. Transport failures are returned; an interrupt ends the loop with
    /// `Ok(())`.
    pub async fn run<S>(&mut self, source: &mut S, shutdown: &ShutdownHandle) -> Result<(), MeterError>
    where
        S: TelegramSource + ?Sized,
    {
        info!("Starting measurements");

        while shutdown.is_running() {
            let received = tokio::select! {
                result = source.receive_telegram() => result,
                _ = shutdown.interrupted() => Err(MeterError::Interrupted),
            };

            match received {
                Ok(telegram) => self.handle_telegram(&telegram, Utc::now().timestamp()),
                Err(e) if !e.is_fatal() => {
                    if shutdown.is_running() {
                        warn!("Telegram read interrupted, continuing");
                    }
                }
                Err(e) => {
                    error!("Failed to receive telegram: {e}");
                    return Err(e);
                }
            }
        }

        info!("Stopped measurements");
        Ok(())
    }
}
