//! # Configuration
//!
//! meterd reads a single TOML file. Its sections map onto the collaborators
//! of the daemon:
//!
//! - `[meter]` - serial line settings for the P1 port
//! - `[database]` - series store paths and the tracked counters
//! - `[log]` - default log filter
//! - `[daemon]` - PID file location
//! - `[[tasks]]` - externally scheduled commands
//!
//! Raw sections are deserialized with `serde`, then turned into validated
//! values ([`SerialSettings`], [`CounterSpec`], [`ScheduledTask`]). Every
//! validation failure is reported as [`MeterError::Config`].

use crate::constants::{
    DEFAULT_BAUD_RATE, DEFAULT_DATA_BITS, DEFAULT_TOTAL_INTERVAL_SECS, SUPPORTED_BAUD_RATES,
};
use crate::counter::{CounterSpec, CounterType};
use crate::error::MeterError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MeterSection {
    pub port: Option<String>,
    #[serde(default = "default_speed")]
    pub speed: u32,
    #[serde(default = "default_bits")]
    pub bits: u8,
    pub parity: Option<String>,
    #[serde(default)]
    pub rts_cts: bool,
    #[serde(default)]
    pub xon_xoff: bool,
}

fn default_speed() -> u32 {
    DEFAULT_BAUD_RATE
}

fn default_bits() -> u8 {
    DEFAULT_DATA_BITS
}

fn default_total_interval() -> i64 {
    DEFAULT_TOTAL_INTERVAL_SECS
}

#[derive(Debug, Clone, Deserialize)]
pub struct CounterEntry {
    pub id: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSection {
    pub raw_db: Option<PathBuf>,
    pub fivemin_avg: Option<PathBuf>,
    pub hourly_avg: Option<PathBuf>,
    pub counters: Option<PathBuf>,
    #[serde(default = "default_total_interval")]
    pub total_interval: i64,
    pub current_consumption_id: Option<String>,
    pub current_production_id: Option<String>,
    #[serde(default)]
    pub consumption: Vec<CounterEntry>,
    #[serde(default)]
    pub production: Vec<CounterEntry>,
    pub gascounter: Option<CounterEntry>,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        DatabaseSection {
            raw_db: None,
            fivemin_avg: None,
            hourly_avg: None,
            counters: None,
            total_interval: DEFAULT_TOTAL_INTERVAL_SECS,
            current_consumption_id: None,
            current_production_id: None,
            consumption: Vec::new(),
            production: Vec::new(),
            gascounter: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogSection {
    pub level: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DaemonSection {
    pub pidfile: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaskEntry {
    pub description: String,
    pub interval: u64,
    #[serde(default)]
    pub commands: Vec<String>,
}

/// The full configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MeterdConfig {
    pub meter: Option<MeterSection>,
    #[serde(default)]
    pub database: DatabaseSection,
    #[serde(default)]
    pub log: LogSection,
    #[serde(default)]
    pub daemon: DaemonSection,
    #[serde(default)]
    pub tasks: Vec<TaskEntry>,
}

/// Serial parity setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Even,
    Odd,
}

impl Parity {
    /// Parses `none`, `even` or `odd`, ignoring case.
    pub fn parse(value: &str) -> Result<Self, MeterError> {
        match value.to_ascii_lowercase().as_str() {
            "none" => Ok(Parity::None),
            "even" => Ok(Parity::Even),
            "odd" => Ok(Parity::Odd),
            other => Err(MeterError::Config(format!(
                "Invalid parity setting {other}, valid values are: none, even, odd"
            ))),
        }
    }
}

/// Validated serial line settings for the P1 port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialSettings {
    pub port: String,
    pub baud_rate: u32,
    pub data_bits: u8,
    pub parity: Parity,
    pub rts_cts: bool,
    pub xon_xoff: bool,
}

/// A validated scheduled task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledTask {
    pub description: String,
    pub interval: Duration,
    pub commands: Vec<String>,
}

/// Which series store a path belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesKind {
    Raw,
    FiveMinute,
    Hourly,
    Cumulative,
}

impl SeriesKind {
    pub fn all() -> [SeriesKind; 4] {
        [
            SeriesKind::Raw,
            SeriesKind::FiveMinute,
            SeriesKind::Hourly,
            SeriesKind::Cumulative,
        ]
    }

    /// Name of the `[database]` key holding the store path.
    pub fn config_key(&self) -> &'static str {
        match self {
            SeriesKind::Raw => "raw_db",
            SeriesKind::FiveMinute => "fivemin_avg",
            SeriesKind::Hourly => "hourly_avg",
            SeriesKind::Cumulative => "counters",
        }
    }
}

impl MeterdConfig {
    /// Reads and validates the configuration file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, MeterError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            MeterError::Config(format!("Failed to read the configuration {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parses and validates a configuration held in memory.
    pub fn from_toml_str(contents: &str) -> Result<Self, MeterError> {
        let config: MeterdConfig =
            toml::from_str(contents).map_err(|e| MeterError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), MeterError> {
        if self.database.total_interval <= 0 {
            return Err(MeterError::Config(format!(
                "database.total_interval must be positive, got {}",
                self.database.total_interval
            )));
        }
        self.counter_specs()?;
        self.scheduled_tasks()?;
        Ok(())
    }

    /// Serial settings for the P1 port.
    ///
    /// Unsupported line speeds, data bit counts or parity values are rejected
    /// here, before any device is touched.
    pub fn serial_settings(&self) -> Result<SerialSettings, MeterError> {
        let meter = self
            .meter
            .as_ref()
            .ok_or_else(|| MeterError::Config("No [meter] section in the configuration".into()))?;

        let port = match meter.port.as_deref() {
            Some(port) if !port.is_empty() => port.to_string(),
            _ => {
                return Err(MeterError::Config(
                    "No serial port specified, please fix the configuration".into(),
                ))
            }
        };

        if !SUPPORTED_BAUD_RATES.contains(&meter.speed) {
            return Err(MeterError::Config(format!(
                "Unsupported line speed {} baud",
                meter.speed
            )));
        }

        if !(5..=8).contains(&meter.bits) {
            return Err(MeterError::Config(format!(
                "Unsupported #serial bits {}",
                meter.bits
            )));
        }

        let parity = match meter.parity.as_deref() {
            None => Parity::None,
            Some(value) => Parity::parse(value)?,
        };

        Ok(SerialSettings {
            port,
            baud_rate: meter.speed,
            data_bits: meter.bits,
            parity,
            rts_cts: meter.rts_cts,
            xon_xoff: meter.xon_xoff,
        })
    }

    /// Counters sampled at the meter's cadence and averaged.
    pub fn raw_counter_specs(&self) -> Result<Vec<CounterSpec>, MeterError> {
        let db = &self.database;
        let mut specs = Vec::new();

        if let Some(id) = &db.current_consumption_id {
            specs.push(spec_from(id, "Current consumption", CounterType::Raw)?);
        }
        if let Some(id) = &db.current_production_id {
            specs.push(spec_from(id, "Current production", CounterType::Raw)?);
        }

        Ok(specs)
    }

    /// Consumption/production registers, including the gas counter.
    pub fn cumulative_counter_specs(&self) -> Result<Vec<CounterSpec>, MeterError> {
        let db = &self.database;
        let mut specs = Vec::new();

        for entry in &db.consumption {
            let description = entry.description.as_deref().unwrap_or(&entry.id);
            specs.push(spec_from(&entry.id, description, CounterType::Consumed)?);
        }
        for entry in &db.production {
            let description = entry.description.as_deref().unwrap_or(&entry.id);
            specs.push(spec_from(&entry.id, description, CounterType::Produced)?);
        }
        if let Some(gas) = &db.gascounter {
            let description = gas.description.as_deref().unwrap_or("Gas");
            specs.push(spec_from(&gas.id, description, CounterType::Consumed)?);
        }

        Ok(specs)
    }

    /// Every tracked counter, RAW ones first.
    pub fn counter_specs(&self) -> Result<Vec<CounterSpec>, MeterError> {
        let mut specs = self.raw_counter_specs()?;
        specs.extend(self.cumulative_counter_specs()?);
        Ok(specs)
    }

    /// Identifier of the gas register, whose value arrives on the following line.
    pub fn gas_id(&self) -> Option<&str> {
        self.database.gascounter.as_ref().map(|gas| gas.id.as_str())
    }

    /// Seconds between cumulative register snapshots.
    pub fn total_interval(&self) -> i64 {
        self.database.total_interval
    }

    pub fn series_path(&self, kind: SeriesKind) -> Option<&Path> {
        let db = &self.database;
        let path = match kind {
            SeriesKind::Raw => &db.raw_db,
            SeriesKind::FiveMinute => &db.fivemin_avg,
            SeriesKind::Hourly => &db.hourly_avg,
            SeriesKind::Cumulative => &db.counters,
        };
        path.as_deref()
    }

    pub fn scheduled_tasks(&self) -> Result<Vec<ScheduledTask>, MeterError> {
        self.tasks
            .iter()
            .map(|task| {
                if task.interval == 0 {
                    return Err(MeterError::Config(format!(
                        "Task '{}' has a zero interval",
                        task.description
                    )));
                }
                Ok(ScheduledTask {
                    description: task.description.clone(),
                    interval: Duration::from_secs(task.interval),
                    commands: task.commands.clone(),
                })
            })
            .collect()
    }

    pub fn log_level(&self) -> Option<&str> {
        self.log.level.as_deref()
    }

    pub fn pid_file(&self) -> Option<&Path> {
        self.daemon.pidfile.as_deref()
    }
}

fn spec_from(id: &str, description: &str, counter_type: CounterType) -> Result<CounterSpec, MeterError> {
    let id = id.trim();
    if id.is_empty() {
        return Err(MeterError::Config(format!(
            "Empty counter id for {counter_type} counter '{description}'"
        )));
    }
    Ok(CounterSpec::new(id, description, counter_type))
}
