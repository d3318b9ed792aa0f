//! Database provisioning.
//!
//! The raw, 5-minute and hourly stores hold the RAW counters; the cumulative
//! store holds the consumption, production and gas registers.

use crate::config::{MeterdConfig, SeriesKind};
use crate::error::MeterError;
use crate::storage::SqliteStore;
use log::info;
use std::path::PathBuf;

/// Creates every configured series store. Returns the paths created.
///
/// Stores without a configured path, or without any counter to hold, are
/// skipped.
pub fn create_databases(config: &MeterdConfig, force: bool) -> Result<Vec<PathBuf>, MeterError> {
    if force {
        info!("Will overwrite existing databases");
    }

    let raw_specs = config.raw_counter_specs()?;
    let cumulative_specs = config.cumulative_counter_specs()?;
    let mut created = Vec::new();

    for kind in SeriesKind::all() {
        let Some(path) = config.series_path(kind) else {
            info!("No database of type {} configured", kind.config_key());
            continue;
        };

        let specs = match kind {
            SeriesKind::Cumulative => &cumulative_specs,
            _ => &raw_specs,
        };
        if specs.is_empty() {
            info!(
                "No counters specified, skipping creation of database {} of type {}",
                path.display(),
                kind.config_key()
            );
            continue;
        }

        SqliteStore::create(path, force, specs)?;
        info!("Created database {} of type {}", path.display(), kind.config_key());
        created.push(path.to_path_buf());
    }

    Ok(created)
}
