use log::{debug, error, info, log_enabled, warn, Level, LevelFilter};

/// Initializes the logger with the `env_logger` crate.
///
/// `RUST_LOG` controls the filter; without it everything at `info` and above
/// is logged.
pub fn init_logger() {
    init_logger_with_default("info");
}

/// Initializes the logger, falling back to `default_filter` when `RUST_LOG` is unset.
///
/// The daemon passes the `[log] level` setting from its configuration here.
pub fn init_logger_with_default(default_filter: &str) {
    let env = env_logger::Env::default().default_filter_or(default_filter.to_string());
    // A second initialisation (tests, tools calling twice) is harmless
    let _ = env_logger::Builder::from_env(env).try_init();
}

/// Initializes a logger that only reports errors, for quiet tool runs.
pub fn init_quiet_logger() {
    let _ = env_logger::Builder::new()
        .filter_level(LevelFilter::Error)
        .try_init();
}

/// Logs an error message.
pub fn log_error(message: &str) {
    if log_enabled!(Level::Error) {
        error!("{message}");
    }
}

/// Logs a warning message.
pub fn log_warn(message: &str) {
    if log_enabled!(Level::Warn) {
        warn!("{message}");
    }
}

/// Logs an informational message.
pub fn log_info(message: &str) {
    if log_enabled!(Level::Info) {
        info!("{message}");
    }
}

/// Logs a debug message.
pub fn log_debug(message: &str) {
    if log_enabled!(Level::Debug) {
        debug!("{message}");
    }
}
