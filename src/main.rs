use anyhow::{Context, Result};
use clap::Parser;
use meterd::config::MeterdConfig;
use meterd::constants::DEFAULT_CONFIG_PATH;
use meterd::logging::{init_logger_with_default, log_error, log_info, log_warn};
use meterd::{Measurement, ShutdownHandle, TaskScheduler};
use std::path::{Path, PathBuf};
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "meterd", version)]
#[command(about = "Smart meter monitoring daemon")]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Accepted for compatibility, meterd always runs in the foreground
    #[arg(short, long)]
    foreground: bool,
    /// File to write the process ID to (overrides [daemon] pidfile)
    #[arg(short, long)]
    pidfile: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = MeterdConfig::load(&cli.config)
        .with_context(|| format!("Failed to load the configuration {}", cli.config.display()))?;

    init_logger_with_default(config.log_level().unwrap_or("info"));
    log_info(&format!(
        "Smart Meter Monitoring Daemon (meterd) version {} starting",
        env!("CARGO_PKG_VERSION")
    ));

    let pid_path = cli
        .pidfile
        .or_else(|| config.pid_file().map(Path::to_path_buf));
    if let Some(path) = &pid_path {
        write_pid(path);
    }

    let result = run(&config).await;

    if let Some(path) = &pid_path {
        if let Err(e) = std::fs::remove_file(path) {
            log_warn(&format!("Failed to remove the pid file {}: {e}", path.display()));
        }
    }

    result?;
    log_info("Smart Meter Monitoring Daemon (meterd) exiting");
    Ok(())
}

async fn run(config: &MeterdConfig) -> Result<()> {
    let shutdown = ShutdownHandle::new();
    install_signal_handlers(shutdown.clone()).context("Failed to install signal handlers")?;

    let settings = config.serial_settings()?;
    let mut measurement = Measurement::init(config).context("Failed to initialise measurements")?;
    let scheduler = TaskScheduler::new(config.scheduled_tasks()?).start();

    let result = match meterd::connect(&settings).await {
        Ok(mut port) => measurement.run(&mut port, &shutdown).await,
        Err(e) => Err(e),
    };

    if let Some(scheduler) = scheduler {
        scheduler.stop().await;
    }

    result.context("Measurement stopped on an error")
}

fn write_pid(path: &Path) {
    if let Err(e) = std::fs::write(path, format!("{}\n", std::process::id())) {
        log_error(&format!("Failed to write the pid file {}: {e}", path.display()));
    }
}

fn install_signal_handlers(shutdown: ShutdownHandle) -> std::io::Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::spawn(async move {
        tokio::select! {
            _ = sigint.recv() => log_info("Caught SIGINT, exiting"),
            _ = sigterm.recv() => log_info("Caught SIGTERM, exiting"),
            _ = sigquit.recv() => log_info("Caught SIGQUIT, exiting"),
        }
        shutdown.interrupt();
    });

    Ok(())
}
