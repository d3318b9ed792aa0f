use anyhow::{Context, Result};
use clap::Parser;
use meterd::config::MeterdConfig;
use meterd::constants::DEFAULT_CONFIG_PATH;
use meterd::logging::{init_logger_with_default, log_info};
use meterd::storage::create_databases;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "meterd-createdb", version)]
#[command(about = "Database initialisation utility for meterd")]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Force overwriting of existing databases
    #[arg(short, long)]
    force: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = MeterdConfig::load(&cli.config)
        .with_context(|| format!("Failed to load the configuration {}", cli.config.display()))?;
    init_logger_with_default(config.log_level().unwrap_or("info"));

    log_info(&format!(
        "Smart Meter Monitoring Daemon (meterd) version {}",
        env!("CARGO_PKG_VERSION")
    ));
    log_info("Starting database creation");

    let created = create_databases(&config, cli.force).context("Database creation failed")?;

    log_info(&format!("Finished database creation, created {} database(s)", created.len()));
    Ok(())
}
