use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{ArgGroup, CommandFactory, FromArgMatches, Parser};
use meterd::config::MeterdConfig;
use meterd::constants::DEFAULT_CONFIG_PATH;
use meterd::logging::{init_logger_with_default, init_quiet_logger, log_debug, log_error, log_warn};
use meterd::output::{fetch_series, render, write_range, OutputFormat, SelectedCounter};
use meterd::storage::SqliteStore;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "meterd-output", version)]
#[command(about = "Data series output tool for meterd")]
#[command(group(ArgGroup::new("format").required(true).args(["gnuplot", "csv"])))]
struct Cli {
    /// Configuration file (used for the log level)
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Be quiet; only log errors
    #[arg(short, long)]
    quiet: bool,
    /// Add data of selected counters and merge to a single column
    #[arg(short, long)]
    additive: bool,
    /// Output in gnuplot compatible format
    #[arg(short = 'p', long)]
    gnuplot: bool,
    /// Output as CSV
    #[arg(short = 'C', long)]
    csv: bool,
    /// Select counter with <ID> (can occur multiple times)
    #[arg(short = 's', long = "select", value_name = "ID")]
    select: Vec<String>,
    /// Select counter with <ID> and invert (negate) its value
    #[arg(short = 'S', long = "select-inverted", value_name = "ID")]
    select_inverted: Vec<String>,
    /// Read data from <DATABASE>
    #[arg(short, long)]
    database: PathBuf,
    /// Write output to <FILE> (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
    /// Interval in seconds to output data for, relative to the current time
    #[arg(short, long, value_parser = clap::value_parser!(i64).range(1..))]
    interval: i64,
    /// Output a gnuplot y-range statement widened by <OFFSET> (requires -r)
    #[arg(short, long, value_name = "OFFSET", requires = "range_file", allow_negative_numbers = true)]
    y_range: Option<f64>,
    /// Output a gnuplot x-range statement (requires -r)
    #[arg(short, long, requires = "range_file")]
    x_range: bool,
    /// File to write gnuplot range statements to
    #[arg(short, long = "range-file", value_name = "FILE")]
    range_file: Option<PathBuf>,
    /// Keep a row only if it lies at least <SECONDS> after the previous one
    #[arg(short = 'j', long, value_name = "SECONDS", default_value_t = 0)]
    skip: i64,
}

/// Selected counters in command line order, mixing `-s` and `-S`.
fn selection(matches: &clap::ArgMatches) -> Vec<SelectedCounter> {
    let mut indexed: Vec<(usize, SelectedCounter)> = Vec::new();

    for (arg, invert) in [("select", false), ("select_inverted", true)] {
        if let (Some(values), Some(indices)) = (
            matches.get_many::<String>(arg),
            matches.indices_of(arg),
        ) {
            for (value, index) in values.zip(indices) {
                indexed.push((index, SelectedCounter::new(value, invert)));
            }
        }
    }

    indexed.sort_by_key(|(index, _)| *index);
    indexed.into_iter().map(|(_, counter)| counter).collect()
}

fn init_logging(cli: &Cli) -> Result<()> {
    if cli.quiet {
        init_quiet_logger();
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => Some(
            MeterdConfig::load(path)
                .with_context(|| format!("Failed to load the configuration {}", path.display()))?,
        ),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => MeterdConfig::load(DEFAULT_CONFIG_PATH).ok(),
        None => None,
    };

    let level = config
        .as_ref()
        .and_then(|c| c.log_level().map(str::to_string))
        .unwrap_or_else(|| "info".to_string());
    init_logger_with_default(&level);
    Ok(())
}

fn main() -> Result<()> {
    let matches = Cli::command().get_matches();
    let cli = Cli::from_arg_matches(&matches)?;
    init_logging(&cli)?;

    let selected = selection(&matches);
    if selected.is_empty() {
        bail!("No counters selected, use -s or -S");
    }

    let format = if cli.gnuplot {
        OutputFormat::Gnuplot
    } else {
        OutputFormat::Csv
    };

    let since = Utc::now().timestamp() - cli.interval;
    log_debug(&format!("Selecting data since {since} from {}", cli.database.display()));

    let store = SqliteStore::open_read_only(&cli.database)
        .with_context(|| format!("Failed to open database {}", cli.database.display()))?;
    let series = fetch_series(&store, &selected, since, cli.skip)?;

    let range = match &cli.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to open {} for writing", path.display()))?;
            let mut out = BufWriter::new(file);
            let written = render(&mut out, &series, format, cli.additive)
                .and_then(|range| out.flush().map(|_| range).map_err(Into::into));

            match written {
                Ok(range) => range,
                Err(e) => {
                    log_error(&format!("Failed to write output to {}", path.display()));
                    let _ = std::fs::remove_file(path);
                    return Err(e.into());
                }
            }
        }
        None => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            let range = render(&mut out, &series, format, cli.additive)?;
            out.flush()?;
            range
        }
    };

    if let Some(range_file) = &cli.range_file {
        match range {
            Some(range) => {
                let mut out = File::create(range_file)
                    .with_context(|| format!("Failed to open {} for writing", range_file.display()))?;
                write_range(&mut out, &range, cli.x_range, cli.y_range)?;
            }
            None => log_warn("No data in the selected interval, not writing range statements"),
        }
    }

    Ok(())
}
