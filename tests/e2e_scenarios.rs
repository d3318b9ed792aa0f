//! End-to-end scenarios: provision databases, ingest telegrams, export series.

use meterd::config::{MeterdConfig, SeriesKind};
use meterd::output::{fetch_series, render, OutputFormat, SelectedCounter};
use meterd::p1::telegram::Telegram;
use meterd::storage::{create_databases, SeriesStore, SqliteStore};
use meterd::Measurement;
use std::path::Path;
use tempfile::TempDir;

fn config_for(dir: &Path) -> MeterdConfig {
    let toml = format!(
        r#"
        [meter]
        port = "/dev/ttyUSB0"
        speed = 115200
        bits = 8

        [database]
        raw_db = "{dir}/raw.db"
        fivemin_avg = "{dir}/fivemin.db"
        hourly_avg = "{dir}/hourly.db"
        counters = "{dir}/counters.db"
        total_interval = 300
        current_consumption_id = "1.7.0"
        current_production_id = "2.7.0"

        [[database.consumption]]
        id = "1.8.1"
        description = "Consumed, tariff 1"

        [[database.consumption]]
        id = "1.8.2"
        description = "Consumed, tariff 2"

        [[database.production]]
        id = "2.8.1"

        [database.gascounter]
        id = "24.3.0"
        "#,
        dir = dir.display()
    );
    MeterdConfig::from_toml_str(&toml).unwrap()
}

fn telegram(power_kw: f64, tariff1_kwh: f64, gas_m3: f64) -> Telegram {
    Telegram::from_lines([
        "/ISk5\\2MT382-1000".to_string(),
        String::new(),
        format!("1-0:1.8.1({tariff1_kwh:09.3}*kWh)"),
        "1-0:1.8.2(00100.000*kWh)".to_string(),
        "1-0:2.8.1(00000.000*kWh)".to_string(),
        format!("1-0:1.7.0({power_kw:06.3}*kW)"),
        "1-0:2.7.0(000.25*kW)".to_string(),
        "0-1:24.3.0(090212160000)(00)(60)(1)(0-1:24.2.1)(m3)".to_string(),
        format!("({gas_m3:09.3})"),
    ])
}

fn open(dir: &Path, name: &str) -> SqliteStore {
    SqliteStore::open_read_only(dir.join(name)).unwrap()
}

#[test]
fn test_ingest_and_aggregate_into_sqlite() {
    let dir = TempDir::new().unwrap();
    let config = config_for(dir.path());

    assert_eq!(create_databases(&config, false).unwrap().len(), 4);

    let mut measurement = Measurement::init(&config).unwrap();
    assert_eq!(measurement.aggregator().sinks().len(), 4);

    let start = 1_415_000_000;
    measurement.handle_telegram(&telegram(1.0, 1000.0, 50.0), start);
    measurement.handle_telegram(&telegram(2.0, 1000.5, 50.1), start + 100);
    measurement.handle_telegram(&telegram(3.0, 1001.0, 50.2), start + 250);
    measurement.handle_telegram(&telegram(7.0, 1002.0, 50.3), start + 301);
    drop(measurement);

    let raw = open(dir.path(), "raw.db");
    let raw_points = raw.query("1.7.0", 0).unwrap();
    assert_eq!(raw_points.len(), 4);
    assert_eq!(raw_points[3].value, 7.0);
    assert_eq!(raw_points[3].unit, "kW");
    assert_eq!(raw.query("2.7.0", 0).unwrap().len(), 4);

    let fivemin = open(dir.path(), "fivemin.db").query("1.7.0", 0).unwrap();
    assert_eq!(fivemin.len(), 1);
    assert_eq!(fivemin[0].timestamp, start + 301);
    assert!((fivemin[0].value - 2.0).abs() < 1e-9);

    assert!(open(dir.path(), "hourly.db").query("1.7.0", 0).unwrap().is_empty());

    let counters = open(dir.path(), "counters.db");
    let tariff1: Vec<(i64, f64)> = counters
        .query("1.8.1", 0)
        .unwrap()
        .iter()
        .map(|p| (p.timestamp, p.value))
        .collect();
    assert_eq!(tariff1, vec![(start, 1000.0), (start + 301, 1002.0)]);

    let gas = counters.query("24.3.0", 0).unwrap();
    assert_eq!(gas.len(), 2);
    assert_eq!(gas[0].unit, "m3");
    assert!((gas[1].value - 50.3).abs() < 1e-9);

    // Production register is a separate table
    assert_eq!(counters.table_for("2.8.1").unwrap(), "PRODUCED_2_8_1");
}

#[test]
fn test_export_after_ingest() {
    let dir = TempDir::new().unwrap();
    let config = config_for(dir.path());
    create_databases(&config, false).unwrap();

    let mut measurement = Measurement::init(&config).unwrap();
    let start = 1_415_000_000;
    for (i, kw) in [0.5, 1.5, 2.5].iter().enumerate() {
        measurement.handle_telegram(&telegram(*kw, 1000.0, 50.0), start + i as i64 * 10);
    }
    drop(measurement);

    let store = open(dir.path(), "raw.db");
    let selection = [
        SelectedCounter::new("1.7.0", false),
        SelectedCounter::new("2.7.0", true),
    ];
    let series = fetch_series(&store, &selection, start, 0).unwrap();

    let mut out = Vec::new();
    let range = render(&mut out, &series, OutputFormat::Csv, false).unwrap().unwrap();
    let csv = String::from_utf8(out).unwrap();

    let mut lines = csv.lines();
    assert_eq!(lines.next(), Some("timestamp,1.7.0,2.7.0"));
    assert_eq!(lines.next(), Some("1415000000,0.500,-0.250"));
    assert_eq!(csv.lines().count(), 4);
    assert_eq!((range.min_x, range.max_x), (start, start + 20));
    assert_eq!(range.max_y, 2.5);
    assert_eq!(range.min_y, -0.25);
}

#[test]
fn test_missing_store_is_left_out() {
    let dir = TempDir::new().unwrap();
    let config = config_for(dir.path());
    create_databases(&config, false).unwrap();
    std::fs::remove_file(dir.path().join("hourly.db")).unwrap();

    let measurement = Measurement::init(&config).unwrap();
    let sinks = measurement.aggregator().sinks();
    assert_eq!(sinks.len(), 3);
    assert!(sinks.get(SeriesKind::Hourly).is_none());
}

#[test]
fn test_config_file_on_disk() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("meterd.conf");
    std::fs::write(&path, "[meter]\nport = \"/dev/ttyAMA0\"\nparity = \"ODD\"\n").unwrap();

    let config = MeterdConfig::load(&path).unwrap();
    let serial = config.serial_settings().unwrap();
    assert_eq!(serial.port, "/dev/ttyAMA0");
    assert_eq!(serial.parity, meterd::config::Parity::Odd);

    assert!(MeterdConfig::load(dir.path().join("missing.conf")).is_err());
}
