//! # Series Export
//!
//! Reads stored series back and renders them as CSV or as a gnuplot data
//! file, optionally with gnuplot `set xrange`/`set yrange` statements.
//!
//! Selected series are zipped row by row: the timestamp of a row is taken
//! from the first series, which is sound because all series of one store are
//! written with the same timestamps. Output stops at the end of the shortest
//! series.

use crate::error::MeterError;
use crate::storage::{SeriesPoint, SeriesStore};
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Csv,
    Gnuplot,
}

/// A counter picked for output. Inverted counters are negated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedCounter {
    pub id: String,
    pub invert: bool,
}

impl SelectedCounter {
    pub fn new(id: &str, invert: bool) -> Self {
        SelectedCounter {
            id: id.to_string(),
            invert,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub id: String,
    pub points: Vec<SeriesPoint>,
}

/// Extremes of the rendered rows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DataRange {
    pub min_x: i64,
    pub max_x: i64,
    pub min_y: f64,
    pub max_y: f64,
}

impl DataRange {
    fn new(x: i64, y: f64) -> Self {
        DataRange {
            min_x: x,
            max_x: x,
            min_y: y,
            max_y: y,
        }
    }

    fn include_x(&mut self, x: i64) {
        self.min_x = self.min_x.min(x);
        self.max_x = self.max_x.max(x);
    }

    fn include_y(&mut self, y: f64) {
        self.min_y = self.min_y.min(y);
        self.max_y = self.max_y.max(y);
    }
}

/// Keeps a point only if it lies at least `skip` seconds after the
/// previously kept one. A `skip` of zero keeps everything.
pub fn thin(points: Vec<SeriesPoint>, skip: i64) -> Vec<SeriesPoint> {
    if skip <= 0 {
        return points;
    }

    let mut kept: Vec<SeriesPoint> = Vec::with_capacity(points.len());
    for point in points {
        match kept.last() {
            Some(last) if point.timestamp - last.timestamp < skip => {}
            _ => kept.push(point),
        }
    }
    kept
}

/// Loads the selected counters from `store`, starting at `since`.
pub fn fetch_series(
    store: &dyn SeriesStore,
    selection: &[SelectedCounter],
    since: i64,
    skip: i64,
) -> Result<Vec<Series>, MeterError> {
    selection
        .iter()
        .map(|counter| {
            let mut points = store.query(&counter.id, since)?;
            if counter.invert {
                for point in &mut points {
                    point.value = -point.value;
                }
            }
            Ok(Series {
                id: counter.id.clone(),
                points: thin(points, skip),
            })
        })
        .collect()
}

/// Writes the header and rows of `series` to `out`.
///
/// With `additive` the values of a row are summed into a single column.
/// Returns the extremes of the written rows, or `None` if no row was written.
pub fn render<W: Write>(
    out: &mut W,
    series: &[Series],
    format: OutputFormat,
    additive: bool,
) -> Result<Option<DataRange>, MeterError> {
    if format == OutputFormat::Csv {
        write_csv_header(out, series, additive)?;
    }

    let rows = series.iter().map(|s| s.points.len()).min().unwrap_or(0);
    let mut range: Option<DataRange> = None;

    for row in 0..rows {
        let timestamp = series[0].points[row].timestamp;
        let values: Vec<f64> = if additive {
            vec![series.iter().map(|s| s.points[row].value).sum()]
        } else {
            series.iter().map(|s| s.points[row].value).collect()
        };

        match format {
            OutputFormat::Csv => write!(out, "{timestamp}")?,
            OutputFormat::Gnuplot => write!(out, "{timestamp:10}")?,
        }

        for value in &values {
            match format {
                OutputFormat::Csv => write!(out, ",{value:.3}")?,
                OutputFormat::Gnuplot => write!(out, "  {value:3.3}")?,
            }

            let r = range.get_or_insert_with(|| DataRange::new(timestamp, *value));
            r.include_x(timestamp);
            r.include_y(*value);
        }
        writeln!(out)?;
    }

    Ok(range)
}

fn write_csv_header<W: Write>(out: &mut W, series: &[Series], additive: bool) -> Result<(), MeterError> {
    let ids: Vec<&str> = series.iter().map(|s| s.id.as_str()).collect();
    if additive {
        writeln!(out, "timestamp,{}", ids.join("+"))?;
    } else {
        writeln!(out, "timestamp,{}", ids.join(","))?;
    }
    Ok(())
}

/// Writes gnuplot range statements for `range`.
///
/// `y_offset` widens the y-range on both sides; `None` omits the statement.
pub fn write_range<W: Write>(
    out: &mut W,
    range: &DataRange,
    x_range: bool,
    y_offset: Option<f64>,
) -> Result<(), MeterError> {
    if x_range {
        writeln!(out, "set xrange [\"{}\":\"{}\"]", range.min_x, range.max_x)?;
    }
    if let Some(offset) = y_offset {
        writeln!(
            out,
            "set yrange [{:3.3}:{:3.3}]",
            range.min_y - offset,
            range.max_y + offset
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(timestamp: i64, value: f64) -> SeriesPoint {
        SeriesPoint {
            timestamp,
            value,
            unit: "kW".to_string(),
        }
    }

    fn series(id: &str, points: &[(i64, f64)]) -> Series {
        Series {
            id: id.to_string(),
            points: points.iter().map(|&(t, v)| point(t, v)).collect(),
        }
    }

    fn rendered(series: &[Series], format: OutputFormat, additive: bool) -> (String, Option<DataRange>) {
        let mut out = Vec::new();
        let range = render(&mut out, series, format, additive).unwrap();
        (String::from_utf8(out).unwrap(), range)
    }

    #[test]
    fn test_csv_zips_to_shortest_series() {
        let data = [
            series("1.7.0", &[(100, 0.5), (400, 1.25), (700, 2.0)]),
            series("2.7.0", &[(100, 0.0), (400, 0.125)]),
        ];

        let (csv, range) = rendered(&data, OutputFormat::Csv, false);
        assert_eq!(csv, "timestamp,1.7.0,2.7.0\n100,0.500,0.000\n400,1.250,0.125\n");

        let range = range.unwrap();
        assert_eq!((range.min_x, range.max_x), (100, 400));
        assert_eq!((range.min_y, range.max_y), (0.0, 1.25));
    }

    #[test]
    fn test_csv_additive() {
        let data = [
            series("1.8.1", &[(10, 1.0), (20, 2.0)]),
            series("1.8.2", &[(10, 3.0), (20, 4.0)]),
        ];

        let (csv, range) = rendered(&data, OutputFormat::Csv, true);
        assert_eq!(csv, "timestamp,1.8.1+1.8.2\n10,4.000\n20,6.000\n");
        assert_eq!(range.unwrap().max_y, 6.0);
    }

    #[test]
    fn test_gnuplot_format() {
        let data = [series("1.7.0", &[(1415000000, 0.424)])];
        let (plot, _) = rendered(&data, OutputFormat::Gnuplot, false);
        assert_eq!(plot, "1415000000  0.424\n");

        let data = [series("1.7.0", &[(42, 12.5)])];
        let (plot, _) = rendered(&data, OutputFormat::Gnuplot, false);
        assert_eq!(plot, "        42  12.500\n");
    }

    #[test]
    fn test_empty_output_has_no_range() {
        let data = [series("1.7.0", &[])];
        let (csv, range) = rendered(&data, OutputFormat::Csv, false);
        assert_eq!(csv, "timestamp,1.7.0\n");
        assert!(range.is_none());
    }

    #[test]
    fn test_thin() {
        let points = vec![point(0, 1.0), point(100, 2.0), point(299, 3.0), point(300, 4.0), point(650, 5.0)];
        let kept: Vec<i64> = thin(points.clone(), 300).iter().map(|p| p.timestamp).collect();
        assert_eq!(kept, vec![0, 300, 650]);
        assert_eq!(thin(points, 0).len(), 5);
    }

    #[test]
    fn test_write_range() {
        let range = DataRange {
            min_x: 100,
            max_x: 400,
            min_y: -0.5,
            max_y: 1.25,
        };

        let mut out = Vec::new();
        write_range(&mut out, &range, true, Some(0.5)).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "set xrange [\"100\":\"400\"]\nset yrange [-1.000:1.750]\n"
        );

        let mut out = Vec::new();
        write_range(&mut out, &range, false, None).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_fetch_series_inverts_and_thins() {
        use crate::counter::{CounterSpec, CounterType};
        use crate::storage::MemoryStore;

        let spec = CounterSpec::new("2.7.0", "Current production", CounterType::Raw);
        let store = MemoryStore::with_counters(&[spec]);
        for (t, v) in [(0, 1.0), (10, 2.0), (60, 3.0)] {
            store.record("RAW_2_7_0", t, v, "kW").unwrap();
        }

        let selection = [SelectedCounter::new("2.7.0", true)];
        let series = fetch_series(&store, &selection, 5, 30).unwrap();
        let values: Vec<(i64, f64)> = series[0].points.iter().map(|p| (p.timestamp, p.value)).collect();
        assert_eq!(values, vec![(10, -2.0), (60, -3.0)]);
    }
}
