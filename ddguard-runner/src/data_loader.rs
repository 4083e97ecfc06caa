//! Benchmark price loading from CSV.
//!
//! Accepts either a plain `date,close` file or a yfinance-style export whose
//! header spans several lines (price type, ticker, then a `Date` marker row).
//! Column choice: `Adj Close`, then `Close`, then the first numeric column.
//! Rows whose first field is not a `YYYY-MM-DD` date are skipped, so ticker
//! and marker lines fall out naturally.

use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use ddguard_core::PricePoint;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open price file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("no numeric price column found")]
    NoPriceColumn,

    #[error("price file contains no dated rows")]
    Empty,
}

/// Load a sorted, de-duplicated close series from a CSV file.
pub fn load_prices(path: &Path) -> Result<Vec<PricePoint>, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let points = load_prices_from_reader(file)?;
    info!(
        path = %path.display(),
        rows = points.len(),
        first = %points[0].date,
        last = %points[points.len() - 1].date,
        "loaded price series"
    );
    Ok(points)
}

/// Parse a close series from any CSV reader. Never returns an empty vector.
pub fn load_prices_from_reader<R: Read>(reader: R) -> Result<Vec<PricePoint>, LoadError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut column: Option<usize> = None;
    let mut saw_dated_row = false;
    let mut skipped = 0usize;
    let mut points = Vec::new();

    for record in rdr.records() {
        let record = record?;
        let Some(first) = record.get(0) else {
            continue;
        };

        let Some(date) = parse_date(first) else {
            if column.is_none() {
                column = find_named_column(&record);
            }
            continue;
        };
        saw_dated_row = true;

        let value = match column {
            Some(idx) => record.get(idx).and_then(parse_price),
            None => record.iter().skip(1).find_map(parse_price),
        };
        match value {
            Some(close) => points.push(PricePoint::new(date, close)),
            None => skipped += 1,
        }
    }

    if points.is_empty() {
        return Err(if saw_dated_row {
            LoadError::NoPriceColumn
        } else {
            LoadError::Empty
        });
    }
    if skipped > 0 {
        debug!(skipped, "skipped dated rows without a usable price");
    }

    points.sort_by_key(|p| p.date);
    // Keep the last observation for a repeated date.
    let mut deduped: Vec<PricePoint> = Vec::with_capacity(points.len());
    for p in points {
        match deduped.last_mut() {
            Some(last) if last.date == p.date => *last = p,
            _ => deduped.push(p),
        }
    }
    Ok(deduped)
}

fn find_named_column(header: &csv::StringRecord) -> Option<usize> {
    let position = |name: &str| {
        header
            .iter()
            .position(|f| f.eq_ignore_ascii_case(name))
            .filter(|&i| i > 0)
    };
    position("Adj Close").or_else(|| position("Close"))
}

/// Accepts `YYYY-MM-DD` with an optional time suffix.
fn parse_date(field: &str) -> Option<NaiveDate> {
    let head = field.get(..10)?;
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

fn parse_price(field: &str) -> Option<f64> {
    if field.is_empty() {
        return None;
    }
    field.parse::<f64>().ok().filter(|v| v.is_finite())
}
