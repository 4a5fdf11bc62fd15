//! Bar loading from CSV.
//!
//! Expected header: `timestamp,open,high,low,close,volume`. Timestamps are
//! either RFC 3339 (`2024-01-02T14:30:00Z`) or a bare date (`2024-01-02`,
//! read as midnight UTC). Rows must be strictly increasing in time and
//! individually sane; anything else fails the whole file with the offending
//! row number (1-based, header excluded).

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use retestlab_core::domain::Bar;

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("row {row}: unparseable timestamp '{value}'")]
    Timestamp { row: usize, value: String },

    #[error("row {row}: malformed bar (check high/low against open/close, prices > 0)")]
    MalformedRow { row: usize },

    #[error("row {row}: timestamp not after the previous row")]
    Unsorted { row: usize },

    #[error("{0} contains no bars")]
    Empty(PathBuf),
}

#[derive(Debug, Deserialize, Serialize)]
struct CsvRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

/// Load a bar series from a CSV file.
pub fn load_bars_csv(path: &Path) -> Result<Vec<Bar>, LoadError> {
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|source| LoadError::Open {
            path: path.to_path_buf(),
            source,
        })?;
    let bars = read_rows(reader)?;
    if bars.is_empty() {
        return Err(LoadError::Empty(path.to_path_buf()));
    }
    Ok(bars)
}

/// Read a bar series from any CSV source. An empty body yields an empty series.
pub fn read_bars<R: io::Read>(source: R) -> Result<Vec<Bar>, LoadError> {
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(source);
    read_rows(reader)
}

fn read_rows<R: io::Read>(mut reader: csv::Reader<R>) -> Result<Vec<Bar>, LoadError> {
    let mut bars: Vec<Bar> = Vec::new();
    for (i, record) in reader.deserialize::<CsvRow>().enumerate() {
        let row = i + 1;
        let record = record?;
        let timestamp = parse_timestamp(&record.timestamp).ok_or_else(|| LoadError::Timestamp {
            row,
            value: record.timestamp.clone(),
        })?;
        let bar = Bar {
            timestamp,
            open: record.open,
            high: record.high,
            low: record.low,
            close: record.close,
            volume: record.volume,
        };
        if !bar.is_sane() {
            return Err(LoadError::MalformedRow { row });
        }
        if bars.last().is_some_and(|prev| bar.timestamp <= prev.timestamp) {
            return Err(LoadError::Unsorted { row });
        }
        bars.push(bar);
    }
    Ok(bars)
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Write a bar series in the format `load_bars_csv` reads.
pub fn write_bars_csv(path: &Path, bars: &[Bar]) -> Result<(), LoadError> {
    let mut writer = csv::Writer::from_path(path).map_err(|source| LoadError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    for bar in bars {
        writer.serialize(CsvRow {
            timestamp: bar.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
        })?;
    }
    writer.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Compute a deterministic BLAKE3 hash over a bar series.
///
/// Covers timestamps and all OHLCV values, in order.
pub fn dataset_hash(bars: &[Bar]) -> String {
    let mut hasher = blake3::Hasher::new();
    for bar in bars {
        hasher.update(&bar.timestamp.timestamp().to_le_bytes());
        hasher.update(&bar.open.to_le_bytes());
        hasher.update(&bar.high.to_le_bytes());
        hasher.update(&bar.low.to_le_bytes());
        hasher.update(&bar.close.to_le_bytes());
        hasher.update(&bar.volume.to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}
