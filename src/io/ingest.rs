//! CSV ingest and normalization.
//!
//! This module turns a logger export into a clean [`TimeSeries`]:
//!
//! - **Named columns**: a time column (seconds) and one value column
//!   (conductance or concentration), matched case-insensitively
//! - **Row-level validation**: unparseable rows are skipped and reported
//! - **Time origin**: every time stamp is shifted by
//!   [`TIME_OFFSET_SECONDS`] so the forward model is never evaluated at `t = 0`

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use tracing::{debug, warn};

use crate::domain::{TIME_OFFSET_SECONDS, TimeSeries};
use crate::error::AppError;

/// A row-level error encountered during ingest.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Ingest output: the series plus bookkeeping for the run summary.
#[derive(Debug, Clone)]
pub struct IngestedSeries {
    pub series: TimeSeries,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    pub rows_used: usize,
}

/// Load a two-column series from a CSV file.
pub fn load_series(path: &Path, time_column: &str, value_column: &str) -> Result<IngestedSeries, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open CSV '{}': {e}", path.display())))?;
    let ingested = read_series(file, time_column, value_column)?;
    debug!(
        path = %path.display(),
        rows_read = ingested.rows_read,
        rows_used = ingested.rows_used,
        "loaded series"
    );
    Ok(ingested)
}

/// Parse a two-column series from any CSV reader.
pub fn read_series<R: Read>(reader: R, time_column: &str, value_column: &str) -> Result<IngestedSeries, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    let time_idx = column_index(&header_map, time_column)?;
    let value_idx = column_index(&header_map, value_column)?;

    let mut time = Vec::new();
    let mut value = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // +2: records start after the header line, and lines are 1-based.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        match (
            parse_f64(&record, time_idx, time_column),
            parse_f64(&record, value_idx, value_column),
        ) {
            (Ok(t), Ok(v)) => {
                time.push(t + TIME_OFFSET_SECONDS);
                value.push(v);
            }
            (Err(message), _) | (_, Err(message)) => row_errors.push(RowError { line, message }),
        }
    }

    if !row_errors.is_empty() {
        warn!(skipped = row_errors.len(), "skipped malformed CSV rows");
    }

    let rows_used = time.len();
    if rows_used < 2 {
        return Err(AppError::new(
            3,
            format!("Need at least two valid rows; found {rows_used} of {rows_read}."),
        ));
    }

    // The forward model is undefined at or before the release.
    if let Some(i) = time.iter().position(|&t| t <= 0.0) {
        return Err(AppError::new(
            3,
            format!(
                "Sample {} is at {}s; times must be later than -{}s relative to the release.",
                i + 1,
                time[i] - TIME_OFFSET_SECONDS,
                TIME_OFFSET_SECONDS
            ),
        ));
    }

    let series = TimeSeries::new(time, value).map_err(|e| AppError::new(3, format!("Invalid series: {e}")))?;

    Ok(IngestedSeries {
        series,
        row_errors,
        rows_read,
        rows_used,
    })
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports sometimes prefix the first header with a UTF-8 BOM.
    name.trim().trim_start_matches('\u{feff}').to_ascii_lowercase()
}

fn column_index(header_map: &HashMap<String, usize>, name: &str) -> Result<usize, AppError> {
    header_map.get(&normalize_header_name(name)).copied().ok_or_else(|| {
        let mut available: Vec<&str> = header_map.keys().map(String::as_str).collect();
        available.sort_unstable();
        AppError::new(
            2,
            format!("Missing required column `{name}` (available: {}).", available.join(", ")),
        )
    })
}

fn parse_f64(record: &StringRecord, idx: usize, name: &str) -> Result<f64, String> {
    let raw = record
        .get(idx)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("Missing value for `{name}`"))?;
    let v = raw
        .parse::<f64>()
        .map_err(|_| format!("Invalid number '{raw}' for `{name}`"))?;
    if v.is_finite() {
        Ok(v)
    } else {
        Err(format!("Non-finite value '{raw}' for `{name}`"))
    }
}
