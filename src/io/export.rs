//! Export observed and synthetic series to CSV.
//!
//! The export is meant to be easy to consume in spreadsheets or downstream scripts.
//! Times are written as seconds since release (ingest offset included).

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::domain::TimeSeries;
use crate::error::AppError;

/// Write `time_s,observed,synthetic` rows. Both series share a time axis.
pub fn write_series_csv(path: &Path, observed: &TimeSeries, synthetic: &TimeSeries) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create export CSV '{}': {e}", path.display())))?;
    write_series(file, observed, synthetic)
}

/// Write a single series as `time_s,<value_label>` rows.
pub fn write_single_series_csv(path: &Path, series: &TimeSeries, value_label: &str) -> Result<(), AppError> {
    let mut file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create CSV '{}': {e}", path.display())))?;

    writeln!(file, "time_s,{value_label}")
        .map_err(|e| AppError::new(2, format!("Failed to write CSV header: {e}")))?;
    for (t, v) in series.time().iter().zip(series.value()) {
        writeln!(file, "{t:.4},{v:.10}").map_err(|e| AppError::new(2, format!("Failed to write CSV row: {e}")))?;
    }
    Ok(())
}

fn write_series<W: Write>(mut out: W, observed: &TimeSeries, synthetic: &TimeSeries) -> Result<(), AppError> {
    if observed.time() != synthetic.time() {
        return Err(AppError::new(4, "Observed and synthetic series use different time axes."));
    }

    writeln!(out, "time_s,observed,synthetic,residual")
        .map_err(|e| AppError::new(2, format!("Failed to write export CSV header: {e}")))?;

    for ((t, o), s) in observed.time().iter().zip(observed.value()).zip(synthetic.value()) {
        writeln!(out, "{t:.4},{o:.10},{s:.10},{:.10}", o - s)
            .map_err(|e| AppError::new(2, format!("Failed to write export CSV row: {e}")))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_header_and_residuals() {
        let obs = TimeSeries::new(vec![1.0, 2.0], vec![1.0, 3.0]).unwrap();
        let syn = obs.with_values(vec![0.5, 3.5]).unwrap();
        let mut buf = Vec::new();
        write_series(&mut buf, &obs, &syn).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "time_s,observed,synthetic,residual");
        assert_eq!(lines.len(), 3);
        assert!(lines[2].ends_with("-0.5000000000"));
    }

    #[test]
    fn rejects_mismatched_axes() {
        let obs = TimeSeries::new(vec![1.0, 2.0], vec![1.0, 3.0]).unwrap();
        let syn = TimeSeries::new(vec![1.0, 3.0], vec![1.0, 3.0]).unwrap();
        assert!(write_series(Vec::new(), &obs, &syn).is_err());
    }
}
