//! Read/write result JSON files.
//!
//! A result file is the portable record of one estimation run:
//! - mode, full parameter set and residual
//! - the observed series and the synthetic series re-simulated at the estimate
//! - the observed front characterization (when one was computed)
//!
//! It carries everything needed to redraw the comparison plot later.

use std::fs::File;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{EstimationResult, FrontCharacterization, TimeSeries};
use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultFile {
    pub tool: String,
    pub version: String,
    pub generated: DateTime<Utc>,
    pub area: f64,
    pub result: EstimationResult,
    pub observed_front: Option<FrontCharacterization>,
    pub observed: TimeSeries,
    pub synthetic: TimeSeries,
}

impl ResultFile {
    pub fn new(
        result: EstimationResult,
        area: f64,
        observed_front: Option<FrontCharacterization>,
        observed: TimeSeries,
        synthetic: TimeSeries,
    ) -> Self {
        Self {
            tool: "tracer".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            generated: Utc::now(),
            area,
            result,
            observed_front,
            observed,
            synthetic,
        }
    }
}

/// Write a result JSON file.
pub fn write_result_json(path: &Path, file: &ResultFile) -> Result<(), AppError> {
    let out = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create result JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(out, file)
        .map_err(|e| AppError::new(2, format!("Failed to write result JSON: {e}")))?;
    Ok(())
}

/// Read a result JSON file.
pub fn read_result_json(path: &Path) -> Result<ResultFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open result JSON '{}': {e}", path.display())))?;
    let parsed: ResultFile =
        serde_json::from_reader(file).map_err(|e| AppError::new(2, format!("Invalid result JSON: {e}")))?;
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EstimationMode, TransportParameters};

    #[test]
    fn result_file_round_trips_through_disk() {
        let observed = TimeSeries::new(vec![1.0, 2.0, 3.0], vec![0.0, 2.0, 1.0]).unwrap();
        let synthetic = observed.with_values(vec![0.1, 1.9, 1.1]).unwrap();
        let result = EstimationResult {
            mode: EstimationMode::DispersionVelocity,
            params: TransportParameters {
                mass: 10.0,
                velocity: 0.2,
                dispersion: 0.4,
                distance: 50.0,
            },
            residual: 0.03,
            evaluations: 12,
        };
        let file = ResultFile::new(result, 0.5, None, observed, synthetic);

        let path = std::env::temp_dir().join(format!("tracer-result-{}.json", std::process::id()));
        write_result_json(&path, &file).unwrap();
        let back = read_result_json(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(back, file);
        assert_eq!(back.tool, "tracer");
    }
}
