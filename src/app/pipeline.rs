//! Shared estimation pipeline used by the CLI subcommands.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! raw series -> concentration -> front characterization -> estimator ->
//! synthetic curve at the estimate
//!
//! The CLI can then focus on presentation (printing, plots, exports).

use std::time::Duration;

use tracing::{info, warn};

use crate::convert::{ConductanceRegression, MassDischarge, mass_discharge, series_to_concentration};
use crate::domain::{
    EstimationResult, FrontBounds, FrontCharacterization, KnownFlow, KnownRelease, TimeSeries, TransportParameters,
};
use crate::error::AppError;
use crate::fit::{
    NonlinearFitConfig, SlopeMatchConfig, characterize_series, estimate_distance_and_mass, fit_series,
    mass_search_range, sweep_mass_variance,
};
use crate::models::simulate_params;

/// What the value column of an input series holds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeriesKind {
    /// Tracer concentration (mg/L), used as-is.
    Concentration,
    /// Specific conductance (µS/cm), converted with the baseline at `baseline_index`.
    Conductance {
        baseline_index: usize,
        regression: ConductanceRegression,
    },
}

/// Inputs for Mode A (unknown distance and mass).
#[derive(Debug, Clone)]
pub struct LocateConfig {
    pub kind: SeriesKind,
    pub known: KnownFlow,
    /// Volumetric flow (m³/s) used to turn the integrated curve into grams.
    pub flow: f64,
    pub bounds: FrontBounds,
    pub distance_range: (f64, f64),
    pub distance_samples: usize,
    pub mass_samples: usize,
    pub mass_spread: f64,
    pub simulation_steps: usize,
    pub slope_sentinel: Option<f64>,
    pub time_budget: Option<Duration>,
    /// Mass multipliers for the sensitivity sweep; empty skips it.
    pub sweep_multipliers: Vec<f64>,
}

/// Inputs for Mode B (unknown dispersion and velocity).
#[derive(Debug, Clone)]
pub struct CalibrateConfig {
    pub kind: SeriesKind,
    pub known: KnownRelease,
    pub initial: (f64, f64),
    pub fit: NonlinearFitConfig,
    /// Only used to describe the observed front in the report.
    pub bounds: FrontBounds,
}

/// All computed outputs of a single run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// Observed concentration series (after conversion, if any).
    pub observed: TimeSeries,
    pub front: Option<FrontCharacterization>,
    pub mass: Option<MassDischarge>,
    pub result: EstimationResult,
    /// Forward model at the estimate, on the observed time axis.
    pub synthetic: TimeSeries,
    /// `(multiplier, result)` per sweep step.
    pub sweep: Vec<(f64, EstimationResult)>,
}

/// Mode A: integrate the curve for a mass estimate, then slope-match `(x, M)`.
pub fn run_locate(raw: &TimeSeries, config: &LocateConfig) -> Result<RunOutput, AppError> {
    let observed = to_concentration_series(raw, config.kind)?;
    let front = characterize_series(&observed, config.bounds)?;
    let mass = mass_discharge(&observed, config.flow)?;
    info!(
        peak = front.peak,
        slope = front.slope,
        mass_grams = mass.mass_grams,
        "characterized observed curve"
    );

    let mut grid = SlopeMatchConfig::new(
        mass_search_range(mass.mass_grams, config.mass_spread)?,
        config.distance_range,
    );
    grid.mass_samples = config.mass_samples;
    grid.distance_samples = config.distance_samples;
    grid.simulation_steps = config.simulation_steps;
    grid.bounds = config.bounds;
    grid.slope_sentinel = config.slope_sentinel;
    grid.time_budget = config.time_budget;

    let result = estimate_distance_and_mass(&front, config.known, &grid)?;
    let synthetic = synthetic_at(&observed, &result.params, config.known.area)?;

    let sweep = if config.sweep_multipliers.is_empty() {
        Vec::new()
    } else {
        let results =
            sweep_mass_variance(&front, config.known, &grid, result.params.mass, &config.sweep_multipliers)?;
        config.sweep_multipliers.iter().copied().zip(results).collect()
    };

    Ok(RunOutput {
        observed,
        front: Some(front),
        mass: Some(mass),
        result,
        synthetic,
        sweep,
    })
}

/// Mode B: fit `(K, U)` for a release of known mass at a known distance.
pub fn run_calibrate(raw: &TimeSeries, config: &CalibrateConfig) -> Result<RunOutput, AppError> {
    let observed = to_concentration_series(raw, config.kind)?;

    // The fit itself does not need the front; a flat curve still fails later.
    let front = match characterize_series(&observed, config.bounds) {
        Ok(front) => Some(front),
        Err(e) => {
            warn!(error = %e, "could not characterize observed front");
            None
        }
    };

    let result = fit_series(&observed, config.known, config.initial, &config.fit)?;
    let synthetic = synthetic_at(&observed, &result.params, config.known.area)?;

    Ok(RunOutput {
        observed,
        front,
        mass: None,
        result,
        synthetic,
        sweep: Vec::new(),
    })
}

fn to_concentration_series(raw: &TimeSeries, kind: SeriesKind) -> Result<TimeSeries, AppError> {
    // Checked here so a bad axis fails before any grid search.
    if let Some(&t0) = raw.time().first().filter(|&&t| t <= 0.0) {
        return Err(AppError::new(
            3,
            format!("Observed times must be > 0 s after the release (first sample at {t0}s)."),
        ));
    }
    match kind {
        SeriesKind::Concentration => Ok(raw.clone()),
        SeriesKind::Conductance {
            baseline_index,
            regression,
        } => Ok(series_to_concentration(raw, baseline_index, &regression)?),
    }
}

fn synthetic_at(observed: &TimeSeries, params: &TransportParameters, area: f64) -> Result<TimeSeries, AppError> {
    let values = simulate_params(observed.time(), params, area)?;
    Ok(observed.with_values(values)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SyntheticConfig, generate_observed, to_conductance};
    use crate::domain::EstimationMode;

    const M: f64 = 1_000_000.0;
    const U: f64 = 0.157;
    const K: f64 = 0.367;
    const A: f64 = 0.113;
    const X: f64 = 88.09;

    fn observed() -> TimeSeries {
        generate_observed(&SyntheticConfig {
            params: TransportParameters {
                mass: M,
                velocity: U,
                dispersion: K,
                distance: X,
            },
            area: A,
            duration: 1999.0,
            interval: 1.0,
            noise_sd: 0.0,
            seed: 7,
        })
        .unwrap()
    }

    fn locate_config(kind: SeriesKind) -> LocateConfig {
        LocateConfig {
            kind,
            known: KnownFlow {
                dispersion: K,
                velocity: U,
                area: A,
            },
            flow: U * A,
            bounds: FrontBounds::default(),
            distance_range: (61.0, 121.0),
            distance_samples: 31,
            mass_samples: 5,
            mass_spread: 0.3,
            simulation_steps: 5000,
            slope_sentinel: None,
            time_budget: None,
            sweep_multipliers: vec![0.9, 1.1],
        }
    }

    #[test]
    fn locate_integrates_mass_and_returns_synthetic_on_observed_axis() {
        let obs = observed();
        let run = run_locate(&obs, &locate_config(SeriesKind::Concentration)).unwrap();

        assert_eq!(run.result.mode, EstimationMode::DistanceMass);
        let mass = run.mass.unwrap();
        assert!(((mass.mass_grams - M) / M).abs() < 0.01, "mass={}", mass.mass_grams);
        assert_eq!(run.synthetic.time(), obs.time());
        assert!(run.result.params.distance >= 61.0 && run.result.params.distance <= 121.0);
        assert_eq!(run.sweep.len(), 2);
        assert_eq!(run.sweep[0].0, 0.9);
    }

    #[test]
    fn locate_accepts_conductance_input() {
        let regression = ConductanceRegression::default();
        let sc = to_conductance(&observed(), 250.0, &regression).unwrap();
        let mut config = locate_config(SeriesKind::Conductance {
            baseline_index: 0,
            regression,
        });
        config.sweep_multipliers.clear();

        let run = run_locate(&sc, &config).unwrap();
        let mass = run.mass.unwrap();
        assert!(((mass.mass_grams - M) / M).abs() < 0.02, "mass={}", mass.mass_grams);
        assert!(run.sweep.is_empty());
    }

    #[test]
    fn calibrate_recovers_dispersion_and_velocity() {
        let config = CalibrateConfig {
            kind: SeriesKind::Concentration,
            known: KnownRelease {
                mass: M,
                distance: X,
                area: A,
            },
            initial: (0.05, 0.05),
            fit: NonlinearFitConfig::default(),
            bounds: FrontBounds::default(),
        };
        let run = run_calibrate(&observed(), &config).unwrap();
        assert_eq!(run.result.mode, EstimationMode::DispersionVelocity);
        assert!(((run.result.params.dispersion - K) / K).abs() < 0.01);
        assert!(((run.result.params.velocity - U) / U).abs() < 0.01);
        assert!(run.front.is_some());
        assert!(run.mass.is_none());
    }

    #[test]
    fn non_positive_times_fail_before_estimation() {
        let early = TimeSeries::new(vec![-2.0, 0.0, 5.0, 9.0], vec![0.0, 1.0, 3.0, 2.0]).unwrap();
        let err = run_locate(&early, &locate_config(SeriesKind::Concentration)).unwrap_err();
        assert_eq!(err.exit_code(), 3);
        assert!(err.to_string().contains("first sample at -2s"));
    }

    #[test]
    fn flat_series_is_a_data_error() {
        let flat = TimeSeries::new(vec![1.0, 2.0, 3.0], vec![0.0; 3]).unwrap();
        let err = run_locate(&flat, &locate_config(SeriesKind::Concentration)).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }
}
