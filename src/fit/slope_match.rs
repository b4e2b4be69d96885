//! Mode A: unknown source distance and released mass.
//!
//! Given a known dispersion coefficient and velocity, we search a
//! `distance × mass` grid. At every grid point we simulate a synthetic
//! breakthrough curve, characterize its rising front with the same bounds used
//! on the observed curve, and keep the point whose front slope is closest to
//! the observed slope.
//!
//! The objective is non-smooth (threshold crossings are discrete indices), so
//! the search is a plain exhaustive grid with no gradient information.
//!
//! Determinism:
//! - distance rows are evaluated in parallel, but results are gathered in grid
//!   order and reduced sequentially
//! - the running minimum only moves on strict improvement, so ties keep the
//!   first point in distance-major, low-to-high order (smaller distance wins)

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use tracing::{debug, info};

use crate::domain::{
    EstimationMode, EstimationResult, FrontBounds, FrontCharacterization, KnownFlow, TIME_OFFSET_SECONDS,
};
use crate::error::{EstimationError, EstimationResultOf};
use crate::fit::front::characterize;
use crate::math::lin_space;
use crate::models::simulate_params;

/// Default half-width of the mass search range, relative to the integrated mass.
pub const DEFAULT_MASS_SPREAD: f64 = 0.30;

/// Grid and simulation settings for the slope-matching search.
#[derive(Debug, Clone, PartialEq)]
pub struct SlopeMatchConfig {
    /// Inclusive mass range `[low, high]`.
    pub mass_range: (f64, f64),
    pub mass_samples: usize,
    /// Inclusive distance range `[low, high]`.
    pub distance_range: (f64, f64),
    pub distance_samples: usize,
    /// Bounds applied to every synthetic curve. Must match those used on the
    /// observed curve.
    pub bounds: FrontBounds,
    /// Simulation horizon as a multiple of the advective travel time `x / U`.
    pub horizon_factor: f64,
    /// Number of samples on each synthetic time axis.
    pub simulation_steps: usize,
    /// A candidate must beat this slope difference to be accepted.
    /// `None` accepts any finite difference.
    pub slope_sentinel: Option<f64>,
    /// Abort the search once this much wall time has elapsed.
    pub time_budget: Option<Duration>,
}

impl SlopeMatchConfig {
    pub fn new(mass_range: (f64, f64), distance_range: (f64, f64)) -> Self {
        Self {
            mass_range,
            mass_samples: 50,
            distance_range,
            distance_samples: 1000,
            bounds: FrontBounds::default(),
            horizon_factor: 10.0,
            simulation_steps: 5000,
            slope_sentinel: None,
            time_budget: None,
        }
    }

    fn validate(&self) -> EstimationResultOf<()> {
        self.bounds.validate()?;
        if !(self.distance_range.0.is_finite() && self.distance_range.0 > 0.0) {
            return Err(EstimationError::invalid(format!(
                "distance range must start above 0 (got {})",
                self.distance_range.0
            )));
        }
        if !(self.mass_range.0.is_finite() && self.mass_range.0 > 0.0) {
            return Err(EstimationError::invalid(format!(
                "mass range must start above 0 (got {})",
                self.mass_range.0
            )));
        }
        if !(self.horizon_factor.is_finite() && self.horizon_factor > 1.0) {
            return Err(EstimationError::invalid(format!(
                "horizon factor must be > 1 (got {})",
                self.horizon_factor
            )));
        }
        if self.simulation_steps < 2 {
            return Err(EstimationError::invalid("simulation steps must be >= 2"));
        }
        if let Some(s) = self.slope_sentinel {
            if !(s > 0.0) {
                return Err(EstimationError::invalid(format!("slope sentinel must be > 0 (got {s})")));
            }
        }
        Ok(())
    }
}

/// Mass search range `[M(1 - spread), M(1 + spread)]` around an integrated estimate.
pub fn mass_search_range(mass_estimate: f64, spread: f64) -> EstimationResultOf<(f64, f64)> {
    if !(mass_estimate.is_finite() && mass_estimate > 0.0) {
        return Err(EstimationError::invalid(format!(
            "mass estimate must be > 0 (got {mass_estimate})"
        )));
    }
    if !(spread.is_finite() && (0.0..1.0).contains(&spread)) {
        return Err(EstimationError::invalid(format!("mass spread must be in [0, 1) (got {spread})")));
    }
    Ok((mass_estimate * (1.0 - spread), mass_estimate * (1.0 + spread)))
}

/// Estimate source distance and mass by rising-front slope matching.
pub fn estimate_distance_and_mass(
    observed: &FrontCharacterization,
    known: KnownFlow,
    config: &SlopeMatchConfig,
) -> EstimationResultOf<EstimationResult> {
    config.validate()?;
    validate_known(known)?;
    if !observed.slope.is_finite() {
        return Err(EstimationError::NoConvergence(format!(
            "observed front slope is not finite ({})",
            observed.slope
        )));
    }

    let distances = lin_space(config.distance_range.0, config.distance_range.1, config.distance_samples)?;
    let masses = lin_space(config.mass_range.0, config.mass_range.1, config.mass_samples)?;

    info!(
        distances = distances.len(),
        masses = masses.len(),
        steps = config.simulation_steps,
        observed_slope = observed.slope,
        "starting slope-matching grid search"
    );

    let deadline = config.time_budget.map(|d| Instant::now() + d);
    let timed_out = AtomicBool::new(false);

    // One row of slope differences per distance; `None` marks a failed point.
    let rows: Vec<Vec<Option<f64>>> = distances
        .par_iter()
        .map(|&x| {
            if timed_out.load(Ordering::Relaxed) || deadline.is_some_and(|d| Instant::now() >= d) {
                timed_out.store(true, Ordering::Relaxed);
                return Vec::new();
            }
            evaluate_row(x, &masses, observed.slope, known, config)
        })
        .collect();

    if timed_out.load(Ordering::Relaxed) {
        let seconds = config.time_budget.map(|d| d.as_secs_f64()).unwrap_or(0.0);
        return Err(EstimationError::TimedOut { seconds });
    }

    let evaluated = rows.iter().flatten().filter(|d| d.is_some()).count();
    let sentinel = config.slope_sentinel.unwrap_or(f64::INFINITY);

    let Some((xi, mi, diff)) = select_best(&rows, sentinel) else {
        return Err(EstimationError::NoConvergence(format!(
            "none of {} grid points produced a slope difference below {sentinel} ({} characterized)",
            distances.len() * masses.len(),
            evaluated
        )));
    };

    let params = known.with_source(distances[xi], masses[mi]);
    info!(
        distance = params.distance,
        mass = params.mass,
        slope_diff = diff,
        evaluated,
        "slope matching finished"
    );

    Ok(EstimationResult {
        mode: EstimationMode::DistanceMass,
        params,
        residual: diff,
        evaluations: evaluated,
    })
}

/// Re-run the distance search at fixed masses `mass × multiplier`.
///
/// Each entry uses a single-mass grid, so the returned distances show how far
/// the source estimate moves when the integrated mass is off by that factor.
pub fn sweep_mass_variance(
    observed: &FrontCharacterization,
    known: KnownFlow,
    config: &SlopeMatchConfig,
    mass: f64,
    multipliers: &[f64],
) -> EstimationResultOf<Vec<EstimationResult>> {
    multipliers
        .iter()
        .map(|&m| {
            let fixed = mass * m;
            let sweep_config = SlopeMatchConfig {
                mass_range: (fixed, fixed),
                mass_samples: 1,
                ..config.clone()
            };
            debug!(multiplier = m, mass = fixed, "mass sweep step");
            estimate_distance_and_mass(observed, known, &sweep_config)
        })
        .collect()
}

fn validate_known(known: KnownFlow) -> EstimationResultOf<()> {
    for (name, v) in [
        ("dispersion", known.dispersion),
        ("velocity", known.velocity),
        ("area", known.area),
    ] {
        if !(v.is_finite() && v > 0.0) {
            return Err(EstimationError::invalid(format!("{name} must be finite and > 0 (got {v})")));
        }
    }
    Ok(())
}

fn evaluate_row(
    distance: f64,
    masses: &[f64],
    observed_slope: f64,
    known: KnownFlow,
    config: &SlopeMatchConfig,
) -> Vec<Option<f64>> {
    let horizon = config.horizon_factor * distance / known.velocity;
    // The time axis depends on distance only; share it across the mass row.
    let Ok(time) = lin_space(TIME_OFFSET_SECONDS, TIME_OFFSET_SECONDS + horizon, config.simulation_steps) else {
        return vec![None; masses.len()];
    };

    masses
        .iter()
        .map(|&mass| {
            let params = known.with_source(distance, mass);
            let curve = simulate_params(&time, &params, known.area).ok()?;
            let front = characterize(&time, &curve, config.bounds).ok()?;
            let diff = (front.slope - observed_slope).abs();
            diff.is_finite().then_some(diff)
        })
        .collect()
}

/// Strict-improvement running minimum over rows in grid order.
///
/// Returns `(row, column, diff)` of the first strictly smallest difference below
/// `sentinel`.
fn select_best(rows: &[Vec<Option<f64>>], sentinel: f64) -> Option<(usize, usize, f64)> {
    let mut best: Option<(usize, usize, f64)> = None;
    let mut best_diff = sentinel;
    for (xi, row) in rows.iter().enumerate() {
        for (mi, diff) in row.iter().enumerate() {
            if let Some(d) = *diff {
                if d < best_diff {
                    best_diff = d;
                    best = Some((xi, mi, d));
                }
            }
        }
    }
    best
}
