//! Mode B: unknown dispersion coefficient and velocity.
//!
//! With the release mass and source distance known, `(K, U)` are fitted to the
//! whole observed breakthrough curve by minimising
//!
//! ```text
//! SSE(K, U) = Σ (C_obs(t_i) − C(t_i; M, U, K, A, x))²
//! ```
//!
//! Implementation choices:
//! - Levenberg–Marquardt on `θ = (ln K, ln U)`; iterates can never leave the
//!   physical domain `K, U > 0`.
//! - Analytic Jacobian from [`crate::models::log_flow_sensitivities`].
//! - Marquardt diagonal scaling; each damped 2×2 system is solved with the SVD
//!   helper in [`crate::math::solve_least_squares`].
//! - When the starting guess is far off, the model curve and the observed curve
//!   do not overlap and the gradient vanishes. A coarse log-spaced scan around
//!   the guess picks a starting point inside the basin first.

use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::domain::{EstimationMode, EstimationResult, KnownRelease, TimeSeries};
use crate::error::{EstimationError, EstimationResultOf};
use crate::math::{log_space, solve_least_squares};
use crate::models::{concentration_at, log_flow_sensitivities};

/// Damping above which no downhill step exists; the iterate is stationary.
const MAX_DAMPING: f64 = 1e16;
const MIN_DAMPING: f64 = 1e-15;

#[derive(Debug, Clone, PartialEq)]
pub struct NonlinearFitConfig {
    pub max_iterations: usize,
    /// Relative SSE reduction below which an accepted step ends the fit.
    pub ftol: f64,
    /// Relative step length (in log parameters) below which the fit ends.
    pub xtol: f64,
    pub initial_damping: f64,
    /// Points per axis of the seeding scan. `0` or `1` disables the scan.
    pub seed_steps: usize,
    /// The scan covers `[p0 / span, p0 * span]` for each parameter.
    pub seed_span: f64,
}

impl Default for NonlinearFitConfig {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            ftol: 1e-12,
            xtol: 1e-10,
            initial_damping: 1e-3,
            seed_steps: 21,
            seed_span: 20.0,
        }
    }
}

/// Fit `(K, U)` to an observed concentration series.
pub fn estimate_dispersion_and_velocity(
    t: &[f64],
    c_obs: &[f64],
    known: KnownRelease,
    initial: (f64, f64),
    config: &NonlinearFitConfig,
) -> EstimationResultOf<EstimationResult> {
    validate_inputs(t, c_obs, known, initial)?;

    let problem = Problem { t, c_obs, known };
    let (k0, u0) = seed(&problem, initial, config)?;

    let mut theta = [k0.ln(), u0.ln()];
    let mut lambda = config.initial_damping.max(MIN_DAMPING);
    let mut cost = problem.sse(theta);
    if !cost.is_finite() {
        return Err(EstimationError::OptimizationDiverged(format!(
            "objective is not finite at the starting point (K={k0}, U={u0})"
        )));
    }

    let mut converged = false;
    let mut iterations = 0;

    'outer: while iterations < config.max_iterations {
        iterations += 1;
        let (h, g) = problem.normal_equations(theta);

        loop {
            let Some(step) = damped_step(&h, &g, lambda) else {
                lambda *= 10.0;
                if lambda > MAX_DAMPING {
                    converged = true;
                    break 'outer;
                }
                continue;
            };

            let trial = [theta[0] + step[0], theta[1] + step[1]];
            let trial_cost = problem.sse(trial);

            if trial_cost.is_finite() && trial_cost < cost {
                let reduction = (cost - trial_cost) / cost.max(f64::MIN_POSITIVE);
                let step_norm = (step[0] * step[0] + step[1] * step[1]).sqrt();
                let theta_norm = (trial[0] * trial[0] + trial[1] * trial[1]).sqrt();

                theta = trial;
                cost = trial_cost;
                lambda = (lambda / 10.0).max(MIN_DAMPING);

                debug!(
                    iteration = iterations,
                    dispersion = theta[0].exp(),
                    velocity = theta[1].exp(),
                    sse = cost,
                    lambda,
                    "accepted LM step"
                );

                if reduction <= config.ftol || step_norm <= config.xtol * (theta_norm + config.xtol) {
                    converged = true;
                    break 'outer;
                }
                break;
            }

            lambda *= 10.0;
            if lambda > MAX_DAMPING {
                // No downhill direction left at this iterate.
                converged = true;
                break 'outer;
            }
        }
    }

    if !converged {
        return Err(EstimationError::OptimizationDiverged(format!(
            "no convergence within {} iterations (K={:.6}, U={:.6}, SSE={cost:.6e})",
            config.max_iterations,
            theta[0].exp(),
            theta[1].exp()
        )));
    }

    let dispersion = theta[0].exp();
    let velocity = theta[1].exp();
    if !(dispersion.is_finite() && dispersion > 0.0 && velocity.is_finite() && velocity > 0.0) {
        return Err(EstimationError::OptimizationDiverged(format!(
            "non-physical result K={dispersion}, U={velocity}"
        )));
    }

    let null_cost: f64 = c_obs.iter().map(|c| c * c).sum();
    if cost >= null_cost && null_cost > 0.0 {
        return Err(EstimationError::OptimizationDiverged(format!(
            "fitted curve (K={dispersion:.6}, U={velocity:.6}) explains none of the observed signal"
        )));
    }

    info!(dispersion, velocity, sse = cost, iterations, "nonlinear fit converged");

    Ok(EstimationResult {
        mode: EstimationMode::DispersionVelocity,
        params: known.with_flow(dispersion, velocity),
        residual: cost,
        evaluations: iterations,
    })
}

/// [`estimate_dispersion_and_velocity`] on a [`TimeSeries`].
pub fn fit_series(
    series: &TimeSeries,
    known: KnownRelease,
    initial: (f64, f64),
    config: &NonlinearFitConfig,
) -> EstimationResultOf<EstimationResult> {
    estimate_dispersion_and_velocity(series.time(), series.value(), known, initial, config)
}

struct Problem<'a> {
    t: &'a [f64],
    c_obs: &'a [f64],
    known: KnownRelease,
}

impl Problem<'_> {
    fn sse(&self, theta: [f64; 2]) -> f64 {
        let params = self.known.with_flow(theta[0].exp(), theta[1].exp());
        let sse: f64 = self
            .t
            .iter()
            .zip(self.c_obs)
            .map(|(&ti, &ci)| {
                let r = ci - concentration_at(ti, &params, self.known.area);
                r * r
            })
            .sum();
        if sse.is_finite() { sse } else { f64::INFINITY }
    }

    /// `JᵀJ` and `Jᵀr` with `r = C_obs − C` and `J = ∂r/∂θ`.
    fn normal_equations(&self, theta: [f64; 2]) -> ([[f64; 2]; 2], [f64; 2]) {
        let params = self.known.with_flow(theta[0].exp(), theta[1].exp());
        let mut h = [[0.0; 2]; 2];
        let mut g = [0.0; 2];
        for (&ti, &ci) in self.t.iter().zip(self.c_obs) {
            let (c, dk, du) = log_flow_sensitivities(ti, &params, self.known.area);
            let r = ci - c;
            let j = [-dk, -du];
            for a in 0..2 {
                g[a] += j[a] * r;
                for b in 0..2 {
                    h[a][b] += j[a] * j[b];
                }
            }
        }
        (h, g)
    }
}

/// Solve `(JᵀJ + λ·diag(JᵀJ)) δ = −Jᵀr`.
fn damped_step(h: &[[f64; 2]; 2], g: &[f64; 2], lambda: f64) -> Option<[f64; 2]> {
    let scale = h[0][0].max(h[1][1]).max(f64::MIN_POSITIVE);
    let mut a = DMatrix::<f64>::zeros(2, 2);
    for i in 0..2 {
        for j in 0..2 {
            a[(i, j)] = h[i][j];
        }
        // Floor the diagonal so a flat direction still receives damping.
        a[(i, i)] += lambda * h[i][i].max(1e-12 * scale);
    }
    let rhs = DVector::from_row_slice(&[-g[0], -g[1]]);
    let delta = solve_least_squares(&a, &rhs)?;
    Some([delta[0], delta[1]])
}

/// Pick the starting point: the user's guess or the best point of a coarse scan.
fn seed(problem: &Problem<'_>, initial: (f64, f64), config: &NonlinearFitConfig) -> EstimationResultOf<(f64, f64)> {
    if config.seed_steps < 2 {
        return Ok(initial);
    }
    if !(config.seed_span.is_finite() && config.seed_span > 1.0) {
        return Err(EstimationError::invalid(format!(
            "seed span must be > 1 (got {})",
            config.seed_span
        )));
    }

    let (k0, u0) = initial;
    let ks = log_space(k0 / config.seed_span, k0 * config.seed_span, config.seed_steps)?;
    let us = log_space(u0 / config.seed_span, u0 * config.seed_span, config.seed_steps)?;

    let pairs: Vec<(f64, f64)> = ks.iter().flat_map(|&k| us.iter().map(move |&u| (k, u))).collect();
    let costs: Vec<f64> = pairs
        .par_iter()
        .map(|&(k, u)| problem.sse([k.ln(), u.ln()]))
        .collect();

    // Deterministic selection: minimum SSE, ties broken by grid order.
    let mut best = (initial, problem.sse([k0.ln(), u0.ln()]));
    for (&pair, &cost) in pairs.iter().zip(&costs) {
        if cost < best.1 {
            best = (pair, cost);
        }
    }

    if best.0 != initial {
        debug!(
            dispersion = best.0.0,
            velocity = best.0.1,
            sse = best.1,
            "seeding scan moved the starting point"
        );
    } else if !best.1.is_finite() {
        warn!("seeding scan found no finite objective value");
    }
    Ok(best.0)
}

fn validate_inputs(t: &[f64], c_obs: &[f64], known: KnownRelease, initial: (f64, f64)) -> EstimationResultOf<()> {
    if t.len() != c_obs.len() {
        return Err(EstimationError::invalid(format!(
            "time and concentration lengths differ ({} vs {})",
            t.len(),
            c_obs.len()
        )));
    }
    if t.len() < 2 {
        return Err(EstimationError::InsufficientData(
            "at least two observations are needed to fit two parameters".to_string(),
        ));
    }
    if let Some(i) = t.iter().position(|&v| !(v.is_finite() && v > 0.0)) {
        return Err(EstimationError::invalid(format!("time must be > 0 (t[{i}] = {})", t[i])));
    }
    if let Some(i) = c_obs.iter().position(|v| !v.is_finite()) {
        return Err(EstimationError::invalid(format!("non-finite concentration at index {i}")));
    }
    if !(known.area.is_finite() && known.area > 0.0) {
        return Err(EstimationError::invalid(format!("area must be > 0 (got {})", known.area)));
    }
    if !(known.mass.is_finite() && known.distance.is_finite()) {
        return Err(EstimationError::invalid("mass and distance must be finite"));
    }
    let (k0, u0) = initial;
    if !(k0.is_finite() && k0 > 0.0 && u0.is_finite() && u0 > 0.0) {
        return Err(EstimationError::invalid(format!(
            "initial guesses must be strictly positive (K0={k0}, U0={u0})"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::simulate;

    const M: f64 = 1_000_000.0;
    const U: f64 = 0.157;
    const K: f64 = 0.367;
    const A: f64 = 0.113;
    const X: f64 = 88.09;

    fn known() -> KnownRelease {
        KnownRelease {
            mass: M,
            distance: X,
            area: A,
        }
    }

    fn observed() -> (Vec<f64>, Vec<f64>) {
        let t: Vec<f64> = (1..=2000).map(|i| i as f64).collect();
        let c = simulate(&t, M, U, K, A, X).unwrap();
        (t, c)
    }

    #[test]
    fn converges_from_a_poor_initial_guess() {
        let (t, c) = observed();
        let result =
            estimate_dispersion_and_velocity(&t, &c, known(), (0.05, 0.05), &NonlinearFitConfig::default()).unwrap();

        assert_eq!(result.mode, EstimationMode::DispersionVelocity);
        let k = result.params.dispersion;
        let u = result.params.velocity;
        assert!(((k - K) / K).abs() < 0.01, "K={k}");
        assert!(((u - U) / U).abs() < 0.01, "U={u}");
        assert_eq!(result.params.mass, M);
        assert_eq!(result.params.distance, X);
    }

    #[test]
    fn converges_without_seeding_from_a_nearby_guess() {
        let (t, c) = observed();
        let config = NonlinearFitConfig {
            seed_steps: 0,
            ..NonlinearFitConfig::default()
        };
        let result = estimate_dispersion_and_velocity(&t, &c, known(), (0.3, 0.17), &config).unwrap();
        assert!(((result.params.dispersion - K) / K).abs() < 0.01);
        assert!(((result.params.velocity - U) / U).abs() < 0.01);
        assert!(result.residual < 1e-6 * c.iter().map(|v| v * v).sum::<f64>());
    }

    #[test]
    fn rejects_non_positive_initial_guess() {
        let (t, c) = observed();
        assert!(matches!(
            estimate_dispersion_and_velocity(&t, &c, known(), (0.0, 0.1), &NonlinearFitConfig::default()),
            Err(EstimationError::InvalidParameter(_))
        ));
    }

    #[test]
    fn exhausted_iteration_budget_diverges() {
        let (t, c) = observed();
        let config = NonlinearFitConfig {
            max_iterations: 0,
            ..NonlinearFitConfig::default()
        };
        assert!(matches!(
            estimate_dispersion_and_velocity(&t, &c, known(), (0.05, 0.05), &config),
            Err(EstimationError::OptimizationDiverged(_))
        ));
    }

    #[test]
    fn damped_step_solves_identity_system() {
        let h = [[2.0, 0.0], [0.0, 4.0]];
        let g = [-2.0, 8.0];
        let step = damped_step(&h, &g, 0.0).unwrap();
        assert!((step[0] - 1.0).abs() < 1e-12);
        assert!((step[1] + 2.0).abs() < 1e-12);
    }
}
