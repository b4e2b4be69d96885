//! Least squares helpers.
//!
//! Two shapes of problem show up in this crate:
//!
//! - a simple `y ≈ a + b·t` regression over the rising front of a curve, solved
//!   tens of thousands of times during the slope-matching grid search; this one
//!   uses the closed form `b = cov(t, y) / var(t)` on centred data
//! - the small damped normal equations of each Levenberg–Marquardt step, solved
//!   with an SVD so near-singular systems degrade gracefully

use nalgebra::{DMatrix, DVector};

/// Intercept and slope of an ordinary least squares line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineFit {
    pub intercept: f64,
    pub slope: f64,
}

/// Fit `y ≈ a + b·t`.
///
/// Returns `None` with fewer than two points, mismatched lengths, non-finite
/// inputs, or zero variance in `t`.
pub fn linear_fit(t: &[f64], y: &[f64]) -> Option<LineFit> {
    if t.len() != y.len() || t.len() < 2 {
        return None;
    }
    if t.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return None;
    }

    let n = t.len() as f64;
    let tbar = t.iter().sum::<f64>() / n;
    let ybar = y.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var = 0.0;
    for (&ti, &yi) in t.iter().zip(y) {
        let dt = ti - tbar;
        cov += dt * (yi - ybar);
        var += dt * dt;
    }
    if var <= 1e-18 || !cov.is_finite() {
        return None;
    }

    let slope = cov / var;
    Some(LineFit {
        intercept: ybar - slope * tbar,
        slope,
    })
}

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}
