//! 1-D grids for the estimators.
//!
//! - `lin_space` builds the distance/mass grids of the slope-matching search
//!   and the simulation time axis.
//! - `log_space` builds the seeding grid of the nonlinear fit, where K and U
//!   can be off by an order of magnitude.

use crate::error::{EstimationError, EstimationResultOf};

/// Generate `steps` evenly spaced points between `min` and `max` (inclusive).
///
/// A single step yields `[min]`. `min == max` is allowed (a degenerate grid).
pub fn lin_space(min: f64, max: f64, steps: usize) -> EstimationResultOf<Vec<f64>> {
    if !(min.is_finite() && max.is_finite() && max >= min) {
        return Err(EstimationError::invalid(format!(
            "invalid range: min={min}, max={max} (must be finite and max >= min)"
        )));
    }
    if steps == 0 {
        return Err(EstimationError::invalid("grid steps must be >= 1"));
    }
    if steps == 1 {
        return Ok(vec![min]);
    }

    let step = (max - min) / (steps as f64 - 1.0);
    let mut out: Vec<f64> = (0..steps).map(|i| min + step * i as f64).collect();
    // Pin the endpoint exactly; accumulated rounding would otherwise drift.
    out[steps - 1] = max;
    Ok(out)
}

/// Generate `steps` log-spaced points between `min` and `max` (inclusive).
pub fn log_space(min: f64, max: f64, steps: usize) -> EstimationResultOf<Vec<f64>> {
    if !(min.is_finite() && max.is_finite() && min > 0.0 && max > 0.0 && max > min) {
        return Err(EstimationError::invalid(format!(
            "invalid log range: min={min}, max={max} (must be finite, >0, and max>min)"
        )));
    }
    if steps < 2 {
        return Err(EstimationError::invalid("log grid steps must be >= 2"));
    }

    let ln_min = min.ln();
    let ln_max = max.ln();
    let step = (ln_max - ln_min) / (steps as f64 - 1.0);

    let mut out = Vec::with_capacity(steps);
    for i in 0..steps {
        out.push((ln_min + step * i as f64).exp());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lin_space_includes_endpoints() {
        let v = lin_space(60.0, 120.0, 31).unwrap();
        assert_eq!(v.len(), 31);
        assert_eq!(v[0], 60.0);
        assert_eq!(v[30], 120.0);
        assert!((v[14] - 88.0).abs() < 1e-9);
    }

    #[test]
    fn lin_space_single_step_is_lower_bound() {
        assert_eq!(lin_space(5.0, 9.0, 1).unwrap(), vec![5.0]);
        assert!(lin_space(5.0, 9.0, 0).is_err());
        assert!(lin_space(9.0, 5.0, 3).is_err());
    }

    #[test]
    fn log_space_includes_endpoints() {
        let v = log_space(0.1, 10.0, 5).unwrap();
        assert!((v[0] - 0.1).abs() < 1e-12);
        assert!((v[v.len() - 1] - 10.0).abs() < 1e-12);
        assert!((v[2] - 1.0).abs() < 1e-12);
    }
}
