//! Taylor solution of the 1-D advection-dispersion equation.
//!
//! For an instantaneous release of mass `M` at distance `x` upstream of the
//! monitoring point, in a reach with area `A`, velocity `U` and longitudinal
//! dispersion `K`:
//!
//! ```text
//! C(t) = M / (A·√(4πKt)) · exp(−(x − U·t)² / (4·K·t))
//! ```
//!
//! The solution is singular at `t = 0`; callers shift observation times by
//! [`crate::domain::TIME_OFFSET_SECONDS`] so every `t` is positive.

use std::f64::consts::PI;

use crate::domain::TransportParameters;
use crate::error::{EstimationError, EstimationResultOf};

/// Evaluate the Taylor solution on a time vector.
///
/// `dispersion`, `area` and every `t` must be strictly positive.
pub fn simulate(
    t: &[f64],
    mass: f64,
    velocity: f64,
    dispersion: f64,
    area: f64,
    distance: f64,
) -> EstimationResultOf<Vec<f64>> {
    let params = TransportParameters {
        mass,
        velocity,
        dispersion,
        distance,
    };
    simulate_params(t, &params, area)
}

/// [`simulate`] taking a bundled parameter set.
pub fn simulate_params(t: &[f64], params: &TransportParameters, area: f64) -> EstimationResultOf<Vec<f64>> {
    validate(params, area)?;
    if let Some(i) = t.iter().position(|&v| !(v.is_finite() && v > 0.0)) {
        return Err(EstimationError::invalid(format!(
            "time must be > 0 (t[{i}] = {}); the Taylor solution is singular at t = 0",
            t[i]
        )));
    }
    Ok(t.iter().map(|&ti| concentration_at(ti, params, area)).collect())
}

/// Point evaluation without validation. Inputs must already satisfy the
/// preconditions of [`simulate`].
pub fn concentration_at(t: f64, params: &TransportParameters, area: f64) -> f64 {
    let k = params.dispersion;
    let spread = 4.0 * k * t;
    let lag = params.distance - params.velocity * t;
    params.mass / (area * (PI * spread).sqrt()) * (-(lag * lag) / spread).exp()
}

/// Concentration and its derivatives with respect to `ln K` and `ln U`.
///
/// Used as the analytic Jacobian of the nonlinear fit, which works in log
/// parameters to keep K and U positive:
///
/// ```text
/// ∂C/∂lnK = C · (−1/2 + (x − Ut)² / (4Kt))
/// ∂C/∂lnU = C · U·(x − Ut) / (2K)
/// ```
pub fn log_flow_sensitivities(t: f64, params: &TransportParameters, area: f64) -> (f64, f64, f64) {
    let c = concentration_at(t, params, area);
    let k = params.dispersion;
    let u = params.velocity;
    let lag = params.distance - u * t;

    let dln_k = -0.5 + lag * lag / (4.0 * k * t);
    let dln_u = u * lag / (2.0 * k);
    (c, c * dln_k, c * dln_u)
}

fn validate(params: &TransportParameters, area: f64) -> EstimationResultOf<()> {
    if !(params.dispersion.is_finite() && params.dispersion > 0.0) {
        return Err(EstimationError::invalid(format!(
            "dispersion coefficient must be > 0 (got {})",
            params.dispersion
        )));
    }
    if !(area.is_finite() && area > 0.0) {
        return Err(EstimationError::invalid(format!(
            "cross-sectional area must be > 0 (got {area})"
        )));
    }
    for (name, v) in [
        ("mass", params.mass),
        ("velocity", params.velocity),
        ("distance", params.distance),
    ] {
        if !v.is_finite() {
            return Err(EstimationError::invalid(format!("{name} must be finite (got {v})")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const M: f64 = 1_000_000.0;
    const U: f64 = 0.157;
    const K: f64 = 0.367;
    const A: f64 = 0.113;
    const X: f64 = 88.09;

    fn dense_time(n: usize) -> Vec<f64> {
        (1..=n).map(|i| i as f64).collect()
    }

    #[test]
    fn output_matches_input_length_and_is_non_negative() {
        let t = dense_time(2000);
        let c = simulate(&t, M, U, K, A, X).unwrap();
        assert_eq!(c.len(), t.len());
        assert!(c.iter().all(|v| v.is_finite() && *v >= 0.0));
    }

    #[test]
    fn rejects_non_positive_dispersion_area_and_time() {
        let t = dense_time(10);
        assert!(matches!(
            simulate(&t, M, U, 0.0, A, X),
            Err(EstimationError::InvalidParameter(_))
        ));
        assert!(matches!(
            simulate(&t, M, U, K, -1.0, X),
            Err(EstimationError::InvalidParameter(_))
        ));
        assert!(matches!(
            simulate(&[0.0, 1.0], M, U, K, A, X),
            Err(EstimationError::InvalidParameter(_))
        ));
    }

    #[test]
    fn exponent_depends_only_on_advective_offset() {
        // Shifting time by `tau` and distance by `U * tau` keeps `x - U t` fixed,
        // so the squared lag recovered from the exponent is unchanged.
        let tau = 250.0;
        let t: Vec<f64> = (0..200).map(|i| 300.0 + i as f64 * 2.0).collect();
        let shifted: Vec<f64> = t.iter().map(|v| v + tau).collect();

        let c1 = simulate(&t, M, U, K, A, X).unwrap();
        let c2 = simulate(&shifted, M, U, K, A, X + U * tau).unwrap();

        let squared_lag = |c: f64, ti: f64| -> f64 {
            let prefactor = M / (A * (4.0 * PI * K * ti).sqrt());
            -(c / prefactor).ln() * 4.0 * K * ti
        };

        for i in 0..t.len() {
            let g1 = squared_lag(c1[i], t[i]);
            let g2 = squared_lag(c2[i], shifted[i]);
            let expected = (X - U * t[i]).powi(2);
            assert!((g1 - expected).abs() < 1e-6 * expected.max(1.0));
            assert!((g1 - g2).abs() < 1e-6 * expected.max(1.0), "i={i}: {g1} vs {g2}");
        }
    }

    #[test]
    fn peak_decreases_with_distance() {
        let t = dense_time(20_000);
        let mut prev = f64::INFINITY;
        for step in 1..=10 {
            let x = 20.0 * step as f64;
            let c = simulate(&t, M, U, K, A, x).unwrap();
            let peak = c.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            assert!(peak < prev, "peak at x={x} ({peak}) should be below {prev}");
            prev = peak;
        }
    }

    #[test]
    fn sensitivities_match_finite_differences() {
        let p = TransportParameters {
            mass: M,
            velocity: U,
            dispersion: K,
            distance: X,
        };
        let h: f64 = 1e-6;
        for &t in &[400.0, 561.0, 700.0] {
            let (c, dk, du) = log_flow_sensitivities(t, &p, A);
            assert!((c - concentration_at(t, &p, A)).abs() < 1e-12 * c.max(1.0));

            // Central differences in log space.
            let at_k = |scale: f64| {
                let q = TransportParameters {
                    dispersion: K * scale,
                    ..p
                };
                concentration_at(t, &q, A)
            };
            let fd_k = (at_k(h.exp()) - at_k((-h).exp())) / (2.0 * h);
            assert!((fd_k - dk).abs() < 1e-3 * dk.abs().max(1.0), "t={t}: {fd_k} vs {dk}");

            let at_u = |scale: f64| {
                let q = TransportParameters {
                    velocity: U * scale,
                    ..p
                };
                concentration_at(t, &q, A)
            };
            let fd_u = (at_u(h.exp()) - at_u((-h).exp())) / (2.0 * h);
            assert!((fd_u - du).abs() < 1e-3 * du.abs().max(1.0), "t={t}: {fd_u} vs {du}");
        }
    }
}
