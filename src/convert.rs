//! Specific conductance to tracer concentration, and mass discharge.
//!
//! Salt tracer releases are usually logged as specific conductance (µS/cm).
//! A fixed power-law regression maps conductance to mass percent:
//!
//! ```text
//! mass% = 0.000013 · SC^1.161074
//! mg/L  = mass% · 10_000
//! ```
//!
//! The pre-event baseline is subtracted and anything below it is clamped to
//! zero, so conductivity noise under the baseline never registers as mass.

use serde::{Deserialize, Serialize};

use crate::domain::TimeSeries;
use crate::error::{EstimationError, EstimationResultOf};

/// Power-law regression coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConductanceRegression {
    pub coefficient: f64,
    pub exponent: f64,
    /// Mass percent to mg/L.
    pub percent_to_mg_per_l: f64,
}

impl Default for ConductanceRegression {
    fn default() -> Self {
        Self {
            coefficient: 0.000013,
            exponent: 1.161074,
            percent_to_mg_per_l: 10_000.0,
        }
    }
}

impl ConductanceRegression {
    /// Unclamped concentration (mg/L) for one conductance sample.
    pub fn concentration(&self, conductance: f64) -> f64 {
        self.coefficient * conductance.powf(self.exponent) * self.percent_to_mg_per_l
    }
}

/// Result of integrating a concentration series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MassDischarge {
    /// Area under the concentration curve (mg·s/L).
    pub area: f64,
    /// Total mass passing the monitoring point (g), `area × Q` with Q in m³/s.
    pub mass_grams: f64,
}

/// Convert conductance to baseline-corrected, clamped concentration (mg/L).
pub fn to_concentration(
    conductance: &[f64],
    baseline_index: usize,
    regression: &ConductanceRegression,
) -> EstimationResultOf<Vec<f64>> {
    if let Some(i) = conductance.iter().position(|v| !(v.is_finite() && *v >= 0.0)) {
        return Err(EstimationError::invalid(format!(
            "conductance must be finite and >= 0 (index {i}: {})",
            conductance[i]
        )));
    }
    let Some(&baseline_sc) = conductance.get(baseline_index) else {
        return Err(EstimationError::invalid(format!(
            "baseline index {baseline_index} is outside the series (len {})",
            conductance.len()
        )));
    };

    let baseline = regression.concentration(baseline_sc);
    Ok(conductance
        .iter()
        .map(|&sc| (regression.concentration(sc) - baseline).max(0.0))
        .collect())
}

/// [`to_concentration`] on a [`TimeSeries`], keeping its time axis.
pub fn series_to_concentration(
    conductance: &TimeSeries,
    baseline_index: usize,
    regression: &ConductanceRegression,
) -> EstimationResultOf<TimeSeries> {
    let values = to_concentration(conductance.value(), baseline_index, regression)?;
    conductance.with_values(values)
}

/// Integrate concentration with the midpoint (trapezoid) rule and scale by flow.
///
/// `flow` is the volumetric flow rate in m³/s; mg/L × m³/s × s is grams.
pub fn mass_discharge(series: &TimeSeries, flow: f64) -> EstimationResultOf<MassDischarge> {
    if !(flow.is_finite() && flow > 0.0) {
        return Err(EstimationError::invalid(format!("flow must be > 0 (got {flow})")));
    }
    if series.len() < 2 {
        return Err(EstimationError::InsufficientData(
            "mass integration needs at least two samples".to_string(),
        ));
    }

    let t = series.time();
    let c = series.value();
    let area: f64 = (1..t.len())
        .map(|i| 0.5 * (c[i - 1] + c[i]) * (t[i] - t[i - 1]))
        .sum();

    Ok(MassDischarge {
        area,
        mass_grams: area * flow,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FrontBounds;
    use crate::fit::front::characterize_series;

    #[test]
    fn applies_power_law() {
        let reg = ConductanceRegression::default();
        let expected = 0.000013 * 500.0_f64.powf(1.161074) * 10_000.0;
        assert!((reg.concentration(500.0) - expected).abs() < 1e-9);
    }

    #[test]
    fn values_below_baseline_clamp_to_exactly_zero() {
        let sc = [300.0, 280.0, 150.0, 0.0, 310.0, 450.0, 299.9];
        let c = to_concentration(&sc, 0, &ConductanceRegression::default()).unwrap();
        assert_eq!(c[0], 0.0);
        for (i, &v) in c.iter().enumerate() {
            assert!(v >= 0.0);
            if sc[i] <= sc[0] {
                assert_eq!(v, 0.0, "index {i}");
            }
        }
        assert!(c[4] > 0.0 && c[5] > c[4]);
    }

    #[test]
    fn baseline_index_out_of_range_is_rejected() {
        assert!(matches!(
            to_concentration(&[1.0, 2.0], 5, &ConductanceRegression::default()),
            Err(EstimationError::InvalidParameter(_))
        ));
    }

    #[test]
    fn flat_conductance_has_no_front() {
        let t: Vec<f64> = (1..=100).map(|i| i as f64).collect();
        let sc = TimeSeries::new(t, vec![245.0; 100]).unwrap();
        let c = series_to_concentration(&sc, 0, &ConductanceRegression::default()).unwrap();
        assert!(c.value().iter().all(|&v| v == 0.0));
        assert!(matches!(
            characterize_series(&c, FrontBounds::default()),
            Err(EstimationError::BoundNotFound { .. })
        ));
    }

    #[test]
    fn trapezoid_mass_of_triangle_pulse() {
        // Triangle 0 -> 10 -> 0 mg/L over 20 s: area = 100 mg·s/L.
        let t: Vec<f64> = (0..=20).map(|i| 1.0 + i as f64).collect();
        let c: Vec<f64> = (0..=20).map(|i| 10.0 - (i as f64 - 10.0).abs()).collect();
        let series = TimeSeries::new(t, c).unwrap();
        let m = mass_discharge(&series, 0.5).unwrap();
        assert!((m.area - 100.0).abs() < 1e-12);
        assert!((m.mass_grams - 50.0).abs() < 1e-12);
    }
}
