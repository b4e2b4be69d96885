//! Shared domain types.
//!
//! These types are kept small, immutable and serializable so they can be:
//!
//! - passed by value between the estimators without any shared workspace
//! - exported to JSON/CSV
//! - reloaded later for plotting or comparisons

use serde::{Deserialize, Serialize};

use crate::error::{EstimationError, EstimationResultOf};

/// Offset (seconds) added to every ingested time stamp.
///
/// The Taylor solution is singular at `t = 0`, so the release instant is moved
/// one second before the first observation.
pub const TIME_OFFSET_SECONDS: f64 = 1.0;

/// An ordered `(time, value)` series.
///
/// Times are seconds since release, finite and strictly increasing. Values are
/// concentration (mg/L) or specific conductance (µS/cm) depending on context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    time: Vec<f64>,
    value: Vec<f64>,
}

impl TimeSeries {
    pub fn new(time: Vec<f64>, value: Vec<f64>) -> EstimationResultOf<Self> {
        if time.len() != value.len() {
            return Err(EstimationError::invalid(format!(
                "time and value lengths differ ({} vs {})",
                time.len(),
                value.len()
            )));
        }
        if time.is_empty() {
            return Err(EstimationError::invalid("time series is empty"));
        }
        if let Some(i) = time.iter().position(|t| !t.is_finite()) {
            return Err(EstimationError::invalid(format!("non-finite time at index {i}")));
        }
        if let Some(i) = value.iter().position(|v| !v.is_finite()) {
            return Err(EstimationError::invalid(format!("non-finite value at index {i}")));
        }
        if let Some(i) = time.windows(2).position(|w| w[1] <= w[0]) {
            return Err(EstimationError::invalid(format!(
                "time must be strictly increasing (index {} -> {})",
                i,
                i + 1
            )));
        }
        Ok(Self { time, value })
    }

    pub fn time(&self) -> &[f64] {
        &self.time
    }

    pub fn value(&self) -> &[f64] {
        &self.value
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Same time axis, new values.
    pub fn with_values(&self, value: Vec<f64>) -> EstimationResultOf<Self> {
        Self::new(self.time.clone(), value)
    }

    /// Mean sampling interval (seconds). `None` for single-sample series.
    pub fn mean_interval(&self) -> Option<f64> {
        if self.time.len() < 2 {
            return None;
        }
        let span = self.time[self.time.len() - 1] - self.time[0];
        Some(span / (self.time.len() - 1) as f64)
    }
}

/// The four transport parameters of the Taylor solution.
///
/// Each estimation mode fixes two of them and estimates the other two.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransportParameters {
    /// Released mass (g when concentrations are mg/L and lengths are m).
    pub mass: f64,
    /// Mean stream velocity U (m/s).
    pub velocity: f64,
    /// Longitudinal dispersion coefficient K (m²/s).
    pub dispersion: f64,
    /// Distance from source to monitoring point x (m).
    pub distance: f64,
}

/// Known inputs for Mode A (distance and mass are free).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KnownFlow {
    pub dispersion: f64,
    pub velocity: f64,
    pub area: f64,
}

impl KnownFlow {
    pub fn with_source(self, distance: f64, mass: f64) -> TransportParameters {
        TransportParameters {
            mass,
            velocity: self.velocity,
            dispersion: self.dispersion,
            distance,
        }
    }
}

/// Known inputs for Mode B (dispersion and velocity are free).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KnownRelease {
    pub mass: f64,
    pub distance: f64,
    pub area: f64,
}

impl KnownRelease {
    pub fn with_flow(self, dispersion: f64, velocity: f64) -> TransportParameters {
        TransportParameters {
            mass: self.mass,
            velocity,
            dispersion,
            distance: self.distance,
        }
    }
}

/// Lower/upper peak fractions that delimit the rising front.
///
/// `0.5 / 0.999` spans nearly the whole front while staying off the exact peak,
/// where the curve flattens and the regression becomes unstable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrontBounds {
    pub lower: f64,
    pub upper: f64,
}

impl Default for FrontBounds {
    fn default() -> Self {
        Self {
            lower: 0.5,
            upper: 0.999,
        }
    }
}

impl FrontBounds {
    pub fn validate(&self) -> EstimationResultOf<()> {
        let ok = self.lower.is_finite()
            && self.upper.is_finite()
            && self.lower > 0.0
            && self.upper > self.lower
            && self.upper < 1.0;
        if ok {
            Ok(())
        } else {
            Err(EstimationError::invalid(format!(
                "front bounds must satisfy 0 < lower < upper < 1 (got {} / {})",
                self.lower, self.upper
            )))
        }
    }
}

/// Peak and rising-front description of one breakthrough curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrontCharacterization {
    pub peak: f64,
    pub peak_time: f64,
    /// First time above 1% of the peak (plot bounds only).
    pub front_start: f64,
    pub lower_index: usize,
    pub upper_index: usize,
    pub lower_time: f64,
    pub upper_time: f64,
    /// OLS slope of concentration over the rising front (units/s).
    pub slope: f64,
}

/// Which inverse problem was solved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimationMode {
    /// Unknown distance and mass (slope matching).
    DistanceMass,
    /// Unknown dispersion and velocity (nonlinear fit).
    DispersionVelocity,
}

impl EstimationMode {
    pub fn display_name(self) -> &'static str {
        match self {
            EstimationMode::DistanceMass => "slope matching (distance, mass)",
            EstimationMode::DispersionVelocity => "nonlinear fit (K, U)",
        }
    }
}

/// Output of a single estimator call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EstimationResult {
    pub mode: EstimationMode,
    /// Full parameter set: the known inputs plus the estimated pair.
    pub params: TransportParameters,
    /// Mode A: `|synthetic slope - observed slope|`. Mode B: sum of squared residuals.
    pub residual: f64,
    /// Optimizer iterations (Mode B) or grid points evaluated (Mode A).
    pub evaluations: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_series_rejects_non_increasing_time() {
        let err = TimeSeries::new(vec![1.0, 2.0, 2.0], vec![0.0, 1.0, 2.0]).unwrap_err();
        assert!(matches!(err, EstimationError::InvalidParameter(_)));
    }

    #[test]
    fn time_series_rejects_length_mismatch() {
        assert!(TimeSeries::new(vec![1.0, 2.0], vec![0.0]).is_err());
    }

    #[test]
    fn mean_interval_of_uniform_series() {
        let ts = TimeSeries::new(vec![1.0, 3.0, 5.0, 7.0], vec![0.0; 4]).unwrap();
        assert!((ts.mean_interval().unwrap() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn front_bounds_validation() {
        assert!(FrontBounds::default().validate().is_ok());
        assert!(FrontBounds { lower: 0.9, upper: 0.5 }.validate().is_err());
        assert!(FrontBounds { lower: 0.0, upper: 0.5 }.validate().is_err());
        assert!(FrontBounds { lower: 0.5, upper: 1.2 }.validate().is_err());
        // No sample can exceed the full peak, so an upper fraction of 1 never matches.
        assert!(FrontBounds { lower: 0.5, upper: 1.0 }.validate().is_err());
    }
}
