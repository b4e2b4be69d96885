//! Breakthrough-curve characterization.
//!
//! Given any concentration series (observed or synthetic) we extract the peak,
//! the rising-front window between two peak fractions, and the OLS slope of the
//! curve over that window. The slope is the only quantity the slope-matching
//! estimator compares.
//!
//! Threshold crossings are found with a linear scan that stops at the first
//! sample strictly above `fraction × peak`. A front that plateaus exactly at the
//! threshold therefore resolves to the first sample past the plateau, and
//! repeated runs on the same data always select the same window.

use crate::domain::{FrontBounds, FrontCharacterization, TimeSeries};
use crate::error::{EstimationError, EstimationResultOf};
use crate::math::linear_fit;

/// Fraction of the peak that marks curve onset (plot bounds only).
pub const ONSET_FRACTION: f64 = 0.01;

/// Characterize a series with the given front bounds.
pub fn characterize(t: &[f64], c: &[f64], bounds: FrontBounds) -> EstimationResultOf<FrontCharacterization> {
    bounds.validate()?;
    if t.len() != c.len() {
        return Err(EstimationError::invalid(format!(
            "time and concentration lengths differ ({} vs {})",
            t.len(),
            c.len()
        )));
    }
    if t.is_empty() {
        return Err(EstimationError::InsufficientData("empty series".to_string()));
    }

    let (peak_index, peak) = first_argmax(c);
    let peak_time = t[peak_index];

    // A non-positive peak cannot be exceeded by any fraction of itself.
    let front_start = t[first_above(c, ONSET_FRACTION, peak)?];
    let lower_index = first_above(c, bounds.lower, peak)?;
    let upper_index = first_above(c, bounds.upper, peak)?;

    let (lo, hi) = (lower_index.min(upper_index), lower_index.max(upper_index));
    if hi - lo + 1 < 2 {
        return Err(EstimationError::InsufficientData(format!(
            "rising front between {} and {} x peak holds a single sample (index {lo})",
            bounds.lower, bounds.upper
        )));
    }

    let fit = linear_fit(&t[lo..=hi], &c[lo..=hi]).ok_or_else(|| {
        EstimationError::InsufficientData(format!(
            "regression over the rising front (indices {lo}..={hi}) is undefined"
        ))
    })?;

    Ok(FrontCharacterization {
        peak,
        peak_time,
        front_start,
        lower_index,
        upper_index,
        lower_time: t[lower_index],
        upper_time: t[upper_index],
        slope: fit.slope,
    })
}

/// [`characterize`] on a [`TimeSeries`].
pub fn characterize_series(series: &TimeSeries, bounds: FrontBounds) -> EstimationResultOf<FrontCharacterization> {
    characterize(series.time(), series.value(), bounds)
}

/// Index and value of the maximum; ties resolve to the first occurrence.
fn first_argmax(c: &[f64]) -> (usize, f64) {
    let mut best = (0, c[0]);
    for (i, &v) in c.iter().enumerate().skip(1) {
        if v > best.1 {
            best = (i, v);
        }
    }
    best
}

fn first_above(c: &[f64], fraction: f64, peak: f64) -> EstimationResultOf<usize> {
    let threshold = fraction * peak;
    if peak.is_finite() && peak > 0.0 {
        if let Some(i) = c.iter().position(|&v| v > threshold) {
            return Ok(i);
        }
    }
    Err(EstimationError::BoundNotFound { fraction, peak })
}
