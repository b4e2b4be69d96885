//! Empirical predictors of the longitudinal dispersion coefficient.
//!
//! When no tracer experiment is available for a reach, K comes from one of
//! these closed-form relations of channel geometry and hydraulics. All
//! results are in m²/s for SI geometry.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::domain::StreamGeometry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Predictor {
    /// Elder (1959): `5.93 H u*`.
    Elder,
    /// Fischer (1975): `0.011 U² W² / (H u*)`.
    Fischer,
    /// Seo & Cheong (1998): `5.915 (W/H)^0.620 (U/u*)^1.428 H u*`.
    SeoCheong,
    /// Kashefipour & Falconer (2002): `10.612 H U (U/u*)`.
    KashefipourFalconer,
}

impl Predictor {
    pub const ALL: [Predictor; 4] = [
        Predictor::Elder,
        Predictor::Fischer,
        Predictor::SeoCheong,
        Predictor::KashefipourFalconer,
    ];

    pub fn display_name(self) -> &'static str {
        match self {
            Predictor::Elder => "Elder (1959)",
            Predictor::Fischer => "Fischer (1975)",
            Predictor::SeoCheong => "Seo & Cheong (1998)",
            Predictor::KashefipourFalconer => "Kashefipour & Falconer (2002)",
        }
    }

    /// Predicted K for the reach, using the mean velocity `Q / A`.
    pub fn dispersion(self, geometry: &StreamGeometry) -> f64 {
        self.dispersion_with_velocity(geometry, geometry.mean_velocity())
    }

    /// Predicted K for the reach at an explicit velocity.
    pub fn dispersion_with_velocity(self, geometry: &StreamGeometry, velocity: f64) -> f64 {
        let h = geometry.depth();
        let w = geometry.width();
        let us = geometry.shear_velocity();
        let u = velocity;
        match self {
            Predictor::Elder => 5.93 * h * us,
            Predictor::Fischer => 0.011 * u * u * w * w / (h * us),
            Predictor::SeoCheong => 5.915 * (w / h).powf(0.620) * (u / us).powf(1.428) * h * us,
            Predictor::KashefipourFalconer => 10.612 * h * u * (u / us),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reach() -> StreamGeometry {
        // 4 m wide, 0.5 m deep, 1 m³/s.
        StreamGeometry::new(2.0, 4.0, 0.001, 1.0).unwrap()
    }

    #[test]
    fn elder_matches_hand_calculation() {
        let g = reach();
        let expected = 5.93 * 0.5 * g.shear_velocity();
        assert!((Predictor::Elder.dispersion(&g) - expected).abs() < 1e-12);
    }

    #[test]
    fn fischer_matches_hand_calculation() {
        let g = reach();
        let expected = 0.011 * 0.25 * 16.0 / (0.5 * g.shear_velocity());
        assert!((Predictor::Fischer.dispersion(&g) - expected).abs() < 1e-12);
    }

    #[test]
    fn all_predictors_are_positive_and_finite() {
        let g = reach();
        for p in Predictor::ALL {
            let k = p.dispersion(&g);
            assert!(k.is_finite() && k > 0.0, "{}: {k}", p.display_name());
        }
    }
}
