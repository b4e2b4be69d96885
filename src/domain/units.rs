//! Customary (US) to SI unit conversion.
//!
//! Everything inside the crate is SI: metres, square metres, cubic metres per
//! second. Site files may be written in customary units; they are converted
//! once on load.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

pub const FEET_TO_METRES: f64 = 0.3048;
pub const SQ_FEET_TO_SQ_METRES: f64 = FEET_TO_METRES * FEET_TO_METRES;
pub const CFS_TO_CMS: f64 = 0.028_316_846_592;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    /// m, m², m³/s, m/s, m²/s.
    #[default]
    Si,
    /// ft, ft², ft³/s, ft/s, ft²/s.
    Customary,
}

impl Units {
    pub fn length_to_si(self, v: f64) -> f64 {
        match self {
            Units::Si => v,
            Units::Customary => v * FEET_TO_METRES,
        }
    }

    pub fn area_to_si(self, v: f64) -> f64 {
        match self {
            Units::Si => v,
            Units::Customary => v * SQ_FEET_TO_SQ_METRES,
        }
    }

    pub fn flow_to_si(self, v: f64) -> f64 {
        match self {
            Units::Si => v,
            Units::Customary => v * CFS_TO_CMS,
        }
    }

    pub fn velocity_to_si(self, v: f64) -> f64 {
        self.length_to_si(v)
    }

    pub fn dispersion_to_si(self, v: f64) -> f64 {
        self.area_to_si(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn customary_conversions() {
        let u = Units::Customary;
        assert!((u.length_to_si(1.0) - 0.3048).abs() < 1e-12);
        assert!((u.area_to_si(10.0) - 0.9290304).abs() < 1e-12);
        assert!((u.flow_to_si(1.0) - 0.028316846592).abs() < 1e-15);
        assert_eq!(Units::Si.flow_to_si(3.5), 3.5);
    }
}
