//! Channel geometry for a uniform, well-mixed reach.
//!
//! Raw inputs (area, width, slope, flow) come from a site file; everything
//! else is derived once, assuming a wide rectangular section.

use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::units::Units;
use crate::error::{AppError, EstimationError, EstimationResultOf};

/// Standard gravity (m/s²).
pub const GRAVITY: f64 = 9.80665;

/// Site file contents, in the units given by `units`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(default)]
    pub units: Units,
    /// Cross-sectional area.
    pub area: f64,
    /// Top width.
    pub width: f64,
    /// Channel (energy) slope, dimensionless.
    pub slope: f64,
    /// Volumetric flow rate.
    pub flow: f64,
}

impl SiteConfig {
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let file = File::open(path)
            .map_err(|e| AppError::new(2, format!("Failed to open site file '{}': {e}", path.display())))?;
        serde_json::from_reader(file)
            .map_err(|e| AppError::new(2, format!("Invalid site file '{}': {e}", path.display())))
    }

    pub fn geometry(&self) -> EstimationResultOf<StreamGeometry> {
        StreamGeometry::new(
            self.units.area_to_si(self.area),
            self.units.length_to_si(self.width),
            self.slope,
            self.units.flow_to_si(self.flow),
        )
    }
}

/// Immutable SI geometry plus derived hydraulic quantities.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StreamGeometry {
    area: f64,
    width: f64,
    slope: f64,
    flow: f64,
    depth: f64,
    wetted_perimeter: f64,
    hydraulic_radius: f64,
    shear_velocity: f64,
}

impl StreamGeometry {
    pub fn new(area: f64, width: f64, slope: f64, flow: f64) -> EstimationResultOf<Self> {
        for (name, v) in [("area", area), ("width", width), ("slope", slope), ("flow", flow)] {
            if !(v.is_finite() && v > 0.0) {
                return Err(EstimationError::invalid(format!("{name} must be finite and > 0 (got {v})")));
            }
        }

        let depth = area / width;
        let wetted_perimeter = width + 2.0 * depth;
        let hydraulic_radius = area / wetted_perimeter;
        let shear_velocity = (GRAVITY * hydraulic_radius * slope).sqrt();

        Ok(Self {
            area,
            width,
            slope,
            flow,
            depth,
            wetted_perimeter,
            hydraulic_radius,
            shear_velocity,
        })
    }

    pub fn area(&self) -> f64 {
        self.area
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn slope(&self) -> f64 {
        self.slope
    }

    pub fn flow(&self) -> f64 {
        self.flow
    }

    /// Mean depth `A / W`.
    pub fn depth(&self) -> f64 {
        self.depth
    }

    pub fn wetted_perimeter(&self) -> f64 {
        self.wetted_perimeter
    }

    pub fn hydraulic_radius(&self) -> f64 {
        self.hydraulic_radius
    }

    /// `u* = sqrt(g R S)`.
    pub fn shear_velocity(&self) -> f64 {
        self.shear_velocity
    }

    /// Mean velocity `Q / A`.
    pub fn mean_velocity(&self) -> f64 {
        self.flow / self.area
    }
}
