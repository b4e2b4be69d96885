//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - series and parameter value types (`TimeSeries`, `TransportParameters`)
//! - estimator inputs/outputs (`FrontBounds`, `FrontCharacterization`, `EstimationResult`)
//! - channel geometry and site configuration (`StreamGeometry`, `SiteConfig`)
//! - unit conversion (`Units`)

pub mod geometry;
pub mod types;
pub mod units;

pub use geometry::*;
pub use types::*;
pub use units::*;
