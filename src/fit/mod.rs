//! Inverse estimation.
//!
//! Responsibilities:
//!
//! - characterize the rising front of a breakthrough curve (`front`)
//! - Mode A: distance and mass by slope matching over a parallel grid (`slope_match`)
//! - Mode B: dispersion and velocity by Levenberg–Marquardt (`nonlinear`)

pub mod front;
pub mod nonlinear;
pub mod slope_match;

pub use front::*;
pub use nonlinear::*;
pub use slope_match::*;
