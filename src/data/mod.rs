//! Synthetic data sources.

pub mod synthetic;

pub use synthetic::{SyntheticConfig, generate_observed, to_conductance};
