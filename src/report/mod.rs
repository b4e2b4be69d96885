//! Reporting: formatted run summaries and predictor tables.

mod format;

pub use format::*;
