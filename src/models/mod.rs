//! Transport model implementations.
//!
//! Models are implemented as small, pure functions so that the estimators can
//! call them from parallel grid searches without shared state.

pub mod taylor;

pub use taylor::*;
