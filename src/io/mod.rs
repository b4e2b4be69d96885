//! Input/output helpers.
//!
//! - CSV ingest + validation (`ingest`)
//! - series exports (CSV) (`export`)
//! - result JSON read/write (`curve`)

pub mod curve;
pub mod export;
pub mod ingest;

pub use curve::*;
pub use export::*;
pub use ingest::*;
