//! `tracer-inverse` library crate.
//!
//! The binary (`tracer`) is a thin wrapper around this library so that:
//!
//! - the estimators are testable without spawning processes
//! - the forward model and estimators are reusable outside the CLI
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod convert;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod plot;
pub mod predictors;
pub mod report;
