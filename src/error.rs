//! Error types.
//!
//! Two layers:
//!
//! - [`EstimationError`]: typed failures raised by the numerical core (forward
//!   model, characterizer, estimators, converter). Every variant is terminal for
//!   the call that raised it; nothing is retried internally.
//! - [`AppError`]: what the binary reports, carrying a process exit code.

use thiserror::Error;

/// Result alias for the numerical core.
pub type EstimationResultOf<T> = Result<T, EstimationError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EstimationError {
    /// Non-positive dispersion, area, time, or otherwise unusable input.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// No sample exceeds the requested fraction of the peak.
    #[error("no sample exceeds {fraction} x peak ({peak}); curve is flat or degenerate")]
    BoundNotFound { fraction: f64, peak: f64 },

    /// The rising front holds too few points for a regression.
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// The slope-matching grid produced no usable candidate.
    #[error("no convergence: {0}")]
    NoConvergence(String),

    /// The nonlinear fit failed or returned a non-physical result.
    #[error("optimization diverged: {0}")]
    OptimizationDiverged(String),

    /// The grid search exceeded its time budget.
    #[error("grid search exceeded its time budget of {seconds:.1}s")]
    TimedOut { seconds: f64 },
}

impl EstimationError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidParameter(message.into())
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

impl From<EstimationError> for AppError {
    fn from(err: EstimationError) -> Self {
        // Exit codes: 2 = bad input/config, 3 = unusable data, 4 = estimation failed.
        let code = match &err {
            EstimationError::InvalidParameter(_) => 2,
            EstimationError::BoundNotFound { .. } | EstimationError::InsufficientData(_) => 3,
            EstimationError::NoConvergence(_)
            | EstimationError::OptimizationDiverged(_)
            | EstimationError::TimedOut { .. } => 4,
        };
        AppError::new(code, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimation_errors_map_to_exit_codes() {
        let invalid: AppError = EstimationError::invalid("K must be > 0").into();
        assert_eq!(invalid.exit_code(), 2);

        let flat: AppError = EstimationError::BoundNotFound { fraction: 0.5, peak: 0.0 }.into();
        assert_eq!(flat.exit_code(), 3);

        let diverged: AppError = EstimationError::OptimizationDiverged("budget".into()).into();
        assert_eq!(diverged.exit_code(), 4);
        assert!(diverged.to_string().contains("budget"));
    }
}
