//! Error types.
//!
//! - `AnalysisError`: a single computation failed (formula out of range, root
//!   not bracketed, degenerate input, incompatible binning, failed fit). These
//!   are fatal to that one call only; the pipeline logs them and moves on.
//! - `AppError`: application-level failure with a process exit code
//!   (bad config, unreadable input, IO).

use thiserror::Error;

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

/// Failure of a single reduction step.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    /// Formula evaluated outside its validated range.
    #[error("vapor pressure formula is only valid between {min} K and {max} K, got T = {temperature} K")]
    Domain { temperature: f64, min: f64, max: f64 },

    /// Root finder could not bracket a solution.
    #[error("no temperature between {min} K and {max} K reproduces a vapor pressure of {pressure} torr")]
    Convergence { pressure: f64, min: f64, max: f64 },

    /// Rate requested over a total duration of zero.
    #[error("total duration is zero, rate is undefined")]
    ZeroDuration,

    #[error("{what}: length mismatch ({left} vs {right})")]
    LengthMismatch {
        what: &'static str,
        left: usize,
        right: usize,
    },

    #[error("normalization value at index {index} is zero")]
    ZeroNormalization { index: usize },

    #[error("incompatible binning: {0}")]
    Binning(String),

    #[error("fit of {model} failed: {reason}")]
    Fit { model: String, reason: String },

    #[error("{0}: no input")]
    EmptyInput(&'static str),

    #[error("period {period} is missing from the cycle data")]
    MissingPeriod { period: usize },
}

impl From<AnalysisError> for AppError {
    fn from(err: AnalysisError) -> Self {
        AppError::new(4, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analysis_error_maps_to_exit_code_4() {
        let err: AppError = AnalysisError::ZeroDuration.into();
        assert_eq!(err.exit_code(), 4);
        assert!(err.to_string().contains("duration"));
    }

    #[test]
    fn domain_error_names_the_temperature() {
        let err = AnalysisError::Domain {
            temperature: 6.0,
            min: 0.66,
            max: 5.2,
        };
        assert!(err.to_string().contains("T = 6 K"));
    }
}
