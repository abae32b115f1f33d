//! Error types.
//!
//! - `EstimatorError`: failures of the numeric core (extrapolation, stopping).
//! - `AppError`: the binary-facing error carrying a process exit code.
//!
//! Exit codes: `2` bad input/config/IO, `3` insufficient data, `4` runtime.

use std::fmt;

/// Errors produced by the estimator library.
#[derive(Debug, Clone, PartialEq)]
pub enum EstimatorError {
    /// The decay constant is too close to zero (or not finite) to extrapolate.
    DegenerateFit { tau: f64, epsilon: f64 },
    /// The extrapolated change or asymptote is not a finite number.
    NonFiniteExtrapolation { v_diff: f64 },
    /// A required pace is missing from a trace.
    PaceOutOfRange { pace: i64 },
    /// Malformed input series (empty, mismatched lengths, ...).
    InvalidInput(String),
    /// Inconsistent estimator configuration.
    InvalidConfig(String),
}

impl fmt::Display for EstimatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DegenerateFit { tau, epsilon } => {
                write!(f, "degenerate exponential fit: |tau|={} <= epsilon={epsilon}", tau.abs())
            }
            Self::NonFiniteExtrapolation { v_diff } => {
                write!(f, "extrapolation produced a non-finite change (V_diff={v_diff})")
            }
            Self::PaceOutOfRange { pace } => write!(f, "pace {pace} is outside the trace"),
            Self::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            Self::InvalidConfig(msg) => write!(f, "invalid configuration: {msg}"),
        }
    }
}

impl std::error::Error for EstimatorError {}

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

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Debug for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

impl From<EstimatorError> for AppError {
    fn from(err: EstimatorError) -> Self {
        let code = match err {
            EstimatorError::InvalidConfig(_) => 2,
            _ => 3,
        };
        AppError::new(code, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimator_errors_map_to_exit_codes() {
        let cfg: AppError = EstimatorError::InvalidConfig("window".into()).into();
        assert_eq!(cfg.exit_code(), 2);

        let fit: AppError = EstimatorError::DegenerateFit { tau: 0.0, epsilon: 1e-9 }.into();
        assert_eq!(fit.exit_code(), 3);
        assert!(fit.to_string().contains("degenerate"));
    }
}
