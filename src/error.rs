//! Error types.
//!
//! Two layers:
//!
//! - [`FitError`]: typed failures of the fitting core (stack validation,
//!   resolution setup, parameter bounds, numerical collapse, session misuse)
//! - [`AppError`]: what the `rose` binary prints, carrying a process exit code
//!
//! Non-fatal issues are not errors; they are collected as [`PrecisionWarning`]s
//! and travel with the fit result.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result alias for the fitting core.
pub type FitResultOf<T> = std::result::Result<T, FitError>;

/// Failures raised by the fitting core.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    /// Malformed physical model; rejected before any evaluation.
    #[error("Invalid stack: {reason}")]
    InvalidStack { reason: String },

    /// Bad convolution configuration; rejected at setup.
    #[error("Invalid resolution: {reason}")]
    InvalidResolution { reason: String },

    /// A proposed value falls outside its parameter bounds.
    #[error("Parameter '{name}' = {value} is outside [{lower}, {upper}]")]
    OutOfBounds {
        name: String,
        value: f64,
        lower: f64,
        upper: f64,
    },

    /// Non-finite cost or numerical collapse during optimization.
    #[error("Optimization failed at iteration {iteration}: {reason} (vector = {vector:?})")]
    Optimization {
        reason: String,
        iteration: usize,
        vector: Vec<f64>,
        /// Last vector whose cost was finite, for diagnosis.
        last_valid: Option<Vec<f64>>,
    },

    /// A log-space cost met a model value with no logarithm.
    #[error("Model reflectivity {value} at Q={q} is not positive; the log-space cost is undefined")]
    NonPositiveModel { q: f64, value: f64 },

    /// The measured curve violates the dataset invariants.
    #[error("Invalid dataset: {reason}")]
    InvalidDataset { reason: String },

    /// Parameter configuration problem (bounds, unknown tie source, tie cycle).
    #[error("Invalid parameter configuration: {reason}")]
    InvalidParameter { reason: String },

    /// A session operation was called in a state that does not allow it.
    #[error("Cannot {action} while the session is {from}")]
    InvalidTransition {
        from: &'static str,
        action: &'static str,
    },
}

impl FitError {
    pub fn invalid_stack(reason: impl Into<String>) -> Self {
        FitError::InvalidStack {
            reason: reason.into(),
        }
    }

    pub fn invalid_resolution(reason: impl Into<String>) -> Self {
        FitError::InvalidResolution {
            reason: reason.into(),
        }
    }

    pub fn invalid_dataset(reason: impl Into<String>) -> Self {
        FitError::InvalidDataset {
            reason: reason.into(),
        }
    }

    pub fn invalid_parameter(reason: impl Into<String>) -> Self {
        FitError::InvalidParameter {
            reason: reason.into(),
        }
    }

    /// Errors a population optimizer can absorb as a penalty cost.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            FitError::OutOfBounds { .. } | FitError::InvalidStack { .. } | FitError::NonPositiveModel { .. }
        )
    }

    /// Process exit code used by the binary for this failure class.
    pub fn exit_code(&self) -> u8 {
        match self {
            FitError::InvalidStack { .. }
            | FitError::InvalidResolution { .. }
            | FitError::InvalidParameter { .. }
            | FitError::OutOfBounds { .. } => 2,
            FitError::InvalidDataset { .. } => 3,
            FitError::Optimization { .. } | FitError::NonPositiveModel { .. } => 4,
            FitError::InvalidTransition { .. } => 5,
        }
    }
}

/// Non-fatal numerical caveat attached to a fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrecisionWarning {
    /// Experimental point index the warning refers to, if any.
    pub index: Option<usize>,
    /// Q value of that point, if any.
    pub q: Option<f64>,
    pub message: String,
}

impl PrecisionWarning {
    pub fn at(index: usize, q: f64, message: impl Into<String>) -> Self {
        Self {
            index: Some(index),
            q: Some(q),
            message: message.into(),
        }
    }

    pub fn general(message: impl Into<String>) -> Self {
        Self {
            index: None,
            q: None,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for PrecisionWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.index, self.q) {
            (Some(i), Some(q)) => write!(f, "point {i} (Q={q:.5}): {}", self.message),
            _ => write!(f, "{}", self.message),
        }
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

impl From<FitError> for AppError {
    fn from(err: FitError) -> Self {
        AppError::new(err.exit_code(), err.to_string())
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
