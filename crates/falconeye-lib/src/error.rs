//! Error taxonomy for the detection engine

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result alias used throughout the engine
pub type Result<T> = std::result::Result<T, DetectionError>;

/// Errors raised by detectors and the orchestrator
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DetectionError {
    /// Bad sensitivity, bad contamination, missing channel. Always fatal.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Too few samples for the requested statistic or model
    #[error("insufficient data: at least {required} samples required, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    /// The multivariate model could not be fit on the given features
    #[error("model fit failed: {0}")]
    ModelFit(String),

    /// The table violates a structural invariant (mismatched channels, non-finite readings)
    #[error("invalid telemetry: {0}")]
    InvalidTelemetry(String),
}

impl DetectionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DetectionError::InvalidConfig(_) => ErrorKind::InvalidConfig,
            DetectionError::InsufficientData { .. } => ErrorKind::InsufficientData,
            DetectionError::ModelFit(_) => ErrorKind::ModelFit,
            DetectionError::InvalidTelemetry(_) => ErrorKind::InvalidTelemetry,
        }
    }

    /// Whether the orchestrator may degrade to statistical-only on this error
    /// when it comes out of the multivariate detector
    pub fn is_degradable(&self) -> bool {
        matches!(
            self,
            DetectionError::ModelFit(_) | DetectionError::InsufficientData { .. }
        )
    }
}

/// Fieldless discriminant of [`DetectionError`], used in degradation notices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidConfig,
    InsufficientData,
    ModelFit,
    InvalidTelemetry,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::InvalidConfig => write!(f, "invalid_config"),
            ErrorKind::InsufficientData => write!(f, "insufficient_data"),
            ErrorKind::ModelFit => write!(f, "model_fit"),
            ErrorKind::InvalidTelemetry => write!(f, "invalid_telemetry"),
        }
    }
}
