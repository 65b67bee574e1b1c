//! Anomaly detection over telemetry tables
//!
//! This module provides:
//! - Statistical threshold detection (`mean + k * std_dev` over the whole table)
//! - Multivariate isolation-forest detection
//! - Orchestration that merges both into per-sample verdicts

mod isolation_forest;
mod multivariate;
mod orchestrator;
mod statistical;

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};

pub use isolation_forest::{average_path_length, IsolationForest};
pub use multivariate::{
    detect_multivariate, MultivariateDetector, MultivariateOutcome, MIN_SAMPLES_FOR_MODEL,
};
pub use orchestrator::{
    combine, run, run_with_rng, DetectionReport, MlStatus, RunSummary, SystemStatus,
    WARNING_ANOMALY_RATIO,
};
pub use statistical::{
    detect_statistical, Severity, StatisticalBaseline, StatisticalDetector, StatisticalOutcome,
    MIN_SAMPLES_FOR_STATISTICS,
};

/// Score and flag a detector assigned to one sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectorScore {
    pub score: f64,
    pub flag: bool,
}
