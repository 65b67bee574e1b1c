//! Statistical threshold detection
//!
//! Flags samples whose score channel exceeds `mean + k * std_dev`, where the
//! mean and standard deviation are computed once over the whole table. Every
//! sample, including the one being judged, belongs to the reference
//! population. This is a batch statistic, not a rolling window.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::DetectorScore;
use crate::error::{DetectionError, Result};
use crate::models::{validate_k, TelemetryTable};

/// Minimum samples for a sample standard deviation
pub const MIN_SAMPLES_FOR_STATISTICS: usize = 2;

/// Whole-table statistics for the score channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatisticalBaseline {
    pub mean: f64,
    /// Sample standard deviation (Bessel's correction)
    pub std_dev: f64,
    pub k: f64,
    /// `mean + k * std_dev`
    pub threshold: f64,
}

impl StatisticalBaseline {
    /// Compute the baseline from a full column of values
    pub fn from_values(values: &[f64], k: f64) -> Result<Self> {
        validate_k(k)?;
        if values.len() < MIN_SAMPLES_FOR_STATISTICS {
            return Err(DetectionError::InsufficientData {
                required: MIN_SAMPLES_FOR_STATISTICS,
                actual: values.len(),
            });
        }

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;

        // A constant column has exactly zero spread; rounding in the mean
        // must not leak into the threshold.
        let constant = values.iter().all(|v| *v == values[0]);
        let (mean, std_dev) = if constant {
            (values[0], 0.0)
        } else {
            // Two-pass for stability
            let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
            (mean, variance.sqrt())
        };

        Ok(Self {
            mean,
            std_dev,
            k,
            threshold: mean + k * std_dev,
        })
    }

    pub fn is_anomalous(&self, value: f64) -> bool {
        value > self.threshold
    }

    /// Number of standard deviations above the mean (0 for a constant signal)
    pub fn z_score(&self, value: f64) -> f64 {
        if self.std_dev < f64::EPSILON {
            return 0.0;
        }
        (value - self.mean) / self.std_dev
    }
}

/// Severity of a statistical flag, banded by z-score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    High,
    Critical,
}

impl Severity {
    pub fn from_z_score(z_score: f64) -> Self {
        if z_score >= 5.0 {
            Severity::Critical
        } else if z_score >= 4.0 {
            Severity::High
        } else {
            Severity::Warning
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// Output of one statistical pass
#[derive(Debug, Clone, PartialEq)]
pub struct StatisticalOutcome {
    pub baseline: StatisticalBaseline,
    pub scores: Vec<DetectorScore>,
}

impl StatisticalOutcome {
    pub fn flagged(&self) -> usize {
        self.scores.iter().filter(|s| s.flag).count()
    }
}

/// Detects values exceeding a standard deviation threshold
#[derive(Debug, Clone)]
pub struct StatisticalDetector {
    /// Number of standard deviations above the mean to flag
    pub k: f64,
}

impl StatisticalDetector {
    pub fn new(k: f64) -> Self {
        Self { k }
    }

    /// Score every sample of `score_channel`
    ///
    /// The score of a sample is its raw reading.
    pub fn detect(&self, table: &TelemetryTable, score_channel: &str) -> Result<StatisticalOutcome> {
        validate_k(self.k)?;
        if table.len() < MIN_SAMPLES_FOR_STATISTICS {
            return Err(DetectionError::InsufficientData {
                required: MIN_SAMPLES_FOR_STATISTICS,
                actual: table.len(),
            });
        }

        let values = table.channel_values(score_channel)?;
        let baseline = StatisticalBaseline::from_values(&values, self.k)?;

        let scores: Vec<DetectorScore> = values
            .iter()
            .map(|&value| DetectorScore {
                score: value,
                flag: baseline.is_anomalous(value),
            })
            .collect();

        debug!(
            channel = %score_channel,
            mean = baseline.mean,
            std_dev = baseline.std_dev,
            threshold = baseline.threshold,
            flagged = scores.iter().filter(|s| s.flag).count(),
            "Statistical pass complete"
        );

        Ok(StatisticalOutcome { baseline, scores })
    }
}

/// Run the statistical detector over `score_channel` with sensitivity `k`
pub fn detect_statistical(
    table: &TelemetryTable,
    score_channel: &str,
    k: f64,
) -> Result<StatisticalOutcome> {
    StatisticalDetector::new(k).detect(table, score_channel)
}
