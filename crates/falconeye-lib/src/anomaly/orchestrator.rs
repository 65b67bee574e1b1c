//! Detection orchestration
//!
//! A run is a self-contained batch: validate the configuration against the
//! table, run the statistical detector, optionally run the multivariate
//! detector, then merge. Nothing survives between runs.
//!
//! Merge policy: a sample is anomalous if ANY enabled detector flags it
//! (`statistical_flag || ml_flag`). A multivariate failure caused by the data
//! (too few samples, unfittable features) degrades the run to
//! statistical-only and is reported in [`MlStatus::Unavailable`].
//! Configuration errors abort the run before any detector executes.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::multivariate::{MultivariateDetector, MultivariateOutcome};
use super::statistical::{StatisticalBaseline, StatisticalDetector, MIN_SAMPLES_FOR_STATISTICS};
use crate::error::{DetectionError, ErrorKind, Result};
use crate::models::{AnomalyVerdict, DetectionConfig, TelemetryTable};

/// Anomaly fraction at or above which the run is reported as `Warning`
pub const WARNING_ANOMALY_RATIO: f64 = 0.1;

/// Stages of a single run, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RunStage {
    Validating,
    Statistical,
    Multivariate,
    Skipped,
    Merging,
    Done,
}

impl std::fmt::Display for RunStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RunStage::Validating => "validating",
            RunStage::Statistical => "statistical",
            RunStage::Multivariate => "multivariate",
            RunStage::Skipped => "skipped",
            RunStage::Merging => "merging",
            RunStage::Done => "done",
        };
        f.write_str(name)
    }
}

/// What happened to the multivariate detector in a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MlStatus {
    /// `enable_ml` was false
    Disabled,
    Ran { threshold: f64, flagged: usize },
    /// The detector failed and the run fell back to statistical-only
    Unavailable { reason: ErrorKind, message: String },
}

/// Overall system health implied by a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SystemStatus {
    Stable,
    Warning,
}

impl std::fmt::Display for SystemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SystemStatus::Stable => write!(f, "STABLE"),
            SystemStatus::Warning => write!(f, "WARNING"),
        }
    }
}

/// Counts over a finished run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_samples: usize,
    pub total_anomalies: usize,
    pub statistical_anomalies: usize,
    pub ml_anomalies: usize,
    pub status: SystemStatus,
}

impl RunSummary {
    fn from_verdicts(verdicts: &[AnomalyVerdict]) -> Self {
        let total_samples = verdicts.len();
        let total_anomalies = verdicts.iter().filter(|v| v.combined_flag).count();
        let status = if (total_anomalies as f64) < total_samples as f64 * WARNING_ANOMALY_RATIO {
            SystemStatus::Stable
        } else {
            SystemStatus::Warning
        };

        Self {
            total_samples,
            total_anomalies,
            statistical_anomalies: verdicts.iter().filter(|v| v.statistical_flag).count(),
            ml_anomalies: verdicts.iter().filter(|v| v.ml_flag == Some(true)).count(),
            status,
        }
    }
}

/// Result of one run, verdicts aligned one-to-one with the input table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionReport {
    pub verdicts: Vec<AnomalyVerdict>,
    pub baseline: StatisticalBaseline,
    pub ml_status: MlStatus,
    pub summary: RunSummary,
}

impl DetectionReport {
    pub fn ml_unavailable(&self) -> bool {
        matches!(self.ml_status, MlStatus::Unavailable { .. })
    }

    pub fn ml_unavailable_reason(&self) -> Option<ErrorKind> {
        match &self.ml_status {
            MlStatus::Unavailable { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    /// Indices of samples with `combined_flag` set
    pub fn anomaly_indices(&self) -> Vec<usize> {
        self.verdicts
            .iter()
            .enumerate()
            .filter(|(_, v)| v.combined_flag)
            .map(|(i, _)| i)
            .collect()
    }
}

/// Logical OR across enabled detectors
pub fn combine(statistical_flag: bool, ml_flag: Option<bool>) -> bool {
    statistical_flag || ml_flag.unwrap_or(false)
}

/// Run detection with the config's seed, or entropy when unset
pub fn run(table: &TelemetryTable, config: &DetectionConfig) -> Result<DetectionReport> {
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    run_with_rng(table, config, &mut rng)
}

/// Run detection drawing multivariate model randomness from `rng`
pub fn run_with_rng<R: Rng + ?Sized>(
    table: &TelemetryTable,
    config: &DetectionConfig,
    rng: &mut R,
) -> Result<DetectionReport> {
    debug!(stage = %RunStage::Validating, samples = table.len(), "Detection run started");
    validate(table, config)?;

    debug!(stage = %RunStage::Statistical, channel = %config.score_channel);
    let statistical = StatisticalDetector::new(config.k).detect(table, &config.score_channel)?;

    let (ml_outcome, ml_status) = if config.enable_ml {
        debug!(stage = %RunStage::Multivariate, features = ?config.feature_channels);
        match MultivariateDetector::from_config(config).detect_with_rng(
            table,
            &config.feature_channels,
            rng,
        ) {
            Ok(outcome) => {
                let status = MlStatus::Ran {
                    threshold: outcome.threshold,
                    flagged: outcome.flagged(),
                };
                (Some(outcome), status)
            }
            Err(err) if err.is_degradable() => {
                warn!(
                    event = "ml_unavailable",
                    reason = %err.kind(),
                    error = %err,
                    "Multivariate detector unavailable, using statistical flags only"
                );
                let status = MlStatus::Unavailable {
                    reason: err.kind(),
                    message: err.to_string(),
                };
                (None, status)
            }
            Err(err) => return Err(err),
        }
    } else {
        debug!(stage = %RunStage::Skipped);
        (None, MlStatus::Disabled)
    };

    debug!(stage = %RunStage::Merging);
    let verdicts = merge(&statistical.scores, ml_outcome.as_ref());
    let summary = RunSummary::from_verdicts(&verdicts);

    debug!(
        stage = %RunStage::Done,
        anomalies = summary.total_anomalies,
        status = %summary.status,
        "Detection run finished"
    );

    Ok(DetectionReport {
        verdicts,
        baseline: statistical.baseline,
        ml_status,
        summary,
    })
}

fn validate(table: &TelemetryTable, config: &DetectionConfig) -> Result<()> {
    config.validate()?;

    if table.len() < MIN_SAMPLES_FOR_STATISTICS {
        return Err(DetectionError::InsufficientData {
            required: MIN_SAMPLES_FOR_STATISTICS,
            actual: table.len(),
        });
    }

    let mut required = vec![config.score_channel.as_str()];
    if config.enable_ml {
        required.extend(config.feature_channels.iter().map(String::as_str));
    }
    let missing: Vec<&str> = required
        .into_iter()
        .filter(|c| !table.has_channel(c))
        .collect();
    if !missing.is_empty() {
        return Err(DetectionError::InvalidConfig(format!(
            "channels not present in table: {}",
            missing.join(", ")
        )));
    }

    Ok(())
}

fn merge(
    statistical: &[super::DetectorScore],
    ml: Option<&MultivariateOutcome>,
) -> Vec<AnomalyVerdict> {
    statistical
        .iter()
        .enumerate()
        .map(|(idx, stat)| {
            let ml_score = ml.map(|m| m.scores[idx]);
            let ml_flag = ml_score.map(|s| s.flag);
            AnomalyVerdict {
                statistical_score: stat.score,
                statistical_flag: stat.flag,
                ml_score: ml_score.map(|s| s.score),
                ml_flag,
                combined_flag: combine(stat.flag, ml_flag),
            }
        })
        .collect()
}
