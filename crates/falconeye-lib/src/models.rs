//! Core data models for the detection engine

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{DetectionError, Result};

/// Default channel scored by the statistical detector
pub const DEFAULT_SCORE_CHANNEL: &str = "anomaly_score";

/// Default sensitivity multiplier
pub const DEFAULT_K: f64 = 3.0;

/// Default expected anomaly fraction for the multivariate model
pub const DEFAULT_CONTAMINATION: f64 = 0.05;

/// Default number of trees in the isolation ensemble
pub const DEFAULT_N_TREES: usize = 100;

/// Upper bound on the isolation ensemble size accepted from callers
pub const MAX_N_TREES: usize = 10_000;

/// Default sub-sample size per isolation tree
pub const DEFAULT_MAX_SAMPLES: usize = 256;

/// One telemetry observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: f64,
    pub readings: BTreeMap<String, f64>,
}

impl Sample {
    pub fn new(timestamp: f64) -> Self {
        Self {
            timestamp,
            readings: BTreeMap::new(),
        }
    }

    /// Add a channel reading
    pub fn with_reading(mut self, channel: impl Into<String>, value: f64) -> Self {
        self.readings.insert(channel.into(), value);
        self
    }

    pub fn reading(&self, channel: &str) -> Option<f64> {
        self.readings.get(channel).copied()
    }
}

/// Ordered sequence of samples sharing one channel set
///
/// Insertion order is time order. The shared-channel invariant is checked on
/// construction, including when deserializing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Sample>", into = "Vec<Sample>")]
pub struct TelemetryTable {
    samples: Vec<Sample>,
}

impl TelemetryTable {
    pub fn new(samples: Vec<Sample>) -> Result<Self> {
        if let Some(first) = samples.first() {
            let expected: BTreeSet<&String> = first.readings.keys().collect();
            for (idx, sample) in samples.iter().enumerate().skip(1) {
                let channels: BTreeSet<&String> = sample.readings.keys().collect();
                if channels != expected {
                    return Err(DetectionError::InvalidTelemetry(format!(
                        "sample {} has channels {:?}, expected {:?}",
                        idx, channels, expected
                    )));
                }
            }
        }
        Ok(Self { samples })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Channel names shared by every sample, sorted
    pub fn channels(&self) -> Vec<&str> {
        self.samples
            .first()
            .map(|s| s.readings.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn has_channel(&self, channel: &str) -> bool {
        self.samples
            .first()
            .map(|s| s.readings.contains_key(channel))
            .unwrap_or(false)
    }

    pub fn timestamps(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.timestamp).collect()
    }

    /// All readings of one channel in table order
    pub fn channel_values(&self, channel: &str) -> Result<Vec<f64>> {
        let mut values = Vec::with_capacity(self.samples.len());
        for (idx, sample) in self.samples.iter().enumerate() {
            let value = sample.reading(channel).ok_or_else(|| {
                DetectionError::InvalidConfig(format!("channel '{}' not present in table", channel))
            })?;
            if !value.is_finite() {
                return Err(DetectionError::InvalidTelemetry(format!(
                    "non-finite reading {} for channel '{}' at sample {}",
                    value, channel, idx
                )));
            }
            values.push(value);
        }
        Ok(values)
    }

    /// Row-major matrix of the given channels, one row per sample
    pub fn feature_matrix(&self, channels: &[String]) -> Result<Vec<Vec<f64>>> {
        let columns = channels
            .iter()
            .map(|c| self.channel_values(c))
            .collect::<Result<Vec<_>>>()?;

        Ok((0..self.samples.len())
            .map(|row| columns.iter().map(|col| col[row]).collect())
            .collect())
    }
}

impl TryFrom<Vec<Sample>> for TelemetryTable {
    type Error = DetectionError;

    fn try_from(samples: Vec<Sample>) -> Result<Self> {
        Self::new(samples)
    }
}

impl From<TelemetryTable> for Vec<Sample> {
    fn from(table: TelemetryTable) -> Self {
        table.samples
    }
}

/// Configuration consumed by one detection run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Channel scored by the statistical detector
    pub score_channel: String,
    /// Sensitivity multiplier; higher means fewer flags
    pub k: f64,
    /// Channels used by the multivariate detector
    pub feature_channels: Vec<String>,
    /// Expected anomaly fraction, strictly between 0 and 0.5
    pub contamination: f64,
    /// Whether the multivariate detector runs
    pub enable_ml: bool,
    /// Fixed seed for the isolation ensemble; entropy when absent
    pub seed: Option<u64>,
    /// Number of isolation trees
    pub n_trees: usize,
    /// Sub-sample size per tree
    pub max_samples: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            score_channel: DEFAULT_SCORE_CHANNEL.to_string(),
            k: DEFAULT_K,
            feature_channels: vec!["engine_temp".to_string(), DEFAULT_SCORE_CHANNEL.to_string()],
            contamination: DEFAULT_CONTAMINATION,
            enable_ml: false,
            seed: None,
            n_trees: DEFAULT_N_TREES,
            max_samples: DEFAULT_MAX_SAMPLES,
        }
    }
}

impl DetectionConfig {
    pub fn new(score_channel: impl Into<String>, k: f64) -> Self {
        Self {
            score_channel: score_channel.into(),
            k,
            ..Self::default()
        }
    }

    pub fn with_k(mut self, k: f64) -> Self {
        self.k = k;
        self
    }

    /// Enable the multivariate detector over the given channels
    pub fn with_ml<I, S>(mut self, feature_channels: I, contamination: f64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.feature_channels = feature_channels.into_iter().map(Into::into).collect();
        self.contamination = contamination;
        self.enable_ml = true;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_n_trees(mut self, n_trees: usize) -> Self {
        self.n_trees = n_trees;
        self
    }

    pub fn with_max_samples(mut self, max_samples: usize) -> Self {
        self.max_samples = max_samples;
        self
    }

    /// Check parameter ranges. Channel presence is checked against a table
    /// by the orchestrator.
    pub fn validate(&self) -> Result<()> {
        if self.score_channel.trim().is_empty() {
            return Err(DetectionError::InvalidConfig(
                "score_channel must not be empty".to_string(),
            ));
        }
        validate_k(self.k)?;
        validate_contamination(self.contamination)?;
        if self.n_trees == 0 || self.n_trees > MAX_N_TREES {
            return Err(DetectionError::InvalidConfig(format!(
                "n_trees must be in 1..={}, got {}",
                MAX_N_TREES, self.n_trees
            )));
        }
        if self.max_samples < 2 {
            return Err(DetectionError::InvalidConfig(format!(
                "max_samples must be at least 2, got {}",
                self.max_samples
            )));
        }
        if self.enable_ml && self.feature_channels.is_empty() {
            return Err(DetectionError::InvalidConfig(
                "feature_channels must not be empty when enable_ml is set".to_string(),
            ));
        }
        Ok(())
    }
}

pub(crate) fn validate_k(k: f64) -> Result<()> {
    if !k.is_finite() || k <= 0.0 {
        return Err(DetectionError::InvalidConfig(format!(
            "k must be a finite value > 0, got {}",
            k
        )));
    }
    Ok(())
}

pub(crate) fn validate_contamination(contamination: f64) -> Result<()> {
    if !(contamination > 0.0 && contamination < 0.5) {
        return Err(DetectionError::InvalidConfig(format!(
            "contamination must be in (0, 0.5), got {}",
            contamination
        )));
    }
    Ok(())
}

/// Per-sample result of one detection run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyVerdict {
    pub statistical_score: f64,
    pub statistical_flag: bool,
    pub ml_score: Option<f64>,
    pub ml_flag: Option<bool>,
    pub combined_flag: bool,
}
