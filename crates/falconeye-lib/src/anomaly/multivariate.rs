//! Multivariate outlier detection
//!
//! Fits a fresh isolation forest over the feature channels of the whole
//! table on every call and flags the `contamination` fraction of samples
//! with the lowest scores.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::isolation_forest::IsolationForest;
use super::DetectorScore;
use crate::error::{DetectionError, Result};
use crate::models::{
    validate_contamination, DetectionConfig, TelemetryTable, DEFAULT_MAX_SAMPLES, DEFAULT_N_TREES,
};

/// Minimum samples required to fit the model
pub const MIN_SAMPLES_FOR_MODEL: usize = 10;

/// Output of one multivariate pass
#[derive(Debug, Clone, PartialEq)]
pub struct MultivariateOutcome {
    /// Scores strictly below this value are flagged
    pub threshold: f64,
    pub scores: Vec<DetectorScore>,
}

impl MultivariateOutcome {
    pub fn flagged(&self) -> usize {
        self.scores.iter().filter(|s| s.flag).count()
    }
}

/// Isolation-based detector over several channels
#[derive(Debug, Clone)]
pub struct MultivariateDetector {
    /// Expected anomaly fraction, in (0, 0.5)
    pub contamination: f64,
    pub n_trees: usize,
    pub max_samples: usize,
    /// Fixed seed; entropy when absent
    pub seed: Option<u64>,
}

impl MultivariateDetector {
    pub fn new(contamination: f64) -> Self {
        Self {
            contamination,
            n_trees: DEFAULT_N_TREES,
            max_samples: DEFAULT_MAX_SAMPLES,
            seed: None,
        }
    }

    pub fn from_config(config: &DetectionConfig) -> Self {
        Self {
            contamination: config.contamination,
            n_trees: config.n_trees,
            max_samples: config.max_samples,
            seed: config.seed,
        }
    }

    /// Detect using the configured seed, or entropy
    pub fn detect(
        &self,
        table: &TelemetryTable,
        feature_channels: &[String],
    ) -> Result<MultivariateOutcome> {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.detect_with_rng(table, feature_channels, &mut rng)
    }

    /// Detect drawing all model randomness from `rng`
    pub fn detect_with_rng<R: Rng + ?Sized>(
        &self,
        table: &TelemetryTable,
        feature_channels: &[String],
        rng: &mut R,
    ) -> Result<MultivariateOutcome> {
        validate_contamination(self.contamination)?;
        if feature_channels.is_empty() {
            return Err(DetectionError::InvalidConfig(
                "feature_channels must not be empty".to_string(),
            ));
        }
        if table.len() < MIN_SAMPLES_FOR_MODEL {
            return Err(DetectionError::InsufficientData {
                required: MIN_SAMPLES_FOR_MODEL,
                actual: table.len(),
            });
        }

        let matrix = table.feature_matrix(feature_channels)?;
        let forest = IsolationForest::fit(&matrix, self.n_trees, self.max_samples, rng)?;
        let raw = forest.score_samples(&matrix)?;
        let threshold = quantile(&raw, self.contamination);

        let scores: Vec<DetectorScore> = raw
            .iter()
            .map(|&score| DetectorScore {
                score,
                flag: score < threshold,
            })
            .collect();

        debug!(
            features = ?feature_channels,
            trees = forest.n_trees(),
            sample_size = forest.sample_size(),
            threshold = threshold,
            flagged = scores.iter().filter(|s| s.flag).count(),
            "Multivariate pass complete"
        );

        Ok(MultivariateOutcome { threshold, scores })
    }
}

/// Run the multivariate detector with default ensemble settings
pub fn detect_multivariate(
    table: &TelemetryTable,
    feature_channels: &[String],
    contamination: f64,
) -> Result<MultivariateOutcome> {
    MultivariateDetector::new(contamination).detect(table, feature_channels)
}

/// `q`-quantile with linear interpolation between order statistics
fn quantile(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let pos = q * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    sorted[lower] + (sorted[upper] - sorted[lower]) * (pos - lower as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantile_interpolates() {
        let values = [5.0, 1.0, 3.0, 2.0, 4.0];
        assert_eq!(quantile(&values, 0.0), 1.0);
        assert_eq!(quantile(&values, 0.5), 3.0);
        assert!((quantile(&values, 0.1) - 1.4).abs() < 1e-12);
    }

    #[test]
    fn test_quantile_flags_expected_count() {
        let values: Vec<f64> = (0..200).map(|i| i as f64).collect();
        let threshold = quantile(&values, 0.05);
        assert_eq!(values.iter().filter(|v| **v < threshold).count(), 10);
    }
}
