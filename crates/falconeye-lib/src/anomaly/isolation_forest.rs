//! Isolation forest
//!
//! An ensemble of random partitioning trees. Points that are isolated after
//! fewer random splits (shorter average path length) are more anomalous.

use rand::seq::index;
use rand::Rng;

use crate::error::{DetectionError, Result};
use crate::models::MAX_N_TREES;

const EULER_GAMMA: f64 = 0.577_215_664_9;

/// Average path length of an unsuccessful BST search over `n` points
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        value: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

/// One random partitioning tree
#[derive(Debug, Clone)]
pub(crate) struct IsolationTree {
    root: Node,
}

impl IsolationTree {
    fn grow<R: Rng + ?Sized>(
        data: &[Vec<f64>],
        rows: Vec<usize>,
        height_limit: usize,
        rng: &mut R,
    ) -> Self {
        Self {
            root: Self::grow_node(data, rows, 0, height_limit, rng),
        }
    }

    fn grow_node<R: Rng + ?Sized>(
        data: &[Vec<f64>],
        rows: Vec<usize>,
        depth: usize,
        height_limit: usize,
        rng: &mut R,
    ) -> Node {
        if rows.len() <= 1 || depth >= height_limit {
            return Node::Leaf { size: rows.len() };
        }

        // (feature, min, max) for every feature that still varies in this node
        let dims = data[rows[0]].len();
        let candidates: Vec<(usize, f64, f64)> = (0..dims)
            .filter_map(|feature| {
                let (min, max) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &r| {
                    let v = data[r][feature];
                    (lo.min(v), hi.max(v))
                });
                (min < max).then_some((feature, min, max))
            })
            .collect();

        if candidates.is_empty() {
            return Node::Leaf { size: rows.len() };
        }

        let (feature, min, max) = candidates[rng.gen_range(0..candidates.len())];
        let u: f64 = rng.gen();
        let value = min * (1.0 - u) + max * u;

        let (left, right): (Vec<usize>, Vec<usize>) =
            rows.into_iter().partition(|&r| data[r][feature] < value);

        Node::Split {
            feature,
            value,
            left: Box::new(Self::grow_node(data, left, depth + 1, height_limit, rng)),
            right: Box::new(Self::grow_node(data, right, depth + 1, height_limit, rng)),
        }
    }

    /// Depth at which `point` lands, corrected for the unresolved leaf size
    pub(crate) fn path_length(&self, point: &[f64]) -> f64 {
        let mut node = &self.root;
        let mut depth = 0.0;
        loop {
            match node {
                Node::Leaf { size } => return depth + average_path_length(*size),
                Node::Split {
                    feature,
                    value,
                    left,
                    right,
                } => {
                    node = if point[*feature] < *value { left } else { right };
                    depth += 1.0;
                }
            }
        }
    }
}

/// Fitted isolation ensemble
#[derive(Debug, Clone)]
pub struct IsolationForest {
    trees: Vec<IsolationTree>,
    sample_size: usize,
    dims: usize,
}

impl IsolationForest {
    /// Fit on row-major `data`, drawing all randomness from `rng`
    pub fn fit<R: Rng + ?Sized>(
        data: &[Vec<f64>],
        n_trees: usize,
        max_samples: usize,
        rng: &mut R,
    ) -> Result<Self> {
        if data.len() < 2 {
            return Err(DetectionError::InsufficientData {
                required: 2,
                actual: data.len(),
            });
        }
        if n_trees == 0 || n_trees > MAX_N_TREES {
            return Err(DetectionError::InvalidConfig(format!(
                "n_trees must be in 1..={}, got {}",
                MAX_N_TREES, n_trees
            )));
        }

        let dims = data[0].len();
        if dims == 0 {
            return Err(DetectionError::ModelFit("no feature columns".to_string()));
        }
        if let Some(idx) = data.iter().position(|row| row.len() != dims) {
            return Err(DetectionError::ModelFit(format!(
                "row {} has {} features, expected {}",
                idx,
                data[idx].len(),
                dims
            )));
        }
        if let Some(idx) = data.iter().position(|row| row.iter().any(|v| !v.is_finite())) {
            return Err(DetectionError::ModelFit(format!(
                "row {} contains a non-finite feature",
                idx
            )));
        }

        let degenerate = (0..dims).all(|f| data.iter().all(|row| row[f] == data[0][f]));
        if degenerate {
            return Err(DetectionError::ModelFit(
                "every feature column is constant; nothing to isolate".to_string(),
            ));
        }

        let sample_size = max_samples.clamp(2, data.len());
        let height_limit = (sample_size as f64).log2().ceil() as usize;

        let trees = (0..n_trees)
            .map(|_| {
                let rows = index::sample(rng, data.len(), sample_size).into_vec();
                IsolationTree::grow(data, rows, height_limit, rng)
            })
            .collect();

        Ok(Self {
            trees,
            sample_size,
            dims,
        })
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    /// Mean path length of `point` across the ensemble
    pub fn mean_path_length(&self, point: &[f64]) -> f64 {
        self.trees.iter().map(|t| t.path_length(point)).sum::<f64>() / self.trees.len() as f64
    }

    /// Isolation score in (0, 1]; higher is more anomalous
    pub fn anomaly_score(&self, point: &[f64]) -> f64 {
        let normalizer = average_path_length(self.sample_size);
        2f64.powf(-self.mean_path_length(point) / normalizer)
    }

    /// Negated isolation scores, one per row; lower is more anomalous
    pub fn score_samples(&self, data: &[Vec<f64>]) -> Result<Vec<f64>> {
        data.iter()
            .enumerate()
            .map(|(idx, row)| {
                if row.len() != self.dims {
                    return Err(DetectionError::ModelFit(format!(
                        "row {} has {} features, model was fit on {}",
                        idx,
                        row.len(),
                        self.dims
                    )));
                }
                let score = -self.anomaly_score(row);
                if score.is_finite() {
                    Ok(score)
                } else {
                    Err(DetectionError::ModelFit(format!(
                        "non-finite score for row {}",
                        idx
                    )))
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn cluster_with_outlier() -> Vec<Vec<f64>> {
        let mut data: Vec<Vec<f64>> = (0..100)
            .map(|i| {
                let jitter = (i % 10) as f64 * 0.1;
                vec![500.0 + jitter, 1.0 + jitter * 0.5]
            })
            .collect();
        data.push(vec![900.0, 8.0]);
        data
    }

    #[test]
    fn test_average_path_length() {
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        // 2 * (ln(255) + gamma) - 2 * 255 / 256
        let expected = 2.0 * (255f64.ln() + EULER_GAMMA) - 2.0 * 255.0 / 256.0;
        assert!((average_path_length(256) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_outlier_scores_lowest() {
        let data = cluster_with_outlier();
        let mut rng = StdRng::seed_from_u64(7);
        let forest = IsolationForest::fit(&data, 100, 64, &mut rng).unwrap();
        let scores = forest.score_samples(&data).unwrap();

        let (min_idx, _) = scores
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .unwrap();
        assert_eq!(min_idx, data.len() - 1);
        assert!(scores.iter().all(|s| *s < 0.0 && *s >= -1.0));
    }

    #[test]
    fn test_same_seed_same_scores() {
        let data = cluster_with_outlier();
        let a = IsolationForest::fit(&data, 50, 32, &mut StdRng::seed_from_u64(42))
            .unwrap()
            .score_samples(&data)
            .unwrap();
        let b = IsolationForest::fit(&data, 50, 32, &mut StdRng::seed_from_u64(42))
            .unwrap()
            .score_samples(&data)
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_constant_features_fail_to_fit() {
        let data = vec![vec![1.0, 2.0]; 20];
        let err = IsolationForest::fit(&data, 10, 16, &mut StdRng::seed_from_u64(1)).unwrap_err();
        assert!(matches!(err, DetectionError::ModelFit(_)));
    }

    #[test]
    fn test_sample_size_capped_by_rows() {
        let data = cluster_with_outlier();
        let forest = IsolationForest::fit(&data, 10, 256, &mut StdRng::seed_from_u64(3)).unwrap();
        assert_eq!(forest.sample_size(), data.len());
        assert_eq!(forest.n_trees(), 10);
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let data = vec![vec![1.0, 2.0], vec![3.0]];
        let err = IsolationForest::fit(&data, 10, 16, &mut StdRng::seed_from_u64(1)).unwrap_err();
        assert!(matches!(err, DetectionError::ModelFit(_)));
    }
}
