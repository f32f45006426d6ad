//! Seeded Isolation Forest
//!
//! Ensemble of randomised binary trees that isolate outliers in few splits.
//! Anomalous points sit in sparse regions and reach a leaf quickly, so a
//! short average path length means a high anomaly score.
//!
//! The forest mirrors the classic formulation: per-tree subsampling capped
//! at 256 rows, depth limit ceil(log2(psi)), and the normalised score
//! `s(x) = 2^(-E[h(x)] / c(psi))`. The decision surface exposed to the
//! detector follows the scikit-learn convention: `score_samples = -s(x)`,
//! `decision = score_samples - offset`, with the offset placed at the
//! contamination percentile of the training scores.
//!
//! Tree construction is deterministic: per-tree seeds are derived from the
//! master seed before the trees are fitted in parallel with rayon.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use statrs::statistics::{Data, OrderStatistics};

use crate::error::{EngineError, Result};

/// Maximum rows sampled per tree.
const MAX_SUBSAMPLE: usize = 256;

/// Euler-Mascheroni constant for the average-path-length correction.
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Average unsuccessful-search path length in a BST of n nodes.
///
/// `c(n) = 2 H(n-1) - 2 (n-1)/n`, with `c(n) = 0` for n < 2.
fn average_path_length(n: usize) -> f64 {
    if n < 2 {
        return 0.0;
    }
    let n = n as f64;
    2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
}

// ============================================================================
// Trees
// ============================================================================

#[derive(Debug, Clone)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
    Leaf {
        size: usize,
    },
}

#[derive(Debug, Clone)]
struct IsolationTree {
    root: Node,
}

impl IsolationTree {
    /// Grow a tree over the given row indices of `data`.
    fn fit(data: &[Vec<f64>], indices: &[usize], max_depth: usize, rng: &mut StdRng) -> Self {
        Self {
            root: Self::grow(data, indices, 0, max_depth, rng),
        }
    }

    fn grow(
        data: &[Vec<f64>],
        indices: &[usize],
        depth: usize,
        max_depth: usize,
        rng: &mut StdRng,
    ) -> Node {
        if indices.len() <= 1 || depth >= max_depth {
            return Node::Leaf {
                size: indices.len(),
            };
        }

        let dims = data[indices[0]].len();

        // Features with a non-degenerate value range among these rows
        let mut candidates: Vec<(usize, f64, f64)> = Vec::new();
        for f in 0..dims {
            let mut min = f64::INFINITY;
            let mut max = f64::NEG_INFINITY;
            for &i in indices {
                let v = data[i][f];
                min = min.min(v);
                max = max.max(v);
            }
            if max > min {
                candidates.push((f, min, max));
            }
        }

        // All rows identical on every feature: nothing left to isolate
        if candidates.is_empty() {
            return Node::Leaf {
                size: indices.len(),
            };
        }

        let (feature, min, max) = candidates[rng.gen_range(0..candidates.len())];
        let threshold = rng.gen_range(min..max);

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .copied()
            .partition(|&i| data[i][feature] < threshold);

        Node::Split {
            feature,
            threshold,
            left: Box::new(Self::grow(data, &left_idx, depth + 1, max_depth, rng)),
            right: Box::new(Self::grow(data, &right_idx, depth + 1, max_depth, rng)),
        }
    }

    /// Path length from root to the leaf holding `row`, with the standard
    /// correction for unresolved leaves.
    fn path_length(&self, row: &[f64]) -> f64 {
        let mut node = &self.root;
        let mut depth = 0.0;

        loop {
            match node {
                Node::Leaf { size } => return depth + average_path_length(*size),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] < *threshold { left } else { right };
                    depth += 1.0;
                }
            }
        }
    }
}

// ============================================================================
// Forest
// ============================================================================

/// Fitted isolation forest with a contamination-calibrated offset.
#[derive(Debug, Clone)]
pub struct IsolationForest {
    trees: Vec<IsolationTree>,
    subsample_size: usize,
    offset: f64,
}

impl IsolationForest {
    /// Fit a forest on the given rows.
    ///
    /// `contamination` places the decision offset at that percentile of the
    /// training score distribution; `random_state` makes the whole fit
    /// reproducible.
    pub fn fit(
        data: &[Vec<f64>],
        n_estimators: usize,
        contamination: f64,
        random_state: u64,
    ) -> Result<Self> {
        if data.is_empty() {
            return Err(EngineError::InsufficientTraining { have: 0, need: 1 });
        }
        if n_estimators == 0 {
            return Err(EngineError::Internal(
                "isolation forest requires at least one tree".to_string(),
            ));
        }

        let n = data.len();
        let subsample_size = n.min(MAX_SUBSAMPLE);
        let max_depth = (subsample_size as f64).log2().ceil().max(1.0) as usize;

        // Derive per-tree seeds up front so rayon's scheduling order cannot
        // change the result.
        let mut master = StdRng::seed_from_u64(random_state);
        let seeds: Vec<u64> = (0..n_estimators).map(|_| master.gen()).collect();

        let trees: Vec<IsolationTree> = seeds
            .into_par_iter()
            .map(|seed| {
                let mut rng = StdRng::seed_from_u64(seed);
                let indices = sample_without_replacement(n, subsample_size, &mut rng);
                IsolationTree::fit(data, &indices, max_depth, &mut rng)
            })
            .collect();

        let mut forest = Self {
            trees,
            subsample_size,
            offset: 0.0,
        };

        // Offset at the contamination percentile of training score_samples
        let train_scores: Vec<f64> = data.iter().map(|row| forest.score_samples(row)).collect();
        let tau = ((contamination * 100.0).round() as usize).clamp(1, 50);
        let mut ordered = Data::new(train_scores);
        forest.offset = ordered.percentile(tau);

        Ok(forest)
    }

    /// Normalised anomaly score `s(x)` in (0, 1]; higher is more anomalous.
    pub fn anomaly_score(&self, row: &[f64]) -> f64 {
        let avg_path: f64 = self
            .trees
            .iter()
            .map(|tree| tree.path_length(row))
            .sum::<f64>()
            / self.trees.len() as f64;

        let c = average_path_length(self.subsample_size).max(f64::EPSILON);
        2f64.powf(-avg_path / c)
    }

    /// Raw score in the scikit-learn sense: `-s(x)`, higher is more normal.
    pub fn score_samples(&self, row: &[f64]) -> f64 {
        -self.anomaly_score(row)
    }

    /// Offset-shifted decision value; negative means anomalous relative to
    /// the contamination quantile.
    pub fn decision_function(&self, row: &[f64]) -> f64 {
        self.score_samples(row) - self.offset
    }

    /// Trees in the ensemble.
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

/// Sample `k` distinct indices from `0..n` (partial Fisher-Yates).
fn sample_without_replacement(n: usize, k: usize, rng: &mut StdRng) -> Vec<usize> {
    let mut pool: Vec<usize> = (0..n).collect();
    for i in 0..k {
        let j = rng.gen_range(i..n);
        pool.swap(i, j);
    }
    pool.truncate(k);
    pool
}
