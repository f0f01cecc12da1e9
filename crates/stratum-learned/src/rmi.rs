//! Multi-level recursive model index (RMI).
//!
//! The index is a tree of regression models with a fixed number of models per
//! level. The root sees every key; each lower level partitions keys by the
//! prediction of the level above:
//!
//! ```text
//! level 0:              [root]
//!                      /   |   \
//! level 1:         [m0]  [m1]  [m2]      child = floor(pred / (N-1) * F)
//!                  / \    ...
//! level 2:     [l0] [l1] ...            leaf predicts the final position
//! ```
//!
//! Lookups follow the same routing rule as training, so a key always reaches
//! the leaf that was fitted on it. The leaf prediction is searched within an
//! error window over the sorted training keys.

use crate::key::LearnedKey;
use crate::model::{LinearModel, RegressionModel};
use stratum_common::config::validate_fanouts;
use stratum_common::{ErrorBound, Result, StratumError};
use tracing::debug;

/// Position estimate for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prediction {
    /// Rounded leaf prediction. May fall outside `[0, N)`.
    pub position: i64,
    /// Search radius around `position`.
    pub error: usize,
    /// Index of the leaf model that produced the prediction.
    pub leaf: usize,
}

impl Prediction {
    /// Clamps the position into `[0, len)`. `len` must be positive.
    #[inline]
    pub fn clamped(&self, len: usize) -> usize {
        self.position.clamp(0, len.saturating_sub(1) as i64) as usize
    }

    /// Inclusive search window `[pos - err, pos + err]` intersected with `[0, len)`.
    pub fn window(&self, len: usize) -> Option<(usize, usize)> {
        if len == 0 {
            return None;
        }
        let err = self.error as i64;
        let lo = self.position.saturating_sub(err).max(0);
        let hi = self.position.saturating_add(err).min(len as i64 - 1);
        if lo > hi {
            return None;
        }
        Some((lo as usize, hi as usize))
    }
}

/// Maps a parent prediction to a child model index.
#[inline]
fn child_index(prediction: f64, n: usize, fanout: usize) -> usize {
    let scale = n.saturating_sub(1).max(1) as f64;
    let raw = (prediction / scale * fanout as f64).floor();
    // `as` saturates, and NaN maps to 0.
    (raw as i64).clamp(0, fanout as i64 - 1) as usize
}

/// Multi-level learned index over a sorted key array.
#[derive(Debug, Clone)]
pub struct MultiLevelRmi<K, M = LinearModel> {
    /// Models per level; `levels[0] == 1`.
    levels: Vec<usize>,
    /// `models[l]` holds `levels[l]` models once trained.
    models: Vec<Vec<M>>,
    /// Sorted training keys.
    keys: Vec<K>,
    /// Window policy.
    error_bound: ErrorBound,
    /// Measured radius per leaf model, filled for `ErrorBound::MaxResidual`.
    leaf_errors: Vec<usize>,
    trained: bool,
}

impl<K: LearnedKey, M: RegressionModel> MultiLevelRmi<K, M> {
    /// Creates an untrained index with the given fan-out per level.
    pub fn new(levels: Vec<usize>) -> Result<Self> {
        Self::with_error_bound(levels, ErrorBound::default())
    }

    /// Creates an untrained index with an explicit window policy.
    pub fn with_error_bound(levels: Vec<usize>, error_bound: ErrorBound) -> Result<Self> {
        validate_fanouts(&levels)?;
        Ok(Self {
            levels,
            models: Vec::new(),
            keys: Vec::new(),
            error_bound,
            leaf_errors: Vec::new(),
            trained: false,
        })
    }

    /// Fan-out per level.
    pub fn levels(&self) -> &[usize] {
        &self.levels
    }

    /// Number of trained keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn is_trained(&self) -> bool {
        self.trained
    }

    /// Sorted keys the index was trained on.
    pub fn keys(&self) -> &[K] {
        &self.keys
    }

    pub fn error_bound(&self) -> ErrorBound {
        self.error_bound
    }

    /// Trains every level on sorted keys with implicit positions `0..N`.
    ///
    /// Replaces any previous training. Fails without modifying the index if
    /// the keys are not in ascending order.
    pub fn fit(&mut self, keys: Vec<K>) -> Result<()> {
        if let Some(position) = keys.windows(2).position(|pair| pair[0] > pair[1]) {
            return Err(StratumError::UnsortedKeys {
                position: position + 1,
            });
        }

        let n = keys.len();
        let features: Vec<f64> = keys.iter().map(LearnedKey::feature).collect();
        let positions: Vec<f64> = (0..n).map(|p| p as f64).collect();

        let mut models: Vec<Vec<M>> = Vec::with_capacity(self.levels.len());
        models.push(vec![M::fit(&features, &positions)]);

        // Model each key was routed to at the previous level.
        let mut assignments = vec![0usize; n];
        for &fanout in &self.levels[1..] {
            let parents = &models[models.len() - 1];
            let mut partition_keys: Vec<Vec<f64>> = vec![Vec::new(); fanout];
            let mut partition_positions: Vec<Vec<f64>> = vec![Vec::new(); fanout];

            for (i, assignment) in assignments.iter_mut().enumerate() {
                let prediction = parents[*assignment].predict(features[i]);
                let child = child_index(prediction, n, fanout);
                partition_keys[child].push(features[i]);
                partition_positions[child].push(positions[i]);
                *assignment = child;
            }

            let children = partition_keys
                .iter()
                .zip(&partition_positions)
                .map(|(xs, ys)| M::fit(xs, ys))
                .collect();
            models.push(children);
        }

        let leaf_count = self.levels[self.levels.len() - 1];
        let mut leaf_errors = vec![0usize; leaf_count];
        if self.error_bound == ErrorBound::MaxResidual {
            let leaves = &models[models.len() - 1];
            for (i, &leaf) in assignments.iter().enumerate() {
                let predicted = leaves[leaf].predict(features[i]).round() as i64;
                let residual = predicted.abs_diff(i as i64) as usize;
                leaf_errors[leaf] = leaf_errors[leaf].max(residual);
            }
        }

        debug!(
            keys = n,
            levels = self.levels.len(),
            leaves = leaf_count,
            "learned index trained"
        );

        self.models = models;
        self.keys = keys;
        self.leaf_errors = leaf_errors;
        self.trained = true;
        Ok(())
    }

    /// Walks the model tree and returns the raw leaf prediction and leaf index.
    fn walk(&self, feature: f64, mut route: Option<&mut Vec<usize>>) -> Result<(f64, usize)> {
        if !self.trained {
            return Err(StratumError::IndexNotTrained);
        }
        let n = self.keys.len();
        let mut prediction = self.models[0][0].predict(feature);
        let mut index = 0;
        if let Some(route) = route.as_deref_mut() {
            route.push(0);
        }

        for (level, &fanout) in self.levels.iter().enumerate().skip(1) {
            index = child_index(prediction, n, fanout);
            if let Some(route) = route.as_deref_mut() {
                route.push(index);
            }
            prediction = self.models[level][index].predict(feature);
        }
        Ok((prediction, index))
    }

    /// Raw, unrounded position estimate for a key.
    pub fn predict_raw(&self, key: &K) -> Result<f64> {
        self.walk(key.feature(), None).map(|(prediction, _)| prediction)
    }

    /// Model index chosen at each level for a key.
    pub fn route(&self, key: &K) -> Result<Vec<usize>> {
        let mut route = Vec::with_capacity(self.levels.len());
        self.walk(key.feature(), Some(&mut route))?;
        Ok(route)
    }

    /// Position estimate and search radius for a key.
    pub fn predict(&self, key: &K) -> Result<Prediction> {
        let (prediction, leaf) = self.walk(key.feature(), None)?;
        let error = match self.error_bound {
            ErrorBound::SqrtHeuristic => (self.keys.len() as f64).sqrt().floor() as usize,
            ErrorBound::MaxResidual => self.leaf_errors[leaf],
        };
        Ok(Prediction {
            position: prediction.round() as i64,
            error: error.max(1),
            leaf,
        })
    }

    /// Finds the position of `key` in the trained key array.
    ///
    /// Binary-searches only the prediction window; a key outside its window
    /// is reported as not found.
    pub fn lookup(&self, key: &K) -> Result<Option<usize>> {
        let prediction = self.predict(key)?;
        let Some((lo, hi)) = prediction.window(self.keys.len()) else {
            return Ok(None);
        };
        let window = &self.keys[lo..=hi];
        let offset = window.partition_point(|k| k < key);
        match window.get(offset) {
            Some(found) if found == key => Ok(Some(lo + offset)),
            _ => Ok(None),
        }
    }
}
