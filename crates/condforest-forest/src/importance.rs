//! Structural variable importance from depth-decayed split frequencies.

use tracing::{info, instrument};

use crate::error::ForestError;
use crate::forest::Forest;

/// A ranked feature with name, importance score, and rank.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct RankedFeature {
    /// Feature name.
    pub name: String,
    /// Importance score.
    pub importance: f64,
    /// 1-based rank (1 = most important).
    pub rank: usize,
}

/// Pair importances with names, sort descending, and assign 1-based ranks.
///
/// Ties keep feature order.
#[must_use]
pub fn rank_features(importances: &[f64], names: &[String]) -> Vec<RankedFeature> {
    let mut features: Vec<RankedFeature> = names
        .iter()
        .zip(importances)
        .map(|(name, &importance)| RankedFeature {
            name: name.clone(),
            importance,
            rank: 0, // will be set after sorting
        })
        .collect();

    features.sort_by(|a, b| b.importance.total_cmp(&a.importance));

    for (i, feat) in features.iter_mut().enumerate() {
        feat.rank = i + 1;
    }

    features
}

/// Configuration for structural variable importance.
///
/// # Defaults
///
/// | Parameter        | Default |
/// |------------------|---------|
/// | `decay_exponent` | 2.0     |
/// | `max_depth`      | 4       |
#[derive(Debug, Clone)]
pub struct ImportanceConfig {
    pub(crate) decay_exponent: f64,
    pub(crate) max_depth: usize,
}

impl Default for ImportanceConfig {
    fn default() -> Self {
        Self {
            decay_exponent: 2.0,
            max_depth: 4,
        }
    }
}

impl ImportanceConfig {
    /// Create a config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the exponent `k` in the depth weight `d^-k`.
    #[must_use]
    pub fn with_decay_exponent(mut self, decay_exponent: f64) -> Self {
        self.decay_exponent = decay_exponent;
        self
    }

    /// Set the deepest level that contributes.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Return the decay exponent.
    #[must_use]
    pub fn decay_exponent(&self) -> f64 {
        self.decay_exponent
    }

    /// Return the maximum depth.
    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }
}

impl Forest {
    /// Structural importance of each feature.
    ///
    /// Each depth's split counts are normalized by that depth's total (an
    /// empty depth contributes zeros), weighted by `depth^-decay_exponent`,
    /// summed per feature, and divided by the sum of depth weights.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ForestError::InvalidMaxDepth`] | `max_depth` is zero |
    /// | [`ForestError::InvalidDecayExponent`] | exponent is negative or not finite |
    #[instrument(skip_all, fields(max_depth = config.max_depth, decay = config.decay_exponent))]
    pub fn variable_importance(&self, config: &ImportanceConfig) -> Result<Vec<f64>, ForestError> {
        if !config.decay_exponent.is_finite() || config.decay_exponent < 0.0 {
            return Err(ForestError::InvalidDecayExponent {
                exponent: config.decay_exponent,
            });
        }
        let frequencies = self.split_frequencies(config.max_depth)?;

        let mut importance = vec![0.0; self.n_features()];
        let mut weight_sum = 0.0;
        for (d, row) in frequencies.counts().iter().enumerate() {
            let depth_weight = ((d + 1) as f64).powf(-config.decay_exponent);
            weight_sum += depth_weight;
            let row_sum = match row.iter().sum::<usize>() {
                0 => 1.0,
                s => s as f64,
            };
            for (imp, &count) in importance.iter_mut().zip(row) {
                *imp += depth_weight * count as f64 / row_sum;
            }
        }
        importance.iter_mut().for_each(|v| *v /= weight_sum);

        info!(
            total_splits = frequencies.total(),
            "structural variable importance computed"
        );
        Ok(importance)
    }

    /// Structural importance paired with feature names, ranked descending.
    ///
    /// # Errors
    ///
    /// See [`Forest::variable_importance`].
    pub fn ranked_importance(
        &self,
        config: &ImportanceConfig,
    ) -> Result<Vec<RankedFeature>, ForestError> {
        let importance = self.variable_importance(config)?;
        Ok(rank_features(&importance, &self.feature_names))
    }
}
