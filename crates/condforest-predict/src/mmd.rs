//! MMD-based variable importance.
//!
//! Each feature is scored by how far the forest's conditional distributions
//! move, in kernel MMD, when that feature's information is removed from the
//! queries. A reference weighting measures how far they move by chance.

use std::fmt;
use std::str::FromStr;

use condforest_forest::{
    Forest, RankedFeature, WeightVector, WeightsConfig, rank_features, with_thread_hint,
};
use condforest_stats::{GaussianKernel, median_heuristic, mmd_squared};
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use rayon::iter::{IndexedParallelIterator, IntoParallelRefIterator, ParallelIterator};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::engine::check_weights;
use crate::error::PredictError;

/// How per-feature discrepancies are reported against the baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportanceType {
    /// The per-feature discrepancy itself.
    Raw,
    /// Per-feature discrepancy divided by the baseline.
    Relative,
    /// Per-feature discrepancy minus the baseline.
    #[default]
    Difference,
}

impl fmt::Display for ImportanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Raw => "raw",
            Self::Relative => "relative",
            Self::Difference => "difference",
        })
    }
}

impl FromStr for ImportanceType {
    type Err = PredictError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "raw" => Ok(Self::Raw),
            "relative" => Ok(Self::Relative),
            "difference" => Ok(Self::Difference),
            other => Err(PredictError::InvalidInput {
                reason: format!(
                    "unknown importance type \"{other}\" (expected raw, relative, or difference)"
                ),
            }),
        }
    }
}

/// Produces the weightings compared by [`mmd_importance_with`].
pub trait PerturbationStrategy: Sync {
    /// Two weightings of the queries whose discrepancy is the baseline.
    ///
    /// # Errors
    ///
    /// Implementations propagate weighting failures.
    fn reference_weights(
        &self,
        forest: &Forest,
        queries: &[Vec<f64>],
        config: &WeightsConfig,
    ) -> Result<(Vec<WeightVector>, Vec<WeightVector>), PredictError>;

    /// Weightings of the queries with `feature` held out.
    ///
    /// # Errors
    ///
    /// Implementations propagate weighting failures.
    fn perturbed_weights(
        &self,
        forest: &Forest,
        queries: &[Vec<f64>],
        feature: usize,
        config: &WeightsConfig,
    ) -> Result<Vec<WeightVector>, PredictError>;
}

/// Holds a feature out by permuting its column among the query rows.
///
/// The reference pair weighs the queries with the even-indexed and the
/// odd-indexed trees, so the forest needs at least two trees.
#[derive(Debug, Clone, Copy)]
pub struct FeaturePermutation {
    seed: u64,
}

impl FeaturePermutation {
    /// Create a strategy whose permutations derive from `seed`.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Return the query rows with column `feature` shuffled.
    fn permute(&self, queries: &[Vec<f64>], feature: usize) -> Vec<Vec<f64>> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed.wrapping_add(feature as u64));
        let mut column: Vec<f64> = queries.iter().map(|q| q[feature]).collect();
        column.shuffle(&mut rng);
        queries
            .iter()
            .zip(column)
            .map(|(q, v)| {
                let mut row = q.clone();
                row[feature] = v;
                row
            })
            .collect()
    }
}

impl PerturbationStrategy for FeaturePermutation {
    fn reference_weights(
        &self,
        forest: &Forest,
        queries: &[Vec<f64>],
        config: &WeightsConfig,
    ) -> Result<(Vec<WeightVector>, Vec<WeightVector>), PredictError> {
        if forest.n_trees() < 2 {
            return Err(PredictError::InvalidInput {
                reason: format!(
                    "reference weighting splits the forest in two but it has {} tree",
                    forest.n_trees()
                ),
            });
        }
        let even = forest.select_trees(|t| t % 2 == 0)?;
        let odd = forest.select_trees(|t| t % 2 == 1)?;
        Ok((
            even.query_weights(queries, config)?,
            odd.query_weights(queries, config)?,
        ))
    }

    fn perturbed_weights(
        &self,
        forest: &Forest,
        queries: &[Vec<f64>],
        feature: usize,
        config: &WeightsConfig,
    ) -> Result<Vec<WeightVector>, PredictError> {
        Ok(forest.query_weights(&self.permute(queries, feature), config)?)
    }
}

/// Configuration for MMD variable importance.
///
/// # Defaults
///
/// | Parameter | Default |
/// |-----------|---------|
/// | `importance_type` | [`ImportanceType::Difference`] |
/// | `bandwidth` | `None` (median heuristic on the responses) |
/// | `scale_responses` | `true` |
/// | `seed` | 42 |
/// | `threads` | `None` (global rayon pool) |
#[derive(Debug, Clone)]
pub struct MmdImportanceConfig {
    importance_type: ImportanceType,
    bandwidth: Option<f64>,
    scale_responses: bool,
    seed: u64,
    threads: Option<usize>,
}

impl Default for MmdImportanceConfig {
    fn default() -> Self {
        Self {
            importance_type: ImportanceType::default(),
            bandwidth: None,
            scale_responses: true,
            seed: 42,
            threads: None,
        }
    }
}

impl MmdImportanceConfig {
    /// Create a config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set how discrepancies are reported.
    #[must_use]
    pub fn with_importance_type(mut self, importance_type: ImportanceType) -> Self {
        self.importance_type = importance_type;
        self
    }

    /// Fix the kernel bandwidth instead of using the median heuristic.
    ///
    /// # Errors
    ///
    /// Returns [`PredictError::InvalidInput`] unless `bandwidth` is finite and
    /// positive.
    pub fn with_bandwidth(mut self, bandwidth: f64) -> Result<Self, PredictError> {
        if !bandwidth.is_finite() || bandwidth <= 0.0 {
            return Err(PredictError::InvalidInput {
                reason: format!("bandwidth must be finite and positive, got {bandwidth}"),
            });
        }
        self.bandwidth = Some(bandwidth);
        Ok(self)
    }

    /// Standardize each response column before applying the kernel.
    #[must_use]
    pub fn with_scale_responses(mut self, scale_responses: bool) -> Self {
        self.scale_responses = scale_responses;
        self
    }

    /// Set the permutation seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the worker-count hint. Results do not depend on it.
    #[must_use]
    pub fn with_threads(mut self, threads: Option<usize>) -> Self {
        self.threads = threads;
        self
    }

    /// Return the importance type.
    #[must_use]
    pub fn importance_type(&self) -> ImportanceType {
        self.importance_type
    }

    /// Return the fixed bandwidth, if any.
    #[must_use]
    pub fn bandwidth(&self) -> Option<f64> {
        self.bandwidth
    }

    /// Return whether responses are standardized.
    #[must_use]
    pub fn scale_responses(&self) -> bool {
        self.scale_responses
    }

    /// Return the permutation seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Return the worker-count hint.
    #[must_use]
    pub fn threads(&self) -> Option<usize> {
        self.threads
    }
}

/// MMD variable importance for every feature.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MmdImportance {
    /// How `importance` relates to `raw` and `baseline`.
    pub importance_type: ImportanceType,
    /// Kernel bandwidth used.
    pub bandwidth: f64,
    /// Mean squared MMD between the two reference weightings.
    pub baseline: f64,
    /// Mean squared MMD between the full and the perturbed weighting, per feature.
    pub raw: Vec<f64>,
    /// Reported importance per feature.
    pub importance: Vec<f64>,
}

impl MmdImportance {
    /// Rank features by reported importance.
    #[must_use]
    pub fn ranked(&self, names: &[String]) -> Vec<RankedFeature> {
        rank_features(&self.importance, names)
    }
}

/// Standardize each column to zero mean and unit population variance.
/// Constant columns are only centered.
fn standardize(rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let n = rows.len() as f64;
    let dim = rows.first().map_or(0, Vec::len);
    let mut mean = vec![0.0; dim];
    for row in rows {
        for (m, y) in mean.iter_mut().zip(row) {
            *m += y / n;
        }
    }
    let mut sd = vec![0.0; dim];
    for row in rows {
        for ((s, y), m) in sd.iter_mut().zip(row).zip(&mean) {
            *s += (y - m) * (y - m) / n;
        }
    }
    let scale: Vec<f64> = sd
        .iter()
        .map(|v| if *v > 0.0 { v.sqrt() } else { 1.0 })
        .collect();
    rows.iter()
        .map(|row| {
            row.iter()
                .zip(&mean)
                .zip(&scale)
                .map(|((y, m), s)| (y - m) / s)
                .collect()
        })
        .collect()
}

/// Mean over queries of the squared MMD between paired weightings.
fn mean_mmd(
    kernel: &GaussianKernel,
    responses: &[Vec<f64>],
    a: &[WeightVector],
    b: &[WeightVector],
) -> Result<f64, PredictError> {
    let n_rows = responses.len();
    if a.len() != b.len() {
        return Err(PredictError::DimensionMismatch {
            context: "paired weight vectors",
            expected: a.len(),
            got: b.len(),
        });
    }
    check_weights(n_rows, a)?;
    check_weights(n_rows, b)?;
    let values: Vec<f64> = a
        .par_iter()
        .zip(b.par_iter())
        .map(|(wa, wb)| {
            mmd_squared(kernel, responses, &wa.to_dense(n_rows), &wb.to_dense(n_rows))
        })
        .collect::<Result<_, _>>()?;
    Ok(values.iter().sum::<f64>() / values.len().max(1) as f64)
}

/// MMD variable importance using [`FeaturePermutation`] seeded from `config`.
///
/// Queries default to the training features when `newdata` is `None`.
///
/// # Errors
///
/// See [`mmd_importance_with`].
pub fn mmd_importance(
    forest: &Forest,
    newdata: Option<&[Vec<f64>]>,
    config: &MmdImportanceConfig,
) -> Result<MmdImportance, PredictError> {
    mmd_importance_with(forest, newdata, config, &FeaturePermutation::new(config.seed()))
}

/// MMD variable importance with a caller-supplied perturbation strategy.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`PredictError::Forest`] | query schema mismatch, weighting failure, thread pool failure |
/// | [`PredictError::Stats`] | fewer than two training rows for the median heuristic, or a zero bandwidth |
/// | [`PredictError::InvalidInput`] | no queries, a strategy precondition fails, or a zero baseline with [`ImportanceType::Relative`] |
#[instrument(skip_all, fields(n_features = forest.n_features(), importance_type = %config.importance_type()))]
pub fn mmd_importance_with(
    forest: &Forest,
    newdata: Option<&[Vec<f64>]>,
    config: &MmdImportanceConfig,
    strategy: &impl PerturbationStrategy,
) -> Result<MmdImportance, PredictError> {
    let queries = newdata.unwrap_or_else(|| forest.features());
    if queries.is_empty() {
        return Err(PredictError::InvalidInput {
            reason: "MMD importance needs at least one query row".into(),
        });
    }
    forest.check_query(queries)?;

    let responses = if config.scale_responses() {
        standardize(forest.responses())
    } else {
        forest.responses().to_vec()
    };
    let bandwidth = match config.bandwidth() {
        Some(h) => h,
        None => median_heuristic(&responses)?,
    };
    let kernel = GaussianKernel::new(bandwidth)?;
    debug!(bandwidth, n_queries = queries.len(), "kernel ready");

    // Weighting runs inside the pool installed below.
    let weights_config = WeightsConfig::new();
    let (baseline, raw) = with_thread_hint(config.threads(), || -> Result<_, PredictError> {
        let full = forest.query_weights(queries, &weights_config)?;
        let (ref_a, ref_b) = strategy.reference_weights(forest, queries, &weights_config)?;
        let baseline = mean_mmd(&kernel, &responses, &ref_a, &ref_b)?;
        let raw = (0..forest.n_features())
            .map(|feature| {
                let perturbed =
                    strategy.perturbed_weights(forest, queries, feature, &weights_config)?;
                let value = mean_mmd(&kernel, &responses, &full, &perturbed)?;
                debug!(feature, value, "feature discrepancy");
                Ok(value)
            })
            .collect::<Result<Vec<f64>, PredictError>>()?;
        Ok((baseline, raw))
    })??;

    let importance = match config.importance_type() {
        ImportanceType::Raw => raw.clone(),
        ImportanceType::Difference => raw.iter().map(|v| v - baseline).collect(),
        ImportanceType::Relative => {
            if baseline <= 0.0 {
                return Err(PredictError::InvalidInput {
                    reason: "baseline discrepancy is zero, relative importance is undefined".into(),
                });
            }
            raw.iter().map(|v| v / baseline).collect()
        }
    };
    info!(baseline, bandwidth, "MMD importance computed");

    Ok(MmdImportance {
        importance_type: config.importance_type(),
        bandwidth,
        baseline,
        raw,
        importance,
    })
}
