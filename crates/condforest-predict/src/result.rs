//! Output of the functional engine.

use condforest_stats::normal_cdf;
use serde::Serialize;

use crate::functional::FunctionalKind;

/// Normal approximation of a one-dimensional conditional distribution.
///
/// Built from the weighted mean and standard deviation of the response for
/// one query, together with the Kish effective sample size of its weights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NormalScore {
    /// Weighted mean of the response.
    pub mean: f64,
    /// Weighted standard deviation of the response.
    pub sd: f64,
    /// Effective number of training rows behind the estimate.
    pub effective_sample_size: f64,
}

impl NormalScore {
    /// Standardized score `(y - mean) / sd`.
    ///
    /// With `sd == 0` the score is 0 at the mean and infinite elsewhere.
    #[must_use]
    pub fn z(&self, y: f64) -> f64 {
        let diff = y - self.mean;
        if self.sd > 0.0 {
            diff / self.sd
        } else if diff == 0.0 {
            0.0
        } else {
            diff.signum() * f64::INFINITY
        }
    }

    /// Approximate conditional CDF at `y`.
    #[must_use]
    pub fn cdf(&self, y: f64) -> f64 {
        normal_cdf(self.z(y))
    }

    /// Two-sided p-value of observing `y` under the approximation.
    #[must_use]
    pub fn p_value(&self, y: f64) -> f64 {
        2.0 * (1.0 - normal_cdf(self.z(y).abs()))
    }
}

/// Per-query output of a functional, always indexed by query first.
///
/// Vectors are indexed `[query][coordinate]`, matrices
/// `[query][coordinate][coordinate]`, and quantiles
/// `[query][coordinate][probability]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "functional", rename_all = "camelCase")]
pub enum FunctionalResult {
    /// Weighted means.
    Mean {
        /// `[query][coordinate]`.
        values: Vec<Vec<f64>>,
    },
    /// Weighted standard deviations.
    Sd {
        /// `[query][coordinate]`.
        values: Vec<Vec<f64>>,
    },
    /// Weighted quantiles.
    Quantile {
        /// The requested probabilities.
        probs: Vec<f64>,
        /// `[query][coordinate][probability]`.
        values: Vec<Vec<Vec<f64>>>,
    },
    /// Weighted correlation matrices.
    Cor {
        /// `[query][coordinate][coordinate]`.
        values: Vec<Vec<Vec<f64>>>,
    },
    /// Weighted covariance matrices.
    Cov {
        /// `[query][coordinate][coordinate]`.
        values: Vec<Vec<Vec<f64>>>,
    },
    /// Output of the custom functional.
    Custom {
        /// One vector per query.
        values: Vec<Vec<f64>>,
    },
    /// Normal-approximation scores.
    NormalPredictionScore {
        /// One score per query.
        scores: Vec<NormalScore>,
    },
    /// Multivariate quantiles.
    #[serde(rename = "MQ")]
    MultivariateQuantile {
        /// The requested rank vectors.
        ranks: Vec<Vec<f64>>,
        /// `[query][rank]` response-space points.
        values: Vec<Vec<Vec<f64>>>,
    },
}

impl FunctionalResult {
    /// Return the functional that produced this result.
    #[must_use]
    pub fn kind(&self) -> FunctionalKind {
        match self {
            Self::Mean { .. } => FunctionalKind::Mean,
            Self::Sd { .. } => FunctionalKind::Sd,
            Self::Quantile { .. } => FunctionalKind::Quantile,
            Self::Cor { .. } => FunctionalKind::Cor,
            Self::Cov { .. } => FunctionalKind::Cov,
            Self::Custom { .. } => FunctionalKind::Custom,
            Self::NormalPredictionScore { .. } => FunctionalKind::NormalPredictionScore,
            Self::MultivariateQuantile { .. } => FunctionalKind::MultivariateQuantile,
        }
    }

    /// Return the number of queries.
    #[must_use]
    pub fn n_queries(&self) -> usize {
        match self {
            Self::Mean { values } | Self::Sd { values } | Self::Custom { values } => values.len(),
            Self::Quantile { values, .. }
            | Self::Cor { values }
            | Self::Cov { values }
            | Self::MultivariateQuantile { values, .. } => values.len(),
            Self::NormalPredictionScore { scores } => scores.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{FunctionalResult, NormalScore};
    use crate::FunctionalKind;

    // --- NormalScore ---

    #[test]
    fn z_and_cdf_at_mean() {
        let s = NormalScore { mean: 3.0, sd: 2.0, effective_sample_size: 10.0 };
        assert_eq!(s.z(3.0), 0.0);
        assert!((s.cdf(3.0) - 0.5).abs() < 1e-7);
        assert!((s.p_value(3.0) - 1.0).abs() < 1e-7);
    }

    #[test]
    fn p_value_two_sided() {
        let s = NormalScore { mean: 0.0, sd: 1.0, effective_sample_size: 5.0 };
        assert!((s.z(1.96) - 1.96).abs() < 1e-12);
        assert!((s.p_value(1.96) - 0.05).abs() < 1e-3);
        assert!((s.p_value(-1.96) - s.p_value(1.96)).abs() < 1e-12);
    }

    #[test]
    fn degenerate_sd() {
        let s = NormalScore { mean: 1.0, sd: 0.0, effective_sample_size: 1.0 };
        assert_eq!(s.z(1.0), 0.0);
        assert_eq!(s.z(2.0), f64::INFINITY);
        assert_eq!(s.z(0.0), f64::NEG_INFINITY);
        assert_eq!(s.p_value(2.0), 0.0);
    }

    // --- FunctionalResult ---

    #[test]
    fn kind_and_query_count() {
        let r = FunctionalResult::Quantile {
            probs: vec![0.5],
            values: vec![vec![vec![1.0]], vec![vec![2.0]]],
        };
        assert_eq!(r.kind(), FunctionalKind::Quantile);
        assert_eq!(r.n_queries(), 2);
    }

    #[test]
    fn serializes_with_functional_tag() {
        let r = FunctionalResult::Mean { values: vec![vec![1.5]] };
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["functional"], "mean");
        assert_eq!(json["values"][0][0], 1.5);

        let mq = FunctionalResult::MultivariateQuantile { ranks: vec![], values: vec![] };
        assert_eq!(serde_json::to_value(&mq).unwrap()["functional"], "MQ");
    }
}
