//! Pluggable pieces of the functional engine: response transformations,
//! custom functionals, and multivariate-quantile estimators.

use condforest_stats::weighted_quantile;

use crate::error::PredictError;

/// Maps one training response row to a transformed row.
///
/// Every row must map to the same dimension.
pub type Transformation = Box<dyn Fn(&[f64]) -> Vec<f64> + Send + Sync>;

/// A user-supplied statistic of a weighted response distribution.
///
/// Receives every transformed training response row and a dense weight per
/// row (summing to 1). Closures of the same shape implement this trait.
pub trait CustomFunctional: Send + Sync {
    /// Evaluate the statistic for one query.
    fn evaluate(&self, responses: &[Vec<f64>], weights: &[f64]) -> Vec<f64>;
}

impl<F> CustomFunctional for F
where
    F: Fn(&[Vec<f64>], &[f64]) -> Vec<f64> + Send + Sync,
{
    fn evaluate(&self, responses: &[Vec<f64>], weights: &[f64]) -> Vec<f64> {
        self(responses, weights)
    }
}

/// Estimates multivariate quantiles of a weighted response distribution.
pub trait MultivariateQuantileEstimator: Send + Sync {
    /// Return one response-space point per rank vector in `ranks`.
    ///
    /// `responses` holds only the rows with non-zero weight and `weights`
    /// their weights.
    ///
    /// # Errors
    ///
    /// Implementations report malformed ranks or weights as [`PredictError`].
    fn estimate(
        &self,
        responses: &[Vec<f64>],
        weights: &[f64],
        ranks: &[Vec<f64>],
    ) -> Result<Vec<Vec<f64>>, PredictError>;
}

/// Coordinate-wise multivariate quantiles: rank vector `u` maps to the point
/// whose coordinate `j` is the weighted quantile of coordinate `j` at `u[j]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoordinatewiseQuantiles;

impl MultivariateQuantileEstimator for CoordinatewiseQuantiles {
    fn estimate(
        &self,
        responses: &[Vec<f64>],
        weights: &[f64],
        ranks: &[Vec<f64>],
    ) -> Result<Vec<Vec<f64>>, PredictError> {
        let dim = responses.first().map_or(0, Vec::len);
        let columns: Vec<Vec<f64>> = (0..dim)
            .map(|j| responses.iter().map(|row| row[j]).collect())
            .collect();

        ranks
            .iter()
            .map(|rank| {
                if rank.len() != dim {
                    return Err(PredictError::DimensionMismatch {
                        context: "rank vector",
                        expected: dim,
                        got: rank.len(),
                    });
                }
                columns
                    .iter()
                    .zip(rank)
                    .map(|(column, &u)| {
                        Ok(weighted_quantile(column, weights, &[u])?[0])
                    })
                    .collect()
            })
            .collect()
    }
}
