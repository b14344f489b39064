//! Evaluate functionals of the weighted training responses per query.

use std::borrow::Cow;

use condforest_forest::{Forest, WeightVector, with_thread_hint};
use condforest_stats::{
    effective_sample_size, weighted_correlation, weighted_covariance, weighted_mean,
    weighted_quantile, weighted_sd,
};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use tracing::{debug, info, instrument};

use crate::config::PredictConfig;
use crate::error::PredictError;
use crate::functional::Functional;
use crate::result::{FunctionalResult, NormalScore};

/// Predict the requested functional for each query row, or for each training
/// row out-of-bag when `newdata` is `None`.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`PredictError::MissingCapability`] | `custom` or `MQ` requested without its capability |
/// | [`PredictError::Forest`] | schema mismatch, out-of-bag row with no eligible tree, thread pool failure |
/// | [`PredictError::DimensionMismatch`] | transformed rows disagree in length, or `normalPredictionScore` on a multivariate response |
/// | [`PredictError::Stats`] | a weighted statistic rejected its input |
#[instrument(skip_all, fields(functional = %config.functional().kind(), oob = newdata.is_none()))]
pub fn predict(
    forest: &Forest,
    newdata: Option<&[Vec<f64>]>,
    config: &PredictConfig,
) -> Result<FunctionalResult, PredictError> {
    check_capabilities(config)?;
    let weights = forest.weights(newdata, &config.weights_config())?;
    predict_with_weights(forest, &weights, config)
}

/// Evaluate the configured functional against precomputed weight vectors.
///
/// # Errors
///
/// Same conditions as [`predict`], except those raised while weighting, plus
/// [`PredictError::InvalidInput`] when a weight vector references a row outside
/// the forest, carries a negative or non-finite weight, or is empty.
#[instrument(skip_all, fields(functional = %config.functional().kind(), n_queries = weights.len()))]
pub fn predict_with_weights(
    forest: &Forest,
    weights: &[WeightVector],
    config: &PredictConfig,
) -> Result<FunctionalResult, PredictError> {
    check_capabilities(config)?;
    check_weights(forest.n_rows(), weights)?;
    let responses = transform_responses(forest.responses(), config)?;
    let dim = responses.first().map_or(0, Vec::len);
    debug!(dim, n_rows = responses.len(), "responses prepared");

    let result = with_thread_hint(config.threads(), || {
        evaluate(&responses, dim, weights, config)
    })??;
    info!(
        functional = %result.kind(),
        n_queries = result.n_queries(),
        dim,
        "functional evaluated"
    );
    Ok(result)
}

/// Check that every weight vector is a usable weighting of the forest's
/// training rows.
pub(crate) fn check_weights(n_rows: usize, weights: &[WeightVector]) -> Result<(), PredictError> {
    for (query, w) in weights.iter().enumerate() {
        if w.is_empty() {
            return Err(PredictError::InvalidInput {
                reason: format!("weight vector {query} carries no weight"),
            });
        }
        for &(row, weight) in w.entries() {
            if row >= n_rows {
                return Err(PredictError::InvalidInput {
                    reason: format!(
                        "weight vector {query} references row {row}, forest has {n_rows} rows"
                    ),
                });
            }
            if !weight.is_finite() || weight < 0.0 {
                return Err(PredictError::InvalidInput {
                    reason: format!("weight vector {query} has weight {weight} for row {row}"),
                });
            }
        }
    }
    Ok(())
}

fn check_capabilities(config: &PredictConfig) -> Result<(), PredictError> {
    match config.functional() {
        Functional::Custom if config.custom().is_none() => Err(PredictError::MissingCapability {
            functional: "custom",
            capability: "custom functional",
        }),
        Functional::MultivariateQuantile { .. } if config.mq_estimator().is_none() => {
            Err(PredictError::MissingCapability {
                functional: "MQ",
                capability: "multivariate quantile estimator",
            })
        }
        _ => Ok(()),
    }
}

/// Apply the configured transformation to every response row and check that
/// all transformed rows share one dimension.
fn transform_responses<'a>(
    responses: &'a [Vec<f64>],
    config: &PredictConfig,
) -> Result<Cow<'a, [Vec<f64>]>, PredictError> {
    let Some(transformation) = config.transformation() else {
        return Ok(Cow::Borrowed(responses));
    };
    let transformed: Vec<Vec<f64>> = responses
        .iter()
        .map(|y| transformation(y.as_slice()))
        .collect();
    let dim = transformed.first().map_or(0, Vec::len);
    if dim == 0 {
        return Err(PredictError::InvalidInput {
            reason: "transformation produced an empty response row".into(),
        });
    }
    if let Some(row) = transformed.iter().find(|r| r.len() != dim) {
        return Err(PredictError::DimensionMismatch {
            context: "transformed response",
            expected: dim,
            got: row.len(),
        });
    }
    Ok(Cow::Owned(transformed))
}

/// The rows carrying weight for one query, with their weights.
fn support(responses: &[Vec<f64>], weights: &WeightVector) -> (Vec<Vec<f64>>, Vec<f64>) {
    weights
        .entries()
        .iter()
        .map(|&(row, w)| (responses[row].clone(), w))
        .unzip()
}

/// Evaluate `f` on the weighted support of every query in parallel.
fn per_query<T, F>(
    responses: &[Vec<f64>],
    weights: &[WeightVector],
    f: F,
) -> Result<Vec<T>, PredictError>
where
    T: Send,
    F: Fn(&[Vec<f64>], &[f64]) -> Result<T, PredictError> + Sync,
{
    weights
        .par_iter()
        .map(|w| {
            let (rows, ws) = support(responses, w);
            f(&rows, &ws)
        })
        .collect()
}

fn evaluate(
    responses: &[Vec<f64>],
    dim: usize,
    weights: &[WeightVector],
    config: &PredictConfig,
) -> Result<FunctionalResult, PredictError> {
    let result = match config.functional() {
        Functional::Mean => FunctionalResult::Mean {
            values: per_query(responses, weights, |rows, w| Ok(weighted_mean(rows, w)?))?,
        },
        Functional::Sd => FunctionalResult::Sd {
            values: per_query(responses, weights, |rows, w| Ok(weighted_sd(rows, w)?))?,
        },
        Functional::Quantile { probs } => FunctionalResult::Quantile {
            probs: probs.clone(),
            values: per_query(responses, weights, |rows, w| {
                (0..dim)
                    .map(|j| {
                        let column: Vec<f64> = rows.iter().map(|r| r[j]).collect();
                        Ok(weighted_quantile(&column, w, probs)?)
                    })
                    .collect()
            })?,
        },
        Functional::Cor => FunctionalResult::Cor {
            values: per_query(responses, weights, |rows, w| {
                Ok(weighted_correlation(rows, w)?)
            })?,
        },
        Functional::Cov => FunctionalResult::Cov {
            values: per_query(responses, weights, |rows, w| {
                Ok(weighted_covariance(rows, w)?)
            })?,
        },
        Functional::Custom => {
            let custom = config.custom().ok_or(PredictError::MissingCapability {
                functional: "custom",
                capability: "custom functional",
            })?;
            let n_rows = responses.len();
            FunctionalResult::Custom {
                values: weights
                    .par_iter()
                    .map(|w| custom.evaluate(responses, &w.to_dense(n_rows)))
                    .collect(),
            }
        }
        Functional::NormalPredictionScore => {
            if dim != 1 {
                return Err(PredictError::DimensionMismatch {
                    context: "normalPredictionScore",
                    expected: 1,
                    got: dim,
                });
            }
            FunctionalResult::NormalPredictionScore {
                scores: per_query(responses, weights, |rows, w| {
                    Ok(NormalScore {
                        mean: weighted_mean(rows, w)?[0],
                        sd: weighted_sd(rows, w)?[0],
                        effective_sample_size: effective_sample_size(w),
                    })
                })?,
            }
        }
        Functional::MultivariateQuantile { ranks } => {
            let estimator = config.mq_estimator().ok_or(PredictError::MissingCapability {
                functional: "MQ",
                capability: "multivariate quantile estimator",
            })?;
            FunctionalResult::MultivariateQuantile {
                ranks: ranks.clone(),
                values: per_query(responses, weights, |rows, w| {
                    estimator.estimate(rows, w, ranks)
                })?,
            }
        }
    };
    Ok(result)
}

#[cfg(test)]
mod tests {
    use condforest_forest::{ForestError, WeightVector, WeightsConfig};

    use super::{predict, predict_with_weights};
    use crate::testing::{queries, two_stump_forest};
    use crate::{
        CoordinatewiseQuantiles, Functional, FunctionalResult, PredictConfig, PredictError,
    };

    const TOL: f64 = 1e-12;

    fn run(functional: Functional) -> FunctionalResult {
        let forest = two_stump_forest();
        let config = PredictConfig::new(functional).unwrap();
        predict(&forest, Some(&queries()), &config).unwrap()
    }

    fn doubled() -> PredictConfig {
        PredictConfig::new(Functional::Cov)
            .unwrap()
            .with_transformation(|y: &[f64]| vec![y[0], 2.0 * y[0]])
    }

    // --- Moments ---

    #[test]
    fn mean_matches_hand_computed_weights() {
        let FunctionalResult::Mean { values } = run(Functional::Mean) else {
            panic!("expected mean result");
        };
        assert!((values[0][0] - 1.25).abs() < TOL);
        assert!((values[1][0] - 3.25).abs() < TOL);
    }

    #[test]
    fn sd_matches_hand_computed_weights() {
        let FunctionalResult::Sd { values } = run(Functional::Sd) else {
            panic!("expected sd result");
        };
        assert!((values[0][0] - 0.1875_f64.sqrt()).abs() < TOL);
    }

    #[test]
    fn cov_and_cor_of_linear_transformation() {
        let forest = two_stump_forest();
        let FunctionalResult::Cov { values } =
            predict(&forest, Some(&queries()), &doubled()).unwrap()
        else {
            panic!("expected cov result");
        };
        let v = 0.1875;
        assert!((values[0][0][0] - v).abs() < TOL);
        assert!((values[0][0][1] - 2.0 * v).abs() < TOL);
        assert!((values[0][1][1] - 4.0 * v).abs() < TOL);

        let config = PredictConfig::new(Functional::Cor)
            .unwrap()
            .with_transformation(|y: &[f64]| vec![y[0], 2.0 * y[0]]);
        let FunctionalResult::Cor { values } =
            predict(&forest, Some(&queries()), &config).unwrap()
        else {
            panic!("expected cor result");
        };
        for q in &values {
            assert!((q[0][1] - 1.0).abs() < 1e-9);
            assert_eq!(q[0][0], 1.0);
        }
    }

    // --- Quantiles ---

    #[test]
    fn quantile_per_coordinate() {
        let FunctionalResult::Quantile { probs, values } = run(Functional::Quantile {
            probs: vec![0.0, 0.5, 1.0],
        }) else {
            panic!("expected quantile result");
        };
        assert_eq!(probs, vec![0.0, 0.5, 1.0]);
        // Query 0: values [1, 2], weights [0.75, 0.25].
        assert_eq!(values[0], vec![vec![1.0, 1.0, 2.0]]);
        assert_eq!(values[0].len(), 1);
        assert_eq!(values[1][0][2], 4.0);
    }

    // --- Capabilities ---

    #[test]
    fn custom_receives_dense_weights() {
        let forest = two_stump_forest();
        let config = PredictConfig::new(Functional::Custom)
            .unwrap()
            .with_custom(|rows: &[Vec<f64>], w: &[f64]| {
                assert_eq!(rows.len(), w.len());
                let mean: f64 = rows.iter().zip(w).map(|(r, w)| r[0] * w).sum();
                vec![mean, w.len() as f64]
            });
        let FunctionalResult::Custom { values } =
            predict(&forest, Some(&queries()), &config).unwrap()
        else {
            panic!("expected custom result");
        };
        assert!((values[0][0] - 1.25).abs() < TOL);
        assert_eq!(values[0][1], 4.0);
    }

    #[test]
    fn custom_without_function_fails() {
        let forest = two_stump_forest();
        let config = PredictConfig::new(Functional::Custom).unwrap();
        let err = predict(&forest, Some(&queries()), &config).unwrap_err();
        assert!(matches!(
            err,
            PredictError::MissingCapability { functional: "custom", .. }
        ));
    }

    #[test]
    fn mq_without_estimator_fails() {
        let forest = two_stump_forest();
        let config = PredictConfig::new(Functional::MultivariateQuantile {
            ranks: vec![vec![0.5]],
        })
        .unwrap();
        let err = predict(&forest, Some(&queries()), &config).unwrap_err();
        assert!(matches!(err, PredictError::MissingCapability { functional: "MQ", .. }));
    }

    #[test]
    fn mq_with_estimator() {
        let forest = two_stump_forest();
        let config = PredictConfig::new(Functional::MultivariateQuantile {
            ranks: vec![vec![0.0], vec![1.0]],
        })
        .unwrap()
        .with_mq_estimator(CoordinatewiseQuantiles);
        let FunctionalResult::MultivariateQuantile { ranks, values } =
            predict(&forest, Some(&queries()), &config).unwrap()
        else {
            panic!("expected MQ result");
        };
        assert_eq!(ranks.len(), 2);
        assert_eq!(values[0], vec![vec![1.0], vec![2.0]]);
    }

    // --- Normal score ---

    #[test]
    fn normal_score_fields() {
        let FunctionalResult::NormalPredictionScore { scores } =
            run(Functional::NormalPredictionScore)
        else {
            panic!("expected score result");
        };
        let s = scores[0];
        assert!((s.mean - 1.25).abs() < TOL);
        assert!((s.sd - 0.1875_f64.sqrt()).abs() < TOL);
        // 1 / (0.75² + 0.25²)
        assert!((s.effective_sample_size - 1.6).abs() < TOL);
    }

    #[test]
    fn normal_score_requires_univariate_response() {
        let forest = two_stump_forest();
        let config = PredictConfig::new(Functional::NormalPredictionScore)
            .unwrap()
            .with_transformation(|y: &[f64]| vec![y[0], y[0]]);
        let err = predict(&forest, Some(&queries()), &config).unwrap_err();
        assert!(matches!(
            err,
            PredictError::DimensionMismatch { expected: 1, got: 2, .. }
        ));
    }

    // --- Errors ---

    #[test]
    fn ragged_transformation_rejected() {
        let forest = two_stump_forest();
        let config = PredictConfig::new(Functional::Mean)
            .unwrap()
            .with_transformation(|y: &[f64]| vec![0.0; y[0] as usize]);
        let err = predict(&forest, Some(&queries()), &config).unwrap_err();
        assert!(matches!(err, PredictError::DimensionMismatch { .. }));
    }

    #[test]
    fn schema_mismatch_surfaces_from_forest() {
        let forest = two_stump_forest();
        let config = PredictConfig::new(Functional::Mean).unwrap();
        let err = predict(&forest, Some(&[vec![1.0]][..]), &config).unwrap_err();
        assert!(matches!(
            err,
            PredictError::Forest(ForestError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn oob_on_fully_drawn_forest_fails() {
        let forest = two_stump_forest();
        let config = PredictConfig::new(Functional::Mean).unwrap();
        let err = predict(&forest, None, &config).unwrap_err();
        assert!(matches!(
            err,
            PredictError::Forest(ForestError::InsufficientObservations { .. })
        ));
    }

    // --- Precomputed weights ---

    #[test]
    fn precomputed_weights_match_predict() {
        let forest = two_stump_forest();
        let weights = forest
            .query_weights(&queries(), &WeightsConfig::new())
            .unwrap();
        let config = doubled();
        let a = predict_with_weights(&forest, &weights, &config).unwrap();
        let b = predict(&forest, Some(&queries()), &config).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn precomputed_weights_are_validated() {
        let forest = two_stump_forest();
        let config = PredictConfig::new(Functional::Mean).unwrap();
        let invalid = [
            WeightVector::from_pairs([(5, 1.0)]),
            WeightVector::from_pairs([(0, 1.5), (1, -0.5)]),
            WeightVector::from_pairs([(0, f64::NAN)]),
            WeightVector::from_pairs([(0, 0.0)]),
        ];
        for w in invalid {
            let err = predict_with_weights(&forest, &[w.clone()], &config).unwrap_err();
            assert!(matches!(err, PredictError::InvalidInput { .. }), "{w:?}: {err}");
        }

        let custom = PredictConfig::new(Functional::Custom)
            .unwrap()
            .with_custom(|y: &[Vec<f64>], w: &[f64]| vec![y.len() as f64 * w[0]]);
        let err = predict_with_weights(&forest, &[WeightVector::from_pairs([(4, 1.0)])], &custom)
            .unwrap_err();
        assert!(matches!(err, PredictError::InvalidInput { .. }));

        let ok = predict_with_weights(&forest, &[WeightVector::from_pairs([(3, 1.0)])], &config)
            .unwrap();
        let FunctionalResult::Mean { values } = ok else {
            panic!("expected mean result");
        };
        assert!((values[0][0] - 4.0).abs() < TOL);
    }

    #[test]
    fn thread_hint_does_not_change_result() {
        let forest = two_stump_forest();
        let a = predict(&forest, Some(&queries()), &doubled()).unwrap();
        let b = predict(&forest, Some(&queries()), &doubled().with_threads(Some(2))).unwrap();
        assert_eq!(a, b);
    }
}
