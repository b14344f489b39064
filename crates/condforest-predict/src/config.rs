//! Configuration for the functional engine.

use std::fmt;

use condforest_forest::WeightsConfig;

use crate::capability::{CustomFunctional, MultivariateQuantileEstimator, Transformation};
use crate::error::PredictError;
use crate::functional::Functional;

/// Configuration for [`predict`](crate::predict).
///
/// # Defaults
///
/// | Parameter | Default |
/// |-----------|---------|
/// | `transformation` | identity |
/// | `custom` | none |
/// | `mq_estimator` | none |
/// | `threads` | `None` (global rayon pool) |
pub struct PredictConfig {
    functional: Functional,
    transformation: Option<Transformation>,
    custom: Option<Box<dyn CustomFunctional>>,
    mq_estimator: Option<Box<dyn MultivariateQuantileEstimator>>,
    threads: Option<usize>,
}

impl PredictConfig {
    /// Create a config evaluating `functional`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`PredictError::InvalidInput`] | quantile `probs` empty or outside `[0, 1]` |
    /// | [`PredictError::InvalidInput`] | `MQ` ranks empty or not finite |
    pub fn new(functional: Functional) -> Result<Self, PredictError> {
        match &functional {
            Functional::Quantile { probs } => {
                if probs.is_empty() {
                    return Err(PredictError::InvalidInput {
                        reason: "quantile functional needs at least one probability".into(),
                    });
                }
                if let Some(p) = probs.iter().find(|p| !(0.0..=1.0).contains(*p)) {
                    return Err(PredictError::InvalidInput {
                        reason: format!("quantile probability {p} outside [0, 1]"),
                    });
                }
            }
            Functional::MultivariateQuantile { ranks } => {
                if ranks.is_empty() {
                    return Err(PredictError::InvalidInput {
                        reason: "MQ functional needs at least one rank vector".into(),
                    });
                }
                if ranks.iter().flatten().any(|u| !u.is_finite()) {
                    return Err(PredictError::InvalidInput {
                        reason: "MQ rank vectors must be finite".into(),
                    });
                }
            }
            _ => {}
        }
        Ok(Self {
            functional,
            transformation: None,
            custom: None,
            mq_estimator: None,
            threads: None,
        })
    }

    /// Apply `transformation` to every training response row before
    /// evaluating the functional.
    #[must_use]
    pub fn with_transformation<F>(mut self, transformation: F) -> Self
    where
        F: Fn(&[f64]) -> Vec<f64> + Send + Sync + 'static,
    {
        self.transformation = Some(Box::new(transformation));
        self
    }

    /// Supply the statistic evaluated by [`Functional::Custom`].
    #[must_use]
    pub fn with_custom(mut self, custom: impl CustomFunctional + 'static) -> Self {
        self.custom = Some(Box::new(custom));
        self
    }

    /// Supply the estimator used by [`Functional::MultivariateQuantile`].
    #[must_use]
    pub fn with_mq_estimator(
        mut self,
        estimator: impl MultivariateQuantileEstimator + 'static,
    ) -> Self {
        self.mq_estimator = Some(Box::new(estimator));
        self
    }

    /// Set the worker-count hint. Results do not depend on it.
    #[must_use]
    pub fn with_threads(mut self, threads: Option<usize>) -> Self {
        self.threads = threads;
        self
    }

    /// Return the functional.
    #[must_use]
    pub fn functional(&self) -> &Functional {
        &self.functional
    }

    /// Return the transformation, if one was supplied.
    #[must_use]
    pub fn transformation(&self) -> Option<&Transformation> {
        self.transformation.as_ref()
    }

    /// Return the custom functional, if one was supplied.
    #[must_use]
    pub fn custom(&self) -> Option<&dyn CustomFunctional> {
        self.custom.as_deref()
    }

    /// Return the multivariate-quantile estimator, if one was supplied.
    #[must_use]
    pub fn mq_estimator(&self) -> Option<&dyn MultivariateQuantileEstimator> {
        self.mq_estimator.as_deref()
    }

    /// Return the worker-count hint.
    #[must_use]
    pub fn threads(&self) -> Option<usize> {
        self.threads
    }

    /// Weighting config sharing this config's thread hint.
    #[must_use]
    pub fn weights_config(&self) -> WeightsConfig {
        WeightsConfig::new().with_threads(self.threads)
    }
}

impl fmt::Debug for PredictConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredictConfig")
            .field("functional", &self.functional)
            .field("transformation", &self.transformation.is_some())
            .field("custom", &self.custom.is_some())
            .field("mq_estimator", &self.mq_estimator.is_some())
            .field("threads", &self.threads)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::PredictConfig;
    use crate::{Functional, PredictError};

    #[test]
    fn defaults() {
        let config = PredictConfig::new(Functional::Mean).unwrap();
        assert!(config.transformation().is_none());
        assert!(config.custom().is_none());
        assert!(config.mq_estimator().is_none());
        assert_eq!(config.threads(), None);
    }

    #[test]
    fn builder_chain() {
        let config = PredictConfig::new(Functional::Custom)
            .unwrap()
            .with_transformation(|y: &[f64]| vec![y[0] * 2.0])
            .with_custom(|_: &[Vec<f64>], _: &[f64]| vec![0.0])
            .with_threads(Some(2));
        assert!(config.transformation().is_some());
        assert!(config.custom().is_some());
        assert_eq!(config.weights_config().threads(), Some(2));
    }

    #[test]
    fn rejects_bad_probabilities() {
        for probs in [vec![], vec![0.5, 1.5], vec![-0.1]] {
            let err = PredictConfig::new(Functional::Quantile { probs }).unwrap_err();
            assert!(matches!(err, PredictError::InvalidInput { .. }));
        }
    }

    #[test]
    fn rejects_empty_ranks() {
        let err =
            PredictConfig::new(Functional::MultivariateQuantile { ranks: vec![] }).unwrap_err();
        assert!(matches!(err, PredictError::InvalidInput { .. }));
    }

    #[test]
    fn debug_hides_closures() {
        let config = PredictConfig::new(Functional::Mean)
            .unwrap()
            .with_transformation(|y: &[f64]| y.to_vec());
        let shown = format!("{config:?}");
        assert!(shown.contains("transformation: true"));
    }
}
