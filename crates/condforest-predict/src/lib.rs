//! Conditional functionals and MMD variable importance over forest weights.
//!
//! Turns the per-query weight vectors of a [`condforest_forest::Forest`] into
//! statistics of the conditional response distribution (means, standard
//! deviations, quantiles, correlation and covariance matrices, normal
//! prediction scores, custom statistics, multivariate quantiles) and scores
//! features by the kernel MMD their removal induces.

mod capability;
mod config;
mod engine;
mod error;
mod functional;
mod mmd;
mod result;
#[cfg(test)]
mod testing;

pub use capability::{
    CoordinatewiseQuantiles, CustomFunctional, MultivariateQuantileEstimator, Transformation,
};
pub use config::PredictConfig;
pub use engine::{predict, predict_with_weights};
pub use error::PredictError;
pub use functional::{Functional, FunctionalKind};
pub use mmd::{
    FeaturePermutation, ImportanceType, MmdImportance, MmdImportanceConfig, PerturbationStrategy,
    mmd_importance, mmd_importance_with,
};
pub use result::{FunctionalResult, NormalScore};
