use condforest_forest::ForestError;
use condforest_stats::StatsError;

/// Errors from functional evaluation and MMD importance.
#[derive(Debug, thiserror::Error)]
pub enum PredictError {
    /// Wraps a forest error (schema mismatch, out-of-bag failures, ...).
    #[error(transparent)]
    Forest(#[from] ForestError),

    /// Wraps a weighted-statistics error (invalid weights or probabilities).
    #[error(transparent)]
    Stats(#[from] StatsError),

    /// Returned when a functional name is not recognized.
    #[error("unknown functional \"{name}\" (expected one of mean, sd, quantile, cor, cov, custom, normalPredictionScore, MQ)")]
    UnknownFunctional {
        /// The unrecognized name.
        name: String,
    },

    /// Returned when a functional needs a capability that was not supplied.
    #[error("functional {functional} requires a {capability}, but none was supplied")]
    MissingCapability {
        /// The requested functional.
        functional: &'static str,
        /// The missing capability.
        capability: &'static str,
    },

    /// Returned when the transformed response has the wrong dimension.
    #[error("{context}: expected response dimension {expected}, got {got}")]
    DimensionMismatch {
        /// What required the dimension.
        context: &'static str,
        /// The required dimension.
        expected: usize,
        /// The dimension found.
        got: usize,
    },

    /// Returned for malformed arguments not covered by a more specific variant.
    #[error("invalid input: {reason}")]
    InvalidInput {
        /// Human-readable description.
        reason: String,
    },
}
