//! Error types for weighted statistics.

/// Errors from weighted statistic computation.
#[derive(Debug, thiserror::Error)]
pub enum StatsError {
    /// Returned when values, weights, or probabilities are malformed.
    #[error("invalid input: {reason}")]
    InvalidInput {
        /// Human-readable description of the malformed input.
        reason: String,
    },
}

impl StatsError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }
}
