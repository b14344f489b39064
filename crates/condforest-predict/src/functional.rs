//! The functionals that can be evaluated against forest weights.

use std::fmt;
use std::str::FromStr;

use crate::error::PredictError;

/// The kind of functional, without arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionalKind {
    /// Weighted mean.
    Mean,
    /// Weighted standard deviation.
    Sd,
    /// Weighted quantiles per coordinate.
    Quantile,
    /// Weighted correlation matrix.
    Cor,
    /// Weighted covariance matrix.
    Cov,
    /// User-supplied functional.
    Custom,
    /// Normal-approximation prediction score.
    NormalPredictionScore,
    /// Multivariate quantiles.
    MultivariateQuantile,
}

impl FunctionalKind {
    /// Return the canonical name, as accepted by [`FromStr`].
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::Sd => "sd",
            Self::Quantile => "quantile",
            Self::Cor => "cor",
            Self::Cov => "cov",
            Self::Custom => "custom",
            Self::NormalPredictionScore => "normalPredictionScore",
            Self::MultivariateQuantile => "MQ",
        }
    }
}

impl fmt::Display for FunctionalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FunctionalKind {
    type Err = PredictError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mean" => Ok(Self::Mean),
            "sd" => Ok(Self::Sd),
            "quantile" => Ok(Self::Quantile),
            "cor" => Ok(Self::Cor),
            "cov" => Ok(Self::Cov),
            "custom" => Ok(Self::Custom),
            "normalPredictionScore" => Ok(Self::NormalPredictionScore),
            "MQ" => Ok(Self::MultivariateQuantile),
            other => Err(PredictError::UnknownFunctional {
                name: other.to_string(),
            }),
        }
    }
}

/// A functional together with its arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum Functional {
    /// Weighted mean of each transformed coordinate.
    Mean,
    /// Weighted standard deviation of each transformed coordinate.
    Sd,
    /// Weighted quantiles of each coordinate at probabilities `probs`.
    Quantile {
        /// Probabilities in `[0, 1]`.
        probs: Vec<f64>,
    },
    /// Weighted Pearson correlation matrix.
    Cor,
    /// Weighted covariance matrix.
    Cov,
    /// The custom functional supplied in the config.
    Custom,
    /// Normal-approximation score; needs a one-dimensional response.
    NormalPredictionScore,
    /// Multivariate quantiles at the given ranks, via the configured estimator.
    MultivariateQuantile {
        /// Rank vectors passed to the estimator.
        ranks: Vec<Vec<f64>>,
    },
}

impl Functional {
    /// Build a functional of `kind`, taking `probs` for quantiles and `ranks`
    /// for multivariate quantiles; other kinds ignore both.
    #[must_use]
    pub fn from_kind(kind: FunctionalKind, probs: Vec<f64>, ranks: Vec<Vec<f64>>) -> Self {
        match kind {
            FunctionalKind::Mean => Self::Mean,
            FunctionalKind::Sd => Self::Sd,
            FunctionalKind::Quantile => Self::Quantile { probs },
            FunctionalKind::Cor => Self::Cor,
            FunctionalKind::Cov => Self::Cov,
            FunctionalKind::Custom => Self::Custom,
            FunctionalKind::NormalPredictionScore => Self::NormalPredictionScore,
            FunctionalKind::MultivariateQuantile => Self::MultivariateQuantile { ranks },
        }
    }

    /// Return the argument-free kind.
    #[must_use]
    pub fn kind(&self) -> FunctionalKind {
        match self {
            Self::Mean => FunctionalKind::Mean,
            Self::Sd => FunctionalKind::Sd,
            Self::Quantile { .. } => FunctionalKind::Quantile,
            Self::Cor => FunctionalKind::Cor,
            Self::Cov => FunctionalKind::Cov,
            Self::Custom => FunctionalKind::Custom,
            Self::NormalPredictionScore => FunctionalKind::NormalPredictionScore,
            Self::MultivariateQuantile { .. } => FunctionalKind::MultivariateQuantile,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Functional, FunctionalKind};
    use crate::PredictError;

    #[test]
    fn names_round_trip() {
        for kind in [
            FunctionalKind::Mean,
            FunctionalKind::Sd,
            FunctionalKind::Quantile,
            FunctionalKind::Cor,
            FunctionalKind::Cov,
            FunctionalKind::Custom,
            FunctionalKind::NormalPredictionScore,
            FunctionalKind::MultivariateQuantile,
        ] {
            assert_eq!(kind.name().parse::<FunctionalKind>().unwrap(), kind);
        }
    }

    #[test]
    fn unknown_name_rejected() {
        let err = "median".parse::<FunctionalKind>().unwrap_err();
        assert!(matches!(err, PredictError::UnknownFunctional { name } if name == "median"));
    }

    #[test]
    fn names_are_case_sensitive() {
        assert!("Mean".parse::<FunctionalKind>().is_err());
        assert!("mq".parse::<FunctionalKind>().is_err());
    }

    #[test]
    fn from_kind_keeps_arguments() {
        let f = Functional::from_kind(FunctionalKind::Quantile, vec![0.1, 0.9], vec![]);
        assert_eq!(f, Functional::Quantile { probs: vec![0.1, 0.9] });
        assert_eq!(f.kind(), FunctionalKind::Quantile);
    }
}
