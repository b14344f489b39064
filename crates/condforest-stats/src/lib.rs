//! Weighted statistics for forest-induced response distributions.
//!
//! Pure math library with zero I/O. Provides the interpolated weighted
//! quantile estimator, weighted moments (mean, standard deviation,
//! covariance, correlation), the Gaussian-kernel maximum mean discrepancy
//! with its median-heuristic bandwidth, and a normal-approximation helper.

mod error;
mod kernel;
mod moments;
mod normal;
mod quantile;

pub use error::StatsError;
pub use kernel::{GaussianKernel, median_heuristic, mmd_squared};
pub use moments::{
    effective_sample_size, weighted_correlation, weighted_covariance, weighted_mean,
    weighted_sd,
};
pub use normal::{erf, normal_cdf};
pub use quantile::weighted_quantile;
