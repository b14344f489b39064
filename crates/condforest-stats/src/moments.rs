//! Weighted moments of multivariate samples.
//!
//! Every function takes row-major `rows[sample][coordinate]` and one weight
//! per row. Weights are normalized by their sum, so callers may pass either a
//! probability vector or raw non-negative weights.

use crate::error::StatsError;

/// Validate `weights` against `rows` and return `(total_weight, dimension)`.
fn check(rows: &[Vec<f64>], weights: &[f64]) -> Result<(f64, usize), StatsError> {
    if rows.is_empty() {
        return Err(StatsError::invalid("no samples"));
    }
    if rows.len() != weights.len() {
        return Err(StatsError::invalid(format!(
            "{} samples but {} weights",
            rows.len(),
            weights.len()
        )));
    }
    let dim = rows[0].len();
    if let Some(row) = rows.iter().position(|r| r.len() != dim) {
        return Err(StatsError::invalid(format!(
            "sample {row} has {} coordinates, expected {dim}",
            rows[row].len()
        )));
    }
    if let Some(&w) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
        return Err(StatsError::invalid(format!(
            "weights must be finite and non-negative, got {w}"
        )));
    }
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return Err(StatsError::invalid("all weights are zero"));
    }
    Ok((total, dim))
}

/// Weighted mean of each coordinate.
///
/// # Errors
///
/// Returns [`StatsError::InvalidInput`] for empty input, ragged rows,
/// mismatched lengths, or invalid weights.
pub fn weighted_mean(rows: &[Vec<f64>], weights: &[f64]) -> Result<Vec<f64>, StatsError> {
    let (total, dim) = check(rows, weights)?;
    let mut mean = vec![0.0; dim];
    for (row, &w) in rows.iter().zip(weights) {
        for (m, &y) in mean.iter_mut().zip(row) {
            *m += w * y;
        }
    }
    mean.iter_mut().for_each(|m| *m /= total);
    Ok(mean)
}

/// Weighted covariance matrix `Σ w (y_a - μ_a)(y_b - μ_b) / Σ w`.
///
/// # Errors
///
/// Same conditions as [`weighted_mean`].
pub fn weighted_covariance(
    rows: &[Vec<f64>],
    weights: &[f64],
) -> Result<Vec<Vec<f64>>, StatsError> {
    let (total, dim) = check(rows, weights)?;
    let mean = weighted_mean(rows, weights)?;
    let mut cov = vec![vec![0.0; dim]; dim];
    for (row, &w) in rows.iter().zip(weights) {
        if w == 0.0 {
            continue;
        }
        for a in 0..dim {
            let da = row[a] - mean[a];
            for b in a..dim {
                cov[a][b] += w * da * (row[b] - mean[b]);
            }
        }
    }
    for a in 0..dim {
        for b in a..dim {
            cov[a][b] /= total;
            cov[b][a] = cov[a][b];
        }
    }
    Ok(cov)
}

/// Weighted standard deviation of each coordinate.
///
/// The square root of the diagonal of [`weighted_covariance`].
///
/// # Errors
///
/// Same conditions as [`weighted_mean`].
pub fn weighted_sd(rows: &[Vec<f64>], weights: &[f64]) -> Result<Vec<f64>, StatsError> {
    let (total, dim) = check(rows, weights)?;
    let mean = weighted_mean(rows, weights)?;
    let mut var = vec![0.0; dim];
    for (row, &w) in rows.iter().zip(weights) {
        for ((v, &y), &m) in var.iter_mut().zip(row).zip(&mean) {
            *v += w * (y - m) * (y - m);
        }
    }
    Ok(var.iter().map(|v| (v / total).max(0.0).sqrt()).collect())
}

/// Weighted Pearson correlation matrix.
///
/// Entries involving a coordinate with zero weighted variance are NaN, except
/// the diagonal, which is always 1.
///
/// # Errors
///
/// Same conditions as [`weighted_mean`].
pub fn weighted_correlation(
    rows: &[Vec<f64>],
    weights: &[f64],
) -> Result<Vec<Vec<f64>>, StatsError> {
    let cov = weighted_covariance(rows, weights)?;
    let dim = cov.len();
    let sd: Vec<f64> = (0..dim).map(|a| cov[a][a].max(0.0).sqrt()).collect();
    let cor = (0..dim)
        .map(|a| {
            (0..dim)
                .map(|b| {
                    if a == b {
                        1.0
                    } else if sd[a] > 0.0 && sd[b] > 0.0 {
                        (cov[a][b] / (sd[a] * sd[b])).clamp(-1.0, 1.0)
                    } else {
                        f64::NAN
                    }
                })
                .collect()
        })
        .collect();
    Ok(cor)
}

/// Kish effective sample size `(Σ w)² / Σ w²`.
///
/// Returns 0 when every weight is zero.
#[must_use]
pub fn effective_sample_size(weights: &[f64]) -> f64 {
    let sum: f64 = weights.iter().sum();
    let sum_sq: f64 = weights.iter().map(|w| w * w).sum();
    if sum_sq > 0.0 { sum * sum / sum_sq } else { 0.0 }
}
