//! Gaussian kernel, median-heuristic bandwidth, and weighted MMD.

use crate::error::StatsError;

/// Squared Euclidean distance between two equal-length rows.
fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Gaussian (RBF) kernel `k(a, b) = exp(-‖a - b‖² / (2h²))`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianKernel {
    bandwidth: f64,
}

impl GaussianKernel {
    /// Create a kernel with bandwidth `h`.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::InvalidInput`] unless `bandwidth` is finite and
    /// strictly positive.
    pub fn new(bandwidth: f64) -> Result<Self, StatsError> {
        if !bandwidth.is_finite() || bandwidth <= 0.0 {
            return Err(StatsError::invalid(format!(
                "kernel bandwidth must be finite and positive, got {bandwidth}"
            )));
        }
        Ok(Self { bandwidth })
    }

    /// Return the bandwidth.
    #[must_use]
    pub fn bandwidth(&self) -> f64 {
        self.bandwidth
    }

    /// Evaluate the kernel on two rows.
    #[must_use]
    pub fn eval(&self, a: &[f64], b: &[f64]) -> f64 {
        (-squared_distance(a, b) / (2.0 * self.bandwidth * self.bandwidth)).exp()
    }
}

/// Median-heuristic bandwidth: the median over all pairs `i < j` of
/// `sqrt(‖Y_i - Y_j‖ / 2)`.
///
/// With an even number of pairs the two middle values are averaged.
///
/// # Errors
///
/// Returns [`StatsError::InvalidInput`] with fewer than two rows or ragged rows.
pub fn median_heuristic(rows: &[Vec<f64>]) -> Result<f64, StatsError> {
    if rows.len() < 2 {
        return Err(StatsError::invalid(format!(
            "median heuristic needs at least 2 rows, got {}",
            rows.len()
        )));
    }
    let dim = rows[0].len();
    if rows.iter().any(|r| r.len() != dim) {
        return Err(StatsError::invalid("rows have inconsistent lengths"));
    }

    let mut scaled: Vec<f64> = Vec::with_capacity(rows.len() * (rows.len() - 1) / 2);
    for (i, a) in rows.iter().enumerate() {
        for b in &rows[i + 1..] {
            scaled.push((squared_distance(a, b).sqrt() / 2.0).sqrt());
        }
    }
    scaled.sort_by(f64::total_cmp);

    let mid = scaled.len() / 2;
    let median = if scaled.len() % 2 == 1 {
        scaled[mid]
    } else {
        0.5 * (scaled[mid - 1] + scaled[mid])
    };
    Ok(median)
}

/// Squared maximum mean discrepancy between two weightings of the same sample.
///
/// With `d = w_a - w_b` this is `dᵀ K d`, where `K` is the kernel Gram matrix
/// of `rows`. Only rows where the weightings differ are visited. The result
/// is clamped at zero against rounding.
///
/// # Errors
///
/// Returns [`StatsError::InvalidInput`] when the weight vectors do not match
/// the number of rows.
pub fn mmd_squared(
    kernel: &GaussianKernel,
    rows: &[Vec<f64>],
    w_a: &[f64],
    w_b: &[f64],
) -> Result<f64, StatsError> {
    if w_a.len() != rows.len() || w_b.len() != rows.len() {
        return Err(StatsError::invalid(format!(
            "weightings of length {} and {} for {} rows",
            w_a.len(),
            w_b.len(),
            rows.len()
        )));
    }
    let diff: Vec<(usize, f64)> = w_a
        .iter()
        .zip(w_b)
        .map(|(a, b)| a - b)
        .enumerate()
        .filter(|(_, d)| *d != 0.0)
        .collect();

    let mut total = 0.0;
    for (pos, &(i, di)) in diff.iter().enumerate() {
        total += di * di;
        for &(j, dj) in &diff[pos + 1..] {
            total += 2.0 * di * dj * kernel.eval(&rows[i], &rows[j]);
        }
    }
    Ok(total.max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_is_one_on_diagonal() {
        let k = GaussianKernel::new(0.7).unwrap();
        assert!((k.eval(&[1.0, 2.0], &[1.0, 2.0]) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn kernel_value() {
        let k = GaussianKernel::new(1.0).unwrap();
        assert!((k.eval(&[0.0], &[2.0]) - (-2.0f64).exp()).abs() < 1e-12);
    }

    #[test]
    fn invalid_bandwidth_rejected() {
        assert!(GaussianKernel::new(0.0).is_err());
        assert!(GaussianKernel::new(f64::NAN).is_err());
    }

    #[test]
    fn median_heuristic_three_points() {
        // Distances 2, 8, 6 -> sqrt(d / 2) = 1, 2, sqrt(3); median sqrt(3).
        let rows = vec![vec![0.0], vec![2.0], vec![8.0]];
        let h = median_heuristic(&rows).unwrap();
        assert!((h - 3.0f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn median_heuristic_even_pair_count() {
        // 4 points on a line -> 6 pairs; distances 2,2,2,4,4,6 scaled are
        // 1,1,1,sqrt2,sqrt2,sqrt3; middle pair (1, sqrt2).
        let rows = vec![vec![0.0], vec![2.0], vec![4.0], vec![6.0]];
        let h = median_heuristic(&rows).unwrap();
        assert!((h - 0.5 * (1.0 + 2.0f64.sqrt())).abs() < 1e-12);
    }

    #[test]
    fn median_heuristic_needs_two_rows() {
        assert!(median_heuristic(&[vec![1.0]]).is_err());
    }

    #[test]
    fn mmd_of_identical_weightings_is_zero() {
        let k = GaussianKernel::new(1.0).unwrap();
        let rows = vec![vec![0.0], vec![1.0], vec![5.0]];
        let w = [0.2, 0.3, 0.5];
        assert_eq!(mmd_squared(&k, &rows, &w, &w).unwrap(), 0.0);
    }

    #[test]
    fn mmd_of_point_masses() {
        // Two point masses: 2 - 2 k(a, b).
        let k = GaussianKernel::new(1.0).unwrap();
        let rows = vec![vec![0.0], vec![2.0]];
        let mmd = mmd_squared(&k, &rows, &[1.0, 0.0], &[0.0, 1.0]).unwrap();
        assert!((mmd - (2.0 - 2.0 * (-2.0f64).exp())).abs() < 1e-12);
    }

    #[test]
    fn mmd_length_mismatch_rejected() {
        let k = GaussianKernel::new(1.0).unwrap();
        assert!(mmd_squared(&k, &[vec![0.0]], &[1.0, 0.0], &[1.0]).is_err());
    }
}
