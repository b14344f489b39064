//! Interpolated weighted quantiles.

use crate::error::StatsError;

/// Compute weighted quantiles of `values` at each probability in `probs`.
///
/// Pairs whose value or weight is NaN are treated as missing and dropped.
/// The remaining pairs are stably sorted by value and the normalized
/// cumulative weight `F(i)` is formed. For a probability `p`, let `left` be
/// the last support point with `F(left) <= p`:
///
/// - no such point: the smallest value is returned;
/// - `F(left) == p`, or `left` is the last point: `values[left]`;
/// - otherwise the result interpolates linearly towards `values[left + 1]`
///   by `(p - F(left)) / (F(left + 1) - F(left))`, keeping `values[left]`
///   when the interpolated value is not finite.
///
/// # Errors
///
/// Returns [`StatsError::InvalidInput`] when the slices differ in length, a
/// weight is negative or infinite, every remaining weight is zero, or a
/// probability lies outside `[0, 1]`.
pub fn weighted_quantile(
    values: &[f64],
    weights: &[f64],
    probs: &[f64],
) -> Result<Vec<f64>, StatsError> {
    if values.len() != weights.len() {
        return Err(StatsError::invalid(format!(
            "{} values but {} weights",
            values.len(),
            weights.len()
        )));
    }
    if let Some(&p) = probs.iter().find(|p| !(0.0..=1.0).contains(*p)) {
        return Err(StatsError::invalid(format!(
            "probability {p} is outside [0, 1]"
        )));
    }

    let mut pairs: Vec<(f64, f64)> = values
        .iter()
        .zip(weights)
        .filter(|(v, w)| !v.is_nan() && !w.is_nan())
        .map(|(&v, &w)| (v, w))
        .collect();

    if let Some(&(_, w)) = pairs.iter().find(|(_, w)| *w < 0.0 || w.is_infinite()) {
        return Err(StatsError::invalid(format!(
            "weights must be finite and non-negative, got {w}"
        )));
    }
    let total: f64 = pairs.iter().map(|(_, w)| w).sum();
    if total <= 0.0 {
        return Err(StatsError::invalid("all weights are zero"));
    }

    // `sort_by` is stable: tied values keep their input order.
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut cumulative = 0.0;
    let cdf: Vec<f64> = pairs
        .iter()
        .map(|(_, w)| {
            cumulative += w;
            cumulative / total
        })
        .collect();
    let last = pairs.len() - 1;

    let quantiles = probs
        .iter()
        .map(|&p| {
            let n_below = cdf.partition_point(|&f| f <= p);
            if n_below == 0 {
                return pairs[0].0;
            }
            let left = n_below - 1;
            if cdf[left] == p || left == last {
                return pairs[left].0;
            }
            let fraction = (p - cdf[left]) / (cdf[left + 1] - cdf[left]);
            let interpolated = pairs[left].0 + fraction * (pairs[left + 1].0 - pairs[left].0);
            if interpolated.is_finite() {
                interpolated
            } else {
                pairs[left].0
            }
        })
        .collect();

    Ok(quantiles)
}

#[cfg(test)]
mod tests {
    use rand::Rng;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::weighted_quantile;
    use crate::StatsError;

    fn assert_close(got: &[f64], expected: &[f64]) {
        assert_eq!(got.len(), expected.len());
        for (g, e) in got.iter().zip(expected) {
            assert!((g - e).abs() < 1e-12, "got {got:?}, expected {expected:?}");
        }
    }

    // --- Pinned values ---

    #[test]
    fn equal_weights_pinned_values() {
        let q = weighted_quantile(&[1.0, 2.0, 3.0, 4.0], &[1.0; 4], &[0.0, 0.5, 1.0]).unwrap();
        assert_close(&q, &[1.0, 2.0, 4.0]);
    }

    #[test]
    fn interpolates_between_support_points() {
        let q = weighted_quantile(&[1.0, 2.0, 3.0, 4.0], &[1.0; 4], &[0.6, 0.125]).unwrap();
        // F = [0.25, 0.5, 0.75, 1.0]; 0.6 sits 40% of the way from 2 to 3.
        // 0.125 is below F(1), so the smallest value is returned.
        assert_close(&q, &[2.4, 1.0]);
    }

    #[test]
    fn unequal_weights() {
        // Sorted: 1 (w=3), 5 (w=1) -> F = [0.75, 1.0]
        let q = weighted_quantile(&[5.0, 1.0], &[1.0, 3.0], &[0.5, 0.75, 0.875]).unwrap();
        assert_close(&q, &[1.0, 1.0, 3.0]);
    }

    #[test]
    fn unsorted_input_is_sorted_first() {
        let q = weighted_quantile(&[4.0, 1.0, 3.0, 2.0], &[1.0; 4], &[0.5]).unwrap();
        assert_close(&q, &[2.0]);
    }

    // --- Properties ---

    #[test]
    fn equal_weights_match_empirical_quantile_on_grid() {
        let values = [9.0, 3.0, 7.0, 1.0, 5.0];
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let n = values.len();
        let probs: Vec<f64> = (1..=n).map(|k| k as f64 / n as f64).collect();
        let q = weighted_quantile(&values, &[2.5; 5], &probs).unwrap();
        assert_close(&q, &sorted);
    }

    #[test]
    fn monotone_in_probability() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let values: Vec<f64> = (0..50).map(|_| rng.gen_range(-10.0..10.0)).collect();
        let weights: Vec<f64> = (0..50).map(|_| rng.gen_range(0.0..1.0)).collect();
        let probs: Vec<f64> = (0..=100).map(|k| k as f64 / 100.0).collect();
        let q = weighted_quantile(&values, &weights, &probs).unwrap();
        for pair in q.windows(2) {
            assert!(pair[0] <= pair[1], "not monotone: {pair:?}");
        }
    }

    // --- Missing values and fallbacks ---

    #[test]
    fn nan_pairs_are_dropped() {
        let q = weighted_quantile(
            &[1.0, f64::NAN, 2.0, 3.0],
            &[1.0, 1.0, f64::NAN, 1.0],
            &[0.5, 1.0],
        )
        .unwrap();
        assert_close(&q, &[1.0, 3.0]);
    }

    #[test]
    fn non_finite_interpolation_falls_back_to_left() {
        let q = weighted_quantile(&[1.0, f64::INFINITY], &[1.0, 1.0], &[0.75]).unwrap();
        assert_close(&q, &[1.0]);
    }

    // --- Errors ---

    #[test]
    fn negative_weight_rejected() {
        let err = weighted_quantile(&[1.0, 2.0], &[1.0, -0.5], &[0.5]).unwrap_err();
        assert!(matches!(err, StatsError::InvalidInput { .. }));
    }

    #[test]
    fn all_zero_weights_rejected() {
        let err = weighted_quantile(&[1.0, 2.0], &[0.0, 0.0], &[0.5]).unwrap_err();
        assert!(matches!(err, StatsError::InvalidInput { .. }));
    }

    #[test]
    fn all_missing_rejected() {
        let err = weighted_quantile(&[f64::NAN], &[1.0], &[0.5]).unwrap_err();
        assert!(matches!(err, StatsError::InvalidInput { .. }));
    }

    #[test]
    fn probability_out_of_range_rejected() {
        let err = weighted_quantile(&[1.0], &[1.0], &[1.5]).unwrap_err();
        assert!(matches!(err, StatsError::InvalidInput { .. }));
    }

    #[test]
    fn length_mismatch_rejected() {
        assert!(weighted_quantile(&[1.0, 2.0], &[1.0], &[0.5]).is_err());
    }
}
