//! Forest weights: per-query distributions over training rows.

use std::collections::BTreeMap;

use rayon::iter::{
    IndexedParallelIterator, IntoParallelIterator, IntoParallelRefIterator, ParallelIterator,
};
use tracing::{info, instrument};

use crate::error::ForestError;
use crate::forest::Forest;
use crate::parallel::with_thread_hint;

/// A sparse probability distribution over training rows.
///
/// Entries are `(zero-based row, weight)` pairs sorted by row; rows absent
/// from every reached leaf are omitted and have weight 0.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct WeightVector {
    entries: Vec<(usize, f64)>,
}

impl WeightVector {
    /// Build a weight vector from `(row, weight)` pairs.
    ///
    /// Pairs are sorted by row and zero weights dropped; weights of repeated
    /// rows are summed.
    #[must_use]
    pub fn from_pairs(pairs: impl IntoIterator<Item = (usize, f64)>) -> Self {
        let mut acc: BTreeMap<usize, f64> = BTreeMap::new();
        for (row, w) in pairs {
            *acc.entry(row).or_insert(0.0) += w;
        }
        Self {
            entries: acc.into_iter().filter(|(_, w)| *w != 0.0).collect(),
        }
    }

    /// Return the non-zero `(row, weight)` entries sorted by row.
    #[must_use]
    pub fn entries(&self) -> &[(usize, f64)] {
        &self.entries
    }

    /// Return the weight of `row` (0 if absent).
    #[must_use]
    pub fn get(&self, row: usize) -> f64 {
        self.entries
            .binary_search_by_key(&row, |(r, _)| *r)
            .map_or(0.0, |i| self.entries[i].1)
    }

    /// Return the sum of all weights.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.entries.iter().map(|(_, w)| w).sum()
    }

    /// Return the number of rows with non-zero weight.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Return `true` if no row carries weight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Expand to a dense vector of length `n_rows`.
    #[must_use]
    pub fn to_dense(&self, n_rows: usize) -> Vec<f64> {
        let mut dense = vec![0.0; n_rows];
        for &(row, w) in &self.entries {
            dense[row] = w;
        }
        dense
    }
}

/// Configuration for forest weighting.
///
/// # Defaults
///
/// | Parameter | Default |
/// |-----------|---------|
/// | `threads` | `None` (global rayon pool) |
#[derive(Debug, Clone, Default)]
pub struct WeightsConfig {
    pub(crate) threads: Option<usize>,
}

impl WeightsConfig {
    /// Create a config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the worker-count hint. Results do not depend on it.
    #[must_use]
    pub fn with_threads(mut self, threads: Option<usize>) -> Self {
        self.threads = threads;
        self
    }

    /// Return the worker-count hint.
    #[must_use]
    pub fn threads(&self) -> Option<usize> {
        self.threads
    }
}

/// Combine the leaves reached in contributing trees into one weight vector.
///
/// Each non-empty leaf spreads `1 / |leaf|` over its rows; the sum is divided
/// by the number of contributing trees. Trees are visited in forest order so
/// the floating-point sums are reproducible.
fn combine_leaves<'a>(
    row: usize,
    leaves: impl Iterator<Item = &'a [usize]>,
) -> Result<WeightVector, ForestError> {
    let mut acc: BTreeMap<usize, f64> = BTreeMap::new();
    let mut n_contributing = 0usize;
    for samples in leaves {
        if samples.is_empty() {
            continue;
        }
        let share = 1.0 / samples.len() as f64;
        for &sample in samples {
            *acc.entry(sample).or_insert(0.0) += share;
        }
        n_contributing += 1;
    }
    if n_contributing == 0 {
        return Err(ForestError::InsufficientObservations { row });
    }
    let n = n_contributing as f64;
    Ok(WeightVector {
        entries: acc.into_iter().map(|(r, w)| (r, w / n)).collect(),
    })
}

impl Forest {
    /// Compute one weight vector per query row, or per training row in
    /// out-of-bag mode when `newdata` is `None`.
    ///
    /// In out-of-bag mode training row `i` is routed with its own features
    /// through the trees that did not draw it.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ForestError::SchemaMismatch`] | a query row has the wrong feature count |
    /// | [`ForestError::InsufficientObservations`] | a row receives weight from no tree (out-of-bag: every tree drew it) |
    /// | [`ForestError::ThreadPool`] | the thread hint could not be honoured |
    pub fn weights(
        &self,
        newdata: Option<&[Vec<f64>]>,
        config: &WeightsConfig,
    ) -> Result<Vec<WeightVector>, ForestError> {
        match newdata {
            Some(rows) => self.query_weights(rows, config),
            None => self.oob_weights(config),
        }
    }

    /// Weight vectors for new query rows.
    ///
    /// # Errors
    ///
    /// See [`Forest::weights`].
    #[instrument(skip_all, fields(n_queries = rows.len(), n_trees = self.n_trees()))]
    pub fn query_weights(
        &self,
        rows: &[Vec<f64>],
        config: &WeightsConfig,
    ) -> Result<Vec<WeightVector>, ForestError> {
        self.check_query(rows)?;
        let weights = with_thread_hint(config.threads, || {
            rows.par_iter()
                .enumerate()
                .map(|(row, x)| {
                    combine_leaves(row, self.trees.iter().map(|t| t.leaf_samples_for(x)))
                })
                .collect::<Result<Vec<_>, _>>()
        })??;
        info!(n_queries = weights.len(), "query weights computed");
        Ok(weights)
    }

    /// Out-of-bag weight vectors for every training row.
    ///
    /// # Errors
    ///
    /// See [`Forest::weights`].
    #[instrument(skip_all, fields(n_rows = self.n_rows(), n_trees = self.n_trees()))]
    pub fn oob_weights(&self, config: &WeightsConfig) -> Result<Vec<WeightVector>, ForestError> {
        let weights = with_thread_hint(config.threads, || {
            (0..self.n_rows())
                .into_par_iter()
                .map(|row| {
                    let x = &self.features[row];
                    combine_leaves(
                        row,
                        self.trees
                            .iter()
                            .filter(|t| !t.was_drawn(row))
                            .map(|t| t.leaf_samples_for(x)),
                    )
                })
                .collect::<Result<Vec<_>, _>>()
        })??;
        info!(n_rows = weights.len(), "out-of-bag weights computed");
        Ok(weights)
    }
}

#[cfg(test)]
mod tests {
    use super::{WeightVector, WeightsConfig};
    use crate::{Forest, ForestError, TreeArrays};
    use crate::testing::{six_row_forest, stump_forest};

    // --- WeightVector ---

    #[test]
    fn from_pairs_sorts_and_merges() {
        let w = WeightVector::from_pairs([(3, 0.25), (1, 0.5), (3, 0.25), (2, 0.0)]);
        assert_eq!(w.entries(), &[(1, 0.5), (3, 0.5)]);
        assert_eq!(w.get(2), 0.0);
        assert_eq!(w.to_dense(4), vec![0.0, 0.5, 0.0, 0.5]);
    }

    // --- Query mode ---

    #[test]
    fn stump_left_leaf_gets_uniform_weight() {
        let forest = stump_forest();
        let w = forest
            .weights(Some(&[vec![-5.0, 0.0]]), &WeightsConfig::new())
            .unwrap();
        assert_eq!(w.len(), 1);
        assert_eq!(w[0].entries(), &[(0, 0.5), (1, 0.5)]);
        assert_eq!(w[0].get(2), 0.0);
        assert_eq!(w[0].get(3), 0.0);
    }

    #[test]
    fn weights_average_over_trees() {
        let forest = six_row_forest();
        // Tree 1 -> leaf {1, 2}; tree 2 (X2 = 3 > 1) -> leaf {2, 5}.
        let w = forest
            .weights(Some(&[vec![-1.0, 3.0]]), &WeightsConfig::new())
            .unwrap();
        assert_eq!(w[0].entries(), &[(1, 0.25), (2, 0.5), (5, 0.25)]);
        assert!((w[0].total() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn schema_mismatch() {
        let err = stump_forest()
            .weights(Some(&[vec![1.0]]), &WeightsConfig::new())
            .unwrap_err();
        assert!(matches!(err, ForestError::SchemaMismatch { expected: 2, got: 1, row: 0 }));
    }

    #[test]
    fn thread_hint_does_not_change_results() {
        let forest = six_row_forest();
        let queries: Vec<Vec<f64>> = (0..20)
            .map(|i| vec![i as f64 * 0.3 - 3.0, (i % 5) as f64 * 0.5])
            .collect();
        let global = forest.weights(Some(&queries), &WeightsConfig::new()).unwrap();
        let single = forest
            .weights(Some(&queries), &WeightsConfig::new().with_threads(Some(1)))
            .unwrap();
        let quad = forest
            .weights(Some(&queries), &WeightsConfig::new().with_threads(Some(4)))
            .unwrap();
        assert_eq!(global, single);
        assert_eq!(global, quad);
    }

    /// Stump over the four `stump_forest` rows whose right leaf is empty.
    fn stump_with_empty_right_leaf() -> TreeArrays {
        TreeArrays {
            root: 0,
            left_children: vec![1, 0, 0],
            right_children: vec![2, 0, 0],
            split_variables: vec![0, 0, 0],
            split_values: vec![0.0, 0.0, 0.0],
            leaf_samples: vec![vec![], vec![0, 1], vec![]],
            drawn_samples: vec![0, 1],
        }
    }

    #[test]
    fn empty_reached_leaf_is_left_out_of_the_average() {
        let base = stump_forest();
        let forest = Forest::new(
            vec![crate::testing::stump_tree(), stump_with_empty_right_leaf()],
            base.features().to_vec(),
            base.responses().to_vec(),
        )
        .unwrap();
        // Tree 1 -> leaf {2, 3}; tree 2 -> empty leaf, so only tree 1 counts.
        let w = forest
            .weights(Some(&[vec![5.0, 0.0]]), &WeightsConfig::new())
            .unwrap();
        assert_eq!(w[0].entries(), &[(2, 0.5), (3, 0.5)]);
        assert!((w[0].total() - 1.0).abs() < 1e-12);

        // Both trees reach non-empty leaves on the left.
        let w = forest
            .weights(Some(&[vec![-5.0, 0.0]]), &WeightsConfig::new())
            .unwrap();
        assert_eq!(w[0].entries(), &[(0, 0.5), (1, 0.5)]);
    }

    #[test]
    fn every_reached_leaf_empty_fails() {
        let base = stump_forest();
        let forest = Forest::new(
            vec![stump_with_empty_right_leaf(), stump_with_empty_right_leaf()],
            base.features().to_vec(),
            base.responses().to_vec(),
        )
        .unwrap();
        let err = forest
            .weights(Some(&[vec![-5.0, 0.0], vec![5.0, 0.0]]), &WeightsConfig::new())
            .unwrap_err();
        assert!(matches!(err, ForestError::InsufficientObservations { row: 1 }));
    }

    // --- Out-of-bag mode ---

    #[test]
    fn oob_fails_for_row_drawn_by_every_tree() {
        // Rows 0, 2, 4, 5 are drawn by both trees.
        let err = six_row_forest().weights(None, &WeightsConfig::new()).unwrap_err();
        assert!(matches!(err, ForestError::InsufficientObservations { .. }));
    }

    #[test]
    fn oob_uses_only_trees_that_did_not_draw_the_row() {
        let forest = six_row_forest().select_trees(|i| i == 1).unwrap();
        // The single tree drew {0, 2, 4, 5}, leaving those rows with no tree.
        let err = forest.oob_weights(&WeightsConfig::new()).unwrap_err();
        assert!(matches!(
            err,
            ForestError::InsufficientObservations { row: 0 | 2 | 4 | 5 }
        ));
    }

    fn single_leaf(rows: Vec<usize>) -> TreeArrays {
        TreeArrays {
            root: 0,
            left_children: vec![0],
            right_children: vec![0],
            split_variables: vec![0],
            split_values: vec![0.0],
            leaf_samples: vec![rows.clone()],
            drawn_samples: rows,
        }
    }

    #[test]
    fn oob_routes_held_out_rows() {
        let base = six_row_forest();
        let forest = Forest::new(
            vec![single_leaf(vec![3, 4, 5]), single_leaf(vec![0, 1, 2])],
            base.features().to_vec(),
            base.responses().to_vec(),
        )
        .unwrap();
        let w = forest.oob_weights(&WeightsConfig::new()).unwrap();
        assert_eq!(w.len(), 6);
        let third = 1.0 / 3.0;
        for (row, weights) in w.iter().enumerate() {
            let expected = if row < 3 {
                [(3, third), (4, third), (5, third)]
            } else {
                [(0, third), (1, third), (2, third)]
            };
            assert_eq!(weights.entries(), &expected);
            assert_eq!(weights.get(row), 0.0);
        }
    }
}
