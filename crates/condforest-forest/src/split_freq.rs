//! Split counts per depth and feature across the forest.

use std::collections::VecDeque;

use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use tracing::{debug, instrument};

use crate::error::ForestError;
use crate::forest::Forest;
use crate::node::Node;
use crate::tree::Tree;

/// Split counts indexed by depth (root = depth 1) and feature.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SplitFrequencies {
    counts: Vec<Vec<usize>>,
}

impl SplitFrequencies {
    /// Return the count matrix: `counts()[depth - 1][feature]`.
    #[must_use]
    pub fn counts(&self) -> &[Vec<usize>] {
        &self.counts
    }

    /// Return how often `feature` (zero-based) was split on at `depth` (1-based).
    ///
    /// # Panics
    ///
    /// Panics if `depth` is 0 or beyond the analyzed depth, or `feature` is
    /// out of range.
    #[must_use]
    pub fn count(&self, depth: usize, feature: usize) -> usize {
        self.counts[depth - 1][feature]
    }

    /// Return the number of analyzed depths.
    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.counts.len()
    }

    /// Return the total number of counted splits.
    #[must_use]
    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }
}

/// Count one tree's splits at depths `1..=max_depth`.
///
/// Walks the whole tree breadth-first; splits below `max_depth` are visited
/// but not counted.
fn count_tree(tree: &Tree, max_depth: usize, n_features: usize) -> Vec<Vec<usize>> {
    let mut counts = vec![vec![0usize; n_features]; max_depth];
    let mut queue = VecDeque::from([(tree.root(), 1usize)]);
    while let Some((index, depth)) = queue.pop_front() {
        if let Node::Split {
            feature,
            left,
            right,
            ..
        } = tree.node(index)
        {
            if depth <= max_depth {
                counts[depth - 1][feature.index()] += 1;
            }
            queue.push_back((left, depth + 1));
            queue.push_back((right, depth + 1));
        }
    }
    counts
}

impl Forest {
    /// Count, per depth `1..=max_depth` and feature, the splits in all trees.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::InvalidMaxDepth`] if `max_depth` is zero.
    #[instrument(skip(self), fields(n_trees = self.n_trees()))]
    pub fn split_frequencies(&self, max_depth: usize) -> Result<SplitFrequencies, ForestError> {
        if max_depth == 0 {
            return Err(ForestError::InvalidMaxDepth { max_depth });
        }
        let n_features = self.n_features();
        let counts = self
            .trees
            .par_iter()
            .map(|tree| count_tree(tree, max_depth, n_features))
            .reduce(
                || vec![vec![0usize; n_features]; max_depth],
                |mut acc, counts| {
                    for (acc_row, row) in acc.iter_mut().zip(&counts) {
                        for (a, c) in acc_row.iter_mut().zip(row) {
                            *a += c;
                        }
                    }
                    acc
                },
            );
        let frequencies = SplitFrequencies { counts };
        debug!(total_splits = frequencies.total(), "split frequencies counted");
        Ok(frequencies)
    }
}

#[cfg(test)]
mod tests {
    use crate::ForestError;
    use crate::testing::{six_row_forest, stump_forest};

    #[test]
    fn stump_counts_root_split() {
        let freq = stump_forest().split_frequencies(3).unwrap();
        assert_eq!(freq.counts(), &[vec![1, 0], vec![0, 0], vec![0, 0]]);
        assert_eq!(freq.count(1, 0), 1);
    }

    #[test]
    fn counts_sum_across_trees_and_depths() {
        // Tree 1: X1 at depth 1, X2 at depth 2. Tree 2: X2 at depth 1.
        let freq = six_row_forest().split_frequencies(4).unwrap();
        assert_eq!(freq.counts()[0], vec![1, 1]);
        assert_eq!(freq.counts()[1], vec![0, 1]);
        assert_eq!(freq.total(), 3);
        assert_eq!(freq.max_depth(), 4);
    }

    #[test]
    fn deeper_splits_are_not_counted() {
        let freq = six_row_forest().split_frequencies(1).unwrap();
        assert_eq!(freq.counts(), &[vec![1, 1]]);
    }

    #[test]
    fn zero_max_depth_rejected() {
        let err = stump_forest().split_frequencies(0).unwrap_err();
        assert!(matches!(err, ForestError::InvalidMaxDepth { max_depth: 0 }));
    }
}
