use tracing::trace;

use crate::{
    ForestError,
    node::{FeatureIndex, Node, NodeIndex},
};

/// The flat parallel arrays describing one trained tree.
///
/// This is the exchange shape produced by the external trainer. Every
/// per-node array has one entry per node; a child value of 0 means "no
/// child", and a node with both children absent is a leaf. All indices are
/// zero-based.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TreeArrays {
    /// Arena index of the root node.
    pub root: usize,
    /// Left child per node (0 = none).
    pub left_children: Vec<usize>,
    /// Right child per node (0 = none).
    pub right_children: Vec<usize>,
    /// Split feature per node; ignored for leaves.
    pub split_variables: Vec<usize>,
    /// Split threshold per node; ignored for leaves.
    pub split_values: Vec<f64>,
    /// Training rows per node; only read for leaves.
    pub leaf_samples: Vec<Vec<usize>>,
    /// Training rows drawn to grow or populate this tree.
    pub drawn_samples: Vec<usize>,
}

/// A validated, immutable tree arena.
///
/// Construct through [`Forest::new`](crate::Forest::new), which checks the
/// arena invariants once so that traversal never needs to.
#[derive(Debug, Clone)]
pub struct Tree {
    arrays: TreeArrays,
    drawn_sorted: Vec<usize>,
}

impl Tree {
    /// Validate raw arrays for tree `tree` against the training data shape.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ForestError::MalformedTree`] | arrays differ in length, the root or a child is out of bounds, a node is reached twice, exactly one child is absent, a split feature is out of range, or a row sits in two leaves |
    /// | [`ForestError::SampleOutOfRange`] | a leaf or drawn sample is not a training row |
    /// | [`ForestError::UndrawnLeafSample`] | a leaf row is missing from the drawn samples |
    pub(crate) fn from_arrays(
        tree: usize,
        arrays: TreeArrays,
        n_rows: usize,
        n_features: usize,
    ) -> Result<Self, ForestError> {
        let malformed = |node: usize, reason: String| ForestError::MalformedTree {
            tree,
            node,
            reason,
        };

        let n_nodes = arrays.left_children.len();
        if n_nodes == 0 {
            return Err(malformed(0, "tree has no nodes".into()));
        }
        let lengths = [
            arrays.right_children.len(),
            arrays.split_variables.len(),
            arrays.split_values.len(),
            arrays.leaf_samples.len(),
        ];
        if lengths.iter().any(|&len| len != n_nodes) {
            return Err(malformed(
                0,
                format!("per-node arrays differ in length ({n_nodes} vs {lengths:?})"),
            ));
        }
        if arrays.root >= n_nodes {
            return Err(malformed(
                arrays.root,
                format!("root is outside the {n_nodes}-node arena"),
            ));
        }

        if let Some(&row) = arrays.drawn_samples.iter().find(|&&r| r >= n_rows) {
            return Err(ForestError::SampleOutOfRange { tree, row, n_rows });
        }
        let mut drawn_sorted = arrays.drawn_samples.clone();
        drawn_sorted.sort_unstable();
        drawn_sorted.dedup();

        let mut visited = vec![false; n_nodes];
        let mut in_leaf = vec![false; n_rows];
        let mut stack = vec![arrays.root];
        while let Some(node) = stack.pop() {
            if visited[node] {
                return Err(malformed(node, "node is reachable more than once".into()));
            }
            visited[node] = true;

            let (left, right) = (arrays.left_children[node], arrays.right_children[node]);
            match (left, right) {
                (0, 0) => {
                    for &row in &arrays.leaf_samples[node] {
                        if row >= n_rows {
                            return Err(ForestError::SampleOutOfRange { tree, row, n_rows });
                        }
                        if drawn_sorted.binary_search(&row).is_err() {
                            return Err(ForestError::UndrawnLeafSample { tree, node, row });
                        }
                        if in_leaf[row] {
                            return Err(malformed(
                                node,
                                format!("row {row} appears in more than one leaf"),
                            ));
                        }
                        in_leaf[row] = true;
                    }
                }
                (0, _) | (_, 0) => {
                    return Err(malformed(node, "exactly one child is absent".into()));
                }
                _ => {
                    for child in [left, right] {
                        if child >= n_nodes {
                            return Err(malformed(
                                node,
                                format!("child {child} is outside the {n_nodes}-node arena"),
                            ));
                        }
                    }
                    if arrays.split_variables[node] >= n_features {
                        return Err(malformed(
                            node,
                            format!(
                                "split variable {} is outside {n_features} features",
                                arrays.split_variables[node]
                            ),
                        ));
                    }
                    if arrays.split_values[node].is_nan() {
                        return Err(malformed(node, "split value is NaN".into()));
                    }
                    stack.push(right);
                    stack.push(left);
                }
            }
        }

        trace!(tree, n_nodes, "tree arrays validated");
        Ok(Self {
            arrays,
            drawn_sorted,
        })
    }

    /// Return the number of nodes in the arena (reachable or not).
    #[must_use]
    pub fn n_nodes(&self) -> usize {
        self.arrays.left_children.len()
    }

    /// Return the root node index.
    #[must_use]
    pub fn root(&self) -> NodeIndex {
        NodeIndex::new(self.arrays.root)
    }

    /// Return a view of the node at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is outside the arena.
    #[must_use]
    pub fn node(&self, index: NodeIndex) -> Node<'_> {
        let i = index.index();
        let (left, right) = (self.arrays.left_children[i], self.arrays.right_children[i]);
        if left == 0 && right == 0 {
            Node::Leaf {
                samples: &self.arrays.leaf_samples[i],
            }
        } else {
            Node::Split {
                feature: FeatureIndex::new(self.arrays.split_variables[i]),
                threshold: self.arrays.split_values[i],
                left: NodeIndex::new(left),
                right: NodeIndex::new(right),
            }
        }
    }

    /// Return the rows drawn for this tree, in the trainer's order.
    #[must_use]
    pub fn drawn_samples(&self) -> &[usize] {
        &self.arrays.drawn_samples
    }

    /// Return `true` if training row `row` was drawn for this tree.
    #[must_use]
    pub fn was_drawn(&self, row: usize) -> bool {
        self.drawn_sorted.binary_search(&row).is_ok()
    }

    /// Borrow the raw arrays this tree was built from.
    #[must_use]
    pub fn arrays(&self) -> &TreeArrays {
        &self.arrays
    }

    /// Descend from the root to the leaf `sample` falls into.
    ///
    /// Goes left when `sample[feature] <= threshold`, right otherwise; a NaN
    /// feature value therefore goes right. `sample` must have at least as
    /// many columns as the forest's feature count.
    #[must_use]
    pub fn route(&self, sample: &[f64]) -> NodeIndex {
        let mut index = self.root();
        loop {
            match self.node(index) {
                Node::Leaf { .. } => return index,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if sample[feature.index()] <= threshold {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }

    /// Return the training rows in the leaf `sample` falls into.
    #[must_use]
    pub fn leaf_samples_for(&self, sample: &[f64]) -> &[usize] {
        &self.arrays.leaf_samples[self.route(sample).index()]
    }
}
