//! Breadth-first decoding of a tree arena into a printable, 1-based node list.

use std::collections::VecDeque;
use std::fmt;

use tracing::{debug, instrument};

use crate::error::ForestError;
use crate::forest::Forest;
use crate::node::Node;

/// Per-leaf summary attached to decoded leaves.
///
/// Implementations are chosen per forest flavour by the caller, so the
/// decoder never inspects what kind of forest it is walking.
pub trait LeafStatsProvider: Sync {
    /// Summarize a leaf given its zero-based training rows.
    ///
    /// Returning `None` attaches no statistic.
    fn leaf_stats(&self, forest: &Forest, samples: &[usize]) -> Option<Vec<f64>>;
}

/// Attaches no leaf statistic.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLeafStats;

impl LeafStatsProvider for NoLeafStats {
    fn leaf_stats(&self, _forest: &Forest, _samples: &[usize]) -> Option<Vec<f64>> {
        None
    }
}

/// Mean training response of the leaf's rows, rounded to `digits` decimals.
///
/// Empty leaves get no statistic.
#[derive(Debug, Clone, Copy)]
pub struct MeanResponse {
    digits: i32,
}

impl MeanResponse {
    /// Create a provider rounding to `digits` decimal places.
    #[must_use]
    pub fn new(digits: i32) -> Self {
        Self { digits }
    }
}

impl Default for MeanResponse {
    fn default() -> Self {
        Self::new(2)
    }
}

impl LeafStatsProvider for MeanResponse {
    fn leaf_stats(&self, forest: &Forest, samples: &[usize]) -> Option<Vec<f64>> {
        if samples.is_empty() {
            return None;
        }
        let scale = 10f64.powi(self.digits);
        let mut mean = vec![0.0; forest.n_responses()];
        for &row in samples {
            for (m, y) in mean.iter_mut().zip(&forest.responses()[row]) {
                *m += y;
            }
        }
        let n = samples.len() as f64;
        Some(mean.iter().map(|m| (m / n * scale).round() / scale).collect())
    }
}

/// One node of a [`DecodedTree`]. All indices are 1-based.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecodedNode {
    /// An interior split node.
    Split {
        /// 1-based feature column.
        split_variable: usize,
        /// Rows with `x[split_variable] <= split_value` go left.
        split_value: f64,
        /// 1-based position of the left child in [`DecodedTree::nodes`].
        left_child: usize,
        /// 1-based position of the right child in [`DecodedTree::nodes`].
        right_child: usize,
    },
    /// A terminal leaf.
    Leaf {
        /// 1-based training rows in this leaf.
        samples: Vec<usize>,
        /// Optional summary from a [`LeafStatsProvider`].
        leaf_stats: Option<Vec<f64>>,
    },
}

/// A tree laid out breadth-first from its root, with 1-based indices.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DecodedTree {
    /// 1-based tree index within the forest.
    pub tree: usize,
    /// Nodes in breadth-first order; the root is `nodes[0]` (position 1).
    pub nodes: Vec<DecodedNode>,
    /// 1-based rows drawn for this tree.
    pub drawn_samples: Vec<usize>,
    #[serde(skip)]
    feature_names: Vec<String>,
}

impl DecodedTree {
    /// Return the number of leaves.
    #[must_use]
    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, DecodedNode::Leaf { .. }))
            .count()
    }

    /// Return the number of split nodes.
    #[must_use]
    pub fn n_splits(&self) -> usize {
        self.nodes.len() - self.n_leaves()
    }

    fn write_node(&self, f: &mut fmt::Formatter<'_>, position: usize, depth: usize) -> fmt::Result {
        let indent = "  ".repeat(depth + 1);
        match &self.nodes[position - 1] {
            DecodedNode::Split {
                split_variable,
                split_value,
                left_child,
                right_child,
            } => {
                let name = self
                    .feature_names
                    .get(split_variable - 1)
                    .map_or("?", String::as_str);
                writeln!(
                    f,
                    "{indent}({position}) split_variable: {name}  split_value: {split_value}"
                )?;
                self.write_node(f, *left_child, depth + 1)?;
                self.write_node(f, *right_child, depth + 1)
            }
            DecodedNode::Leaf {
                samples,
                leaf_stats,
            } => {
                write!(f, "{indent}({position}) * num_samples: {}", samples.len())?;
                if let Some(stats) = leaf_stats {
                    write!(f, "  leaf_stats: {stats:?}")?;
                }
                writeln!(f)
            }
        }
    }
}

impl fmt::Display for DecodedTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Tree {}", self.tree)?;
        self.write_node(f, 1, 0)
    }
}

impl Forest {
    /// Decode tree `index` (1-based) breadth-first.
    ///
    /// Leaves receive statistics from `stats`; pass [`NoLeafStats`] for none
    /// or [`MeanResponse`] for the rounded mean response.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::IndexOutOfRange`] unless `1 <= index <= n_trees`.
    #[instrument(skip(self, stats))]
    pub fn decode_tree(
        &self,
        index: usize,
        stats: &impl LeafStatsProvider,
    ) -> Result<DecodedTree, ForestError> {
        if index == 0 || index > self.n_trees() {
            return Err(ForestError::IndexOutOfRange {
                index,
                n_trees: self.n_trees(),
            });
        }
        let tree = &self.trees[index - 1];

        let mut nodes = Vec::with_capacity(tree.n_nodes());
        let mut queue = VecDeque::from([tree.root()]);
        // Positions handed out so far; the root holds position 1.
        let mut assigned = 1;
        while let Some(node) = queue.pop_front() {
            match tree.node(node) {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    nodes.push(DecodedNode::Split {
                        split_variable: feature.index() + 1,
                        split_value: threshold,
                        left_child: assigned + 1,
                        right_child: assigned + 2,
                    });
                    assigned += 2;
                    queue.push_back(left);
                    queue.push_back(right);
                }
                Node::Leaf { samples } => nodes.push(DecodedNode::Leaf {
                    samples: samples.iter().map(|s| s + 1).collect(),
                    leaf_stats: stats.leaf_stats(self, samples),
                }),
            }
        }

        let decoded = DecodedTree {
            tree: index,
            nodes,
            drawn_samples: tree.drawn_samples().iter().map(|s| s + 1).collect(),
            feature_names: self.feature_names.clone(),
        };
        debug!(
            n_nodes = decoded.nodes.len(),
            n_leaves = decoded.n_leaves(),
            "tree decoded"
        );
        Ok(decoded)
    }
}
