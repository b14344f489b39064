//! Read-only views over an externally trained forest.
//!
//! Validates the trainer's flat per-tree arrays into arena trees, decodes
//! trees breadth-first for printing, routes query points to leaves, turns
//! leaf co-membership into per-query weights over training rows (including
//! the out-of-bag variant), and summarizes split structure into depth-wise
//! frequencies and a structural variable importance.

mod decode;
mod error;
mod forest;
mod importance;
mod node;
mod parallel;
mod split_freq;
#[cfg(test)]
mod testing;
mod tree;
mod weights;

pub use decode::{DecodedNode, DecodedTree, LeafStatsProvider, MeanResponse, NoLeafStats};
pub use error::ForestError;
pub use forest::Forest;
pub use importance::{ImportanceConfig, RankedFeature, rank_features};
pub use node::{FeatureIndex, Node, NodeIndex};
pub use parallel::with_thread_hint;
pub use split_freq::SplitFrequencies;
pub use tree::{Tree, TreeArrays};
pub use weights::{WeightVector, WeightsConfig};
