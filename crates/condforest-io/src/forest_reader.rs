//! JSON reader for externally trained forests.

use std::path::{Path, PathBuf};

use condforest_forest::{Forest, TreeArrays};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::IoError;
use crate::domain::Matrix;

/// The exchange document written by the trainer.
///
/// Training matrices and feature names are optional in the document; the
/// reader can take them from CSV files instead.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForestDocument {
    /// Raw per-tree arrays, zero-based.
    pub trees: Vec<TreeArrays>,
    /// Training feature matrix, row-major.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<Vec<Vec<f64>>>,
    /// Training response matrix, row-major.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responses: Option<Vec<Vec<f64>>>,
    /// Feature column names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_names: Option<Vec<String>>,
}

/// Reads a [`ForestDocument`] and assembles a validated [`Forest`].
///
/// Matrices supplied with [`with_features`](Self::with_features) and
/// [`with_responses`](Self::with_responses) take precedence over those in
/// the document. Feature names come from the supplied feature matrix, then
/// the document, then default to `X1..Xp`.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::FileNotFound`] | File doesn't exist or is unreadable |
/// | [`IoError::JsonParse`] | File is not a forest document |
/// | [`IoError::MissingTrainingData`] | No feature or response matrix from either source |
/// | [`IoError::InvalidForest`] | Arrays and matrices violate the forest invariants |
pub struct ForestReader {
    path: PathBuf,
    features: Option<Matrix>,
    responses: Option<Matrix>,
}

impl ForestReader {
    /// Create a new reader for the given JSON file path.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            features: None,
            responses: None,
        }
    }

    /// Use `features` as the training feature matrix.
    #[must_use]
    pub fn with_features(mut self, features: Matrix) -> Self {
        self.features = Some(features);
        self
    }

    /// Use `responses` as the training response matrix.
    #[must_use]
    pub fn with_responses(mut self, responses: Matrix) -> Self {
        self.responses = Some(responses);
        self
    }

    /// Parse the document without validating it.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn read_document(&self) -> Result<ForestDocument, IoError> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| IoError::FileNotFound {
            path: self.path.clone(),
            source: e,
        })?;
        let document: ForestDocument =
            serde_json::from_str(&content).map_err(|e| IoError::JsonParse {
                path: self.path.clone(),
                source: e,
            })?;
        debug!(n_trees = document.trees.len(), "parsed forest document");
        Ok(document)
    }

    /// Read the document and assemble the forest.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn read(self) -> Result<Forest, IoError> {
        let document = self.read_document()?;

        let (names, features) = match self.features {
            Some(matrix) => {
                let (names, rows) = matrix.into_parts();
                (Some(names), rows)
            }
            None => (
                document.feature_names,
                document.features.ok_or_else(|| IoError::MissingTrainingData {
                    path: self.path.clone(),
                    matrix: "feature",
                })?,
            ),
        };
        let responses = match self.responses {
            Some(matrix) => matrix.into_parts().1,
            None => document
                .responses
                .ok_or_else(|| IoError::MissingTrainingData {
                    path: self.path.clone(),
                    matrix: "response",
                })?,
        };

        let invalid = |source| IoError::InvalidForest {
            path: self.path.clone(),
            source,
        };
        let mut forest = Forest::new(document.trees, features, responses).map_err(invalid)?;
        if let Some(names) = names {
            forest = forest.with_feature_names(names).map_err(invalid)?;
        }

        info!(
            n_trees = forest.n_trees(),
            n_rows = forest.n_rows(),
            n_features = forest.n_features(),
            "forest loaded"
        );
        Ok(forest)
    }
}
