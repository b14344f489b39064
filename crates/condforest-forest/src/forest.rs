//! The trained forest: validated tree arenas plus the training matrices.

use rayon::iter::{IndexedParallelIterator, IntoParallelIterator, ParallelIterator};
use tracing::{debug, info, instrument};

use crate::error::ForestError;
use crate::tree::{Tree, TreeArrays};

/// An immutable, externally trained forest.
///
/// Holds one validated [`Tree`] per ensemble member together with the
/// training feature matrix `X` (n×p) and response matrix `Y` (n×d), both
/// row-major: `features[row][feature]`, `responses[row][coordinate]`.
#[derive(Debug, Clone)]
pub struct Forest {
    pub(crate) trees: Vec<Tree>,
    pub(crate) features: Vec<Vec<f64>>,
    pub(crate) responses: Vec<Vec<f64>>,
    pub(crate) feature_names: Vec<String>,
}

/// Check that every row of `matrix` has `expected` columns.
fn check_rectangular(
    matrix: &'static str,
    rows: &[Vec<f64>],
    expected: usize,
) -> Result<(), ForestError> {
    match rows.iter().position(|r| r.len() != expected) {
        Some(row) => Err(ForestError::RaggedMatrix {
            matrix,
            row,
            expected,
            got: rows[row].len(),
        }),
        None => Ok(()),
    }
}

impl Forest {
    /// Assemble a forest from raw tree arrays and the training matrices.
    ///
    /// Feature names default to `X1..Xp`; see [`Forest::with_feature_names`].
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ForestError::EmptyForest`] | `trees` is empty |
    /// | [`ForestError::EmptyTrainingData`] | no rows, no feature columns, or no response columns |
    /// | [`ForestError::RaggedMatrix`] | rows of `X` or `Y` differ in length |
    /// | [`ForestError::ResponseRowMismatch`] | `X` and `Y` differ in row count |
    /// | [`ForestError::MalformedTree`], [`ForestError::SampleOutOfRange`], [`ForestError::UndrawnLeafSample`] | a tree violates the arena invariants |
    #[instrument(skip_all, fields(n_trees = trees.len(), n_rows = features.len()))]
    pub fn new(
        trees: Vec<TreeArrays>,
        features: Vec<Vec<f64>>,
        responses: Vec<Vec<f64>>,
    ) -> Result<Self, ForestError> {
        if trees.is_empty() {
            return Err(ForestError::EmptyForest);
        }
        let n_rows = features.len();
        if n_rows == 0 || features[0].is_empty() {
            return Err(ForestError::EmptyTrainingData);
        }
        let n_features = features[0].len();
        check_rectangular("X", &features, n_features)?;

        if responses.len() != n_rows {
            return Err(ForestError::ResponseRowMismatch {
                x_rows: n_rows,
                y_rows: responses.len(),
            });
        }
        let n_responses = responses[0].len();
        if n_responses == 0 {
            return Err(ForestError::EmptyTrainingData);
        }
        check_rectangular("Y", &responses, n_responses)?;

        let trees: Vec<Tree> = trees
            .into_par_iter()
            .enumerate()
            .map(|(i, arrays)| Tree::from_arrays(i, arrays, n_rows, n_features))
            .collect::<Result<_, _>>()?;

        info!(
            n_trees = trees.len(),
            n_rows,
            n_features,
            n_responses,
            "forest loaded"
        );

        Ok(Self {
            trees,
            features,
            responses,
            feature_names: (1..=n_features).map(|j| format!("X{j}")).collect(),
        })
    }

    /// Replace the default feature names.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::FeatureNameMismatch`] if `names.len() != n_features`.
    pub fn with_feature_names(mut self, names: Vec<String>) -> Result<Self, ForestError> {
        if names.len() != self.n_features() {
            return Err(ForestError::FeatureNameMismatch {
                expected: self.n_features(),
                got: names.len(),
            });
        }
        self.feature_names = names;
        Ok(self)
    }

    /// Build a sub-forest from the trees whose zero-based index satisfies `keep`.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::EmptyForest`] if no tree is kept.
    pub fn select_trees(&self, keep: impl Fn(usize) -> bool) -> Result<Self, ForestError> {
        let trees: Vec<Tree> = self
            .trees
            .iter()
            .enumerate()
            .filter(|(i, _)| keep(*i))
            .map(|(_, t)| t.clone())
            .collect();
        if trees.is_empty() {
            return Err(ForestError::EmptyForest);
        }
        debug!(kept = trees.len(), of = self.trees.len(), "selected sub-forest");
        Ok(Self {
            trees,
            features: self.features.clone(),
            responses: self.responses.clone(),
            feature_names: self.feature_names.clone(),
        })
    }

    /// Check that every query row has the training feature count.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::SchemaMismatch`] for the first offending row.
    pub fn check_query(&self, rows: &[Vec<f64>]) -> Result<(), ForestError> {
        let expected = self.n_features();
        match rows.iter().position(|r| r.len() != expected) {
            Some(row) => Err(ForestError::SchemaMismatch {
                expected,
                got: rows[row].len(),
                row,
            }),
            None => Ok(()),
        }
    }

    /// Check that a query matrix's column names match the training feature
    /// names, in count and order.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ForestError::SchemaMismatch`] | the query has a different column count |
    /// | [`ForestError::ColumnOrderMismatch`] | the first column whose name differs |
    pub fn check_query_columns(&self, names: &[String]) -> Result<(), ForestError> {
        let expected = self.n_features();
        if names.len() != expected {
            return Err(ForestError::SchemaMismatch {
                expected,
                got: names.len(),
                row: 0,
            });
        }
        match self.feature_names.iter().zip(names).position(|(a, b)| a != b) {
            Some(column) => Err(ForestError::ColumnOrderMismatch {
                column,
                expected: self.feature_names[column].clone(),
                got: names[column].clone(),
            }),
            None => Ok(()),
        }
    }

    /// Return the number of trees in the ensemble.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Return the number of training rows.
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.features.len()
    }

    /// Return the number of feature columns.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.features[0].len()
    }

    /// Return the number of response columns.
    #[must_use]
    pub fn n_responses(&self) -> usize {
        self.responses[0].len()
    }

    /// Borrow the validated trees.
    #[must_use]
    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }

    /// Borrow the training feature matrix.
    #[must_use]
    pub fn features(&self) -> &[Vec<f64>] {
        &self.features
    }

    /// Borrow the training response matrix.
    #[must_use]
    pub fn responses(&self) -> &[Vec<f64>] {
        &self.responses
    }

    /// Return the feature names.
    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }
}
