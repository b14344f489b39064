/// Errors from forest validation, decoding, routing, and weighting.
#[derive(Debug, thiserror::Error)]
pub enum ForestError {
    /// Returned when a forest is built with zero trees.
    #[error("forest has no trees")]
    EmptyForest,

    /// Returned when the training feature matrix has zero rows or zero columns.
    #[error("training data must have at least one row and one feature column")]
    EmptyTrainingData,

    /// Returned when X and Y disagree on the number of training rows.
    #[error("training features have {x_rows} rows but responses have {y_rows}")]
    ResponseRowMismatch {
        /// Rows in the feature matrix.
        x_rows: usize,
        /// Rows in the response matrix.
        y_rows: usize,
    },

    /// Returned when a training row has a different length than the first row.
    #[error("{matrix} row {row} has {got} columns, expected {expected}")]
    RaggedMatrix {
        /// Which matrix the row belongs to (`"X"` or `"Y"`).
        matrix: &'static str,
        /// Zero-based row index.
        row: usize,
        /// Expected column count.
        expected: usize,
        /// Actual column count.
        got: usize,
    },

    /// Returned when the number of feature names does not match the feature count.
    #[error("{got} feature names for {expected} feature columns")]
    FeatureNameMismatch {
        /// Number of feature columns.
        expected: usize,
        /// Number of names supplied.
        got: usize,
    },

    /// Returned when a tree's arrays violate the arena invariants.
    #[error("malformed tree {tree} at node {node}: {reason}")]
    MalformedTree {
        /// Zero-based tree index.
        tree: usize,
        /// Zero-based node index.
        node: usize,
        /// Human-readable description of the violation.
        reason: String,
    },

    /// Returned when a leaf or drawn sample refers to a row past the training data.
    #[error("tree {tree} references training row {row}, but only {n_rows} rows exist")]
    SampleOutOfRange {
        /// Zero-based tree index.
        tree: usize,
        /// The offending zero-based row index.
        row: usize,
        /// Number of training rows.
        n_rows: usize,
    },

    /// Returned when a leaf holds a row that the tree never drew.
    #[error("tree {tree} has row {row} in leaf {node} but not in its drawn samples")]
    UndrawnLeafSample {
        /// Zero-based tree index.
        tree: usize,
        /// Zero-based node index of the leaf.
        node: usize,
        /// The offending zero-based row index.
        row: usize,
    },

    /// Returned when a requested tree index lies outside `[1, n_trees]`.
    #[error("tree index {index} is outside [1, {n_trees}]")]
    IndexOutOfRange {
        /// The 1-based index requested.
        index: usize,
        /// Number of trees in the forest.
        n_trees: usize,
    },

    /// Returned when query rows do not have the training feature count.
    #[error("query row {row} has {got} features, expected {expected}")]
    SchemaMismatch {
        /// Number of training feature columns.
        expected: usize,
        /// Number of columns in the query row.
        got: usize,
        /// Zero-based query row index.
        row: usize,
    },

    /// Returned when a named query column differs from the training column at
    /// the same position.
    #[error("query column {column} is `{got}`, expected `{expected}`")]
    ColumnOrderMismatch {
        /// Zero-based column position.
        column: usize,
        /// Training feature name at that position.
        expected: String,
        /// Query column name at that position.
        got: String,
    },

    /// Returned when no tree contributes weight to a row.
    #[error("row {row} receives weight from no tree")]
    InsufficientObservations {
        /// Zero-based row index (query row, or training row in out-of-bag mode).
        row: usize,
    },

    /// Returned when `max_depth` is zero.
    #[error("max_depth must be at least 1, got {max_depth}")]
    InvalidMaxDepth {
        /// The invalid max_depth value provided.
        max_depth: usize,
    },

    /// Returned when the decay exponent is negative or not finite.
    #[error("decay exponent must be finite and non-negative, got {exponent}")]
    InvalidDecayExponent {
        /// The invalid exponent.
        exponent: f64,
    },

    /// Returned when a dedicated thread pool cannot be built.
    #[error("failed to build thread pool with {threads} threads")]
    ThreadPool {
        /// Requested thread count.
        threads: usize,
        /// The underlying rayon error.
        source: rayon::ThreadPoolBuildError,
    },
}
