//! Domain types for condforest-io.

use crate::IoError;

/// A validated experiment name for output file naming.
///
/// Must match `[a-zA-Z0-9_-]+`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentName(String);

impl ExperimentName {
    /// Parse and validate an experiment name.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::InvalidExperimentName`] if the name is empty or
    /// contains characters outside `[a-zA-Z0-9_-]`.
    pub fn new(name: String) -> Result<Self, IoError> {
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(IoError::InvalidExperimentName { name });
        }
        Ok(Self(name))
    }

    /// Return the experiment name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ExperimentName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A named, row-major numeric matrix read from CSV.
///
/// `rows[i][j]` is the value of column `column_names[j]` in row `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    column_names: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl Matrix {
    pub(crate) fn new(column_names: Vec<String>, rows: Vec<Vec<f64>>) -> Self {
        Self { column_names, rows }
    }

    /// Return the column names from the CSV header.
    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// Return the rows.
    #[must_use]
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// Return the number of rows.
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// Return the number of columns.
    #[must_use]
    pub fn n_columns(&self) -> usize {
        self.column_names.len()
    }

    /// Consume the matrix, returning `(column_names, rows)`.
    #[must_use]
    pub fn into_parts(self) -> (Vec<String>, Vec<Vec<f64>>) {
        (self.column_names, self.rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn experiment_name_valid() {
        let name = ExperimentName::new("run-07_oob".to_string());
        assert!(name.is_ok());
        assert_eq!(name.unwrap().as_str(), "run-07_oob");
    }

    #[test]
    fn experiment_name_rejects_empty() {
        let name = ExperimentName::new(String::new());
        assert!(matches!(name, Err(IoError::InvalidExperimentName { .. })));
    }

    #[test]
    fn experiment_name_rejects_path_separators() {
        for bad in ["../escape", "a/b", "with space"] {
            let name = ExperimentName::new(bad.to_string());
            assert!(matches!(name, Err(IoError::InvalidExperimentName { .. })));
        }
    }

    #[test]
    fn matrix_accessors() {
        let m = Matrix::new(vec!["a".into(), "b".into()], vec![vec![1.0, 2.0]]);
        assert_eq!(m.n_rows(), 1);
        assert_eq!(m.n_columns(), 2);
        let (names, rows) = m.into_parts();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(rows, vec![vec![1.0, 2.0]]);
    }
}
