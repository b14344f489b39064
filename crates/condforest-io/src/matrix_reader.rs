//! CSV matrix reader with full input validation.

use std::path::{Path, PathBuf};

use condforest_forest::Forest;
use tracing::{debug, info, instrument};

use crate::IoError;
use crate::domain::Matrix;

/// Reads a numeric matrix from a CSV file.
///
/// Expected CSV format:
/// - Header row required; every column is a named numeric column
/// - `col1,col2,...,colN`
/// - All rows must have the same number of columns, and every cell must be
///   a finite float
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::FileNotFound`] | File doesn't exist or is unreadable |
/// | [`IoError::CsvParse`] | Malformed CSV record |
/// | [`IoError::NoColumns`] | Header names no columns |
/// | [`IoError::EmptyDataset`] | Zero data rows after header |
/// | [`IoError::InconsistentRowLength`] | Row has different column count than header |
/// | [`IoError::NonFiniteValue`] | Cell is NaN, Inf, or unparseable float |
pub struct MatrixReader {
    path: PathBuf,
}

impl MatrixReader {
    /// Create a new reader for the given CSV file path.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Read and validate the CSV file, returning a [`Matrix`].
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn read(&self) -> Result<Matrix, IoError> {
        let file = std::fs::File::open(&self.path).map_err(|e| IoError::FileNotFound {
            path: self.path.clone(),
            source: e,
        })?;

        // flexible(true) lets InconsistentRowLength fire instead of a CsvParse error.
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(file);

        let header = rdr.headers().map_err(|e| self.csv_error(e))?;
        let expected_cols = header.len();
        if expected_cols == 0 || header.iter().all(str::is_empty) {
            return Err(IoError::NoColumns {
                path: self.path.clone(),
            });
        }
        let column_names: Vec<String> = header.iter().map(String::from).collect();
        debug!(expected_cols, "read CSV header");

        let mut rows = Vec::new();
        for (row_index, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| self.csv_error(e))?;
            if record.len() != expected_cols {
                return Err(IoError::InconsistentRowLength {
                    path: self.path.clone(),
                    row_index,
                    expected: expected_cols,
                    got: record.len(),
                });
            }

            let row = record
                .iter()
                .enumerate()
                .map(|(col_index, raw)| match raw.parse::<f64>() {
                    Ok(value) if value.is_finite() => Ok(value),
                    _ => Err(IoError::NonFiniteValue {
                        path: self.path.clone(),
                        row_index,
                        col_index,
                        raw: raw.to_string(),
                    }),
                })
                .collect::<Result<Vec<f64>, IoError>>()?;
            rows.push(row);
        }

        if rows.is_empty() {
            return Err(IoError::EmptyDataset {
                path: self.path.clone(),
            });
        }

        info!(n_rows = rows.len(), n_columns = expected_cols, "matrix loaded");
        Ok(Matrix::new(column_names, rows))
    }

    /// Read a query matrix for `forest`, returning its rows once the header
    /// matches the training feature names in count and order.
    ///
    /// # Errors
    ///
    /// Any [`MatrixReader::read`] error, or [`IoError::QuerySchema`] when the
    /// header does not match the forest's feature names.
    pub fn read_queries(&self, forest: &Forest) -> Result<Vec<Vec<f64>>, IoError> {
        let (names, rows) = self.read()?.into_parts();
        forest
            .check_query_columns(&names)
            .map_err(|source| IoError::QuerySchema {
                path: self.path.clone(),
                source,
            })?;
        Ok(rows)
    }

    fn csv_error(&self, e: csv::Error) -> IoError {
        IoError::CsvParse {
            path: self.path.clone(),
            offset: e.position().map_or(0, |p| p.byte()),
            source: e,
        }
    }
}
