//! File I/O, validation, and serialization for the condforest pipeline.
//!
//! Reads training and query matrices from CSV, assembles forests from the
//! trainer's JSON exchange document, and writes JSON result artifacts.

mod domain;
mod error;
mod forest_reader;
mod matrix_reader;
mod writer;

pub use domain::{ExperimentName, Matrix};
pub use error::IoError;
pub use forest_reader::{ForestDocument, ForestReader};
pub use matrix_reader::MatrixReader;
pub use writer::ResultWriter;
