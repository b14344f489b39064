//! JSON result writer for prediction, weighting, and introspection outputs.

use std::fs;
use std::path::{Path, PathBuf};

use condforest_forest::{DecodedTree, RankedFeature, SplitFrequencies, WeightVector};
use condforest_predict::{FunctionalResult, MmdImportance};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::IoError;
use crate::domain::ExperimentName;

/// Writes results to JSON artifacts named `{experiment}_{kind}.json`.
///
/// Creates the output directory on construction if it does not exist. Row
/// indices in artifacts are 1-based.
pub struct ResultWriter {
    output_dir: PathBuf,
    experiment: ExperimentName,
}

impl ResultWriter {
    /// Create a new writer targeting the given directory and experiment name.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::OutputDirCreate`] if the directory cannot be created.
    #[instrument(skip_all, fields(dir = %output_dir.display(), experiment = %experiment))]
    pub fn new(output_dir: &Path, experiment: ExperimentName) -> Result<Self, IoError> {
        fs::create_dir_all(output_dir).map_err(|e| IoError::OutputDirCreate {
            path: output_dir.to_path_buf(),
            source: e,
        })?;
        debug!("output directory ready");
        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            experiment,
        })
    }

    /// Return the path of the artifact of `kind`.
    #[must_use]
    pub fn artifact_path(&self, kind: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}_{kind}.json", self.experiment.as_str()))
    }

    /// Write a functional result to `{experiment}_predict.json`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::Serialize`] or [`IoError::WriteFile`] on failure.
    #[instrument(skip_all)]
    pub fn write_prediction(&self, result: &FunctionalResult) -> Result<PathBuf, IoError> {
        self.write_artifact(
            "predict",
            &PredictArtifact {
                experiment: self.experiment.as_str(),
                n_queries: result.n_queries(),
                result,
            },
        )
    }

    /// Write weight vectors to `{experiment}_weights.json`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::Serialize`] or [`IoError::WriteFile`] on failure.
    #[instrument(skip_all)]
    pub fn write_weights(&self, weights: &[WeightVector], oob: bool) -> Result<PathBuf, IoError> {
        let queries = weights
            .iter()
            .enumerate()
            .map(|(i, w)| WeightEntry {
                query: i + 1,
                rows: w.entries().iter().map(|(row, _)| row + 1).collect(),
                weights: w.entries().iter().map(|(_, v)| *v).collect(),
            })
            .collect();
        self.write_artifact(
            "weights",
            &WeightsArtifact {
                experiment: self.experiment.as_str(),
                oob,
                queries,
            },
        )
    }

    /// Write decoded trees to `{experiment}_decode.json`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::Serialize`] or [`IoError::WriteFile`] on failure.
    #[instrument(skip_all)]
    pub fn write_decoded(&self, trees: &[DecodedTree]) -> Result<PathBuf, IoError> {
        self.write_artifact(
            "decode",
            &DecodeArtifact {
                experiment: self.experiment.as_str(),
                trees,
            },
        )
    }

    /// Write split frequencies to `{experiment}_split_frequencies.json`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::Serialize`] or [`IoError::WriteFile`] on failure.
    #[instrument(skip_all)]
    pub fn write_split_frequencies(
        &self,
        frequencies: &SplitFrequencies,
        feature_names: &[String],
    ) -> Result<PathBuf, IoError> {
        self.write_artifact(
            "split_frequencies",
            &SplitFrequencyArtifact {
                experiment: self.experiment.as_str(),
                feature_names,
                max_depth: frequencies.max_depth(),
                counts: frequencies.counts(),
            },
        )
    }

    /// Write structural importances to `{experiment}_importance.json`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::Serialize`] or [`IoError::WriteFile`] on failure.
    #[instrument(skip_all)]
    pub fn write_importance(
        &self,
        decay_exponent: f64,
        max_depth: usize,
        ranked: &[RankedFeature],
    ) -> Result<PathBuf, IoError> {
        self.write_artifact(
            "importance",
            &ImportanceArtifact {
                experiment: self.experiment.as_str(),
                method: "structural",
                decay_exponent: Some(decay_exponent),
                max_depth: Some(max_depth),
                mmd: None,
                features: ranked,
            },
        )
    }

    /// Write MMD importances to `{experiment}_mmd_importance.json`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::Serialize`] or [`IoError::WriteFile`] on failure.
    #[instrument(skip_all)]
    pub fn write_mmd_importance(
        &self,
        importance: &MmdImportance,
        feature_names: &[String],
    ) -> Result<PathBuf, IoError> {
        let ranked = importance.ranked(feature_names);
        self.write_artifact(
            "mmd_importance",
            &ImportanceArtifact {
                experiment: self.experiment.as_str(),
                method: "mmd",
                decay_exponent: None,
                max_depth: None,
                mmd: Some(importance),
                features: &ranked,
            },
        )
    }

    fn write_artifact<T: Serialize>(&self, kind: &str, artifact: &T) -> Result<PathBuf, IoError> {
        let path = self.artifact_path(kind);
        let json = serde_json::to_string_pretty(artifact).map_err(|e| IoError::Serialize {
            path: path.clone(),
            source: e,
        })?;
        fs::write(&path, &json).map_err(|e| IoError::WriteFile {
            path: path.clone(),
            source: e,
        })?;
        info!(path = %path.display(), kind, "result written");
        Ok(path)
    }
}

// ---------------------------------------------------------------------------
// Artifact shapes
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct PredictArtifact<'a> {
    experiment: &'a str,
    n_queries: usize,
    result: &'a FunctionalResult,
}

#[derive(Serialize)]
struct WeightEntry {
    query: usize,
    rows: Vec<usize>,
    weights: Vec<f64>,
}

#[derive(Serialize)]
struct WeightsArtifact<'a> {
    experiment: &'a str,
    oob: bool,
    queries: Vec<WeightEntry>,
}

#[derive(Serialize)]
struct DecodeArtifact<'a> {
    experiment: &'a str,
    trees: &'a [DecodedTree],
}

#[derive(Serialize)]
struct SplitFrequencyArtifact<'a> {
    experiment: &'a str,
    feature_names: &'a [String],
    max_depth: usize,
    counts: &'a [Vec<usize>],
}

#[derive(Serialize)]
struct ImportanceArtifact<'a> {
    experiment: &'a str,
    method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    decay_exponent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_depth: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mmd: Option<&'a MmdImportance>,
    features: &'a [RankedFeature],
}
