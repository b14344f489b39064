use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::info;

use condforest_forest::{
    DecodedTree, Forest, ImportanceConfig, LeafStatsProvider, MeanResponse, NoLeafStats,
    RankedFeature, WeightsConfig,
};
use condforest_io::{ExperimentName, ForestReader, MatrixReader, ResultWriter};
use condforest_predict::{
    CoordinatewiseQuantiles, Functional, FunctionalKind, FunctionalResult, ImportanceType,
    MmdImportanceConfig, PredictConfig, mmd_importance, predict,
};
use condforest_stats::effective_sample_size;

#[derive(Parser)]
#[command(name = "condforest")]
#[command(about = "Conditional distribution estimates from trained random forests")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// RNG seed for reproducibility
    #[arg(long, default_value_t = 42, global = true)]
    seed: u64,

    /// Enable verbose (debug-level) logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Number of threads for parallel computation (defaults to all cores)
    #[arg(long, global = true)]
    threads: Option<usize>,
}

/// Where the forest and its training data come from.
#[derive(Args, Debug, Clone)]
struct ForestArgs {
    /// Path to the forest JSON document
    #[arg(long)]
    forest: PathBuf,

    /// Training feature CSV (overrides the matrix in the forest document)
    #[arg(long)]
    features: Option<PathBuf>,

    /// Training response CSV (overrides the matrix in the forest document)
    #[arg(long)]
    responses: Option<PathBuf>,
}

/// Optional JSON artifact output.
#[derive(Args, Debug, Clone)]
struct OutputArgs {
    /// Experiment name for output files (must match [a-zA-Z0-9_-]+); no
    /// artifact is written without it
    #[arg(long)]
    experiment: Option<String>,

    /// Output directory for result files
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ImportanceMethod {
    /// Depth-decayed split frequencies
    Structural,
    /// Kernel MMD under feature permutation
    Mmd,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate a functional of the conditional response distribution
    Predict {
        #[command(flatten)]
        forest: ForestArgs,

        /// Query CSV; out-of-bag prediction on the training rows when absent
        #[arg(long)]
        newdata: Option<PathBuf>,

        /// Functional: mean, sd, quantile, cor, cov, custom, normalPredictionScore, MQ
        #[arg(long, default_value = "mean")]
        functional: String,

        /// Probabilities for the quantile functional
        #[arg(long, value_delimiter = ',', default_value = "0.1,0.5,0.9")]
        probs: Vec<f64>,

        /// Rank vector for MQ as comma-separated values; repeat for several
        #[arg(long = "rank")]
        ranks: Vec<String>,

        /// Restrict the response to this 1-based column before evaluating
        #[arg(long)]
        response_column: Option<usize>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Compute per-query weights over training rows
    Weights {
        #[command(flatten)]
        forest: ForestArgs,

        /// Query CSV; out-of-bag weights for the training rows when absent
        #[arg(long)]
        newdata: Option<PathBuf>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Decode trees breadth-first with 1-based indices
    Decode {
        #[command(flatten)]
        forest: ForestArgs,

        /// 1-based tree index; all trees when absent
        #[arg(long)]
        tree: Option<usize>,

        /// Attach the rounded mean response to every leaf
        #[arg(long, default_value_t = false)]
        leaf_stats: bool,

        /// Print indented text instead of JSON
        #[arg(long, default_value_t = false)]
        text: bool,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Count splits per depth and feature
    SplitFrequencies {
        #[command(flatten)]
        forest: ForestArgs,

        /// Deepest level counted (root = 1)
        #[arg(long, default_value_t = 4)]
        max_depth: usize,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Rank features by structural or MMD importance
    Importance {
        #[command(flatten)]
        forest: ForestArgs,

        /// Importance method
        #[arg(long, value_enum, default_value = "structural")]
        method: ImportanceMethod,

        /// Depth decay exponent (structural)
        #[arg(long, default_value_t = 2.0)]
        decay_exponent: f64,

        /// Deepest level counted (structural)
        #[arg(long, default_value_t = 4)]
        max_depth: usize,

        /// Query CSV (mmd); the training rows when absent
        #[arg(long)]
        newdata: Option<PathBuf>,

        /// How MMD values relate to the baseline: raw, relative, difference
        #[arg(long, default_value = "difference")]
        importance_type: String,

        /// Fixed Gaussian kernel bandwidth (mmd); median heuristic when absent
        #[arg(long)]
        bandwidth: Option<f64>,

        /// Use the responses as-is instead of standardizing each column (mmd)
        #[arg(long, default_value_t = false)]
        no_scale_responses: bool,

        #[command(flatten)]
        output: OutputArgs,
    },
}

/// JSON summary printed to stdout after `predict`.
#[derive(Serialize)]
struct PredictOutput<'a> {
    functional: String,
    oob: bool,
    n_queries: usize,
    result: &'a FunctionalResult,
}

/// One query's weights, 1-based, as printed after `weights`.
#[derive(Serialize)]
struct WeightsEntryOutput {
    query: usize,
    rows: Vec<usize>,
    weights: Vec<f64>,
    effective_sample_size: f64,
}

#[derive(Serialize)]
struct WeightsOutput {
    oob: bool,
    n_queries: usize,
    queries: Vec<WeightsEntryOutput>,
}

#[derive(Serialize)]
struct SplitFrequencyOutput<'a> {
    max_depth: usize,
    feature_names: &'a [String],
    counts: &'a [Vec<usize>],
    total: usize,
}

#[derive(Serialize)]
struct ImportanceOutput<'a> {
    method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    baseline: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bandwidth: Option<f64>,
    features: &'a [RankedFeature],
}

fn load_forest(args: &ForestArgs) -> Result<Forest> {
    let mut reader = ForestReader::new(&args.forest);
    if let Some(path) = &args.features {
        let matrix = MatrixReader::new(path)
            .read()
            .context("failed to read training features CSV")?;
        reader = reader.with_features(matrix);
    }
    if let Some(path) = &args.responses {
        let matrix = MatrixReader::new(path)
            .read()
            .context("failed to read training responses CSV")?;
        reader = reader.with_responses(matrix);
    }
    reader.read().context("failed to load forest")
}

fn load_queries(path: Option<&Path>, forest: &Forest) -> Result<Option<Vec<Vec<f64>>>> {
    path.map(|p| {
        MatrixReader::new(p)
            .read_queries(forest)
            .context("failed to read query CSV")
    })
    .transpose()
}

fn result_writer(output: &OutputArgs) -> Result<Option<ResultWriter>> {
    output
        .experiment
        .clone()
        .map(|name| -> Result<ResultWriter> {
            let experiment = ExperimentName::new(name)?;
            Ok(ResultWriter::new(&output.output_dir, experiment)?)
        })
        .transpose()
}

fn parse_rank(raw: &str) -> Result<Vec<f64>> {
    raw.split(',')
        .map(|v| {
            v.trim()
                .parse::<f64>()
                .with_context(|| format!("invalid rank value \"{v}\" in \"{raw}\""))
        })
        .collect()
}

fn decode_trees(
    forest: &Forest,
    indices: &[usize],
    stats: &impl LeafStatsProvider,
) -> Result<Vec<DecodedTree>> {
    indices
        .iter()
        .map(|&i| {
            forest
                .decode_tree(i, stats)
                .with_context(|| format!("failed to decode tree {i}"))
        })
        .collect()
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match (cli.verbose, cli.quiet) {
        (true, _) => "debug",
        (_, true) => "error",
        _ => "info",
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Configure Rayon thread pool
    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure thread pool")?;
        info!(threads, "thread pool configured");
    }

    match cli.command {
        Command::Predict {
            forest,
            newdata,
            functional,
            probs,
            ranks,
            response_column,
            output,
        } => {
            let forest = load_forest(&forest)?;
            let queries = load_queries(newdata.as_deref(), &forest)?;

            let kind: FunctionalKind = functional.parse()?;
            let ranks = ranks
                .iter()
                .map(|r| parse_rank(r))
                .collect::<Result<Vec<_>>>()?;
            let mut config = PredictConfig::new(Functional::from_kind(kind, probs, ranks))?
                .with_mq_estimator(CoordinatewiseQuantiles);
            if let Some(column) = response_column {
                anyhow::ensure!(
                    (1..=forest.n_responses()).contains(&column),
                    "response column {column} outside 1..={}",
                    forest.n_responses()
                );
                config = config.with_transformation(move |y: &[f64]| vec![y[column - 1]]);
            }

            let result = predict(&forest, queries.as_deref(), &config)
                .with_context(|| format!("{kind} prediction failed"))?;

            if let Some(writer) = result_writer(&output)? {
                writer.write_prediction(&result)?;
            }
            let summary = PredictOutput {
                functional: kind.to_string(),
                oob: queries.is_none(),
                n_queries: result.n_queries(),
                result: &result,
            };
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }

        Command::Weights {
            forest,
            newdata,
            output,
        } => {
            let forest = load_forest(&forest)?;
            let queries = load_queries(newdata.as_deref(), &forest)?;

            let weights = forest
                .weights(queries.as_deref(), &WeightsConfig::new())
                .context("weighting failed")?;

            if let Some(writer) = result_writer(&output)? {
                writer.write_weights(&weights, queries.is_none())?;
            }
            let summary = WeightsOutput {
                oob: queries.is_none(),
                n_queries: weights.len(),
                queries: weights
                    .iter()
                    .enumerate()
                    .map(|(i, w)| {
                        let values: Vec<f64> = w.entries().iter().map(|(_, v)| *v).collect();
                        WeightsEntryOutput {
                            query: i + 1,
                            rows: w.entries().iter().map(|(row, _)| row + 1).collect(),
                            effective_sample_size: effective_sample_size(&values),
                            weights: values,
                        }
                    })
                    .collect(),
            };
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }

        Command::Decode {
            forest,
            tree,
            leaf_stats,
            text,
            output,
        } => {
            let forest = load_forest(&forest)?;
            let indices: Vec<usize> = match tree {
                Some(i) => vec![i],
                None => (1..=forest.n_trees()).collect(),
            };
            let decoded = if leaf_stats {
                decode_trees(&forest, &indices, &MeanResponse::default())?
            } else {
                decode_trees(&forest, &indices, &NoLeafStats)?
            };
            info!(n_trees = decoded.len(), "trees decoded");

            if let Some(writer) = result_writer(&output)? {
                writer.write_decoded(&decoded)?;
            }
            if text {
                for tree in &decoded {
                    print!("{tree}");
                }
            } else {
                println!("{}", serde_json::to_string_pretty(&decoded)?);
            }
        }

        Command::SplitFrequencies {
            forest,
            max_depth,
            output,
        } => {
            let forest = load_forest(&forest)?;
            let frequencies = forest
                .split_frequencies(max_depth)
                .context("split frequency analysis failed")?;

            if let Some(writer) = result_writer(&output)? {
                writer.write_split_frequencies(&frequencies, forest.feature_names())?;
            }
            let summary = SplitFrequencyOutput {
                max_depth: frequencies.max_depth(),
                feature_names: forest.feature_names(),
                counts: frequencies.counts(),
                total: frequencies.total(),
            };
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }

        Command::Importance {
            forest,
            method,
            decay_exponent,
            max_depth,
            newdata,
            importance_type,
            bandwidth,
            no_scale_responses,
            output,
        } => {
            let forest = load_forest(&forest)?;
            let writer = result_writer(&output)?;

            match method {
                ImportanceMethod::Structural => {
                    let config = ImportanceConfig::new()
                        .with_decay_exponent(decay_exponent)
                        .with_max_depth(max_depth);
                    let ranked = forest
                        .ranked_importance(&config)
                        .context("structural importance failed")?;
                    if let Some(writer) = &writer {
                        writer.write_importance(decay_exponent, max_depth, &ranked)?;
                    }
                    let summary = ImportanceOutput {
                        method: "structural",
                        baseline: None,
                        bandwidth: None,
                        features: &ranked,
                    };
                    println!("{}", serde_json::to_string_pretty(&summary)?);
                }
                ImportanceMethod::Mmd => {
                    let queries = load_queries(newdata.as_deref(), &forest)?;
                    let importance_type: ImportanceType = importance_type.parse()?;
                    let mut config = MmdImportanceConfig::new()
                        .with_importance_type(importance_type)
                        .with_scale_responses(!no_scale_responses)
                        .with_seed(cli.seed);
                    if let Some(h) = bandwidth {
                        config = config.with_bandwidth(h)?;
                    }
                    let result = mmd_importance(&forest, queries.as_deref(), &config)
                        .context("MMD importance failed")?;
                    if let Some(writer) = &writer {
                        writer.write_mmd_importance(&result, forest.feature_names())?;
                    }
                    let ranked = result.ranked(forest.feature_names());
                    let summary = ImportanceOutput {
                        method: "mmd",
                        baseline: Some(result.baseline),
                        bandwidth: Some(result.bandwidth),
                        features: &ranked,
                    };
                    println!("{}", serde_json::to_string_pretty(&summary)?);
                }
            }
        }
    }

    Ok(())
}
