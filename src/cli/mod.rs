//! Command-line interface for feature generation, training, prediction and serving

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::inference::{InferenceConfig, InferenceEngine, RequestBody};
use crate::server::{run_server, ServerConfig};
use crate::timeseries::{FeatureConfig, FeaturePipeline, FeatureTable};
use crate::training::{ModelType, TrainEngine, TrainingConfig};
use crate::utils::DataLoader;

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn step_run(msg: &str) {
    eprint!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    eprintln!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    eprintln!();
    eprintln!("  {}", title.white().bold());
    eprintln!("  {}", dim(&"─".repeat(56)));
}

fn kv(key: &str, val: &str) {
    eprintln!("  {:<16} {}", muted(key), val.white());
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "energy-forecast")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Household energy consumption forecasting: features, training and serving")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Derive the windowed feature table from an hourly readings CSV
    Features {
        /// Hourly readings CSV
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory for Parquet shards
        #[arg(short, long)]
        output: PathBuf,

        /// Maximum rows per shard file
        #[arg(long, default_value = "100000")]
        shard_rows: usize,
    },

    /// Train a model on a directory of feature shards
    Train {
        /// Directory of feature table shards
        #[arg(long, env = "SM_CHANNEL_TRAINING", default_value = "./data")]
        train: PathBuf,

        /// Where the model artifact is written
        #[arg(long, env = "SM_MODEL_DIR", default_value = "./model")]
        model_dir: PathBuf,

        /// Where metrics.json is written
        #[arg(long, env = "SM_OUTPUT_DATA_DIR", default_value = "./output")]
        output_data_dir: PathBuf,

        /// Model type (random_forest, decision_tree)
        #[arg(short, long, default_value = "random_forest")]
        model: String,

        /// Number of trees
        #[arg(long, default_value = "100")]
        n_estimators: usize,

        /// Maximum tree depth
        #[arg(long, default_value = "20")]
        max_depth: usize,

        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Predict from a JSON request file and print the predictions
    Predict {
        /// Model artifact directory
        #[arg(long, env = "MODEL_DIR", default_value = "./model")]
        model_dir: PathBuf,

        /// JSON request (records, rows or a `data` envelope)
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Start the HTTP inference server
    Serve {
        /// Server host
        #[arg(long, env = "API_HOST", default_value = "0.0.0.0")]
        host: String,

        /// Server port
        #[arg(short, long, env = "API_PORT", default_value = "8080")]
        port: u16,

        /// Model artifact directory
        #[arg(long, env = "MODEL_DIR", default_value = "./model")]
        model_dir: PathBuf,
    },
}

fn parse_model_type(name: &str) -> anyhow::Result<ModelType> {
    match name {
        "random_forest" | "rf" => Ok(ModelType::RandomForest),
        "decision_tree" | "tree" => Ok(ModelType::DecisionTree),
        _ => anyhow::bail!("Invalid model type: {}", name),
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_features(input: &Path, output: &Path, shard_rows: usize) -> anyhow::Result<()> {
    section("Features");

    step_run("Loading readings");
    let start = Instant::now();
    let readings = DataLoader::new().load_readings(input)?;
    step_done(&format!("{} rows in {:?}", readings.len(), start.elapsed()));

    step_run("Deriving windowed features");
    let start = Instant::now();
    let table = FeaturePipeline::new(FeatureConfig::default())?.run(readings)?;
    step_done(&format!("{} rows × {} cols in {:?}", table.len(), table.columns().len(), start.elapsed()));

    step_run(&format!("Writing shards → {}", output.display()));
    let shards = table.write_shards(output, shard_rows)?;
    step_done(&format!("{} file(s)", shards.len()));

    eprintln!();
    Ok(())
}

pub fn cmd_train(
    train_dir: &Path,
    model_dir: &Path,
    output_dir: &Path,
    config: TrainingConfig,
) -> anyhow::Result<()> {
    section("Train");

    step_run(&format!("Reading shards from {}", train_dir.display()));
    let table = FeatureTable::read_dir(train_dir)?;
    step_done(&format!("{} rows", table.len()));

    step_run(&format!("Training {}", format!("{:?}", config.model_type).cyan()));
    let start = Instant::now();
    let mut engine = TrainEngine::new(config);
    let report = engine.fit(&table)?;
    step_done(&format!("{:?}", start.elapsed()));

    let metrics_path = report.save(output_dir)?;
    engine.into_artifact()?.save(model_dir)?;

    eprintln!();
    kv("train RMSE", &format!("{:.4}", report.train_rmse));
    kv("test RMSE", &format!("{:.4}", report.test_rmse));
    kv("test MAE", &format!("{:.4}", report.test_mae));
    kv("test R²", &format!("{:.4}", report.test_r2));
    kv("rows", &format!("{} train / {} test", report.n_train, report.n_test));
    if let Some(top) = report.feature_importance.first() {
        kv("top feature", &format!("{} ({:.3})", top.feature, top.importance));
    }
    kv("model", &model_dir.display().to_string());
    kv("metrics", &metrics_path.display().to_string());
    eprintln!();

    Ok(())
}

pub fn cmd_predict(model_dir: &Path, input: &Path) -> anyhow::Result<()> {
    let engine = InferenceEngine::load(InferenceConfig::default(), model_dir)?;
    let body: RequestBody = serde_json::from_reader(std::io::BufReader::new(std::fs::File::open(input)?))?;
    let predictions = engine.predict_body(body)?;
    println!("{}", serde_json::to_string(&predictions)?);
    Ok(())
}

pub async fn cmd_serve(host: &str, port: u16, model_dir: &Path) -> anyhow::Result<()> {
    section("Serve");
    kv("address", &format!("http://{}:{}", host, port));
    kv("model", &model_dir.display().to_string());
    eprintln!();

    let config = ServerConfig::default()
        .with_host(host)
        .with_port(port)
        .with_model_dir(model_dir);
    run_server(config).await
}

/// Dispatch a parsed command line
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Features { input, output, shard_rows } => cmd_features(&input, &output, shard_rows),
        Commands::Train {
            train,
            model_dir,
            output_data_dir,
            model,
            n_estimators,
            max_depth,
            seed,
        } => {
            let config = TrainingConfig::default()
                .with_model_type(parse_model_type(&model)?)
                .with_n_estimators(n_estimators)
                .with_max_depth(Some(max_depth))
                .with_random_state(seed);
            cmd_train(&train, &model_dir, &output_data_dir, config)
        }
        Commands::Predict { model_dir, input } => cmd_predict(&model_dir, &input),
        Commands::Serve { host, port, model_dir } => cmd_serve(&host, port, &model_dir).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_train_flags() {
        let cli = Cli::try_parse_from([
            "energy-forecast",
            "train",
            "--train",
            "shards",
            "--model-dir",
            "m",
            "--output-data-dir",
            "o",
            "--n-estimators",
            "5",
        ])
        .unwrap();
        match cli.command {
            Commands::Train { train, n_estimators, max_depth, .. } => {
                assert_eq!(train, PathBuf::from("shards"));
                assert_eq!(n_estimators, 5);
                assert_eq!(max_depth, 20);
            }
            _ => panic!("expected train"),
        }
    }

    #[test]
    fn test_parse_model_type() {
        assert!(matches!(parse_model_type("decision_tree"), Ok(ModelType::DecisionTree)));
        assert!(parse_model_type("svm").is_err());
    }
}
