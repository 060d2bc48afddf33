//! # engagement: the command-line interface for the engagement pipeline
//!
//! Builds datasets, (re)trains the score model, imports textbook data and
//! scores single students against the local store.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use engagement::{
    constants::{DEFAULT_DATASET_FILE, DEFAULT_DB_FILE, DEFAULT_LOOKBACK_DAYS},
    ingest::DEFAULT_DATA_API_URL,
};
use std::{fs::File, path::PathBuf, process::ExitCode};
use tracing::error;
use tracing_subscriber::{fmt, EnvFilter};

// --- CLI Definition ---

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// The SQLite database holding the engagement records
    #[arg(long, global = true, env = "DB_URL", default_value = DEFAULT_DB_FILE)]
    pub db_url: String,
    /// The directory holding model.json and metrics.json
    #[arg(long, global = true, env = "ARTIFACT_DIR", default_value = ".")]
    pub artifact_dir: PathBuf,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the training dataset from the local store
    BuildDataset(BuildDatasetArgs),
    /// Rebuild the dataset and retrain the model
    Retrain(RetrainArgs),
    /// Train the model from an existing dataset file
    Train(TrainArgs),
    /// Import engagement data from the textbook server
    Import(ImportArgs),
    /// Predict the score of one student
    Predict(PredictArgs),
}

#[derive(Parser, Debug)]
pub struct BuildDatasetArgs {
    /// Number of days to look back for engagement data
    #[arg(long, default_value_t = DEFAULT_LOOKBACK_DAYS)]
    pub days: i64,
    /// Output CSV file path
    #[arg(long, default_value = DEFAULT_DATASET_FILE)]
    pub output: PathBuf,
}

#[derive(Parser, Debug)]
pub struct RetrainArgs {
    /// Retrain from the last dataset even if no new data is available
    #[arg(long)]
    pub force: bool,
    /// Number of days to look back for engagement data
    #[arg(long, default_value_t = DEFAULT_LOOKBACK_DAYS)]
    pub days: i64,
}

#[derive(Parser, Debug)]
pub struct TrainArgs {
    /// The dataset CSV to train on
    #[arg(long, default_value = DEFAULT_DATASET_FILE)]
    pub dataset: PathBuf,
    /// Where to write model.json and metrics.json (defaults to --artifact-dir)
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct ImportArgs {
    /// The textbook `sessionid` cookie
    #[arg(long, env = "TEXTBOOK_SESSIONID")]
    pub sessionid: String,
    /// The textbook `csrftoken` cookie
    #[arg(long, env = "TEXTBOOK_CSRFTOKEN")]
    pub csrftoken: Option<String>,
    /// The textbook engagement endpoint
    #[arg(long, env = "ENGAGEMENT_TEXTBOOK__DATA_API_URL", default_value = DEFAULT_DATA_API_URL)]
    pub data_api_url: String,
    /// Request timeout in seconds
    #[arg(long, default_value_t = 8)]
    pub timeout_secs: u64,
}

#[derive(Parser, Debug)]
pub struct PredictArgs {
    /// The student to score
    pub student_id: i64,
    /// Number of days to look back for engagement data
    #[arg(long, default_value_t = DEFAULT_LOOKBACK_DAYS)]
    pub days: i64,
}

// --- Main Application Entry ---

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Setup logging to a file
    let log_file = File::create("engagement-cli.log")?;
    let subscriber = fmt::Subscriber::builder()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::BuildDataset(args) => commands::handle_build_dataset(&cli, args).await,
        Commands::Retrain(args) => commands::handle_retrain(&cli, args).await,
        Commands::Train(args) => commands::handle_train(&cli, args),
        Commands::Import(args) => commands::handle_import(&cli, args).await,
        Commands::Predict(args) => commands::handle_predict(&cli, args).await,
    };

    match result {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            error!("Command failed: {e:#}");
            eprintln!("Error: {e:#}");
            Ok(ExitCode::FAILURE)
        }
    }
}
