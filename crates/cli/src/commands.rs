//! # Command Handlers
//!
//! Thin orchestration over the `engagement` library. Each handler prints a short
//! report to stdout and returns an error for the caller to turn into a failing
//! exit code.

use crate::{BuildDatasetArgs, Cli, ImportArgs, PredictArgs, RetrainArgs, TrainArgs};
use anyhow::{bail, Context, Result};
use engagement::{
    constants::{DEFAULT_DATASET_FILE, MODEL_FILE, RETRAIN_DATASET_FILE},
    dataset::build_dataset_csv,
    ingest::{fetch_and_import, SessionCredentials, TextbookClient},
    prediction::{predict_for_student, ModelStore},
    providers::db::sqlite::SqliteProvider,
    training::{train_model, TrainingOutcome},
};
use std::{fs, path::Path, time::Duration};
use tracing::{info, warn};

/// Opens the store at `db_url`, creating the file and schema when missing.
async fn open_store(db_url: &str) -> Result<SqliteProvider> {
    if let Some(parent) = Path::new(db_url).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let provider = SqliteProvider::new(db_url)
        .await
        .with_context(|| format!("Failed to open database '{db_url}'"))?;
    provider.initialize_schema().await?;
    Ok(provider)
}

fn report_training(outcome: &TrainingOutcome) {
    let metrics = &outcome.metrics;
    println!("Model saved to: {}", outcome.model_path.display());
    println!("Metrics saved to: {}", outcome.metrics_path.display());
    println!("R² Score: {:.3}", metrics.r2);
    println!("RMSE: {:.2}", metrics.mse.sqrt());
    println!("Feature importance:");
    for item in &outcome.artifact.feature_importance {
        println!("  {}: {:.4}", item.feature, item.importance);
    }
}

pub async fn handle_build_dataset(cli: &Cli, args: &BuildDatasetArgs) -> Result<()> {
    println!("Building dataset for the last {} days...", args.days);
    let provider = open_store(&cli.db_url).await?;

    match build_dataset_csv(&provider.db, args.days, &args.output).await? {
        Some(dataset) => {
            let (lo, hi) = dataset.score_range();
            println!(
                "Dataset created successfully: {} rows, {} columns",
                dataset.len(),
                engagement::Dataset::columns().len()
            );
            println!("Score range: {lo:.1} - {hi:.1}");
            println!("Saved to: {}", args.output.display());
            Ok(())
        }
        None => {
            warn!("No dataset created: no usable engagement data");
            println!("WARNING: No dataset created. Check if engagement data exists.");
            Ok(())
        }
    }
}

pub async fn handle_retrain(cli: &Cli, args: &RetrainArgs) -> Result<()> {
    println!("Starting model retraining (last {} days)...", args.days);
    let provider = open_store(&cli.db_url).await?;
    let retrain_path = cli.artifact_dir.join(RETRAIN_DATASET_FILE);

    let fresh = build_dataset_csv(&provider.db, args.days, &retrain_path)
        .await?
        .is_some();

    let dataset_path = if fresh {
        retrain_path.clone()
    } else {
        warn!("No new data available for retraining");
        println!("No new data available for retraining.");
        if !args.force {
            return Ok(());
        }
        let fallback = cli.artifact_dir.join(DEFAULT_DATASET_FILE);
        if !fallback.exists() {
            bail!(
                "--force given but no previous dataset exists at '{}'",
                fallback.display()
            );
        }
        println!("Force flag set, continuing with '{}'...", fallback.display());
        fallback
    };

    println!("Training new model...");
    let outcome = train_model(&dataset_path, &cli.artifact_dir)?;

    if fresh {
        fs::remove_file(&retrain_path)
            .with_context(|| format!("Failed to remove '{}'", retrain_path.display()))?;
    }
    info!("Retraining finished");
    println!("Model retraining completed successfully!");
    report_training(&outcome);
    Ok(())
}

pub fn handle_train(cli: &Cli, args: &TrainArgs) -> Result<()> {
    let output_dir = args.output_dir.as_deref().unwrap_or(&cli.artifact_dir);
    println!("Training model from '{}'...", args.dataset.display());
    fs::create_dir_all(output_dir)?;
    let outcome = train_model(&args.dataset, output_dir)?;
    report_training(&outcome);
    Ok(())
}

pub async fn handle_import(cli: &Cli, args: &ImportArgs) -> Result<()> {
    let provider = open_store(&cli.db_url).await?;
    let client = TextbookClient::new(
        args.data_api_url.clone(),
        Duration::from_secs(args.timeout_secs),
    )?;
    let credentials = SessionCredentials::new(args.sessionid.clone(), args.csrftoken.clone());

    println!("Importing engagement data from '{}'...", client.url());
    let summary = fetch_and_import(&provider.db, &client, &credentials).await?;
    println!(
        "Imported {} records ({} new students, {} skipped).",
        summary.total_imported(),
        summary.students_created,
        summary.skipped
    );
    Ok(())
}

pub async fn handle_predict(cli: &Cli, args: &PredictArgs) -> Result<()> {
    let provider = open_store(&cli.db_url).await?;
    let store = ModelStore::new(cli.artifact_dir.join(MODEL_FILE));
    let prediction = predict_for_student(&provider.db, &store, args.student_id, args.days).await?;
    println!("{}", serde_json::to_string_pretty(&prediction)?);
    Ok(())
}
