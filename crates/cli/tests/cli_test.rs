//! # CLI Command Tests
//!
//! Each test runs the `engagement` binary inside its own temporary directory,
//! against a database file seeded beforehand.

use assert_cmd::prelude::*;
use chrono::Utc;
use engagement::providers::db::sqlite::SqliteProvider;
use engagement_test_utils::{sample_engagement_export, seed_cohort};
use httpmock::{Method::GET, MockServer};
use predicates::prelude::*;
use std::{path::Path, process::Command};
use tempfile::tempdir;

/// Creates a database at `path` holding `count` cohort students.
async fn seeded_db(path: &Path, count: i64) {
    let provider = SqliteProvider::new(path.to_str().unwrap())
        .await
        .expect("Failed to create database");
    provider
        .initialize_schema()
        .await
        .expect("Failed to initialize schema");
    if count > 0 {
        seed_cohort(&provider, count, Utc::now())
            .await
            .expect("Failed to seed cohort");
    }
}

fn engagement_cmd(dir: &Path, db_path: &Path) -> Command {
    let mut cmd = Command::cargo_bin("engagement").unwrap();
    cmd.current_dir(dir)
        .env_remove("DB_URL")
        .env_remove("ARTIFACT_DIR")
        .arg("--db-url")
        .arg(db_path)
        .arg("--artifact-dir")
        .arg(dir);
    cmd
}

#[tokio::test]
async fn test_build_dataset_writes_csv() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("engagement.db");
    seeded_db(&db_path, 4).await;
    let output = dir.path().join("out/dataset.csv");

    engagement_cmd(dir.path(), &db_path)
        .arg("build-dataset")
        .arg("--output")
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("Dataset created successfully: 4 rows"));

    let content = std::fs::read_to_string(&output).unwrap();
    assert!(content.starts_with("student_id,time_spent_per_slide"));
    assert_eq!(content.lines().count(), 5);
}

#[tokio::test]
async fn test_build_dataset_on_empty_store_warns_and_succeeds() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("engagement.db");
    seeded_db(&db_path, 0).await;

    engagement_cmd(dir.path(), &db_path)
        .arg("build-dataset")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "No dataset created. Check if engagement data exists.",
        ));

    assert!(!dir.path().join("dataset.csv").exists());
}

#[tokio::test]
async fn test_retrain_trains_and_cleans_up() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("engagement.db");
    seeded_db(&db_path, 30).await;

    engagement_cmd(dir.path(), &db_path)
        .arg("retrain")
        .assert()
        .success()
        .stdout(predicate::str::contains("Model retraining completed successfully!"))
        .stdout(predicate::str::contains("R² Score:"));

    assert!(dir.path().join("model.json").exists());
    assert!(dir.path().join("metrics.json").exists());
    assert!(!dir.path().join("dataset_retrain.csv").exists());
}

#[tokio::test]
async fn test_retrain_without_data_is_a_no_op() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("engagement.db");
    seeded_db(&db_path, 0).await;

    engagement_cmd(dir.path(), &db_path)
        .arg("retrain")
        .assert()
        .success()
        .stdout(predicate::str::contains("No new data available for retraining."));

    assert!(!dir.path().join("model.json").exists());
}

#[tokio::test]
async fn test_forced_retrain_without_any_dataset_fails() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("engagement.db");
    seeded_db(&db_path, 0).await;

    engagement_cmd(dir.path(), &db_path)
        .arg("retrain")
        .arg("--force")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no previous dataset"));
}

#[tokio::test]
async fn test_train_then_predict() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("engagement.db");
    seeded_db(&db_path, 30).await;

    engagement_cmd(dir.path(), &db_path)
        .arg("build-dataset")
        .assert()
        .success();
    engagement_cmd(dir.path(), &db_path)
        .arg("train")
        .arg("--dataset")
        .arg(dir.path().join("dataset.csv"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Feature importance:"));

    engagement_cmd(dir.path(), &db_path)
        .arg("predict")
        .arg("5")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"student_id\": 5"))
        .stdout(predicate::str::contains("predicted_score"));
}

#[tokio::test]
async fn test_train_with_missing_dataset_fails() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("engagement.db");

    engagement_cmd(dir.path(), &db_path)
        .arg("train")
        .arg("--dataset")
        .arg("nope.csv")
        .assert()
        .failure()
        .stderr(predicate::str::contains("nope.csv"));
}

#[tokio::test]
async fn test_predict_without_model_fails() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("engagement.db");
    seeded_db(&db_path, 3).await;

    engagement_cmd(dir.path(), &db_path)
        .arg("predict")
        .arg("1")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Train the model first"));
}

#[tokio::test]
async fn test_import_from_mocked_textbook() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("engagement.db");
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/engagement")
                .cookie("sessionid", "sess-9");
            then.status(200).json_body(sample_engagement_export());
        })
        .await;

    engagement_cmd(dir.path(), &db_path)
        .arg("import")
        .arg("--sessionid")
        .arg("sess-9")
        .arg("--data-api-url")
        .arg(server.url("/api/engagement"))
        .assert()
        .success()
        .stdout(predicate::str::contains("1 new students, 0 skipped"));

    mock.assert_async().await;
}
