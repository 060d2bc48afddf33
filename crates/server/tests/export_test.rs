//! # Export Endpoint Tests

mod common;

use anyhow::Result;
use chrono::Utc;
use common::TestApp;
use engagement_test_utils::seed_cohort;
use reqwest::StatusCode;
use serde_json::Value;

#[tokio::test]
async fn test_export_csv_on_empty_store_is_bad_request() -> Result<()> {
    let app = TestApp::spawn().await?;

    let response = app.client.get(app.url("/export/csv")).send().await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await?;
    assert_eq!(body["error"], "No data available for export");
    Ok(())
}

#[tokio::test]
async fn test_export_csv_is_an_attachment() -> Result<()> {
    let app = TestApp::spawn().await?;
    seed_cohort(&app.app_state.sqlite_provider, 3, Utc::now()).await?;

    let response = app.client.get(app.url("/export/csv")).send().await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "text/csv");
    assert_eq!(
        response.headers()["content-disposition"],
        "attachment; filename=\"engagement_dataset.csv\""
    );
    let body = response.text().await?;
    let mut lines = body.lines();
    assert_eq!(
        lines.next(),
        Some("student_id,time_spent_per_slide,average_accuracy_per_page,attempt_count_per_question,revisits,score")
    );
    assert_eq!(lines.count(), 3);
    Ok(())
}

#[tokio::test]
async fn test_export_json_includes_metadata() -> Result<()> {
    let app = TestApp::spawn().await?;
    seed_cohort(&app.app_state.sqlite_provider, 3, Utc::now()).await?;

    let response = app.client.get(app.url("/export/json")).send().await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await?;

    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 3);
    assert_eq!(body["metadata"]["total_records"], 3);
    assert_eq!(body["metadata"]["features"][0], "student_id");
    assert_eq!(body["metadata"]["features"][5], "score");
    assert!(body["metadata"]["exported_at"].as_str().is_some());

    let second = data.iter().find(|row| row["student_id"] == 2).unwrap();
    assert_eq!(second["time_spent_per_slide"], 20.0);
    assert_eq!(second["score"], 20.0);
    Ok(())
}

#[tokio::test]
async fn test_export_json_on_empty_store_is_bad_request() -> Result<()> {
    let app = TestApp::spawn().await?;

    let response = app.client.get(app.url("/export/json")).send().await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}
