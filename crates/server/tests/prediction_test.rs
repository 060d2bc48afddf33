//! # Prediction and Student Dashboard Endpoint Tests

mod common;

use anyhow::Result;
use chrono::Utc;
use common::TestApp;
use engagement_test_utils::seed_cohort;
use reqwest::StatusCode;
use serde_json::Value;

#[tokio::test]
async fn test_predict_without_model_is_bad_request() -> Result<()> {
    let app = TestApp::spawn().await?;
    seed_cohort(&app.app_state.sqlite_provider, 3, Utc::now()).await?;

    let response = app.client.get(app.url("/predict/1")).send().await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await?;
    assert_eq!(body["error"], "ML model not found. Train the model first.");
    Ok(())
}

#[tokio::test]
async fn test_predict_unknown_student_is_not_found() -> Result<()> {
    let app = TestApp::spawn().await?;
    seed_cohort(&app.app_state.sqlite_provider, 30, Utc::now()).await?;
    app.train().await?;

    let response = app.client.get(app.url("/predict/9999")).send().await?;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_predict_after_training() -> Result<()> {
    let app = TestApp::spawn().await?;
    seed_cohort(&app.app_state.sqlite_provider, 30, Utc::now()).await?;
    let outcome = app.train().await?;
    assert!(outcome.model_path.exists());

    let response = app.client.get(app.url("/predict/12")).send().await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await?;

    assert_eq!(body["student_id"], 12);
    let predicted = body["predicted_score"].as_f64().unwrap();
    // Targets span 10..=300 seconds, so a forest prediction stays inside.
    assert!((10.0..=300.0).contains(&predicted), "got {predicted}");
    // No writing was graded.
    assert!(body["actual_score"].is_null());
    assert_eq!(body["features"]["time_spent_per_slide"], 120.0);
    assert_eq!(body["features"]["average_accuracy_per_page"], 1.0);
    assert_eq!(body["features"]["revisits"], 1.0);
    Ok(())
}

#[tokio::test]
async fn test_student_dashboard_unknown_student() -> Result<()> {
    let app = TestApp::spawn().await?;

    let response = app.client.get(app.url("/student/42")).send().await?;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await?;
    assert_eq!(body["error"], "Student 42 not found");
    Ok(())
}

#[tokio::test]
async fn test_non_numeric_student_id_is_a_json_bad_request() -> Result<()> {
    let app = TestApp::spawn().await?;

    for path in ["/predict/abc", "/student/abc"] {
        let response = app.client.get(app.url(path)).send().await?;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{path}");
        let body: Value = response.json().await?;
        let message = body["error"].as_str().unwrap_or_default();
        assert!(message.contains("Cannot parse"), "{path}: {message}");
    }
    Ok(())
}

#[tokio::test]
async fn test_student_dashboard_summarizes_activity() -> Result<()> {
    let app = TestApp::spawn().await?;
    seed_cohort(&app.app_state.sqlite_provider, 3, Utc::now()).await?;

    let response = app.client.get(app.url("/student/3")).send().await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await?;

    assert_eq!(body["username"], "student3");
    assert_eq!(body["total_questions"], 1);
    assert_eq!(body["correct_questions"], 0);
    assert_eq!(body["question_accuracy"], 0.0);
    assert_eq!(body["avg_writing_grade"], 0.0);
    assert_eq!(body["has_data"], true);

    let activity = body["recent_activity"].as_array().unwrap();
    assert_eq!(activity.len(), 2);
    assert!(activity
        .iter()
        .any(|a| a["type"] == "slide_read" && a["title"] == "Welcome" && a["status"] == "revise"));
    assert!(activity.iter().any(|a| a["type"] == "question_attempt"));
    Ok(())
}
