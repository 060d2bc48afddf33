//! # Prediction and Student Handlers

use super::{AppError, AppState};
use axum::{
    extract::{rejection::PathRejection, Path, State},
    Json,
};
use engagement::{
    dashboard::{student_dashboard, StudentDashboard},
    prediction::{predict_for_student, Prediction},
};
use tracing::info;

/// The handler for `GET /predict/{student_id}`.
pub async fn predict_handler(
    State(app_state): State<AppState>,
    student_id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Prediction>, AppError> {
    let Path(student_id) = student_id?;
    info!(student_id, "Received prediction request");
    let prediction = predict_for_student(
        &app_state.sqlite_provider.db,
        &app_state.model_store,
        student_id,
        app_state.config.lookback_days,
    )
    .await?;
    Ok(Json(prediction))
}

/// The handler for `GET /student/{student_id}`.
pub async fn student_dashboard_handler(
    State(app_state): State<AppState>,
    student_id: Result<Path<i64>, PathRejection>,
) -> Result<Json<StudentDashboard>, AppError> {
    let Path(student_id) = student_id?;
    student_dashboard(
        &app_state.sqlite_provider.db,
        student_id,
        app_state.config.lookback_days,
    )
    .await?
    .map(Json)
    .ok_or_else(|| AppError::NotFound(format!("Student {student_id} not found")))
}
