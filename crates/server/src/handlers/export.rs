//! # Export Handlers
//!
//! The current dataset as a CSV download or a JSON document.

use super::{AppError, AppState};
use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use engagement::dataset::{build_dataset, Dataset};
use serde_json::{json, Value};
use tracing::info;

const NO_DATA: &str = "No data available for export";

async fn current_dataset(app_state: &AppState) -> Result<Dataset, AppError> {
    build_dataset(
        &app_state.sqlite_provider.db,
        app_state.config.lookback_days,
    )
    .await?
    .ok_or_else(|| AppError::BadRequest(NO_DATA.to_string()))
}

/// The handler for `GET /export/csv`.
pub async fn export_csv_handler(State(app_state): State<AppState>) -> Result<Response, AppError> {
    let dataset = current_dataset(&app_state).await?;
    let body = dataset.to_csv_string()?;
    info!(rows = dataset.len(), "Exporting dataset as CSV");
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"engagement_dataset.csv\"",
            ),
        ],
        body,
    )
        .into_response())
}

/// The handler for `GET /export/json`.
pub async fn export_json_handler(State(app_state): State<AppState>) -> Result<Json<Value>, AppError> {
    let dataset = current_dataset(&app_state).await?;
    let total_records = dataset.len();
    info!(rows = total_records, "Exporting dataset as JSON");
    Ok(Json(json!({
        "data": dataset.rows,
        "metadata": {
            "total_records": total_records,
            "features": Dataset::columns(),
            "exported_at": Utc::now().to_rfc3339(),
        },
    })))
}
