//! # General Route Handlers
//!
//! The homepage dashboard and the health check.

use super::{AppError, AppState};
use axum::{extract::State, Json};
use engagement::dashboard::{dashboard_metrics, DashboardMetrics};

/// The handler for the root (`/`) endpoint: the homepage dashboard metrics.
pub async fn root(State(app_state): State<AppState>) -> Result<Json<DashboardMetrics>, AppError> {
    let metrics = dashboard_metrics(
        &app_state.sqlite_provider.db,
        &app_state.model_store,
        app_state.config.lookback_days,
    )
    .await?;
    Ok(Json(metrics))
}

/// The handler for the health check (`/health`) endpoint.
pub async fn health_check() -> &'static str {
    "OK"
}
