use super::{handlers, state::AppState};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Creates the Axum router with all the application routes.
pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health_check))
        .route(
            "/login",
            get(handlers::login_page).post(handlers::login_handler),
        )
        .route("/manual-import", post(handlers::manual_import_handler))
        .route("/auth-reminder", get(handlers::auth_reminder))
        .route("/predict/{student_id}", get(handlers::predict_handler))
        .route("/student/{student_id}", get(handlers::student_dashboard_handler))
        .route("/export/csv", get(handlers::export_csv_handler))
        .route("/export/json", get(handlers::export_json_handler))
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
}
