use axum::{
    extract::rejection::PathRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use engagement::{DashboardError, DatasetError, PredictError};
use serde_json::json;
use tracing::error;

/// A custom error type for the server application.
///
/// This enum encapsulates different kinds of errors that can occur within the server,
/// allowing them to be converted into appropriate HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Errors from the prediction service.
    Predict(PredictError),
    /// Errors while building a dashboard.
    Dashboard(DashboardError),
    /// Errors while building an export.
    Dataset(DatasetError),
    /// The requested resource does not exist.
    NotFound(String),
    /// The request cannot be served as asked.
    BadRequest(String),
    /// Credentials were rejected.
    Unauthorized(String),
}

impl From<PredictError> for AppError {
    fn from(err: PredictError) -> Self {
        AppError::Predict(err)
    }
}

impl From<DashboardError> for AppError {
    fn from(err: DashboardError) -> Self {
        AppError::Dashboard(err)
    }
}

impl From<DatasetError> for AppError {
    fn from(err: DatasetError) -> Self {
        AppError::Dataset(err)
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status_code, error_message) = match self {
            AppError::Predict(err) => {
                error!("PredictError: {:?}", err);
                match err {
                    PredictError::StudentNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
                    PredictError::ModelNotFound(_) | PredictError::Internal(_) => {
                        (StatusCode::BAD_REQUEST, err.to_string())
                    }
                }
            }
            AppError::Dashboard(err) => {
                error!("DashboardError: {:?}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
            AppError::Dataset(err) => {
                error!("DatasetError: {:?}", err);
                (StatusCode::BAD_REQUEST, err.to_string())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status_code, body).into_response()
    }
}
