//! # Login Handlers
//!
//! A single dashboard account, checked against the configured credentials.

use super::{AppError, AppState};
use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
    Form, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

#[derive(Deserialize, Debug)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// The handler for `GET /login`.
pub async fn login_page() -> Json<Value> {
    Json(json!({
        "message": "Submit 'username' and 'password' as a form to POST /login.",
    }))
}

/// The handler for `POST /login`. Redirects to the homepage on success.
pub async fn login_handler(
    State(app_state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let auth = &app_state.config.auth;
    let (Some(username), Some(password)) = (&auth.username, &auth.password) else {
        warn!("Login attempted but no credentials are configured");
        return Err(AppError::Unauthorized(
            "Login is not configured on this server.".to_string(),
        ));
    };

    if form.username == *username && form.password == *password {
        info!(username = %form.username, "Login succeeded");
        Ok(Redirect::to("/").into_response())
    } else {
        warn!(username = %form.username, "Login failed");
        Err(AppError::Unauthorized(
            "Invalid username or password.".to_string(),
        ))
    }
}
