//! # Import Handlers
//!
//! The manual import takes the user's textbook session cookies from a form and
//! pulls their engagement data. Every failure ends on the auth reminder page.

use super::AppState;
use axum::{
    extract::{Query, State},
    http::header,
    response::{AppendHeaders, IntoResponse, Redirect, Response},
    Form, Json,
};
use engagement::ingest::{fetch_and_import, SessionCredentials};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

#[derive(Deserialize, Debug, Default)]
pub struct ManualImportForm {
    #[serde(default)]
    pub sessionid: Option<String>,
    #[serde(default)]
    pub csrftoken: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct ReminderParams {
    pub reason: Option<String>,
}

/// The handler for `POST /manual-import`.
pub async fn manual_import_handler(
    State(app_state): State<AppState>,
    Form(form): Form<ManualImportForm>,
) -> Response {
    let Some(sessionid) = form.sessionid.filter(|s| !s.trim().is_empty()) else {
        warn!("Manual import requested without a session id");
        return Redirect::to("/auth-reminder?reason=missing_session").into_response();
    };
    let credentials = SessionCredentials::new(
        sessionid,
        form.csrftoken.filter(|s| !s.is_empty()),
    );

    match fetch_and_import(
        &app_state.sqlite_provider.db,
        &app_state.textbook_client,
        &credentials,
    )
    .await
    {
        Ok(summary) => {
            info!(?summary, "Manual import finished");
            (
                AppendHeaders([(header::SET_COOKIE, "data_imported=true; Path=/")]),
                Redirect::to("/"),
            )
                .into_response()
        }
        Err(e) => {
            warn!("Manual import failed: {e}");
            Redirect::to("/auth-reminder?reason=import_failed").into_response()
        }
    }
}

/// The handler for `GET /auth-reminder`.
pub async fn auth_reminder(Query(params): Query<ReminderParams>) -> Json<Value> {
    let message = match params.reason.as_deref() {
        Some("missing_session") => "No session found. Please log in to the textbook first.",
        Some("import_failed") => "Import failed. Try authenticating again.",
        _ => "Log in to the textbook, then start the import again.",
    };
    Json(json!({
        "message": message,
        "reason": params.reason,
    }))
}
