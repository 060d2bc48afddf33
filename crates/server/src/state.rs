//! # Application State
//!
//! This module defines the shared application state (`AppState`) and the logic
//! for building it at startup. The `AppState` holds all shared resources: the
//! configuration, the engagement store, the model handle and the textbook client.

use crate::config::AppConfig;
use engagement::{
    constants::MODEL_FILE, ingest::TextbookClient, prediction::ModelStore,
    providers::db::sqlite::SqliteProvider,
};
use std::{path::Path, sync::Arc, time::Duration};
use tracing::info;

/// The shared application state, accessible from all request handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// The application's configuration.
    pub config: Arc<AppConfig>,
    /// The engagement store.
    pub sqlite_provider: Arc<SqliteProvider>,
    /// The model artifact handle, reloaded when the file changes.
    pub model_store: Arc<ModelStore>,
    /// The client for the textbook's engagement endpoint.
    pub textbook_client: Arc<TextbookClient>,
}

/// Builds the shared application state from the configuration.
///
/// Opens (and if needed creates) the database, applies the schema, and points the
/// model handle at `<artifact_dir>/model.json`. A missing model is not an error here.
pub async fn build_app_state(config: AppConfig) -> anyhow::Result<AppState> {
    if let Some(parent) = Path::new(&config.db_url).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let sqlite_provider = SqliteProvider::new(&config.db_url).await?;
    sqlite_provider.initialize_schema().await?;

    let model_path = Path::new(&config.artifact_dir).join(MODEL_FILE);
    info!("Model artifact expected at '{}'", model_path.display());
    let model_store = ModelStore::new(model_path);

    let textbook_client = TextbookClient::new(
        config.textbook.data_api_url.clone(),
        Duration::from_secs(config.textbook.timeout_secs),
    )?;

    Ok(AppState {
        config: Arc::new(config),
        sqlite_provider: Arc::new(sqlite_provider),
        model_store: Arc::new(model_store),
        textbook_client: Arc::new(textbook_client),
    })
}
