//! # Common Test Utilities
//!
//! `TestApp` spawns the real server on a random port with a temporary database,
//! a temporary artifact directory, and the textbook endpoint pointed at an
//! `httpmock::MockServer`.

// Not every test binary uses every helper.
#![allow(unused)]

use anyhow::Result;
use axum::serve;
use engagement::{
    dataset::build_dataset_csv,
    training::{train_model, TrainingOutcome},
};
use engagement_server::{
    config, router,
    state::{build_app_state, AppState},
};
use httpmock::MockServer;
use reqwest::{redirect::Policy, Client};
use std::{fs, net::SocketAddr, path::PathBuf};
use tempfile::{tempdir, NamedTempFile, TempDir};
use tokio::{net::TcpListener, task::JoinHandle};

pub const TEST_USERNAME: &str = "admin";
pub const TEST_PASSWORD: &str = "s3cret";

/// A harness for end-to-end testing of the Axum server.
pub struct TestApp {
    pub address: String,
    /// A client that does not follow redirects, so tests can inspect them.
    pub client: Client,
    pub mock_server: MockServer,
    pub app_state: AppState,
    pub artifact_dir: PathBuf,
    _db_file: NamedTempFile,
    _artifact_dir: TempDir,
    _config_dir: TempDir,
    _server_handle: JoinHandle<()>,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestApp {
    /// Spawns the server with dashboard credentials configured.
    pub async fn spawn() -> Result<Self> {
        Self::spawn_with_auth(true).await
    }

    pub async fn spawn_with_auth(with_auth: bool) -> Result<Self> {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .compact()
            .try_init();

        let mock_server = MockServer::start_async().await;
        let db_file = NamedTempFile::new()?;
        let artifact_dir = tempdir()?;
        let config_dir = tempdir()?;

        let auth_section = if with_auth {
            format!("auth:\n  username: \"{TEST_USERNAME}\"\n  password: \"{TEST_PASSWORD}\"\n")
        } else {
            String::new()
        };
        let config_content = format!(
            r#"
port: 0
db_url: "{}"
artifact_dir: "{}"
lookback_days: 30
textbook:
  data_api_url: "{}"
  timeout_secs: 2
{auth_section}"#,
            db_file.path().display(),
            artifact_dir.path().display(),
            mock_server.url("/api/engagement"),
        );
        let config_path = config_dir.path().join("config.yml");
        fs::write(&config_path, config_content)?;

        let config_path = config_path.to_string_lossy().to_string();
        let config = config::get_config(Some(&config_path))?;
        let app_state = build_app_state(config).await?;

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr: SocketAddr = listener.local_addr()?;
        let address = format!("http://{addr}");

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
        let state_for_server = app_state.clone();
        let server_handle = tokio::spawn(async move {
            let app = router::create_router(state_for_server);
            let server = serve(listener, app).with_graceful_shutdown(async {
                shutdown_rx.await.ok();
            });
            if let Err(e) = server.await {
                tracing::error!("[TestApp] Server error: {}", e);
            }
        });

        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        Ok(Self {
            address,
            client: Client::builder().redirect(Policy::none()).build()?,
            mock_server,
            app_state,
            artifact_dir: artifact_dir.path().to_path_buf(),
            _db_file: db_file,
            _artifact_dir: artifact_dir,
            _config_dir: config_dir,
            _server_handle: server_handle,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    /// Builds the dataset from the app's database and trains a model into the
    /// app's artifact directory.
    pub async fn train(&self) -> Result<TrainingOutcome> {
        let dataset_path = self.artifact_dir.join("dataset.csv");
        build_dataset_csv(
            &self.app_state.sqlite_provider.db,
            self.app_state.config.lookback_days,
            &dataset_path,
        )
        .await?
        .ok_or_else(|| anyhow::anyhow!("no dataset rows were built"))?;
        Ok(train_model(&dataset_path, &self.artifact_dir)?)
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
