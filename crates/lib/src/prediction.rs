//! # Prediction Service
//!
//! Scores a single student with the persisted model. The artifact is held by a
//! [`ModelStore`], which is shared by every request and reloads the file when it
//! changes on disk.

use crate::{
    errors::StoreError,
    features::{aggregate_student_features, writing_summary, FeatureError},
    training::{ModelArtifact, TrainError},
    types::round1,
};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Arc,
    time::SystemTime,
};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};
use turso::Database;

#[derive(Error, Debug)]
pub enum PredictError {
    #[error("ML model not found. Train the model first.")]
    ModelNotFound(PathBuf),
    #[error("Student {0} not found")]
    StudentNotFound(i64),
    #[error("Prediction failed: {0}")]
    Internal(String),
}

impl From<FeatureError> for PredictError {
    fn from(err: FeatureError) -> Self {
        PredictError::Internal(err.to_string())
    }
}

impl From<StoreError> for PredictError {
    fn from(err: StoreError) -> Self {
        PredictError::Internal(err.to_string())
    }
}

impl From<TrainError> for PredictError {
    fn from(err: TrainError) -> Self {
        PredictError::Internal(err.to_string())
    }
}

/// The result of scoring one student.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Prediction {
    pub student_id: i64,
    pub predicted_score: f64,
    pub actual_score: Option<f64>,
    pub features: BTreeMap<String, f64>,
}

struct CachedModel {
    modified: SystemTime,
    artifact: Arc<ModelArtifact>,
}

/// A handle over the model artifact on disk.
///
/// The first call to [`ModelStore::current`] loads the file; later calls reuse
/// the cached artifact until the file's modification time changes.
pub struct ModelStore {
    path: PathBuf,
    cache: RwLock<Option<CachedModel>>,
}

impl std::fmt::Debug for ModelStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl ModelStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: RwLock::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the current artifact, loading or reloading it as needed.
    pub async fn current(&self) -> Result<Arc<ModelArtifact>, PredictError> {
        let modified = match tokio::fs::metadata(&self.path).await {
            Ok(meta) => meta
                .modified()
                .map_err(|e| PredictError::Internal(e.to_string()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                *self.cache.write().await = None;
                return Err(PredictError::ModelNotFound(self.path.clone()));
            }
            Err(e) => return Err(PredictError::Internal(e.to_string())),
        };

        if let Some(cached) = self.cache.read().await.as_ref() {
            if cached.modified == modified {
                return Ok(cached.artifact.clone());
            }
        }

        let mut cache = self.cache.write().await;
        // Another task may have reloaded while we waited for the lock.
        if let Some(cached) = cache.as_ref() {
            if cached.modified == modified {
                return Ok(cached.artifact.clone());
            }
        }

        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PredictError::ModelNotFound(self.path.clone()));
            }
            Err(e) => return Err(PredictError::Internal(e.to_string())),
        };
        let artifact: ModelArtifact = serde_json::from_slice(&bytes)
            .map_err(|e| PredictError::Internal(format!("corrupt model artifact: {e}")))?;
        info!(path = %self.path.display(), "Loaded model artifact");

        let artifact = Arc::new(artifact);
        *cache = Some(CachedModel {
            modified,
            artifact: artifact.clone(),
        });
        Ok(artifact)
    }
}

/// Predicts the score of `student_id` from features over the last `days_back` days.
pub async fn predict_for_student(
    db: &Database,
    store: &ModelStore,
    student_id: i64,
    days_back: i64,
) -> Result<Prediction, PredictError> {
    let artifact = store.current().await?;

    let features = aggregate_student_features(db, student_id, days_back)
        .await?
        .ok_or(PredictError::StudentNotFound(student_id))?;

    let row: Vec<f64> = artifact
        .feature_columns
        .iter()
        .map(|column| features.get(column).unwrap_or(0.0))
        .collect();
    let predicted = artifact
        .predict(vec![row])?
        .first()
        .copied()
        .ok_or_else(|| PredictError::Internal("model returned no prediction".into()))?;

    let conn = db.connect().map_err(StoreError::from)?;
    let actual_score = writing_summary(&conn, student_id)
        .await?
        .average_grade
        .map(round1);

    let prediction = Prediction {
        student_id,
        predicted_score: round1(predicted),
        actual_score,
        features: features
            .as_pairs()
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect(),
    };
    debug!(?prediction, "Scored student");
    Ok(prediction)
}
