//! # Engagement Analytics
//!
//! This crate turns textbook engagement records into per-student features,
//! builds a training dataset from them, fits a score regressor and serves
//! predictions. It also imports engagement data from the textbook server.

pub mod constants;
pub mod dashboard;
pub mod dataset;
pub mod errors;
pub mod features;
pub mod ingest;
pub mod prediction;
pub mod providers;
pub mod training;
pub mod types;

pub use dashboard::{dashboard_metrics, student_dashboard, DashboardError, DashboardMetrics, StudentDashboard};
pub use dataset::{build_dataset, build_dataset_csv, Dataset, DatasetError, DatasetRow};
pub use errors::StoreError;
pub use features::{aggregate_student_features, FeatureError};
pub use ingest::{import_payload, ImportSummary, IngestError, SessionCredentials, TextbookClient};
pub use prediction::{predict_for_student, ModelStore, PredictError, Prediction};
pub use providers::db::sqlite::SqliteProvider;
pub use training::{train_model, ModelArtifact, TrainError, TrainingMetrics, TrainingOutcome};
pub use types::{SlideStatus, StudentFeatures};
