//! # Shared Constants
//!
//! This module provides a centralized location for constants that are shared across
//! the crates in the `engagement` workspace. Using these constants helps to avoid
//! "magic strings" and keeps the dataset, trainer and predictor agreeing on names.

/// The root directory for all local databases.
pub const DB_DIR: &str = "db";

/// The default path for the main application SQLite database.
pub const DEFAULT_DB_FILE: &str = "db/engagement.db";

/// The default trailing window, in days, used for feature aggregation.
pub const DEFAULT_LOOKBACK_DAYS: i64 = 30;

/// The default dataset path written by `build-dataset`.
pub const DEFAULT_DATASET_FILE: &str = "dataset.csv";

/// The temporary dataset written during a retrain run.
pub const RETRAIN_DATASET_FILE: &str = "dataset_retrain.csv";

/// The serialized estimator, relative to the artifact directory.
pub const MODEL_FILE: &str = "model.json";

/// The metrics record, relative to the artifact directory.
pub const METRICS_FILE: &str = "metrics.json";

/// The identifier column of the dataset.
pub const STUDENT_ID_COLUMN: &str = "student_id";

/// The label column of the dataset.
pub const LABEL_COLUMN: &str = "score";

/// The feature columns, in the order they are written to the dataset.
pub const FEATURE_COLUMNS: [&str; 4] = [
    "time_spent_per_slide",
    "average_accuracy_per_page",
    "attempt_count_per_question",
    "revisits",
];

/// The sentinel written into empty text cells.
pub const UNKNOWN_SENTINEL: &str = "unknown";

/// The storage format of every timestamp column. Lexical order equals time order.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";
