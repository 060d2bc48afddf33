//! # Model Training
//!
//! Fits a random-forest regressor on a dataset CSV, evaluates it on a held-out
//! split and persists the estimator together with its metrics.
//!
//! The split is deterministic: 80/20 with a fixed seed, stratified on the label
//! quantized into five equal-width bins.

use crate::{
    constants::{LABEL_COLUMN, METRICS_FILE, MODEL_FILE, STUDENT_ID_COLUMN},
    dataset::{DataTable, DatasetError},
};
use chrono::Utc;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::{Deserialize, Serialize};
use smartcore::{
    ensemble::random_forest_regressor::{
        RandomForestRegressor, RandomForestRegressorParameters,
    },
    linalg::basic::matrix::DenseMatrix,
};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{info, warn};

/// The seed shared by the split and the forest.
pub const RANDOM_STATE: u64 = 42;
/// The fraction of rows held out for evaluation.
pub const TEST_SIZE: f64 = 0.2;
/// The number of label bins used to stratify the split.
pub const STRATIFY_BINS: usize = 5;

/// The fitted estimator type.
pub type Estimator = RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

#[derive(Error, Debug)]
pub enum TrainError {
    #[error("Dataset file '{0}' not found. Build the dataset first.")]
    DatasetNotFound(PathBuf),
    #[error("Missing required columns: {0:?}")]
    MissingColumns(Vec<String>),
    #[error("Malformed dataset: {0}")]
    Malformed(String),
    #[error("Not enough rows to split: {0}")]
    InsufficientData(usize),
    #[error("Failed to read dataset: {0}")]
    Dataset(#[from] DatasetError),
    #[error("Model fitting failed: {0}")]
    Fit(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to serialize artifact: {0}")]
    Json(#[from] serde_json::Error),
}

/// The hyperparameters of the forest.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: u16,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub random_state: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 10,
            min_samples_split: 5,
            min_samples_leaf: 2,
            random_state: RANDOM_STATE,
        }
    }
}

/// Evaluation results, persisted as `metrics.json`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TrainingMetrics {
    pub mse: f64,
    pub r2: f64,
    pub n_train: usize,
    pub n_test: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// The persisted model: the estimator plus everything needed to feed it.
#[derive(Serialize, Deserialize, Debug)]
pub struct ModelArtifact {
    /// Feature columns in the exact order used at training time.
    pub feature_columns: Vec<String>,
    /// Importances, ranked descending.
    pub feature_importance: Vec<FeatureImportance>,
    pub params: ForestParams,
    pub trained_at: String,
    pub estimator: Estimator,
}

impl ModelArtifact {
    /// Loads an artifact written by [`train_model`].
    pub fn load(path: &Path) -> Result<Self, TrainError> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Scores a batch of feature rows laid out in `feature_columns` order.
    pub fn predict(&self, rows: Vec<Vec<f64>>) -> Result<Vec<f64>, TrainError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let x = DenseMatrix::from_2d_vec(&rows);
        self.estimator
            .predict(&x)
            .map_err(|e| TrainError::Fit(e.to_string()))
    }
}

/// Everything a training run produces.
#[derive(Debug)]
pub struct TrainingOutcome {
    pub artifact: ModelArtifact,
    pub metrics: TrainingMetrics,
    pub model_path: PathBuf,
    pub metrics_path: PathBuf,
}

/// Trains a model from `dataset_path` and writes `model.json` and `metrics.json`
/// into `output_dir`, overwriting previous artifacts.
pub fn train_model(dataset_path: &Path, output_dir: &Path) -> Result<TrainingOutcome, TrainError> {
    train_model_with(dataset_path, output_dir, &ForestParams::default())
}

pub fn train_model_with(
    dataset_path: &Path,
    output_dir: &Path,
    params: &ForestParams,
) -> Result<TrainingOutcome, TrainError> {
    if !dataset_path.exists() {
        return Err(TrainError::DatasetNotFound(dataset_path.to_path_buf()));
    }

    info!("Loading dataset from {}", dataset_path.display());
    let mut table = DataTable::read_csv(dataset_path)?;

    let Some(label_index) = table.column_index(LABEL_COLUMN) else {
        return Err(TrainError::MissingColumns(vec![LABEL_COLUMN.to_string()]));
    };
    info!(rows = table.rows.len(), columns = ?table.headers, "Dataset loaded");

    let feature_indices: Vec<usize> = table
        .headers
        .iter()
        .enumerate()
        .filter(|(_, h)| h.as_str() != STUDENT_ID_COLUMN && h.as_str() != LABEL_COLUMN)
        .map(|(i, _)| i)
        .collect();
    if feature_indices.is_empty() {
        return Err(TrainError::Malformed("dataset has no feature columns".into()));
    }
    for &i in &feature_indices {
        if !table.is_numeric_column(i) {
            return Err(TrainError::Malformed(format!(
                "feature column '{}' is not numeric",
                table.headers[i]
            )));
        }
    }
    if !table.is_numeric_column(label_index) {
        return Err(TrainError::Malformed(format!(
            "label column '{LABEL_COLUMN}' is not numeric"
        )));
    }
    table.clean_nulls();

    let feature_columns: Vec<String> = feature_indices
        .iter()
        .map(|&i| table.headers[i].clone())
        .collect();
    let columns: Vec<Vec<f64>> = feature_indices
        .iter()
        .map(|&i| table.numeric_column(i))
        .collect();
    let x: Vec<Vec<f64>> = (0..table.rows.len())
        .map(|r| columns.iter().map(|col| col[r]).collect())
        .collect();
    let y = table.numeric_column(label_index);
    info!(features = ?feature_columns, "Target range: {:.1} - {:.1}", min(&y), max(&y));

    let (train_idx, test_idx) = stratified_split(&y, TEST_SIZE, params.random_state)?;
    info!(
        "Training set: {} samples, test set: {} samples",
        train_idx.len(),
        test_idx.len()
    );
    let x_train: Vec<Vec<f64>> = train_idx.iter().map(|&i| x[i].clone()).collect();
    let y_train: Vec<f64> = train_idx.iter().map(|&i| y[i]).collect();
    let x_test: Vec<Vec<f64>> = test_idx.iter().map(|&i| x[i].clone()).collect();
    let y_test: Vec<f64> = test_idx.iter().map(|&i| y[i]).collect();

    info!(?params, "Training random forest");
    let parameters = RandomForestRegressorParameters::default()
        .with_n_trees(params.n_estimators)
        .with_max_depth(params.max_depth)
        .with_min_samples_split(params.min_samples_split)
        .with_min_samples_leaf(params.min_samples_leaf)
        .with_m(feature_columns.len())
        .with_seed(params.random_state);
    let estimator = Estimator::fit(&DenseMatrix::from_2d_vec(&x_train), &y_train, parameters)
        .map_err(|e| TrainError::Fit(e.to_string()))?;

    let mut artifact = ModelArtifact {
        feature_columns,
        feature_importance: Vec::new(),
        params: params.clone(),
        trained_at: Utc::now().to_rfc3339(),
        estimator,
    };

    let y_pred = artifact.predict(x_test)?;
    let metrics = TrainingMetrics {
        mse: mean_squared_error(&y_test, &y_pred),
        r2: r2_score(&y_test, &y_pred),
        n_train: train_idx.len(),
        n_test: test_idx.len(),
    };
    info!("Mean Squared Error: {:.2}", metrics.mse);
    info!("R2 Score: {:.3}", metrics.r2);

    artifact.feature_importance =
        permutation_importance(&artifact, &x_train, &y_train, params.random_state)?;
    for fi in &artifact.feature_importance {
        info!("  {}: {:.4}", fi.feature, fi.importance);
    }

    std::fs::create_dir_all(output_dir)?;
    let model_path = output_dir.join(MODEL_FILE);
    let metrics_path = output_dir.join(METRICS_FILE);
    write_json(&model_path, &artifact)?;
    info!("Model saved to: {}", model_path.display());
    std::fs::write(&metrics_path, serde_json::to_string_pretty(&metrics)?)?;
    info!("Metrics saved to: {}", metrics_path.display());

    Ok(TrainingOutcome {
        artifact,
        metrics,
        model_path,
        metrics_path,
    })
}

/// Serializes `value` to `path`, surfacing errors from the final flush.
fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), TrainError> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

/// Reads a `metrics.json` written by [`train_model`].
pub fn load_metrics(path: &Path) -> Result<TrainingMetrics, TrainError> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

/// Assigns each label to one of `bins` equal-width bins over `[min, max]`.
///
/// Bins are right-inclusive, so a value sitting on an inner edge belongs to the
/// lower bin. A constant label puts every row into bin 0.
pub fn quantize_labels(labels: &[f64], bins: usize) -> Vec<usize> {
    let (lo, hi) = (min(labels), max(labels));
    let width = (hi - lo) / bins as f64;
    labels
        .iter()
        .map(|&v| {
            if width <= 0.0 || !width.is_finite() {
                return 0;
            }
            let bucket = ((v - lo) / width).ceil() as i64 - 1;
            bucket.clamp(0, bins as i64 - 1) as usize
        })
        .collect()
}

/// Splits row indices into `(train, test)`, preserving label-bin proportions.
///
/// The test size is `ceil(n * test_size)`. Each bin receives its proportional
/// share, with leftover rows going to the bins with the largest remainders.
pub fn stratified_split(
    labels: &[f64],
    test_size: f64,
    seed: u64,
) -> Result<(Vec<usize>, Vec<usize>), TrainError> {
    let n = labels.len();
    let n_test = (n as f64 * test_size).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(TrainError::InsufficientData(n));
    }

    let buckets = quantize_labels(labels, STRATIFY_BINS);
    let mut strata: Vec<Vec<usize>> = vec![Vec::new(); STRATIFY_BINS];
    for (i, b) in buckets.into_iter().enumerate() {
        strata[b].push(i);
    }

    let exact: Vec<f64> = strata
        .iter()
        .map(|s| s.len() as f64 * n_test as f64 / n as f64)
        .collect();
    let mut quotas: Vec<usize> = exact.iter().map(|q| q.floor() as usize).collect();
    let mut leftover = n_test - quotas.iter().sum::<usize>();
    let mut order: Vec<usize> = (0..strata.len()).collect();
    order.sort_by(|&a, &b| {
        let ra = exact[a] - exact[a].floor();
        let rb = exact[b] - exact[b].floor();
        rb.total_cmp(&ra)
            .then(strata[b].len().cmp(&strata[a].len()))
            .then(a.cmp(&b))
    });
    for &k in order.iter().cycle().take(order.len() * 2) {
        if leftover == 0 {
            break;
        }
        if quotas[k] < strata[k].len() {
            quotas[k] += 1;
            leftover -= 1;
        }
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(n - n_test);
    let mut test = Vec::with_capacity(n_test);
    for (stratum, quota) in strata.iter_mut().zip(quotas) {
        stratum.shuffle(&mut rng);
        test.extend_from_slice(&stratum[..quota]);
        train.extend_from_slice(&stratum[quota..]);
    }
    train.sort_unstable();
    test.sort_unstable();
    Ok((train, test))
}

pub fn mean_squared_error(y_true: &[f64], y_pred: &[f64]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p).powi(2))
        .sum::<f64>()
        / y_true.len() as f64
}

/// Coefficient of determination. A constant target scores 1.0 when predicted
/// perfectly and 0.0 otherwise.
pub fn r2_score(y_true: &[f64], y_pred: &[f64]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let mean = y_true.iter().sum::<f64>() / y_true.len() as f64;
    let ss_res: f64 = y_true.iter().zip(y_pred).map(|(t, p)| (t - p).powi(2)).sum();
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();
    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

/// Ranks features by the training error increase caused by shuffling each one.
/// Scores are normalized to sum to 1 and sorted descending.
fn permutation_importance(
    artifact: &ModelArtifact,
    x: &[Vec<f64>],
    y: &[f64],
    seed: u64,
) -> Result<Vec<FeatureImportance>, TrainError> {
    let baseline = mean_squared_error(y, &artifact.predict(x.to_vec())?);
    let mut raw = Vec::with_capacity(artifact.feature_columns.len());
    for (j, name) in artifact.feature_columns.iter().enumerate() {
        let mut column: Vec<f64> = x.iter().map(|row| row[j]).collect();
        column.shuffle(&mut StdRng::seed_from_u64(seed.wrapping_add(j as u64)));
        let permuted: Vec<Vec<f64>> = x
            .iter()
            .zip(&column)
            .map(|(row, v)| {
                let mut row = row.clone();
                row[j] = *v;
                row
            })
            .collect();
        let score = mean_squared_error(y, &artifact.predict(permuted)?) - baseline;
        raw.push((name.clone(), score.max(0.0)));
    }

    let total: f64 = raw.iter().map(|(_, s)| s).sum();
    if total <= 0.0 {
        warn!("Permutation importance is zero for every feature");
    }
    let mut ranked: Vec<FeatureImportance> = raw
        .into_iter()
        .map(|(feature, s)| FeatureImportance {
            feature,
            importance: if total > 0.0 { s / total } else { 0.0 },
        })
        .collect();
    ranked.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    Ok(ranked)
}

fn min(v: &[f64]) -> f64 {
    v.iter().copied().fold(f64::INFINITY, f64::min)
}

fn max(v: &[f64]) -> f64 {
    v.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `/dev/full` accepts the open but fails every write with ENOSPC, which a
    /// buffered writer only sees on flush.
    #[cfg(target_os = "linux")]
    #[test]
    fn write_json_reports_flush_failures() {
        let metrics = TrainingMetrics {
            mse: 1.0,
            r2: 0.5,
            n_train: 8,
            n_test: 2,
        };
        assert!(matches!(
            write_json(Path::new("/dev/full"), &metrics),
            Err(TrainError::Io(_))
        ));
    }

    #[test]
    fn write_json_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(METRICS_FILE);
        let metrics = TrainingMetrics {
            mse: 2.25,
            r2: 0.75,
            n_train: 24,
            n_test: 6,
        };

        write_json(&path, &metrics).unwrap();

        assert_eq!(load_metrics(&path).unwrap(), metrics);
    }

    #[test]
    fn quantize_uses_equal_width_bins() {
        let labels = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 10.0];
        assert_eq!(quantize_labels(&labels, 5), vec![0, 0, 0, 1, 1, 2, 4]);
    }

    #[test]
    fn quantize_constant_labels_into_one_bin() {
        assert_eq!(quantize_labels(&[3.0, 3.0, 3.0], 5), vec![0, 0, 0]);
    }

    #[test]
    fn split_is_eighty_twenty_and_deterministic() {
        let labels: Vec<f64> = (1..=20).map(f64::from).collect();
        let (train, test) = stratified_split(&labels, TEST_SIZE, RANDOM_STATE).unwrap();
        assert_eq!(train.len(), 16);
        assert_eq!(test.len(), 4);
        let again = stratified_split(&labels, TEST_SIZE, RANDOM_STATE).unwrap();
        assert_eq!((train.clone(), test.clone()), again);

        let mut all: Vec<usize> = train.into_iter().chain(test).collect();
        all.sort_unstable();
        assert_eq!(all, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn split_takes_one_test_row_per_bin_when_balanced() {
        let labels: Vec<f64> = (1..=20).map(f64::from).collect();
        let (_, test) = stratified_split(&labels, TEST_SIZE, RANDOM_STATE).unwrap();
        let buckets = quantize_labels(&labels, STRATIFY_BINS);
        let mut seen: Vec<usize> = test.iter().map(|&i| buckets[i]).collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 4);
    }

    #[test]
    fn split_rejects_a_single_row() {
        assert!(matches!(
            stratified_split(&[1.0], TEST_SIZE, RANDOM_STATE),
            Err(TrainError::InsufficientData(1))
        ));
    }

    #[test]
    fn r2_matches_known_values() {
        assert_eq!(r2_score(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]), 1.0);
        assert!((r2_score(&[1.0, 2.0, 3.0], &[2.0, 2.0, 2.0]) - 0.0).abs() < 1e-12);
        assert_eq!(r2_score(&[5.0, 5.0], &[4.0, 6.0]), 0.0);
        assert!((mean_squared_error(&[1.0, 3.0], &[2.0, 2.0]) - 1.0).abs() < 1e-12);
    }
}
