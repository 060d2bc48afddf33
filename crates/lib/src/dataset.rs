//! # Dataset Building
//!
//! This module turns the engagement store into the flat training table. It runs the
//! feature aggregator for every engaged student, derives the label, filters out
//! unusable rows and writes the result as CSV. It also provides the loose
//! [`DataTable`] reader used when a dataset file comes back from disk.

use crate::{
    constants::{FEATURE_COLUMNS, LABEL_COLUMN, STUDENT_ID_COLUMN, UNKNOWN_SENTINEL},
    errors::StoreError,
    features::{aggregate_student_features_at, FeatureError},
    providers::db::sqlite::{sql, value_to_i64},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fs::File, io::Write, path::Path};
use thiserror::Error;
use tracing::{info, warn};
use turso::Database;

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("Database error: {0}")]
    Store(#[from] StoreError),
    #[error("Feature aggregation failed: {0}")]
    Feature(#[from] FeatureError),
    #[error("Failed to read or write CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<turso::Error> for DatasetError {
    fn from(err: turso::Error) -> Self {
        DatasetError::Store(StoreError::from(err))
    }
}

/// One row of the training table. Field order is the CSV column order.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DatasetRow {
    pub student_id: i64,
    pub time_spent_per_slide: f64,
    pub average_accuracy_per_page: f64,
    pub attempt_count_per_question: f64,
    pub revisits: i64,
    pub score: f64,
}

/// A populated training table. Never empty.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Dataset {
    pub rows: Vec<DatasetRow>,
}

impl Dataset {
    /// The column names, in output order.
    pub fn columns() -> Vec<&'static str> {
        let mut columns = vec![STUDENT_ID_COLUMN];
        columns.extend(FEATURE_COLUMNS);
        columns.push(LABEL_COLUMN);
        columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The minimum and maximum label values.
    pub fn score_range(&self) -> (f64, f64) {
        self.rows
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), row| {
                (lo.min(row.score), hi.max(row.score))
            })
    }

    /// Writes the table as CSV, header first.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), DatasetError> {
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(writer);
        wtr.write_record(Self::columns())?;
        for row in &self.rows {
            wtr.serialize(row)?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Renders the table as a CSV string.
    pub fn to_csv_string(&self) -> Result<String, DatasetError> {
        let mut buffer = Vec::new();
        self.write_csv(&mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

/// Builds the dataset from every student with any engagement record.
///
/// Returns `Ok(None)` when no row survives: either nobody has engaged, or every
/// engaged student has a non-positive label.
pub async fn build_dataset(db: &Database, days_back: i64) -> Result<Option<Dataset>, DatasetError> {
    build_dataset_at(db, days_back, Utc::now()).await
}

/// Same as [`build_dataset`] with an explicit reference instant.
pub async fn build_dataset_at(
    db: &Database,
    days_back: i64,
    now: DateTime<Utc>,
) -> Result<Option<Dataset>, DatasetError> {
    info!("Building dataset for the last {days_back} days...");
    let conn = db
        .connect()
        .map_err(|e| StoreError::StorageConnection(e.to_string()))?;

    let mut student_ids = Vec::new();
    let mut rows = conn.query(sql::SELECT_ENGAGED_STUDENTS, ()).await?;
    while let Some(row) = rows.next().await? {
        if let Some(id) = value_to_i64(row.get_value(0)?) {
            student_ids.push(id);
        }
    }
    info!("Found {} students with engagement data", student_ids.len());

    let mut features = Vec::with_capacity(student_ids.len());
    for student_id in student_ids {
        if let Some(f) = aggregate_student_features_at(db, student_id, days_back, now).await? {
            features.push(f);
        }
    }
    if features.is_empty() {
        warn!("No features extracted. Check if engagement data exists.");
        return Ok(None);
    }

    let rows: Vec<DatasetRow> = features
        .into_iter()
        .map(|f| DatasetRow {
            student_id: f.student_id,
            time_spent_per_slide: f.time_spent_per_slide,
            average_accuracy_per_page: f.average_accuracy_per_page,
            attempt_count_per_question: f.attempt_count_per_question,
            revisits: f.revisits,
            score: f.time_spent_per_slide,
        })
        .filter(|row| row.score > 0.0)
        .collect();

    if rows.is_empty() {
        warn!("Every engaged student has a non-positive score; dataset is empty.");
        return Ok(None);
    }

    let dataset = Dataset { rows };
    let (lo, hi) = dataset.score_range();
    info!(
        rows = dataset.len(),
        "Dataset built. Target range: {lo:.1} - {hi:.1}"
    );
    Ok(Some(dataset))
}

/// Builds the dataset and writes it to `output_path`. Nothing is written when empty.
pub async fn build_dataset_csv(
    db: &Database,
    days_back: i64,
    output_path: &Path,
) -> Result<Option<Dataset>, DatasetError> {
    let Some(dataset) = build_dataset(db, days_back).await? else {
        return Ok(None);
    };
    write_dataset_csv(&dataset, output_path)?;
    Ok(Some(dataset))
}

/// Writes `dataset` to a CSV file, replacing any existing file.
pub fn write_dataset_csv(dataset: &Dataset, output_path: &Path) -> Result<(), DatasetError> {
    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    dataset.write_csv(File::create(output_path)?)?;
    info!("Dataset saved to {}", output_path.display());
    Ok(())
}

// --- Loose tables read back from disk ---

/// A cell of a [`DataTable`].
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Number(f64),
    Text(String),
    Missing,
}

impl Cell {
    fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            Cell::Missing
        } else if let Ok(n) = trimmed.parse::<f64>() {
            Cell::Number(n)
        } else {
            Cell::Text(trimmed.to_string())
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            _ => None,
        }
    }
}

/// A CSV file loaded without a fixed schema.
#[derive(Debug, Clone, PartialEq)]
pub struct DataTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl DataTable {
    /// Reads a CSV file with a header row.
    pub fn read_csv(path: &Path) -> Result<Self, DatasetError> {
        let mut reader = csv::Reader::from_path(path)?;
        let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let mut cells: Vec<Cell> = record.iter().map(Cell::parse).collect();
            cells.resize(headers.len(), Cell::Missing);
            rows.push(cells);
        }
        Ok(Self { headers, rows })
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// A column is numeric when none of its present cells is text.
    pub fn is_numeric_column(&self, index: usize) -> bool {
        self.rows
            .iter()
            .all(|row| !matches!(row.get(index), Some(Cell::Text(_))))
    }

    /// Fills missing numeric cells with 0 and missing text cells with the sentinel.
    pub fn clean_nulls(&mut self) {
        let numeric: Vec<bool> = (0..self.headers.len())
            .map(|i| self.is_numeric_column(i))
            .collect();
        for row in &mut self.rows {
            for (cell, is_numeric) in row.iter_mut().zip(&numeric) {
                if *cell == Cell::Missing {
                    *cell = if *is_numeric {
                        Cell::Number(0.0)
                    } else {
                        Cell::Text(UNKNOWN_SENTINEL.to_string())
                    };
                }
            }
        }
    }

    /// Returns the numeric values of a column, missing cells as 0.
    pub fn numeric_column(&self, index: usize) -> Vec<f64> {
        self.rows
            .iter()
            .map(|row| row.get(index).and_then(Cell::as_f64).unwrap_or(0.0))
            .collect()
    }
}
