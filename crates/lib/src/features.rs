//! # Feature Aggregation
//!
//! Computes the four engagement features of a student over a trailing window.
//! Every query here is read-only.

use crate::{
    errors::StoreError,
    providers::db::sqlite::{query_count, sql, value_to_i64, value_to_text},
    types::{format_timestamp, parse_timestamp, SlideReadSession, StudentFeatures},
};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use thiserror::Error;
use tracing::debug;
use turso::{Connection, Database, Value as TursoValue};

#[derive(Error, Debug)]
pub enum FeatureError {
    #[error("Database error: {0}")]
    Store(#[from] StoreError),
    #[error("Failed to get database connection: {0}")]
    Connection(String),
}

impl From<turso::Error> for FeatureError {
    fn from(err: turso::Error) -> Self {
        FeatureError::Store(StoreError::from(err))
    }
}

/// Aggregates the features of `student_id` over the last `days_back` days.
///
/// Returns `Ok(None)` when the student does not exist.
pub async fn aggregate_student_features(
    db: &Database,
    student_id: i64,
    days_back: i64,
) -> Result<Option<StudentFeatures>, FeatureError> {
    aggregate_student_features_at(db, student_id, days_back, Utc::now()).await
}

/// Same as [`aggregate_student_features`] with an explicit reference instant.
pub async fn aggregate_student_features_at(
    db: &Database,
    student_id: i64,
    days_back: i64,
    now: DateTime<Utc>,
) -> Result<Option<StudentFeatures>, FeatureError> {
    let conn = db
        .connect()
        .map_err(|e| FeatureError::Connection(e.to_string()))?;

    if !student_exists(&conn, student_id).await? {
        return Ok(None);
    }

    let window_start = format_timestamp(now - Duration::days(days_back));
    let params = || {
        vec![
            TursoValue::Integer(student_id),
            TursoValue::Text(window_start.clone()),
        ]
    };

    // 1. Time spent per slide.
    let mut rows = conn.query(sql::SELECT_STUDENT_SESSIONS, params()).await?;
    let mut total_seconds = 0i64;
    let mut slides = HashSet::new();
    while let Some(row) = rows.next().await? {
        let Some(expanded) = value_to_text(row.get_value(0)?).and_then(|s| parse_timestamp(&s))
        else {
            continue;
        };
        let session = SlideReadSession {
            expanded,
            collapsed: value_to_text(row.get_value(1)?).and_then(|s| parse_timestamp(&s)),
            read: value_to_text(row.get_value(2)?).and_then(|s| parse_timestamp(&s)),
        };
        total_seconds += session.read_duration();
        if let Some(slide_id) = value_to_i64(row.get_value(3)?) {
            slides.insert(slide_id);
        }
    }
    let time_spent_per_slide = ratio(total_seconds as f64, slides.len());

    // 2. Average accuracy per page.
    let mut rows = conn.query(sql::SELECT_STUDENT_DETAILS, params()).await?;
    let mut total_details = 0usize;
    let mut correct_details = 0usize;
    while let Some(row) = rows.next().await? {
        total_details += 1;
        if value_to_i64(row.get_value(0)?).unwrap_or(0) != 0 {
            correct_details += 1;
        }
    }
    let average_accuracy_per_page = ratio(correct_details as f64, total_details);

    // 3. Attempt count per question.
    let mut rows = conn.query(sql::SELECT_STUDENT_ATTEMPTS, params()).await?;
    let mut total_attempts = 0usize;
    let mut questions = HashSet::new();
    while let Some(row) = rows.next().await? {
        total_attempts += 1;
        if let Some(question_id) = value_to_i64(row.get_value(0)?) {
            questions.insert(question_id);
        }
    }
    let attempt_count_per_question = ratio(total_attempts as f64, questions.len());

    // 4. Revisits are counted over all time.
    let revisits = query_count(
        &conn,
        sql::COUNT_STUDENT_REVISITS,
        vec![TursoValue::Integer(student_id)],
    )
    .await?;

    let features = StudentFeatures {
        student_id,
        time_spent_per_slide,
        average_accuracy_per_page,
        attempt_count_per_question,
        revisits,
    };
    debug!(?features, "Aggregated student features");
    Ok(Some(features))
}

/// Graded writing activity of one student, over all time.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WritingSummary {
    /// Mean of the non-null grades, `None` when nothing was graded.
    pub average_grade: Option<f64>,
    /// Every interaction of the student, graded or not.
    pub interactions: usize,
}

pub async fn writing_summary(
    conn: &Connection,
    student_id: i64,
) -> Result<WritingSummary, FeatureError> {
    let mut rows = conn
        .query(sql::SELECT_WRITING_GRADES, vec![TursoValue::Integer(student_id)])
        .await?;
    let mut interactions = 0usize;
    let mut grades = Vec::new();
    while let Some(row) = rows.next().await? {
        interactions += 1;
        if let Some(grade) = value_to_i64(row.get_value(0)?) {
            grades.push(grade as f64);
        }
    }
    let average_grade =
        (!grades.is_empty()).then(|| grades.iter().sum::<f64>() / grades.len() as f64);
    Ok(WritingSummary {
        average_grade,
        interactions,
    })
}

pub(crate) async fn student_exists(conn: &Connection, student_id: i64) -> Result<bool, FeatureError> {
    let mut rows = conn
        .query(sql::SELECT_STUDENT, vec![TursoValue::Integer(student_id)])
        .await?;
    Ok(rows.next().await?.is_some())
}

fn ratio(numerator: f64, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator / denominator as f64
    }
}
