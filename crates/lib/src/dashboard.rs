//! # Dashboards
//!
//! Read-only summaries for the homepage and for a single student.

use crate::{
    errors::StoreError,
    features::{student_exists, writing_summary, FeatureError},
    prediction::{predict_for_student, ModelStore, PredictError},
    providers::db::sqlite::{query_count, sql, value_to_i64, value_to_text},
    training::FeatureImportance,
    types::{format_timestamp, parse_timestamp, round1, SlideReadSession},
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;
use turso::{Connection, Database, Value as TursoValue};

/// How many students the homepage scores.
pub const RECENT_PREDICTION_LIMIT: u32 = 5;
/// How many items of each activity kind a student dashboard pulls.
pub const RECENT_ACTIVITY_PER_KIND: u32 = 5;
/// How many activity items a student dashboard shows.
pub const RECENT_ACTIVITY_LIMIT: usize = 10;

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("Database error: {0}")]
    Store(#[from] StoreError),
    #[error("Feature aggregation failed: {0}")]
    Feature(#[from] FeatureError),
}

impl From<turso::Error> for DashboardError {
    fn from(err: turso::Error) -> Self {
        DashboardError::Store(StoreError::from(err))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RecentPrediction {
    pub student_id: i64,
    pub predicted_score: f64,
    pub actual_score: Option<f64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DashboardMetrics {
    pub total_time_hours: i64,
    pub total_time_minutes: i64,
    /// Percentage of correct attempt details, one decimal.
    pub avg_accuracy: f64,
    pub total_attempts: i64,
    pub recent_predictions: Vec<RecentPrediction>,
    pub feature_importance: Vec<FeatureImportance>,
    pub has_data: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    SlideRead,
    QuestionAttempt,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ActivityItem {
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub title: String,
    pub status: String,
    /// The record id, which stands in for recency.
    pub id: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StudentDashboard {
    pub student_id: i64,
    pub username: String,
    pub total_time_hours: i64,
    pub total_time_minutes: i64,
    pub question_accuracy: f64,
    pub total_questions: i64,
    pub correct_questions: i64,
    /// Mean writing grade, 0 when nothing was graded.
    pub avg_writing_grade: f64,
    pub total_writing: i64,
    pub recent_activity: Vec<ActivityItem>,
    pub has_data: bool,
}

/// Splits a number of seconds into whole hours and remaining minutes.
pub fn hours_minutes(total_seconds: i64) -> (i64, i64) {
    (total_seconds / 3600, (total_seconds % 3600) / 60)
}

fn percentage(part: i64, whole: i64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        round1(part as f64 / whole as f64 * 100.0)
    }
}

/// Builds the homepage summary over the last `days_back` days.
///
/// Predictions and importances are only filled when a model artifact exists.
/// A student that fails to score is left out.
pub async fn dashboard_metrics(
    db: &Database,
    store: &ModelStore,
    days_back: i64,
) -> Result<DashboardMetrics, DashboardError> {
    let conn = db.connect().map_err(StoreError::from)?;
    let since = format_timestamp(Utc::now() - Duration::days(days_back));

    let total_seconds = sum_session_seconds(
        &conn,
        sql::SELECT_ALL_SESSIONS_SINCE,
        vec![TursoValue::Text(since.clone())],
    )
    .await?;
    let (correct, total) = count_details(
        &conn,
        sql::SELECT_ALL_DETAILS_SINCE,
        vec![TursoValue::Text(since.clone())],
    )
    .await?;
    let total_attempts = query_count(
        &conn,
        sql::COUNT_ATTEMPTS_SINCE,
        vec![TursoValue::Text(since)],
    )
    .await?;

    let mut recent_predictions = Vec::new();
    let mut feature_importance = Vec::new();
    match store.current().await {
        Ok(artifact) => {
            feature_importance = artifact.feature_importance.clone();
            let mut rows = conn
                .query(
                    &sql::select_students_with_slide_reads(RECENT_PREDICTION_LIMIT),
                    (),
                )
                .await?;
            let mut student_ids = Vec::new();
            while let Some(row) = rows.next().await? {
                if let Some(id) = value_to_i64(row.get_value(0)?) {
                    student_ids.push(id);
                }
            }
            for student_id in student_ids {
                match predict_for_student(db, store, student_id, days_back).await {
                    Ok(p) => recent_predictions.push(RecentPrediction {
                        student_id: p.student_id,
                        predicted_score: p.predicted_score,
                        actual_score: p.actual_score,
                    }),
                    Err(e) => warn!(student_id, "Skipping dashboard prediction: {e}"),
                }
            }
        }
        Err(PredictError::ModelNotFound(_)) => {}
        Err(e) => warn!("Model unavailable for dashboard: {e}"),
    }

    let (total_time_hours, total_time_minutes) = hours_minutes(total_seconds);
    Ok(DashboardMetrics {
        total_time_hours,
        total_time_minutes,
        avg_accuracy: percentage(correct, total),
        total_attempts,
        recent_predictions,
        feature_importance,
        has_data: total_seconds > 0,
    })
}

/// Builds the dashboard of one student. Returns `Ok(None)` for an unknown id.
pub async fn student_dashboard(
    db: &Database,
    student_id: i64,
    days_back: i64,
) -> Result<Option<StudentDashboard>, DashboardError> {
    let conn = db.connect().map_err(StoreError::from)?;
    if !student_exists(&conn, student_id).await? {
        return Ok(None);
    }
    let username = fetch_username(&conn, student_id).await?;

    let since = format_timestamp(Utc::now() - Duration::days(days_back));
    let params = || {
        vec![
            TursoValue::Integer(student_id),
            TursoValue::Text(since.clone()),
        ]
    };
    let total_seconds = sum_session_seconds(&conn, sql::SELECT_STUDENT_SESSIONS, params()).await?;
    let (correct_questions, total_questions) =
        count_details(&conn, sql::SELECT_STUDENT_DETAILS, params()).await?;
    let writing = writing_summary(&conn, student_id).await?;
    let recent_activity = recent_activity(&conn, student_id).await?;

    let (total_time_hours, total_time_minutes) = hours_minutes(total_seconds);
    Ok(Some(StudentDashboard {
        student_id,
        username,
        total_time_hours,
        total_time_minutes,
        question_accuracy: percentage(correct_questions, total_questions),
        total_questions,
        correct_questions,
        avg_writing_grade: round1(writing.average_grade.unwrap_or(0.0)),
        total_writing: writing.interactions as i64,
        recent_activity,
        has_data: total_seconds > 0 || total_questions > 0,
    }))
}

async fn fetch_username(conn: &Connection, student_id: i64) -> Result<String, DashboardError> {
    let mut rows = conn
        .query(sql::SELECT_STUDENT, vec![TursoValue::Integer(student_id)])
        .await?;
    Ok(match rows.next().await? {
        Some(row) => value_to_text(row.get_value(1)?).unwrap_or_default(),
        None => String::new(),
    })
}

/// Sums read durations. The query must select `expanded, collapsed, read_at` first.
async fn sum_session_seconds(
    conn: &Connection,
    query: &str,
    params: Vec<TursoValue>,
) -> Result<i64, DashboardError> {
    let mut rows = conn.query(query, params).await?;
    let mut total = 0;
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
        total += session.read_duration();
    }
    Ok(total)
}

/// Returns `(correct, total)`. The query must select `is_correct` first.
async fn count_details(
    conn: &Connection,
    query: &str,
    params: Vec<TursoValue>,
) -> Result<(i64, i64), DashboardError> {
    let mut rows = conn.query(query, params).await?;
    let (mut correct, mut total) = (0, 0);
    while let Some(row) = rows.next().await? {
        total += 1;
        if value_to_i64(row.get_value(0)?).unwrap_or(0) != 0 {
            correct += 1;
        }
    }
    Ok((correct, total))
}

async fn recent_activity(
    conn: &Connection,
    student_id: i64,
) -> Result<Vec<ActivityItem>, DashboardError> {
    let mut items = Vec::new();

    let mut rows = conn
        .query(
            &sql::select_recent_slide_reads(RECENT_ACTIVITY_PER_KIND),
            vec![TursoValue::Integer(student_id)],
        )
        .await?;
    while let Some(row) = rows.next().await? {
        let Some(id) = value_to_i64(row.get_value(0)?) else {
            continue;
        };
        items.push(ActivityItem {
            kind: ActivityKind::SlideRead,
            title: value_to_text(row.get_value(1)?).unwrap_or_default(),
            status: value_to_text(row.get_value(2)?).unwrap_or_default(),
            id,
        });
    }

    let mut rows = conn
        .query(
            &sql::select_recent_attempts(RECENT_ACTIVITY_PER_KIND),
            vec![TursoValue::Integer(student_id)],
        )
        .await?;
    while let Some(row) = rows.next().await? {
        let Some(id) = value_to_i64(row.get_value(0)?) else {
            continue;
        };
        let page_title = value_to_text(row.get_value(1)?).unwrap_or_default();
        items.push(ActivityItem {
            kind: ActivityKind::QuestionAttempt,
            title: format!("Question on {page_title}"),
            status: "completed".to_string(),
            id,
        });
    }

    items.sort_by(|a, b| b.id.cmp(&a.id));
    items.truncate(RECENT_ACTIVITY_LIMIT);
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_seconds_into_hours_and_minutes() {
        assert_eq!(hours_minutes(0), (0, 0));
        assert_eq!(hours_minutes(3_725), (1, 2));
        assert_eq!(hours_minutes(59), (0, 0));
    }

    #[test]
    fn percentage_handles_empty_totals() {
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(percentage(2, 3), 66.7);
    }
}
