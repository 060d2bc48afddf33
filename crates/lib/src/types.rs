//! # Engagement Types
//!
//! Domain records shared by the aggregator, dataset builder, predictor and
//! dashboards, plus the timestamp helpers every store column goes through.

use crate::constants::{FEATURE_COLUMNS, TIMESTAMP_FORMAT};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The reading status a student has recorded for a slide.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SlideStatus {
    Read,
    #[default]
    Unread,
    Revise,
}

impl SlideStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlideStatus::Read => "read",
            SlideStatus::Unread => "unread",
            SlideStatus::Revise => "revise",
        }
    }

    /// Parses a stored or imported status. Unknown values map to `Unread`.
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "read" => SlideStatus::Read,
            "revise" => SlideStatus::Revise,
            _ => SlideStatus::Unread,
        }
    }
}

impl fmt::Display for SlideStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single expand/collapse cycle of a slide.
#[derive(Debug, Clone, PartialEq)]
pub struct SlideReadSession {
    pub expanded: NaiveDateTime,
    pub collapsed: Option<NaiveDateTime>,
    pub read: Option<NaiveDateTime>,
}

impl SlideReadSession {
    /// Seconds between expansion and the first available end timestamp.
    ///
    /// `read` wins over `collapsed`. The result is clamped at zero and is zero
    /// when neither end timestamp is present.
    pub fn read_duration(&self) -> i64 {
        match self.read.or(self.collapsed) {
            Some(end) => (end - self.expanded).num_seconds().max(0),
            None => 0,
        }
    }
}

/// The four-element feature vector of one student.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StudentFeatures {
    pub student_id: i64,
    pub time_spent_per_slide: f64,
    pub average_accuracy_per_page: f64,
    pub attempt_count_per_question: f64,
    pub revisits: i64,
}

impl StudentFeatures {
    /// Looks a feature up by its dataset column name.
    pub fn get(&self, column: &str) -> Option<f64> {
        match column {
            "time_spent_per_slide" => Some(self.time_spent_per_slide),
            "average_accuracy_per_page" => Some(self.average_accuracy_per_page),
            "attempt_count_per_question" => Some(self.attempt_count_per_question),
            "revisits" => Some(self.revisits as f64),
            _ => None,
        }
    }

    /// The features as `(column, value)` pairs in dataset column order.
    pub fn as_pairs(&self) -> Vec<(&'static str, f64)> {
        FEATURE_COLUMNS
            .iter()
            .map(|column| (*column, self.get(column).unwrap_or(0.0)))
            .collect()
    }
}

/// Rounds to one decimal place, the precision every reported score uses.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Formats a UTC instant the way every timestamp column stores it.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Parses a timestamp from the store or from an imported payload.
///
/// Accepts the storage format, RFC 3339 (normalized to UTC) and naive ISO 8601
/// with or without fractional seconds. Anything else yields `None`.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc).naive_utc());
    }
    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
    ];
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
}

/// Normalizes an imported timestamp into the storage format.
pub fn normalize_timestamp(value: &str) -> Option<String> {
    parse_timestamp(value).map(|dt| dt.format(TIMESTAMP_FORMAT).to_string())
}
