//! # Engagement Payload
//!
//! The JSON document served by the textbook's engagement endpoint. Every list is
//! optional and every record field other than `id` has a default, so a sparse or
//! partially malformed export still imports what it can.

use crate::types::{normalize_timestamp, SlideStatus};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct EngagementPayload {
    pub sections: Vec<SectionRecord>,
    pub pages: Vec<PageRecord>,
    pub slides: Vec<SlideRecord>,
    pub user_slide_reads: Vec<SlideReadRecord>,
    pub user_slide_sessions: Vec<SlideSessionRecord>,
    pub questions: Vec<QuestionRecord>,
    pub attempts: Vec<AttemptRecord>,
    pub attempt_details: Vec<AttemptDetailRecord>,
    pub writing_interactions: Vec<WritingRecord>,
}

impl EngagementPayload {
    /// Student ids referenced by slide reads and attempts, deduplicated and sorted.
    pub fn referenced_students(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self
            .user_slide_reads
            .iter()
            .filter_map(|r| r.user)
            .chain(self.attempts.iter().filter_map(|a| a.user))
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Total number of records across every list.
    pub fn record_count(&self) -> usize {
        self.sections.len()
            + self.pages.len()
            + self.slides.len()
            + self.user_slide_reads.len()
            + self.user_slide_sessions.len()
            + self.questions.len()
            + self.attempts.len()
            + self.attempt_details.len()
            + self.writing_interactions.len()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SectionRecord {
    pub id: i64,
    #[serde(default)]
    pub section_title: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PageRecord {
    pub id: i64,
    #[serde(default)]
    pub page_title: String,
    #[serde(default)]
    pub sections: Vec<i64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SlideRecord {
    pub id: i64,
    #[serde(default)]
    pub slide_title: String,
    #[serde(default)]
    pub pages: Vec<i64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SlideReadRecord {
    pub id: i64,
    #[serde(default)]
    pub user: Option<i64>,
    #[serde(default)]
    pub slide: Option<i64>,
    #[serde(default, deserialize_with = "lenient_status")]
    pub slide_status: SlideStatus,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SlideSessionRecord {
    pub id: i64,
    #[serde(default)]
    pub slide_read: Option<i64>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub expanded: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub collapsed: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub read: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct QuestionRecord {
    pub id: i64,
    #[serde(default)]
    pub textbook_page: Option<i64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AttemptRecord {
    pub id: i64,
    #[serde(default)]
    pub user: Option<i64>,
    #[serde(default)]
    pub question: Option<i64>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub viewed: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub correct: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AttemptDetailRecord {
    pub id: i64,
    #[serde(default)]
    pub attempt: Option<i64>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub is_correct: bool,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WritingRecord {
    pub id: i64,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub page_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub user_input: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub openai_response: String,
    #[serde(default, deserialize_with = "lenient_grade")]
    pub grade: Option<i64>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<String>,
}

/// Parses a grade given as a number or a numeric string, truncating toward zero.
pub fn parse_grade(value: &Value) -> Option<i64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then(|| number.trunc() as i64)
}

fn lenient_grade<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(parse_grade))
}

/// Unparsable or non-string timestamps are treated as absent.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => normalize_timestamp(&s),
        _ => None,
    })
}

fn lenient_status<'de, D>(deserializer: D) -> Result<SlideStatus, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => SlideStatus::parse_lenient(&s),
        _ => SlideStatus::Unread,
    })
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Bool(b)) => b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        _ => false,
    })
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
