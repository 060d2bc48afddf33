//! # Textbook Import
//!
//! Pulls the engagement export from the textbook server with a user's session
//! cookies and upserts it into the local store in one transaction.
//!
//! Records are applied parents first. A child whose parent cannot be found in
//! the local store (after this payload's own parents were written) is skipped
//! and counted, never treated as an error.

use super::payload::EngagementPayload;
use crate::{
    errors::StoreError,
    providers::db::sqlite::{integer_or_null, row_exists, sql, text_or_null, value_to_i64},
    types::format_timestamp,
};
use chrono::Utc;
use reqwest::{header, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};
use turso::{Connection, Database, Value as TursoValue};

/// The default engagement endpoint of the textbook server.
pub const DEFAULT_DATA_API_URL: &str = "https://se.eforge.online/textbook/api/user-engagement/";

/// The default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(8);

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("The textbook server rejected the session (403 Forbidden)")]
    Forbidden,

    #[error("Failed to fetch engagement data: {0}")]
    Fetch(String),

    #[error("Failed to parse engagement data: {0}")]
    Parse(String),

    #[error("A database operation failed during import: {0}")]
    Database(#[from] turso::Error),

    #[error("Storage error during import: {0}")]
    Store(#[from] StoreError),
}

/// The textbook session cookies of the importing user.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SessionCredentials {
    pub sessionid: String,
    pub csrftoken: Option<String>,
}

impl SessionCredentials {
    pub fn new(sessionid: impl Into<String>, csrftoken: Option<String>) -> Self {
        Self {
            sessionid: sessionid.into(),
            csrftoken,
        }
    }

    fn csrf(&self) -> &str {
        self.csrftoken.as_deref().unwrap_or("")
    }
}

/// What an import wrote and what it had to skip.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub students_created: usize,
    pub sections: usize,
    pub pages: usize,
    pub slides: usize,
    pub slide_reads: usize,
    pub slide_sessions: usize,
    pub questions: usize,
    pub attempts: usize,
    pub attempt_details: usize,
    pub writing_interactions: usize,
    /// Records and links dropped because a referenced parent was missing.
    pub skipped: usize,
}

impl ImportSummary {
    pub fn total_imported(&self) -> usize {
        self.sections
            + self.pages
            + self.slides
            + self.slide_reads
            + self.slide_sessions
            + self.questions
            + self.attempts
            + self.attempt_details
            + self.writing_interactions
    }
}

/// A client for the textbook's engagement endpoint.
#[derive(Debug, Clone)]
pub struct TextbookClient {
    client: reqwest::Client,
    url: String,
}

impl TextbookClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, IngestError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IngestError::Fetch(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Performs a single GET for the engagement export. There is no retry.
    pub async fn fetch_engagement(
        &self,
        credentials: &SessionCredentials,
    ) -> Result<EngagementPayload, IngestError> {
        info!(url = %self.url, "Fetching engagement data from the textbook");
        let response = self
            .client
            .get(&self.url)
            .header("X-Requested-With", "XMLHttpRequest")
            .header("X-CSRFToken", credentials.csrf())
            .header(
                header::COOKIE,
                format!(
                    "sessionid={}; csrftoken={}",
                    credentials.sessionid,
                    credentials.csrf()
                ),
            )
            .send()
            .await
            .map_err(|e| IngestError::Fetch(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::FORBIDDEN {
            return Err(IngestError::Forbidden);
        }
        if !status.is_success() {
            return Err(IngestError::Fetch(format!("unexpected status {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| IngestError::Fetch(e.to_string()))?;
        let payload: EngagementPayload =
            serde_json::from_str(&body).map_err(|e| IngestError::Parse(e.to_string()))?;
        info!(records = payload.record_count(), "Engagement data received");
        Ok(payload)
    }
}

/// Fetches the export and imports it.
pub async fn fetch_and_import(
    db: &Database,
    client: &TextbookClient,
    credentials: &SessionCredentials,
) -> Result<ImportSummary, IngestError> {
    let payload = client.fetch_engagement(credentials).await?;
    import_payload(db, &payload).await
}

/// Upserts `payload` into the store. Either every record lands or none does.
pub async fn import_payload(
    db: &Database,
    payload: &EngagementPayload,
) -> Result<ImportSummary, IngestError> {
    let conn = db
        .connect()
        .map_err(|e| StoreError::StorageConnection(e.to_string()))?;
    let now = format_timestamp(Utc::now());

    conn.execute("BEGIN TRANSACTION", ()).await?;
    match apply_payload(&conn, payload, &now).await {
        Ok(summary) => {
            conn.execute("COMMIT", ()).await?;
            info!(
                imported = summary.total_imported(),
                skipped = summary.skipped,
                students_created = summary.students_created,
                "Import committed"
            );
            Ok(summary)
        }
        Err(e) => {
            warn!("Import failed: {e}. Rolling back transaction.");
            if let Err(rollback) = conn.execute("ROLLBACK", ()).await {
                warn!("Rollback failed: {rollback}");
            }
            Err(e)
        }
    }
}

async fn apply_payload(
    conn: &Connection,
    payload: &EngagementPayload,
    now: &str,
) -> Result<ImportSummary, IngestError> {
    let mut summary = ImportSummary::default();

    for student_id in payload.referenced_students() {
        let created = conn
            .execute(
                sql::INSERT_STUDENT_IF_MISSING,
                vec![
                    TursoValue::Integer(student_id),
                    TursoValue::Text(format!("user_{student_id}")),
                ],
            )
            .await?;
        summary.students_created += created as usize;
    }

    for section in &payload.sections {
        conn.execute(
            sql::UPSERT_SECTION,
            vec![
                TursoValue::Integer(section.id),
                TursoValue::Text(section.section_title.clone()),
            ],
        )
        .await?;
        summary.sections += 1;
    }

    for page in &payload.pages {
        conn.execute(
            sql::UPSERT_PAGE,
            vec![
                TursoValue::Integer(page.id),
                TursoValue::Text(page.page_title.clone()),
            ],
        )
        .await?;
        summary.pages += 1;
        for &section_id in &page.sections {
            if !parent_exists(conn, "textbook_sections", Some(section_id)).await? {
                skip(&mut summary, "page section link", page.id, "section", section_id);
                continue;
            }
            conn.execute(
                sql::LINK_PAGE_SECTION,
                vec![TursoValue::Integer(page.id), TursoValue::Integer(section_id)],
            )
            .await?;
        }
    }

    for slide in &payload.slides {
        conn.execute(
            sql::UPSERT_SLIDE,
            vec![
                TursoValue::Integer(slide.id),
                TursoValue::Text(slide.slide_title.clone()),
            ],
        )
        .await?;
        summary.slides += 1;
        for &page_id in &slide.pages {
            if !parent_exists(conn, "textbook_pages", Some(page_id)).await? {
                skip(&mut summary, "slide page link", slide.id, "page", page_id);
                continue;
            }
            conn.execute(
                sql::LINK_SLIDE_PAGE,
                vec![TursoValue::Integer(slide.id), TursoValue::Integer(page_id)],
            )
            .await?;
        }
    }

    for read in &payload.user_slide_reads {
        let (Some(user), Some(slide)) = (read.user, read.slide) else {
            skip_missing(&mut summary, "slide read", read.id);
            continue;
        };
        if !parent_exists(conn, "students", Some(user)).await? {
            skip(&mut summary, "slide read", read.id, "student", user);
            continue;
        }
        if !parent_exists(conn, "textbook_slides", Some(slide)).await? {
            skip(&mut summary, "slide read", read.id, "slide", slide);
            continue;
        }
        if let Some(existing) = slide_read_for_pair(conn, user, slide).await? {
            if existing != read.id {
                warn!(
                    id = read.id,
                    existing, user, slide, "Skipping slide read: pair already recorded under another id"
                );
                summary.skipped += 1;
                continue;
            }
        }
        conn.execute(
            sql::UPSERT_SLIDE_READ,
            vec![
                TursoValue::Integer(read.id),
                TursoValue::Integer(user),
                TursoValue::Integer(slide),
                TursoValue::Text(read.slide_status.as_str().to_string()),
            ],
        )
        .await?;
        summary.slide_reads += 1;
    }

    for session in &payload.user_slide_sessions {
        if !parent_exists(conn, "slide_reads", session.slide_read).await? {
            skip_missing(&mut summary, "slide session", session.id);
            continue;
        }
        conn.execute(
            sql::UPSERT_SLIDE_READ_SESSION,
            vec![
                TursoValue::Integer(session.id),
                integer_or_null(session.slide_read),
                TursoValue::Text(session.expanded.clone().unwrap_or_else(|| now.to_string())),
                text_or_null(session.collapsed.clone()),
                text_or_null(session.read.clone()),
            ],
        )
        .await?;
        summary.slide_sessions += 1;
    }

    for question in &payload.questions {
        if !parent_exists(conn, "textbook_pages", question.textbook_page).await? {
            skip_missing(&mut summary, "question", question.id);
            continue;
        }
        conn.execute(
            sql::UPSERT_QUESTION,
            vec![
                TursoValue::Integer(question.id),
                integer_or_null(question.textbook_page),
            ],
        )
        .await?;
        summary.questions += 1;
    }

    for attempt in &payload.attempts {
        if !parent_exists(conn, "students", attempt.user).await?
            || !parent_exists(conn, "revision_questions", attempt.question).await?
        {
            skip_missing(&mut summary, "attempt", attempt.id);
            continue;
        }
        conn.execute(
            sql::UPSERT_ATTEMPT,
            vec![
                TursoValue::Integer(attempt.id),
                integer_or_null(attempt.user),
                integer_or_null(attempt.question),
                text_or_null(attempt.viewed.clone()),
                text_or_null(attempt.correct.clone()),
            ],
        )
        .await?;
        summary.attempts += 1;
    }

    for detail in &payload.attempt_details {
        if !parent_exists(conn, "question_attempts", detail.attempt).await? {
            skip_missing(&mut summary, "attempt detail", detail.id);
            continue;
        }
        conn.execute(
            sql::UPSERT_ATTEMPT_DETAIL,
            vec![
                TursoValue::Integer(detail.id),
                integer_or_null(detail.attempt),
                TursoValue::Integer(detail.is_correct as i64),
                TursoValue::Text(detail.timestamp.clone().unwrap_or_else(|| now.to_string())),
            ],
        )
        .await?;
        summary.attempt_details += 1;
    }

    for writing in &payload.writing_interactions {
        conn.execute(
            sql::UPSERT_WRITING_INTERACTION,
            vec![
                TursoValue::Integer(writing.id),
                integer_or_null(writing.user_id),
                integer_or_null(writing.page_id),
                TursoValue::Text(writing.user_input.clone()),
                TursoValue::Text(writing.openai_response.clone()),
                integer_or_null(writing.grade),
                TursoValue::Text(writing.timestamp.clone().unwrap_or_else(|| now.to_string())),
            ],
        )
        .await?;
        summary.writing_interactions += 1;
    }

    Ok(summary)
}

async fn parent_exists(
    conn: &Connection,
    table: &str,
    id: Option<i64>,
) -> Result<bool, IngestError> {
    match id {
        Some(id) => Ok(row_exists(conn, table, id).await?),
        None => Ok(false),
    }
}

async fn slide_read_for_pair(
    conn: &Connection,
    student_id: i64,
    slide_id: i64,
) -> Result<Option<i64>, IngestError> {
    let mut rows = conn
        .query(
            sql::SELECT_SLIDE_READ_BY_PAIR,
            vec![TursoValue::Integer(student_id), TursoValue::Integer(slide_id)],
        )
        .await?;
    match rows.next().await? {
        Some(row) => Ok(value_to_i64(row.get_value(0)?)),
        None => Ok(None),
    }
}

fn skip(summary: &mut ImportSummary, record: &str, id: i64, parent: &str, parent_id: i64) {
    warn!(id, parent_id, "Skipping {record}: {parent} not found");
    summary.skipped += 1;
}

fn skip_missing(summary: &mut ImportSummary, record: &str, id: i64) {
    warn!(id, "Skipping {record}: referenced parent not found");
    summary.skipped += 1;
}
