//! Fixtures shared by the server and CLI integration tests.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use engagement::{
    providers::db::sqlite::SqliteProvider,
    types::format_timestamp,
};
use serde_json::{json, Value};
use turso::Value as TursoValue;

// --- Fixtures ---

/// Seeds `count` students into `provider`.
///
/// Student `n` reads slide 1 for `10 * n` seconds, attempts question 1 once and
/// answers it correctly when `n` is even. Every third student marks the slide
/// for revision. All activity happens one day before `now`.
pub async fn seed_cohort(provider: &SqliteProvider, count: i64, now: DateTime<Utc>) -> Result<()> {
    let conn = provider.connect()?;
    let at = format_timestamp(now - Duration::days(1));

    conn.execute(
        "INSERT INTO textbook_pages (id, page_title) VALUES (1, 'Basics')",
        (),
    )
    .await?;
    conn.execute(
        "INSERT INTO textbook_slides (id, slide_title) VALUES (1, 'Welcome')",
        (),
    )
    .await?;
    conn.execute(
        "INSERT INTO revision_questions (id, textbook_page_id) VALUES (1, 1)",
        (),
    )
    .await?;

    for id in 1..=count {
        conn.execute(
            "INSERT INTO students (id, username) VALUES (?, ?)",
            vec![TursoValue::Integer(id), TursoValue::Text(format!("student{id}"))],
        )
        .await?;
        let status = if id % 3 == 0 { "revise" } else { "read" };
        conn.execute(
            "INSERT INTO slide_reads (id, student_id, slide_id, status) VALUES (?, ?, 1, ?)",
            vec![
                TursoValue::Integer(id),
                TursoValue::Integer(id),
                TursoValue::Text(status.to_string()),
            ],
        )
        .await?;
        conn.execute(
            "INSERT INTO slide_read_sessions (id, slide_read_id, expanded, read_at) VALUES (?, ?, ?, ?)",
            vec![
                TursoValue::Integer(id),
                TursoValue::Integer(id),
                TursoValue::Text(at.clone()),
                TursoValue::Text(format_timestamp(
                    now - Duration::days(1) + Duration::seconds(10 * id),
                )),
            ],
        )
        .await?;
        conn.execute(
            "INSERT INTO question_attempts (id, student_id, question_id, viewed) VALUES (?, ?, 1, ?)",
            vec![
                TursoValue::Integer(id),
                TursoValue::Integer(id),
                TursoValue::Text(at.clone()),
            ],
        )
        .await?;
        conn.execute(
            "INSERT INTO attempt_details (id, attempt_id, is_correct, timestamp) VALUES (?, ?, ?, ?)",
            vec![
                TursoValue::Integer(id),
                TursoValue::Integer(id),
                TursoValue::Integer((id % 2 == 0) as i64),
                TursoValue::Text(at.clone()),
            ],
        )
        .await?;
    }
    Ok(())
}

/// A small textbook export: one student, one slide read with a 90 second
/// session, one answered question and one graded writing interaction.
pub fn sample_engagement_export() -> Value {
    json!({
        "sections": [{"id": 1, "section_title": "Foundations"}],
        "pages": [{"id": 10, "page_title": "Ownership", "sections": [1]}],
        "slides": [{"id": 100, "slide_title": "Moves", "pages": [10]}],
        "user_slide_reads": [{"id": 1000, "user": 7, "slide": 100, "slide_status": "read"}],
        "user_slide_sessions": [{
            "id": 5000, "slide_read": 1000,
            "expanded": "2024-05-01T10:00:00Z", "read": "2024-05-01T10:01:30Z"
        }],
        "questions": [{"id": 20, "textbook_page": 10}],
        "attempts": [{"id": 300, "user": 7, "question": 20, "viewed": "2024-05-01T10:02:00Z"}],
        "attempt_details": [{"id": 400, "attempt": 300, "is_correct": true}],
        "writing_interactions": [{"id": 600, "user_id": 7, "grade": 85}]
    })
}
