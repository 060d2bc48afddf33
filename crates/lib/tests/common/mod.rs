#![allow(dead_code)]
//! # Common Test Utilities
//!
//! Shared setup for the engagement library tests: tracing, fresh in-memory
//! stores with the schema applied, and small helpers to seed engagement records.

use chrono::{DateTime, Duration, Utc};
use engagement::{providers::db::sqlite::SqliteProvider, types::format_timestamp};
use std::sync::Once;
use turso::Value as TursoValue;

static INIT: Once = Once::new();

/// Initializes the tracing subscriber once per test binary.
pub fn setup_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt::init();
    });
}

/// Creates an isolated in-memory store with the engagement schema.
pub async fn setup_store() -> SqliteProvider {
    setup_tracing();
    let provider = SqliteProvider::new(":memory:")
        .await
        .expect("Failed to create SqliteProvider");
    provider
        .initialize_schema()
        .await
        .expect("Failed to initialize schema");
    provider
}

/// Formats `now - ago` in the storage format.
pub fn ago(now: DateTime<Utc>, ago: Duration) -> String {
    format_timestamp(now - ago)
}

/// A fluent seeder over a store. Ids are chosen by the caller.
pub struct Seeder<'a> {
    provider: &'a SqliteProvider,
}

impl<'a> Seeder<'a> {
    pub fn new(provider: &'a SqliteProvider) -> Self {
        Self { provider }
    }

    async fn exec(&self, sql: &str, params: Vec<TursoValue>) {
        let conn = self.provider.connect().expect("connect");
        conn.execute(sql, params).await.expect("seed statement failed");
    }

    pub async fn student(&self, id: i64) -> &Self {
        self.exec(
            "INSERT INTO students (id, username) VALUES (?, ?)",
            vec![TursoValue::Integer(id), TursoValue::Text(format!("student{id}"))],
        )
        .await;
        self
    }

    pub async fn page(&self, id: i64, title: &str) -> &Self {
        self.exec(
            "INSERT INTO textbook_pages (id, page_title) VALUES (?, ?)",
            vec![TursoValue::Integer(id), TursoValue::Text(title.to_string())],
        )
        .await;
        self
    }

    pub async fn slide(&self, id: i64, title: &str) -> &Self {
        self.exec(
            "INSERT INTO textbook_slides (id, slide_title) VALUES (?, ?)",
            vec![TursoValue::Integer(id), TursoValue::Text(title.to_string())],
        )
        .await;
        self
    }

    pub async fn slide_read(&self, id: i64, student: i64, slide: i64, status: &str) -> &Self {
        self.exec(
            "INSERT INTO slide_reads (id, student_id, slide_id, status) VALUES (?, ?, ?, ?)",
            vec![
                TursoValue::Integer(id),
                TursoValue::Integer(student),
                TursoValue::Integer(slide),
                TursoValue::Text(status.to_string()),
            ],
        )
        .await;
        self
    }

    /// A session that starts at `expanded` and is read `seconds` later.
    pub async fn session(&self, id: i64, slide_read: i64, expanded: DateTime<Utc>, seconds: i64) -> &Self {
        self.exec(
            "INSERT INTO slide_read_sessions (id, slide_read_id, expanded, collapsed, read_at)
             VALUES (?, ?, ?, NULL, ?)",
            vec![
                TursoValue::Integer(id),
                TursoValue::Integer(slide_read),
                TursoValue::Text(format_timestamp(expanded)),
                TursoValue::Text(format_timestamp(expanded + Duration::seconds(seconds))),
            ],
        )
        .await;
        self
    }

    pub async fn question(&self, id: i64, page: i64) -> &Self {
        self.exec(
            "INSERT INTO revision_questions (id, textbook_page_id) VALUES (?, ?)",
            vec![TursoValue::Integer(id), TursoValue::Integer(page)],
        )
        .await;
        self
    }

    pub async fn attempt(&self, id: i64, student: i64, question: i64, viewed: DateTime<Utc>) -> &Self {
        self.exec(
            "INSERT INTO question_attempts (id, student_id, question_id, viewed) VALUES (?, ?, ?, ?)",
            vec![
                TursoValue::Integer(id),
                TursoValue::Integer(student),
                TursoValue::Integer(question),
                TursoValue::Text(format_timestamp(viewed)),
            ],
        )
        .await;
        self
    }

    pub async fn detail(&self, id: i64, attempt: i64, correct: bool, at: DateTime<Utc>) -> &Self {
        self.exec(
            "INSERT INTO attempt_details (id, attempt_id, is_correct, timestamp) VALUES (?, ?, ?, ?)",
            vec![
                TursoValue::Integer(id),
                TursoValue::Integer(attempt),
                TursoValue::Integer(correct as i64),
                TursoValue::Text(format_timestamp(at)),
            ],
        )
        .await;
        self
    }

    pub async fn writing(&self, id: i64, user: i64, grade: Option<i64>) -> &Self {
        self.exec(
            "INSERT INTO writing_interactions (id, user_id, page_id, user_input, model_response, grade, timestamp)
             VALUES (?, ?, NULL, '', '', ?, ?)",
            vec![
                TursoValue::Integer(id),
                TursoValue::Integer(user),
                grade.map(TursoValue::Integer).unwrap_or(TursoValue::Null),
                TursoValue::Text(format_timestamp(Utc::now())),
            ],
        )
        .await;
        self
    }
}

/// Seeds `count` students whose time per slide is `10 * id` seconds and who
/// answer one question each, so every row of the dataset differs.
pub async fn seed_cohort(provider: &SqliteProvider, count: i64, now: DateTime<Utc>) {
    let seed = Seeder::new(provider);
    seed.page(1, "Basics").await;
    seed.slide(1, "Welcome").await;
    seed.question(1, 1).await;
    for id in 1..=count {
        seed.student(id).await;
        seed.slide_read(id, id, 1, if id % 3 == 0 { "revise" } else { "read" })
            .await;
        seed.session(id, id, now - Duration::days(1), 10 * id).await;
        seed.attempt(id, id, 1, now - Duration::days(1)).await;
        seed.detail(id, id, id % 2 == 0, now - Duration::days(1)).await;
    }
}
