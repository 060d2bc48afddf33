//! # SQLite Specific SQL Queries
//!
//! This module centralizes the schema and the SQL query strings used by the
//! engagement store. This keeps the feature, dataset and import logic free of
//! database-specific syntax.

pub const CREATE_STUDENTS_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS students (
        id INTEGER PRIMARY KEY,
        username TEXT NOT NULL
    );";

pub const CREATE_SECTIONS_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS textbook_sections (
        id INTEGER PRIMARY KEY,
        section_title TEXT NOT NULL DEFAULT ''
    );";

pub const CREATE_PAGES_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS textbook_pages (
        id INTEGER PRIMARY KEY,
        page_title TEXT NOT NULL DEFAULT ''
    );";

pub const CREATE_PAGE_SECTIONS_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS page_sections (
        page_id INTEGER NOT NULL,
        section_id INTEGER NOT NULL,
        PRIMARY KEY (page_id, section_id)
    );";

pub const CREATE_SLIDES_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS textbook_slides (
        id INTEGER PRIMARY KEY,
        slide_title TEXT NOT NULL DEFAULT ''
    );";

pub const CREATE_SLIDE_PAGES_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS slide_pages (
        slide_id INTEGER NOT NULL,
        page_id INTEGER NOT NULL,
        PRIMARY KEY (slide_id, page_id)
    );";

pub const CREATE_QUESTIONS_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS revision_questions (
        id INTEGER PRIMARY KEY,
        textbook_page_id INTEGER NOT NULL
    );";

pub const CREATE_ATTEMPTS_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS question_attempts (
        id INTEGER PRIMARY KEY,
        student_id INTEGER NOT NULL,
        question_id INTEGER NOT NULL,
        viewed TEXT,
        correct TEXT,
        processed INTEGER NOT NULL DEFAULT 0
    );";

pub const CREATE_ATTEMPT_DETAILS_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS attempt_details (
        id INTEGER PRIMARY KEY,
        attempt_id INTEGER NOT NULL,
        is_correct INTEGER NOT NULL,
        timestamp TEXT NOT NULL,
        processed INTEGER NOT NULL DEFAULT 0
    );";

pub const CREATE_WRITING_INTERACTIONS_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS writing_interactions (
        id INTEGER PRIMARY KEY,
        user_id INTEGER,
        page_id INTEGER,
        user_input TEXT NOT NULL DEFAULT '',
        model_response TEXT NOT NULL DEFAULT '',
        grade INTEGER,
        timestamp TEXT NOT NULL
    );";

pub const CREATE_SLIDE_READS_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS slide_reads (
        id INTEGER PRIMARY KEY,
        student_id INTEGER NOT NULL,
        slide_id INTEGER NOT NULL,
        status TEXT NOT NULL DEFAULT 'unread'
    );";

pub const CREATE_SLIDE_READS_UNIQUE_INDEX: &str = "
    CREATE UNIQUE INDEX IF NOT EXISTS idx_slide_reads_student_slide
    ON slide_reads (student_id, slide_id);";

pub const CREATE_SLIDE_READ_SESSIONS_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS slide_read_sessions (
        id INTEGER PRIMARY KEY,
        slide_read_id INTEGER NOT NULL,
        expanded TEXT NOT NULL,
        collapsed TEXT,
        read_at TEXT
    );";

/// Every statement needed to create the engagement schema, in dependency order.
pub const ALL_TABLE_CREATION_SQL: &[&str] = &[
    CREATE_STUDENTS_TABLE,
    CREATE_SECTIONS_TABLE,
    CREATE_PAGES_TABLE,
    CREATE_PAGE_SECTIONS_TABLE,
    CREATE_SLIDES_TABLE,
    CREATE_SLIDE_PAGES_TABLE,
    CREATE_QUESTIONS_TABLE,
    CREATE_ATTEMPTS_TABLE,
    CREATE_ATTEMPT_DETAILS_TABLE,
    CREATE_WRITING_INTERACTIONS_TABLE,
    CREATE_SLIDE_READS_TABLE,
    CREATE_SLIDE_READS_UNIQUE_INDEX,
    CREATE_SLIDE_READ_SESSIONS_TABLE,
];

// --- Feature aggregation ---

pub const SELECT_STUDENT: &str = "SELECT id, username FROM students WHERE id = ?";

/// Sessions of one student expanded at or after `?2`, with the slide they belong to.
pub const SELECT_STUDENT_SESSIONS: &str = "
    SELECT s.expanded, s.collapsed, s.read_at, r.slide_id
    FROM slide_read_sessions s
    JOIN slide_reads r ON r.id = s.slide_read_id
    WHERE r.student_id = ? AND s.expanded >= ?";

/// Attempt details of one student recorded at or after `?2`.
pub const SELECT_STUDENT_DETAILS: &str = "
    SELECT d.is_correct
    FROM attempt_details d
    JOIN question_attempts a ON a.id = d.attempt_id
    WHERE a.student_id = ? AND d.timestamp >= ?";

/// Attempts of one student viewed at or after `?2`.
pub const SELECT_STUDENT_ATTEMPTS: &str = "
    SELECT question_id FROM question_attempts
    WHERE student_id = ? AND viewed IS NOT NULL AND viewed >= ?";

pub const COUNT_STUDENT_REVISITS: &str =
    "SELECT COUNT(*) FROM slide_reads WHERE student_id = ? AND status = 'revise'";

// --- Dataset ---

/// Every student that has at least one attempt, slide read, or writing interaction.
pub const SELECT_ENGAGED_STUDENTS: &str = "
    SELECT id FROM students
    WHERE id IN (SELECT student_id FROM question_attempts)
       OR id IN (SELECT student_id FROM slide_reads)
       OR id IN (SELECT user_id FROM writing_interactions WHERE user_id IS NOT NULL)
    ORDER BY id";

// --- Dashboards ---

pub const SELECT_ALL_SESSIONS_SINCE: &str =
    "SELECT expanded, collapsed, read_at FROM slide_read_sessions WHERE expanded >= ?";

pub const SELECT_ALL_DETAILS_SINCE: &str =
    "SELECT is_correct FROM attempt_details WHERE timestamp >= ?";

pub const COUNT_ATTEMPTS_SINCE: &str =
    "SELECT COUNT(*) FROM question_attempts WHERE viewed IS NOT NULL AND viewed >= ?";

pub fn select_students_with_slide_reads(limit: u32) -> String {
    format!(
        "SELECT id FROM students
         WHERE id IN (SELECT student_id FROM slide_reads)
         ORDER BY id
         LIMIT {limit}"
    )
}

pub const SELECT_WRITING_GRADES: &str =
    "SELECT grade FROM writing_interactions WHERE user_id = ?";

pub fn select_recent_slide_reads(limit: u32) -> String {
    format!(
        "SELECT r.id, s.slide_title, r.status
         FROM slide_reads r
         JOIN textbook_slides s ON s.id = r.slide_id
         WHERE r.student_id = ?
         ORDER BY r.id DESC
         LIMIT {limit}"
    )
}

pub fn select_recent_attempts(limit: u32) -> String {
    format!(
        "SELECT a.id, p.page_title
         FROM question_attempts a
         JOIN revision_questions q ON q.id = a.question_id
         JOIN textbook_pages p ON p.id = q.textbook_page_id
         WHERE a.student_id = ?
         ORDER BY a.id DESC
         LIMIT {limit}"
    )
}

// --- Import upserts ---

pub const INSERT_STUDENT_IF_MISSING: &str =
    "INSERT INTO students (id, username) VALUES (?, ?) ON CONFLICT(id) DO NOTHING";

pub const UPSERT_SECTION: &str = "
    INSERT INTO textbook_sections (id, section_title) VALUES (?, ?)
    ON CONFLICT(id) DO UPDATE SET section_title = excluded.section_title";

pub const UPSERT_PAGE: &str = "
    INSERT INTO textbook_pages (id, page_title) VALUES (?, ?)
    ON CONFLICT(id) DO UPDATE SET page_title = excluded.page_title";

pub const LINK_PAGE_SECTION: &str = "
    INSERT INTO page_sections (page_id, section_id) VALUES (?, ?)
    ON CONFLICT(page_id, section_id) DO NOTHING";

pub const UPSERT_SLIDE: &str = "
    INSERT INTO textbook_slides (id, slide_title) VALUES (?, ?)
    ON CONFLICT(id) DO UPDATE SET slide_title = excluded.slide_title";

pub const LINK_SLIDE_PAGE: &str = "
    INSERT INTO slide_pages (slide_id, page_id) VALUES (?, ?)
    ON CONFLICT(slide_id, page_id) DO NOTHING";

pub const SELECT_SLIDE_READ_BY_PAIR: &str =
    "SELECT id FROM slide_reads WHERE student_id = ? AND slide_id = ?";

pub const UPSERT_SLIDE_READ: &str = "
    INSERT INTO slide_reads (id, student_id, slide_id, status) VALUES (?, ?, ?, ?)
    ON CONFLICT(id) DO UPDATE SET
        student_id = excluded.student_id,
        slide_id = excluded.slide_id,
        status = excluded.status";

pub const UPSERT_SLIDE_READ_SESSION: &str = "
    INSERT INTO slide_read_sessions (id, slide_read_id, expanded, collapsed, read_at)
    VALUES (?, ?, ?, ?, ?)
    ON CONFLICT(id) DO UPDATE SET
        slide_read_id = excluded.slide_read_id,
        expanded = excluded.expanded,
        collapsed = excluded.collapsed,
        read_at = excluded.read_at";

pub const UPSERT_QUESTION: &str = "
    INSERT INTO revision_questions (id, textbook_page_id) VALUES (?, ?)
    ON CONFLICT(id) DO UPDATE SET textbook_page_id = excluded.textbook_page_id";

pub const UPSERT_ATTEMPT: &str = "
    INSERT INTO question_attempts (id, student_id, question_id, viewed, correct)
    VALUES (?, ?, ?, ?, ?)
    ON CONFLICT(id) DO UPDATE SET
        student_id = excluded.student_id,
        question_id = excluded.question_id,
        viewed = excluded.viewed,
        correct = excluded.correct";

pub const UPSERT_ATTEMPT_DETAIL: &str = "
    INSERT INTO attempt_details (id, attempt_id, is_correct, timestamp)
    VALUES (?, ?, ?, ?)
    ON CONFLICT(id) DO UPDATE SET
        attempt_id = excluded.attempt_id,
        is_correct = excluded.is_correct,
        timestamp = excluded.timestamp";

pub const UPSERT_WRITING_INTERACTION: &str = "
    INSERT INTO writing_interactions
        (id, user_id, page_id, user_input, model_response, grade, timestamp)
    VALUES (?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT(id) DO UPDATE SET
        user_id = excluded.user_id,
        page_id = excluded.page_id,
        user_input = excluded.user_input,
        model_response = excluded.model_response,
        grade = excluded.grade,
        timestamp = excluded.timestamp";

/// Returns a query checking for a row with the given id in `table`.
pub fn exists_by_id(table: &str) -> String {
    format!("SELECT 1 FROM {table} WHERE id = ?")
}
