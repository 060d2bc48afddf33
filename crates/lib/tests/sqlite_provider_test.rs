//! # SQLite Provider Tests
//!
//! This file contains tests specifically for the `SqliteProvider` that backs the
//! engagement store: schema creation, query execution and isolation of in-memory
//! instances.

mod common;

use crate::common::setup_tracing;
use engagement::{providers::db::sqlite::SqliteProvider, StoreError};
use serde_json::json;

#[tokio::test]
async fn test_sqlite_provider_basic_crud() {
    setup_tracing();

    // 1. Setup: Create a new in-memory SQLite provider.
    let provider = SqliteProvider::new(":memory:")
        .await
        .expect("Failed to create SqliteProvider");

    // 2. Arrange: Create a table and insert data.
    let setup_sql = "
        CREATE TABLE students (id INTEGER PRIMARY KEY, username TEXT NOT NULL);
        INSERT INTO students (id, username) VALUES (1, 'alice');
        INSERT INTO students (id, username) VALUES (2, 'bob');
    ";
    provider
        .initialize_with_data(setup_sql)
        .await
        .expect("Failed to initialize database with test data");

    // 3. Act
    let result_json = provider
        .execute_query("SELECT id, username FROM students ORDER BY id ASC")
        .await
        .expect("Failed to execute query");

    // 4. Assert
    let expected_json = json!([
        {"id": 1, "username": "alice"},
        {"id": 2, "username": "bob"}
    ])
    .to_string();
    assert_eq!(result_json, expected_json);
}

/// The schema can be applied repeatedly, as it is on every startup.
#[tokio::test]
async fn test_initialize_schema_is_idempotent() {
    setup_tracing();
    let provider = SqliteProvider::new(":memory:").await.unwrap();

    provider.initialize_schema().await.unwrap();
    provider.initialize_schema().await.unwrap();

    let result = provider
        .execute_query("SELECT COUNT(*) AS n FROM slide_read_sessions")
        .await
        .unwrap();
    assert_eq!(result, json!([{"n": 0}]).to_string());
}

/// A student can hold at most one slide read per slide.
#[tokio::test]
async fn test_slide_reads_are_unique_per_student_and_slide() {
    setup_tracing();
    let provider = SqliteProvider::new(":memory:").await.unwrap();
    provider.initialize_schema().await.unwrap();
    provider
        .initialize_with_data(
            "INSERT INTO slide_reads (id, student_id, slide_id, status) VALUES (1, 1, 1, 'read')",
        )
        .await
        .unwrap();

    let duplicate = provider
        .initialize_with_data(
            "INSERT INTO slide_reads (id, student_id, slide_id, status) VALUES (2, 1, 1, 'read')",
        )
        .await;

    assert!(duplicate.is_err(), "Duplicate (student, slide) pair must be rejected");
}

/// Verifies that each in-memory provider instance is isolated from the others.
#[tokio::test]
async fn test_sqlite_in_memory_is_isolated() {
    setup_tracing();

    let provider1 = SqliteProvider::new(":memory:")
        .await
        .expect("Failed to create provider 1");
    provider1
        .initialize_schema()
        .await
        .expect("Failed to initialize provider 1");

    let provider2 = SqliteProvider::new(":memory:")
        .await
        .expect("Failed to create provider 2");

    let result = provider2.execute_query("SELECT * FROM students").await;
    match result {
        Err(StoreError::StorageOperationFailed(msg)) => {
            assert!(
                msg.contains("no such table: students"),
                "Expected 'no such table' error, but got: {msg}"
            );
        }
        other => panic!("Expected StorageOperationFailed, but got {other:?}"),
    }
}
