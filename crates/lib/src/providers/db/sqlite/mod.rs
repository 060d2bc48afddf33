use crate::errors::StoreError;
use serde_json::Value;
use std::fmt::{self, Debug};
use tracing::debug;
use turso::{Connection, Database, Value as TursoValue};

pub mod sql;

/// A provider for the local engagement store, backed by SQLite through Turso.
///
/// This provider holds a `Database` instance, which manages a connection pool.
/// When cloned, it shares the same underlying database, allowing for concurrent and
/// shared access to the same database file or in-memory instance.
#[derive(Clone)]
pub struct SqliteProvider {
    /// The Turso database instance. It's cloneable and thread-safe.
    pub db: Database,
}

impl SqliteProvider {
    /// Creates a new `SqliteProvider` from a file path or in-memory.
    ///
    /// # Arguments
    ///
    /// * `db_path`: The path to the SQLite database file. Use ":memory:" for a unique,
    ///   isolated in-memory database. To share an in-memory database across multiple
    ///   `SqliteProvider` instances (e.g., in tests), create one provider and
    ///   then `.clone()` it.
    pub async fn new(db_path: &str) -> Result<Self, StoreError> {
        let db = turso::Builder::new_local(db_path)
            .build()
            .await
            .map_err(|e| StoreError::StorageConnection(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| StoreError::StorageConnection(e.to_string()))?;
        // Use `query` for PRAGMA statements that return a value to avoid "unexpected row" errors.
        conn.query("PRAGMA journal_mode=WAL;", ())
            .await
            .map_err(|e| StoreError::StorageConnection(e.to_string()))?;

        Ok(Self { db })
    }

    /// A helper for tests to pre-populate data by executing multiple SQL statements.
    pub async fn initialize_with_data(&self, init_sql: &str) -> Result<(), StoreError> {
        let conn = self.connect()?;

        for statement in init_sql.split(';').filter(|s| !s.trim().is_empty()) {
            conn.execute(statement, ())
                .await
                .map_err(|e| StoreError::StorageOperationFailed(e.to_string()))?;
        }
        Ok(())
    }

    /// Ensures that all engagement tables and indexes exist.
    /// This function is idempotent and safe to call on every application startup.
    pub async fn initialize_schema(&self) -> Result<(), StoreError> {
        let conn = self.connect()?;

        for statement in sql::ALL_TABLE_CREATION_SQL {
            conn.execute(statement, ())
                .await
                .map_err(|e| StoreError::StorageOperationFailed(e.to_string()))?;
        }
        Ok(())
    }

    /// Opens a new connection to the underlying database.
    pub fn connect(&self) -> Result<Connection, StoreError> {
        self.db
            .connect()
            .map_err(|e| StoreError::StorageConnection(e.to_string()))
    }

    /// Executes a query and returns the result rows as a JSON array string.
    pub async fn execute_query(&self, query: &str) -> Result<String, StoreError> {
        debug!(query = %query, "--> Executing SQLite query");
        let conn = self.connect()?;

        let mut stmt = conn
            .prepare(query)
            .await
            .map_err(|e| StoreError::StorageOperationFailed(e.to_string()))?;

        let column_names: Vec<String> = stmt
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();

        let mut rows = stmt
            .query(())
            .await
            .map_err(|e| StoreError::StorageOperationFailed(e.to_string()))?;

        let mut json_results: Vec<Value> = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| StoreError::StorageOperationFailed(e.to_string()))?
        {
            let mut row_map = serde_json::Map::new();
            for (i, name) in column_names.iter().enumerate() {
                let value = row
                    .get_value(i)
                    .map_err(|e| StoreError::StorageOperationFailed(e.to_string()))?;
                row_map.insert(name.clone(), turso_value_to_json(value));
            }
            json_results.push(Value::Object(row_map));
        }

        Ok(serde_json::to_string(&json_results)?)
    }
}

impl Debug for SqliteProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteProvider").finish_non_exhaustive()
    }
}

impl AsRef<Database> for SqliteProvider {
    fn as_ref(&self) -> &Database {
        &self.db
    }
}

/// Converts a Turso value to a serde_json::Value.
fn turso_value_to_json(v: TursoValue) -> Value {
    match v {
        TursoValue::Null => Value::Null,
        TursoValue::Integer(i) => Value::Number(i.into()),
        TursoValue::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        TursoValue::Text(s) => Value::String(s),
        TursoValue::Blob(_) => Value::String("<blob>".to_string()),
    }
}

/// Reads a nullable text column.
pub fn value_to_text(v: TursoValue) -> Option<String> {
    match v {
        TursoValue::Text(s) => Some(s),
        _ => None,
    }
}

/// Reads a nullable integer column. Reals are truncated.
pub fn value_to_i64(v: TursoValue) -> Option<i64> {
    match v {
        TursoValue::Integer(i) => Some(i),
        TursoValue::Real(f) => Some(f as i64),
        _ => None,
    }
}

/// Maps an optional string to a bindable value, `NULL` when absent.
pub fn text_or_null(v: Option<String>) -> TursoValue {
    v.map(TursoValue::Text).unwrap_or(TursoValue::Null)
}

/// Maps an optional integer to a bindable value, `NULL` when absent.
pub fn integer_or_null(v: Option<i64>) -> TursoValue {
    v.map(TursoValue::Integer).unwrap_or(TursoValue::Null)
}

/// Runs a single-value `COUNT(*)`-style query and returns the integer result.
pub async fn query_count(
    conn: &Connection,
    sql: &str,
    params: Vec<TursoValue>,
) -> Result<i64, StoreError> {
    let mut rows = conn.query(sql, params).await?;
    match rows.next().await? {
        Some(row) => Ok(value_to_i64(row.get_value(0)?).unwrap_or(0)),
        None => Ok(0),
    }
}

/// Returns `true` if a row with `id` exists in `table`.
pub async fn row_exists(conn: &Connection, table: &str, id: i64) -> Result<bool, StoreError> {
    let mut rows = conn
        .query(&sql::exists_by_id(table), vec![TursoValue::Integer(id)])
        .await?;
    Ok(rows.next().await?.is_some())
}
