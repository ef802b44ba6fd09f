//! SQLite database backend implementation

use crate::config::{BackendKind, StoreConfig};
use crate::database::traits::{DatabaseBackend, StorageError};
use crate::value::{MutateOutcome, Row, SqlValue};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row as _, Sqlite, SqlitePool, TypeInfo, ValueRef};
use std::path::Path;

/// In-memory database marker accepted in `SQLITE_PATH`
pub const MEMORY_PATH: &str = ":memory:";

/// SQLite database backend
///
/// The pool holds a single connection, so every statement runs one after
/// another against the file.
pub struct SqliteBackend {
    pool: SqlitePool,
}

impl SqliteBackend {
    /// Create a new SQLite backend
    ///
    /// # Arguments
    ///
    /// * `pool` - SQLite connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open the database described by `config` without connecting yet
    ///
    /// The file is created on first use when missing. Must be called from
    /// within a Tokio runtime.
    pub fn connect_lazy(config: &StoreConfig) -> Self {
        let options = Self::connect_options(&config.sqlite_path);
        let in_memory = config.sqlite_path == Path::new(MEMORY_PATH);

        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(config.acquire_timeout);

        if in_memory {
            // Each in-memory connection is its own database; never drop it.
            pool_options = pool_options
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        tracing::info!(
            "Opening SQLite database at {}",
            config.sqlite_path.display()
        );
        Self::new(pool_options.connect_lazy_with(options))
    }

    fn connect_options(path: &Path) -> SqliteConnectOptions {
        if path == Path::new(MEMORY_PATH) {
            SqliteConnectOptions::new().in_memory(true)
        } else {
            SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
        }
    }

    /// Bind parameters in order
    fn bind_params<'q>(
        mut statement: Query<'q, Sqlite, SqliteArguments<'q>>,
        params: &[SqlValue],
    ) -> Query<'q, Sqlite, SqliteArguments<'q>> {
        for value in params {
            statement = match value {
                SqlValue::Null => statement.bind(None::<String>),
                SqlValue::Integer(integer) => statement.bind(*integer),
                SqlValue::Real(real) => statement.bind(*real),
                SqlValue::Text(text) => statement.bind(text.clone()),
            };
        }
        statement
    }

    /// Convert a SQLite row to the shared row shape
    fn row_to_json(row: &SqliteRow) -> Result<Row, StorageError> {
        let mut map = Row::new();

        for column in row.columns() {
            let value = Self::extract_column_value(row, column)?;
            map.insert(column.name().to_string(), value);
        }

        Ok(map)
    }

    /// Extract a column value from a SQLite row and convert to JSON
    fn extract_column_value(
        row: &SqliteRow,
        column: &sqlx::sqlite::SqliteColumn,
    ) -> Result<Value, StorageError> {
        let ordinal = column.ordinal();

        if row.try_get_raw(ordinal)?.is_null() {
            return Ok(Value::Null);
        }

        // Declared types are only affinities; fall through on mismatch
        match column.type_info().name() {
            "INTEGER" | "BIGINT" | "INT" => {
                if let Ok(value) = row.try_get::<i64, _>(ordinal) {
                    return Ok(Value::Number(value.into()));
                }
            }
            "REAL" | "FLOAT" | "DOUBLE" => {
                if let Ok(value) = row.try_get::<f64, _>(ordinal) {
                    if let Some(number) = serde_json::Number::from_f64(value) {
                        return Ok(Value::Number(number));
                    }
                }
            }
            "BLOB" => {
                if let Ok(value) = row.try_get::<Vec<u8>, _>(ordinal) {
                    return Ok(Value::String(format!("[BLOB: {} bytes]", value.len())));
                }
            }
            _ => {
                if let Ok(value) = row.try_get::<String, _>(ordinal) {
                    return Ok(Value::String(value));
                }
            }
        }

        if let Ok(value) = row.try_get::<i64, _>(ordinal) {
            return Ok(Value::Number(value.into()));
        }
        if let Ok(value) = row.try_get::<f64, _>(ordinal) {
            if let Some(number) = serde_json::Number::from_f64(value) {
                return Ok(Value::Number(number));
            }
        }
        if let Ok(value) = row.try_get::<String, _>(ordinal) {
            return Ok(Value::String(value));
        }

        Err(StorageError::Decode(format!(
            "unsupported value in column {}",
            column.name()
        )))
    }
}

#[async_trait]
impl DatabaseBackend for SqliteBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Embedded
    }

    async fn mutate(&self, sql: &str, params: &[SqlValue]) -> Result<MutateOutcome, StorageError> {
        let statement = Self::bind_params(sqlx::query(sql), params);
        let result = statement.execute(&self.pool).await?;

        Ok(MutateOutcome {
            rows_affected: result.rows_affected(),
        })
    }

    async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>, StorageError> {
        let statement = Self::bind_params(sqlx::query(sql), params);
        let rows = statement.fetch_all(&self.pool).await?;

        rows.iter().map(Self::row_to_json).collect()
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_backend() -> SqliteBackend {
        SqliteBackend::connect_lazy(&StoreConfig::sqlite(MEMORY_PATH))
    }

    #[tokio::test]
    async fn test_row_values_normalized() {
        let backend = memory_backend();
        let rows = backend
            .query(
                "SELECT ? AS number, ? AS text, ? AS missing, ? AS ratio",
                &[
                    SqlValue::Integer(42),
                    SqlValue::from("hello"),
                    SqlValue::Null,
                    SqlValue::Real(1.5),
                ],
            )
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row["number"], Value::from(42));
        assert_eq!(row["text"], Value::from("hello"));
        assert_eq!(row["missing"], Value::Null);
        assert_eq!(row["ratio"], Value::from(1.5));
    }

    #[tokio::test]
    async fn test_boolean_expressions_are_numbers() {
        let backend = memory_backend();
        let rows = backend.query("SELECT 1 = 1 AS yes, 1 = 2 AS no", &[]).await.unwrap();
        assert_eq!(rows[0]["yes"], Value::from(1));
        assert_eq!(rows[0]["no"], Value::from(0));
    }

    #[tokio::test]
    async fn test_mutate_reports_affected_rows() {
        let backend = memory_backend();
        backend
            .mutate("CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT)", &[])
            .await
            .unwrap();

        for name in ["a", "b", "c"] {
            let outcome = backend
                .mutate("INSERT INTO items (name) VALUES (?)", &[name.into()])
                .await
                .unwrap();
            assert_eq!(outcome.rows_affected, 1);
        }

        let outcome = backend
            .mutate("UPDATE items SET name = ? WHERE id > ?", &["z".into(), SqlValue::Integer(1)])
            .await
            .unwrap();
        assert_eq!(outcome.rows_affected, 2);
    }

    #[tokio::test]
    async fn test_syntax_error_is_query_error() {
        let backend = memory_backend();
        let error = backend.query("SELEKT 1", &[]).await.unwrap_err();
        assert!(matches!(error, StorageError::Query(_)), "{error:?}");
    }

    #[tokio::test]
    async fn test_unique_violation_is_constraint_error() {
        let backend = memory_backend();
        backend
            .mutate("CREATE TABLE keys (name TEXT UNIQUE)", &[])
            .await
            .unwrap();
        backend
            .mutate("INSERT INTO keys (name) VALUES (?)", &["k".into()])
            .await
            .unwrap();

        let error = backend
            .mutate("INSERT INTO keys (name) VALUES (?)", &["k".into()])
            .await
            .unwrap_err();
        assert!(matches!(error, StorageError::Constraint(_)), "{error:?}");
    }

    #[tokio::test]
    async fn test_closed_backend_fails_with_connection_error() {
        let backend = memory_backend();
        backend.close().await;
        let error = backend.query("SELECT 1", &[]).await.unwrap_err();
        assert!(matches!(error, StorageError::Connection(_)), "{error:?}");
    }
}
