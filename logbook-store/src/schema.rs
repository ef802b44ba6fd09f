//! Schema bootstrap for the `logs` table
//!
//! One idempotent `CREATE TABLE IF NOT EXISTS` statement per engine. The
//! logical columns are identical; only the spelling of the generated id
//! differs.

use crate::config::BackendKind;
use crate::database::traits::{DatabaseBackend, StorageError};
use thiserror::Error;

/// Name of the table holding log records
pub const LOGS_TABLE: &str = "logs";

/// Schema bootstrap error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed to create {table} table on {kind}: {source}")]
pub struct SchemaError {
    pub table: &'static str,
    pub kind: BackendKind,
    #[source]
    pub source: StorageError,
}

/// DDL creating the `logs` table for the given engine
pub fn create_table_sql(kind: BackendKind) -> &'static str {
    match kind {
        BackendKind::Embedded => {
            r#"
            CREATE TABLE IF NOT EXISTS logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email TEXT,
                password TEXT,
                ip_address TEXT,
                timestamp TEXT
            )
            "#
        }
        BackendKind::Networked => {
            r#"
            CREATE TABLE IF NOT EXISTS logs (
                id BIGSERIAL PRIMARY KEY,
                email TEXT,
                password TEXT,
                ip_address TEXT,
                timestamp TEXT
            )
            "#
        }
    }
}

/// Create the `logs` table if it does not exist yet
///
/// Safe to run on every start. The statement goes straight to the backend
/// so it works before the store is marked ready.
pub async fn ensure_schema(backend: &dyn DatabaseBackend) -> Result<(), SchemaError> {
    let kind = backend.kind();
    backend
        .mutate(create_table_sql(kind), &[])
        .await
        .map(|_| ())
        .map_err(|source| SchemaError {
            table: LOGS_TABLE,
            kind,
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column_lines(sql: &str) -> Vec<String> {
        sql.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with("CREATE") && *line != ")")
            .map(|line| line.trim_end_matches(',').to_string())
            .collect()
    }

    #[test]
    fn test_id_spelling_per_engine() {
        assert!(create_table_sql(BackendKind::Embedded).contains("INTEGER PRIMARY KEY AUTOINCREMENT"));
        assert!(create_table_sql(BackendKind::Networked).contains("BIGSERIAL PRIMARY KEY"));
    }

    #[test]
    fn test_same_logical_columns() {
        let embedded = column_lines(create_table_sql(BackendKind::Embedded));
        let networked = column_lines(create_table_sql(BackendKind::Networked));
        assert_eq!(embedded.len(), 5);
        assert_eq!(embedded[1..], networked[1..]);
        assert_eq!(
            embedded[1..],
            ["email TEXT", "password TEXT", "ip_address TEXT", "timestamp TEXT"]
        );
    }

    #[test]
    fn test_idempotent_ddl() {
        for kind in [BackendKind::Embedded, BackendKind::Networked] {
            assert!(create_table_sql(kind).contains("IF NOT EXISTS"));
        }
    }
}
