//! Database backend trait
//!
//! This trait defines the interface that both storage engines implement.
//! SQL reaching a backend is already in that backend's dialect.

use crate::config::BackendKind;
use crate::value::{MutateOutcome, Row, SqlValue};
use async_trait::async_trait;
use thiserror::Error;

/// Storage engine behind the [`Store`](crate::Store) facade
///
/// Implementations bind every parameter through the driver and convert
/// result rows into the shared [`Row`] shape, so callers never see which
/// engine produced them.
#[async_trait]
pub trait DatabaseBackend: Send + Sync + 'static {
    /// Which engine this backend talks to
    fn kind(&self) -> BackendKind;

    /// Execute an INSERT/UPDATE/DELETE/DDL statement
    ///
    /// # Arguments
    ///
    /// * `sql` - Statement in this backend's placeholder dialect
    /// * `params` - Values bound to the placeholders, in order
    ///
    /// # Returns
    ///
    /// The number of affected rows
    async fn mutate(&self, sql: &str, params: &[SqlValue]) -> Result<MutateOutcome, StorageError>;

    /// Execute a SELECT statement and return every row
    ///
    /// # Arguments
    ///
    /// * `sql` - Statement in this backend's placeholder dialect
    /// * `params` - Values bound to the placeholders, in order
    ///
    /// # Returns
    ///
    /// Rows in the order the statement produced them
    async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>, StorageError>;

    /// Close the underlying connections, waiting for borrowed ones to return
    async fn close(&self);
}

/// Storage error type
///
/// Every variant carries a message only, so failures from either engine
/// look the same to callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// The schema bootstrap has not succeeded yet
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// The canonical statement does not match its parameters
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// The engine could not be reached or the connection broke
    #[error("Connection error: {0}")]
    Connection(String),

    /// No pooled connection became free in time
    #[error("Connection pool exhausted: {0}")]
    PoolExhausted(String),

    /// A unique, foreign key, not-null or check constraint rejected the statement
    #[error("Constraint violation: {0}")]
    Constraint(String),

    /// Any other statement failure (syntax, missing table, ...)
    #[error("Database error: {0}")]
    Query(String),

    /// A result row could not be converted
    #[error("Decode error: {0}")]
    Decode(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::PoolTimedOut => StorageError::PoolExhausted(error.to_string()),
            sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::WorkerCrashed => StorageError::Connection(error.to_string()),
            sqlx::Error::Configuration(_) => StorageError::Connection(error.to_string()),
            sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::Decode(_)
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::ColumnIndexOutOfBounds { .. }
            | sqlx::Error::TypeNotFound { .. } => StorageError::Decode(error.to_string()),
            sqlx::Error::Database(ref database_error) => match database_error.kind() {
                sqlx::error::ErrorKind::Other => StorageError::Query(error.to_string()),
                _ => StorageError::Constraint(error.to_string()),
            },
            _ => StorageError::Query(error.to_string()),
        }
    }
}
