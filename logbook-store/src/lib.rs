//! # logbook-store
//!
//! Backend-agnostic storage for submission logs.
//!
//! ## Features
//!
//! - One facade ([`Store`]) with two operations: `mutate` and `query`
//! - Embedded SQLite or networked PostgreSQL, chosen once from `DATABASE_URL`
//! - Statements are written once with `?` placeholders and translated per engine
//! - Parameters are always bound, never spliced into SQL
//! - Rows and errors look the same whichever engine is active
//!
//! ## Placeholder limitation
//!
//! Translation is purely textual: every `?` is a placeholder, including one
//! inside a string literal. Bind such values as parameters instead.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use logbook_store::{SqlValue, Store, StoreConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), logbook_store::StorageError> {
//!     let store = Store::open(&StoreConfig::sqlite("database.db")).await?;
//!
//!     store
//!         .mutate(
//!             "INSERT INTO logs (email, password, ip_address, timestamp) VALUES (?, ?, ?, ?)",
//!             &[
//!                 SqlValue::from("a@x.com"),
//!                 SqlValue::from("pw1"),
//!                 SqlValue::from("1.2.3.4"),
//!                 SqlValue::from("2024-01-01T00:00:00Z"),
//!             ],
//!         )
//!         .await?;
//!
//!     let rows = store
//!         .query("SELECT id, email, password, ip_address, timestamp FROM logs ORDER BY id DESC", &[])
//!         .await?;
//!     println!("{} rows", rows.len());
//!
//!     store.close().await;
//!     Ok(())
//! }
//! ```

// Public modules
pub mod config;
pub mod database;
pub mod dialect;
pub mod logs;
pub mod schema;
pub mod store;
pub mod value;

// Public exports
pub use config::{BackendKind, ConfigError, StoreConfig};
pub use dialect::{placeholder_count, translate};
pub use logs::{LogRecord, NewLogRecord};
pub use schema::SchemaError;
pub use store::Store;
pub use value::{MutateOutcome, Row, SqlValue};

// Re-export database backends
pub use database::traits::{DatabaseBackend, StorageError};

#[cfg(feature = "sqlite")]
pub use database::sqlite::SqliteBackend;

#[cfg(feature = "postgres")]
pub use database::postgres::PostgresBackend;
