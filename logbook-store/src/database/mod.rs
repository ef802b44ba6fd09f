//! Database abstraction layer
//!
//! This module provides the engine-agnostic backend interface and its
//! SQLite and PostgreSQL implementations.

pub mod traits;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;

// Re-export the main trait
pub use traits::{DatabaseBackend, StorageError};
