//! Store configuration and backend selection
//!
//! The only input that decides the backend is `DATABASE_URL`. When it is
//! set to anything non-blank the networked engine (PostgreSQL) is used,
//! otherwise the embedded engine (SQLite) opens `SQLITE_PATH`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Environment variable holding the networked connection string.
pub const DATABASE_URL_VAR: &str = "DATABASE_URL";

/// Environment variable holding the embedded database file path.
pub const SQLITE_PATH_VAR: &str = "SQLITE_PATH";

/// Environment variable for the networked pool size.
pub const MAX_CONNECTIONS_VAR: &str = "DATABASE_MAX_CONNECTIONS";

/// Environment variable for the pooled connection wait, in seconds.
pub const ACQUIRE_TIMEOUT_VAR: &str = "DATABASE_ACQUIRE_TIMEOUT_SECS";

/// Default embedded database file.
pub const DEFAULT_SQLITE_PATH: &str = "database.db";

/// Default networked pool size.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Default wait for a pooled connection (30 seconds).
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Storage engine family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-process single-file engine (SQLite)
    Embedded,
    /// Engine reached over the network through a pool (PostgreSQL)
    Networked,
}

impl BackendKind {
    /// Decide which engine a configuration targets
    ///
    /// A non-blank `database_url` selects [`BackendKind::Networked`];
    /// anything else, including a missing value, selects
    /// [`BackendKind::Embedded`]. This never fails.
    pub fn select(config: &StoreConfig) -> Self {
        match config.database_url.as_deref() {
            Some(url) if !url.trim().is_empty() => BackendKind::Networked,
            _ => BackendKind::Embedded,
        }
    }

    /// Human readable engine name
    pub fn engine_name(self) -> &'static str {
        match self {
            BackendKind::Embedded => "sqlite",
            BackendKind::Networked => "postgres",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.engine_name())
    }
}

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A numeric setting could not be parsed
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidNumber {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Connection settings for the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Networked connection string; selects PostgreSQL when non-blank
    pub database_url: Option<String>,

    /// Embedded database file, `:memory:` for an in-memory database
    pub sqlite_path: PathBuf,

    /// Upper bound on pooled networked connections
    pub max_connections: u32,

    /// How long a call waits for a free pooled connection
    #[serde(with = "duration_secs")]
    pub acquire_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            sqlite_path: PathBuf::from(DEFAULT_SQLITE_PATH),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
        }
    }
}

impl StoreConfig {
    /// Embedded configuration for the given file
    pub fn sqlite(path: impl Into<PathBuf>) -> Self {
        Self {
            sqlite_path: path.into(),
            ..Self::default()
        }
    }

    /// Networked configuration for the given connection string
    pub fn postgres(url: impl Into<String>) -> Self {
        Self {
            database_url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Read the configuration from process environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through an arbitrary key lookup
    ///
    /// Unparseable numeric settings are logged and replaced by their
    /// defaults; they never prevent startup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self {
            database_url: lookup(DATABASE_URL_VAR),
            ..Self::default()
        };

        if let Some(path) = lookup(SQLITE_PATH_VAR).filter(|path| !path.trim().is_empty()) {
            config.sqlite_path = PathBuf::from(path);
        }

        match parse_number::<u32>(MAX_CONNECTIONS_VAR, lookup(MAX_CONNECTIONS_VAR)) {
            Ok(Some(0)) => {
                tracing::warn!("{} must be at least 1, using default", MAX_CONNECTIONS_VAR)
            }
            Ok(Some(value)) => config.max_connections = value,
            Ok(None) => {}
            Err(error) => tracing::warn!("{}, using default", error),
        }

        match parse_number::<u64>(ACQUIRE_TIMEOUT_VAR, lookup(ACQUIRE_TIMEOUT_VAR)) {
            Ok(Some(seconds)) => config.acquire_timeout = Duration::from_secs(seconds),
            Ok(None) => {}
            Err(error) => tracing::warn!("{}, using default", error),
        }

        config
    }

    /// The backend this configuration selects
    pub fn backend_kind(&self) -> BackendKind {
        BackendKind::select(self)
    }
}

fn parse_number<T>(key: &'static str, raw: Option<String>) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = raw else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<T>()
        .map(Some)
        .map_err(|error| ConfigError::InvalidNumber {
            key,
            value: raw.clone(),
            reason: error.to_string(),
        })
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
