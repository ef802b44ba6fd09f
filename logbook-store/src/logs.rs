//! Log record types and the canonical statements that read and write them

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::value::{Row, SqlValue};

/// Canonical insert for one record; parameters are email, password,
/// ip_address and timestamp in that order
pub const INSERT_LOG_SQL: &str =
    "INSERT INTO logs (email, password, ip_address, timestamp) VALUES (?, ?, ?, ?)";

/// Canonical select returning every record, newest first
pub const SELECT_LOGS_SQL: &str =
    "SELECT id, email, password, ip_address, timestamp FROM logs ORDER BY id DESC";

/// Canonical row count
pub const COUNT_LOGS_SQL: &str = "SELECT COUNT(*) AS count FROM logs";

/// A stored log record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Assigned by the engine, increasing with insertion order
    pub id: i64,
    pub email: String,
    pub password: String,
    pub ip_address: Option<String>,
    /// ISO-8601, taken when the submission was received
    pub timestamp: String,
}

impl LogRecord {
    /// Decode a result row
    pub fn from_row(row: Row) -> Result<Self, serde_json::Error> {
        serde_json::from_value(serde_json::Value::Object(row))
    }
}

/// A record to insert; the id is left to the engine
///
/// Values are stored exactly as given. Empty or malformed fields are not
/// rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLogRecord {
    pub email: String,
    pub password: String,
    pub ip_address: Option<String>,
    pub timestamp: String,
}

impl NewLogRecord {
    /// Build a record stamped with the current UTC time
    pub fn now(
        email: impl Into<String>,
        password: impl Into<String>,
        ip_address: Option<String>,
    ) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            ip_address,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    /// Parameters for [`INSERT_LOG_SQL`]
    pub fn params(&self) -> [SqlValue; 4] {
        [
            SqlValue::from(self.email.as_str()),
            SqlValue::from(self.password.as_str()),
            SqlValue::from(self.ip_address.as_deref()),
            SqlValue::from(self.timestamp.as_str()),
        ]
    }
}
