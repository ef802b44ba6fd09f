//! PostgreSQL database backend implementation

use crate::config::{BackendKind, StoreConfig};
use crate::database::traits::{DatabaseBackend, StorageError};
use crate::value::{MutateOutcome, Row, SqlValue};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};
use serde_json::Value;
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::postgres::types::Oid;
use sqlx::postgres::{
    PgArgumentBuffer, PgArguments, PgConnectOptions, PgPoolOptions, PgRow, PgTypeInfo,
};
use sqlx::query::Query;
use sqlx::types::{Decimal, Uuid};
use sqlx::{Column, PgPool, Postgres, Row as _, TypeInfo};
use std::str::FromStr;

/// NULL parameter without a declared type
///
/// Sent with OID 0 so the server infers the type from the surrounding
/// statement, the way SQLite accepts NULL in any column.
struct UntypedNull;

impl sqlx::Type<Postgres> for UntypedNull {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_oid(Oid(0))
    }
}

impl sqlx::Encode<'_, Postgres> for UntypedNull {
    fn encode_by_ref(&self, _buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        Ok(IsNull::Yes)
    }
}

/// PostgreSQL database backend
///
/// Statements borrow a connection from the pool and return it when done,
/// so independent calls run in parallel up to the pool size.
pub struct PostgresBackend {
    pool: PgPool,
}

impl PostgresBackend {
    /// Create a new PostgreSQL backend
    ///
    /// # Arguments
    ///
    /// * `pool` - PostgreSQL connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Build a pool for `url` without connecting yet
    ///
    /// Only a malformed connection string fails here. An unreachable server
    /// surfaces later as a [`StorageError::Connection`] or
    /// [`StorageError::PoolExhausted`] on the first statement.
    pub fn connect_lazy(url: &str, config: &StoreConfig) -> Result<Self, StorageError> {
        let options = PgConnectOptions::from_str(url.trim())
            .map_err(|error| StorageError::Connection(format!("invalid DATABASE_URL: {error}")))?;

        tracing::info!(
            "Using PostgreSQL at {}:{} (pool size {})",
            options.get_host(),
            options.get_port(),
            config.max_connections
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_lazy_with(options);

        Ok(Self::new(pool))
    }

    /// Bind parameters in order
    fn bind_params<'q>(
        mut statement: Query<'q, Postgres, PgArguments>,
        params: &[SqlValue],
    ) -> Query<'q, Postgres, PgArguments> {
        for value in params {
            statement = match value {
                SqlValue::Null => statement.bind(UntypedNull),
                SqlValue::Integer(integer) => statement.bind(*integer),
                SqlValue::Real(real) => statement.bind(*real),
                SqlValue::Text(text) => statement.bind(text.clone()),
            };
        }
        statement
    }

    /// Convert a PostgreSQL row to the shared row shape
    fn row_to_json(row: &PgRow) -> Result<Row, StorageError> {
        let mut map = Row::new();

        for column in row.columns() {
            let ordinal = column.ordinal();

            let value = match column.type_info().name() {
                // SQLite has no boolean type and yields 0/1
                "BOOL" => {
                    let value: Option<bool> = row.try_get(ordinal)?;
                    value
                        .map(|v| Value::Number(i64::from(v).into()))
                        .unwrap_or(Value::Null)
                }
                "INT2" => {
                    let value: Option<i16> = row.try_get(ordinal)?;
                    value.map(|v| Value::Number(v.into())).unwrap_or(Value::Null)
                }
                "INT4" => {
                    let value: Option<i32> = row.try_get(ordinal)?;
                    value.map(|v| Value::Number(v.into())).unwrap_or(Value::Null)
                }
                "INT8" => {
                    let value: Option<i64> = row.try_get(ordinal)?;
                    value.map(|v| Value::Number(v.into())).unwrap_or(Value::Null)
                }
                "FLOAT4" => {
                    let value: Option<f32> = row.try_get(ordinal)?;
                    value
                        .and_then(|v| serde_json::Number::from_f64(v as f64))
                        .map(Value::Number)
                        .unwrap_or(Value::Null)
                }
                "FLOAT8" => {
                    let value: Option<f64> = row.try_get(ordinal)?;
                    value
                        .and_then(serde_json::Number::from_f64)
                        .map(Value::Number)
                        .unwrap_or(Value::Null)
                }
                "TEXT" | "VARCHAR" | "CHAR" | "NAME" | "BPCHAR" => {
                    let value: Option<String> = row.try_get(ordinal)?;
                    value.map(Value::String).unwrap_or(Value::Null)
                }
                "BYTEA" => {
                    let value: Option<Vec<u8>> = row.try_get(ordinal)?;
                    value
                        .map(|bytes| Value::String(format!("[BLOB: {} bytes]", bytes.len())))
                        .unwrap_or(Value::Null)
                }
                "TIMESTAMPTZ" => {
                    let value: Option<DateTime<Utc>> = row.try_get(ordinal)?;
                    value
                        .map(|v| Value::String(v.to_rfc3339_opts(SecondsFormat::AutoSi, true)))
                        .unwrap_or(Value::Null)
                }
                "TIMESTAMP" => {
                    let value: Option<NaiveDateTime> = row.try_get(ordinal)?;
                    value
                        .map(|v| Value::String(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string()))
                        .unwrap_or(Value::Null)
                }
                "DATE" => {
                    let value: Option<NaiveDate> = row.try_get(ordinal)?;
                    value
                        .map(|v| Value::String(v.to_string()))
                        .unwrap_or(Value::Null)
                }
                "TIME" => {
                    let value: Option<NaiveTime> = row.try_get(ordinal)?;
                    value
                        .map(|v| Value::String(v.to_string()))
                        .unwrap_or(Value::Null)
                }
                "JSON" | "JSONB" => {
                    let value: Option<Value> = row.try_get(ordinal)?;
                    value.unwrap_or(Value::Null)
                }
                "UUID" => {
                    let value: Option<Uuid> = row.try_get(ordinal)?;
                    value
                        .map(|v| Value::String(v.to_string()))
                        .unwrap_or(Value::Null)
                }
                // Kept as text to preserve precision
                "NUMERIC" => {
                    let value: Option<Decimal> = row.try_get(ordinal)?;
                    value
                        .map(|v| Value::String(v.to_string()))
                        .unwrap_or(Value::Null)
                }
                other => {
                    let value: Option<String> = row.try_get(ordinal).map_err(|_| {
                        StorageError::Decode(format!(
                            "unsupported type {} in column {}",
                            other,
                            column.name()
                        ))
                    })?;
                    value.map(Value::String).unwrap_or(Value::Null)
                }
            };

            map.insert(column.name().to_string(), value);
        }

        Ok(map)
    }
}

#[async_trait]
impl DatabaseBackend for PostgresBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Networked
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
