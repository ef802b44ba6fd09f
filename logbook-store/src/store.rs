//! Store - the single entry point for reading and writing log records
//!
//! A [`Store`] owns the backend chosen at startup. Callers hand it
//! statements written with `?` placeholders; it translates them for the
//! active engine, binds the parameters and returns engine-neutral results.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::{BackendKind, StoreConfig};
use crate::database::traits::{DatabaseBackend, StorageError};
use crate::dialect::{placeholder_count, translate};
use crate::logs::{LogRecord, NewLogRecord, COUNT_LOGS_SQL, INSERT_LOG_SQL, SELECT_LOGS_SQL};
use crate::schema::{self, SchemaError};
use crate::value::{MutateOutcome, Row, SqlValue};

#[cfg(feature = "sqlite")]
use crate::database::sqlite::SqliteBackend;

#[cfg(feature = "postgres")]
use crate::database::postgres::PostgresBackend;

/// Facade over the active storage engine
///
/// Cloning is cheap and every clone shares the same backend and readiness
/// state. The backend is fixed for the lifetime of the store.
///
/// # Example
///
/// ```rust,no_run
/// use logbook_store::{NewLogRecord, Store, StoreConfig};
///
/// # async fn example() -> Result<(), logbook_store::StorageError> {
/// let store = Store::open(&StoreConfig::from_env()).await?;
/// store
///     .record(&NewLogRecord::now("a@x.com", "pw1", Some("1.2.3.4".to_string())))
///     .await?;
/// let records = store.list().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Store {
    backend: Arc<dyn DatabaseBackend>,
    ready: Arc<AtomicBool>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("kind", &self.kind())
            .field("ready", &self.is_ready())
            .finish()
    }
}

impl Store {
    /// Select, open and bootstrap the backend described by `config`
    ///
    /// Connections are opened lazily. A failed schema bootstrap is logged
    /// and the store is returned anyway; its calls then fail with
    /// [`StorageError::Unavailable`] until [`Store::ensure_schema`]
    /// succeeds.
    ///
    /// # Errors
    ///
    /// Only when the configuration cannot be used at all: a malformed
    /// `DATABASE_URL`, or an engine whose cargo feature is disabled.
    pub async fn open(config: &StoreConfig) -> Result<Self, StorageError> {
        let kind = BackendKind::select(config);
        tracing::info!("Selected {} backend", kind);

        let store = Self::from_backend(Self::connect(kind, config)?);

        if let Err(error) = store.ensure_schema().await {
            tracing::error!("{}; requests will fail until the schema is ready", error);
        }

        Ok(store)
    }

    #[cfg(all(feature = "sqlite", feature = "postgres"))]
    fn connect(kind: BackendKind, config: &StoreConfig) -> Result<Arc<dyn DatabaseBackend>, StorageError> {
        Ok(match kind {
            BackendKind::Embedded => Arc::new(SqliteBackend::connect_lazy(config)),
            BackendKind::Networked => {
                let url = config.database_url.as_deref().unwrap_or_default();
                Arc::new(PostgresBackend::connect_lazy(url, config)?)
            }
        })
    }

    #[cfg(not(all(feature = "sqlite", feature = "postgres")))]
    #[cfg_attr(
        not(any(feature = "sqlite", feature = "postgres")),
        allow(unused_variables)
    )]
    fn connect(kind: BackendKind, config: &StoreConfig) -> Result<Arc<dyn DatabaseBackend>, StorageError> {
        match kind {
            #[cfg(feature = "sqlite")]
            BackendKind::Embedded => Ok(Arc::new(SqliteBackend::connect_lazy(config))),
            #[cfg(feature = "postgres")]
            BackendKind::Networked => {
                let url = config.database_url.as_deref().unwrap_or_default();
                Ok(Arc::new(PostgresBackend::connect_lazy(url, config)?))
            }
            #[allow(unreachable_patterns)]
            other => {
                Err(StorageError::Unavailable(format!(
                    "{} support is not compiled in",
                    other
                )))
            }
        }
    }

    /// Wrap an already constructed backend
    ///
    /// The store starts out not ready; call [`Store::ensure_schema`]
    /// before issuing statements.
    pub fn from_backend(backend: Arc<dyn DatabaseBackend>) -> Self {
        Self {
            backend,
            ready: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The engine this store talks to
    pub fn kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Whether the schema bootstrap has succeeded
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Create the `logs` table if missing and mark the store ready
    ///
    /// Idempotent; safe to call again after a failure.
    pub async fn ensure_schema(&self) -> Result<(), SchemaError> {
        schema::ensure_schema(self.backend.as_ref()).await?;
        if !self.ready.swap(true, Ordering::AcqRel) {
            tracing::info!("{} table ready on {}", schema::LOGS_TABLE, self.kind());
        }
        Ok(())
    }

    /// Run an INSERT/UPDATE/DELETE statement written with `?` placeholders
    pub async fn mutate(&self, sql: &str, params: &[SqlValue]) -> Result<MutateOutcome, StorageError> {
        let sql = self.prepare(sql, params)?;
        tracing::debug!(backend = %self.kind(), params = params.len(), "mutate");
        self.backend.mutate(&sql, params).await
    }

    /// Run a SELECT statement written with `?` placeholders
    ///
    /// Rows come back in the order the statement produces them.
    pub async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>, StorageError> {
        let sql = self.prepare(sql, params)?;
        tracing::debug!(backend = %self.kind(), params = params.len(), "query");
        self.backend.query(&sql, params).await
    }

    /// Insert one log record
    pub async fn record(&self, record: &NewLogRecord) -> Result<MutateOutcome, StorageError> {
        self.mutate(INSERT_LOG_SQL, &record.params()).await
    }

    /// Every stored record, newest first
    pub async fn list(&self) -> Result<Vec<LogRecord>, StorageError> {
        self.query(SELECT_LOGS_SQL, &[])
            .await?
            .into_iter()
            .map(|row| LogRecord::from_row(row).map_err(|error| StorageError::Decode(error.to_string())))
            .collect()
    }

    /// Number of stored records
    pub async fn count(&self) -> Result<u64, StorageError> {
        let rows = self.query(COUNT_LOGS_SQL, &[]).await?;
        rows.first()
            .and_then(|row| row.get("count"))
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| StorageError::Decode("missing count column".to_string()))
    }

    /// Drain and close the backend's connections
    ///
    /// Later calls fail with [`StorageError::Unavailable`].
    pub async fn close(&self) {
        self.ready.store(false, Ordering::Release);
        self.backend.close().await;
        tracing::info!("{} backend closed", self.kind());
    }

    fn prepare<'a>(&self, sql: &'a str, params: &[SqlValue]) -> Result<std::borrow::Cow<'a, str>, StorageError> {
        if !self.is_ready() {
            return Err(StorageError::Unavailable(format!(
                "{} table is not ready",
                schema::LOGS_TABLE
            )));
        }

        let expected = placeholder_count(sql);
        if expected != params.len() {
            return Err(StorageError::InvalidQuery(format!(
                "statement has {} placeholders but {} parameters were given",
                expected,
                params.len()
            )));
        }

        Ok(translate(sql, self.kind()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Backend double that records what it receives
    struct RecordingBackend {
        kind: BackendKind,
        fail_schema: bool,
        statements: Mutex<Vec<(String, Vec<SqlValue>)>>,
        rows: Vec<Row>,
    }

    impl RecordingBackend {
        fn new(kind: BackendKind) -> Self {
            Self {
                kind,
                fail_schema: false,
                statements: Mutex::new(Vec::new()),
                rows: Vec::new(),
            }
        }

        fn statements(&self) -> Vec<(String, Vec<SqlValue>)> {
            self.statements.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DatabaseBackend for RecordingBackend {
        fn kind(&self) -> BackendKind {
            self.kind
        }

        async fn mutate(&self, sql: &str, params: &[SqlValue]) -> Result<MutateOutcome, StorageError> {
            if self.fail_schema && sql.contains("CREATE TABLE") {
                return Err(StorageError::Connection("connection refused".to_string()));
            }
            self.statements
                .lock()
                .unwrap()
                .push((sql.to_string(), params.to_vec()));
            Ok(MutateOutcome { rows_affected: 1 })
        }

        async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>, StorageError> {
            self.statements
                .lock()
                .unwrap()
                .push((sql.to_string(), params.to_vec()));
            Ok(self.rows.clone())
        }

        async fn close(&self) {}
    }

    fn sample_record() -> NewLogRecord {
        NewLogRecord {
            email: "a@x.com".to_string(),
            password: "pw1".to_string(),
            ip_address: Some("1.2.3.4".to_string()),
            timestamp: "2024-01-01T00:00:00Z".to_string(),
        }
    }

    #[tokio::test]
    async fn test_calls_before_bootstrap_are_unavailable() {
        let backend = Arc::new(RecordingBackend::new(BackendKind::Embedded));
        let store = Store::from_backend(backend.clone());

        let error = store.record(&sample_record()).await.unwrap_err();
        assert!(matches!(error, StorageError::Unavailable(_)));
        let error = store.query(SELECT_LOGS_SQL, &[]).await.unwrap_err();
        assert!(matches!(error, StorageError::Unavailable(_)));
        assert!(backend.statements().is_empty());
    }

    #[tokio::test]
    async fn test_networked_statements_are_translated() {
        let backend = Arc::new(RecordingBackend::new(BackendKind::Networked));
        let store = Store::from_backend(backend.clone());
        store.ensure_schema().await.unwrap();

        let outcome = store.record(&sample_record()).await.unwrap();
        assert_eq!(outcome.rows_affected, 1);

        let statements = backend.statements();
        assert!(statements[0].0.contains("BIGSERIAL"));
        assert_eq!(
            statements[1].0,
            "INSERT INTO logs (email, password, ip_address, timestamp) VALUES ($1, $2, $3, $4)"
        );
        assert_eq!(statements[1].1, sample_record().params().to_vec());
    }

    #[tokio::test]
    async fn test_embedded_statements_pass_through() {
        let backend = Arc::new(RecordingBackend::new(BackendKind::Embedded));
        let store = Store::from_backend(backend.clone());
        store.ensure_schema().await.unwrap();

        store.record(&sample_record()).await.unwrap();

        let statements = backend.statements();
        assert!(statements[0].0.contains("AUTOINCREMENT"));
        assert_eq!(statements[1].0, INSERT_LOG_SQL);
    }

    #[tokio::test]
    async fn test_parameter_count_mismatch_is_rejected() {
        let backend = Arc::new(RecordingBackend::new(BackendKind::Networked));
        let store = Store::from_backend(backend.clone());
        store.ensure_schema().await.unwrap();

        let error = store
            .mutate(INSERT_LOG_SQL, &["only-one".into()])
            .await
            .unwrap_err();
        assert!(matches!(error, StorageError::InvalidQuery(_)), "{error:?}");
        assert_eq!(backend.statements().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_bootstrap_keeps_store_unavailable() {
        let mut backend = RecordingBackend::new(BackendKind::Networked);
        backend.fail_schema = true;
        let store = Store::from_backend(Arc::new(backend));

        let error = store.ensure_schema().await.unwrap_err();
        assert_eq!(error.kind, BackendKind::Networked);
        assert!(matches!(error.source, StorageError::Connection(_)));
        assert!(!store.is_ready());
        assert!(matches!(store.list().await, Err(StorageError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_list_decodes_rows() {
        let mut backend = RecordingBackend::new(BackendKind::Embedded);
        let serde_json::Value::Object(row) = serde_json::json!({
            "id": 1,
            "email": "a@x.com",
            "password": "pw1",
            "ip_address": "1.2.3.4",
            "timestamp": "2024-01-01T00:00:00Z",
        }) else {
            panic!("expected an object");
        };
        backend.rows = vec![row];
        let store = Store::from_backend(Arc::new(backend));
        store.ensure_schema().await.unwrap();

        let records = store.list().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].email, "a@x.com");
        assert_eq!(records[0].ip_address.as_deref(), Some("1.2.3.4"));
    }

    #[tokio::test]
    async fn test_list_reports_undecodable_rows() {
        let mut backend = RecordingBackend::new(BackendKind::Embedded);
        let mut row = Row::new();
        row.insert("id".to_string(), serde_json::Value::from("not a number"));
        backend.rows = vec![row];
        let store = Store::from_backend(Arc::new(backend));
        store.ensure_schema().await.unwrap();

        assert!(matches!(store.list().await, Err(StorageError::Decode(_))));
        assert!(matches!(store.count().await, Err(StorageError::Decode(_))));
    }

    #[tokio::test]
    async fn test_close_makes_store_unavailable() {
        let store = Store::from_backend(Arc::new(RecordingBackend::new(BackendKind::Embedded)));
        store.ensure_schema().await.unwrap();
        assert!(store.is_ready());

        store.close().await;
        assert!(matches!(store.count().await, Err(StorageError::Unavailable(_))));
    }
}
