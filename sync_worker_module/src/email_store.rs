use std::time::Duration;

use postgres_native_tls::MakeTlsConnector;
use r2d2::{Pool, PooledConnection};
use r2d2_postgres::PostgresConnectionManager;
use tracing::{error, warn};

use mail_fetch_module::{EmailRecord, FetchError};

/// Logs the underlying connection error instead of r2d2's silent default.
#[derive(Debug)]
struct LoggingErrorHandler;

impl r2d2::HandleError<postgres::Error> for LoggingErrorHandler {
    fn handle_error(&self, err: postgres::Error) {
        error!("postgres connection pool error: {:?}", err);
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("postgres error: {0}")]
    Postgres(#[from] postgres::Error),
    #[error("pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("storage config error: {0}")]
    Config(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveFailure {
    pub record_id: String,
    pub reason: String,
}

/// Aggregate result of one sync job, consumed by the consumer loop to log
/// and acknowledge. `fetch_error` is how a failure that prevented the fetch
/// from starting surfaces without the orchestrator ever panicking.
#[derive(Debug, Default)]
pub struct SyncOutcome {
    pub attempted: usize,
    pub succeeded: usize,
    pub failures: Vec<SaveFailure>,
    pub fetch_error: Option<FetchError>,
}

impl SyncOutcome {
    pub fn fetch_failed(err: FetchError) -> Self {
        Self {
            fetch_error: Some(err),
            ..Self::default()
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.fetch_error.is_none()
    }
}

/// Persistence gateway. Each save is its own transaction; the provided
/// `save_all` is fail-soft, continuing past individual record failures.
pub trait EmailStore: Send + Sync {
    fn save(&self, remote_id: &str, record: &EmailRecord) -> Result<(), StoreError>;

    fn save_all(&self, records: &[(String, EmailRecord)]) -> SyncOutcome {
        let mut outcome = SyncOutcome {
            attempted: records.len(),
            ..SyncOutcome::default()
        };
        for (remote_id, record) in records {
            match self.save(remote_id, record) {
                Ok(()) => outcome.succeeded += 1,
                Err(err) => {
                    warn!("failed to save email {}: {}", remote_id, err);
                    outcome.failures.push(SaveFailure {
                        record_id: remote_id.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }
        outcome
    }
}

pub struct PostgresEmailStore {
    pool: Pool<PostgresConnectionManager<MakeTlsConnector>>,
}

impl PostgresEmailStore {
    pub fn new(db_url: &str, allow_invalid_certs: bool) -> Result<Self, StoreError> {
        let config: postgres::Config = db_url.parse().map_err(StoreError::Postgres)?;
        let mut tls_builder = native_tls::TlsConnector::builder();
        if allow_invalid_certs {
            tls_builder.danger_accept_invalid_certs(true);
            tls_builder.danger_accept_invalid_hostnames(true);
        }
        let tls_connector = tls_builder
            .build()
            .map_err(|err| StoreError::Config(err.to_string()))?;
        let tls = MakeTlsConnector::new(tls_connector);

        let manager = PostgresConnectionManager::new(config, tls);
        let pool = Pool::builder()
            .max_size(2)
            .idle_timeout(Some(Duration::from_secs(300)))
            .error_handler(Box::new(LoggingErrorHandler))
            .build(manager)?;
        let store = Self { pool };
        store.ensure_schema()?;
        Ok(store)
    }

    fn connection(
        &self,
    ) -> Result<PooledConnection<PostgresConnectionManager<MakeTlsConnector>>, StoreError> {
        Ok(self.pool.get()?)
    }

    fn ensure_schema(&self) -> Result<(), StoreError> {
        let mut conn = self.connection()?;
        conn.batch_execute(
            "CREATE TABLE IF NOT EXISTS emails (
                id BIGSERIAL PRIMARY KEY,
                sender TEXT NOT NULL,
                subject TEXT NOT NULL DEFAULT 'No Subject',
                body_snippet TEXT,
                status TEXT NOT NULL,
                days_ago INTEGER,
                received_at TIMESTAMPTZ NOT NULL DEFAULT now()
            );",
        )?;
        Ok(())
    }
}

impl EmailStore for PostgresEmailStore {
    // The remote id is only a failure-report identifier: no dedup key ties a
    // remote message to a stored row, so redelivery inserts duplicates.
    fn save(&self, _remote_id: &str, record: &EmailRecord) -> Result<(), StoreError> {
        let mut conn = self.connection()?;
        let mut tx = conn.transaction()?;
        let status = record.status.as_str();
        let days_ago = days_ago_column(record.days_ago);
        tx.execute(
            "INSERT INTO emails (sender, subject, body_snippet, status, days_ago, received_at)
             VALUES ($1, $2, $3, $4, $5, COALESCE($6, now()))",
            &[
                &record.sender,
                &record.subject,
                &record.body_snippet,
                &status,
                &days_ago,
                &record.received_at,
            ],
        )?;
        tx.commit()?;
        Ok(())
    }
}

/// The column is INTEGER; an age outside i32 range comes from a nonsense
/// Date header and is stored as absent rather than wrapped.
fn days_ago_column(days_ago: Option<i64>) -> Option<i32> {
    days_ago.and_then(|days| i32::try_from(days).ok())
}
