//! libSQL resume store for batch enrichment runs.
//!
//! The [`Store`] wraps a local libSQL database holding one terminal outcome
//! per company URL: a successful run's full result JSON, or the error that
//! ended it. Batch runs consult the store before launching a company and
//! skip URLs that already have an outcome.
//!
//! Writes retry on transient lock contention (several batch tasks may land
//! on the write path at once) with a doubling backoff before giving up.

mod migrations;

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use libsql::{Connection, Database, Value, params};

use prospector_shared::{EnrichmentResult, ProspectorError, Result};

/// Attempts made for a contended write before giving up.
const WRITE_RETRY_ATTEMPTS: u32 = 5;

/// Backoff before the second attempt; doubles after each busy failure.
const WRITE_RETRY_BASE_DELAY: Duration = Duration::from_millis(50);

/// Terminal status of a stored run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStatus {
    Success,
    Error,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }

    fn parse(s: &str) -> Result<Self> {
        match s {
            "success" => Ok(Self::Success),
            "error" => Ok(Self::Error),
            other => Err(ProspectorError::Storage(format!(
                "unknown record status: {other}"
            ))),
        }
    }
}

/// One stored run outcome, keyed by company URL.
#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub url: String,
    pub status: RecordStatus,
    /// Error text, present iff `status` is [`RecordStatus::Error`].
    pub error_message: Option<String>,
    /// Serialized result, present iff `status` is [`RecordStatus::Success`].
    pub result_json: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl StoredRecord {
    /// Deserialize the stored result, if this record holds one.
    pub fn result(&self) -> Result<Option<EnrichmentResult>> {
        match self.result_json.as_deref() {
            Some(json) => serde_json::from_str(json)
                .map(Some)
                .map_err(|e| ProspectorError::Storage(format!("corrupt stored result: {e}"))),
            None => Ok(None),
        }
    }
}

/// Resume store handle wrapping a libSQL database.
pub struct Store {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

impl Store {
    /// Open or create a database at `path` and apply pending migrations.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ProspectorError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| ProspectorError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| ProspectorError::Storage(e.to_string()))?;

        let store = Self { db, conn };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    ProspectorError::Storage(format!(
                        "migration v{} failed: {e}",
                        migration.version
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    // -----------------------------------------------------------------------
    // Record writes
    // -----------------------------------------------------------------------

    /// Record a successful run for `url`, replacing any previous outcome.
    pub async fn record_success(&self, url: &str, result: &EnrichmentResult) -> Result<()> {
        let result_json = serde_json::to_string(result)
            .map_err(|e| ProspectorError::Storage(format!("serialize result: {e}")))?;
        self.upsert_record(url, RecordStatus::Success, None, Some(result_json))
            .await
    }

    /// Record a failed run for `url`, replacing any previous outcome.
    pub async fn record_failure(&self, url: &str, error_message: &str) -> Result<()> {
        self.upsert_record(
            url,
            RecordStatus::Error,
            Some(error_message.to_string()),
            None,
        )
        .await
    }

    async fn upsert_record(
        &self,
        url: &str,
        status: RecordStatus,
        error_message: Option<String>,
        result_json: Option<String>,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.execute_write(
            "INSERT INTO enrichment_records (url, status, error_message, result_json, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(url) DO UPDATE SET
               status = excluded.status,
               error_message = excluded.error_message,
               result_json = excluded.result_json,
               created_at = excluded.created_at",
            vec![
                Value::from(url.to_string()),
                Value::from(status.as_str().to_string()),
                error_message.map_or(Value::Null, Value::from),
                result_json.map_or(Value::Null, Value::from),
                Value::from(now),
            ],
        )
        .await?;
        Ok(())
    }

    /// Delete the record for `url`. Returns whether a record existed.
    pub async fn delete(&self, url: &str) -> Result<bool> {
        let affected = self
            .execute_write(
                "DELETE FROM enrichment_records WHERE url = ?1",
                vec![Value::from(url.to_string())],
            )
            .await?;
        Ok(affected > 0)
    }

    /// Delete all records. Returns the number removed.
    pub async fn clear(&self) -> Result<u64> {
        self.execute_write("DELETE FROM enrichment_records", vec![])
            .await
    }

    /// Execute a write statement, retrying on lock contention with a
    /// doubling backoff. Non-busy errors fail immediately.
    async fn execute_write(&self, sql: &str, args: Vec<Value>) -> Result<u64> {
        let mut delay = WRITE_RETRY_BASE_DELAY;
        for attempt in 1..WRITE_RETRY_ATTEMPTS {
            match self.conn.execute(sql, args.clone()).await {
                Ok(affected) => return Ok(affected),
                Err(e) if is_busy_error(&e) => {
                    tracing::debug!(attempt, error = %e, "store busy, retrying write");
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(e) => return Err(ProspectorError::Storage(e.to_string())),
            }
        }
        match self.conn.execute(sql, args).await {
            Ok(affected) => Ok(affected),
            Err(e) if is_busy_error(&e) => Err(ProspectorError::StoreBusy(format!(
                "write still contended after {WRITE_RETRY_ATTEMPTS} attempts: {e}"
            ))),
            Err(e) => Err(ProspectorError::Storage(e.to_string())),
        }
    }

    // -----------------------------------------------------------------------
    // Record reads
    // -----------------------------------------------------------------------

    /// Get the stored outcome for `url`, if any.
    pub async fn get(&self, url: &str) -> Result<Option<StoredRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT url, status, error_message, result_json, created_at
                 FROM enrichment_records WHERE url = ?1",
                params![url],
            )
            .await
            .map_err(|e| ProspectorError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_record(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(ProspectorError::Storage(e.to_string())),
        }
    }

    /// List all stored outcomes, oldest first.
    pub async fn list(&self) -> Result<Vec<StoredRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT url, status, error_message, result_json, created_at
                 FROM enrichment_records ORDER BY created_at, url",
                params![],
            )
            .await
            .map_err(|e| ProspectorError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_record(&row)?);
        }
        Ok(results)
    }

    /// Count stored outcomes.
    pub async fn count(&self) -> Result<u64> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM enrichment_records", params![])
            .await
            .map_err(|e| ProspectorError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => row
                .get::<u64>(0)
                .map_err(|e| ProspectorError::Storage(e.to_string())),
            Ok(None) => Ok(0),
            Err(e) => Err(ProspectorError::Storage(e.to_string())),
        }
    }
}

/// Whether a libSQL error is transient lock contention worth retrying.
fn is_busy_error(e: &libsql::Error) -> bool {
    let text = e.to_string().to_ascii_lowercase();
    text.contains("busy") || text.contains("locked")
}

/// Convert a database row to a [`StoredRecord`].
fn row_to_record(row: &libsql::Row) -> Result<StoredRecord> {
    let status_text: String = row
        .get(1)
        .map_err(|e| ProspectorError::Storage(e.to_string()))?;
    Ok(StoredRecord {
        url: row
            .get::<String>(0)
            .map_err(|e| ProspectorError::Storage(e.to_string()))?,
        status: RecordStatus::parse(&status_text)?,
        error_message: row.get::<String>(2).ok(),
        result_json: row.get::<String>(3).ok(),
        created_at: {
            let s: String = row
                .get(4)
                .map_err(|e| ProspectorError::Storage(e.to_string()))?;
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| ProspectorError::Storage(format!("invalid date: {e}")))?
        },
    })
}
