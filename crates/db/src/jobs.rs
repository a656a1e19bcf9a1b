// crates/db/src/jobs.rs
//! Durable job queue: atomic enqueue/claim/lease/retry over the `jobs` table.
//!
//! Exactly one writer owns a job at a time via its lease (`locked_until`).
//! SQLite serializes writers, so every state transition here is a single
//! UPDATE statement; there is no check-then-act window for two claimers to
//! race through.

use crate::{now_ms, Database, DbResult};
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

/// How long a claim holds a job before the lease is considered stale.
pub const JOB_LEASE_MS: i64 = 10 * 60 * 1000;

/// Lower is more urgent.
pub const DEFAULT_PRIORITY: i64 = 10;

pub const DEFAULT_MAX_ATTEMPTS: i64 = 10;

/// Job lifecycle states. `Done` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Queued,
    Processing,
    Retry,
    Done,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Retry => "retry",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }
}

/// One row of the `jobs` table. `payload` is an opaque JSON blob the store
/// never interprets; handlers deserialize it per kind.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub kind: String,
    pub dedupe_key: Option<String>,
    pub payload: String,
    pub status: String,
    pub priority: i64,
    pub attempts: i64,
    pub max_attempts: i64,
    pub locked_until: Option<i64>,
    pub error_message: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl<'r> sqlx::FromRow<'r, sqlx::sqlite::SqliteRow> for Job {
    fn from_row(row: &'r sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(Self {
            id: row.try_get("id")?,
            kind: row.try_get("kind")?,
            dedupe_key: row.try_get("dedupe_key")?,
            payload: row.try_get("payload")?,
            status: row.try_get("status")?,
            priority: row.try_get("priority")?,
            attempts: row.try_get("attempts")?,
            max_attempts: row.try_get("max_attempts")?,
            locked_until: row.try_get("locked_until")?,
            error_message: row.try_get("error_message")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl Job {
    pub fn payload_json(&self) -> Value {
        serde_json::from_str(&self.payload).unwrap_or(Value::Null)
    }
}

/// Caller-tunable enqueue knobs; defaults match the table defaults.
#[derive(Debug, Clone)]
pub struct EnqueueOptions {
    pub priority: i64,
    pub max_attempts: i64,
    pub dedupe_key: Option<String>,
}

impl Default for EnqueueOptions {
    fn default() -> Self {
        Self {
            priority: DEFAULT_PRIORITY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            dedupe_key: None,
        }
    }
}

const JOB_COLUMNS: &str = "id, kind, dedupe_key, payload, status, priority, attempts, \
     max_attempts, locked_until, error_message, created_at, updated_at";

impl Database {
    /// Insert a new queued job.
    ///
    /// With a `dedupe_key`, the insert is protected by the partial unique
    /// index over non-terminal jobs: a concurrent duplicate is dropped by
    /// the database itself, not by a racy pre-check. Returns `None` when
    /// the key already had a live job.
    pub async fn enqueue_job(
        &self,
        kind: &str,
        payload: &Value,
        opts: EnqueueOptions,
    ) -> DbResult<Option<Job>> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = now_ms();
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO jobs
                (id, kind, dedupe_key, payload, status, priority, attempts,
                 max_attempts, locked_until, error_message, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, 'queued', ?5, 0, ?6, NULL, NULL, ?7, ?7)
            "#,
        )
        .bind(&id)
        .bind(kind)
        .bind(&opts.dedupe_key)
        .bind(payload.to_string())
        .bind(opts.priority)
        .bind(opts.max_attempts)
        .bind(now)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            debug!(kind, dedupe_key = ?opts.dedupe_key, "duplicate job suppressed");
            return Ok(None);
        }
        self.get_job(&id).await
    }

    /// Atomically claim the best queued/retry job: priority ascending, then
    /// FIFO within a priority tier. Moves it to `processing`, sets the
    /// lease, and bumps `attempts`, all in one statement, so no two
    /// claimers can ever receive the same row.
    pub async fn claim_job(&self, kinds: Option<&[&str]>) -> DbResult<Option<Job>> {
        let kinds_json = match kinds {
            Some(kinds) => Some(serde_json::to_string(kinds).unwrap_or_else(|_| "[]".into())),
            None => None,
        };
        let now = now_ms();

        let sql = format!(
            r#"
            UPDATE jobs
            SET status = 'processing', locked_until = ?1, attempts = attempts + 1, updated_at = ?2
            WHERE id = (
                SELECT id FROM jobs
                WHERE status IN ('queued', 'retry')
                  AND (?3 IS NULL OR kind IN (SELECT value FROM json_each(?3)))
                ORDER BY priority ASC, created_at ASC, rowid ASC
                LIMIT 1
            )
            RETURNING {JOB_COLUMNS}
            "#
        );
        let job = sqlx::query_as::<_, Job>(&sql)
            .bind(now + JOB_LEASE_MS)
            .bind(now)
            .bind(kinds_json)
            .fetch_optional(self.pool())
            .await?;
        Ok(job)
    }

    /// Mark a job done. Idempotent; a second call is a harmless update.
    pub async fn complete_job(&self, id: &str) -> DbResult<()> {
        sqlx::query("UPDATE jobs SET status = 'done', locked_until = NULL, updated_at = ?1 WHERE id = ?2")
            .bind(now_ms())
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Record a failure: back to `retry` while attempts remain, terminal
    /// `failed` once they're exhausted. Always records the error message.
    /// No-op when the job no longer exists.
    pub async fn fail_job(&self, id: &str, error_message: &str) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = CASE WHEN attempts < max_attempts THEN 'retry' ELSE 'failed' END,
                error_message = ?1,
                locked_until = NULL,
                updated_at = ?2
            WHERE id = ?3
            "#,
        )
        .bind(error_message)
        .bind(now_ms())
        .bind(id)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Crash recovery: move every `processing` job whose lease has passed
    /// back to `retry`. Runs before every claim cycle. Returns how many
    /// jobs were recovered.
    pub async fn expire_stale_leases(&self) -> DbResult<u64> {
        let now = now_ms();
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'retry', locked_until = NULL, updated_at = ?1
            WHERE status = 'processing' AND locked_until IS NOT NULL AND locked_until < ?1
            "#,
        )
        .bind(now)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected())
    }

    /// Queue depth by status.
    pub async fn job_stats(&self) -> DbResult<HashMap<String, i64>> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM jobs GROUP BY status")
                .fetch_all(self.pool())
                .await?;
        Ok(rows.into_iter().collect())
    }

    pub async fn get_job(&self, id: &str) -> DbResult<Option<Job>> {
        let sql = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1");
        let job = sqlx::query_as::<_, Job>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_strings() {
        assert_eq!(JobStatus::Queued.as_str(), "queued");
        assert_eq!(JobStatus::Processing.as_str(), "processing");
        assert!(JobStatus::Done.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Retry.is_terminal());
    }

    #[test]
    fn test_payload_json_tolerates_garbage() {
        let job = Job {
            id: "j".into(),
            kind: "k".into(),
            dedupe_key: None,
            payload: "not json".into(),
            status: "queued".into(),
            priority: 10,
            attempts: 0,
            max_attempts: 10,
            locked_until: None,
            error_message: None,
            created_at: 0,
            updated_at: 0,
        };
        assert_eq!(job.payload_json(), Value::Null);
    }
}
