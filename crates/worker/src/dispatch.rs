// crates/worker/src/dispatch.rs
//! The polling dispatch loop: expire stale leases, claim, route by kind,
//! convert handler errors into queue failures, repeat.

use crate::summarize::Summarizer;
use recap_db::jobs::Job;
use recap_db::{Database, DbError, DbResult};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum WorkerError {
    /// An unroutable kind means deploy/version skew. It is NOT swallowed:
    /// the job fails loudly through retry→failed and stays visible in
    /// `stats()` instead of silently dropping work.
    #[error("Unknown job kind: {0}")]
    UnknownKind(String),

    #[error("Invalid payload for {kind} job: {source}")]
    Payload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Db(#[from] DbError),
}

/// One worker over a shared job table. Any number of these may run
/// concurrently in separate processes; all coordination goes through the
/// table's claim/lease semantics.
pub struct Worker {
    db: Database,
    summarizer: Arc<dyn Summarizer>,
}

impl Worker {
    pub fn new(db: Database, summarizer: Arc<dyn Summarizer>) -> Self {
        Self { db, summarizer }
    }

    pub(crate) fn db(&self) -> &Database {
        &self.db
    }

    pub(crate) fn summarizer(&self) -> &dyn Summarizer {
        self.summarizer.as_ref()
    }

    /// Route a claimed job to its handler.
    pub async fn dispatch_job(&self, job: &Job) -> Result<(), WorkerError> {
        match job.kind.as_str() {
            "session_process" => self.process_session_job(job).await,
            "turn_summary" => self.process_turn_summary_job(job).await,
            "entity_extract" => self.process_entity_extract_job(job).await,
            other => Err(WorkerError::UnknownKind(other.to_string())),
        }
    }

    /// One poll cycle: recover stale leases once, then claim and process up
    /// to `max_jobs` jobs. A handler failure fails that job and the loop
    /// moves on; one bad job never halts the cycle. Returns the number of
    /// jobs actually processed (successes and failures both), for
    /// caller-side observability.
    pub async fn process_pending_jobs(&self, max_jobs: usize) -> DbResult<usize> {
        let expired = self.db.expire_stale_leases().await?;
        if expired > 0 {
            info!(expired, "recovered stale job leases");
        }

        let mut processed = 0usize;
        while processed < max_jobs {
            let Some(job) = self.db.claim_job(None).await? else {
                break;
            };
            match self.dispatch_job(&job).await {
                Ok(()) => {
                    self.db.complete_job(&job.id).await?;
                }
                Err(e) => {
                    warn!(job_id = %job.id, kind = %job.kind, error = %e, "job failed");
                    self.db.fail_job(&job.id, &e.to_string()).await?;
                }
            }
            processed += 1;
        }
        Ok(processed)
    }
}
