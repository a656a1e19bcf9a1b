// crates/db/src/recorder.rs
//! Incremental transcript recorder.
//!
//! `record_session` reconciles a parsed transcript against what is already
//! persisted for the session, keyed on each turn's content hash. Re-parsing
//! the whole append-only file on every call is cheap relative to the
//! correctness it buys: the same file recorded twice records nothing the
//! second time, and one appended turn records exactly one new row.

use crate::jobs::EnqueueOptions;
use crate::{Database, DbResult};
use recap_core::error::ParseError;
use recap_core::parser::parse_transcript;
use serde_json::json;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, warn};

/// Counters from one recording pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordStats {
    pub session_id: String,
    pub turns_recorded: usize,
    pub turns_skipped: usize,
}

/// Result of `record_session`. A missing transcript is an outcome, not an
/// error: the file may be gone by the time the job runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    Recorded(RecordStats),
    FileNotFound,
}

impl Database {
    /// Record every not-yet-persisted turn of a transcript.
    pub async fn record_session(
        &self,
        session_id: &str,
        transcript_path: &str,
        workspace_path: &str,
    ) -> DbResult<RecordOutcome> {
        let path = Path::new(transcript_path);
        let turns = match parse_transcript(path).await {
            Ok(turns) => turns,
            Err(ParseError::NotFound { .. }) => {
                warn!(session_id, transcript_path, "transcript file not found");
                return Ok(RecordOutcome::FileNotFound);
            }
            Err(e) => return Err(e.into()),
        };

        // Fetch-or-create the session. A fresh session's known-hash set is
        // constructed empty; only an existing session's hashes come from a
        // query, keyed on its row id.
        let first_started = turns
            .first()
            .and_then(|t| t.started_at)
            .map(|t| t.timestamp_millis());
        let (session, existing_hashes): (_, HashSet<String>) =
            match self.get_agent_session(session_id).await? {
                Some(session) => {
                    let hashes = self.existing_turn_hashes(&session.id).await?;
                    (session, hashes)
                }
                None => {
                    let session = self
                        .create_agent_session(
                            session_id,
                            transcript_path,
                            workspace_path,
                            first_started,
                        )
                        .await?;
                    (session, HashSet::new())
                }
            };

        let mut recorded = 0usize;
        let mut skipped = 0usize;
        for turn in &turns {
            if existing_hashes.contains(&turn.content_hash) {
                skipped += 1;
                continue;
            }
            self.insert_turn(&session.id, turn).await?;
            recorded += 1;
        }

        let last_activity = turns
            .iter()
            .rev()
            .find_map(|t| t.ended_at.or(t.started_at))
            .map(|t| t.timestamp_millis());
        self.finish_recording(
            &session.id,
            (existing_hashes.len() + recorded) as i64,
            last_activity,
            workspace_path,
        )
        .await?;

        info!(session_id, recorded, skipped, "session recorded");
        Ok(RecordOutcome::Recorded(RecordStats {
            session_id: session_id.to_string(),
            turns_recorded: recorded,
            turns_skipped: skipped,
        }))
    }

    /// Producer side of the pipeline, called from the per-turn hook.
    ///
    /// The dedupe key is `(session, current file size)`: cheap, monotonic
    /// with file growth, and it spares a full parse just to decide whether
    /// new content exists. Returns whether a job was actually created;
    /// every failure is swallowed: the hook must never throw at its host.
    pub async fn enqueue_recording(
        &self,
        session_id: &str,
        transcript_path: &str,
        workspace_path: &str,
    ) -> bool {
        let file_size = std::fs::metadata(transcript_path)
            .map(|m| m.len())
            .unwrap_or(0);
        let dedupe_key = format!("session_process:{session_id}:{file_size}");
        let payload = json!({
            "session_id": session_id,
            "transcript_path": transcript_path,
            "workspace_path": workspace_path,
        });

        match self
            .enqueue_job(
                "session_process",
                &payload,
                EnqueueOptions {
                    dedupe_key: Some(dedupe_key),
                    ..Default::default()
                },
            )
            .await
        {
            Ok(Some(_)) => true,
            Ok(None) => {
                debug!(session_id, "recording already enqueued for this file size");
                false
            }
            Err(e) => {
                warn!(session_id, error = %e, "failed to enqueue session recording");
                false
            }
        }
    }
}
