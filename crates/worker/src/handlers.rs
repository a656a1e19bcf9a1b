// crates/worker/src/handlers.rs
//! Per-kind job handlers.
//!
//! Every handler tolerates re-delivery: lease expiry can hand the same job
//! to another worker after partial side effects, so writes are either
//! idempotent or deduplicated downstream (content hashes, per-turn dedupe
//! keys, existing-entity checks). A referenced row that no longer exists is
//! a silent no-op, not a failure: the row may have been legitimately deleted
//! between enqueue and processing.

use crate::dispatch::{Worker, WorkerError};
use crate::summarize::{truncate_title, TURN_TITLE_MAX};
use recap_core::classifier::word_match;
use recap_db::jobs::{EnqueueOptions, Job};
use recap_db::{AgentSessionRow, DbResult, RecordOutcome};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

/// Fan-out children run below fresh `session_process` work (priority 10):
/// new transcript ingestion always outranks backfill enrichment.
pub const TURN_SUMMARY_PRIORITY: i64 = 20;
pub const ENTITY_EXTRACT_PRIORITY: i64 = 20;

/// Chars of assistant text kept as the cheap turn summary.
const ASSISTANT_SUMMARY_MAX: usize = 200;

const PROJECT_ENTITY_CONFIDENCE: f64 = 0.8;
const PERSON_ENTITY_CONFIDENCE: f64 = 0.7;

#[derive(Debug, Deserialize)]
struct SessionProcessPayload {
    session_id: String,
    transcript_path: String,
    #[serde(default)]
    workspace_path: String,
}

#[derive(Debug, Deserialize)]
struct TurnRefPayload {
    turn_id: String,
}

fn parse_payload<'a, T: Deserialize<'a>>(job: &'a Job) -> Result<T, WorkerError> {
    serde_json::from_str(&job.payload).map_err(|source| WorkerError::Payload {
        kind: job.kind.clone(),
        source,
    })
}

impl Worker {
    /// `session_process`: reconcile the transcript, link the session to a
    /// project when the workspace path gives one away, then fan out one
    /// `turn_summary` and one `entity_extract` job per recorded turn.
    ///
    /// Fan-out happens before this handler returns success, and each child
    /// is dedupe-keyed by turn id, so a crash-and-retry redoes both steps
    /// without duplicating children.
    pub(crate) async fn process_session_job(&self, job: &Job) -> Result<(), WorkerError> {
        let payload: SessionProcessPayload = parse_payload(job)?;

        let outcome = self
            .db()
            .record_session(
                &payload.session_id,
                &payload.transcript_path,
                &payload.workspace_path,
            )
            .await?;
        let stats = match outcome {
            RecordOutcome::FileNotFound => {
                warn!(
                    session_id = %payload.session_id,
                    transcript_path = %payload.transcript_path,
                    "transcript gone; nothing to record"
                );
                return Ok(());
            }
            RecordOutcome::Recorded(stats) => stats,
        };

        let Some(session) = self.db().get_agent_session(&payload.session_id).await? else {
            return Ok(());
        };

        if session.project_id.is_none() {
            self.link_session_to_project(&session).await?;
        }

        for turn_id in self.db().list_turn_ids(&session.id).await? {
            self.db()
                .enqueue_job(
                    "turn_summary",
                    &json!({"turn_id": turn_id}),
                    EnqueueOptions {
                        priority: TURN_SUMMARY_PRIORITY,
                        dedupe_key: Some(format!("turn_summary:{turn_id}")),
                        ..Default::default()
                    },
                )
                .await?;
            self.db()
                .enqueue_job(
                    "entity_extract",
                    &json!({"turn_id": turn_id}),
                    EnqueueOptions {
                        priority: ENTITY_EXTRACT_PRIORITY,
                        dedupe_key: Some(format!("entity_extract:{turn_id}")),
                        ..Default::default()
                    },
                )
                .await?;
        }

        self.db().mark_session_processed(&session.id).await?;
        info!(
            session_id = %payload.session_id,
            recorded = stats.turns_recorded,
            skipped = stats.turns_skipped,
            "session processed"
        );
        Ok(())
    }

    /// Best-effort: match the workspace path's tail against known project
    /// slugs/names. Handles both plain paths (`/home/u/focus`) and the
    /// dash-encoded form transcript directories use (`-home-u-focus`).
    pub(crate) async fn link_session_to_project(
        &self,
        session: &AgentSessionRow,
    ) -> DbResult<()> {
        let Some(workspace) = session.workspace_path.as_deref().filter(|w| !w.is_empty())
        else {
            return Ok(());
        };
        let workspace = workspace.to_lowercase();
        let tail = workspace.rsplit('/').next().unwrap_or(&workspace);

        for project in self.db().list_project_refs().await? {
            let slug = project.slug.to_lowercase();
            let name = project.name.to_lowercase();
            if tail == slug || tail == name || tail.ends_with(&format!("-{slug}")) {
                debug!(session_id = %session.session_id, slug = %project.slug, "linked session to project");
                self.db()
                    .link_session_project(&session.id, &project.id)
                    .await?;
                break;
            }
        }
        Ok(())
    }

    /// `turn_summary`: fill `turn_title` and `assistant_summary` for one
    /// turn. Short user messages are the title verbatim (cheap path, no
    /// external call); long ones go through the collaborator with a
    /// truncation fallback. Missing turn → no-op; titled turn → no-op.
    pub(crate) async fn process_turn_summary_job(&self, job: &Job) -> Result<(), WorkerError> {
        let payload: TurnRefPayload = parse_payload(job)?;

        let Some(turn) = self.db().get_turn(&payload.turn_id).await? else {
            debug!(turn_id = %payload.turn_id, "turn gone; skipping summary");
            return Ok(());
        };
        if turn.turn_title.is_some() {
            return Ok(());
        }

        let user_message = turn.user_message.unwrap_or_default();
        let user_message = user_message.trim();

        let title = if user_message.is_empty() {
            None
        } else if user_message.chars().count() <= TURN_TITLE_MAX {
            Some(user_message.to_string())
        } else {
            match self.summarizer().summarize(user_message).await {
                Ok(title) => Some(truncate_title(&title, TURN_TITLE_MAX)),
                Err(e) => {
                    debug!(turn_id = %payload.turn_id, error = %e,
                           "summarizer unavailable; truncating");
                    Some(truncate_title(user_message, TURN_TITLE_MAX))
                }
            }
        };

        let assistant_summary = self
            .db()
            .get_turn_content(&payload.turn_id)
            .await?
            .and_then(|c| c.assistant_text)
            .map(|text| truncate_title(&text, ASSISTANT_SUMMARY_MAX))
            .filter(|s| !s.is_empty());

        if title.is_none() && assistant_summary.is_none() {
            return Ok(());
        }
        self.db()
            .set_turn_summary(
                &payload.turn_id,
                title.as_deref(),
                assistant_summary.as_deref(),
            )
            .await?;
        Ok(())
    }

    /// `entity_extract`: whole-word scan of the turn's text for known
    /// project slugs/names and person names; inserts entity rows, skipping
    /// pairs already recorded for the turn. Missing turn → no-op.
    pub(crate) async fn process_entity_extract_job(&self, job: &Job) -> Result<(), WorkerError> {
        let payload: TurnRefPayload = parse_payload(job)?;

        let Some(turn) = self.db().get_turn(&payload.turn_id).await? else {
            debug!(turn_id = %payload.turn_id, "turn gone; skipping extraction");
            return Ok(());
        };

        let mut text = turn.user_message.unwrap_or_default();
        if let Some(assistant) = self
            .db()
            .get_turn_content(&payload.turn_id)
            .await?
            .and_then(|c| c.assistant_text)
        {
            text.push('\n');
            text.push_str(&assistant);
        }
        let haystack = text.to_lowercase();
        if haystack.trim().is_empty() {
            return Ok(());
        }

        let existing = self.db().turn_entity_names(&payload.turn_id).await?;

        for project in self.db().list_project_refs().await? {
            let hit = word_match(&project.slug.to_lowercase(), &haystack)
                || word_match(&project.name.to_lowercase(), &haystack);
            if !hit || existing.contains(&("project".to_string(), project.slug.clone())) {
                continue;
            }
            self.db()
                .insert_turn_entity(
                    &payload.turn_id,
                    "project",
                    Some(&project.id),
                    &project.slug,
                    PROJECT_ENTITY_CONFIDENCE,
                )
                .await?;
        }

        for person in self.db().list_person_refs().await? {
            if person.name.chars().count() <= 2 {
                continue;
            }
            if !word_match(&person.name.to_lowercase(), &haystack)
                || existing.contains(&("person".to_string(), person.name.clone()))
            {
                continue;
            }
            self.db()
                .insert_turn_entity(
                    &payload.turn_id,
                    "person",
                    Some(&person.id),
                    &person.name,
                    PERSON_ENTITY_CONFIDENCE,
                )
                .await?;
        }

        Ok(())
    }
}
