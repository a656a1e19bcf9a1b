// crates/db/src/queries/sessions.rs
// Session and turn persistence: the surface the recorder and the worker
// handlers write through.

use crate::{now_ms, Database, DbResult};
use recap_core::artifacts::extract_artifacts;
use recap_core::types::ParsedTurn;
use std::collections::HashSet;

#[derive(Debug, Clone)]
pub struct AgentSessionRow {
    pub id: String,
    /// External session identifier (from the hook payload).
    pub session_id: String,
    pub transcript_path: Option<String>,
    pub workspace_path: Option<String>,
    pub session_title: Option<String>,
    pub session_summary: Option<String>,
    pub started_at: Option<i64>,
    pub last_activity_at: Option<i64>,
    pub project_id: Option<String>,
    pub turn_count: i64,
    pub is_processed: bool,
}

impl<'r> sqlx::FromRow<'r, sqlx::sqlite::SqliteRow> for AgentSessionRow {
    fn from_row(row: &'r sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(Self {
            id: row.try_get("id")?,
            session_id: row.try_get("session_id")?,
            transcript_path: row.try_get("transcript_path")?,
            workspace_path: row.try_get("workspace_path")?,
            session_title: row.try_get("session_title")?,
            session_summary: row.try_get("session_summary")?,
            started_at: row.try_get("started_at")?,
            last_activity_at: row.try_get("last_activity_at")?,
            project_id: row.try_get("project_id")?,
            turn_count: row.try_get("turn_count")?,
            is_processed: row.try_get("is_processed")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct AgentTurnRow {
    pub id: String,
    pub session_id: String,
    pub turn_number: i64,
    pub user_message: Option<String>,
    pub assistant_summary: Option<String>,
    pub turn_title: Option<String>,
    pub content_hash: String,
    pub model_name: Option<String>,
    /// JSON array of tool names.
    pub tool_names: String,
    pub started_at: Option<i64>,
    pub ended_at: Option<i64>,
}

impl<'r> sqlx::FromRow<'r, sqlx::sqlite::SqliteRow> for AgentTurnRow {
    fn from_row(row: &'r sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(Self {
            id: row.try_get("id")?,
            session_id: row.try_get("session_id")?,
            turn_number: row.try_get("turn_number")?,
            user_message: row.try_get("user_message")?,
            assistant_summary: row.try_get("assistant_summary")?,
            turn_title: row.try_get("turn_title")?,
            content_hash: row.try_get("content_hash")?,
            model_name: row.try_get("model_name")?,
            tool_names: row.try_get("tool_names")?,
            started_at: row.try_get("started_at")?,
            ended_at: row.try_get("ended_at")?,
        })
    }
}

impl AgentTurnRow {
    pub fn tool_names(&self) -> Vec<String> {
        serde_json::from_str(&self.tool_names).unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct AgentTurnContentRow {
    pub turn_id: String,
    pub raw_jsonl: String,
    pub assistant_text: Option<String>,
    pub content_size: Option<i64>,
    pub files_touched: String,
    pub commands_run: String,
    pub errors_encountered: String,
    pub tool_call_count: Option<i64>,
}

impl<'r> sqlx::FromRow<'r, sqlx::sqlite::SqliteRow> for AgentTurnContentRow {
    fn from_row(row: &'r sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(Self {
            turn_id: row.try_get("turn_id")?,
            raw_jsonl: row.try_get("raw_jsonl")?,
            assistant_text: row.try_get("assistant_text")?,
            content_size: row.try_get("content_size")?,
            files_touched: row.try_get("files_touched")?,
            commands_run: row.try_get("commands_run")?,
            errors_encountered: row.try_get("errors_encountered")?,
            tool_call_count: row.try_get("tool_call_count")?,
        })
    }
}

const SESSION_COLUMNS: &str = "id, session_id, transcript_path, workspace_path, session_title, \
     session_summary, started_at, last_activity_at, project_id, turn_count, is_processed";

const TURN_COLUMNS: &str = "id, session_id, turn_number, user_message, assistant_summary, \
     turn_title, content_hash, model_name, tool_names, started_at, ended_at";

impl Database {
    /// Look up a session by its external id.
    pub async fn get_agent_session(&self, session_id: &str) -> DbResult<Option<AgentSessionRow>> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM agent_sessions WHERE session_id = ?1");
        Ok(sqlx::query_as(&sql)
            .bind(session_id)
            .fetch_optional(self.pool())
            .await?)
    }

    /// Create a session record on first recording.
    pub async fn create_agent_session(
        &self,
        session_id: &str,
        transcript_path: &str,
        workspace_path: &str,
        started_at: Option<i64>,
    ) -> DbResult<AgentSessionRow> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = now_ms();
        sqlx::query(
            r#"
            INSERT INTO agent_sessions
                (id, session_id, transcript_path, workspace_path, started_at,
                 last_activity_at, turn_count, is_processed, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5, 0, 0, ?6, ?6)
            "#,
        )
        .bind(&id)
        .bind(session_id)
        .bind(transcript_path)
        .bind(workspace_path)
        .bind(started_at)
        .bind(now)
        .execute(self.pool())
        .await?;

        let sql = format!("SELECT {SESSION_COLUMNS} FROM agent_sessions WHERE id = ?1");
        Ok(sqlx::query_as(&sql).bind(&id).fetch_one(self.pool()).await?)
    }

    /// Content hashes of every turn already persisted for a session.
    ///
    /// Always an explicit query keyed on the session row id; a freshly
    /// created session starts from an empty set constructed by the caller,
    /// never from traversing an unpersisted relationship.
    pub async fn existing_turn_hashes(&self, session_row_id: &str) -> DbResult<HashSet<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT content_hash FROM agent_turns WHERE session_id = ?1")
                .bind(session_row_id)
                .fetch_all(self.pool())
                .await?;
        Ok(rows.into_iter().map(|(h,)| h).collect())
    }

    /// Persist one parsed turn: the turn row, its 1:1 content row (with
    /// extracted side effects), and its artifact rows, atomically.
    pub async fn insert_turn(
        &self,
        session_row_id: &str,
        turn: &ParsedTurn,
    ) -> DbResult<String> {
        let turn_id = uuid::Uuid::new_v4().to_string();
        let now = now_ms();
        let side_effects = extract_artifacts(&turn.raw_jsonl);

        let mut tx = self.pool().begin().await?;

        sqlx::query(
            r#"
            INSERT INTO agent_turns
                (id, session_id, turn_number, user_message, content_hash,
                 model_name, tool_names, started_at, ended_at, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&turn_id)
        .bind(session_row_id)
        .bind(turn.turn_number as i64)
        .bind(&turn.user_message)
        .bind(&turn.content_hash)
        .bind(&turn.model_name)
        .bind(serde_json::to_string(&turn.tool_names).unwrap_or_else(|_| "[]".into()))
        .bind(turn.started_at.map(|t| t.timestamp_millis()))
        .bind(turn.ended_at.map(|t| t.timestamp_millis()))
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO agent_turn_content
                (id, turn_id, raw_jsonl, assistant_text, content_size,
                 files_touched, commands_run, errors_encountered, tool_call_count, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(&turn_id)
        .bind(&turn.raw_jsonl)
        .bind(&turn.assistant_text)
        .bind(turn.raw_jsonl.len() as i64)
        .bind(serde_json::to_string(&side_effects.files_touched()).unwrap_or_else(|_| "[]".into()))
        .bind(serde_json::to_string(&side_effects.commands_run).unwrap_or_else(|_| "[]".into()))
        .bind(
            serde_json::to_string(&side_effects.errors_encountered)
                .unwrap_or_else(|_| "[]".into()),
        )
        .bind(side_effects.tool_call_count as i64)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for artifact in &side_effects.artifacts {
            sqlx::query(
                r#"
                INSERT INTO agent_turn_artifacts
                    (id, turn_id, artifact_type, artifact_value, artifact_metadata, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(uuid::Uuid::new_v4().to_string())
            .bind(&turn_id)
            .bind(&artifact.artifact_type)
            .bind(&artifact.artifact_value)
            .bind(artifact.artifact_metadata.to_string())
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(turn_id)
    }

    /// Refresh session rollups after a recording pass.
    pub async fn finish_recording(
        &self,
        session_row_id: &str,
        turn_count: i64,
        last_activity_at: Option<i64>,
        workspace_path: &str,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE agent_sessions
            SET turn_count = ?1,
                last_activity_at = COALESCE(?2, last_activity_at),
                workspace_path = ?3,
                updated_at = ?4
            WHERE id = ?5
            "#,
        )
        .bind(turn_count)
        .bind(last_activity_at)
        .bind(workspace_path)
        .bind(now_ms())
        .bind(session_row_id)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Ids of every turn recorded for a session, in turn order.
    pub async fn list_turn_ids(&self, session_row_id: &str) -> DbResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT id FROM agent_turns WHERE session_id = ?1 ORDER BY turn_number ASC",
        )
        .bind(session_row_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    pub async fn get_turn(&self, turn_id: &str) -> DbResult<Option<AgentTurnRow>> {
        let sql = format!("SELECT {TURN_COLUMNS} FROM agent_turns WHERE id = ?1");
        Ok(sqlx::query_as(&sql)
            .bind(turn_id)
            .fetch_optional(self.pool())
            .await?)
    }

    pub async fn get_turn_content(&self, turn_id: &str) -> DbResult<Option<AgentTurnContentRow>> {
        Ok(sqlx::query_as(
            r#"
            SELECT turn_id, raw_jsonl, assistant_text, content_size,
                   files_touched, commands_run, errors_encountered, tool_call_count
            FROM agent_turn_content WHERE turn_id = ?1
            "#,
        )
        .bind(turn_id)
        .fetch_optional(self.pool())
        .await?)
    }

    /// Fill in the asynchronous enrichment fields of a turn. Passing `None`
    /// for a field leaves its current value alone.
    pub async fn set_turn_summary(
        &self,
        turn_id: &str,
        turn_title: Option<&str>,
        assistant_summary: Option<&str>,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE agent_turns
            SET turn_title = COALESCE(?1, turn_title),
                assistant_summary = COALESCE(?2, assistant_summary)
            WHERE id = ?3
            "#,
        )
        .bind(turn_title)
        .bind(assistant_summary)
        .bind(turn_id)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn link_session_project(
        &self,
        session_row_id: &str,
        project_id: &str,
    ) -> DbResult<()> {
        sqlx::query("UPDATE agent_sessions SET project_id = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(project_id)
            .bind(now_ms())
            .bind(session_row_id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    pub async fn mark_session_processed(&self, session_row_id: &str) -> DbResult<()> {
        sqlx::query("UPDATE agent_sessions SET is_processed = 1, updated_at = ?1 WHERE id = ?2")
            .bind(now_ms())
            .bind(session_row_id)
            .execute(self.pool())
            .await?;
        Ok(())
    }
}
