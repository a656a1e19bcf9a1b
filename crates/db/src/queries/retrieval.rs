// crates/db/src/queries/retrieval.rs
// Candidate gatherers for the context retriever: recent turns, active
// tasks, open commitments, and active sprints, plus project resolution.

use crate::queries::entities::ProjectRef;
use crate::{now_ms, Database, DbResult};

#[derive(Debug, Clone)]
pub struct RecentTurnRow {
    pub id: String,
    pub turn_title: Option<String>,
    pub user_message: Option<String>,
    pub assistant_summary: Option<String>,
    pub assistant_text: Option<String>,
    pub started_at: Option<i64>,
}

impl<'r> sqlx::FromRow<'r, sqlx::sqlite::SqliteRow> for RecentTurnRow {
    fn from_row(row: &'r sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(Self {
            id: row.try_get("id")?,
            turn_title: row.try_get("turn_title")?,
            user_message: row.try_get("user_message")?,
            assistant_summary: row.try_get("assistant_summary")?,
            assistant_text: row.try_get("assistant_text")?,
            started_at: row.try_get("started_at")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct TaskRow {
    pub id: String,
    pub title: String,
    pub status: String,
    pub priority: String,
    pub due_date: Option<String>,
}

impl<'r> sqlx::FromRow<'r, sqlx::sqlite::SqliteRow> for TaskRow {
    fn from_row(row: &'r sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(Self {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            status: row.try_get("status")?,
            priority: row.try_get("priority")?,
            due_date: row.try_get("due_date")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct CommitmentRow {
    pub id: String,
    pub description: String,
    pub direction: String,
    pub deadline: Option<String>,
    pub person_name: Option<String>,
}

impl<'r> sqlx::FromRow<'r, sqlx::sqlite::SqliteRow> for CommitmentRow {
    fn from_row(row: &'r sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(Self {
            id: row.try_get("id")?,
            description: row.try_get("description")?,
            direction: row.try_get("direction")?,
            deadline: row.try_get("deadline")?,
            person_name: row.try_get("person_name")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct SprintRow {
    pub id: String,
    pub name: String,
    pub starts_at: i64,
    pub ends_at: i64,
}

impl<'r> sqlx::FromRow<'r, sqlx::sqlite::SqliteRow> for SprintRow {
    fn from_row(row: &'r sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            starts_at: row.try_get("starts_at")?,
            ends_at: row.try_get("ends_at")?,
        })
    }
}

const RECENT_TURN_SELECT: &str = r#"
SELECT t.id, t.turn_title, t.user_message, t.assistant_summary,
       c.assistant_text, t.started_at
FROM agent_turns t
JOIN agent_sessions s ON s.id = t.session_id
LEFT JOIN agent_turn_content c ON c.turn_id = t.id
"#;

impl Database {
    /// Exact match of mentioned slugs/names against known projects.
    pub async fn resolve_project_by_slugs(
        &self,
        slugs: &[String],
    ) -> DbResult<Option<ProjectRef>> {
        if slugs.is_empty() {
            return Ok(None);
        }
        let lowered: Vec<String> = slugs.iter().map(|s| s.to_lowercase()).collect();
        let json = serde_json::to_string(&lowered).unwrap_or_else(|_| "[]".into());
        Ok(sqlx::query_as(
            r#"
            SELECT id, slug, name FROM projects
            WHERE lower(slug) IN (SELECT value FROM json_each(?1))
               OR lower(name) IN (SELECT value FROM json_each(?1))
            ORDER BY slug LIMIT 1
            "#,
        )
        .bind(json)
        .fetch_optional(self.pool())
        .await?)
    }

    /// Loose workspace-name fallback: the cwd's final segment against
    /// project slugs and names.
    pub async fn resolve_project_by_workspace(
        &self,
        workspace: &str,
    ) -> DbResult<Option<ProjectRef>> {
        Ok(sqlx::query_as(
            r#"
            SELECT id, slug, name FROM projects
            WHERE lower(slug) = lower(?1) OR lower(name) = lower(?1)
            LIMIT 1
            "#,
        )
        .bind(workspace)
        .fetch_optional(self.pool())
        .await?)
    }

    /// Most recent turns of sessions linked to a project.
    pub async fn recent_turns_for_project(
        &self,
        project_id: &str,
        limit: i64,
    ) -> DbResult<Vec<RecentTurnRow>> {
        let sql = format!(
            "{RECENT_TURN_SELECT} WHERE s.project_id = ?1 ORDER BY t.started_at DESC LIMIT ?2"
        );
        Ok(sqlx::query_as(&sql)
            .bind(project_id)
            .bind(limit)
            .fetch_all(self.pool())
            .await?)
    }

    /// Most recent turns of sessions whose workspace path contains the
    /// given fragment; the weaker retrieval path when no project resolved.
    pub async fn recent_turns_for_workspace(
        &self,
        workspace_fragment: &str,
        limit: i64,
    ) -> DbResult<Vec<RecentTurnRow>> {
        let sql = format!(
            "{RECENT_TURN_SELECT} WHERE s.workspace_path LIKE '%' || ?1 || '%' \
             ORDER BY t.started_at DESC LIMIT ?2"
        );
        Ok(sqlx::query_as(&sql)
            .bind(workspace_fragment)
            .bind(limit)
            .fetch_all(self.pool())
            .await?)
    }

    /// Non-done tasks, most urgent first, optionally scoped to a project.
    pub async fn active_tasks(
        &self,
        project_id: Option<&str>,
        limit: i64,
    ) -> DbResult<Vec<TaskRow>> {
        Ok(sqlx::query_as(
            r#"
            SELECT id, title, status, priority, due_date FROM tasks
            WHERE status != 'done' AND (?1 IS NULL OR project_id = ?1)
            ORDER BY CASE priority
                WHEN 'urgent' THEN 0 WHEN 'high' THEN 1 WHEN 'normal' THEN 2 ELSE 3
            END, created_at ASC
            LIMIT ?2
            "#,
        )
        .bind(project_id)
        .bind(limit)
        .fetch_all(self.pool())
        .await?)
    }

    /// Open commitments, optionally narrowed to the named people.
    pub async fn open_commitments(
        &self,
        person_names: &[String],
        limit: i64,
    ) -> DbResult<Vec<CommitmentRow>> {
        let names_json = if person_names.is_empty() {
            None
        } else {
            let lowered: Vec<String> = person_names.iter().map(|n| n.to_lowercase()).collect();
            Some(serde_json::to_string(&lowered).unwrap_or_else(|_| "[]".into()))
        };
        Ok(sqlx::query_as(
            r#"
            SELECT c.id, c.description, c.direction, c.deadline, p.name AS person_name
            FROM commitments c
            LEFT JOIN people p ON p.id = c.person_id
            WHERE c.status = 'open'
              AND (?1 IS NULL OR lower(p.name) IN (SELECT value FROM json_each(?1)))
            ORDER BY c.created_at ASC
            LIMIT ?2
            "#,
        )
        .bind(names_json)
        .bind(limit)
        .fetch_all(self.pool())
        .await?)
    }

    /// Sprints overlapping the current instant.
    pub async fn active_sprints(&self, limit: i64) -> DbResult<Vec<SprintRow>> {
        let now = now_ms();
        Ok(sqlx::query_as(
            r#"
            SELECT id, name, starts_at, ends_at FROM sprints
            WHERE is_active = 1 AND starts_at <= ?1 AND ends_at >= ?1
            ORDER BY ends_at ASC
            LIMIT ?2
            "#,
        )
        .bind(now)
        .bind(limit)
        .fetch_all(self.pool())
        .await?)
    }

    pub async fn insert_task(
        &self,
        project_id: Option<&str>,
        title: &str,
        status: &str,
        priority: &str,
    ) -> DbResult<String> {
        let id = uuid::Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO tasks (id, project_id, title, status, priority, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&id)
        .bind(project_id)
        .bind(title)
        .bind(status)
        .bind(priority)
        .bind(now_ms())
        .execute(self.pool())
        .await?;
        Ok(id)
    }

    pub async fn insert_commitment(
        &self,
        person_id: Option<&str>,
        direction: &str,
        description: &str,
    ) -> DbResult<String> {
        let id = uuid::Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO commitments (id, person_id, direction, description, status, created_at)
            VALUES (?1, ?2, ?3, ?4, 'open', ?5)
            "#,
        )
        .bind(&id)
        .bind(person_id)
        .bind(direction)
        .bind(description)
        .bind(now_ms())
        .execute(self.pool())
        .await?;
        Ok(id)
    }

    pub async fn insert_sprint(
        &self,
        name: &str,
        project_id: Option<&str>,
        starts_at: i64,
        ends_at: i64,
    ) -> DbResult<String> {
        let id = uuid::Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO sprints (id, name, project_id, starts_at, ends_at, is_active, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6)
            "#,
        )
        .bind(&id)
        .bind(name)
        .bind(project_id)
        .bind(starts_at)
        .bind(ends_at)
        .bind(now_ms())
        .execute(self.pool())
        .await?;
        Ok(id)
    }
}
