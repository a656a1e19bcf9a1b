// crates/db/src/queries/search.rs
// Keyword search over recorded turns: the explicit-retrieval path the
// formatter's overflow line points at.

use crate::{Database, DbResult};

#[derive(Debug, Clone)]
pub struct TurnSearchHit {
    pub turn_id: String,
    /// External session id the turn belongs to.
    pub session_id: String,
    pub turn_title: Option<String>,
    pub user_message: Option<String>,
    pub started_at: Option<i64>,
}

impl<'r> sqlx::FromRow<'r, sqlx::sqlite::SqliteRow> for TurnSearchHit {
    fn from_row(row: &'r sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(Self {
            turn_id: row.try_get("turn_id")?,
            session_id: row.try_get("session_id")?,
            turn_title: row.try_get("turn_title")?,
            user_message: row.try_get("user_message")?,
            started_at: row.try_get("started_at")?,
        })
    }
}

impl Database {
    /// Case-insensitive substring search across turn titles, user messages,
    /// and assistant text, newest first.
    pub async fn search_turns(&self, query: &str, limit: i64) -> DbResult<Vec<TurnSearchHit>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let pattern = format!("%{}%", query.trim());
        Ok(sqlx::query_as(
            r#"
            SELECT t.id AS turn_id, s.session_id, t.turn_title, t.user_message, t.started_at
            FROM agent_turns t
            JOIN agent_sessions s ON s.id = t.session_id
            LEFT JOIN agent_turn_content c ON c.turn_id = t.id
            WHERE t.user_message LIKE ?1
               OR t.turn_title LIKE ?1
               OR c.assistant_text LIKE ?1
            ORDER BY t.started_at DESC
            LIMIT ?2
            "#,
        )
        .bind(pattern)
        .bind(limit)
        .fetch_all(self.pool())
        .await?)
    }
}
