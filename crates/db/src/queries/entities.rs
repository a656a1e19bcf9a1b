// crates/db/src/queries/entities.rs
// Known-entity lookups: the classifier snapshot, the entity-extract
// handler's reference lists, and the writes for extracted turn entities.
// The projects/people tables themselves are populated by external
// ingestion; insert helpers exist for that collaborator (and for tests).

use crate::{now_ms, Database, DbResult};
use recap_core::classifier::EntitySnapshot;
use std::collections::HashSet;

#[derive(Debug, Clone)]
pub struct ProjectRef {
    pub id: String,
    pub slug: String,
    pub name: String,
}

impl<'r> sqlx::FromRow<'r, sqlx::sqlite::SqliteRow> for ProjectRef {
    fn from_row(row: &'r sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(Self {
            id: row.try_get("id")?,
            slug: row.try_get("slug")?,
            name: row.try_get("name")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct PersonRef {
    pub id: String,
    pub name: String,
}

impl<'r> sqlx::FromRow<'r, sqlx::sqlite::SqliteRow> for PersonRef {
    fn from_row(row: &'r sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
        })
    }
}

impl Database {
    /// Load the classifier's read-only entity snapshot: `(slug, name)`
    /// project pairs and `(name, email)` person pairs.
    pub async fn load_entity_snapshot(&self) -> DbResult<EntitySnapshot> {
        let projects: Vec<(String, String)> =
            sqlx::query_as("SELECT slug, name FROM projects WHERE status = 'active' ORDER BY slug")
                .fetch_all(self.pool())
                .await?;
        let people: Vec<(String, Option<String>)> =
            sqlx::query_as("SELECT name, email FROM people ORDER BY name")
                .fetch_all(self.pool())
                .await?;
        Ok(EntitySnapshot {
            projects,
            people: people
                .into_iter()
                .map(|(name, email)| (name, email.unwrap_or_default()))
                .collect(),
        })
    }

    pub async fn list_project_refs(&self) -> DbResult<Vec<ProjectRef>> {
        Ok(
            sqlx::query_as("SELECT id, slug, name FROM projects WHERE status = 'active'")
                .fetch_all(self.pool())
                .await?,
        )
    }

    pub async fn list_person_refs(&self) -> DbResult<Vec<PersonRef>> {
        Ok(sqlx::query_as("SELECT id, name FROM people")
            .fetch_all(self.pool())
            .await?)
    }

    /// `(entity_type, entity_name)` pairs already recorded for a turn, so
    /// re-running extraction doesn't pile up exact duplicates.
    pub async fn turn_entity_names(&self, turn_id: &str) -> DbResult<HashSet<(String, String)>> {
        let rows: Vec<(String, Option<String>)> = sqlx::query_as(
            "SELECT entity_type, entity_name FROM agent_turn_entities WHERE turn_id = ?1",
        )
        .bind(turn_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows
            .into_iter()
            .map(|(t, n)| (t, n.unwrap_or_default()))
            .collect())
    }

    pub async fn insert_turn_entity(
        &self,
        turn_id: &str,
        entity_type: &str,
        entity_id: Option<&str>,
        entity_name: &str,
        confidence: f64,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO agent_turn_entities
                (id, turn_id, entity_type, entity_id, entity_name, confidence, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(turn_id)
        .bind(entity_type)
        .bind(entity_id)
        .bind(entity_name)
        .bind(confidence)
        .bind(now_ms())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn list_turn_entities(
        &self,
        turn_id: &str,
    ) -> DbResult<Vec<(String, Option<String>, Option<String>, f64)>> {
        Ok(sqlx::query_as(
            r#"
            SELECT entity_type, entity_id, entity_name, confidence
            FROM agent_turn_entities WHERE turn_id = ?1 ORDER BY created_at
            "#,
        )
        .bind(turn_id)
        .fetch_all(self.pool())
        .await?)
    }

    pub async fn insert_project(&self, slug: &str, name: &str) -> DbResult<String> {
        let id = uuid::Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO projects (id, slug, name, status, created_at) VALUES (?1, ?2, ?3, 'active', ?4)",
        )
        .bind(&id)
        .bind(slug)
        .bind(name)
        .bind(now_ms())
        .execute(self.pool())
        .await?;
        Ok(id)
    }

    pub async fn insert_person(&self, name: &str, email: Option<&str>) -> DbResult<String> {
        let id = uuid::Uuid::new_v4().to_string();
        sqlx::query("INSERT INTO people (id, name, email, created_at) VALUES (?1, ?2, ?3, ?4)")
            .bind(&id)
            .bind(name)
            .bind(email)
            .bind(now_ms())
            .execute(self.pool())
            .await?;
        Ok(id)
    }
}
