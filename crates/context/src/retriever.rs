// crates/context/src/retriever.rs
//! Context retriever: classifier signals → deduplicated, relevance-ranked
//! candidate blocks from every source the pipeline has accumulated.

use chrono::{DateTime, TimeZone, Utc};
use recap_core::classifier::PromptClassification;
use recap_core::formatter::ContextBlock;
use recap_core::skills::{
    format_skill_content, keywords_from_classification, list_installed_skills,
    score_skill_relevance,
};
use recap_db::{Database, DbResult, ProjectRef};
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::debug;

/// Classifications below this confidence retrieve nothing; storage is never
/// touched.
pub const MIN_RETRIEVAL_CONFIDENCE: f32 = 0.1;

/// Per-source candidate cap.
const SOURCE_LIMIT: i64 = 5;

/// Skill blocks injected per prompt, at most.
pub const DEFAULT_MAX_SKILLS: usize = 2;

const CONVERSATION_BASE_SCORE: f32 = 0.85;
const CONVERSATION_DECAY: f32 = 0.05;
const TASK_BASE_SCORE: f32 = 0.7;
const TASK_URGENCY_BOOST: f32 = 0.05;
const COMMITMENT_SCORE: f32 = 0.65;
const SPRINT_SCORE: f32 = 0.6;

/// Human-scale relative time for block content: "just now", "5m ago",
/// "3h ago", "2d ago", "3w ago".
pub fn relative_time(at: Option<DateTime<Utc>>) -> String {
    let Some(at) = at else {
        return "unknown time".to_string();
    };
    let seconds = (Utc::now() - at).num_seconds().max(0);
    match seconds {
        0..=59 => "just now".to_string(),
        60..=3_599 => format!("{}m ago", seconds / 60),
        3_600..=86_399 => format!("{}h ago", seconds / 3_600),
        86_400..=604_799 => format!("{}d ago", seconds / 86_400),
        _ => format!("{}w ago", seconds / 604_800),
    }
}

fn millis_to_datetime(ms: Option<i64>) -> Option<DateTime<Utc>> {
    ms.and_then(|ms| Utc.timestamp_millis_opt(ms).single())
}

fn clip_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        text.chars().take(max).collect()
    }
}

pub struct ContextRetriever {
    skills_dir: Option<PathBuf>,
    max_skills: usize,
}

impl Default for ContextRetriever {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextRetriever {
    pub fn new() -> Self {
        Self {
            skills_dir: recap_core::paths::skills_dir(),
            max_skills: DEFAULT_MAX_SKILLS,
        }
    }

    pub fn with_skills_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            skills_dir: Some(dir.into()),
            max_skills: DEFAULT_MAX_SKILLS,
        }
    }

    pub fn max_skills(mut self, max_skills: usize) -> Self {
        self.max_skills = max_skills;
        self
    }

    /// Gather, deduplicate, and rank candidate blocks.
    ///
    /// Blocks are deduplicated by `source_id` (first occurrence wins) and
    /// sorted by relevance descending.
    pub async fn retrieve(
        &self,
        db: &Database,
        classification: &PromptClassification,
    ) -> DbResult<Vec<ContextBlock>> {
        if classification.confidence < MIN_RETRIEVAL_CONFIDENCE {
            return Ok(Vec::new());
        }

        // Resolve the target project: exact slug/name mention first, then a
        // loose workspace match.
        let mut project: Option<ProjectRef> = db
            .resolve_project_by_slugs(&classification.project_slugs)
            .await?;
        if project.is_none() {
            if let Some(workspace) = &classification.workspace_project {
                project = db.resolve_project_by_workspace(workspace).await?;
            }
        }
        debug!(
            project = project.as_ref().map(|p| p.slug.as_str()),
            confidence = classification.confidence,
            "retrieving context"
        );

        let mut blocks: Vec<ContextBlock> = Vec::new();
        match &project {
            Some(project) => {
                blocks.extend(self.conversation_blocks(
                    db.recent_turns_for_project(&project.id, SOURCE_LIMIT).await?,
                ));
            }
            None => {
                if let Some(workspace) = &classification.workspace_project {
                    blocks.extend(self.conversation_blocks(
                        db.recent_turns_for_workspace(workspace, SOURCE_LIMIT).await?,
                    ));
                }
            }
        }

        let project_id = project.as_ref().map(|p| p.id.as_str());
        for task in db.active_tasks(project_id, SOURCE_LIMIT).await? {
            let boost = match task.priority.as_str() {
                "urgent" | "high" => TASK_URGENCY_BOOST,
                _ => 0.0,
            };
            let due = task
                .due_date
                .as_deref()
                .map(|d| format!(", due {d}"))
                .unwrap_or_default();
            blocks.push(ContextBlock::new(
                "task",
                task.id.clone(),
                task.title.clone(),
                format!("[{}]{due}", task.status),
                TASK_BASE_SCORE + boost,
            ));
        }

        for commitment in db
            .open_commitments(&classification.person_names, SOURCE_LIMIT)
            .await?
        {
            let who = commitment.person_name.as_deref().unwrap_or("someone");
            let direction = match commitment.direction.as_str() {
                "from_me" => format!("You owe {who}"),
                _ => format!("{who} owes you"),
            };
            let deadline = commitment
                .deadline
                .as_deref()
                .map(|d| format!(" (by {d})"))
                .unwrap_or_default();
            blocks.push(ContextBlock::new(
                "commitment",
                commitment.id.clone(),
                direction,
                format!("{}{deadline}", commitment.description),
                COMMITMENT_SCORE,
            ));
        }

        for sprint in db.active_sprints(3).await? {
            let ends = millis_to_datetime(Some(sprint.ends_at))
                .map(|dt| dt.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "soon".to_string());
            blocks.push(ContextBlock::new(
                "sprint",
                sprint.id.clone(),
                format!("Active sprint: {}", sprint.name),
                format!("ends {ends}"),
                SPRINT_SCORE,
            ));
        }

        blocks.extend(self.skill_blocks(classification));

        // Dedup by source_id, first occurrence wins, then rank.
        let mut seen: HashSet<String> = HashSet::new();
        blocks.retain(|b| seen.insert(b.source_id.clone()));
        blocks.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
        Ok(blocks)
    }

    fn conversation_blocks(&self, turns: Vec<recap_db::RecentTurnRow>) -> Vec<ContextBlock> {
        turns
            .into_iter()
            .enumerate()
            .map(|(i, turn)| {
                let title = turn
                    .turn_title
                    .clone()
                    .or_else(|| turn.user_message.as_deref().map(|m| clip_chars(m, 120)))
                    .unwrap_or_else(|| "Session turn".to_string());
                let summary = turn
                    .assistant_summary
                    .clone()
                    .or_else(|| turn.assistant_text.as_deref().map(|t| clip_chars(t, 160)))
                    .filter(|s| !s.is_empty())
                    .map(|s| format!("{s} — "))
                    .unwrap_or_default();
                let when = relative_time(millis_to_datetime(turn.started_at));
                ContextBlock::new(
                    "conversation",
                    turn.id.clone(),
                    title,
                    format!("{summary}({when})"),
                    CONVERSATION_BASE_SCORE - CONVERSATION_DECAY * i as f32,
                )
            })
            .collect()
    }

    /// Score installed skills against the classifier's keyword set and keep
    /// the best few. Zero-scoring skills never surface.
    fn skill_blocks(&self, classification: &PromptClassification) -> Vec<ContextBlock> {
        let Some(dir) = &self.skills_dir else {
            return Vec::new();
        };
        let keywords = keywords_from_classification(classification);
        if keywords.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(f32, ContextBlock)> = Vec::new();
        for skill in list_installed_skills(dir) {
            let (score, body) = score_skill_relevance(&skill, &keywords);
            if score <= 0.0 {
                continue;
            }
            let relevance = (0.4 + 0.6 * score).min(1.0);
            scored.push((
                score,
                ContextBlock::new(
                    "skill",
                    format!("skill:{}", skill.name),
                    format!("Skill: {}", skill.name),
                    format_skill_content(&skill, &body),
                    relevance,
                ),
            ));
        }
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored
            .into_iter()
            .take(self.max_skills)
            .map(|(_, block)| block)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_relative_time_buckets() {
        let now = Utc::now();
        assert_eq!(relative_time(Some(now - Duration::seconds(30))), "just now");
        assert_eq!(relative_time(Some(now - Duration::minutes(5))), "5m ago");
        assert_eq!(relative_time(Some(now - Duration::hours(3))), "3h ago");
        assert_eq!(relative_time(Some(now - Duration::days(2))), "2d ago");
        assert_eq!(relative_time(Some(now - Duration::weeks(3))), "3w ago");
        assert_eq!(relative_time(None), "unknown time");
    }

    #[test]
    fn test_relative_time_future_is_just_now() {
        let future = Utc::now() + Duration::minutes(10);
        assert_eq!(relative_time(Some(future)), "just now");
    }
}
