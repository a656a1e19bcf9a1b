// crates/core/src/skills.rs
//! Installed-skill registry and keyword relevance scoring.
//!
//! Skills live as `<dir>/<name>/SKILL.md` files with YAML frontmatter. The
//! retriever scores them against the classifier's signals and injects the
//! best ones as context blocks.

use crate::classifier::{word_match, PromptClassification, QueryType};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Characters of skill body kept in an injected context block.
pub const SKILL_BODY_PREVIEW_MAX: usize = 300;

/// Score bonus when a keyword hits the skill's name directly.
pub const SKILL_NAME_BONUS: f32 = 0.25;

/// Keywords at or below this length are dropped as noise.
const MIN_KEYWORD_CHARS: usize = 2;

/// One skill found on disk.
#[derive(Debug, Clone)]
pub struct InstalledSkill {
    pub name: String,
    pub description: String,
    /// Path to the full SKILL.md, for on-demand reading.
    pub path: PathBuf,
}

#[derive(Debug, Default, Deserialize)]
struct SkillFrontmatter {
    name: Option<String>,
    description: Option<String>,
}

/// Split a SKILL.md into (frontmatter, body). Missing or malformed
/// frontmatter yields an empty frontmatter and the whole text as body.
fn split_frontmatter(raw: &str) -> (SkillFrontmatter, &str) {
    let rest = match raw.strip_prefix("---") {
        Some(rest) => rest,
        None => return (SkillFrontmatter::default(), raw),
    };
    let Some(end) = rest.find("\n---") else {
        return (SkillFrontmatter::default(), raw);
    };
    let yaml = &rest[..end];
    let body = rest[end + 4..].trim_start_matches('-');
    let front = serde_yaml::from_str(yaml).unwrap_or_default();
    (front, body)
}

/// The instruction body of a SKILL.md, frontmatter stripped.
pub fn skill_body(raw: &str) -> &str {
    split_frontmatter(raw).1
}

/// Scan a skills directory for installed skills, sorted by name.
/// Unreadable entries are skipped, never fatal.
pub fn list_installed_skills(dir: &Path) -> Vec<InstalledSkill> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut skills = Vec::new();
    for entry in entries.flatten() {
        let skill_path = entry.path().join("SKILL.md");
        if !skill_path.is_file() {
            continue;
        }
        let dir_name = entry.file_name().to_string_lossy().into_owned();
        let raw = match std::fs::read_to_string(&skill_path) {
            Ok(raw) => raw,
            Err(e) => {
                debug!("Skipping unreadable skill {}: {e}", skill_path.display());
                continue;
            }
        };
        let (front, _body) = split_frontmatter(&raw);
        skills.push(InstalledSkill {
            name: front.name.unwrap_or(dir_name),
            description: front.description.unwrap_or_default(),
            path: skill_path,
        });
    }
    skills.sort_by(|a, b| a.name.cmp(&b.name));
    skills
}

/// Build the keyword set the retriever scores skills against: project
/// slugs, the workspace name, file-path stems, and the query type, word
/// split, lowercased, short tokens dropped.
pub fn keywords_from_classification(c: &PromptClassification) -> BTreeSet<String> {
    let mut keywords = BTreeSet::new();
    let mut add = |s: &str| {
        let lower = s.to_lowercase();
        if lower.chars().count() > MIN_KEYWORD_CHARS {
            keywords.insert(lower.clone());
        }
        for token in lower.split(|ch: char| !ch.is_alphanumeric()) {
            if token.chars().count() > MIN_KEYWORD_CHARS {
                keywords.insert(token.to_string());
            }
        }
    };

    for slug in &c.project_slugs {
        add(slug);
    }
    if let Some(ws) = &c.workspace_project {
        add(ws);
    }
    for path in &c.file_paths {
        if let Some(stem) = Path::new(path).file_stem() {
            add(&stem.to_string_lossy());
        }
    }
    if c.query_type != QueryType::General {
        add(c.query_type.as_str());
    }
    keywords
}

/// Score one skill against a keyword set.
///
/// Score is matched-keyword coverage plus a bonus when a keyword hits the
/// skill name directly; zero when nothing matches. Returns the skill body
/// alongside so callers don't re-read the file. A missing SKILL.md still
/// scores on name and description alone.
pub fn score_skill_relevance(skill: &InstalledSkill, keywords: &BTreeSet<String>) -> (f32, String) {
    let raw = std::fs::read_to_string(&skill.path).unwrap_or_default();
    let body = skill_body(&raw).trim().to_string();
    if keywords.is_empty() {
        return (0.0, body);
    }

    let haystack = format!("{}\n{}\n{}", skill.name, skill.description, body).to_lowercase();
    let name_lower = skill.name.to_lowercase();

    let mut matched = 0usize;
    let mut name_hit = false;
    for keyword in keywords {
        if word_match(keyword, &haystack) {
            matched += 1;
            if word_match(keyword, &name_lower) {
                name_hit = true;
            }
        }
    }
    if matched == 0 {
        return (0.0, body);
    }

    let mut score = matched as f32 / keywords.len() as f32;
    if name_hit {
        score += SKILL_NAME_BONUS;
    }
    (score, body)
}

/// Render a skill into injectable content: description, a clipped body
/// preview, and a pointer at the full file. `body` is the instruction text
/// with frontmatter already stripped (what `score_skill_relevance` hands
/// back).
pub fn format_skill_content(skill: &InstalledSkill, body: &str) -> String {
    let body = body.trim();
    let preview = if body.chars().count() > SKILL_BODY_PREVIEW_MAX {
        let clipped: String = body.chars().take(SKILL_BODY_PREVIEW_MAX).collect();
        format!("{}...", clipped.trim_end())
    } else {
        body.to_string()
    };

    if preview.is_empty() {
        format!(
            "{} (full instructions: {})",
            skill.description,
            skill.path.display()
        )
    } else {
        format!(
            "{} | {} (full instructions: {})",
            skill.description,
            preview,
            skill.path.display()
        )
    }
}
