// crates/core/src/classifier.rs
//! Prompt classifier: raw prompt + cwd → structured retrieval signals.
//!
//! Matching runs against an explicit, read-only `EntitySnapshot` loaded once
//! per process. It is passed in, never global, so tests can inject arbitrary
//! snapshots and concurrent workers can hold different ones.

use crate::artifacts::extract_file_paths_from_text;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Prompts shorter than this carry no usable signal.
const MIN_PROMPT_CHARS: usize = 3;

/// Person names at or below this length are matching noise.
const MIN_PERSON_NAME_CHARS: usize = 2;

/// Confidence added when the query type is anything but `general`.
const QUERY_TYPE_BONUS: f32 = 0.2;

const CODE_KEYWORDS: &[&str] = &[
    "fix", "bug", "refactor", "implement", "debug", "error", "function", "module", "code",
    "compile", "build", "test", "tests",
];
const EMAIL_KEYWORDS: &[&str] = &["email", "emails", "reply", "draft", "inbox", "send"];
const TASK_KEYWORDS: &[&str] = &["task", "tasks", "todo", "todos", "backlog", "sprint", "sprints"];
const META_KEYWORDS: &[&str] = &["how does", "how do", "why does", "explain", "architecture"];

/// What kind of help the prompt is asking for. First matching family wins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    Code,
    Email,
    Task,
    Meta,
    #[default]
    General,
}

impl QueryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::Code => "code",
            QueryType::Email => "email",
            QueryType::Task => "task",
            QueryType::Meta => "meta",
            QueryType::General => "general",
        }
    }
}

/// Structured signals extracted from one prompt.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptClassification {
    /// Known project slugs mentioned in the prompt.
    pub project_slugs: Vec<String>,
    /// Known person names mentioned in the prompt (original casing).
    pub person_names: Vec<String>,
    /// Final path segment of the cwd, always set when a cwd is given,
    /// whether or not it matches a known project. A weaker fallback signal.
    pub workspace_project: Option<String>,
    pub query_type: QueryType,
    /// Path-shaped tokens found in the prompt.
    pub file_paths: Vec<String>,
    /// Retrieval gate in [0, 1]. Not a quality score.
    pub confidence: f32,
}

/// Process-lifetime snapshot of known entities: `(slug, name)` projects and
/// `(name, email)` people. Loaded once, read-only afterwards; reload
/// explicitly when freshness matters.
#[derive(Debug, Clone, Default)]
pub struct EntitySnapshot {
    pub projects: Vec<(String, String)>,
    pub people: Vec<(String, String)>,
}

pub struct PromptClassifier {
    snapshot: EntitySnapshot,
}

/// Whole-word occurrence check. Case-sensitive: callers lowercase both
/// sides. A hit inside a longer word does not count; word boundaries are
/// any non-alphanumeric, non-underscore character, which keeps needles
/// like `c++` matchable.
pub fn word_match(needle: &str, haystack: &str) -> bool {
    if needle.is_empty() || haystack.is_empty() {
        return false;
    }
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let mut from = 0;
    while let Some(pos) = haystack[from..].find(needle) {
        let at = from + pos;
        let end = at + needle.len();
        let before_ok = haystack[..at].chars().next_back().map_or(true, |c| !is_word(c));
        let after_ok = haystack[end..].chars().next().map_or(true, |c| !is_word(c));
        if before_ok && after_ok {
            return true;
        }
        from = end.max(at + 1);
    }
    false
}

fn family_match(lower: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|kw| word_match(kw, lower))
}

/// Classify the prompt's query type. Expects lowercased input.
pub fn detect_query_type(lower: &str) -> QueryType {
    if lower.is_empty() {
        return QueryType::General;
    }
    if family_match(lower, CODE_KEYWORDS) {
        QueryType::Code
    } else if family_match(lower, EMAIL_KEYWORDS) {
        QueryType::Email
    } else if family_match(lower, TASK_KEYWORDS) {
        QueryType::Task
    } else if family_match(lower, META_KEYWORDS) {
        QueryType::Meta
    } else {
        QueryType::General
    }
}

/// Confidence from already-extracted signals: project 0.8, person 0.7,
/// workspace-only 0.5, plus a bonus for a non-general query type, capped.
pub fn compute_confidence(c: &PromptClassification) -> f32 {
    let mut confidence = if !c.project_slugs.is_empty() {
        0.8
    } else if !c.person_names.is_empty() {
        0.7
    } else if c.workspace_project.is_some() {
        0.5
    } else {
        0.0
    };
    if c.query_type != QueryType::General {
        confidence += QUERY_TYPE_BONUS;
    }
    confidence.min(1.0)
}

impl PromptClassifier {
    pub fn new(snapshot: EntitySnapshot) -> Self {
        Self { snapshot }
    }

    pub fn snapshot(&self) -> &EntitySnapshot {
        &self.snapshot
    }

    pub fn classify(&self, prompt: &str, cwd: Option<&str>) -> PromptClassification {
        let mut c = PromptClassification::default();
        c.workspace_project = cwd.and_then(|d| {
            Path::new(d)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
        });

        let trimmed = prompt.trim();
        if trimmed.is_empty() {
            return c;
        }
        if trimmed.chars().count() < MIN_PROMPT_CHARS {
            c.confidence = 0.1;
            return c;
        }

        let lower = trimmed.to_lowercase();

        for (slug, name) in &self.snapshot.projects {
            if word_match(&slug.to_lowercase(), &lower)
                || word_match(&name.to_lowercase(), &lower)
            {
                c.project_slugs.push(slug.clone());
            }
        }
        for (name, _email) in &self.snapshot.people {
            if name.chars().count() <= MIN_PERSON_NAME_CHARS {
                continue;
            }
            if word_match(&name.to_lowercase(), &lower) {
                c.person_names.push(name.clone());
            }
        }

        c.query_type = detect_query_type(&lower);
        c.file_paths = extract_file_paths_from_text(trimmed);
        c.confidence = compute_confidence(&c);
        c
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier_with(projects: &[(&str, &str)], people: &[(&str, &str)]) -> PromptClassifier {
        PromptClassifier::new(EntitySnapshot {
            projects: projects
                .iter()
                .map(|(s, n)| (s.to_string(), n.to_string()))
                .collect(),
            people: people
                .iter()
                .map(|(n, e)| (n.to_string(), e.to_string()))
                .collect(),
        })
    }

    #[test]
    fn test_word_match_exact_word() {
        assert!(word_match("focus", "fix the focus bug"));
    }

    #[test]
    fn test_word_match_rejects_substring() {
        assert!(!word_match("focus", "unfocused attention"));
    }

    #[test]
    fn test_word_match_is_case_sensitive() {
        assert!(!word_match("focus", "fix the FOCUS bug"));
    }

    #[test]
    fn test_word_match_empty_text() {
        assert!(!word_match("focus", ""));
    }

    #[test]
    fn test_word_match_punctuated_needle() {
        assert!(word_match("c++", "i use c++ daily"));
    }

    #[test]
    fn test_word_match_at_string_edges() {
        assert!(word_match("focus", "focus"));
        assert!(word_match("focus", "focus first"));
        assert!(word_match("focus", "status of focus?"));
    }

    #[test]
    fn test_detect_query_types() {
        assert_eq!(detect_query_type("fix the bug in login"), QueryType::Code);
        assert_eq!(detect_query_type("draft a reply to john"), QueryType::Email);
        assert_eq!(detect_query_type("show me the backlog tasks"), QueryType::Task);
        assert_eq!(detect_query_type("how does the worker loop work?"), QueryType::Meta);
        assert_eq!(detect_query_type("what is the meaning of life?"), QueryType::General);
        assert_eq!(detect_query_type(""), QueryType::General);
    }

    #[test]
    fn test_confidence_project_match() {
        let c = PromptClassification {
            project_slugs: vec!["focus".to_string()],
            ..Default::default()
        };
        assert!(compute_confidence(&c) >= 0.8);
    }

    #[test]
    fn test_confidence_person_match() {
        let c = PromptClassification {
            person_names: vec!["Alice".to_string()],
            ..Default::default()
        };
        assert!(compute_confidence(&c) >= 0.7);
    }

    #[test]
    fn test_confidence_workspace_only() {
        let c = PromptClassification {
            workspace_project: Some("focus".to_string()),
            ..Default::default()
        };
        let conf = compute_confidence(&c);
        assert!((0.4..=0.6).contains(&conf));
    }

    #[test]
    fn test_confidence_no_signal() {
        assert!(compute_confidence(&PromptClassification::default()) <= 0.2);
    }

    #[test]
    fn test_confidence_query_type_bonus() {
        let c = PromptClassification {
            query_type: QueryType::Code,
            ..Default::default()
        };
        assert!(compute_confidence(&c) >= 0.2);
    }

    #[test]
    fn test_confidence_capped_at_one() {
        let c = PromptClassification {
            project_slugs: vec!["focus".to_string()],
            query_type: QueryType::Code,
            ..Default::default()
        };
        assert!(compute_confidence(&c) <= 1.0);
    }

    #[test]
    fn test_classify_empty_prompt() {
        let c = classifier_with(&[], &[]).classify("", None);
        assert_eq!(c.confidence, 0.0);
    }

    #[test]
    fn test_classify_very_short_prompt() {
        let c = classifier_with(&[], &[]).classify("hi", None);
        assert!(c.confidence <= 0.2);
    }

    #[test]
    fn test_classify_project_slug_mention() {
        let c = classifier_with(&[("focus", "Focus")], &[])
            .classify("what's the status of focus?", None);
        assert_eq!(c.project_slugs, vec!["focus"]);
        assert!(c.confidence >= 0.8);
    }

    #[test]
    fn test_classify_project_name_mention() {
        let c = classifier_with(&[("trading-bot", "Trading Bot")], &[])
            .classify("update the trading bot configuration", None);
        assert_eq!(c.project_slugs, vec!["trading-bot"]);
    }

    #[test]
    fn test_classify_multiple_projects() {
        let c = classifier_with(&[("focus", "Focus"), ("vault", "Vault")], &[])
            .classify("compare focus and vault approaches", None);
        assert!(c.project_slugs.contains(&"focus".to_string()));
        assert!(c.project_slugs.contains(&"vault".to_string()));
    }

    #[test]
    fn test_classify_person_mention() {
        let c = classifier_with(&[], &[("Alice Chen", "alice@example.com")])
            .classify("what did alice chen say about the deadline", None);
        assert_eq!(c.person_names, vec!["Alice Chen"]);
        assert!(c.confidence >= 0.7);
    }

    #[test]
    fn test_classify_short_person_name_skipped() {
        let c = classifier_with(&[], &[("Al", "al@example.com")])
            .classify("talk to al about the project", None);
        assert!(c.person_names.is_empty());
    }

    #[test]
    fn test_classify_workspace_always_set_from_cwd() {
        let classifier = classifier_with(&[("focus", "Focus")], &[]);

        let c = classifier.classify("fix this", Some("/home/user/focus"));
        assert_eq!(c.workspace_project.as_deref(), Some("focus"));

        // Also set when the directory matches no known project.
        let c = classifier.classify("fix this", Some("/home/user/other-project"));
        assert_eq!(c.workspace_project.as_deref(), Some("other-project"));
    }

    #[test]
    fn test_classify_query_type_and_paths() {
        let c = classifier_with(&[], &[])
            .classify("refactor the auth module, see src/auth/login.rs", None);
        assert_eq!(c.query_type, QueryType::Code);
        assert_eq!(c.file_paths, vec!["src/auth/login.rs"]);
    }

    #[test]
    fn test_classify_without_entities_still_types() {
        let c = classifier_with(&[], &[]).classify("fix the bug in the focus project", None);
        assert_eq!(c.query_type, QueryType::Code);
        assert!(c.project_slugs.is_empty());
    }

    #[test]
    fn test_classify_confidence_stacking() {
        let classifier = classifier_with(&[("focus", "Focus")], &[]);

        // Workspace only.
        let c = classifier.classify("help me with this", Some("/home/user/focus"));
        assert!(c.confidence >= 0.3);

        // Project mention dominates.
        let c = classifier.classify("what's the status of focus?", Some("/home/user/focus"));
        assert!(c.confidence >= 0.8);
    }
}
