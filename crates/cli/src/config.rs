// crates/cli/src/config.rs
//! Environment-variable configuration, resolved against the defaults in
//! `recap_core::paths`.

use recap_worker::{DisabledSummarizer, HttpSummarizer, Summarizer};
use std::path::PathBuf;
use std::sync::Arc;

const DEFAULT_SUMMARY_MODEL: &str = "claude-haiku-4-5";

/// Database file: `RECAP_DB_PATH` or the platform cache default.
pub fn db_path() -> Option<PathBuf> {
    std::env::var("RECAP_DB_PATH")
        .ok()
        .map(PathBuf::from)
        .or_else(recap_core::paths::db_path)
}

/// Skills directory: `RECAP_SKILLS_DIR` or `~/.claude/skills`.
pub fn skills_dir() -> Option<PathBuf> {
    std::env::var("RECAP_SKILLS_DIR")
        .ok()
        .map(PathBuf::from)
        .or_else(recap_core::paths::skills_dir)
}

/// Summarizer collaborator: HTTP-backed when `RECAP_API_KEY` is set,
/// otherwise disabled (handlers fall back to truncation).
pub fn summarizer() -> Arc<dyn Summarizer> {
    match std::env::var("RECAP_API_KEY") {
        Ok(key) if !key.is_empty() => {
            let model = std::env::var("RECAP_SUMMARY_MODEL")
                .unwrap_or_else(|_| DEFAULT_SUMMARY_MODEL.to_string());
            Arc::new(HttpSummarizer::new(key, model))
        }
        _ => Arc::new(DisabledSummarizer),
    }
}
