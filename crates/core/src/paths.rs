// crates/core/src/paths.rs
//! Centralized path functions for all recap storage locations.
//!
//! Single source of truth; avoids ad-hoc `dirs::cache_dir().join(...)`
//! scattered across crates.

use std::path::PathBuf;

/// App cache root: `~/Library/Caches/recap/` (macOS) or `~/.cache/recap/` (Linux).
pub fn app_cache_dir() -> Option<PathBuf> {
    dirs::cache_dir().map(|d| d.join("recap"))
}

/// SQLite database file: `<app_cache_dir>/recap.db`.
pub fn db_path() -> Option<PathBuf> {
    app_cache_dir().map(|d| d.join("recap.db"))
}

/// Default installed-skills directory: `~/.claude/skills/`.
pub fn skills_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|d| d.join(".claude").join("skills"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_cache_dir() {
        let dir = app_cache_dir().unwrap();
        assert!(dir.to_string_lossy().contains("recap"));
    }

    #[test]
    fn test_db_path() {
        let path = db_path().unwrap();
        assert!(path.to_string_lossy().ends_with("recap.db"));
    }

    #[test]
    fn test_skills_dir() {
        let dir = skills_dir().unwrap();
        assert!(dir.to_string_lossy().ends_with("skills"));
    }
}
