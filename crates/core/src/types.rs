// crates/core/src/types.rs
//! Shared value types produced by the pure pipeline stages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One conversation turn parsed out of a transcript: a user message plus the
/// assistant's complete response to it (text, tool calls, tool results).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedTurn {
    /// Zero-based position of the turn within the transcript.
    pub turn_number: usize,
    pub user_message: String,
    /// All assistant text blocks of the turn, newline-joined.
    pub assistant_text: String,
    /// Tool names used in the turn, deduplicated, insertion order preserved.
    pub tool_names: Vec<String>,
    /// First non-empty model name seen in the turn.
    pub model_name: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    /// The verbatim source lines composing the turn, newline-joined.
    /// This is the identity input: `content_hash` is derived from it alone.
    pub raw_jsonl: String,
    /// Lowercase hex digest of `raw_jsonl`.
    pub content_hash: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parsed_turn_roundtrips_through_json() {
        let turn = ParsedTurn {
            turn_number: 0,
            user_message: "Fix the bug".to_string(),
            assistant_text: "Done.".to_string(),
            tool_names: vec!["Read".to_string()],
            model_name: Some("claude-opus-4-6".to_string()),
            started_at: None,
            ended_at: None,
            raw_jsonl: "{}".to_string(),
            content_hash: "abc".to_string(),
        };
        let json = serde_json::to_string(&turn).unwrap();
        let back: ParsedTurn = serde_json::from_str(&json).unwrap();
        assert_eq!(back, turn);
    }
}
