// crates/core/src/parser.rs
//! Transcript parser: raw append-only JSONL → ordered, content-hashed turns.
//!
//! Handles malformed lines gracefully (a writer crash can leave a corrupt
//! trailing line), filters subagent/meta noise, and groups messages into
//! turns. Parsing is deterministic: the same input always yields the same
//! turn list and the same hashes; the recorder's dedup depends on it.

use crate::error::ParseError;
use crate::types::ParsedTurn;
use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use serde_json::Value;
use std::path::Path;
use tokio::fs;
use tracing::debug;

/// Message prefixes emitted by slash-command wrappers, never real prompts.
const COMMAND_PREFIXES: &[&str] = &["<command-name>", "<local-command"];

/// Hash of a turn's verbatim source lines; the turn's persistence identity.
///
/// 32-char lowercase hex. Any edit to the underlying log lines changes it.
pub fn compute_content_hash(content: &str) -> String {
    hex::encode(Md5::digest(content.as_bytes()))
}

/// Extract plain text from a message `content` field.
///
/// String content passes through; list content concatenates only
/// `text`-typed blocks with newline separators. Anything else is empty.
pub fn extract_text_content(content: &Value) -> String {
    match content {
        Value::String(s) => s.clone(),
        Value::Array(blocks) => {
            let parts: Vec<&str> = blocks
                .iter()
                .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|b| b.get("text").and_then(Value::as_str))
                .collect();
            parts.join("\n")
        }
        _ => String::new(),
    }
}

/// Collect `tool_use` block names, deduplicated, insertion order preserved.
pub fn extract_tool_names(content: &Value) -> Vec<String> {
    let Value::Array(blocks) = content else {
        return Vec::new();
    };
    let mut tools: Vec<String> = Vec::new();
    for block in blocks {
        if block.get("type").and_then(Value::as_str) != Some("tool_use") {
            continue;
        }
        if let Some(name) = block.get("name").and_then(Value::as_str) {
            if !name.is_empty() && !tools.iter().any(|t| t == name) {
                tools.push(name.to_string());
            }
        }
    }
    tools
}

/// Parse an RFC3339 timestamp (with `Z` suffix), `None` on anything else.
pub fn parse_timestamp(ts: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(ts)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

struct RawMessage<'a> {
    role: &'a str,
    text: String,
    has_tool_result: bool,
    tool_names: Vec<String>,
    model: Option<String>,
    timestamp: Option<DateTime<Utc>>,
    line: &'a str,
}

struct TurnBuilder<'a> {
    user_message: String,
    assistant_texts: Vec<String>,
    tool_names: Vec<String>,
    model_name: Option<String>,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    raw_lines: Vec<&'a str>,
}

impl<'a> TurnBuilder<'a> {
    fn start(msg: &RawMessage<'a>) -> Self {
        Self {
            user_message: msg.text.clone(),
            assistant_texts: Vec::new(),
            tool_names: Vec::new(),
            model_name: None,
            started_at: msg.timestamp,
            ended_at: msg.timestamp,
            raw_lines: vec![msg.line],
        }
    }

    fn absorb(&mut self, msg: &RawMessage<'a>) {
        if !msg.text.is_empty() && msg.role == "assistant" {
            self.assistant_texts.push(msg.text.clone());
        }
        for tool in &msg.tool_names {
            if !self.tool_names.iter().any(|t| t == tool) {
                self.tool_names.push(tool.clone());
            }
        }
        if self.model_name.is_none() {
            self.model_name = msg.model.clone();
        }
        if msg.timestamp.is_some() {
            self.ended_at = msg.timestamp;
        }
        self.raw_lines.push(msg.line);
    }

    fn finish(self, turn_number: usize) -> ParsedTurn {
        let raw_jsonl = self.raw_lines.join("\n");
        let content_hash = compute_content_hash(&raw_jsonl);
        ParsedTurn {
            turn_number,
            user_message: self.user_message,
            assistant_text: self.assistant_texts.join("\n"),
            tool_names: self.tool_names,
            model_name: self.model_name,
            started_at: self.started_at,
            ended_at: self.ended_at,
            raw_jsonl,
            content_hash,
        }
    }
}

/// Parse transcript content into structured turns. Pure: no I/O, no clock.
///
/// A turn starts at a user message with real text and absorbs every
/// following message until the next such user message or end of input.
/// User-role lines carrying only `tool_result` blocks belong to the
/// assistant's response in flight and never open a turn of their own.
pub fn parse_transcript_content(content: &str) -> Vec<ParsedTurn> {
    // First pass: collect main-thread user/assistant messages.
    let mut messages: Vec<RawMessage<'_>> = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let value: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                debug!("Skipping malformed transcript line: {e}");
                continue;
            }
        };

        let entry_type = value.get("type").and_then(Value::as_str).unwrap_or("");
        if entry_type != "user" && entry_type != "assistant" {
            continue;
        }
        if value.get("isSidechain").and_then(Value::as_bool) == Some(true)
            || value.get("isMeta").and_then(Value::as_bool) == Some(true)
        {
            continue;
        }
        let Some(message) = value.get("message").filter(|m| m.is_object()) else {
            continue;
        };

        let role = message.get("role").and_then(Value::as_str).unwrap_or("");
        let msg_content = message.get("content").cloned().unwrap_or(Value::Null);
        let text = extract_text_content(&msg_content);

        let trimmed = text.trim();
        if COMMAND_PREFIXES.iter().any(|p| trimmed.starts_with(p)) {
            continue;
        }

        let has_tool_result = match &msg_content {
            Value::Array(blocks) => blocks
                .iter()
                .any(|b| b.get("type").and_then(Value::as_str) == Some("tool_result")),
            _ => false,
        };

        messages.push(RawMessage {
            role: if role == "user" { "user" } else { "assistant" },
            text,
            has_tool_result,
            tool_names: extract_tool_names(&msg_content),
            model: message
                .get("model")
                .and_then(Value::as_str)
                .filter(|m| !m.is_empty())
                .map(String::from),
            timestamp: value
                .get("timestamp")
                .and_then(Value::as_str)
                .and_then(parse_timestamp),
            line,
        });
    }

    // Second pass: group into turns.
    let mut turns: Vec<ParsedTurn> = Vec::new();
    let mut current: Option<TurnBuilder<'_>> = None;

    for msg in &messages {
        let opens_turn = msg.role == "user" && !msg.has_tool_result && !msg.text.trim().is_empty();
        if opens_turn {
            if let Some(turn) = current.take() {
                turns.push(turn.finish(turns.len()));
            }
            current = Some(TurnBuilder::start(msg));
        } else if let Some(turn) = current.as_mut() {
            turn.absorb(msg);
        }
        // Messages before the first real user message are dropped.
    }
    if let Some(turn) = current.take() {
        turns.push(turn.finish(turns.len()));
    }

    turns
}

/// Read and parse a transcript file.
///
/// # Errors
/// - `ParseError::NotFound` if the file doesn't exist
/// - `ParseError::PermissionDenied` / `ParseError::Io` for read failures
pub async fn parse_transcript(path: &Path) -> Result<Vec<ParsedTurn>, ParseError> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|e| ParseError::io(path, e))?;
    Ok(parse_transcript_content(&content))
}
