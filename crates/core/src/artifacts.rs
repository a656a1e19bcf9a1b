// crates/core/src/artifacts.rs
//! Tool side-effect extraction from a turn's raw JSONL.
//!
//! Walks tool_use / tool_result blocks and pulls out the things worth
//! persisting: files touched, commands run, errors hit, and typed artifact
//! rows for the per-turn artifact table.

use serde_json::Value;

/// Artifact values and error messages are clipped to this length.
pub const ARTIFACT_VALUE_MAX: usize = 500;

/// Preview length kept for `old_string` edit metadata.
const EDIT_PREVIEW_MAX: usize = 100;

/// One typed side effect of a turn.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    /// `file_read`, `file_write`, `file_edit`, `command`, or `tool_call`.
    pub artifact_type: String,
    pub artifact_value: String,
    pub artifact_metadata: Value,
}

/// Everything extracted from one turn's tool activity.
#[derive(Debug, Clone, Default)]
pub struct TurnArtifacts {
    pub files_read: Vec<String>,
    pub files_written: Vec<String>,
    pub files_edited: Vec<String>,
    pub commands_run: Vec<String>,
    pub errors_encountered: Vec<String>,
    pub tool_call_count: usize,
    pub artifacts: Vec<Artifact>,
}

impl TurnArtifacts {
    /// Union of read/written/edited paths, deduplicated, order preserved.
    pub fn files_touched(&self) -> Vec<String> {
        let mut touched: Vec<String> = Vec::new();
        for path in self
            .files_read
            .iter()
            .chain(self.files_written.iter())
            .chain(self.files_edited.iter())
        {
            if !touched.iter().any(|p| p == path) {
                touched.push(path.clone());
            }
        }
        touched
    }
}

fn clip(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        text.chars().take(max).collect()
    }
}

fn input_str<'a>(input: &'a Value, key: &str) -> Option<&'a str> {
    input.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn handle_tool_use(out: &mut TurnArtifacts, name: &str, input: &Value) {
    out.tool_call_count += 1;
    if !input.is_object() {
        return;
    }

    match name {
        "Read" => {
            if let Some(path) = input_str(input, "file_path") {
                out.files_read.push(path.to_string());
                out.artifacts.push(Artifact {
                    artifact_type: "file_read".to_string(),
                    artifact_value: clip(path, ARTIFACT_VALUE_MAX),
                    artifact_metadata: Value::Object(Default::default()),
                });
            }
        }
        "Glob" => {
            if let Some(pattern) = input_str(input, "pattern") {
                out.artifacts.push(Artifact {
                    artifact_type: "file_read".to_string(),
                    artifact_value: clip(pattern, ARTIFACT_VALUE_MAX),
                    artifact_metadata: Value::Object(Default::default()),
                });
            }
        }
        "Grep" => {
            if let Some(pattern) = input_str(input, "pattern") {
                let value = input_str(input, "path").unwrap_or(pattern);
                out.artifacts.push(Artifact {
                    artifact_type: "file_read".to_string(),
                    artifact_value: clip(value, ARTIFACT_VALUE_MAX),
                    artifact_metadata: serde_json::json!({"pattern": pattern}),
                });
            }
        }
        "Write" => {
            if let Some(path) = input_str(input, "file_path") {
                out.files_written.push(path.to_string());
                out.artifacts.push(Artifact {
                    artifact_type: "file_write".to_string(),
                    artifact_value: clip(path, ARTIFACT_VALUE_MAX),
                    artifact_metadata: Value::Object(Default::default()),
                });
            }
        }
        "Edit" => {
            if let Some(path) = input_str(input, "file_path") {
                out.files_edited.push(path.to_string());
                let old = input_str(input, "old_string").unwrap_or("");
                out.artifacts.push(Artifact {
                    artifact_type: "file_edit".to_string(),
                    artifact_value: clip(path, ARTIFACT_VALUE_MAX),
                    artifact_metadata: serde_json::json!({
                        "old_string": clip(old, EDIT_PREVIEW_MAX),
                    }),
                });
            }
        }
        "NotebookEdit" => {
            if let Some(path) = input_str(input, "notebook_path") {
                out.files_edited.push(path.to_string());
                out.artifacts.push(Artifact {
                    artifact_type: "file_edit".to_string(),
                    artifact_value: clip(path, ARTIFACT_VALUE_MAX),
                    artifact_metadata: Value::Object(Default::default()),
                });
            }
        }
        "Bash" => {
            if let Some(command) = input_str(input, "command") {
                let clipped = clip(command, ARTIFACT_VALUE_MAX);
                out.commands_run.push(clipped.clone());
                out.artifacts.push(Artifact {
                    artifact_type: "command".to_string(),
                    artifact_value: clipped,
                    artifact_metadata: Value::Object(Default::default()),
                });
            }
        }
        _ => {
            // Generic tools: keep the name, plus a prompt/description preview
            // when one exists.
            let preview = input_str(input, "prompt").or_else(|| input_str(input, "description"));
            let value = match preview {
                Some(p) => format!("{name}: {}", clip(p, EDIT_PREVIEW_MAX)),
                None => name.to_string(),
            };
            out.artifacts.push(Artifact {
                artifact_type: "tool_call".to_string(),
                artifact_value: clip(&value, ARTIFACT_VALUE_MAX),
                artifact_metadata: Value::Object(Default::default()),
            });
        }
    }
}

fn tool_result_text(content: &Value) -> String {
    match content {
        Value::String(s) => s.clone(),
        Value::Array(blocks) => blocks
            .iter()
            .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
            .filter_map(|b| b.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}

/// Extract tool side effects from a turn's raw JSONL lines.
///
/// Tolerates unparseable lines, missing `message` keys, and non-list
/// content; a malformed block never aborts the scan.
pub fn extract_artifacts(raw_jsonl: &str) -> TurnArtifacts {
    let mut out = TurnArtifacts::default();

    for line in raw_jsonl.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Ok(value) = serde_json::from_str::<Value>(line) else {
            continue;
        };
        let Some(Value::Array(blocks)) = value.get("message").and_then(|m| m.get("content")) else {
            continue;
        };

        for block in blocks {
            match block.get("type").and_then(Value::as_str) {
                Some("tool_use") => {
                    let name = block.get("name").and_then(Value::as_str).unwrap_or("");
                    let input = block.get("input").cloned().unwrap_or(Value::Null);
                    if !name.is_empty() {
                        handle_tool_use(&mut out, name, &input);
                    }
                }
                Some("tool_result") => {
                    if block.get("is_error").and_then(Value::as_bool) == Some(true) {
                        let text =
                            tool_result_text(block.get("content").unwrap_or(&Value::Null));
                        if !text.trim().is_empty() {
                            out.errors_encountered.push(clip(&text, ARTIFACT_VALUE_MAX));
                        }
                    }
                }
                _ => {}
            }
        }
    }

    out
}

/// Pull path-shaped tokens (multi-segment, extension-bearing) out of free
/// text, deduplicated in order of appearance.
pub fn extract_file_paths_from_text(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    let re = regex_lite::Regex::new(
        r"/?[A-Za-z0-9_\-.]+(?:/[A-Za-z0-9_\-.]+)*/[A-Za-z0-9_\-.]+\.[A-Za-z0-9]{1,8}",
    )
    .expect("path regex is valid");

    let mut paths: Vec<String> = Vec::new();
    for m in re.find_iter(text) {
        let p = m.as_str().to_string();
        if !paths.iter().any(|x| x == &p) {
            paths.push(p);
        }
    }
    paths
}
