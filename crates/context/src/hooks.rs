// crates/context/src/hooks.rs
//! Hook-facing entry points.
//!
//! Both hooks are best-effort fire-and-forget: they must return quickly and
//! never propagate a failure into the host process. Anything that goes
//! wrong is logged and degrades to "inject nothing" / "record nothing".

use crate::retriever::ContextRetriever;
use recap_core::classifier::PromptClassifier;
use recap_core::formatter::format_context_blocks;
use recap_db::Database;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Stdin payload of the per-turn record hook.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordHookInput {
    pub session_id: String,
    #[serde(default)]
    pub transcript_path: String,
    #[serde(default)]
    pub cwd: String,
}

/// Stdin payload of the prompt-submission hook.
#[derive(Debug, Clone, Deserialize)]
pub struct PromptHookInput {
    pub prompt: String,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub cwd: String,
}

/// Stdout payload understood by the prompt-hook host.
#[derive(Debug, Serialize)]
pub struct HookOutput {
    #[serde(rename = "hookSpecificOutput")]
    pub hook_specific_output: HookSpecificOutput,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HookSpecificOutput {
    pub hook_event_name: String,
    pub additional_context: String,
}

impl HookOutput {
    pub fn user_prompt_submit(additional_context: String) -> Self {
        Self {
            hook_specific_output: HookSpecificOutput {
                hook_event_name: "UserPromptSubmit".to_string(),
                additional_context,
            },
        }
    }
}

/// Record-hook body: enqueue a `session_process` job for the transcript.
/// Returns whether a job was created; never errors.
pub async fn run_record_hook(db: &Database, input: &RecordHookInput) -> bool {
    if input.session_id.is_empty() || input.transcript_path.is_empty() {
        debug!("record hook input incomplete; ignoring");
        return false;
    }
    db.enqueue_recording(&input.session_id, &input.transcript_path, &input.cwd)
        .await
}

/// Prompt-hook body: classify → retrieve → format. `None` means inject
/// nothing (no signal, no matching context, or an internal error).
pub async fn build_prompt_context(
    db: &Database,
    retriever: &ContextRetriever,
    input: &PromptHookInput,
    max_tokens: usize,
) -> Option<String> {
    let snapshot = match db.load_entity_snapshot().await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            warn!(error = %e, "entity snapshot unavailable; injecting nothing");
            return None;
        }
    };

    let classifier = PromptClassifier::new(snapshot);
    let cwd = (!input.cwd.is_empty()).then_some(input.cwd.as_str());
    let classification = classifier.classify(&input.prompt, cwd);

    let blocks = match retriever.retrieve(db, &classification).await {
        Ok(blocks) => blocks,
        Err(e) => {
            warn!(error = %e, "context retrieval failed; injecting nothing");
            return None;
        }
    };
    if blocks.is_empty() {
        return None;
    }

    let rendered = format_context_blocks(&blocks, max_tokens);
    (!rendered.is_empty()).then_some(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hook_output_shape() {
        let out = HookOutput::user_prompt_submit("## Recap Context".to_string());
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(
            json["hookSpecificOutput"]["hookEventName"],
            "UserPromptSubmit"
        );
        assert_eq!(
            json["hookSpecificOutput"]["additionalContext"],
            "## Recap Context"
        );
    }

    #[test]
    fn test_hook_inputs_tolerate_missing_fields() {
        let record: RecordHookInput =
            serde_json::from_str(r#"{"session_id": "s1"}"#).unwrap();
        assert_eq!(record.session_id, "s1");
        assert!(record.transcript_path.is_empty());

        let prompt: PromptHookInput = serde_json::from_str(r#"{"prompt": "hi"}"#).unwrap();
        assert_eq!(prompt.prompt, "hi");
        assert!(prompt.cwd.is_empty());
    }
}
