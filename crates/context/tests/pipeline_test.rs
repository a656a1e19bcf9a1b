//! End-to-end pipeline test: record hook → worker → prompt hook.
//!
//! Drives the whole loop the way production does: the per-turn hook
//! enqueues, the worker records and enriches, the prompt hook classifies,
//! retrieves, and formats.

use recap_context::{build_prompt_context, run_record_hook, ContextRetriever, PromptHookInput, RecordHookInput};
use recap_core::formatter::CONTEXT_HEADER;
use recap_db::Database;
use recap_worker::{DisabledSummarizer, Worker};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

fn write_transcript(dir: &std::path::Path, turns: &[(&str, &str)]) -> PathBuf {
    let path = dir.join("session.jsonl");
    let mut lines = Vec::new();
    for (i, (user, assistant)) in turns.iter().enumerate() {
        lines.push(
            json!({
                "type": "user",
                "message": {"role": "user", "content": user},
                "timestamp": format!("2026-02-11T10:{i:02}:00Z"),
            })
            .to_string(),
        );
        lines.push(
            json!({
                "type": "assistant",
                "message": {
                    "role": "assistant",
                    "content": [{"type": "text", "text": assistant}],
                    "model": "claude-opus-4-6",
                },
                "timestamp": format!("2026-02-11T10:{i:02}:30Z"),
            })
            .to_string(),
        );
    }
    // Noise the parser must ignore.
    lines.push(
        json!({
            "type": "assistant",
            "isSidechain": true,
            "message": {"role": "assistant", "content": "subagent internal"},
            "timestamp": "2026-02-11T11:00:00Z",
        })
        .to_string(),
    );
    std::fs::write(&path, lines.join("\n")).unwrap();
    path
}

#[tokio::test]
async fn test_full_pipeline_record_process_retrieve_format() {
    let db = Database::new_in_memory().await.unwrap();
    let worker = Worker::new(db.clone(), Arc::new(DisabledSummarizer));
    db.insert_project("focus", "Focus").await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = write_transcript(
        dir.path(),
        &[
            ("List the modules in the focus project", "It has queue, recorder, and retriever modules."),
            ("Fix the bug in the retry logic", "Found it — the lease expiry check was inverted. Fixed."),
        ],
    );

    // 1. Record hook fires once per assistant turn.
    let input = RecordHookInput {
        session_id: "e2e-session".to_string(),
        transcript_path: path.to_str().unwrap().to_string(),
        cwd: "/home/user/focus".to_string(),
    };
    assert!(run_record_hook(&db, &input).await);
    // A second fire with the unchanged file is suppressed by the dedupe key.
    assert!(!run_record_hook(&db, &input).await);

    // 2. Worker drains the queue: session_process plus its fan-out.
    let processed = worker.process_pending_jobs(20).await.unwrap();
    assert_eq!(processed, 5);

    let session = db.get_agent_session("e2e-session").await.unwrap().unwrap();
    assert_eq!(session.turn_count, 2);
    assert!(session.is_processed);
    assert!(session.project_id.is_some(), "workspace tail matched the project");

    // Summaries were filled in by the turn_summary jobs.
    let turn_ids = db.list_turn_ids(&session.id).await.unwrap();
    for turn_id in &turn_ids {
        let turn = db.get_turn(turn_id).await.unwrap().unwrap();
        assert!(turn.turn_title.is_some());
    }

    // Entity extraction linked the project mention.
    let entities = db.list_turn_entities(&turn_ids[0]).await.unwrap();
    assert!(entities.iter().any(|e| e.0 == "project"));

    // 3. Prompt hook: classify → retrieve → format.
    let prompt = PromptHookInput {
        prompt: "what happened with the retry logic in focus?".to_string(),
        session_id: "next-session".to_string(),
        cwd: "/home/user/focus".to_string(),
    };
    let retriever = ContextRetriever::with_skills_dir(dir.path().join("no-skills"));
    let context = build_prompt_context(&db, &retriever, &prompt, 2000)
        .await
        .expect("context should be injected");

    assert!(context.starts_with(CONTEXT_HEADER));
    assert!(context.contains("[Conv]"));
    assert!(context.contains("retry logic"));
}

#[tokio::test]
async fn test_prompt_hook_injects_nothing_without_signal() {
    let db = Database::new_in_memory().await.unwrap();

    let prompt = PromptHookInput {
        prompt: "hi".to_string(),
        session_id: "s".to_string(),
        cwd: String::new(),
    };
    let retriever = ContextRetriever::with_skills_dir("/nonexistent/skills");
    assert!(build_prompt_context(&db, &retriever, &prompt, 2000).await.is_none());
}

#[tokio::test]
async fn test_prompt_hook_empty_store_injects_nothing() {
    let db = Database::new_in_memory().await.unwrap();

    let prompt = PromptHookInput {
        prompt: "fix the bug in the worker".to_string(),
        session_id: "s".to_string(),
        cwd: "/home/user/empty-project".to_string(),
    };
    let retriever = ContextRetriever::with_skills_dir("/nonexistent/skills");
    assert!(build_prompt_context(&db, &retriever, &prompt, 2000).await.is_none());
}

#[tokio::test]
async fn test_record_hook_incomplete_input_is_noop() {
    let db = Database::new_in_memory().await.unwrap();
    let input = RecordHookInput {
        session_id: String::new(),
        transcript_path: String::new(),
        cwd: String::new(),
    };
    assert!(!run_record_hook(&db, &input).await);
}
