// crates/context/src/lib.rs
//! Context retrieval and the hook-facing entry points of the pipeline.

pub mod hooks;
pub mod retriever;

pub use hooks::{build_prompt_context, run_record_hook, HookOutput, PromptHookInput, RecordHookInput};
pub use retriever::{relative_time, ContextRetriever, MIN_RETRIEVAL_CONFIDENCE};
