// crates/worker/src/lib.rs
//! Background worker: claims jobs from the queue, routes them by kind to
//! handlers, and converts handler failures into queue state.

mod dispatch;
mod handlers;
pub mod summarize;

pub use dispatch::{Worker, WorkerError};
pub use handlers::{ENTITY_EXTRACT_PRIORITY, TURN_SUMMARY_PRIORITY};
pub use summarize::{
    DisabledSummarizer, HttpSummarizer, SummarizeError, Summarizer, TURN_TITLE_MAX,
};
