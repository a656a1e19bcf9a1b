// crates/db/src/queries/mod.rs
// Query surface grouped by concern: session/turn persistence for the
// recorder and worker, entity lookups, retrieval candidates, and search.

pub mod entities;
pub mod retrieval;
pub mod search;
pub mod sessions;
