// crates/core/src/formatter.rs
//! Token-budgeted rendering of ranked context blocks into one markdown
//! string for prompt injection.

/// Fixed chars-per-token heuristic used for budgeting. Not a real
/// tokenizer; downstream budgets depend on this exact value.
pub const CHARS_PER_TOKEN: usize = 4;

/// Default injection budget when the caller doesn't supply one.
pub const DEFAULT_MAX_TOKENS: usize = 2000;

/// Header line of every injected context block.
pub const CONTEXT_HEADER: &str = "## Recap Context";

/// A transient, scored unit of retrievable information. Assembled by the
/// retriever, consumed by the formatter, never persisted.
#[derive(Debug, Clone)]
pub struct ContextBlock {
    /// `conversation`, `task`, `email`, `commitment`, `sprint`, `skill`, ...
    pub source_type: String,
    /// Dedup identity across sources.
    pub source_id: String,
    pub title: String,
    pub content: String,
    /// Relevance in [0, 1]; higher renders first.
    pub relevance_score: f32,
}

impl ContextBlock {
    pub fn new(
        source_type: impl Into<String>,
        source_id: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
        relevance_score: f32,
    ) -> Self {
        Self {
            source_type: source_type.into(),
            source_id: source_id.into(),
            title: title.into(),
            content: content.into(),
            relevance_score,
        }
    }

    pub fn token_estimate(&self) -> usize {
        estimate_tokens(&self.content)
    }
}

/// `max(1, len / 4)`: cheap, deterministic, good enough for budgeting.
pub fn estimate_tokens(text: &str) -> usize {
    (text.len() / CHARS_PER_TOKEN).max(1)
}

fn source_label(source_type: &str) -> String {
    match source_type {
        "conversation" => "[Conv]".to_string(),
        "task" => "[Task]".to_string(),
        "email" => "[Email]".to_string(),
        "commitment" => "[Commitment]".to_string(),
        "sprint" => "[Sprint]".to_string(),
        "skill" => "[Skill]".to_string(),
        other => {
            // Title_Case the unrecognized tag, underscores kept.
            let cased: Vec<String> = other
                .split('_')
                .map(|word| {
                    let mut chars = word.chars();
                    match chars.next() {
                        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                        None => String::new(),
                    }
                })
                .collect();
            format!("[{}]", cased.join("_"))
        }
    }
}

/// Render one block as a labeled line.
pub fn format_single_block(block: &ContextBlock) -> String {
    let label = source_label(&block.source_type);
    if block.title.is_empty() {
        format!("- {} {}", label, block.content)
    } else {
        format!("- {} {}: {}", label, block.title, block.content)
    }
}

/// Render ranked blocks under the fixed header, consuming the token budget
/// in relevance order. Stops before the block that would exceed
/// `max_tokens` and appends one overflow line naming how many blocks were
/// left out; no overflow line when everything fits. Empty input → empty
/// string.
pub fn format_context_blocks(blocks: &[ContextBlock], max_tokens: usize) -> String {
    if blocks.is_empty() {
        return String::new();
    }

    let mut ranked: Vec<&ContextBlock> = blocks.iter().collect();
    ranked.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));

    let mut out = format!("{CONTEXT_HEADER}\n\n");
    let mut used = estimate_tokens(&out);
    let mut included = 0usize;

    for block in &ranked {
        let line = format_single_block(block);
        let cost = estimate_tokens(&line);
        if used + cost > max_tokens {
            break;
        }
        out.push_str(&line);
        out.push('\n');
        used += cost;
        included += 1;
    }

    let omitted = ranked.len() - included;
    if omitted > 0 {
        out.push_str(&format!(
            "\n*(+{omitted} more — run `recap search` to see older context)*\n"
        ));
    }
    out
}
