// crates/cli/src/main.rs
//! `recap` binary: hook entry points, the worker loop, queue stats, and
//! conversation search. Thin wiring only; all behavior lives in the
//! library crates.

mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use recap_context::{
    build_prompt_context, run_record_hook, ContextRetriever, HookOutput, PromptHookInput,
    RecordHookInput,
};
use recap_core::formatter::DEFAULT_MAX_TOKENS;
use recap_db::Database;
use recap_worker::Worker;
use std::io::Read;
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "recap", version, about = "Session capture and context injection for coding agents")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Hook entry points (read JSON from stdin, always exit 0).
    Hook {
        #[command(subcommand)]
        hook: HookCommand,
    },
    /// Claim and process pending jobs.
    Worker {
        /// Jobs to process per poll cycle.
        #[arg(long, default_value_t = 25)]
        max_jobs: usize,
        /// Run one poll cycle and exit.
        #[arg(long)]
        once: bool,
        /// Seconds to sleep between empty polls.
        #[arg(long, default_value_t = 15)]
        interval: u64,
    },
    /// Job queue status counts.
    Stats,
    /// Search recorded conversation turns.
    Search {
        query: String,
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },
}

#[derive(Subcommand)]
enum HookCommand {
    /// Per-turn transcript recording (Stop hook).
    Record,
    /// Prompt context injection (UserPromptSubmit hook).
    Context,
}

async fn open_db() -> Result<Database> {
    let path = config::db_path().ok_or_else(|| anyhow::anyhow!("no database path available"))?;
    Ok(Database::new(&path).await?)
}

fn read_stdin() -> String {
    let mut buffer = String::new();
    let _ = std::io::stdin().read_to_string(&mut buffer);
    buffer
}

/// Both hooks swallow everything: bad input, missing DB, internal errors.
/// A hook that crashes or blocks its host is worse than a hook that skips
/// one recording.
async fn hook_record() {
    let Ok(input) = serde_json::from_str::<RecordHookInput>(&read_stdin()) else {
        return;
    };
    let Ok(db) = open_db().await else {
        debug!("database unavailable; skipping recording");
        return;
    };
    let created = run_record_hook(&db, &input).await;
    debug!(created, session_id = %input.session_id, "record hook done");
}

async fn hook_context() {
    let Ok(input) = serde_json::from_str::<PromptHookInput>(&read_stdin()) else {
        return;
    };
    let Ok(db) = open_db().await else {
        return;
    };
    let retriever = match config::skills_dir() {
        Some(dir) => ContextRetriever::with_skills_dir(dir),
        None => ContextRetriever::new(),
    };
    if let Some(context) = build_prompt_context(&db, &retriever, &input, DEFAULT_MAX_TOKENS).await {
        let output = HookOutput::user_prompt_submit(context);
        if let Ok(json) = serde_json::to_string(&output) {
            println!("{json}");
        }
    }
}

async fn run_worker(max_jobs: usize, once: bool, interval: u64) -> Result<()> {
    let db = open_db().await?;
    let worker = Worker::new(db, config::summarizer());

    loop {
        let processed = worker.process_pending_jobs(max_jobs).await?;
        if processed > 0 {
            info!(processed, "worker cycle complete");
        }
        if once {
            return Ok(());
        }
        if processed == 0 {
            tokio::time::sleep(Duration::from_secs(interval)).await;
        }
    }
}

async fn print_stats() -> Result<()> {
    let db = open_db().await?;
    let stats = db.job_stats().await?;
    if stats.is_empty() {
        println!("queue is empty");
        return Ok(());
    }
    let mut statuses: Vec<_> = stats.iter().collect();
    statuses.sort();
    for (status, count) in statuses {
        println!("{status:>12}  {count}");
    }
    Ok(())
}

async fn run_search(query: &str, limit: i64) -> Result<()> {
    let db = open_db().await?;
    let hits = db.search_turns(query, limit).await?;
    if hits.is_empty() {
        println!("no matching turns");
        return Ok(());
    }
    for hit in hits {
        let title = hit
            .turn_title
            .or(hit.user_message)
            .unwrap_or_else(|| "(untitled turn)".to_string());
        let when = hit
            .started_at
            .and_then(|ms| chrono::DateTime::from_timestamp_millis(ms))
            .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "unknown".to_string());
        println!("{when}  [{}]  {title}", hit.session_id);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("recap=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Hook { hook } => {
            // Hooks never fail their host process.
            match hook {
                HookCommand::Record => hook_record().await,
                HookCommand::Context => hook_context().await,
            }
            Ok(())
        }
        Command::Worker {
            max_jobs,
            once,
            interval,
        } => run_worker(max_jobs, once, interval).await,
        Command::Stats => print_stats().await,
        Command::Search { query, limit } => run_search(&query, limit).await,
    }
}
