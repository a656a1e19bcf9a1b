/// Inline SQL migrations for the recap database schema.
///
/// Simple inline migrations rather than sqlx migration files: the schema is
/// small and self-contained. All INTEGER time columns are unix milliseconds.
pub const MIGRATIONS: &[&str] = &[
    // Migration 1: jobs table
    r#"
CREATE TABLE IF NOT EXISTS jobs (
    id            TEXT PRIMARY KEY,
    kind          TEXT NOT NULL,
    dedupe_key    TEXT,
    payload       TEXT NOT NULL DEFAULT '{}',
    status        TEXT NOT NULL DEFAULT 'queued'
                  CHECK (status IN ('queued', 'processing', 'retry', 'done', 'failed')),
    priority      INTEGER NOT NULL DEFAULT 10,
    attempts      INTEGER NOT NULL DEFAULT 0,
    max_attempts  INTEGER NOT NULL DEFAULT 10,
    locked_until  INTEGER,
    error_message TEXT,
    created_at    INTEGER NOT NULL,
    updated_at    INTEGER NOT NULL
);
"#,
    // Migration 2: at most one non-terminal job per dedupe key.
    // Terminal (done/failed) jobs fall out of the index, so finished work
    // never blocks a re-enqueue.
    r#"
CREATE UNIQUE INDEX IF NOT EXISTS idx_jobs_dedupe_active
    ON jobs(dedupe_key)
    WHERE dedupe_key IS NOT NULL AND status IN ('queued', 'processing', 'retry');
"#,
    r#"
CREATE INDEX IF NOT EXISTS idx_jobs_claimable
    ON jobs(priority, created_at)
    WHERE status IN ('queued', 'retry');
"#,
    r#"
CREATE INDEX IF NOT EXISTS idx_jobs_locked
    ON jobs(locked_until)
    WHERE status = 'processing';
"#,
    // Migration 5: agent_sessions
    r#"
CREATE TABLE IF NOT EXISTS agent_sessions (
    id               TEXT PRIMARY KEY,
    session_id       TEXT NOT NULL UNIQUE,
    transcript_path  TEXT,
    workspace_path   TEXT,
    session_title    TEXT,
    session_summary  TEXT,
    started_at       INTEGER,
    last_activity_at INTEGER,
    project_id       TEXT,
    turn_count       INTEGER NOT NULL DEFAULT 0,
    is_processed     INTEGER NOT NULL DEFAULT 0,
    created_at       INTEGER NOT NULL,
    updated_at       INTEGER NOT NULL
);
"#,
    r#"CREATE INDEX IF NOT EXISTS idx_agent_sessions_workspace ON agent_sessions(workspace_path);"#,
    r#"CREATE INDEX IF NOT EXISTS idx_agent_sessions_project ON agent_sessions(project_id);"#,
    // Migration 8: agent_turns
    r#"
CREATE TABLE IF NOT EXISTS agent_turns (
    id                TEXT PRIMARY KEY,
    session_id        TEXT NOT NULL REFERENCES agent_sessions(id) ON DELETE CASCADE,
    turn_number       INTEGER NOT NULL,
    user_message      TEXT,
    assistant_summary TEXT,
    turn_title        TEXT,
    content_hash      TEXT NOT NULL,
    model_name        TEXT,
    tool_names        TEXT NOT NULL DEFAULT '[]',
    started_at        INTEGER,
    ended_at          INTEGER,
    created_at        INTEGER NOT NULL,
    UNIQUE (session_id, turn_number)
);
"#,
    r#"CREATE INDEX IF NOT EXISTS idx_agent_turns_session ON agent_turns(session_id);"#,
    r#"CREATE INDEX IF NOT EXISTS idx_agent_turns_hash ON agent_turns(content_hash);"#,
    r#"CREATE INDEX IF NOT EXISTS idx_agent_turns_started ON agent_turns(started_at);"#,
    // Migration 12: agent_turn_content (1:1 with a turn)
    r#"
CREATE TABLE IF NOT EXISTS agent_turn_content (
    id                 TEXT PRIMARY KEY,
    turn_id            TEXT NOT NULL UNIQUE REFERENCES agent_turns(id) ON DELETE CASCADE,
    raw_jsonl          TEXT NOT NULL,
    assistant_text     TEXT,
    content_size       INTEGER,
    files_touched      TEXT NOT NULL DEFAULT '[]',
    commands_run       TEXT NOT NULL DEFAULT '[]',
    errors_encountered TEXT NOT NULL DEFAULT '[]',
    tool_call_count    INTEGER,
    created_at         INTEGER NOT NULL
);
"#,
    // Migration 13: agent_turn_entities
    r#"
CREATE TABLE IF NOT EXISTS agent_turn_entities (
    id          TEXT PRIMARY KEY,
    turn_id     TEXT NOT NULL REFERENCES agent_turns(id) ON DELETE CASCADE,
    entity_type TEXT NOT NULL,
    entity_id   TEXT,
    entity_name TEXT,
    confidence  REAL NOT NULL DEFAULT 1.0,
    created_at  INTEGER NOT NULL
);
"#,
    r#"CREATE INDEX IF NOT EXISTS idx_turn_entities_turn ON agent_turn_entities(turn_id);"#,
    r#"CREATE INDEX IF NOT EXISTS idx_turn_entities_entity ON agent_turn_entities(entity_type, entity_id);"#,
    // Migration 16: agent_turn_artifacts
    r#"
CREATE TABLE IF NOT EXISTS agent_turn_artifacts (
    id                TEXT PRIMARY KEY,
    turn_id           TEXT NOT NULL REFERENCES agent_turns(id) ON DELETE CASCADE,
    artifact_type     TEXT NOT NULL,
    artifact_value    TEXT NOT NULL,
    artifact_metadata TEXT NOT NULL DEFAULT '{}',
    created_at        INTEGER NOT NULL
);
"#,
    r#"CREATE INDEX IF NOT EXISTS idx_turn_artifacts_turn ON agent_turn_artifacts(turn_id);"#,
    r#"CREATE INDEX IF NOT EXISTS idx_turn_artifacts_type ON agent_turn_artifacts(artifact_type);"#,
    // Migration 19: collaborator-owned read models. Populated by external
    // ingestion in production; the retriever and entity extraction only
    // ever read them.
    r#"
CREATE TABLE IF NOT EXISTS projects (
    id          TEXT PRIMARY KEY,
    slug        TEXT NOT NULL UNIQUE,
    name        TEXT NOT NULL,
    status      TEXT NOT NULL DEFAULT 'active',
    description TEXT,
    created_at  INTEGER NOT NULL
);
"#,
    r#"
CREATE TABLE IF NOT EXISTS people (
    id         TEXT PRIMARY KEY,
    name       TEXT NOT NULL,
    email      TEXT,
    created_at INTEGER NOT NULL
);
"#,
    r#"
CREATE TABLE IF NOT EXISTS tasks (
    id          TEXT PRIMARY KEY,
    project_id  TEXT REFERENCES projects(id) ON DELETE SET NULL,
    title       TEXT NOT NULL,
    description TEXT,
    status      TEXT NOT NULL DEFAULT 'backlog'
                CHECK (status IN ('backlog', 'in_progress', 'waiting', 'done')),
    priority    TEXT NOT NULL DEFAULT 'normal'
                CHECK (priority IN ('urgent', 'high', 'normal', 'low')),
    due_date    TEXT,
    created_at  INTEGER NOT NULL
);
"#,
    r#"CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);"#,
    r#"
CREATE TABLE IF NOT EXISTS commitments (
    id          TEXT PRIMARY KEY,
    person_id   TEXT REFERENCES people(id) ON DELETE SET NULL,
    project_id  TEXT REFERENCES projects(id) ON DELETE SET NULL,
    direction   TEXT NOT NULL CHECK (direction IN ('from_me', 'to_me')),
    description TEXT NOT NULL,
    deadline    TEXT,
    status      TEXT NOT NULL DEFAULT 'open'
                CHECK (status IN ('open', 'fulfilled', 'broken', 'cancelled')),
    created_at  INTEGER NOT NULL
);
"#,
    r#"CREATE INDEX IF NOT EXISTS idx_commitments_status ON commitments(status);"#,
    r#"
CREATE TABLE IF NOT EXISTS sprints (
    id         TEXT PRIMARY KEY,
    name       TEXT NOT NULL,
    project_id TEXT REFERENCES projects(id) ON DELETE CASCADE,
    starts_at  INTEGER NOT NULL,
    ends_at    INTEGER NOT NULL,
    is_active  INTEGER NOT NULL DEFAULT 1,
    created_at INTEGER NOT NULL
);
"#,
    r#"CREATE INDEX IF NOT EXISTS idx_sprints_dates ON sprints(starts_at, ends_at);"#,
];
