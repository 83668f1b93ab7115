//! SQL migration definitions for the TransFit database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "Initial schema: transfit_research, exercises, staging_exercisedb",
            sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Research literature, populated by the ingestion process
CREATE TABLE IF NOT EXISTS transfit_research (
    id        INTEGER PRIMARY KEY,
    title     TEXT,
    takeaways TEXT,
    summary   TEXT,
    year      INTEGER,
    journal   TEXT,
    doi       TEXT,
    relevant  INTEGER NOT NULL DEFAULT 0,
    topics    TEXT,
    processed INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_research_relevant ON transfit_research(relevant);

-- Exercise catalog
CREATE TABLE IF NOT EXISTS exercises (
    id                INTEGER PRIMARY KEY,
    slug              TEXT NOT NULL UNIQUE,
    name              TEXT NOT NULL,
    pattern           TEXT,
    goal              TEXT,
    difficulty        TEXT,
    equipment         TEXT NOT NULL DEFAULT '[]',
    binder_aware      INTEGER,
    pelvic_floor_safe INTEGER
);

-- Third-party exercise metadata, joined to exercises by slug
CREATE TABLE IF NOT EXISTS staging_exercisedb (
    slug           TEXT PRIMARY KEY,
    body_parts     TEXT,
    exercise_type  TEXT,
    target_muscles TEXT
);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
        },
        Migration {
            version: 2,
            description: "Generated tips with one row per (exercise, population, context)",
            sql: r#"
CREATE TABLE IF NOT EXISTS exercise_trans_tips (
    id            TEXT PRIMARY KEY,
    exercise_id   INTEGER NOT NULL REFERENCES exercises(id),
    population    TEXT NOT NULL,
    context       TEXT NOT NULL,
    tips_json     TEXT NOT NULL,
    source_dois   TEXT NOT NULL DEFAULT '[]',
    needs_review  INTEGER NOT NULL DEFAULT 1,
    model_id      TEXT,
    evidence_hash TEXT,
    created_at    TEXT NOT NULL,
    UNIQUE(exercise_id, population, context)
);

CREATE INDEX IF NOT EXISTS idx_tips_exercise ON exercise_trans_tips(exercise_id);

INSERT INTO schema_migrations (version) VALUES (2);
"#,
        },
    ]
}
