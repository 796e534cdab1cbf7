//! SQL schema for the bursa SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS subjects (
    code         TEXT PRIMARY KEY,   -- opaque portal-assigned code
    name         TEXT NOT NULL,
    sector       TEXT NOT NULL,
    profile_url  TEXT NOT NULL,
    processed    INTEGER NOT NULL DEFAULT 0,
    last_scanned TEXT                -- ISO 8601 UTC or NULL
);

-- Document records are strictly append-only.
-- No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS documents (
    record_id     INTEGER PRIMARY KEY AUTOINCREMENT,
    subject_code  TEXT NOT NULL REFERENCES subjects(code),
    logical_name  TEXT NOT NULL,
    physical_name TEXT,
    origin_url    TEXT NOT NULL,
    downloaded    INTEGER NOT NULL,
    attempted_at  TEXT NOT NULL,     -- ISO 8601 UTC; store-assigned
    digest        TEXT,              -- lowercase hex sha-256 or NULL
    state         TEXT NOT NULL      -- 'new' | 'updated' | 'unchanged' | 'error'
);

-- Token-keyed ingestion ledger; append-only like documents.
CREATE TABLE IF NOT EXISTS token_records (
    record_id     INTEGER PRIMARY KEY AUTOINCREMENT,
    entity        TEXT NOT NULL,
    source_date   TEXT NOT NULL,
    reference     TEXT NOT NULL,
    token         TEXT NOT NULL UNIQUE,
    file_name     TEXT NOT NULL,
    downloaded    INTEGER NOT NULL,
    registered_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS documents_subject_idx
    ON documents(subject_code);
CREATE INDEX IF NOT EXISTS documents_slot_idx
    ON documents(subject_code, logical_name, attempted_at);

PRAGMA user_version = 1;
";
