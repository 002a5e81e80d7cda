//! SQL schema for the DJE SQLite store.
//!
//! Executed once at connection startup. The constraints here back the engine
//! checks: a second publication with the same process number, a second
//! execution for the same day, or a second `running` execution are refused by
//! SQLite itself.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS scraper_executions (
    id                      INTEGER PRIMARY KEY AUTOINCREMENT,
    execution_date          TEXT    NOT NULL UNIQUE,   -- YYYY-MM-DD
    status                  TEXT    NOT NULL
                            CHECK (status IN ('running', 'completed', 'failed',
                                              'partial', 'timeout', 'maintenance')),
    start_time              TEXT    NOT NULL,          -- RFC 3339 UTC
    end_time                TEXT,
    publications_found      INTEGER NOT NULL DEFAULT 0 CHECK (publications_found >= 0),
    publications_new        INTEGER NOT NULL DEFAULT 0
                            CHECK (publications_new BETWEEN 0 AND publications_found),
    publications_duplicated INTEGER NOT NULL DEFAULT 0
                            CHECK (publications_duplicated = publications_found - publications_new),
    error_message           TEXT,
    dje_url                 TEXT,
    host_name               TEXT,
    executed_by             TEXT,
    environment             TEXT    NOT NULL DEFAULT 'production',
    created_at              TEXT    NOT NULL,
    CHECK (end_time IS NULL OR end_time >= start_time)
);

-- At most one execution may be running at a time.
CREATE UNIQUE INDEX IF NOT EXISTS scraper_executions_one_running
    ON scraper_executions(status) WHERE status = 'running';

CREATE TABLE IF NOT EXISTS publications (
    id                   INTEGER PRIMARY KEY AUTOINCREMENT,
    process_number       TEXT    NOT NULL UNIQUE,
    publication_date     TEXT,
    availability_date    TEXT,
    authors              TEXT    NOT NULL DEFAULT '[]',   -- JSON array
    lawyers              TEXT    NOT NULL DEFAULT '[]',   -- JSON array
    defendant            TEXT    NOT NULL,
    main_value           TEXT,                            -- decimal as text
    interest_value       TEXT,
    legal_fees           TEXT,
    full_content         TEXT,
    status               TEXT    NOT NULL DEFAULT 'nova'
                         CHECK (status IN ('nova', 'lida', 'enviada_adv', 'concluida')),
    content_hash         TEXT,
    source_url           TEXT,
    scraper_execution_id INTEGER REFERENCES scraper_executions(id),
    created_at           TEXT    NOT NULL,
    updated_at           TEXT    NOT NULL
);

CREATE INDEX IF NOT EXISTS publications_status_idx  ON publications(status);
CREATE INDEX IF NOT EXISTS publications_created_idx ON publications(created_at);
CREATE INDEX IF NOT EXISTS publications_date_idx    ON publications(publication_date);
CREATE INDEX IF NOT EXISTS publications_hash_idx    ON publications(content_hash);

PRAGMA user_version = 1;
";
