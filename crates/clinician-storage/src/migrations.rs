//! Database schema migrations.
//!
//! Migrations are an ordered list of `(version, name, sql)`. Each pending
//! one runs in its own transaction together with its `schema_migrations`
//! row, so a failed step leaves the schema at the previous version.
//! Dates are ISO `YYYY-MM-DD` text; instants are epoch milliseconds.

use rusqlite::Connection;
use tracing::info;

use clinician_core::error::ClinicianError;

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "clinical_records",
        sql: RECORDS_SQL,
    },
    Migration {
        version: 2,
        name: "conversations",
        sql: CONVERSATIONS_SQL,
    },
];

const RECORDS_SQL: &str = "
        CREATE TABLE IF NOT EXISTS patients (
            identifier      TEXT PRIMARY KEY NOT NULL,
            name            TEXT NOT NULL,
            date_of_birth   TEXT,
            status          TEXT NOT NULL DEFAULT 'active'
                            CHECK (status IN ('active', 'inactive', 'discharged'))
        );

        CREATE INDEX IF NOT EXISTS idx_patients_name
            ON patients (name COLLATE NOCASE);

        CREATE TABLE IF NOT EXISTS goals (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            patient_identifier  TEXT NOT NULL REFERENCES patients (identifier),
            title               TEXT NOT NULL,
            progress_percent    REAL NOT NULL DEFAULT 0
                                CHECK (progress_percent BETWEEN 0 AND 100),
            status              TEXT NOT NULL DEFAULT 'not_started'
                                CHECK (status IN ('not_started', 'in_progress', 'achieved', 'discontinued')),
            target_date         TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_goals_patient
            ON goals (patient_identifier);

        CREATE TABLE IF NOT EXISTS budgets (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            patient_identifier  TEXT NOT NULL REFERENCES patients (identifier),
            category            TEXT NOT NULL,
            total_amount        REAL NOT NULL DEFAULT 0,
            spent_amount        REAL NOT NULL DEFAULT 0,
            start_date          TEXT NOT NULL,
            end_date            TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_budgets_end_date
            ON budgets (end_date);

        CREATE TABLE IF NOT EXISTS caregivers (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            patient_identifier  TEXT NOT NULL REFERENCES patients (identifier),
            name                TEXT NOT NULL,
            relationship        TEXT NOT NULL DEFAULT '',
            phone               TEXT,
            is_primary          INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS therapy_sessions (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            patient_identifier  TEXT NOT NULL REFERENCES patients (identifier),
            session_date        TEXT NOT NULL,
            duration_minutes    INTEGER NOT NULL DEFAULT 0,
            session_type        TEXT NOT NULL DEFAULT ''
        );

        CREATE INDEX IF NOT EXISTS idx_sessions_date
            ON therapy_sessions (session_date);
";

const CONVERSATIONS_SQL: &str = "
        CREATE TABLE IF NOT EXISTS conversations (
            id               TEXT PRIMARY KEY NOT NULL,
            name             TEXT NOT NULL,
            created_at       INTEGER NOT NULL,
            updated_at       INTEGER NOT NULL,
            last_message_at  INTEGER
        );

        CREATE TABLE IF NOT EXISTS messages (
            id               TEXT PRIMARY KEY NOT NULL,
            conversation_id  TEXT NOT NULL REFERENCES conversations (id),
            seq              INTEGER NOT NULL,
            role             TEXT NOT NULL CHECK (role IN ('user', 'assistant')),
            content          TEXT NOT NULL,
            created_at       INTEGER NOT NULL,
            query_result     TEXT,
            UNIQUE (conversation_id, seq)
        );
";

/// Bring the schema up to the latest version.
pub fn run_migrations(conn: &Connection) -> Result<(), ClinicianError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| ClinicianError::Storage(format!("schema_migrations: {}", e)))?;

    let applied: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| ClinicianError::Storage(format!("schema version: {}", e)))?;

    for migration in MIGRATIONS.iter().filter(|m| m.version > applied) {
        apply(conn, migration)?;
        info!(
            version = migration.version,
            name = migration.name,
            "Applied migration"
        );
    }
    Ok(())
}

fn apply(conn: &Connection, migration: &Migration) -> Result<(), ClinicianError> {
    let fail = |e: rusqlite::Error| {
        ClinicianError::Storage(format!(
            "migration {} ({}) failed: {}",
            migration.version, migration.name, e
        ))
    };
    let tx = conn.unchecked_transaction().map_err(fail)?;
    tx.execute_batch(migration.sql).map_err(fail)?;
    tx.execute(
        "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
        rusqlite::params![migration.version, migration.name],
    )
    .map_err(fail)?;
    tx.commit().map_err(fail)
}
