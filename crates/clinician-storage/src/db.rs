//! SQLite handle shared by the record and conversation stores.
//!
//! One connection behind a `Mutex`; file databases run in WAL mode so the
//! conversation writer does not block record reads for long.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, Transaction};
use tracing::info;

use clinician_core::error::ClinicianError;

use crate::migrations;

const FILE_PRAGMAS: &str = "PRAGMA journal_mode = WAL;
     PRAGMA synchronous = NORMAL;
     PRAGMA foreign_keys = ON;
     PRAGMA busy_timeout = 5000;";

const MEMORY_PRAGMAS: &str = "PRAGMA foreign_keys = ON;";

/// Migrated SQLite database, safe to share behind an `Arc`.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create the database file, creating parent directories, and
    /// apply pending migrations.
    pub fn new(path: &Path) -> Result<Self, ClinicianError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(|e| {
            ClinicianError::StoreUnavailable(format!("cannot open {}: {}", path.display(), e))
        })?;
        let db = Self::prepare(conn, FILE_PRAGMAS)?;
        info!(path = %path.display(), "Database ready");
        Ok(db)
    }

    /// Private in-memory database, used by tests.
    pub fn in_memory() -> Result<Self, ClinicianError> {
        let conn = Connection::open_in_memory().map_err(|e| {
            ClinicianError::StoreUnavailable(format!("cannot open in-memory database: {}", e))
        })?;
        Self::prepare(conn, MEMORY_PRAGMAS)
    }

    fn prepare(conn: Connection, pragmas: &str) -> Result<Self, ClinicianError> {
        conn.execute_batch(pragmas).map_err(storage_err)?;
        migrations::run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, ClinicianError> {
        self.conn
            .lock()
            .map_err(|_| ClinicianError::Storage("database mutex poisoned".to_string()))
    }

    /// Run `f` while holding the connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, ClinicianError>
    where
        F: FnOnce(&Connection) -> Result<T, ClinicianError>,
    {
        f(&*self.lock()?)
    }

    /// Run `f` in a transaction; commits on `Ok`, rolls back on `Err`.
    pub fn with_transaction<F, T>(&self, f: F) -> Result<T, ClinicianError>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, ClinicianError>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(storage_err)?;
        let value = f(&tx)?;
        tx.commit().map_err(storage_err)?;
        Ok(value)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

/// Map a rusqlite error onto the storage variant.
pub(crate) fn storage_err(e: rusqlite::Error) -> ClinicianError {
    ClinicianError::Storage(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(db: &Database, table: &str) -> i64 {
        db.with_conn(|conn| {
            conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                row.get(0)
            })
            .map_err(storage_err)
        })
        .unwrap()
    }

    #[test]
    fn test_in_memory_database_is_migrated() {
        let db = Database::in_memory().unwrap();
        assert_eq!(count(&db, "patients"), 0);
        assert_eq!(count(&db, "messages"), 0);
    }

    #[test]
    fn test_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("clinic.db");
        let db = Database::new(&path).unwrap();
        assert_eq!(count(&db, "conversations"), 0);
        assert!(path.exists());
    }

    #[test]
    fn test_wal_mode_enabled_on_file() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(&dir.path().join("wal.db")).unwrap();
        db.with_conn(|conn| {
            let mode: String = conn
                .query_row("PRAGMA journal_mode", [], |row| row.get(0))
                .map_err(storage_err)?;
            assert_eq!(mode, "wal");
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let db = Database::in_memory().unwrap();
        let result: Result<(), ClinicianError> = db.with_transaction(|tx| {
            tx.execute(
                "INSERT INTO patients (identifier, name) VALUES ('111111', 'Temp Person')",
                [],
            )
            .map_err(storage_err)?;
            Err(ClinicianError::Storage("abort".into()))
        });
        assert!(result.is_err());

        assert_eq!(count(&db, "patients"), 0);
    }
}
