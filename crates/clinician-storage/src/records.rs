//! SQLite-backed implementation of [`RecordStore`].
//!
//! The assistant only reads clinical records; the `add_*` methods exist for
//! seeding and tests.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension};

use clinician_core::error::{ClinicianError, Result};
use clinician_core::store::RecordStore;
use clinician_core::types::{
    Budget, Caregiver, DateRange, Goal, GoalStatus, Patient, PatientStatus, TherapySession,
};

use crate::db::{storage_err, Database};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Clinical record store over the shared [`Database`].
pub struct SqliteRecordStore {
    db: Arc<Database>,
}

impl SqliteRecordStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// True when no patient has been recorded yet.
    pub fn is_empty(&self) -> Result<bool> {
        self.db.with_conn(|conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM patients", [], |row| row.get(0))
                .map_err(storage_err)?;
            Ok(count == 0)
        })
    }

    pub fn add_patient(&self, patient: &Patient) -> Result<()> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO patients (identifier, name, date_of_birth, status)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![
                    patient.identifier,
                    patient.name,
                    patient.date_of_birth.map(format_date),
                    patient.status.as_str(),
                ],
            )
            .map_err(|e| ClinicianError::Storage(format!("Failed to save patient: {}", e)))?;
            Ok(())
        })
    }

    pub fn add_goal(&self, goal: &Goal) -> Result<()> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO goals (patient_identifier, title, progress_percent, status, target_date)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    goal.patient_identifier,
                    goal.title,
                    goal.progress_percent,
                    goal.status.as_str(),
                    goal.target_date.map(format_date),
                ],
            )
            .map_err(|e| ClinicianError::Storage(format!("Failed to save goal: {}", e)))?;
            Ok(())
        })
    }

    pub fn add_budget(&self, budget: &Budget) -> Result<()> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO budgets (patient_identifier, category, total_amount, spent_amount, start_date, end_date)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    budget.patient_identifier,
                    budget.category,
                    budget.total_amount,
                    budget.spent_amount,
                    format_date(budget.start_date),
                    format_date(budget.end_date),
                ],
            )
            .map_err(|e| ClinicianError::Storage(format!("Failed to save budget: {}", e)))?;
            Ok(())
        })
    }

    pub fn add_caregiver(&self, caregiver: &Caregiver) -> Result<()> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO caregivers (patient_identifier, name, relationship, phone, is_primary)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    caregiver.patient_identifier,
                    caregiver.name,
                    caregiver.relationship,
                    caregiver.phone,
                    caregiver.is_primary as i32,
                ],
            )
            .map_err(|e| ClinicianError::Storage(format!("Failed to save caregiver: {}", e)))?;
            Ok(())
        })
    }

    pub fn add_session(&self, session: &TherapySession) -> Result<()> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO therapy_sessions (patient_identifier, session_date, duration_minutes, session_type)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![
                    session.patient_identifier,
                    format_date(session.session_date),
                    session.duration_minutes,
                    session.session_type,
                ],
            )
            .map_err(|e| ClinicianError::Storage(format!("Failed to save session: {}", e)))?;
            Ok(())
        })
    }

    /// Run `f` against the connection on the blocking pool.
    ///
    /// The returned future yields while SQLite works, so a caller's
    /// `tokio::time::timeout` can expire.
    async fn read<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || db.with_conn(f))
            .await
            .map_err(|e| ClinicianError::Storage(format!("Record query task failed: {}", e)))?
    }

    /// Run a SELECT whose WHERE clause ends in `IN (<placeholders>)` over `identifiers`.
    async fn query_by_identifiers<T, F>(
        &self,
        sql_prefix: &str,
        order_by: &str,
        identifiers: &[String],
        map: F,
    ) -> Result<Vec<T>>
    where
        F: Fn(&rusqlite::Row<'_>) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        if identifiers.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; identifiers.len()].join(", ");
        let sql = format!("{} IN ({}) {}", sql_prefix, placeholders, order_by);
        let params = identifiers.to_vec();

        self.read(move |conn| collect_rows(conn, &sql, &params, map))
            .await
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn ping(&self) -> Result<()> {
        self.read(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
                .map_err(|e| ClinicianError::StoreUnavailable(e.to_string()))?;
            Ok(())
        })
        .await
    }

    async fn count_patients(&self) -> Result<u64> {
        self.read(|conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM patients", [], |row| row.get(0))
                .map_err(storage_err)?;
            Ok(count.max(0) as u64)
        })
        .await
    }

    async fn find_patient_by_identifier(&self, identifier: &str) -> Result<Option<Patient>> {
        let identifier = identifier.to_string();
        self.read(move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT identifier, name, date_of_birth, status
                     FROM patients WHERE identifier = ?1",
                )
                .map_err(storage_err)?;
            let found = stmt
                .query_row(rusqlite::params![identifier], |row| Ok(map_patient(row)))
                .optional()
                .map_err(storage_err)?;
            found.transpose()
        })
        .await
    }

    async fn search_patients_by_name(&self, name: &str) -> Result<Vec<Patient>> {
        let pattern = format!("%{}%", escape_like(&name.to_lowercase()));
        self.read(move |conn| {
            collect_rows(
                conn,
                "SELECT identifier, name, date_of_birth, status
                 FROM patients
                 WHERE lower(name) LIKE ? ESCAPE '\\'
                 ORDER BY name, identifier",
                &[pattern],
                map_patient,
            )
        })
        .await
    }

    async fn goals_for_patients(&self, identifiers: &[String]) -> Result<Vec<Goal>> {
        self.query_by_identifiers(
            "SELECT g.patient_identifier, p.name, g.title, g.progress_percent, g.status, g.target_date
             FROM goals g JOIN patients p ON p.identifier = g.patient_identifier
             WHERE g.patient_identifier",
            "ORDER BY p.name, g.id",
            identifiers,
            |row| {
                Ok(Goal {
                    patient_identifier: row.get(0).map_err(storage_err)?,
                    patient_name: row.get(1).map_err(storage_err)?,
                    title: row.get(2).map_err(storage_err)?,
                    progress_percent: row.get(3).map_err(storage_err)?,
                    status: GoalStatus::parse(&row.get::<_, String>(4).map_err(storage_err)?),
                    target_date: parse_optional_date(row.get(5).map_err(storage_err)?)?,
                })
            },
        )
        .await
    }

    async fn budgets_for_patients(&self, identifiers: &[String]) -> Result<Vec<Budget>> {
        self.query_by_identifiers(
            "SELECT b.patient_identifier, p.name, b.category, b.total_amount, b.spent_amount, b.start_date, b.end_date
             FROM budgets b JOIN patients p ON p.identifier = b.patient_identifier
             WHERE b.patient_identifier",
            "ORDER BY p.name, b.end_date",
            identifiers,
            map_budget,
        )
        .await
    }

    async fn budgets_expiring(&self, range: DateRange) -> Result<Vec<Budget>> {
        let bounds = [format_date(range.start), format_date(range.end)];
        self.read(move |conn| {
            collect_rows(
                conn,
                "SELECT b.patient_identifier, p.name, b.category, b.total_amount, b.spent_amount, b.start_date, b.end_date
                 FROM budgets b JOIN patients p ON p.identifier = b.patient_identifier
                 WHERE b.end_date >= ? AND b.end_date <= ?
                 ORDER BY b.end_date, p.name",
                &bounds,
                map_budget,
            )
        })
        .await
    }

    async fn caregivers_for_patients(&self, identifiers: &[String]) -> Result<Vec<Caregiver>> {
        self.query_by_identifiers(
            "SELECT c.patient_identifier, p.name, c.name, c.relationship, c.phone, c.is_primary
             FROM caregivers c JOIN patients p ON p.identifier = c.patient_identifier
             WHERE c.patient_identifier",
            "ORDER BY p.name, c.is_primary DESC, c.name",
            identifiers,
            |row| {
                Ok(Caregiver {
                    patient_identifier: row.get(0).map_err(storage_err)?,
                    patient_name: row.get(1).map_err(storage_err)?,
                    name: row.get(2).map_err(storage_err)?,
                    relationship: row.get(3).map_err(storage_err)?,
                    phone: row.get(4).map_err(storage_err)?,
                    is_primary: row.get::<_, i64>(5).map_err(storage_err)? != 0,
                })
            },
        )
        .await
    }

    async fn sessions_between(
        &self,
        range: DateRange,
        identifiers: Option<&[String]>,
    ) -> Result<Vec<TherapySession>> {
        let mut sql = String::from(
            "SELECT s.patient_identifier, p.name, s.session_date, s.duration_minutes, s.session_type
             FROM therapy_sessions s JOIN patients p ON p.identifier = s.patient_identifier
             WHERE s.session_date >= ? AND s.session_date <= ?",
        );
        let mut params = vec![format_date(range.start), format_date(range.end)];
        if let Some(ids) = identifiers {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            sql.push_str(&format!(
                " AND s.patient_identifier IN ({})",
                vec!["?"; ids.len()].join(", ")
            ));
            params.extend(ids.iter().cloned());
        }
        sql.push_str(" ORDER BY s.session_date, p.name");

        self.read(move |conn| {
            collect_rows(conn, &sql, &params, |row| {
                let minutes: i64 = row.get(3).map_err(storage_err)?;
                Ok(TherapySession {
                    patient_identifier: row.get(0).map_err(storage_err)?,
                    patient_name: row.get(1).map_err(storage_err)?,
                    session_date: parse_date(&row.get::<_, String>(2).map_err(storage_err)?)?,
                    duration_minutes: u32::try_from(minutes.max(0)).unwrap_or(u32::MAX),
                    session_type: row.get(4).map_err(storage_err)?,
                })
            })
        })
        .await
    }
}

/// Prepare `sql`, bind `params` positionally and map every row.
fn collect_rows<T>(
    conn: &Connection,
    sql: &str,
    params: &[String],
    map: impl Fn(&rusqlite::Row<'_>) -> Result<T>,
) -> Result<Vec<T>> {
    let mut stmt = conn.prepare(sql).map_err(storage_err)?;
    let mut rows = stmt
        .query(rusqlite::params_from_iter(params.iter()))
        .map_err(storage_err)?;
    let mut out = Vec::new();
    while let Some(row) = rows.next().map_err(storage_err)? {
        out.push(map(row)?);
    }
    Ok(out)
}

// =============================================================================
// Row mapping helpers
// =============================================================================

fn map_patient(row: &rusqlite::Row<'_>) -> Result<Patient> {
    Ok(Patient {
        identifier: row.get(0).map_err(storage_err)?,
        name: row.get(1).map_err(storage_err)?,
        date_of_birth: parse_optional_date(row.get(2).map_err(storage_err)?)?,
        status: PatientStatus::parse(&row.get::<_, String>(3).map_err(storage_err)?),
    })
}

fn map_budget(row: &rusqlite::Row<'_>) -> Result<Budget> {
    Ok(Budget {
        patient_identifier: row.get(0).map_err(storage_err)?,
        patient_name: row.get(1).map_err(storage_err)?,
        category: row.get(2).map_err(storage_err)?,
        total_amount: row.get(3).map_err(storage_err)?,
        spent_amount: row.get(4).map_err(storage_err)?,
        start_date: parse_date(&row.get::<_, String>(5).map_err(storage_err)?)?,
        end_date: parse_date(&row.get::<_, String>(6).map_err(storage_err)?)?,
    })
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|e| ClinicianError::Storage(format!("Invalid date '{}': {}", value, e)))
}

fn parse_optional_date(value: Option<String>) -> Result<Option<NaiveDate>> {
    value.as_deref().map(parse_date).transpose()
}

/// Escape LIKE wildcards so user text matches literally.
fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
