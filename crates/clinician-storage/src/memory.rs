//! In-memory [`RecordStore`] for demos and tests.
//!
//! Supports simulated outages and latency so callers can exercise the
//! lookup-failure and timeout paths without a real backend.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;

use clinician_core::error::{ClinicianError, Result};
use clinician_core::store::RecordStore;
use clinician_core::types::{Budget, Caregiver, DateRange, Goal, Patient, TherapySession};

#[derive(Default)]
struct Records {
    patients: Vec<Patient>,
    goals: Vec<Goal>,
    budgets: Vec<Budget>,
    caregivers: Vec<Caregiver>,
    sessions: Vec<TherapySession>,
}

/// Vec-backed record store.
pub struct MemoryRecordStore {
    records: RwLock<Records>,
    configured: bool,
    unavailable: AtomicBool,
    latency_ms: AtomicU64,
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Records::default()),
            configured: true,
            unavailable: AtomicBool::new(false),
            latency_ms: AtomicU64::new(0),
        }
    }

    /// A store reporting that no backend has been configured.
    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::new()
        }
    }

    /// Make every subsequent lookup fail with `StoreUnavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Delay every subsequent lookup.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn add_patient(&self, patient: Patient) {
        self.write(|r| r.patients.push(patient));
    }

    /// Adds a goal; the patient name is filled from the patient list.
    pub fn add_goal(&self, mut goal: Goal) {
        self.write(|r| {
            goal.patient_name = name_of(&r.patients, &goal.patient_identifier);
            r.goals.push(goal);
        });
    }

    pub fn add_budget(&self, mut budget: Budget) {
        self.write(|r| {
            budget.patient_name = name_of(&r.patients, &budget.patient_identifier);
            r.budgets.push(budget);
        });
    }

    pub fn add_caregiver(&self, mut caregiver: Caregiver) {
        self.write(|r| {
            caregiver.patient_name = name_of(&r.patients, &caregiver.patient_identifier);
            r.caregivers.push(caregiver);
        });
    }

    pub fn add_session(&self, mut session: TherapySession) {
        self.write(|r| {
            session.patient_name = name_of(&r.patients, &session.patient_identifier);
            r.sessions.push(session);
        });
    }

    fn write(&self, f: impl FnOnce(&mut Records)) {
        match self.records.write() {
            Ok(mut guard) => f(&mut guard),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }

    /// Apply simulated latency/outage, then read under the lock.
    async fn read<T>(&self, f: impl FnOnce(&Records) -> T) -> Result<T> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ClinicianError::StoreUnavailable(
                "record store is not responding".to_string(),
            ));
        }
        let guard = self
            .records
            .read()
            .map_err(|e| ClinicianError::Storage(format!("Record lock poisoned: {}", e)))?;
        Ok(f(&guard))
    }
}

fn name_of(patients: &[Patient], identifier: &str) -> String {
    patients
        .iter()
        .find(|p| p.identifier == identifier)
        .map(|p| p.name.clone())
        .unwrap_or_default()
}

fn in_ids(ids: &[String], identifier: &str) -> bool {
    ids.iter().any(|id| id == identifier)
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn ping(&self) -> Result<()> {
        self.read(|_| ()).await
    }

    async fn count_patients(&self) -> Result<u64> {
        self.read(|r| r.patients.len() as u64).await
    }

    async fn find_patient_by_identifier(&self, identifier: &str) -> Result<Option<Patient>> {
        self.read(|r| {
            r.patients
                .iter()
                .find(|p| p.identifier == identifier)
                .cloned()
        })
        .await
    }

    async fn search_patients_by_name(&self, name: &str) -> Result<Vec<Patient>> {
        let needle = name.to_lowercase();
        self.read(|r| {
            let mut found: Vec<Patient> = r
                .patients
                .iter()
                .filter(|p| p.name.to_lowercase().contains(&needle))
                .cloned()
                .collect();
            found.sort_by(|a, b| a.name.cmp(&b.name).then(a.identifier.cmp(&b.identifier)));
            found
        })
        .await
    }

    async fn goals_for_patients(&self, identifiers: &[String]) -> Result<Vec<Goal>> {
        self.read(|r| {
            r.goals
                .iter()
                .filter(|g| in_ids(identifiers, &g.patient_identifier))
                .cloned()
                .collect()
        })
        .await
    }

    async fn budgets_for_patients(&self, identifiers: &[String]) -> Result<Vec<Budget>> {
        self.read(|r| {
            r.budgets
                .iter()
                .filter(|b| in_ids(identifiers, &b.patient_identifier))
                .cloned()
                .collect()
        })
        .await
    }

    async fn budgets_expiring(&self, range: DateRange) -> Result<Vec<Budget>> {
        self.read(|r| {
            let mut found: Vec<Budget> = r
                .budgets
                .iter()
                .filter(|b| range.contains(b.end_date))
                .cloned()
                .collect();
            found.sort_by(|a, b| a.end_date.cmp(&b.end_date));
            found
        })
        .await
    }

    async fn caregivers_for_patients(&self, identifiers: &[String]) -> Result<Vec<Caregiver>> {
        self.read(|r| {
            let mut found: Vec<Caregiver> = r
                .caregivers
                .iter()
                .filter(|c| in_ids(identifiers, &c.patient_identifier))
                .cloned()
                .collect();
            found.sort_by_key(|c| !c.is_primary);
            found
        })
        .await
    }

    async fn sessions_between(
        &self,
        range: DateRange,
        identifiers: Option<&[String]>,
    ) -> Result<Vec<TherapySession>> {
        self.read(|r| {
            let mut found: Vec<TherapySession> = r
                .sessions
                .iter()
                .filter(|s| range.contains(s.session_date))
                .filter(|s| identifiers.map_or(true, |ids| in_ids(ids, &s.patient_identifier)))
                .cloned()
                .collect();
            found.sort_by_key(|s| s.session_date);
            found
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use clinician_core::types::PatientStatus;

    fn patient(identifier: &str, name: &str) -> Patient {
        Patient {
            identifier: identifier.into(),
            name: name.into(),
            date_of_birth: None,
            status: PatientStatus::Active,
        }
    }

    #[tokio::test]
    async fn test_count_and_search() {
        let store = MemoryRecordStore::new();
        store.add_patient(patient("404924", "Radwan Smith"));
        store.add_patient(patient("123456", "John Smith"));
        assert_eq!(store.count_patients().await.unwrap(), 2);
        let found = store.search_patients_by_name("smith").await.unwrap();
        assert_eq!(found[0].name, "John Smith");
    }

    #[tokio::test]
    async fn test_unavailable_fails_lookups() {
        let store = MemoryRecordStore::new();
        store.set_unavailable(true);
        let err = store.count_patients().await.unwrap_err();
        assert!(matches!(err, ClinicianError::StoreUnavailable(_)));
        store.set_unavailable(false);
        assert!(store.ping().await.is_ok());
    }

    #[tokio::test]
    async fn test_child_records_take_patient_name() {
        let store = MemoryRecordStore::new();
        store.add_patient(patient("404924", "Radwan Smith"));
        store.add_session(TherapySession {
            patient_identifier: "404924".into(),
            patient_name: String::new(),
            session_date: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            duration_minutes: 45,
            session_type: "Speech".into(),
        });
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
        );
        let sessions = store.sessions_between(range, None).await.unwrap();
        assert_eq!(sessions[0].patient_name, "Radwan Smith");
    }

    #[test]
    fn test_unconfigured_flag() {
        assert!(!MemoryRecordStore::unconfigured().is_configured());
        assert!(MemoryRecordStore::new().is_configured());
    }
}
