//! Demo practice data for trying the assistant against a fresh database.

use chrono::{Duration, NaiveDate};
use tracing::info;

use clinician_core::error::Result;
use clinician_core::types::{
    Budget, Caregiver, Goal, GoalStatus, Patient, PatientStatus, TherapySession,
};

use crate::records::SqliteRecordStore;

/// Seed a handful of patients with goals, budgets, caregivers, and sessions
/// dated relative to `today`. Does nothing if patients already exist.
///
/// Returns the number of patients inserted.
pub fn seed_demo_records(store: &SqliteRecordStore, today: NaiveDate) -> Result<usize> {
    if !store.is_empty()? {
        info!("Record store already populated, skipping demo seed");
        return Ok(0);
    }

    let patients = [
        ("404924", "Radwan Smith", (1979, 2, 11), PatientStatus::Active),
        ("123456", "John Smith", (1990, 7, 23), PatientStatus::Active),
        ("310557", "Maria Lopez", (1985, 11, 2), PatientStatus::Active),
        ("872201", "Aiko Tanaka", (2001, 4, 30), PatientStatus::Inactive),
    ];
    for (identifier, name, (y, m, d), status) in patients {
        store.add_patient(&Patient {
            identifier: identifier.to_string(),
            name: name.to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(y, m, d),
            status,
        })?;
    }

    let goals = [
        ("404924", "Independent grocery shopping", 65.0, GoalStatus::InProgress),
        ("404924", "Catch the bus to work", 100.0, GoalStatus::Achieved),
        ("123456", "Improve fine motor control", 30.0, GoalStatus::InProgress),
        ("310557", "Return to part-time study", 0.0, GoalStatus::NotStarted),
    ];
    for (identifier, title, progress, status) in goals {
        store.add_goal(&Goal {
            patient_identifier: identifier.to_string(),
            patient_name: String::new(),
            title: title.to_string(),
            progress_percent: progress,
            status,
            target_date: Some(today + Duration::days(90)),
        })?;
    }

    let budgets = [
        ("404924", "Core supports", 12_000.0, 9_850.25, 12),
        ("123456", "Capacity building", 8_500.0, 2_100.0, 25),
        ("310557", "Capital", 3_000.0, 450.0, 140),
    ];
    for (identifier, category, total, spent, days_left) in budgets {
        store.add_budget(&Budget {
            patient_identifier: identifier.to_string(),
            patient_name: String::new(),
            category: category.to_string(),
            total_amount: total,
            spent_amount: spent,
            start_date: today - Duration::days(365 - days_left),
            end_date: today + Duration::days(days_left),
        })?;
    }

    let caregivers = [
        ("404924", "Dana Smith", "spouse", Some("0400 111 222"), true),
        ("404924", "Omar Smith", "son", None, false),
        ("310557", "Lucia Lopez", "mother", Some("0400 333 444"), true),
    ];
    for (identifier, name, relationship, phone, is_primary) in caregivers {
        store.add_caregiver(&Caregiver {
            patient_identifier: identifier.to_string(),
            patient_name: String::new(),
            name: name.to_string(),
            relationship: relationship.to_string(),
            phone: phone.map(str::to_string),
            is_primary,
        })?;
    }

    let sessions = [
        ("404924", -2, 60, "Occupational therapy"),
        ("123456", -5, 45, "Physiotherapy"),
        ("310557", -12, 60, "Psychology"),
        ("404924", 3, 60, "Occupational therapy"),
    ];
    for (identifier, offset, minutes, kind) in sessions {
        store.add_session(&TherapySession {
            patient_identifier: identifier.to_string(),
            patient_name: String::new(),
            session_date: today + Duration::days(offset),
            duration_minutes: minutes,
            session_type: kind.to_string(),
        })?;
    }

    info!(patients = patients.len(), "Seeded demo practice records");
    Ok(patients.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use clinician_core::store::RecordStore;

    use crate::db::Database;

    #[tokio::test]
    async fn test_seed_once() {
        let store = SqliteRecordStore::new(Arc::new(Database::in_memory().unwrap()));
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        assert_eq!(seed_demo_records(&store, today).unwrap(), 4);
        assert_eq!(seed_demo_records(&store, today).unwrap(), 0);
        assert_eq!(store.count_patients().await.unwrap(), 4);
    }
}
