//! Therapy session history.

use async_trait::async_trait;
use chrono::Duration;

use clinician_core::query_result::{CellValue, QueryResult};
use clinician_core::store::RecordStore;
use clinician_core::types::DateRange;

use crate::error::DispatchError;
use crate::handler::{
    format_date, identifiers, lookup, resolve_patients, table, HandlerContext, QueryHandler,
};
use crate::types::{ExtractedEntities, QueryType};

pub const COLUMNS: [&str; 5] = [
    "session_date",
    "patient_name",
    "patient_identifier",
    "session_type",
    "duration_minutes",
];

/// Handler for `SESSION_HISTORY`.
///
/// Without an extracted range, looks back `session_history_days` from today.
pub struct SessionHistoryHandler;

#[async_trait]
impl QueryHandler for SessionHistoryHandler {
    fn query_type(&self) -> QueryType {
        QueryType::SessionHistory
    }

    async fn execute(
        &self,
        entities: &ExtractedEntities,
        store: &dyn RecordStore,
        ctx: &HandlerContext,
    ) -> Result<QueryResult, DispatchError> {
        let range = entities.date_range.unwrap_or_else(|| {
            DateRange::new(
                ctx.today - Duration::days(i64::from(ctx.session_history_days)),
                ctx.today,
            )
        });

        let only = if entities.has_patient() {
            Some(identifiers(&resolve_patients(entities, store, ctx).await?))
        } else {
            None
        };

        let sessions = lookup(
            ctx,
            "sessions_between",
            store.sessions_between(range, only.as_deref()),
        )
        .await?;

        let mut result = table(&COLUMNS)?;
        for session in sessions {
            result.push_row([
                ("session_date", CellValue::from(format_date(session.session_date))),
                ("patient_name", CellValue::from(session.patient_name)),
                ("patient_identifier", CellValue::from(session.patient_identifier)),
                ("session_type", CellValue::from(session.session_type)),
                ("duration_minutes", CellValue::from(session.duration_minutes)),
            ])?;
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use clinician_core::config::AssistantConfig;
    use clinician_core::types::{Patient, PatientStatus, TherapySession};
    use clinician_storage::MemoryRecordStore;

    use crate::types::PatientRef;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 15).unwrap()
    }

    fn setup() -> (MemoryRecordStore, HandlerContext) {
        let store = MemoryRecordStore::new();
        for (id, name) in [("404924", "Radwan Smith"), ("123456", "John Smith")] {
            store.add_patient(Patient {
                identifier: id.into(),
                name: name.into(),
                date_of_birth: None,
                status: PatientStatus::Active,
            });
        }
        for (id, offset) in [("404924", -2), ("123456", -5), ("404924", -30)] {
            store.add_session(TherapySession {
                patient_identifier: id.into(),
                patient_name: String::new(),
                session_date: today() + Duration::days(offset),
                duration_minutes: 60,
                session_type: "Occupational therapy".into(),
            });
        }
        (store, HandlerContext::new(&AssistantConfig::default(), today()))
    }

    #[tokio::test]
    async fn test_default_window_is_last_week() {
        let (store, ctx) = setup();
        let result = SessionHistoryHandler
            .execute(&ExtractedEntities::default(), &store, &ctx)
            .await
            .unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(
            result.value(0, "session_date"),
            Some(&CellValue::from("2024-05-10"))
        );
    }

    #[tokio::test]
    async fn test_patient_and_range() {
        let (store, ctx) = setup();
        let entities = ExtractedEntities {
            patient: Some(PatientRef::Identifier("404924".into())),
            date_range: Some(DateRange::new(
                today() - Duration::days(60),
                today(),
            )),
            ..Default::default()
        };
        let result = SessionHistoryHandler
            .execute(&entities, &store, &ctx)
            .await
            .unwrap();
        assert_eq!(result.len(), 2);
        assert!(result
            .rows()
            .iter()
            .all(|r| r["patient_identifier"] == CellValue::from("404924")));
    }
}
