//! Patient search by identifier or name.

use async_trait::async_trait;

use clinician_core::query_result::{CellValue, QueryResult};
use clinician_core::store::RecordStore;

use crate::error::DispatchError;
use crate::handler::{format_date, resolve_patients, table, HandlerContext, QueryHandler};
use crate::types::{ExtractedEntities, QueryType};

pub const COLUMNS: [&str; 4] = ["name", "identifier", "date_of_birth", "status"];

/// Handler for `PATIENT_SEARCH`. Several name matches come back as several rows.
pub struct PatientSearchHandler;

#[async_trait]
impl QueryHandler for PatientSearchHandler {
    fn query_type(&self) -> QueryType {
        QueryType::PatientSearch
    }

    async fn execute(
        &self,
        entities: &ExtractedEntities,
        store: &dyn RecordStore,
        ctx: &HandlerContext,
    ) -> Result<QueryResult, DispatchError> {
        let patients = resolve_patients(entities, store, ctx).await?;
        let mut result = table(&COLUMNS)?;
        for patient in patients {
            result.push_row([
                ("name", CellValue::from(patient.name)),
                ("identifier", CellValue::from(patient.identifier)),
                (
                    "date_of_birth",
                    CellValue::from(patient.date_of_birth.map(format_date)),
                ),
                ("status", CellValue::from(patient.status.as_str())),
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
    use clinician_core::types::{Patient, PatientStatus};
    use clinician_storage::MemoryRecordStore;

    use crate::types::PatientRef;

    fn setup() -> (MemoryRecordStore, HandlerContext) {
        let store = MemoryRecordStore::new();
        store.add_patient(Patient {
            identifier: "404924".into(),
            name: "Radwan Smith".into(),
            date_of_birth: NaiveDate::from_ymd_opt(1979, 2, 11),
            status: PatientStatus::Active,
        });
        store.add_patient(Patient {
            identifier: "123456".into(),
            name: "John Smith".into(),
            date_of_birth: None,
            status: PatientStatus::Inactive,
        });
        let ctx = HandlerContext::new(
            &AssistantConfig::default(),
            NaiveDate::from_ymd_opt(2024, 5, 15).unwrap(),
        );
        (store, ctx)
    }

    #[tokio::test]
    async fn test_search_by_identifier() {
        let (store, ctx) = setup();
        let entities = ExtractedEntities {
            patient: Some(PatientRef::Identifier("404924".into())),
            ..Default::default()
        };
        let result = PatientSearchHandler
            .execute(&entities, &store, &ctx)
            .await
            .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(
            result.value(0, "date_of_birth"),
            Some(&CellValue::from("1979-02-11"))
        );
    }

    #[tokio::test]
    async fn test_ambiguous_name_returns_all_rows_with_nulls() {
        let (store, ctx) = setup();
        let entities = ExtractedEntities {
            patient: Some(PatientRef::Name("Smith".into())),
            ..Default::default()
        };
        let result = PatientSearchHandler
            .execute(&entities, &store, &ctx)
            .await
            .unwrap();
        assert_eq!(result.len(), 2);
        assert!(result.check_columns().is_ok());
        assert_eq!(result.value(0, "name"), Some(&CellValue::from("John Smith")));
        assert_eq!(result.value(0, "date_of_birth"), Some(&CellValue::Null));
    }

    #[tokio::test]
    async fn test_unknown_identifier_is_not_found() {
        let (store, ctx) = setup();
        let entities = ExtractedEntities {
            patient: Some(PatientRef::Identifier("999999".into())),
            ..Default::default()
        };
        let err = PatientSearchHandler
            .execute(&entities, &store, &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::NotFound { entity: "patient", .. }));
    }
}
