//! Caregivers linked to a patient.

use async_trait::async_trait;

use clinician_core::query_result::{CellValue, QueryResult};
use clinician_core::store::RecordStore;

use crate::error::DispatchError;
use crate::handler::{identifiers, lookup, resolve_patients, table, HandlerContext, QueryHandler};
use crate::types::{ExtractedEntities, QueryType};

pub const COLUMNS: [&str; 6] = [
    "patient_name",
    "patient_identifier",
    "caregiver_name",
    "relationship",
    "phone",
    "primary",
];

/// Handler for `CAREGIVER_LOOKUP`. Primary caregivers are listed first.
pub struct CaregiverLookupHandler;

#[async_trait]
impl QueryHandler for CaregiverLookupHandler {
    fn query_type(&self) -> QueryType {
        QueryType::CaregiverLookup
    }

    async fn execute(
        &self,
        entities: &ExtractedEntities,
        store: &dyn RecordStore,
        ctx: &HandlerContext,
    ) -> Result<QueryResult, DispatchError> {
        let patients = resolve_patients(entities, store, ctx).await?;
        let ids = identifiers(&patients);
        let caregivers = lookup(
            ctx,
            "caregivers_for_patients",
            store.caregivers_for_patients(&ids),
        )
        .await?;

        let mut result = table(&COLUMNS)?;
        for caregiver in caregivers {
            result.push_row([
                ("patient_name", CellValue::from(caregiver.patient_name)),
                ("patient_identifier", CellValue::from(caregiver.patient_identifier)),
                ("caregiver_name", CellValue::from(caregiver.name)),
                ("relationship", CellValue::from(caregiver.relationship)),
                ("phone", CellValue::from(caregiver.phone)),
                ("primary", CellValue::from(caregiver.is_primary)),
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
    use clinician_core::types::{Caregiver, Patient, PatientStatus};
    use clinician_storage::MemoryRecordStore;

    use crate::types::PatientRef;

    #[tokio::test]
    async fn test_primary_first_and_missing_phone_is_null() {
        let store = MemoryRecordStore::new();
        store.add_patient(Patient {
            identifier: "404924".into(),
            name: "Radwan Smith".into(),
            date_of_birth: None,
            status: PatientStatus::Active,
        });
        store.add_caregiver(Caregiver {
            patient_identifier: "404924".into(),
            patient_name: String::new(),
            name: "Omar Smith".into(),
            relationship: "son".into(),
            phone: None,
            is_primary: false,
        });
        store.add_caregiver(Caregiver {
            patient_identifier: "404924".into(),
            patient_name: String::new(),
            name: "Dana Smith".into(),
            relationship: "spouse".into(),
            phone: Some("0400 111 222".into()),
            is_primary: true,
        });
        let ctx = HandlerContext::new(
            &AssistantConfig::default(),
            NaiveDate::from_ymd_opt(2024, 5, 15).unwrap(),
        );
        let entities = ExtractedEntities {
            patient: Some(PatientRef::Name("Radwan Smith".into())),
            ..Default::default()
        };
        let result = CaregiverLookupHandler
            .execute(&entities, &store, &ctx)
            .await
            .unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(
            result.value(0, "caregiver_name"),
            Some(&CellValue::from("Dana Smith"))
        );
        assert_eq!(result.value(0, "primary"), Some(&CellValue::from("yes")));
        assert_eq!(result.value(1, "phone"), Some(&CellValue::Null));
    }
}
