//! Budget handlers: per-patient budget summary and practice-wide expiring
//! budgets.

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

pub const PATIENT_BUDGET_COLUMNS: [&str; 7] = [
    "patient_name",
    "patient_identifier",
    "category",
    "total_amount",
    "spent_amount",
    "remaining_amount",
    "end_date",
];

pub const EXPIRING_COLUMNS: [&str; 6] = [
    "patient_name",
    "patient_identifier",
    "category",
    "remaining_amount",
    "end_date",
    "days_remaining",
];

/// Handler for `PATIENT_BUDGET`.
pub struct PatientBudgetHandler;

#[async_trait]
impl QueryHandler for PatientBudgetHandler {
    fn query_type(&self) -> QueryType {
        QueryType::PatientBudget
    }

    async fn execute(
        &self,
        entities: &ExtractedEntities,
        store: &dyn RecordStore,
        ctx: &HandlerContext,
    ) -> Result<QueryResult, DispatchError> {
        let patients = resolve_patients(entities, store, ctx).await?;
        let ids = identifiers(&patients);
        let budgets = lookup(ctx, "budgets_for_patients", store.budgets_for_patients(&ids)).await?;

        let mut result = table(&PATIENT_BUDGET_COLUMNS)?;
        for budget in budgets {
            let remaining = budget.remaining();
            result.push_row([
                ("patient_name", CellValue::from(budget.patient_name)),
                ("patient_identifier", CellValue::from(budget.patient_identifier)),
                ("category", CellValue::from(budget.category)),
                ("total_amount", CellValue::from(budget.total_amount)),
                ("spent_amount", CellValue::from(budget.spent_amount)),
                ("remaining_amount", CellValue::from(remaining)),
                ("end_date", CellValue::from(format_date(budget.end_date))),
            ])?;
        }
        Ok(result)
    }
}

/// Handler for `EXPIRING_BUDGETS`.
///
/// Uses the extracted date range, or the configured look-ahead window from
/// today. A named patient narrows the result to that patient.
pub struct ExpiringBudgetsHandler;

#[async_trait]
impl QueryHandler for ExpiringBudgetsHandler {
    fn query_type(&self) -> QueryType {
        QueryType::ExpiringBudgets
    }

    async fn execute(
        &self,
        entities: &ExtractedEntities,
        store: &dyn RecordStore,
        ctx: &HandlerContext,
    ) -> Result<QueryResult, DispatchError> {
        let range = entities.date_range.unwrap_or_else(|| {
            DateRange::new(
                ctx.today,
                ctx.today + Duration::days(i64::from(ctx.expiring_budget_days)),
            )
        });

        let only = if entities.has_patient() {
            Some(identifiers(&resolve_patients(entities, store, ctx).await?))
        } else {
            None
        };

        let budgets = lookup(ctx, "budgets_expiring", store.budgets_expiring(range)).await?;

        let mut result = table(&EXPIRING_COLUMNS)?;
        for budget in budgets {
            if let Some(ids) = &only {
                if !ids.contains(&budget.patient_identifier) {
                    continue;
                }
            }
            let remaining = budget.remaining();
            let days_remaining = (budget.end_date - ctx.today).num_days();
            result.push_row([
                ("patient_name", CellValue::from(budget.patient_name)),
                ("patient_identifier", CellValue::from(budget.patient_identifier)),
                ("category", CellValue::from(budget.category)),
                ("remaining_amount", CellValue::from(remaining)),
                ("end_date", CellValue::from(format_date(budget.end_date))),
                ("days_remaining", CellValue::from(days_remaining)),
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
    use clinician_core::types::{Budget, Patient, PatientStatus};
    use clinician_storage::MemoryRecordStore;

    use crate::types::PatientRef;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 15).unwrap()
    }

    fn setup() -> (MemoryRecordStore, HandlerContext) {
        let store = MemoryRecordStore::new();
        for (id, name) in [("404924", "Radwan Smith"), ("310557", "Maria Lopez")] {
            store.add_patient(Patient {
                identifier: id.into(),
                name: name.into(),
                date_of_birth: None,
                status: PatientStatus::Active,
            });
        }
        for (id, spent, days_left) in [("404924", 9_850.25, 12), ("310557", 450.0, 140)] {
            store.add_budget(Budget {
                patient_identifier: id.into(),
                patient_name: String::new(),
                category: "Core supports".into(),
                total_amount: 12_000.0,
                spent_amount: spent,
                start_date: today() - Duration::days(200),
                end_date: today() + Duration::days(days_left),
            });
        }
        (store, HandlerContext::new(&AssistantConfig::default(), today()))
    }

    #[tokio::test]
    async fn test_patient_budget_remaining() {
        let (store, ctx) = setup();
        let entities = ExtractedEntities {
            patient: Some(PatientRef::Identifier("404924".into())),
            ..Default::default()
        };
        let result = PatientBudgetHandler
            .execute(&entities, &store, &ctx)
            .await
            .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(
            result.value(0, "remaining_amount"),
            Some(&CellValue::Float(12_000.0 - 9_850.25))
        );
    }

    #[tokio::test]
    async fn test_expiring_uses_default_window() {
        let (store, ctx) = setup();
        let result = ExpiringBudgetsHandler
            .execute(&ExtractedEntities::default(), &store, &ctx)
            .await
            .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(
            result.value(0, "patient_name"),
            Some(&CellValue::from("Radwan Smith"))
        );
        assert_eq!(result.value(0, "days_remaining"), Some(&CellValue::Integer(12)));
    }

    #[tokio::test]
    async fn test_expiring_respects_explicit_range() {
        let (store, ctx) = setup();
        let entities = ExtractedEntities {
            date_range: Some(DateRange::new(today(), today() + Duration::days(365))),
            ..Default::default()
        };
        let result = ExpiringBudgetsHandler
            .execute(&entities, &store, &ctx)
            .await
            .unwrap();
        assert_eq!(result.len(), 2);
    }

    #[tokio::test]
    async fn test_expiring_narrowed_to_patient() {
        let (store, ctx) = setup();
        let entities = ExtractedEntities {
            patient: Some(PatientRef::Name("Maria Lopez".into())),
            date_range: Some(DateRange::new(today(), today() + Duration::days(365))),
            ..Default::default()
        };
        let result = ExpiringBudgetsHandler
            .execute(&entities, &store, &ctx)
            .await
            .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(
            result.value(0, "patient_identifier"),
            Some(&CellValue::from("310557"))
        );
    }
}
