//! Goal progress for a patient.

use async_trait::async_trait;

use clinician_core::query_result::{CellValue, QueryResult};
use clinician_core::store::RecordStore;

use crate::error::DispatchError;
use crate::handler::{
    format_date, identifiers, lookup, resolve_patients, table, HandlerContext, QueryHandler,
};
use crate::types::{ExtractedEntities, QueryType};

pub const COLUMNS: [&str; 6] = [
    "patient_name",
    "patient_identifier",
    "goal",
    "progress_percent",
    "status",
    "target_date",
];

/// Handler for `PATIENT_GOAL_PROGRESS`.
pub struct GoalProgressHandler;

#[async_trait]
impl QueryHandler for GoalProgressHandler {
    fn query_type(&self) -> QueryType {
        QueryType::PatientGoalProgress
    }

    async fn execute(
        &self,
        entities: &ExtractedEntities,
        store: &dyn RecordStore,
        ctx: &HandlerContext,
    ) -> Result<QueryResult, DispatchError> {
        let patients = resolve_patients(entities, store, ctx).await?;
        let ids = identifiers(&patients);
        let goals = lookup(ctx, "goals_for_patients", store.goals_for_patients(&ids)).await?;

        let mut result = table(&COLUMNS)?;
        for goal in goals {
            result.push_row([
                ("patient_name", CellValue::from(goal.patient_name)),
                ("patient_identifier", CellValue::from(goal.patient_identifier)),
                ("goal", CellValue::from(goal.title)),
                ("progress_percent", CellValue::from(goal.progress_percent)),
                ("status", CellValue::from(goal.status.as_str())),
                ("target_date", CellValue::from(goal.target_date.map(format_date))),
            ])?;
        }
        Ok(result)
    }
}
