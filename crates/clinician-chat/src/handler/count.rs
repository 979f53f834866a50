//! Practice-wide patient count.

use async_trait::async_trait;

use clinician_core::query_result::{CellValue, QueryResult};
use clinician_core::store::RecordStore;

use crate::error::DispatchError;
use crate::handler::{lookup, table, HandlerContext, QueryHandler};
use crate::types::{ExtractedEntities, QueryType};

pub const COUNT_COLUMN: &str = "patient_count";

/// Handler for `PATIENT_COUNT`: one row, one column.
pub struct PatientCountHandler;

#[async_trait]
impl QueryHandler for PatientCountHandler {
    fn query_type(&self) -> QueryType {
        QueryType::PatientCount
    }

    async fn execute(
        &self,
        _entities: &ExtractedEntities,
        store: &dyn RecordStore,
        ctx: &HandlerContext,
    ) -> Result<QueryResult, DispatchError> {
        let count = lookup(ctx, "count_patients", store.count_patients()).await?;
        let mut result = table(&[COUNT_COLUMN])?;
        result.push_row([(COUNT_COLUMN, CellValue::from(count))])?;
        Ok(result)
    }
}
