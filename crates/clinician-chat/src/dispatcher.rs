//! Query dispatcher: routes a classified query to its handler and stamps the
//! result with execution metadata.

use std::sync::Arc;
use std::time::Instant;

use chrono::{Local, NaiveDate};

use clinician_core::config::AssistantConfig;
use clinician_core::query_result::{QueryResult, ResultMetadata};
use clinician_core::store::RecordStore;

use crate::error::DispatchError;
use crate::handler::{HandlerContext, HandlerRegistry};
use crate::types::{ExtractedEntities, QueryType};

/// Runs handlers against the record store. Lookups are never retried.
pub struct QueryDispatcher {
    registry: HandlerRegistry,
    store: Arc<dyn RecordStore>,
    config: AssistantConfig,
}

impl QueryDispatcher {
    pub fn new(store: Arc<dyn RecordStore>, config: AssistantConfig) -> Self {
        Self::with_registry(HandlerRegistry::with_defaults(), store, config)
    }

    pub fn with_registry(
        registry: HandlerRegistry,
        store: Arc<dyn RecordStore>,
        config: AssistantConfig,
    ) -> Self {
        Self {
            registry,
            store,
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Dispatch with relative dates anchored on the local date.
    pub async fn dispatch(
        &self,
        query_type: QueryType,
        entities: &ExtractedEntities,
        query_text: &str,
    ) -> Result<QueryResult, DispatchError> {
        self.dispatch_at(query_type, entities, query_text, Local::now().date_naive())
            .await
    }

    /// Dispatch with relative dates anchored on `today`.
    pub async fn dispatch_at(
        &self,
        query_type: QueryType,
        entities: &ExtractedEntities,
        query_text: &str,
        today: NaiveDate,
    ) -> Result<QueryResult, DispatchError> {
        let handler = self
            .registry
            .get(query_type)
            .ok_or(DispatchError::Unsupported(query_type))?;
        let ctx = HandlerContext::new(&self.config, today);

        let started = Instant::now();
        let mut result = handler
            .execute(entities, self.store.as_ref(), &ctx)
            .await?;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let total = result.len();
        if total > self.config.max_result_rows {
            tracing::debug!(
                query_type = %query_type,
                total,
                max = self.config.max_result_rows,
                "Truncating result rows"
            );
            result.truncate(self.config.max_result_rows);
        }
        result.set_metadata(ResultMetadata {
            query_text: Some(query_text.to_string()),
            row_count: Some(total),
            execution_time_ms: Some(elapsed_ms),
        });

        tracing::debug!(
            query_type = %query_type,
            row_count = total,
            elapsed_ms,
            "Dispatch complete"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinician_core::query_result::CellValue;
    use clinician_core::types::{Patient, PatientStatus};
    use clinician_storage::MemoryRecordStore;

    use crate::handler::count::COUNT_COLUMN;
    use crate::types::PatientRef;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 15).unwrap()
    }

    fn store_with(n: usize) -> Arc<MemoryRecordStore> {
        let store = MemoryRecordStore::new();
        for i in 0..n {
            store.add_patient(Patient {
                identifier: format!("{:06}", 200_000 + i),
                name: format!("Alex Smith{}", i),
                date_of_birth: None,
                status: PatientStatus::Active,
            });
        }
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_count_sets_metadata() {
        let dispatcher = QueryDispatcher::new(store_with(12), AssistantConfig::default());
        let result = dispatcher
            .dispatch_at(
                QueryType::PatientCount,
                &ExtractedEntities::default(),
                "How many patients?",
                today(),
            )
            .await
            .unwrap();
        assert_eq!(result.value(0, COUNT_COLUMN), Some(&CellValue::Integer(12)));
        let meta = result.metadata().unwrap();
        assert_eq!(meta.query_text.as_deref(), Some("How many patients?"));
        assert_eq!(meta.row_count, Some(1));
        assert!(meta.execution_time_ms.is_some());
    }

    #[tokio::test]
    async fn test_rows_capped_at_max() {
        let config = AssistantConfig {
            max_result_rows: 5,
            ..Default::default()
        };
        let dispatcher = QueryDispatcher::new(store_with(8), config);
        let entities = ExtractedEntities {
            patient: Some(PatientRef::Name("Alex".into())),
            ..Default::default()
        };
        let result = dispatcher
            .dispatch_at(QueryType::PatientSearch, &entities, "Find Alex", today())
            .await
            .unwrap();
        assert_eq!(result.len(), 5);
        assert_eq!(result.metadata().unwrap().row_count, Some(8));
    }

    #[tokio::test]
    async fn test_unknown_is_unsupported() {
        let dispatcher = QueryDispatcher::new(store_with(1), AssistantConfig::default());
        let err = dispatcher
            .dispatch_at(QueryType::Unknown, &ExtractedEntities::default(), "?", today())
            .await
            .unwrap_err();
        assert_eq!(err, DispatchError::Unsupported(QueryType::Unknown));
    }

    #[tokio::test]
    async fn test_outage_surfaces_as_lookup_error() {
        let store = store_with(3);
        store.set_unavailable(true);
        let dispatcher = QueryDispatcher::new(store, AssistantConfig::default());
        let err = dispatcher
            .dispatch_at(
                QueryType::PatientCount,
                &ExtractedEntities::default(),
                "How many patients?",
                today(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Lookup(_)));
    }
}
