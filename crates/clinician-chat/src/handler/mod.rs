//! Dispatch handler trait and the registry keyed by query type.
//!
//! Each answerable [`QueryType`] has exactly one handler. Adding a type means
//! adding a handler module and registering it in
//! [`HandlerRegistry::with_defaults`]; existing handlers are untouched.

pub mod budget;
pub mod caregiver;
pub mod count;
pub mod goal;
pub mod patient;
pub mod session;

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;

use clinician_core::config::AssistantConfig;
use clinician_core::query_result::QueryResult;
use clinician_core::store::RecordStore;
use clinician_core::types::Patient;

use crate::error::DispatchError;
use crate::types::{ExtractedEntities, QueryType};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Per-dispatch settings handed to every handler.
#[derive(Debug, Clone)]
pub struct HandlerContext {
    pub today: NaiveDate,
    pub lookup_timeout: Duration,
    pub expiring_budget_days: u32,
    pub session_history_days: u32,
}

impl HandlerContext {
    pub fn new(config: &AssistantConfig, today: NaiveDate) -> Self {
        Self {
            today,
            lookup_timeout: Duration::from_millis(config.lookup_timeout_ms),
            expiring_budget_days: config.expiring_budget_days,
            session_history_days: config.session_history_days,
        }
    }
}

/// A data-access routine answering one query type.
#[async_trait]
pub trait QueryHandler: Send + Sync {
    fn query_type(&self) -> QueryType;

    /// Run the lookup and shape the rows. Every row must carry every column.
    async fn execute(
        &self,
        entities: &ExtractedEntities,
        store: &dyn RecordStore,
        ctx: &HandlerContext,
    ) -> Result<QueryResult, DispatchError>;
}

/// Static mapping from query type to handler.
pub struct HandlerRegistry {
    handlers: HashMap<QueryType, Box<dyn QueryHandler>>,
}

impl HandlerRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// A registry with a handler for every answerable query type.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(count::PatientCountHandler));
        registry.register(Box::new(patient::PatientSearchHandler));
        registry.register(Box::new(goal::GoalProgressHandler));
        registry.register(Box::new(budget::ExpiringBudgetsHandler));
        registry.register(Box::new(caregiver::CaregiverLookupHandler));
        registry.register(Box::new(budget::PatientBudgetHandler));
        registry.register(Box::new(session::SessionHistoryHandler));
        registry
    }

    /// Register a handler, replacing any previous one for the same type.
    pub fn register(&mut self, handler: Box<dyn QueryHandler>) {
        self.handlers.insert(handler.query_type(), handler);
    }

    pub fn get(&self, query_type: QueryType) -> Option<&dyn QueryHandler> {
        self.handlers.get(&query_type).map(|h| h.as_ref())
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

// =============================================================================
// Shared handler helpers
// =============================================================================

/// Await a store call, bounded by the lookup timeout.
pub(crate) async fn lookup<T, F>(
    ctx: &HandlerContext,
    what: &str,
    call: F,
) -> Result<T, DispatchError>
where
    F: Future<Output = clinician_core::Result<T>>,
{
    match tokio::time::timeout(ctx.lookup_timeout, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            tracing::warn!(lookup = what, error = %e, "Record store lookup failed");
            Err(DispatchError::from(e))
        }
        Err(_) => {
            tracing::warn!(
                lookup = what,
                timeout_ms = ctx.lookup_timeout.as_millis() as u64,
                "Record store lookup timed out"
            );
            Err(DispatchError::Lookup(format!(
                "{} timed out after {} ms",
                what,
                ctx.lookup_timeout.as_millis()
            )))
        }
    }
}

/// Resolve the referenced patient. The identifier is authoritative when both
/// identifier and name are present; a name may resolve to several patients.
pub(crate) async fn resolve_patients(
    entities: &ExtractedEntities,
    store: &dyn RecordStore,
    ctx: &HandlerContext,
) -> Result<Vec<Patient>, DispatchError> {
    if let Some(identifier) = entities.patient_identifier() {
        let found = lookup(
            ctx,
            "find_patient_by_identifier",
            store.find_patient_by_identifier(identifier),
        )
        .await?;
        return match found {
            Some(patient) => Ok(vec![patient]),
            None => Err(DispatchError::NotFound {
                entity: "patient",
                term: entities.patient_label().unwrap_or_else(|| identifier.to_string()),
            }),
        };
    }

    let Some(name) = entities.patient_name() else {
        return Err(DispatchError::NotFound {
            entity: "patient",
            term: String::new(),
        });
    };
    let found = lookup(
        ctx,
        "search_patients_by_name",
        store.search_patients_by_name(name),
    )
    .await?;
    if found.is_empty() {
        return Err(DispatchError::NotFound {
            entity: "patient",
            term: name.to_string(),
        });
    }
    if found.len() > 1 {
        tracing::debug!(name = %name, matches = found.len(), "Name matched several patients");
    }
    Ok(found)
}

pub(crate) fn identifiers(patients: &[Patient]) -> Vec<String> {
    patients.iter().map(|p| p.identifier.clone()).collect()
}

pub(crate) fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Empty result with the given columns.
pub(crate) fn table(columns: &[&str]) -> Result<QueryResult, DispatchError> {
    QueryResult::new(columns.iter().copied()).map_err(DispatchError::from)
}
