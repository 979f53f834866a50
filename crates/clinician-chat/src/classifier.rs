//! Query classifier: validates that a tentative query type has the entities
//! it needs, downgrading to [`QueryType::Unknown`] otherwise.

use crate::types::{ExtractionResult, QueryType};

/// Entity shape a query type requires before it can be dispatched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Requirement {
    None,
    Patient,
}

impl Requirement {
    pub fn for_type(query_type: QueryType) -> Self {
        match query_type {
            QueryType::PatientSearch
            | QueryType::PatientGoalProgress
            | QueryType::CaregiverLookup
            | QueryType::PatientBudget => Requirement::Patient,
            // Session history falls back to the configured look-back window.
            QueryType::PatientCount
            | QueryType::ExpiringBudgets
            | QueryType::SessionHistory
            | QueryType::Unknown => Requirement::None,
        }
    }
}

/// Stateless classifier over extraction output.
#[derive(Debug, Default, Clone, Copy)]
pub struct QueryClassifier;

impl QueryClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Final query type for an extraction result.
    pub fn classify(&self, result: &ExtractionResult) -> QueryType {
        let entities = &result.entities;
        let satisfied = match Requirement::for_type(result.query_type) {
            Requirement::None => true,
            Requirement::Patient => entities.has_patient(),
        };

        if satisfied {
            result.query_type
        } else {
            tracing::debug!(
                tentative = %result.query_type,
                "Classification rejected: required entity missing"
            );
            QueryType::Unknown
        }
    }
}
