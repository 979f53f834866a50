//! Pipeline types shared by the extractor, classifier, dispatcher, and
//! response generator.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use clinician_core::types::DateRange;

/// The closed catalogue of questions the assistant can answer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryType {
    PatientCount,
    PatientSearch,
    PatientGoalProgress,
    ExpiringBudgets,
    CaregiverLookup,
    PatientBudget,
    SessionHistory,
    Unknown,
}

impl QueryType {
    /// Every answerable type, in registration order.
    pub const ANSWERABLE: [QueryType; 7] = [
        QueryType::PatientCount,
        QueryType::PatientSearch,
        QueryType::PatientGoalProgress,
        QueryType::ExpiringBudgets,
        QueryType::CaregiverLookup,
        QueryType::PatientBudget,
        QueryType::SessionHistory,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::PatientCount => "PATIENT_COUNT",
            QueryType::PatientSearch => "PATIENT_SEARCH",
            QueryType::PatientGoalProgress => "PATIENT_GOAL_PROGRESS",
            QueryType::ExpiringBudgets => "EXPIRING_BUDGETS",
            QueryType::CaregiverLookup => "CAREGIVER_LOOKUP",
            QueryType::PatientBudget => "PATIENT_BUDGET",
            QueryType::SessionHistory => "SESSION_HISTORY",
            QueryType::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the user referred to a patient.
///
/// Name and identifier only travel together when one pattern matched both,
/// so an unrelated name and number in the same question are never paired.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PatientRef {
    Identifier(String),
    Name(String),
    NameAndIdentifier { name: String, identifier: String },
}

/// Entities recognised in a single question.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtractedEntities {
    pub patient: Option<PatientRef>,
    pub date_range: Option<DateRange>,
    pub free_keywords: BTreeSet<String>,
}

impl ExtractedEntities {
    pub fn patient_identifier(&self) -> Option<&str> {
        match &self.patient {
            Some(PatientRef::Identifier(id)) => Some(id),
            Some(PatientRef::NameAndIdentifier { identifier, .. }) => Some(identifier),
            _ => None,
        }
    }

    pub fn patient_name(&self) -> Option<&str> {
        match &self.patient {
            Some(PatientRef::Name(name)) => Some(name),
            Some(PatientRef::NameAndIdentifier { name, .. }) => Some(name),
            _ => None,
        }
    }

    pub fn has_patient(&self) -> bool {
        self.patient.is_some()
    }

    /// Human-readable description of the referenced patient, for responses.
    pub fn patient_label(&self) -> Option<String> {
        match &self.patient {
            Some(PatientRef::Identifier(id)) => Some(format!("patient {}", id)),
            Some(PatientRef::Name(name)) => Some(name.clone()),
            Some(PatientRef::NameAndIdentifier { name, identifier }) => {
                Some(format!("{} ({})", name, identifier))
            }
            None => None,
        }
    }
}

/// Output of the entity extractor: a tentative type plus what was found.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractionResult {
    pub query_type: QueryType,
    pub entities: ExtractedEntities,
}

impl ExtractionResult {
    pub fn unknown() -> Self {
        Self {
            query_type: QueryType::Unknown,
            entities: ExtractedEntities::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_type_wire_names() {
        let json = serde_json::to_string(&QueryType::PatientGoalProgress).unwrap();
        assert_eq!(json, "\"PATIENT_GOAL_PROGRESS\"");
        assert_eq!(QueryType::ExpiringBudgets.to_string(), "EXPIRING_BUDGETS");
        assert!(!QueryType::ANSWERABLE.contains(&QueryType::Unknown));
    }

    #[test]
    fn test_combined_ref_exposes_both() {
        let entities = ExtractedEntities {
            patient: Some(PatientRef::NameAndIdentifier {
                name: "Radwan Smith".into(),
                identifier: "404924".into(),
            }),
            ..Default::default()
        };
        assert_eq!(entities.patient_identifier(), Some("404924"));
        assert_eq!(entities.patient_name(), Some("Radwan Smith"));
        assert_eq!(
            entities.patient_label().as_deref(),
            Some("Radwan Smith (404924)")
        );
    }

    #[test]
    fn test_identifier_ref_has_no_name() {
        let entities = ExtractedEntities {
            patient: Some(PatientRef::Identifier("123456".into())),
            ..Default::default()
        };
        assert_eq!(entities.patient_identifier(), Some("123456"));
        assert_eq!(entities.patient_name(), None);
    }
}
