//! Response generator: turns a dispatch outcome into assistant text and,
//! for multi-row results, the table to visualise.
//!
//! Every query type has one template with three shapes: nothing found, a
//! single row named explicitly, and a plural summary with the table
//! attached. Number formatting lives here and nowhere else.

use std::collections::BTreeSet;

use clinician_core::query_result::{CellValue, QueryResult, Row};

use crate::error::DispatchError;
use crate::handler::count::COUNT_COLUMN;
use crate::types::{ExtractedEntities, QueryType};

/// Reply for questions the assistant cannot classify.
pub const FALLBACK_TEXT: &str = "I'm not sure how to answer that. Try asking something like:\n\
- How many patients do we have?\n\
- Find patient-123456\n\
- What is the goal progress for Radwan Smith?\n\
- Which budgets are expiring next month?\n\
- Who are the caregivers for John Smith?\n\
- Show sessions last week";

/// Reply when the record store could not be reached.
pub const LOOKUP_FAILED_TEXT: &str =
    "Sorry, I couldn't reach the clinical records just now. Please try again in a moment.";

/// Assistant text plus the optional table for the visualization client.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedResponse {
    pub text: String,
    pub query_result: Option<QueryResult>,
}

impl RenderedResponse {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            query_result: None,
        }
    }
}

/// Stateless renderer.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResponseGenerator;

impl ResponseGenerator {
    pub fn new() -> Self {
        Self
    }

    /// The reply for an unclassifiable question.
    pub fn fallback(&self) -> RenderedResponse {
        RenderedResponse::text(FALLBACK_TEXT)
    }

    pub fn render(
        &self,
        query_type: QueryType,
        outcome: Result<&QueryResult, &DispatchError>,
        entities: &ExtractedEntities,
    ) -> RenderedResponse {
        let result = match (query_type, outcome) {
            (QueryType::Unknown, _) | (_, Err(DispatchError::Unsupported(_))) => {
                return self.fallback()
            }
            (_, Err(DispatchError::Lookup(_))) => {
                return RenderedResponse::text(LOOKUP_FAILED_TEXT)
            }
            (_, Err(DispatchError::NotFound { entity, term })) => {
                return RenderedResponse::text(if term.is_empty() {
                    format!(
                        "I couldn't tell which {} you meant. Try giving a name or identifier.",
                        entity
                    )
                } else {
                    format!("I couldn't find a {} matching \"{}\".", entity, term)
                })
            }
            (_, Ok(result)) => result,
        };

        let subject = subject(result, entities);
        let text = match query_type {
            QueryType::PatientCount => render_count(result),
            QueryType::PatientSearch => render_search(result, &subject),
            QueryType::PatientGoalProgress => render_goals(result, &subject),
            QueryType::ExpiringBudgets => render_expiring(result, &subject),
            QueryType::CaregiverLookup => render_caregivers(result, &subject),
            QueryType::PatientBudget => render_budget(result, &subject),
            QueryType::SessionHistory => {
                render_sessions(result, &subject, entities.has_patient())
            }
            QueryType::Unknown => return self.fallback(),
        };

        let text = match truncation_note(result) {
            Some(note) => format!("{} {}", text, note),
            None => text,
        };
        let query_result = (result.len() > 1).then(|| result.clone());
        RenderedResponse { text, query_result }
    }
}

// =============================================================================
// Templates
// =============================================================================

fn render_count(result: &QueryResult) -> String {
    let count = result
        .value(0, COUNT_COLUMN)
        .and_then(CellValue::as_f64)
        .unwrap_or(0.0) as u64;
    if count == 1 {
        "There is 1 patient in the practice.".to_string()
    } else {
        format!(
            "There are {} in the practice.",
            format_count(count, "patient", "patients")
        )
    }
}

fn render_search(result: &QueryResult, subject: &str) -> String {
    match result.rows() {
        [] => format!("No patients matched {}.", subject),
        [row] => {
            let mut text = format!(
                "Found {} (ID {}), status {}",
                cell(row, "name"),
                cell(row, "identifier"),
                cell(row, "status")
            );
            if let Some(dob) = row.get("date_of_birth").and_then(CellValue::as_str) {
                text.push_str(&format!(", born {}", dob));
            }
            text.push('.');
            text
        }
        rows => format!(
            "{} match \"{}\". They are listed in the table below.",
            format_count(rows.len() as u64, "patient", "patients"),
            subject
        ),
    }
}

fn render_goals(result: &QueryResult, subject: &str) -> String {
    match result.rows() {
        [] => format!("{} has no goals recorded.", subject),
        [row] => format!(
            "{}'s goal \"{}\" is {} complete ({}).",
            cell(row, "patient_name"),
            cell(row, "goal"),
            format_percent(number(row, "progress_percent")),
            cell(row, "status").replace('_', " ")
        ),
        rows => {
            let average =
                rows.iter().map(|r| number(r, "progress_percent")).sum::<f64>() / rows.len() as f64;
            format!(
                "{} has {} with an average progress of {}.",
                subject,
                format_count(rows.len() as u64, "goal", "goals"),
                format_percent(average)
            )
        }
    }
}

fn render_expiring(result: &QueryResult, subject: &str) -> String {
    match result.rows() {
        [] => "No budgets are expiring in that period.".to_string(),
        [row] => format!(
            "{}'s {} budget expires on {} with {} remaining.",
            cell(row, "patient_name"),
            cell(row, "category"),
            cell(row, "end_date"),
            format_currency(number(row, "remaining_amount"))
        ),
        rows => {
            let remaining: f64 = rows.iter().map(|r| number(r, "remaining_amount")).sum();
            let scope = if patient_count(result) == 1 {
                format!(" for {}", subject)
            } else {
                String::new()
            };
            format!(
                "{} expiring{}, with {} remaining in total.",
                format_count(rows.len() as u64, "budget is", "budgets are"),
                scope,
                format_currency(remaining)
            )
        }
    }
}

fn render_caregivers(result: &QueryResult, subject: &str) -> String {
    match result.rows() {
        [] => format!("No caregivers are recorded for {}.", subject),
        [row] => {
            let mut text = format!(
                "{} ({}) is the caregiver for {}",
                cell(row, "caregiver_name"),
                cell(row, "relationship"),
                cell(row, "patient_name")
            );
            if let Some(phone) = row.get("phone").and_then(CellValue::as_str) {
                text.push_str(&format!(", phone {}", phone));
            }
            text.push('.');
            text
        }
        rows => {
            let mut text = format!(
                "{} has {}.",
                subject,
                format_count(rows.len() as u64, "caregiver", "caregivers")
            );
            let primary = rows
                .iter()
                .find(|r| r.get("primary").and_then(CellValue::as_str) == Some("yes"));
            if let (Some(primary), 1) = (primary, patient_count(result)) {
                text.push_str(&format!(
                    " {} is the primary contact.",
                    cell(primary, "caregiver_name")
                ));
            }
            text
        }
    }
}

fn render_budget(result: &QueryResult, subject: &str) -> String {
    match result.rows() {
        [] => format!("No budgets are recorded for {}.", subject),
        [row] => {
            let total = number(row, "total_amount");
            let spent = number(row, "spent_amount");
            let used = if total > 0.0 { spent / total * 100.0 } else { 0.0 };
            format!(
                "{}'s {} budget has {} remaining of {} ({} spent).",
                cell(row, "patient_name"),
                cell(row, "category"),
                format_currency(number(row, "remaining_amount")),
                format_currency(total),
                format_percent(used)
            )
        }
        rows => {
            let total: f64 = rows.iter().map(|r| number(r, "total_amount")).sum();
            let remaining: f64 = rows.iter().map(|r| number(r, "remaining_amount")).sum();
            format!(
                "{} has {} with {} remaining of {}.",
                subject,
                format_count(rows.len() as u64, "budget", "budgets"),
                format_currency(remaining),
                format_currency(total)
            )
        }
    }
}

fn render_sessions(result: &QueryResult, subject: &str, patient_named: bool) -> String {
    match result.rows() {
        [] if patient_named => format!("No sessions were found for {} in that period.", subject),
        [] => "No sessions were found in that period.".to_string(),
        [row] => format!(
            "{} had one session: {} on {} ({} minutes).",
            cell(row, "patient_name"),
            cell(row, "session_type"),
            cell(row, "session_date"),
            cell(row, "duration_minutes")
        ),
        rows => {
            let minutes: f64 = rows.iter().map(|r| number(r, "duration_minutes")).sum();
            let scope = if patient_count(result) == 1 {
                format!(" for {}", subject)
            } else {
                String::new()
            };
            format!(
                "Found {}{} totalling {} hours.",
                format_count(rows.len() as u64, "session", "sessions"),
                scope,
                format_hours(minutes)
            )
        }
    }
}

// =============================================================================
// Formatting
// =============================================================================

/// "1 goal" / "3 goals".
pub fn format_count(count: u64, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("1 {}", singular)
    } else {
        format!("{} {}", count, plural)
    }
}

/// Dollars with thousands separators and cents, e.g. "$12,345.60".
pub fn format_currency(amount: f64) -> String {
    let cents = (amount * 100.0).round() as i64;
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.unsigned_abs();
    let dollars = (cents / 100).to_string();

    let mut grouped = String::with_capacity(dollars.len() + dollars.len() / 3);
    for (i, ch) in dollars.chars().enumerate() {
        if i > 0 && (dollars.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{}${}.{:02}", sign, grouped, cents % 100)
}

/// Whole percentages when integral, otherwise one decimal place.
pub fn format_percent(value: f64) -> String {
    if (value - value.round()).abs() < 0.05 {
        format!("{:.0}%", value)
    } else {
        format!("{:.1}%", value)
    }
}

fn format_hours(minutes: f64) -> String {
    let hours = minutes / 60.0;
    if (hours - hours.round()).abs() < 0.05 {
        format!("{:.0}", hours)
    } else {
        format!("{:.1}", hours)
    }
}

// =============================================================================
// Row helpers
// =============================================================================

fn cell(row: &Row, column: &str) -> String {
    match row.get(column) {
        Some(CellValue::Null) | None => "unknown".to_string(),
        Some(value) => value.to_string(),
    }
}

fn number(row: &Row, column: &str) -> f64 {
    row.get(column).and_then(CellValue::as_f64).unwrap_or(0.0)
}

fn patient_count(result: &QueryResult) -> usize {
    result
        .rows()
        .iter()
        .filter_map(|r| r.get("patient_identifier").and_then(CellValue::as_str))
        .collect::<BTreeSet<_>>()
        .len()
}

/// Who the answer is about: the single matched patient's name when the rows
/// agree on one, otherwise how the user referred to them.
fn subject(result: &QueryResult, entities: &ExtractedEntities) -> String {
    if patient_count(result) == 1 {
        if let Some(name) = result.rows()[0]
            .get("patient_name")
            .and_then(CellValue::as_str)
            .filter(|n| !n.is_empty())
        {
            return name.to_string();
        }
    }
    entities
        .patient_label()
        .unwrap_or_else(|| "the practice".to_string())
}

fn truncation_note(result: &QueryResult) -> Option<String> {
    let total = result.metadata()?.row_count?;
    (total > result.len()).then(|| format!("Showing the first {} of {}.", result.len(), total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinician_core::query_result::ResultMetadata;

    use crate::types::PatientRef;

    fn named(name: &str) -> ExtractedEntities {
        ExtractedEntities {
            patient: Some(PatientRef::Name(name.into())),
            ..Default::default()
        }
    }

    fn count_result(n: i64) -> QueryResult {
        let mut r = QueryResult::new([COUNT_COLUMN]).unwrap();
        r.push_row([(COUNT_COLUMN, CellValue::Integer(n))]).unwrap();
        r
    }

    #[test]
    fn test_unknown_is_fixed_fallback_without_table() {
        let g = ResponseGenerator::new();
        let table = count_result(3);
        let out = g.render(QueryType::Unknown, Ok(&table), &ExtractedEntities::default());
        assert_eq!(out.text, FALLBACK_TEXT);
        assert!(out.query_result.is_none());
        assert_eq!(g.fallback(), out);
    }

    #[test]
    fn test_count_contains_numeral() {
        let g = ResponseGenerator::new();
        let out = g.render(
            QueryType::PatientCount,
            Ok(&count_result(42)),
            &ExtractedEntities::default(),
        );
        assert!(out.text.contains("42"));
        assert!(out.query_result.is_none());

        let out = g.render(
            QueryType::PatientCount,
            Ok(&count_result(1)),
            &ExtractedEntities::default(),
        );
        assert_eq!(out.text, "There is 1 patient in the practice.");
    }

    #[test]
    fn test_single_search_row_names_patient() {
        let mut table = QueryResult::new(["name", "identifier", "date_of_birth", "status"]).unwrap();
        table
            .push_row([
                ("name", CellValue::from("Radwan Smith")),
                ("identifier", CellValue::from("404924")),
                ("status", CellValue::from("active")),
            ])
            .unwrap();
        let out = ResponseGenerator::new().render(
            QueryType::PatientSearch,
            Ok(&table),
            &named("Radwan Smith"),
        );
        assert_eq!(out.text, "Found Radwan Smith (ID 404924), status active.");
        assert!(out.query_result.is_none());
    }

    #[test]
    fn test_multiple_matches_attach_table() {
        let mut table = QueryResult::new(["name", "identifier", "date_of_birth", "status"]).unwrap();
        for (name, id) in [("John Smith", "123456"), ("Radwan Smith", "404924")] {
            table
                .push_row([
                    ("name", CellValue::from(name)),
                    ("identifier", CellValue::from(id)),
                ])
                .unwrap();
        }
        let out =
            ResponseGenerator::new().render(QueryType::PatientSearch, Ok(&table), &named("Smith"));
        assert!(out.text.starts_with("2 patients match \"Smith\""));
        assert_eq!(out.query_result.as_ref(), Some(&table));
    }

    #[test]
    fn test_empty_goals_names_subject() {
        let table = QueryResult::new(crate::handler::goal::COLUMNS).unwrap();
        let out = ResponseGenerator::new().render(
            QueryType::PatientGoalProgress,
            Ok(&table),
            &named("Maria Lopez"),
        );
        assert_eq!(out.text, "Maria Lopez has no goals recorded.");
        assert!(out.query_result.is_none());
    }

    #[test]
    fn test_empty_sessions_mention_named_patient() {
        let table = QueryResult::new(crate::handler::session::COLUMNS).unwrap();
        let g = ResponseGenerator::new();
        let out = g.render(QueryType::SessionHistory, Ok(&table), &named("John Smith"));
        assert_eq!(out.text, "No sessions were found for John Smith in that period.");

        let out = g.render(QueryType::SessionHistory, Ok(&table), &ExtractedEntities::default());
        assert_eq!(out.text, "No sessions were found in that period.");
    }

    #[test]
    fn test_not_found_and_lookup_errors() {
        let g = ResponseGenerator::new();
        let err = DispatchError::NotFound {
            entity: "patient",
            term: "Jane Doe".into(),
        };
        let out = g.render(QueryType::PatientSearch, Err(&err), &named("Jane Doe"));
        assert_eq!(out.text, "I couldn't find a patient matching \"Jane Doe\".");
        assert!(out.query_result.is_none());

        let err = DispatchError::Lookup("timed out".into());
        let out = g.render(QueryType::PatientCount, Err(&err), &ExtractedEntities::default());
        assert_eq!(out.text, LOOKUP_FAILED_TEXT);
    }

    #[test]
    fn test_budget_single_row_formats_currency() {
        let mut table = QueryResult::new(crate::handler::budget::PATIENT_BUDGET_COLUMNS).unwrap();
        table
            .push_row([
                ("patient_name", CellValue::from("Radwan Smith")),
                ("patient_identifier", CellValue::from("404924")),
                ("category", CellValue::from("Core supports")),
                ("total_amount", CellValue::from(12_000.0)),
                ("spent_amount", CellValue::from(9_000.0)),
                ("remaining_amount", CellValue::from(3_000.0)),
            ])
            .unwrap();
        let out = ResponseGenerator::new().render(
            QueryType::PatientBudget,
            Ok(&table),
            &named("Radwan Smith"),
        );
        assert_eq!(
            out.text,
            "Radwan Smith's Core supports budget has $3,000.00 remaining of $12,000.00 (75% spent)."
        );
    }

    #[test]
    fn test_truncation_note() {
        let mut table = QueryResult::new(["name", "identifier"]).unwrap();
        for i in 0..3 {
            table
                .push_row([("name", CellValue::from(format!("P{}", i)))])
                .unwrap();
        }
        table.set_metadata(ResultMetadata {
            row_count: Some(10),
            ..Default::default()
        });
        let out =
            ResponseGenerator::new().render(QueryType::PatientSearch, Ok(&table), &named("P"));
        assert!(out.text.ends_with("Showing the first 3 of 10."));
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(0.0), "$0.00");
        assert_eq!(format_currency(1234.5), "$1,234.50");
        assert_eq!(format_currency(1_234_567.891), "$1,234,567.89");
        assert_eq!(format_currency(-42.0), "-$42.00");
        assert_eq!(format_currency(999.999), "$1,000.00");
    }

    #[test]
    fn test_format_percent_and_count() {
        assert_eq!(format_percent(65.0), "65%");
        assert_eq!(format_percent(33.333), "33.3%");
        assert_eq!(format_count(1, "goal", "goals"), "1 goal");
        assert_eq!(format_count(0, "goal", "goals"), "0 goals");
    }
}
