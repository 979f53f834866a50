//! Entity extractor: an ordered cascade of lexical rules over the raw question.
//!
//! Patient references are matched most-specific-first (combined
//! name + identifier, identifier, verb + name, preposition + name,
//! auxiliary verb + subject name, possessive name) and the first rule to
//! produce a reference wins. Intent
//! keyword rules are scanned independently and also evaluated in fixed order.
//! Date ranges are resolved against an explicit "today".

use std::collections::BTreeSet;
use std::sync::LazyLock;

use chrono::{Datelike, Duration, Local, NaiveDate};
use regex::{Captures, Regex};

use clinician_core::types::DateRange;

use crate::types::{ExtractedEntities, ExtractionResult, PatientRef, QueryType};

// =============================================================================
// Patient reference rules
// =============================================================================

struct EntityRule {
    name: &'static str,
    pattern: Regex,
    produce: fn(&Captures<'_>) -> Option<PatientRef>,
}

/// One capitalised name word; inner hyphens must be followed by a letter.
const NAME_WORD: &str = r"[A-Z][a-zA-Z']+(?:-[A-Za-z][a-zA-Z']*)*";

/// Same, without apostrophes, for names ahead of a possessive `'s`.
const BARE_NAME_WORD: &str = r"[A-Z][a-zA-Z]+(?:-[A-Za-z]+)*";

static ENTITY_RULES: LazyLock<Vec<EntityRule>> = LazyLock::new(|| {
    let re = |p: String| Regex::new(&p).expect("Invalid entity regex");
    let name = format!(r"({w}(?:\s+{w}){{0,2}})", w = NAME_WORD);
    vec![
        EntityRule {
            name: "name_and_identifier",
            pattern: re(format!(
                r"\b({w}\s+{w})[-\s](\d{{6}})\b",
                w = NAME_WORD
            )),
            produce: |caps| {
                let name = clean_name(&caps[1])?;
                Some(PatientRef::NameAndIdentifier {
                    name,
                    identifier: caps[2].to_string(),
                })
            },
        },
        EntityRule {
            name: "identifier",
            pattern: re(
                r"(?i)\b(?:patient|client)(?:\s+(?:id|number|no\.?))?[-\s#:]*(\d{6})\b".to_string(),
            ),
            produce: |caps| Some(PatientRef::Identifier(caps[1].to_string())),
        },
        EntityRule {
            name: "verb_name",
            pattern: re(format!(
                r"(?i:\b(?:find|show(?:\s+me)?|look\s+up|lookup|search\s+for|get))\s+{}",
                name
            )),
            produce: |caps| clean_name(&caps[1]).map(PatientRef::Name),
        },
        EntityRule {
            name: "preposition_name",
            pattern: re(format!(r"(?i:\b(?:for|of|about))\s+{}", name)),
            produce: |caps| clean_name(&caps[1]).map(PatientRef::Name),
        },
        EntityRule {
            name: "auxiliary_subject_name",
            pattern: re(format!(r"(?i:\b(?:did|does|do|has|have|is|was))\s+{}", name)),
            produce: |caps| clean_name(&caps[1]).map(PatientRef::Name),
        },
        EntityRule {
            name: "possessive_name",
            pattern: re(format!(
                r"\b({w}(?:\s+{w}){{0,2}})['\u{{2019}}]s\b",
                w = BARE_NAME_WORD
            )),
            produce: |caps| clean_name(&caps[1]).map(PatientRef::Name),
        },
    ]
});

/// Words that are never part of a patient name.
const NAME_STOP_WORDS: &[&str] = &[
    "a", "all", "any", "are", "budget", "budgets", "caregiver", "caregivers", "carer", "carers",
    "client", "clients", "count", "expiring", "find", "get", "goal", "goals", "how", "id", "is", "last",
    "list", "me", "month", "my", "next", "no", "number", "our", "patient", "patients", "progress",
    "session", "sessions", "appointment", "appointments", "show", "the", "this", "today", "week",
    "what", "which", "who", "monday", "tuesday", "wednesday", "thursday", "friday", "saturday",
    "sunday", "january", "february", "march", "april", "june", "july", "august", "september",
    "october", "november", "december",
];

fn is_name_stop_word(word: &str) -> bool {
    NAME_STOP_WORDS.contains(&word.to_lowercase().as_str())
}

/// Trim leading stop words, cut at the first trailing one, and drop a
/// possessive suffix. `None` when nothing name-like remains.
fn clean_name(raw: &str) -> Option<String> {
    let words: Vec<&str> = raw
        .split_whitespace()
        .map(|w| {
            w.strip_suffix("'s")
                .or_else(|| w.strip_suffix("\u{2019}s"))
                .unwrap_or(w)
        })
        .map(|w| w.trim_end_matches('\''))
        .skip_while(|w| is_name_stop_word(w))
        .take_while(|w| !is_name_stop_word(w))
        .filter(|w| !w.is_empty())
        .collect();
    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}

// =============================================================================
// Intent keyword rules
// =============================================================================

/// How a keyword rule interacts with a captured patient reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntentScope {
    /// Question about the whole practice; naming a patient turns it into a search.
    Aggregate,
    /// Question about one patient; the reference is required downstream.
    PatientScoped,
    /// Practice-wide unless a patient is named.
    PatientOptional,
}

struct IntentRule {
    query_type: QueryType,
    scope: IntentScope,
    pattern: Regex,
}

static INTENT_RULES: LazyLock<Vec<IntentRule>> = LazyLock::new(|| {
    let rule = |query_type, scope, p: &str| IntentRule {
        query_type,
        scope,
        pattern: Regex::new(p).expect("Invalid intent regex"),
    };
    vec![
        rule(
            QueryType::PatientCount,
            IntentScope::Aggregate,
            r"(?i)\bhow\s+many\s+(?:active\s+|current\s+)?(?:patients|clients)\b|\b(?:number|count|total)\s+of\s+(?:active\s+)?(?:patients|clients)\b|\b(?:patient|client)\s+count\b",
        ),
        // Checked before the per-patient budget rule.
        rule(
            QueryType::ExpiringBudgets,
            IntentScope::PatientOptional,
            r"(?i)\bbudgets?\b.*\b(?:expir\w*|ending|end|lapse\w*|run(?:ning)?\s+out)\b|\b(?:expir\w*|ending|lapsing)\b.*\bbudgets?\b",
        ),
        rule(
            QueryType::PatientGoalProgress,
            IntentScope::PatientScoped,
            r"(?i)\bgoals?\b|\bprogress\b",
        ),
        rule(
            QueryType::CaregiverLookup,
            IntentScope::PatientScoped,
            r"(?i)\b(?:caregivers?|care\s+givers?|carers?|guardians?|support\s+workers?|family\s+contacts?)\b",
        ),
        rule(
            QueryType::PatientBudget,
            IntentScope::PatientScoped,
            r"(?i)\b(?:budgets?|funding|funds|spent|spending|remaining)\b",
        ),
        rule(
            QueryType::SessionHistory,
            IntentScope::PatientOptional,
            r"(?i)\b(?:sessions?|appointments?|visits?)\b",
        ),
    ]
});

// =============================================================================
// Date ranges
// =============================================================================

struct DatePatterns {
    between: Regex,
    next_days: Regex,
    past_days: Regex,
    next_week: Regex,
    last_week: Regex,
    this_week: Regex,
    next_month: Regex,
    last_month: Regex,
    this_month: Regex,
    today: Regex,
}

static DATE_PATTERNS: LazyLock<DatePatterns> = LazyLock::new(|| DatePatterns {
    between: Regex::new(
        r"(?i)\b(?:between|from)\s+(\d{4}-\d{2}-\d{2})\s+(?:and|to|until)\s+(\d{4}-\d{2}-\d{2})\b",
    )
    .unwrap(),
    next_days: Regex::new(r"(?i)\b(?:next|coming|within(?:\s+the\s+next)?)\s+(\d{1,4})\s+days?\b")
        .unwrap(),
    past_days: Regex::new(r"(?i)\b(?:last|past|previous)\s+(\d{1,4})\s+days?\b").unwrap(),
    next_week: Regex::new(r"(?i)\bnext\s+week\b").unwrap(),
    last_week: Regex::new(r"(?i)\blast\s+week\b").unwrap(),
    this_week: Regex::new(r"(?i)\bthis\s+week\b").unwrap(),
    next_month: Regex::new(r"(?i)\bnext\s+month\b").unwrap(),
    last_month: Regex::new(r"(?i)\blast\s+month\b").unwrap(),
    this_month: Regex::new(r"(?i)\bthis\s+month\b").unwrap(),
    today: Regex::new(r"(?i)\btoday\b").unwrap(),
});

/// Longest relative window accepted, in days.
const MAX_RELATIVE_DAYS: i64 = 3650;

fn month_range(year: i32, month: u32) -> Option<DateRange> {
    let start = NaiveDate::from_ymd_opt(year, month, 1)?;
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    let end = NaiveDate::from_ymd_opt(next_year, next_month, 1)? - Duration::days(1);
    Some(DateRange::new(start, end))
}

fn week_range(today: NaiveDate, weeks_offset: i64) -> DateRange {
    let monday = today - Duration::days(today.weekday().num_days_from_monday() as i64)
        + Duration::weeks(weeks_offset);
    DateRange::new(monday, monday + Duration::days(6))
}

/// Resolve the first recognised date expression in `query` relative to `today`.
pub fn extract_date_range(query: &str, today: NaiveDate) -> Option<DateRange> {
    let p = &*DATE_PATTERNS;

    // An impossible calendar date leaves the remaining expressions in play.
    let explicit = p.between.captures(query).and_then(|caps| {
        let start = NaiveDate::parse_from_str(&caps[1], "%Y-%m-%d").ok()?;
        let end = NaiveDate::parse_from_str(&caps[2], "%Y-%m-%d").ok()?;
        Some(DateRange::new(start, end))
    });
    if explicit.is_some() {
        return explicit;
    }
    if let Some(caps) = p.next_days.captures(query) {
        let days = caps[1].parse::<i64>().ok()?.min(MAX_RELATIVE_DAYS);
        return Some(DateRange::new(today, today + Duration::days(days)));
    }
    if let Some(caps) = p.past_days.captures(query) {
        let days = caps[1].parse::<i64>().ok()?.min(MAX_RELATIVE_DAYS);
        return Some(DateRange::new(today - Duration::days(days), today));
    }
    if p.next_week.is_match(query) {
        return Some(week_range(today, 1));
    }
    if p.last_week.is_match(query) {
        return Some(week_range(today, -1));
    }
    if p.this_week.is_match(query) {
        return Some(week_range(today, 0));
    }
    if p.next_month.is_match(query) {
        let (y, m) = if today.month() == 12 {
            (today.year() + 1, 1)
        } else {
            (today.year(), today.month() + 1)
        };
        return month_range(y, m);
    }
    if p.last_month.is_match(query) {
        let (y, m) = if today.month() == 1 {
            (today.year() - 1, 12)
        } else {
            (today.year(), today.month() - 1)
        };
        return month_range(y, m);
    }
    if p.this_month.is_match(query) {
        return month_range(today.year(), today.month());
    }
    if p.today.is_match(query) {
        return Some(DateRange::new(today, today));
    }
    None
}

// =============================================================================
// Free keywords
// =============================================================================

static WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Za-z][A-Za-z']+").unwrap());

const KEYWORD_STOP_WORDS: &[&str] = &[
    "about", "all", "and", "any", "are", "can", "did", "does", "for", "from", "get", "has", "have",
    "how", "many", "me", "much", "of", "our", "show", "tell", "that", "the", "their", "there",
    "this", "what", "when", "which", "who", "whose", "with", "find", "look", "lookup", "please",
    "give", "list",
];

fn free_keywords(query: &str, patient: Option<&PatientRef>) -> BTreeSet<String> {
    let name_words: Vec<String> = match patient {
        Some(PatientRef::Name(name)) | Some(PatientRef::NameAndIdentifier { name, .. }) => {
            name.split(|c: char| c.is_whitespace() || c == '-')
                .filter(|w| !w.is_empty())
                .map(str::to_lowercase)
                .collect()
        }
        _ => Vec::new(),
    };
    WORD_RE
        .find_iter(query)
        .map(|m| m.as_str().trim_end_matches("'s").to_lowercase())
        .filter(|w| w.len() >= 3)
        .filter(|w| !KEYWORD_STOP_WORDS.contains(&w.as_str()))
        .filter(|w| !name_words.contains(w))
        .collect()
}

// =============================================================================
// Extractor
// =============================================================================

/// Stateless entity extractor. Never fails; unmatched input yields
/// [`QueryType::Unknown`] with empty entities.
#[derive(Debug, Default, Clone, Copy)]
pub struct EntityExtractor;

impl EntityExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract entities, resolving relative dates against the local date.
    pub fn extract(&self, query: &str) -> ExtractionResult {
        self.extract_at(query, Local::now().date_naive())
    }

    /// Extract entities, resolving relative dates against `today`.
    pub fn extract_at(&self, query: &str, today: NaiveDate) -> ExtractionResult {
        let query = query.trim();
        if query.is_empty() {
            return ExtractionResult::unknown();
        }

        let patient = match_patient(query);
        let intent = INTENT_RULES.iter().find(|r| r.pattern.is_match(query));

        let query_type = match (intent, &patient) {
            (Some(rule), Some(_)) if rule.scope == IntentScope::Aggregate => {
                QueryType::PatientSearch
            }
            (Some(rule), _) => rule.query_type,
            (None, Some(_)) => QueryType::PatientSearch,
            (None, None) => {
                tracing::debug!(query = %query, "No extraction rule matched");
                return ExtractionResult::unknown();
            }
        };

        let entities = ExtractedEntities {
            date_range: extract_date_range(query, today),
            free_keywords: free_keywords(query, patient.as_ref()),
            patient,
        };

        tracing::debug!(
            query_type = %query_type,
            has_patient = entities.has_patient(),
            has_date_range = entities.date_range.is_some(),
            "Extracted entities"
        );

        ExtractionResult {
            query_type,
            entities,
        }
    }
}

fn match_patient(query: &str) -> Option<PatientRef> {
    for rule in ENTITY_RULES.iter() {
        for caps in rule.pattern.captures_iter(query) {
            if let Some(found) = (rule.produce)(&caps) {
                tracing::trace!(rule = rule.name, "Patient reference matched");
                return Some(found);
            }
        }
    }
    None
}
