use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::query_result::QueryResult;

// =============================================================================
// Clinical records (read-only view of the external record store)
// =============================================================================

/// Enrollment status of a patient.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatientStatus {
    #[default]
    Active,
    Inactive,
    Discharged,
}

impl PatientStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatientStatus::Active => "active",
            PatientStatus::Inactive => "inactive",
            PatientStatus::Discharged => "discharged",
        }
    }

    /// Parse a stored status string, defaulting to `Active` for unknown values.
    pub fn parse(value: &str) -> Self {
        match value {
            "inactive" => PatientStatus::Inactive,
            "discharged" => PatientStatus::Discharged,
            _ => PatientStatus::Active,
        }
    }
}

/// A patient (client) record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    /// Six-digit practice identifier, e.g. "404924".
    pub identifier: String,
    pub name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub status: PatientStatus,
}

/// Lifecycle of a therapy goal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    #[default]
    NotStarted,
    InProgress,
    Achieved,
    Discontinued,
}

impl GoalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalStatus::NotStarted => "not_started",
            GoalStatus::InProgress => "in_progress",
            GoalStatus::Achieved => "achieved",
            GoalStatus::Discontinued => "discontinued",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "in_progress" => GoalStatus::InProgress,
            "achieved" => GoalStatus::Achieved,
            "discontinued" => GoalStatus::Discontinued,
            _ => GoalStatus::NotStarted,
        }
    }
}

/// A therapy goal attached to a patient.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub patient_identifier: String,
    pub patient_name: String,
    pub title: String,
    /// Progress towards the goal, 0.0 to 100.0.
    pub progress_percent: f64,
    pub status: GoalStatus,
    pub target_date: Option<NaiveDate>,
}

/// A funding budget attached to a patient.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Budget {
    pub patient_identifier: String,
    pub patient_name: String,
    pub category: String,
    pub total_amount: f64,
    pub spent_amount: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl Budget {
    /// Unspent funds; never negative.
    pub fn remaining(&self) -> f64 {
        (self.total_amount - self.spent_amount).max(0.0)
    }
}

/// A caregiver (family member, support worker) linked to a patient.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Caregiver {
    pub patient_identifier: String,
    pub patient_name: String,
    pub name: String,
    pub relationship: String,
    pub phone: Option<String>,
    pub is_primary: bool,
}

/// A delivered or scheduled therapy session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TherapySession {
    pub patient_identifier: String,
    pub patient_name: String,
    pub session_date: NaiveDate,
    pub duration_minutes: u32,
    pub session_type: String,
}

/// Inclusive calendar date range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Build a range, swapping the bounds if they arrive reversed.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

// =============================================================================
// Conversations
// =============================================================================

/// Author of a conversation message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

/// A single immutable chat message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_result: Option<QueryResult>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: Role::User,
            content: content.into(),
            created_at: Utc::now(),
            query_result: None,
        }
    }

    pub fn assistant(content: impl Into<String>, query_result: Option<QueryResult>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: Role::Assistant,
            content: content.into(),
            created_at: Utc::now(),
            query_result,
        }
    }
}

/// Observable lifecycle of a conversation. There is no closed state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConversationState {
    Empty,
    Active,
}

/// An append-only chat history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: Uuid,
    pub name: String,
    /// Chronological: insertion order is the order of record.
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_message_at: Option<DateTime<Utc>>,
}

impl Conversation {
    /// A fresh conversation with no messages.
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
            last_message_at: None,
        }
    }

    pub fn state(&self) -> ConversationState {
        if self.messages.is_empty() {
            ConversationState::Empty
        } else {
            ConversationState::Active
        }
    }

    /// Append a message and bump the activity timestamps together.
    pub fn push(&mut self, message: Message) {
        let stamp = message.created_at.max(self.updated_at);
        self.messages.push(message);
        self.updated_at = stamp;
        self.last_message_at = Some(stamp);
    }

    /// Timestamp used for recency ordering; empty conversations rank by creation.
    pub fn activity_at(&self) -> DateTime<Utc> {
        self.last_message_at.unwrap_or(self.created_at)
    }
}

/// Order conversations most recently active first.
pub fn sort_by_recent_activity(conversations: &mut [Conversation]) {
    conversations.sort_by(|a, b| b.activity_at().cmp(&a.activity_at()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_new_conversation_is_empty() {
        let conv = Conversation::new("Intake questions");
        assert_eq!(conv.state(), ConversationState::Empty);
        assert!(conv.last_message_at.is_none());
        assert_eq!(conv.created_at, conv.updated_at);
    }

    #[test]
    fn test_push_activates_and_updates_timestamps() {
        let mut conv = Conversation::new("c");
        let msg = Message::user("How many patients?");
        let at = msg.created_at;
        conv.push(msg);
        assert_eq!(conv.state(), ConversationState::Active);
        assert_eq!(conv.last_message_at, Some(conv.updated_at));
        assert!(conv.updated_at >= at);
    }

    #[test]
    fn test_sort_by_recent_activity() {
        let mut older = Conversation::new("older");
        older.created_at -= Duration::hours(2);
        older.updated_at = older.created_at;
        let mut active = Conversation::new("active");
        active.created_at -= Duration::hours(3);
        active.push(Message::user("hi"));
        let fresh = Conversation::new("fresh");

        let mut list = vec![older, fresh, active];
        sort_by_recent_activity(&mut list);
        let names: Vec<&str> = list.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names[2], "older");
        assert!(names[..2].contains(&"active"));
    }

    #[test]
    fn test_date_range_swaps_reversed_bounds() {
        let range = DateRange::new(date(2024, 3, 31), date(2024, 3, 1));
        assert_eq!(range.start, date(2024, 3, 1));
        assert!(range.contains(date(2024, 3, 15)));
        assert!(range.contains(date(2024, 3, 31)));
        assert!(!range.contains(date(2024, 4, 1)));
    }

    #[test]
    fn test_budget_remaining_never_negative() {
        let budget = Budget {
            patient_identifier: "404924".into(),
            patient_name: "Radwan Smith".into(),
            category: "Core supports".into(),
            total_amount: 1000.0,
            spent_amount: 1250.0,
            start_date: date(2024, 1, 1),
            end_date: date(2024, 12, 31),
        };
        assert_eq!(budget.remaining(), 0.0);
    }

    #[test]
    fn test_message_wire_shape() {
        let msg = Message::assistant("There are 3 patients.", None);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "assistant");
        assert!(json.get("createdAt").is_some());
        assert!(json.get("queryResult").is_none());
    }

    #[test]
    fn test_role_parse() {
        assert_eq!(Role::parse("user"), Some(Role::User));
        assert_eq!(Role::parse("assistant"), Some(Role::Assistant));
        assert_eq!(Role::parse("system"), None);
    }

    #[test]
    fn test_status_parse_round_trip() {
        for status in [
            GoalStatus::NotStarted,
            GoalStatus::InProgress,
            GoalStatus::Achieved,
            GoalStatus::Discontinued,
        ] {
            assert_eq!(GoalStatus::parse(status.as_str()), status);
        }
        assert_eq!(PatientStatus::parse("discharged"), PatientStatus::Discharged);
        assert_eq!(PatientStatus::parse("???"), PatientStatus::Active);
    }
}
