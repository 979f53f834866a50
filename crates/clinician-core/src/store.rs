//! Seams to the collaborators the query pipeline talks to.
//!
//! `RecordStore` is the read side of the external clinical record store.
//! `ConversationStore` owns chat history; `append_message` is its only
//! mutation.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::types::{
    Budget, Caregiver, Conversation, DateRange, Goal, Message, Patient, TherapySession,
};

/// Typed, read-only queries against the clinical record store.
///
/// Name lookups are case-insensitive substring matches. Implementations
/// report an unreachable backend as `ClinicianError::StoreUnavailable`.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Whether a backing store has been configured at all.
    fn is_configured(&self) -> bool {
        true
    }

    /// Cheap round trip proving the backend answers.
    async fn ping(&self) -> Result<()>;

    async fn count_patients(&self) -> Result<u64>;

    async fn find_patient_by_identifier(&self, identifier: &str) -> Result<Option<Patient>>;

    async fn search_patients_by_name(&self, name: &str) -> Result<Vec<Patient>>;

    async fn goals_for_patients(&self, identifiers: &[String]) -> Result<Vec<Goal>>;

    async fn budgets_for_patients(&self, identifiers: &[String]) -> Result<Vec<Budget>>;

    /// Budgets whose end date falls inside `range`, soonest first.
    async fn budgets_expiring(&self, range: DateRange) -> Result<Vec<Budget>>;

    async fn caregivers_for_patients(&self, identifiers: &[String]) -> Result<Vec<Caregiver>>;

    /// Sessions dated inside `range`, optionally restricted to some patients.
    async fn sessions_between(
        &self,
        range: DateRange,
        identifiers: Option<&[String]>,
    ) -> Result<Vec<TherapySession>>;
}

/// Persistent home of conversations and their message history.
///
/// Implementations must make each append atomic with the timestamp update
/// (`Conversation::push` does both).
pub trait ConversationStore: Send + Sync {
    fn create_conversation(&self, name: &str) -> Result<Uuid>;

    fn append_message(&self, conversation_id: Uuid, message: Message) -> Result<()>;

    /// Fails with `ClinicianError::ConversationNotFound` for unknown ids.
    fn get_conversation(&self, id: Uuid) -> Result<Conversation>;

    /// All conversations, most recently active first.
    fn list_conversations(&self) -> Result<Vec<Conversation>>;
}
