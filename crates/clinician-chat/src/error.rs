//! Error types for the query pipeline.

use clinician_core::error::ClinicianError;

use crate::types::QueryType;

/// Failures a dispatch handler reports to the response generator.
///
/// Each is rendered into an assistant message rather than escaping the
/// pipeline as an unhandled failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// The record store errored or did not answer in time.
    #[error("record lookup failed: {0}")]
    Lookup(String),
    /// A named entity has no matching record.
    #[error("no {entity} found matching '{term}'")]
    NotFound { entity: &'static str, term: String },
    /// No handler is registered for the query type.
    #[error("no handler registered for {0}")]
    Unsupported(QueryType),
}

impl From<ClinicianError> for DispatchError {
    fn from(err: ClinicianError) -> Self {
        DispatchError::Lookup(err.to_string())
    }
}

/// Errors from the assistant orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("assistant is disabled")]
    Disabled,
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("conversation not found: {0}")]
    ConversationNotFound(uuid::Uuid),
    /// The turn was resolved with an error message, but the record store
    /// could not be reached.
    #[error("record store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<ClinicianError> for ChatError {
    fn from(err: ClinicianError) -> Self {
        match err {
            ClinicianError::ConversationNotFound(id) => ChatError::ConversationNotFound(id),
            ClinicianError::StoreUnavailable(msg) => ChatError::StoreUnavailable(msg),
            other => ChatError::Storage(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_dispatch_error_display() {
        let err = DispatchError::NotFound {
            entity: "patient",
            term: "Jane Doe".into(),
        };
        assert_eq!(err.to_string(), "no patient found matching 'Jane Doe'");

        let err = DispatchError::Lookup("timed out".into());
        assert_eq!(err.to_string(), "record lookup failed: timed out");
    }

    #[test]
    fn test_chat_error_display() {
        assert_eq!(ChatError::Disabled.to_string(), "assistant is disabled");
        assert_eq!(ChatError::EmptyMessage.to_string(), "message cannot be empty");
        assert_eq!(
            ChatError::MessageTooLong(2000).to_string(),
            "message exceeds maximum length of 2000 characters"
        );
    }

    #[test]
    fn test_chat_error_from_clinician_error() {
        let id = Uuid::new_v4();
        let err: ChatError = ClinicianError::ConversationNotFound(id).into();
        assert!(matches!(err, ChatError::ConversationNotFound(found) if found == id));

        let err: ChatError = ClinicianError::StoreUnavailable("down".into()).into();
        assert!(matches!(err, ChatError::StoreUnavailable(_)));

        let err: ChatError = ClinicianError::Storage("disk full".into()).into();
        assert!(matches!(err, ChatError::Storage(_)));
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn test_store_error_becomes_lookup() {
        let err: DispatchError = ClinicianError::StoreUnavailable("refused".into()).into();
        assert!(matches!(err, DispatchError::Lookup(msg) if msg.contains("refused")));
    }
}
