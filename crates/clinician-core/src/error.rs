use thiserror::Error;
use uuid::Uuid;

/// Top-level error type for the clinician assistant.
///
/// Subsystem crates define their own error types and convert into or out of
/// `ClinicianError` so that `?` works across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClinicianError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Record store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Conversation not found: {0}")]
    ConversationNotFound(Uuid),

    #[error("Invalid query result: {0}")]
    InvalidResult(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for ClinicianError {
    fn from(err: toml::de::Error) -> Self {
        ClinicianError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for ClinicianError {
    fn from(err: toml::ser::Error) -> Self {
        ClinicianError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for ClinicianError {
    fn from(err: serde_json::Error) -> Self {
        ClinicianError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for clinician operations.
pub type Result<T> = std::result::Result<T, ClinicianError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ClinicianError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing field");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ClinicianError = io_err.into();
        assert!(matches!(err, ClinicianError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_conversation_not_found_names_id() {
        let id = Uuid::new_v4();
        let err = ClinicianError::ConversationNotFound(id);
        assert!(err.to_string().contains(&id.to_string()));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: ClinicianError = json_err.into();
        assert!(matches!(err, ClinicianError::Serialization(_)));
    }

    #[test]
    fn test_toml_error_conversion() {
        let toml_err = toml::from_str::<toml::Value>("= broken").unwrap_err();
        let err: ClinicianError = toml_err.into();
        assert!(matches!(err, ClinicianError::Config(_)));
    }
}
