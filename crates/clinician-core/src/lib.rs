//! Shared configuration, errors, and types for the clinician assistant.

pub mod config;
pub mod error;
pub mod query_result;
pub mod store;
pub mod types;

pub use config::ClinicianConfig;
pub use error::{ClinicianError, Result};
pub use query_result::{CellValue, QueryResult, ResultMetadata, Row};
pub use store::{ConversationStore, RecordStore};
pub use types::*;
