//! Clinician Assistant query pipeline.
//!
//! Turns a free-text question about clinical records into an answer:
//! entity extraction, query classification, dispatch to a record-store
//! handler, and response rendering, driven per conversation turn by the
//! [`Assistant`] orchestrator.

pub mod classifier;
pub mod conversation;
pub mod dispatcher;
pub mod error;
pub mod extractor;
pub mod handler;
pub mod orchestrator;
pub mod response;
pub mod types;

pub use classifier::QueryClassifier;
pub use conversation::MemoryConversationStore;
pub use dispatcher::QueryDispatcher;
pub use error::{ChatError, DispatchError};
pub use extractor::EntityExtractor;
pub use handler::{HandlerContext, HandlerRegistry, QueryHandler};
pub use orchestrator::{Assistant, TurnPermit};
pub use response::{RenderedResponse, ResponseGenerator};
pub use types::{ExtractedEntities, ExtractionResult, PatientRef, QueryType};
