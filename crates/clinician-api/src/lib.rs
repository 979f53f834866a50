//! Clinician API crate - axum HTTP surface for the assistant.
//!
//! Serves the store status probe, conversation history, message posting
//! and a health check.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
