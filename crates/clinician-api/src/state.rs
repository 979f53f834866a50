//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::Instant;

use clinician_chat::Assistant;

/// Shared application state, cloned into each handler via axum's `State`.
#[derive(Clone)]
pub struct AppState {
    /// The query pipeline and the stores it owns.
    pub assistant: Arc<Assistant>,
    /// Port the server listens on; used to build the CORS allow list.
    pub port: u16,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(assistant: Assistant, port: u16) -> Self {
        Self {
            assistant: Arc::new(assistant),
            port,
            start_time: Instant::now(),
        }
    }
}
