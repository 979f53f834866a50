//! Route handler functions for all API endpoints.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use clinician_core::types::{Conversation, Message};

use crate::error::ApiError;
use crate::state::AppState;

/// Name given to conversations created without one.
pub const DEFAULT_CONVERSATION_NAME: &str = "New conversation";

// =============================================================================
// Request and response types
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct CreateConversationRequest {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct PostMessageRequest {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub is_configured: bool,
    pub connection_valid: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationList {
    pub conversations: Vec<Conversation>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

fn parse_conversation_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw)
        .map_err(|_| ApiError::BadRequest(format!("Invalid conversation id: {}", raw)))
}

// =============================================================================
// Handlers
// =============================================================================

/// GET /status - whether the record store is configured and reachable.
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let records = state.assistant.records();
    let is_configured = records.is_configured();
    let connection_valid = if is_configured {
        match records.ping().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Record store ping failed");
                false
            }
        }
    } else {
        false
    };

    Json(StatusResponse {
        is_configured,
        connection_valid,
    })
}

/// GET /conversations - all conversations, most recently active first.
pub async fn list_conversations(
    State(state): State<AppState>,
) -> Result<Json<ConversationList>, ApiError> {
    let conversations = state.assistant.conversations().list_conversations()?;
    Ok(Json(ConversationList { conversations }))
}

/// POST /conversations - create an empty conversation.
pub async fn create_conversation(
    State(state): State<AppState>,
    body: Result<Option<Json<CreateConversationRequest>>, JsonRejection>,
) -> Result<Json<Conversation>, ApiError> {
    let request = body?.map(|Json(r)| r).unwrap_or_default();
    let name = match request.name.trim() {
        "" => DEFAULT_CONVERSATION_NAME,
        trimmed => trimmed,
    };

    let store = state.assistant.conversations();
    let id = store.create_conversation(name)?;
    tracing::info!(conversation_id = %id, "Conversation created");
    Ok(Json(store.get_conversation(id)?))
}

/// GET /conversations/{id} - one conversation with its full history.
pub async fn get_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Conversation>, ApiError> {
    let id = parse_conversation_id(&id)?;
    Ok(Json(state.assistant.conversations().get_conversation(id)?))
}

/// POST /conversations/{id}/messages - run one assistant turn.
///
/// The conversation's turn slot is taken before spawning, so turns keep the
/// order requests were accepted in. The turn itself runs on its own task and a
/// client disconnect cannot cancel it between the user message and the reply.
pub async fn post_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<PostMessageRequest>, JsonRejection>,
) -> Result<Json<Message>, ApiError> {
    let id = parse_conversation_id(&id)?;
    let Json(request) = body?;
    let permit = state.assistant.begin_turn(id, &request.message).await?;
    let assistant = state.assistant.clone();
    let turn = tokio::spawn(async move { assistant.complete_turn(permit).await });

    match turn.await {
        Ok(outcome) => Ok(Json(outcome?)),
        Err(e) => {
            tracing::error!(conversation_id = %id, error = %e, "Turn task failed");
            Err(ApiError::Internal("Internal server error".to_string()))
        }
    }
}

/// GET /health - liveness and uptime.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}
