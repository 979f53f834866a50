//! Assistant orchestrator: runs one conversational turn end to end.
//!
//! A turn appends the user message, extracts, classifies, dispatches,
//! renders, and appends exactly one assistant message. Turns on the same
//! conversation are serialized by a per-conversation FIFO lock, so history
//! follows request-acceptance order; turns on different conversations run in
//! parallel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use uuid::Uuid;

use clinician_core::config::AssistantConfig;
use clinician_core::store::{ConversationStore, RecordStore};
use clinician_core::types::Message;

use crate::classifier::QueryClassifier;
use crate::dispatcher::QueryDispatcher;
use crate::error::{ChatError, DispatchError};
use crate::extractor::EntityExtractor;
use crate::response::{RenderedResponse, ResponseGenerator};
use crate::types::QueryType;

/// Assistant reply when a turn ends without a rendered answer.
pub const TURN_FAILED_TEXT: &str =
    "Sorry, something went wrong while answering that question. Please try again.";

type TurnLock = Arc<tokio::sync::Mutex<()>>;

/// Entry point for the query pipeline.
pub struct Assistant {
    extractor: EntityExtractor,
    classifier: QueryClassifier,
    dispatcher: QueryDispatcher,
    responder: ResponseGenerator,
    conversations: Arc<dyn ConversationStore>,
    config: AssistantConfig,
    turn_locks: Mutex<HashMap<Uuid, TurnLock>>,
}

impl Assistant {
    pub fn new(
        records: Arc<dyn RecordStore>,
        conversations: Arc<dyn ConversationStore>,
        config: AssistantConfig,
    ) -> Self {
        Self {
            extractor: EntityExtractor::new(),
            classifier: QueryClassifier::new(),
            dispatcher: QueryDispatcher::new(records, config.clone()),
            responder: ResponseGenerator::new(),
            conversations,
            config,
            turn_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn records(&self) -> &Arc<dyn RecordStore> {
        self.dispatcher.store()
    }

    pub fn conversations(&self) -> &Arc<dyn ConversationStore> {
        &self.conversations
    }

    pub fn config(&self) -> &AssistantConfig {
        &self.config
    }

    /// Handle one user message and return the appended assistant message.
    ///
    /// Invalid input is rejected before anything is appended. Once the user
    /// message is stored, an assistant message is always appended, including
    /// when the record store fails; that case still returns
    /// [`ChatError::StoreUnavailable`] so the transport can report it.
    pub async fn handle_message(
        &self,
        conversation_id: Uuid,
        text: &str,
    ) -> Result<Message, ChatError> {
        let permit = self.begin_turn(conversation_id, text).await?;
        self.complete_turn(permit).await
    }

    /// Validate `text` and wait for the conversation's turn slot.
    ///
    /// Slots are granted in the order this is called. Nothing is appended
    /// until the permit is passed to [`Assistant::complete_turn`].
    pub async fn begin_turn(
        &self,
        conversation_id: Uuid,
        text: &str,
    ) -> Result<TurnPermit, ChatError> {
        self.validate(text)?;
        let lock = self.turn_lock(conversation_id)?;
        let guard = Arc::clone(&lock).lock_owned().await;
        Ok(TurnPermit {
            conversation_id,
            text: text.trim().to_string(),
            lock,
            guard,
        })
    }

    /// Run the turn held by `permit` and release its slot.
    pub async fn complete_turn(&self, permit: TurnPermit) -> Result<Message, ChatError> {
        let TurnPermit {
            conversation_id,
            text,
            lock,
            guard,
        } = permit;
        let outcome = self.run_turn(conversation_id, &text).await;
        drop(guard);
        self.release_turn_lock(conversation_id, lock);
        outcome
    }

    fn validate(&self, text: &str) -> Result<(), ChatError> {
        if !self.config.enabled {
            return Err(ChatError::Disabled);
        }
        if text.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if text.chars().count() > self.config.max_message_length {
            return Err(ChatError::MessageTooLong(self.config.max_message_length));
        }
        Ok(())
    }

    async fn run_turn(&self, conversation_id: Uuid, text: &str) -> Result<Message, ChatError> {
        let started = Instant::now();
        self.conversations
            .append_message(conversation_id, Message::user(text))?;
        let pending = PendingTurn::new(self.conversations.as_ref(), conversation_id);

        let extraction = self.extractor.extract(text);
        let query_type = self.classifier.classify(&extraction);
        tracing::debug!(
            conversation_id = %conversation_id,
            tentative = %extraction.query_type,
            query_type = %query_type,
            "Classified message"
        );

        let (rendered, lookup_failure) = if query_type == QueryType::Unknown {
            (self.responder.fallback(), None)
        } else {
            let outcome = self
                .dispatcher
                .dispatch(query_type, &extraction.entities, text)
                .await;
            let rendered = self
                .responder
                .render(query_type, outcome.as_ref(), &extraction.entities);
            let failure = match outcome {
                Err(DispatchError::Lookup(reason)) => Some(reason),
                _ => None,
            };
            (rendered, failure)
        };

        let RenderedResponse {
            text: reply,
            query_result,
        } = rendered;
        let has_table = query_result.is_some();
        let message = Message::assistant(reply, query_result);
        pending.resolve(message.clone())?;

        tracing::info!(
            conversation_id = %conversation_id,
            query_type = %query_type,
            has_table,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Turn complete"
        );

        match lookup_failure {
            Some(reason) => Err(ChatError::StoreUnavailable(reason)),
            None => Ok(message),
        }
    }

    fn turn_lock(&self, conversation_id: Uuid) -> Result<TurnLock, ChatError> {
        let mut locks = self
            .turn_locks
            .lock()
            .map_err(|e| ChatError::Storage(format!("turn lock map poisoned: {}", e)))?;
        Ok(locks.entry(conversation_id).or_default().clone())
    }

    /// Drop the map entry once no other turn holds or awaits the lock.
    fn release_turn_lock(&self, conversation_id: Uuid, lock: TurnLock) {
        if let Ok(mut locks) = self.turn_locks.lock() {
            // One reference in the map, one here.
            if Arc::strong_count(&lock) == 2 {
                locks.remove(&conversation_id);
            }
        }
    }
}

/// Exclusive right to run the next turn on one conversation.
pub struct TurnPermit {
    conversation_id: Uuid,
    text: String,
    lock: TurnLock,
    guard: tokio::sync::OwnedMutexGuard<()>,
}

impl std::fmt::Debug for TurnPermit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnPermit")
            .field("conversation_id", &self.conversation_id)
            .finish_non_exhaustive()
    }
}

/// Guarantees the turn is resolved: if dropped before [`PendingTurn::resolve`]
/// succeeds, an error-style assistant message is appended instead.
struct PendingTurn<'a> {
    store: &'a dyn ConversationStore,
    conversation_id: Uuid,
    resolved: bool,
}

impl<'a> PendingTurn<'a> {
    fn new(store: &'a dyn ConversationStore, conversation_id: Uuid) -> Self {
        Self {
            store,
            conversation_id,
            resolved: false,
        }
    }

    fn resolve(mut self, message: Message) -> clinician_core::Result<()> {
        self.store.append_message(self.conversation_id, message)?;
        self.resolved = true;
        Ok(())
    }
}

impl Drop for PendingTurn<'_> {
    fn drop(&mut self) {
        if self.resolved {
            return;
        }
        tracing::warn!(
            conversation_id = %self.conversation_id,
            "Turn ended without an answer, appending failure message"
        );
        if let Err(e) = self
            .store
            .append_message(self.conversation_id, Message::assistant(TURN_FAILED_TEXT, None))
        {
            tracing::error!(
                conversation_id = %self.conversation_id,
                error = %e,
                "Failed to resolve pending turn"
            );
        }
    }
}
