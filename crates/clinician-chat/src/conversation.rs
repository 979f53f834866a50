//! In-memory [`ConversationStore`] for tests and ephemeral deployments.

use std::collections::HashMap;
use std::sync::Mutex;

use uuid::Uuid;

use clinician_core::error::{ClinicianError, Result};
use clinician_core::store::ConversationStore;
use clinician_core::types::{sort_by_recent_activity, Conversation, Message};

/// Conversation history held in a process-local map.
#[derive(Default)]
pub struct MemoryConversationStore {
    conversations: Mutex<HashMap<Uuid, Conversation>>,
}

impl MemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<Uuid, Conversation>>> {
        self.conversations
            .lock()
            .map_err(|e| ClinicianError::Storage(format!("conversation lock poisoned: {}", e)))
    }
}

impl ConversationStore for MemoryConversationStore {
    fn create_conversation(&self, name: &str) -> Result<Uuid> {
        let conversation = Conversation::new(name);
        let id = conversation.id;
        self.lock()?.insert(id, conversation);
        Ok(id)
    }

    fn append_message(&self, conversation_id: Uuid, message: Message) -> Result<()> {
        let mut conversations = self.lock()?;
        let conversation = conversations
            .get_mut(&conversation_id)
            .ok_or(ClinicianError::ConversationNotFound(conversation_id))?;
        conversation.push(message);
        Ok(())
    }

    fn get_conversation(&self, id: Uuid) -> Result<Conversation> {
        self.lock()?
            .get(&id)
            .cloned()
            .ok_or(ClinicianError::ConversationNotFound(id))
    }

    fn list_conversations(&self) -> Result<Vec<Conversation>> {
        let mut list: Vec<Conversation> = self.lock()?.values().cloned().collect();
        sort_by_recent_activity(&mut list);
        Ok(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinician_core::types::{ConversationState, Role};

    #[test]
    fn test_create_append_get() {
        let store = MemoryConversationStore::new();
        let id = store.create_conversation("Intake").unwrap();
        assert_eq!(
            store.get_conversation(id).unwrap().state(),
            ConversationState::Empty
        );

        store.append_message(id, Message::user("hi")).unwrap();
        store
            .append_message(id, Message::assistant("hello", None))
            .unwrap();

        let conv = store.get_conversation(id).unwrap();
        assert_eq!(conv.state(), ConversationState::Active);
        let roles: Vec<Role> = conv.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant]);
        assert_eq!(conv.last_message_at, Some(conv.updated_at));
    }

    #[test]
    fn test_unknown_conversation() {
        let store = MemoryConversationStore::new();
        let id = Uuid::new_v4();
        assert!(matches!(
            store.append_message(id, Message::user("x")),
            Err(ClinicianError::ConversationNotFound(_))
        ));
        assert!(matches!(
            store.get_conversation(id),
            Err(ClinicianError::ConversationNotFound(_))
        ));
    }

    #[test]
    fn test_list_most_recent_first() {
        let store = MemoryConversationStore::new();
        let a = store.create_conversation("a").unwrap();
        let b = store.create_conversation("b").unwrap();
        let mut msg = Message::user("ping");
        msg.created_at += chrono::Duration::seconds(10);
        store.append_message(a, msg).unwrap();

        let ids: Vec<Uuid> = store
            .list_conversations()
            .unwrap()
            .iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec![a, b]);
    }
}
