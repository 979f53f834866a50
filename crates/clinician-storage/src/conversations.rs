//! SQLite-backed [`ConversationStore`].
//!
//! Messages are ordered by a per-conversation sequence number assigned inside
//! the same transaction that bumps the conversation timestamps.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension;
use uuid::Uuid;

use clinician_core::error::{ClinicianError, Result};
use clinician_core::store::ConversationStore;
use clinician_core::types::{sort_by_recent_activity, Conversation, Message, Role};

use crate::db::{storage_err, Database};

/// Persistent conversation history.
pub struct SqliteConversationStore {
    db: Arc<Database>,
}

impl SqliteConversationStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    fn load_messages(
        conn: &rusqlite::Connection,
        conversation_id: Option<&str>,
    ) -> Result<HashMap<String, Vec<Message>>> {
        let sql = match conversation_id {
            Some(_) => {
                "SELECT conversation_id, id, role, content, created_at, query_result
                 FROM messages WHERE conversation_id = ?1 ORDER BY seq"
            }
            None => {
                "SELECT conversation_id, id, role, content, created_at, query_result
                 FROM messages ORDER BY conversation_id, seq"
            }
        };
        let mut stmt = conn.prepare(sql).map_err(storage_err)?;
        let mut rows = match conversation_id {
            Some(id) => stmt.query(rusqlite::params![id]),
            None => stmt.query([]),
        }
        .map_err(storage_err)?;

        let mut grouped: HashMap<String, Vec<Message>> = HashMap::new();
        while let Some(row) = rows.next().map_err(storage_err)? {
            let conversation_id: String = row.get(0).map_err(storage_err)?;
            let role: String = row.get(2).map_err(storage_err)?;
            let query_result: Option<String> = row.get(5).map_err(storage_err)?;
            let message = Message {
                id: parse_uuid(&row.get::<_, String>(1).map_err(storage_err)?)?,
                role: Role::parse(&role).ok_or_else(|| {
                    ClinicianError::Storage(format!("Unknown message role '{}'", role))
                })?,
                content: row.get(3).map_err(storage_err)?,
                created_at: from_millis(row.get(4).map_err(storage_err)?)?,
                query_result: query_result
                    .as_deref()
                    .map(serde_json::from_str)
                    .transpose()?,
            };
            grouped.entry(conversation_id).or_default().push(message);
        }
        Ok(grouped)
    }
}

impl ConversationStore for SqliteConversationStore {
    fn create_conversation(&self, name: &str) -> Result<Uuid> {
        let conversation = Conversation::new(name);
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO conversations (id, name, created_at, updated_at, last_message_at)
                 VALUES (?1, ?2, ?3, ?4, NULL)",
                rusqlite::params![
                    conversation.id.to_string(),
                    conversation.name,
                    conversation.created_at.timestamp_millis(),
                    conversation.updated_at.timestamp_millis(),
                ],
            )
            .map_err(|e| {
                ClinicianError::Storage(format!("Failed to create conversation: {}", e))
            })?;
            Ok(())
        })?;
        Ok(conversation.id)
    }

    fn append_message(&self, conversation_id: Uuid, message: Message) -> Result<()> {
        let id = conversation_id.to_string();
        let query_result = message
            .query_result
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        self.db.with_transaction(|tx| {
            let updated_at: Option<i64> = tx
                .query_row(
                    "SELECT updated_at FROM conversations WHERE id = ?1",
                    rusqlite::params![id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(storage_err)?;
            let Some(updated_at) = updated_at else {
                return Err(ClinicianError::ConversationNotFound(conversation_id));
            };

            let seq: i64 = tx
                .query_row(
                    "SELECT COALESCE(MAX(seq), 0) + 1 FROM messages WHERE conversation_id = ?1",
                    rusqlite::params![id],
                    |row| row.get(0),
                )
                .map_err(storage_err)?;

            let stamp = message.created_at.timestamp_millis().max(updated_at);
            tx.execute(
                "INSERT INTO messages (id, conversation_id, seq, role, content, created_at, query_result)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    message.id.to_string(),
                    id,
                    seq,
                    message.role.as_str(),
                    message.content,
                    message.created_at.timestamp_millis(),
                    query_result,
                ],
            )
            .map_err(|e| ClinicianError::Storage(format!("Failed to append message: {}", e)))?;

            tx.execute(
                "UPDATE conversations SET updated_at = ?2, last_message_at = ?2 WHERE id = ?1",
                rusqlite::params![id, stamp],
            )
            .map_err(storage_err)?;
            Ok(())
        })
    }

    fn get_conversation(&self, id: Uuid) -> Result<Conversation> {
        let key = id.to_string();
        self.db.with_conn(|conn| {
            let header = conn
                .query_row(
                    "SELECT name, created_at, updated_at, last_message_at
                     FROM conversations WHERE id = ?1",
                    rusqlite::params![key],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, i64>(1)?,
                            row.get::<_, i64>(2)?,
                            row.get::<_, Option<i64>>(3)?,
                        ))
                    },
                )
                .optional()
                .map_err(storage_err)?;
            let Some((name, created_at, updated_at, last_message_at)) = header else {
                return Err(ClinicianError::ConversationNotFound(id));
            };

            let mut messages = Self::load_messages(conn, Some(&key))?;
            Ok(Conversation {
                id,
                name,
                messages: messages.remove(&key).unwrap_or_default(),
                created_at: from_millis(created_at)?,
                updated_at: from_millis(updated_at)?,
                last_message_at: last_message_at.map(from_millis).transpose()?,
            })
        })
    }

    fn list_conversations(&self) -> Result<Vec<Conversation>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, name, created_at, updated_at, last_message_at FROM conversations",
                )
                .map_err(storage_err)?;
            let headers = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, Option<i64>>(4)?,
                    ))
                })
                .map_err(storage_err)?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(storage_err)?;

            let mut messages = Self::load_messages(conn, None)?;
            let mut conversations = Vec::with_capacity(headers.len());
            for (id, name, created_at, updated_at, last_message_at) in headers {
                conversations.push(Conversation {
                    id: parse_uuid(&id)?,
                    name,
                    messages: messages.remove(&id).unwrap_or_default(),
                    created_at: from_millis(created_at)?,
                    updated_at: from_millis(updated_at)?,
                    last_message_at: last_message_at.map(from_millis).transpose()?,
                });
            }
            sort_by_recent_activity(&mut conversations);
            Ok(conversations)
        })
    }
}

fn from_millis(millis: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| ClinicianError::Storage(format!("Invalid timestamp {}", millis)))
}

fn parse_uuid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| ClinicianError::Storage(format!("Invalid id '{}': {}", value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinician_core::query_result::{CellValue, QueryResult};
    use clinician_core::types::ConversationState;

    fn store() -> SqliteConversationStore {
        SqliteConversationStore::new(Arc::new(Database::in_memory().unwrap()))
    }

    #[test]
    fn test_create_and_get_empty_conversation() {
        let s = store();
        let id = s.create_conversation("Budget review").unwrap();
        let conv = s.get_conversation(id).unwrap();
        assert_eq!(conv.name, "Budget review");
        assert_eq!(conv.state(), ConversationState::Empty);
        assert!(conv.last_message_at.is_none());
    }

    #[test]
    fn test_get_unknown_conversation() {
        let err = store().get_conversation(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, ClinicianError::ConversationNotFound(_)));
    }

    #[test]
    fn test_append_preserves_order_and_query_result() {
        let s = store();
        let id = s.create_conversation("c").unwrap();

        let mut table = QueryResult::new(["name", "identifier"]).unwrap();
        table
            .push_row([("name", CellValue::from("John Smith"))])
            .unwrap();

        s.append_message(id, Message::user("Find John Smith")).unwrap();
        s.append_message(id, Message::assistant("Found John Smith.", Some(table.clone())))
            .unwrap();
        s.append_message(id, Message::user("thanks")).unwrap();

        let conv = s.get_conversation(id).unwrap();
        let contents: Vec<&str> = conv.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["Find John Smith", "Found John Smith.", "thanks"]);
        assert_eq!(conv.messages[1].role, Role::Assistant);
        assert_eq!(conv.messages[1].query_result.as_ref(), Some(&table));
        assert_eq!(
            conv.messages[1]
                .query_result
                .as_ref()
                .unwrap()
                .value(0, "identifier"),
            Some(&CellValue::Null)
        );
        assert!(conv.last_message_at.is_some());
        assert_eq!(conv.last_message_at, Some(conv.updated_at));
    }

    #[test]
    fn test_append_to_unknown_conversation() {
        let err = store()
            .append_message(Uuid::new_v4(), Message::user("hello"))
            .unwrap_err();
        assert!(matches!(err, ClinicianError::ConversationNotFound(_)));
    }

    #[test]
    fn test_list_orders_by_last_message() {
        let s = store();
        let first = s.create_conversation("first").unwrap();
        let second = s.create_conversation("second").unwrap();
        let mut late = Message::user("later");
        late.created_at = Utc::now() + chrono::Duration::seconds(5);
        s.append_message(first, late).unwrap();

        let list = s.list_conversations().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, first);
        assert_eq!(list[1].id, second);
        assert_eq!(list[0].messages.len(), 1);
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clinic.db");
        let id = {
            let s = SqliteConversationStore::new(Arc::new(Database::new(&path).unwrap()));
            let id = s.create_conversation("durable").unwrap();
            s.append_message(id, Message::user("How many patients?")).unwrap();
            id
        };
        let s = SqliteConversationStore::new(Arc::new(Database::new(&path).unwrap()));
        let conv = s.get_conversation(id).unwrap();
        assert_eq!(conv.messages.len(), 1);
        assert_eq!(conv.messages[0].content, "How many patients?");
    }
}
