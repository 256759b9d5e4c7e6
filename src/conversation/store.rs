//! `SQLite` conversation and message store.
//!
//! Every mutating operation runs inside a single `SQLite` transaction, so a
//! message row and its conversation's `updated_at` either commit together or
//! not at all.

use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::OptionalExtension;
use tokio_rusqlite::Connection;
use tracing::{debug, info};

use crate::conversation::types::{Attachment, Conversation, Message, NewMessage, Role};
use crate::core::config::{SessionConfig, StorageConfig};
use crate::core::errors::{EchoError, EchoResult};
use crate::core::ids::{ConversationId, MessageId};

/// Boxed future type for store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Durable repository of conversations and their messages.
pub trait ConversationStore: Send + Sync {
    /// The conversation with the greatest `updated_at`, if any.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn current_conversation(&self) -> StoreFuture<'_, EchoResult<Option<Conversation>>>;

    /// The current conversation, creating an empty one when the store is empty.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn get_or_create_current(&self, now: DateTime<Utc>)
    -> StoreFuture<'_, EchoResult<Conversation>>;

    /// Create a new empty conversation.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn create(&self, now: DateTime<Utc>) -> StoreFuture<'_, EchoResult<Conversation>>;

    /// Get a conversation by id.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn get(&self, id: ConversationId) -> StoreFuture<'_, EchoResult<Option<Conversation>>>;

    /// Check if a conversation exists.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn exists(&self, id: ConversationId) -> StoreFuture<'_, EchoResult<bool>>;

    /// Change the title of a conversation.
    ///
    /// # Errors
    /// Returns [`EchoError::ConversationNotFound`] if the id is unknown.
    fn rename(&self, id: ConversationId, title: &str) -> StoreFuture<'_, EchoResult<()>>;

    /// Make a conversation current without writing a message.
    ///
    /// `updated_at` becomes the later of `now`, its previous value and one
    /// millisecond past every other conversation, so the conversation wins the
    /// current-conversation ordering even on a same-millisecond tie or a clock
    /// that moved backwards.
    ///
    /// # Errors
    /// Returns [`EchoError::ConversationNotFound`] if the id is unknown.
    fn touch(
        &self,
        id: ConversationId,
        now: DateTime<Utc>,
    ) -> StoreFuture<'_, EchoResult<Conversation>>;

    /// Persist a message and advance the conversation's `updated_at`.
    ///
    /// `updated_at` never moves backwards: an earlier timestamp leaves it at
    /// its previous value.
    ///
    /// # Errors
    /// Returns [`EchoError::ConversationNotFound`] if the id is unknown.
    fn append_message(
        &self,
        id: ConversationId,
        message: NewMessage,
    ) -> StoreFuture<'_, EchoResult<Message>>;

    /// Delete every message of a conversation, keeping the record. Unknown ids are a no-op.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn clear_messages(&self, id: ConversationId) -> StoreFuture<'_, EchoResult<()>>;

    /// Delete a conversation and its messages. Unknown ids are a no-op.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn delete_conversation(&self, id: ConversationId) -> StoreFuture<'_, EchoResult<()>>;

    /// All conversations, most recently updated first.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn list_conversations(&self) -> StoreFuture<'_, EchoResult<Vec<Conversation>>>;

    /// Messages of a conversation by ascending timestamp, ties in insertion order.
    /// Unknown ids yield an empty list.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn messages_of(&self, id: ConversationId) -> StoreFuture<'_, EchoResult<Vec<Message>>>;
}

/// Raw conversation row: id, title, `created_at`, `updated_at`, message count.
type ConversationRow = (String, String, i64, i64, i64);

/// Raw message row: id, conversation id, role, content, attachments, ts.
type MessageRow = (String, String, String, String, Option<String>, i64);

/// `SQLite` implementation of the conversation store.
pub struct SqliteConversationStore {
    conn: Connection,
    conversations: String,
    messages: String,
    default_title: String,
}

impl SqliteConversationStore {
    /// Open the database at `storage.sqlite_path` and initialize the schema.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened.
    pub async fn open(storage: &StorageConfig, session: &SessionConfig) -> EchoResult<Self> {
        let conn = Connection::open(&storage.sqlite_path).await?;
        Self::new(conn, storage, session).await
    }

    /// Initialize the store on an existing connection.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub async fn new(
        conn: Connection,
        storage: &StorageConfig,
        session: &SessionConfig,
    ) -> EchoResult<Self> {
        let conversations = storage.conversation_table.clone();
        let messages = storage.message_table.clone();
        let (conv_table, msg_table) = (conversations.clone(), messages.clone());

        conn.call(move |conn| {
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {conv_table} (
                    id TEXT PRIMARY KEY,
                    title TEXT NOT NULL,
                    created_at INTEGER NOT NULL,
                    updated_at INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_{conv_table}_updated
                    ON {conv_table} (updated_at DESC);
                CREATE TABLE IF NOT EXISTS {msg_table} (
                    seq INTEGER PRIMARY KEY AUTOINCREMENT,
                    id TEXT NOT NULL UNIQUE,
                    conversation_id TEXT NOT NULL,
                    role TEXT NOT NULL,
                    content TEXT NOT NULL,
                    attachments TEXT,
                    ts INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_{msg_table}_conversation_ts
                    ON {msg_table} (conversation_id, ts, seq);"
            ))?;
            Ok(())
        })
        .await?;

        Ok(Self {
            conn,
            conversations,
            messages,
            default_title: session.default_title.clone(),
        })
    }

    /// In-memory store with default table names.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub async fn in_memory() -> EchoResult<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::new(conn, &StorageConfig::default(), &SessionConfig::default()).await
    }

    fn select_conversation_sql(&self) -> String {
        format!(
            "SELECT c.id, c.title, c.created_at, c.updated_at,
                    (SELECT COUNT(*) FROM {messages} m WHERE m.conversation_id = c.id)
             FROM {conversations} c",
            messages = self.messages,
            conversations = self.conversations
        )
    }
}

fn millis_to_datetime(ms: i64) -> EchoResult<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| EchoError::Persistence(format!("invalid timestamp {ms}")))
}

fn conversation_from_row(row: ConversationRow) -> EchoResult<Conversation> {
    let (id, title, created_at, updated_at, count) = row;
    Ok(Conversation {
        id: ConversationId::from_str(&id)
            .map_err(|err| EchoError::Persistence(format!("invalid conversation id: {err}")))?,
        title,
        created_at: millis_to_datetime(created_at)?,
        updated_at: millis_to_datetime(updated_at)?,
        message_count: u32::try_from(count)
            .map_err(|_| EchoError::Persistence("invalid message count".to_string()))?,
    })
}

fn message_from_row(row: MessageRow) -> EchoResult<Message> {
    let (id, conversation_id, role, content, attachments, ts) = row;
    let attachments: Vec<Attachment> = match attachments {
        Some(json) => serde_json::from_str(&json)?,
        None => Vec::new(),
    };
    Ok(Message {
        id: MessageId::from_str(&id)
            .map_err(|err| EchoError::Persistence(format!("invalid message id: {err}")))?,
        conversation_id: ConversationId::from_str(&conversation_id)
            .map_err(|err| EchoError::Persistence(format!("invalid conversation id: {err}")))?,
        role: Role::from_str(&role)
            .map_err(|err| EchoError::Persistence(format!("invalid role: {err}")))?,
        content,
        attachments,
        timestamp: millis_to_datetime(ts)?,
    })
}

fn read_conversation_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConversationRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

impl ConversationStore for SqliteConversationStore {
    fn current_conversation(&self) -> StoreFuture<'_, EchoResult<Option<Conversation>>> {
        Box::pin(async move {
            let sql = format!(
                "{} ORDER BY c.updated_at DESC, c.rowid DESC LIMIT 1",
                self.select_conversation_sql()
            );
            let row = self
                .conn
                .call(move |conn| Ok(conn.query_row(&sql, [], read_conversation_row).optional()?))
                .await?;
            row.map(conversation_from_row).transpose()
        })
    }

    fn get_or_create_current(
        &self,
        now: DateTime<Utc>,
    ) -> StoreFuture<'_, EchoResult<Conversation>> {
        Box::pin(async move {
            let select = format!(
                "{} ORDER BY c.updated_at DESC, c.rowid DESC LIMIT 1",
                self.select_conversation_sql()
            );
            let table = self.conversations.clone();
            let title = self.default_title.clone();
            let new_id = ConversationId::new();
            let now_ms = now.timestamp_millis();

            let (row, created) = self
                .conn
                .call(move |conn| {
                    let tx = conn.transaction()?;
                    let existing = tx.query_row(&select, [], read_conversation_row).optional()?;
                    let result = if let Some(row) = existing {
                        (row, false)
                    } else {
                        tx.execute(
                            &format!(
                                "INSERT INTO {table} (id, title, created_at, updated_at)
                                 VALUES (?1, ?2, ?3, ?4)"
                            ),
                            rusqlite::params![new_id.to_string(), title, now_ms, now_ms],
                        )?;
                        ((new_id.to_string(), title, now_ms, now_ms, 0), true)
                    };
                    tx.commit()?;
                    Ok(result)
                })
                .await?;

            let conversation = conversation_from_row(row)?;
            if created {
                info!("Created conversation {}", conversation.id);
            }
            Ok(conversation)
        })
    }

    fn create(&self, now: DateTime<Utc>) -> StoreFuture<'_, EchoResult<Conversation>> {
        Box::pin(async move {
            let table = self.conversations.clone();
            let title = self.default_title.clone();
            let id = ConversationId::new();
            let now_ms = now.timestamp_millis();
            let stored_title = title.clone();

            self.conn
                .call(move |conn| {
                    conn.execute(
                        &format!(
                            "INSERT INTO {table} (id, title, created_at, updated_at)
                             VALUES (?1, ?2, ?3, ?4)"
                        ),
                        rusqlite::params![id.to_string(), stored_title, now_ms, now_ms],
                    )?;
                    Ok(())
                })
                .await?;

            info!("Created conversation {id}");
            conversation_from_row((id.to_string(), title, now_ms, now_ms, 0))
        })
    }

    fn get(&self, id: ConversationId) -> StoreFuture<'_, EchoResult<Option<Conversation>>> {
        Box::pin(async move {
            let sql = format!("{} WHERE c.id = ?1", self.select_conversation_sql());
            let id_str = id.to_string();
            let row = self
                .conn
                .call(move |conn| {
                    Ok(conn
                        .query_row(&sql, rusqlite::params![id_str], read_conversation_row)
                        .optional()?)
                })
                .await?;
            row.map(conversation_from_row).transpose()
        })
    }

    fn exists(&self, id: ConversationId) -> StoreFuture<'_, EchoResult<bool>> {
        Box::pin(async move {
            let table = self.conversations.clone();
            let id_str = id.to_string();
            let exists = self
                .conn
                .call(move |conn| {
                    let count: i64 = conn.query_row(
                        &format!("SELECT COUNT(*) FROM {table} WHERE id = ?1"),
                        rusqlite::params![id_str],
                        |row| row.get(0),
                    )?;
                    Ok(count > 0)
                })
                .await?;
            Ok(exists)
        })
    }

    fn rename(&self, id: ConversationId, title: &str) -> StoreFuture<'_, EchoResult<()>> {
        let title = title.to_string();
        Box::pin(async move {
            let table = self.conversations.clone();
            let id_str = id.to_string();
            let changed = self
                .conn
                .call(move |conn| {
                    Ok(conn.execute(
                        &format!("UPDATE {table} SET title = ?1 WHERE id = ?2"),
                        rusqlite::params![title, id_str],
                    )?)
                })
                .await?;

            if changed == 0 {
                return Err(EchoError::ConversationNotFound(id));
            }
            debug!("Renamed conversation {id}");
            Ok(())
        })
    }

    fn touch(
        &self,
        id: ConversationId,
        now: DateTime<Utc>,
    ) -> StoreFuture<'_, EchoResult<Conversation>> {
        Box::pin(async move {
            let table = self.conversations.clone();
            let id_str = id.to_string();
            let now_ms = now.timestamp_millis();
            let changed = self
                .conn
                .call(move |conn| {
                    let tx = conn.transaction()?;
                    let others: Option<i64> = tx.query_row(
                        &format!("SELECT MAX(updated_at) FROM {table} WHERE id != ?1"),
                        [&id_str],
                        |row| row.get(0),
                    )?;
                    let floor = others.map_or(now_ms, |latest| now_ms.max(latest + 1));
                    let changed = tx.execute(
                        &format!("UPDATE {table} SET updated_at = MAX(updated_at, ?1) WHERE id = ?2"),
                        rusqlite::params![floor, id_str],
                    )?;
                    tx.commit()?;
                    Ok(changed)
                })
                .await?;

            if changed == 0 {
                return Err(EchoError::ConversationNotFound(id));
            }
            self.get(id)
                .await?
                .ok_or(EchoError::ConversationNotFound(id))
        })
    }

    fn append_message(
        &self,
        id: ConversationId,
        message: NewMessage,
    ) -> StoreFuture<'_, EchoResult<Message>> {
        Box::pin(async move {
            let conversations = self.conversations.clone();
            let messages = self.messages.clone();
            let message_id = MessageId::new();
            let ts = message.timestamp.timestamp_millis();
            let attachments = if message.attachments.is_empty() {
                None
            } else {
                Some(serde_json::to_string(&message.attachments)?)
            };
            let (id_str, msg_id_str) = (id.to_string(), message_id.to_string());
            let (role, content) = (message.role.as_str(), message.content.clone());

            let previous = self
                .conn
                .call(move |conn| {
                    let tx = conn.transaction()?;
                    let previous: Option<i64> = tx
                        .query_row(
                            &format!("SELECT updated_at FROM {conversations} WHERE id = ?1"),
                            rusqlite::params![id_str],
                            |row| row.get(0),
                        )
                        .optional()?;
                    let Some(previous) = previous else {
                        return Ok(None);
                    };

                    tx.execute(
                        &format!(
                            "INSERT INTO {messages}
                             (id, conversation_id, role, content, attachments, ts)
                             VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
                        ),
                        rusqlite::params![msg_id_str, id_str, role, content, attachments, ts],
                    )?;
                    tx.execute(
                        &format!("UPDATE {conversations} SET updated_at = ?1 WHERE id = ?2"),
                        rusqlite::params![previous.max(ts), id_str],
                    )?;
                    tx.commit()?;
                    Ok(Some(previous))
                })
                .await?;

            let Some(previous) = previous else {
                return Err(EchoError::ConversationNotFound(id));
            };
            if previous > ts {
                debug!(
                    "Message timestamp {ts} precedes updated_at {previous} of {id}; updated_at kept"
                );
            }

            debug!("Persisted {} message {message_id} in {id}", message.role);
            Ok(Message {
                id: message_id,
                conversation_id: id,
                role: message.role,
                content: message.content,
                attachments: message.attachments,
                timestamp: millis_to_datetime(ts)?,
            })
        })
    }

    fn clear_messages(&self, id: ConversationId) -> StoreFuture<'_, EchoResult<()>> {
        Box::pin(async move {
            let table = self.messages.clone();
            let id_str = id.to_string();
            let removed = self
                .conn
                .call(move |conn| {
                    Ok(conn.execute(
                        &format!("DELETE FROM {table} WHERE conversation_id = ?1"),
                        rusqlite::params![id_str],
                    )?)
                })
                .await?;
            debug!("Cleared {removed} messages from {id}");
            Ok(())
        })
    }

    fn delete_conversation(&self, id: ConversationId) -> StoreFuture<'_, EchoResult<()>> {
        Box::pin(async move {
            let conversations = self.conversations.clone();
            let messages = self.messages.clone();
            let id_str = id.to_string();
            self.conn
                .call(move |conn| {
                    let tx = conn.transaction()?;
                    tx.execute(
                        &format!("DELETE FROM {messages} WHERE conversation_id = ?1"),
                        rusqlite::params![id_str],
                    )?;
                    tx.execute(
                        &format!("DELETE FROM {conversations} WHERE id = ?1"),
                        rusqlite::params![id_str],
                    )?;
                    tx.commit()?;
                    Ok(())
                })
                .await?;
            info!("Deleted conversation {id}");
            Ok(())
        })
    }

    fn list_conversations(&self) -> StoreFuture<'_, EchoResult<Vec<Conversation>>> {
        Box::pin(async move {
            let sql = format!(
                "{} ORDER BY c.updated_at DESC, c.rowid DESC",
                self.select_conversation_sql()
            );
            let rows = self
                .conn
                .call(move |conn| {
                    let mut stmt = conn.prepare(&sql)?;
                    let rows = stmt
                        .query_map([], read_conversation_row)?
                        .collect::<Result<Vec<_>, rusqlite::Error>>()?;
                    Ok(rows)
                })
                .await?;
            rows.into_iter().map(conversation_from_row).collect()
        })
    }

    fn messages_of(&self, id: ConversationId) -> StoreFuture<'_, EchoResult<Vec<Message>>> {
        Box::pin(async move {
            let table = self.messages.clone();
            let id_str = id.to_string();
            let rows = self
                .conn
                .call(move |conn| {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT id, conversation_id, role, content, attachments, ts
                         FROM {table}
                         WHERE conversation_id = ?1
                         ORDER BY ts ASC, seq ASC"
                    ))?;
                    let rows = stmt
                        .query_map(rusqlite::params![id_str], |row| {
                            Ok((
                                row.get(0)?,
                                row.get(1)?,
                                row.get(2)?,
                                row.get(3)?,
                                row.get(4)?,
                                row.get(5)?,
                            ))
                        })?
                        .collect::<Result<Vec<MessageRow>, rusqlite::Error>>()?;
                    Ok(rows)
                })
                .await?;
            rows.into_iter().map(message_from_row).collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    #[tokio::test]
    async fn test_empty_store_has_no_current_conversation() {
        let store = SqliteConversationStore::in_memory().await.unwrap();
        assert!(store.current_conversation().await.unwrap().is_none());
        assert!(store.list_conversations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_or_create_current_is_idempotent() {
        let store = SqliteConversationStore::in_memory().await.unwrap();
        let first = store.get_or_create_current(at(1_000)).await.unwrap();
        assert_eq!(first.title, "New Chat");
        assert_eq!(first.created_at, first.updated_at);

        let second = store.get_or_create_current(at(5_000)).await.unwrap();
        let third = store.get_or_create_current(at(9_000)).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.id, third.id);
        assert_eq!(store.list_conversations().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_append_to_unknown_conversation_fails() {
        let store = SqliteConversationStore::in_memory().await.unwrap();
        let missing = ConversationId::new();
        let err = store
            .append_message(missing, NewMessage::user("hi", at(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, EchoError::ConversationNotFound(id) if id == missing));
        assert!(err.is_persistence());
    }

    #[tokio::test]
    async fn test_append_bumps_updated_at_and_clamps() {
        let store = SqliteConversationStore::in_memory().await.unwrap();
        let conversation = store.get_or_create_current(at(1_000)).await.unwrap();

        store
            .append_message(conversation.id, NewMessage::user("late", at(5_000)))
            .await
            .unwrap();
        let after = store.get(conversation.id).await.unwrap().unwrap();
        assert_eq!(after.updated_at, at(5_000));

        store
            .append_message(conversation.id, NewMessage::user("early", at(2_000)))
            .await
            .unwrap();
        let clamped = store.get(conversation.id).await.unwrap().unwrap();
        assert_eq!(clamped.updated_at, at(5_000));
        assert_eq!(clamped.message_count, 2);
    }

    #[tokio::test]
    async fn test_messages_sorted_by_timestamp_then_insertion() {
        let store = SqliteConversationStore::in_memory().await.unwrap();
        let id = store.get_or_create_current(at(0)).await.unwrap().id;

        for (content, ms) in [("c", 300), ("a", 100), ("b1", 200), ("b2", 200)] {
            store
                .append_message(id, NewMessage::user(content, at(ms)))
                .await
                .unwrap();
        }

        let contents: Vec<String> = store
            .messages_of(id)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(contents, vec!["a", "b1", "b2", "c"]);
    }

    #[tokio::test]
    async fn test_clear_keeps_conversation_record() {
        let store = SqliteConversationStore::in_memory().await.unwrap();
        let id = store.get_or_create_current(at(0)).await.unwrap().id;
        store
            .append_message(id, NewMessage::user("one", at(10)))
            .await
            .unwrap();
        store
            .append_message(id, NewMessage::assistant("two", at(20)))
            .await
            .unwrap();

        store.clear_messages(id).await.unwrap();
        assert!(store.messages_of(id).await.unwrap().is_empty());
        assert!(store.exists(id).await.unwrap());

        // unknown ids are a no-op
        store.clear_messages(ConversationId::new()).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_cascades_and_is_idempotent() {
        let store = SqliteConversationStore::in_memory().await.unwrap();
        let id = store.get_or_create_current(at(0)).await.unwrap().id;
        store
            .append_message(id, NewMessage::user("bye", at(1)))
            .await
            .unwrap();

        store.delete_conversation(id).await.unwrap();
        store.delete_conversation(id).await.unwrap();

        assert!(!store.exists(id).await.unwrap());
        assert!(store.messages_of(id).await.unwrap().is_empty());
        assert!(store.current_conversation().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_orders_by_updated_at_desc() {
        let store = SqliteConversationStore::in_memory().await.unwrap();
        let older = store.create(at(1_000)).await.unwrap();
        let newer = store.create(at(2_000)).await.unwrap();

        let listed: Vec<ConversationId> = store
            .list_conversations()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(listed, vec![newer.id, older.id]);

        store
            .append_message(older.id, NewMessage::user("bump", at(3_000)))
            .await
            .unwrap();
        let current = store.current_conversation().await.unwrap().unwrap();
        assert_eq!(current.id, older.id);
    }

    #[tokio::test]
    async fn test_touch_and_rename() {
        let store = SqliteConversationStore::in_memory().await.unwrap();
        let first = store.create(at(1_000)).await.unwrap();
        let _second = store.create(at(2_000)).await.unwrap();

        let touched = store.touch(first.id, at(3_000)).await.unwrap();
        assert_eq!(touched.updated_at, at(3_000));
        assert_eq!(store.current_conversation().await.unwrap().unwrap().id, first.id);

        // never moves backwards
        let again = store.touch(first.id, at(500)).await.unwrap();
        assert_eq!(again.updated_at, at(3_000));

        store.rename(first.id, "Trip planning").await.unwrap();
        assert_eq!(store.get(first.id).await.unwrap().unwrap().title, "Trip planning");

        let missing = ConversationId::new();
        assert!(matches!(
            store.rename(missing, "x").await,
            Err(EchoError::ConversationNotFound(_))
        ));
        assert!(store.touch(missing, at(1)).await.is_err());
    }

    #[tokio::test]
    async fn test_touch_wins_same_millisecond_tie() {
        let store = SqliteConversationStore::in_memory().await.unwrap();
        let older = store.create(at(1_000)).await.unwrap();
        let newer = store.create(at(5_000)).await.unwrap();

        // same millisecond as the newer row, which also has the higher rowid
        let touched = store.touch(older.id, at(5_000)).await.unwrap();
        assert_eq!(touched.updated_at, at(5_001));
        assert_eq!(store.current_conversation().await.unwrap().unwrap().id, older.id);

        // a clock behind the latest write still brings the conversation forward
        let touched = store.touch(newer.id, at(2_000)).await.unwrap();
        assert_eq!(touched.updated_at, at(5_002));
        assert_eq!(store.current_conversation().await.unwrap().unwrap().id, newer.id);

        // touching the current conversation keeps its position
        let again = store.touch(newer.id, at(100)).await.unwrap();
        assert_eq!(again.updated_at, at(5_002));
    }

    #[tokio::test]
    async fn test_attachments_are_persisted() {
        let store = SqliteConversationStore::in_memory().await.unwrap();
        let id = store.get_or_create_current(Utc::now()).await.unwrap().id;
        let now = Utc::now() + Duration::seconds(1);
        let stored = store
            .append_message(
                id,
                NewMessage::user("look", now)
                    .with_attachments(vec![Attachment::new("shot.png", "image/png")]),
            )
            .await
            .unwrap();

        let loaded = store.messages_of(id).await.unwrap();
        assert_eq!(loaded, vec![stored]);
        assert_eq!(loaded[0].attachments[0].file_name, "shot.png");
    }
}
