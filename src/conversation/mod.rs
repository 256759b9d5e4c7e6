//! Conversation persistence.
//!
//! This module provides the conversation/message records and the store that
//! owns them.

pub mod store;
pub mod types;

pub use store::{ConversationStore, SqliteConversationStore, StoreFuture};
pub use types::{Attachment, Conversation, Message, NewMessage, Role};
