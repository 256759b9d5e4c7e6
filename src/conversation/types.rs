//! Conversation and message records.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::ids::{ConversationId, MessageId};

/// Author of a message.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Typed by the user.
    User,
    /// Produced by the response provider.
    Assistant,
}

impl Role {
    /// Stable string form for storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            _ => Err(value.to_string()),
        }
    }
}

/// An image attached to a message. Only its existence is recorded.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    /// Original file name.
    pub file_name: String,
    /// MIME type, e.g. `image/png`.
    pub media_type: String,
}

impl Attachment {
    /// Build an attachment record.
    #[must_use]
    pub fn new(file_name: impl Into<String>, media_type: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            media_type: media_type.into(),
        }
    }
}

/// A titled container of ordered messages.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Conversation identifier.
    pub id: ConversationId,
    /// Display title.
    pub title: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last write time; never moves backwards.
    pub updated_at: DateTime<Utc>,
    /// Number of messages currently stored.
    pub message_count: u32,
}

/// One turn in a conversation. Immutable once persisted.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Message identifier.
    pub id: MessageId,
    /// Owning conversation.
    pub conversation_id: ConversationId,
    /// Author.
    pub role: Role,
    /// Text payload.
    pub content: String,
    /// Attached images.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    /// Ordering key.
    pub timestamp: DateTime<Utc>,
}

/// Input for [`crate::conversation::ConversationStore::append_message`].
#[derive(Clone, Debug)]
pub struct NewMessage {
    /// Author.
    pub role: Role,
    /// Text payload.
    pub content: String,
    /// Attached images.
    pub attachments: Vec<Attachment>,
    /// Requested timestamp.
    pub timestamp: DateTime<Utc>,
}

impl NewMessage {
    /// A user message without attachments.
    #[must_use]
    pub fn user(content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            attachments: Vec::new(),
            timestamp,
        }
    }

    /// An assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            attachments: Vec::new(),
            timestamp,
        }
    }

    /// Attach images to the message.
    #[must_use]
    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }
}
