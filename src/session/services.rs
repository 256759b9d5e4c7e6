//! Screenshot and export collaborators.
//!
//! The session controller only dispatches to these; capture and export
//! mechanics belong to the shell.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::fs;
use tracing::info;

use crate::conversation::types::{Conversation, Message};
use crate::core::errors::EchoResult;

/// Receives `/screenshot` and `/ss`.
pub trait CaptureService: Send + Sync {
    /// Capture the screen.
    ///
    /// # Errors
    /// Returns an error if the capture fails.
    fn capture(&self) -> EchoResult<()>;
}

/// Boxed future type for export calls.
pub type ExportFuture<'a> = Pin<Box<dyn Future<Output = EchoResult<()>> + Send + 'a>>;

/// Receives `/export`.
///
/// Exports run on the event loop's task, so implementations must not block.
pub trait ExportService: Send + Sync {
    /// Export the current conversation, or nothing when there is none.
    ///
    /// # Errors
    /// Returns an error if the export cannot be written.
    fn export<'a>(
        &'a self,
        conversation: Option<&'a Conversation>,
        messages: &'a [Message],
    ) -> ExportFuture<'a>;
}

/// Capture collaborator that only records the request.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingCapture;

impl CaptureService for LoggingCapture {
    fn capture(&self) -> EchoResult<()> {
        info!("Screenshot capture requested");
        Ok(())
    }
}

#[derive(Serialize)]
struct ConversationExport<'a> {
    exported_at: DateTime<Utc>,
    conversation: &'a Conversation,
    messages: &'a [Message],
}

/// Writes one pretty-printed JSON file per exported conversation.
#[derive(Debug, Clone)]
pub struct JsonExporter {
    dir: PathBuf,
}

impl JsonExporter {
    /// Exporter writing into `dir`, created on first export.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Target directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File an export of `conversation` is written to.
    #[must_use]
    pub fn path_for(&self, conversation: &Conversation) -> PathBuf {
        self.dir.join(format!("conversation-{}.json", conversation.id))
    }
}

impl ExportService for JsonExporter {
    fn export<'a>(
        &'a self,
        conversation: Option<&'a Conversation>,
        messages: &'a [Message],
    ) -> ExportFuture<'a> {
        Box::pin(async move {
            let Some(conversation) = conversation else {
                info!("Export requested with no conversation; nothing written");
                return Ok(());
            };

            let payload = serde_json::to_vec_pretty(&ConversationExport {
                exported_at: Utc::now(),
                conversation,
                messages,
            })?;
            fs::create_dir_all(&self.dir).await?;
            let path = self.path_for(conversation);
            fs::write(&path, payload).await?;
            info!("Exported conversation {} to {}", conversation.id, path.display());
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::types::Role;
    use crate::core::ids::{ConversationId, MessageId};

    #[tokio::test]
    async fn test_json_export_writes_messages() {
        let dir = std::env::temp_dir().join(format!("echo-export-{}", ConversationId::new()));
        let exporter = JsonExporter::new(&dir);
        let now = Utc::now();
        let conversation = Conversation {
            id: ConversationId::new(),
            title: "New Chat".to_string(),
            created_at: now,
            updated_at: now,
            message_count: 1,
        };
        let messages = vec![Message {
            id: MessageId::new(),
            conversation_id: conversation.id,
            role: Role::User,
            content: "hello".to_string(),
            attachments: Vec::new(),
            timestamp: now,
        }];

        exporter.export(Some(&conversation), &messages).await.unwrap();

        let written = fs::read_to_string(exporter.path_for(&conversation)).await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(json["messages"][0]["content"], "hello");
        assert_eq!(json["conversation"]["title"], "New Chat");

        fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_json_export_without_conversation_is_noop() {
        let dir = std::env::temp_dir().join(format!("echo-export-{}", ConversationId::new()));
        let exporter = JsonExporter::new(&dir);
        exporter.export(None, &[]).await.unwrap();
        assert!(!exporter.dir().exists());
    }

    #[tokio::test]
    async fn test_json_export_reports_unwritable_dir() {
        let blocker = std::env::temp_dir().join(format!("echo-export-{}", ConversationId::new()));
        fs::write(&blocker, b"not a directory").await.unwrap();
        let exporter = JsonExporter::new(blocker.join("nested"));
        let now = Utc::now();
        let conversation = Conversation {
            id: ConversationId::new(),
            title: "New Chat".to_string(),
            created_at: now,
            updated_at: now,
            message_count: 0,
        };

        let result = exporter.export(Some(&conversation), &[]).await;
        assert!(result.is_err());

        fs::remove_file(&blocker).await.unwrap();
    }
}
