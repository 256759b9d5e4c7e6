//! Session orchestration: input, commands, and the response lifecycle.
//!
//! The controller is owned by a single task. Provider calls run on spawned
//! tasks and report back through a channel that the owner drains with
//! [`SessionController::next_completion`], so every store write happens on the
//! owning task in issue order.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use crate::command::parser::{CommandParser, InputKey, KeyOutcome, ParsedInput, SuggestionState};
use crate::command::registry::{CommandKind, CommandRegistry};
use crate::conversation::store::ConversationStore;
use crate::conversation::types::{Attachment, Message, NewMessage};
use crate::core::errors::{EchoError, EchoResult, ProviderError, ProviderResult};
use crate::core::ids::{ConversationId, RequestId};
use crate::core::model::ChatModel;
use crate::session::provider::ResponseProvider;
use crate::session::services::{CaptureService, ExportService};

/// Capacity of the update broadcast channel.
const UPDATE_CHANNEL_CAPACITY: usize = 64;

/// State change observed by the shell.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionUpdate {
    /// A user or assistant message was persisted.
    MessagePersisted(Message),
    /// A conversation became current after `/end` or a selection.
    ConversationActivated(ConversationId),
    /// All messages of a conversation were deleted.
    ConversationCleared(ConversationId),
    /// A conversation was deleted.
    ConversationDeleted(ConversationId),
    /// The typing indicator changed.
    TypingChanged(bool),
    /// The selected model changed.
    ModelChanged(ChatModel),
    /// Non-blocking notice for the user.
    Notice(String),
}

/// Tag attached to an outstanding provider request.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RequestTicket {
    /// Request identifier.
    pub request_id: RequestId,
    /// Conversation the reply belongs to.
    pub conversation_id: ConversationId,
    /// Session generation at issue time.
    pub generation: u64,
}

/// A finished provider call, delivered back to the owning task.
#[derive(Debug)]
pub struct Completion {
    /// Ticket of the request.
    pub ticket: RequestTicket,
    /// Provider result.
    pub result: ProviderResult<String>,
}

/// What [`SessionController::send`] did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    /// Blank input; nothing happened.
    Empty,
    /// A command was executed.
    Command(CommandKind),
    /// An unregistered `/` token was ignored.
    UnknownCommand(String),
    /// A user message was persisted and a reply requested.
    Sent(Message),
}

/// What applying a completion did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// The reply was persisted as an assistant message.
    Persisted(Message),
    /// The reply belonged to a cleared, ended or deleted conversation.
    Discarded,
    /// The provider failed; nothing was persisted.
    Failed(ProviderError),
}

#[derive(Clone, Copy, Debug)]
struct QueuedRequest {
    conversation_id: ConversationId,
    generation: u64,
}

/// External collaborators for screenshot and export commands.
#[derive(Clone)]
pub struct SessionServices {
    /// Screenshot collaborator.
    pub capture: Arc<dyn CaptureService>,
    /// Export collaborator.
    pub exporter: Arc<dyn ExportService>,
}

impl SessionServices {
    /// Bundle the collaborators.
    #[must_use]
    pub const fn new(capture: Arc<dyn CaptureService>, exporter: Arc<dyn ExportService>) -> Self {
        Self { capture, exporter }
    }
}

/// Owns session state and drives the response lifecycle.
pub struct SessionController {
    store: Arc<dyn ConversationStore>,
    provider: Arc<dyn ResponseProvider>,
    services: SessionServices,
    parser: CommandParser,
    selected_model: ChatModel,
    generation: u64,
    in_flight: Option<RequestTicket>,
    queue: VecDeque<QueuedRequest>,
    typing: bool,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    updates: broadcast::Sender<SessionUpdate>,
}

impl SessionController {
    /// Create a controller with the builtin command registry.
    #[must_use]
    pub fn new(
        store: Arc<dyn ConversationStore>,
        provider: Arc<dyn ResponseProvider>,
        services: SessionServices,
        model: ChatModel,
    ) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            store,
            provider,
            services,
            parser: CommandParser::new(CommandRegistry::builtin()),
            selected_model: model,
            generation: 0,
            in_flight: None,
            queue: VecDeque::new(),
            typing: false,
            completions_tx,
            completions_rx,
            updates,
        }
    }

    /// Subscribe to state changes.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionUpdate> {
        self.updates.subscribe()
    }

    /// The conversation store.
    #[must_use]
    pub const fn store(&self) -> &Arc<dyn ConversationStore> {
        &self.store
    }

    /// Model used for the next request.
    #[must_use]
    pub const fn selected_model(&self) -> ChatModel {
        self.selected_model
    }

    /// Whether a reply is pending.
    #[must_use]
    pub const fn is_typing(&self) -> bool {
        self.typing
    }

    /// Current draft text.
    #[must_use]
    pub fn draft(&self) -> &str {
        self.parser.draft()
    }

    /// Current autocomplete state.
    #[must_use]
    pub const fn suggestions(&self) -> &SuggestionState {
        self.parser.suggestions()
    }

    /// The draft changed.
    pub fn input_changed(&mut self, text: impl Into<String>) {
        self.parser.set_text(text);
    }

    /// A navigation key was pressed; committed suggestions are executed.
    ///
    /// # Errors
    /// Returns an error if the committed command fails to persist.
    pub async fn handle_key(&mut self, key: InputKey) -> EchoResult<KeyOutcome> {
        let outcome = self.parser.handle_key(key);
        if let KeyOutcome::Commit(command) = outcome {
            debug!("Committed suggestion {}", command.trigger);
            self.execute_command(command.kind).await?;
        }
        Ok(outcome)
    }

    /// Send the draft. The draft is cleared unless the send fails.
    ///
    /// # Errors
    /// Returns an error if persisting fails; the draft is kept for a retry.
    pub async fn submit(&mut self, attachments: Vec<Attachment>) -> EchoResult<SendOutcome> {
        let draft = self.parser.draft().to_string();
        let outcome = self.send(&draft, attachments).await?;
        if outcome != SendOutcome::Empty {
            self.parser.clear();
        }
        Ok(outcome)
    }

    /// Handle raw input: commands are executed, text is persisted and answered.
    ///
    /// # Errors
    /// Returns a persistence error if the user message or command cannot be stored.
    pub async fn send(&mut self, raw: &str, attachments: Vec<Attachment>) -> EchoResult<SendOutcome> {
        match self.parser.classify(raw) {
            ParsedInput::Empty => Ok(SendOutcome::Empty),
            ParsedInput::Command(kind) => {
                self.execute_command(kind).await?;
                Ok(SendOutcome::Command(kind))
            }
            ParsedInput::UnknownCommand(token) => {
                debug!("Ignoring unknown command {token}");
                Ok(SendOutcome::UnknownCommand(token))
            }
            ParsedInput::Message(text) => {
                let message = self.send_message(text, attachments).await?;
                Ok(SendOutcome::Sent(message))
            }
        }
    }

    async fn send_message(
        &mut self,
        text: String,
        attachments: Vec<Attachment>,
    ) -> EchoResult<Message> {
        let message = match self.persist_user_message(text, attachments).await {
            Ok(message) => message,
            Err(err) => {
                error!("Failed to save message: {err}");
                self.sync_typing();
                return Err(err);
            }
        };

        self.publish(SessionUpdate::MessagePersisted(message.clone()));
        self.queue.push_back(QueuedRequest {
            conversation_id: message.conversation_id,
            generation: self.generation,
        });
        self.dispatch_next().await;
        self.sync_typing();
        Ok(message)
    }

    async fn persist_user_message(
        &self,
        text: String,
        attachments: Vec<Attachment>,
    ) -> EchoResult<Message> {
        let conversation = self.store.get_or_create_current(Utc::now()).await?;
        self.store
            .append_message(
                conversation.id,
                NewMessage::user(text, Utc::now()).with_attachments(attachments),
            )
            .await
    }

    /// Execute a command.
    ///
    /// Screenshot and export failures are reported as notices, not errors.
    ///
    /// # Errors
    /// Returns an error if a conversation write fails.
    pub async fn execute_command(&mut self, kind: CommandKind) -> EchoResult<()> {
        info!("Executing command {kind:?}");
        match kind {
            CommandKind::EndConversation => self.end_conversation().await,
            CommandKind::Clear => self.clear_current().await,
            CommandKind::SwitchModel(model) => {
                self.select_model(model);
                self.end_conversation().await
            }
            CommandKind::Screenshot => {
                if let Err(err) = self.services.capture.capture() {
                    warn!("Screenshot failed: {err}");
                    self.publish(SessionUpdate::Notice(format!("Screenshot failed: {err}")));
                }
                Ok(())
            }
            CommandKind::Export => self.export_current().await,
        }
    }

    /// Change the model without ending the conversation.
    pub fn select_model(&mut self, model: ChatModel) {
        if self.selected_model != model {
            info!("Model changed from {} to {model}", self.selected_model);
            self.selected_model = model;
            self.publish(SessionUpdate::ModelChanged(model));
        }
    }

    async fn end_conversation(&mut self) -> EchoResult<()> {
        self.invalidate_pending();
        let conversation = self.store.get_or_create_current(Utc::now()).await?;
        debug!("Conversation {} is current after end", conversation.id);
        self.publish(SessionUpdate::ConversationActivated(conversation.id));
        Ok(())
    }

    async fn clear_current(&mut self) -> EchoResult<()> {
        self.invalidate_pending();
        let Some(conversation) = self.store.current_conversation().await? else {
            return Ok(());
        };
        self.store.clear_messages(conversation.id).await?;
        self.publish(SessionUpdate::ConversationCleared(conversation.id));
        Ok(())
    }

    async fn export_current(&mut self) -> EchoResult<()> {
        let conversation = self.store.current_conversation().await?;
        let messages = match &conversation {
            Some(conversation) => self.store.messages_of(conversation.id).await?,
            None => Vec::new(),
        };
        if let Err(err) = self.services.exporter.export(conversation.as_ref(), &messages).await {
            warn!("Export failed: {err}");
            self.publish(SessionUpdate::Notice(format!("Export failed: {err}")));
        }
        Ok(())
    }

    /// Bring a conversation to the front. Returns `false` for unknown ids.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    pub async fn select_conversation(&mut self, id: ConversationId) -> EchoResult<bool> {
        if !self.store.exists(id).await? {
            warn!("Cannot select unknown conversation {id}");
            return Ok(false);
        }
        self.invalidate_pending();
        self.store.touch(id, Utc::now()).await?;
        debug!("Selected conversation {id}");
        self.publish(SessionUpdate::ConversationActivated(id));
        Ok(true)
    }

    /// Delete a conversation and its messages.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    pub async fn delete_conversation(&mut self, id: ConversationId) -> EchoResult<()> {
        let targeted = self.in_flight.is_some_and(|t| t.conversation_id == id)
            || self.queue.iter().any(|q| q.conversation_id == id);
        if targeted {
            self.invalidate_pending();
        }
        self.store.delete_conversation(id).await?;
        self.publish(SessionUpdate::ConversationDeleted(id));
        Ok(())
    }

    /// Wait for the next provider completion.
    pub async fn next_completion(&mut self) -> Option<Completion> {
        self.completions_rx.recv().await
    }

    /// Apply a provider completion on the owning task.
    ///
    /// Replies whose request was superseded by `/clear`, `/end`, a model
    /// switch, a selection change or a deletion are discarded silently.
    ///
    /// # Errors
    /// Returns an error if the assistant message cannot be persisted.
    pub async fn apply_completion(&mut self, completion: Completion) -> EchoResult<CompletionOutcome> {
        let Completion { ticket, result } = completion;
        let is_current = self.in_flight.is_some_and(|t| t.request_id == ticket.request_id);
        if !is_current || ticket.generation != self.generation {
            debug!("Discarding stale response {}", ticket.request_id);
            return Ok(CompletionOutcome::Discarded);
        }
        self.in_flight = None;

        let outcome = match result {
            Ok(content) => {
                let saved = self
                    .store
                    .append_message(ticket.conversation_id, NewMessage::assistant(content, Utc::now()))
                    .await;
                match saved {
                    Ok(message) => {
                        self.publish(SessionUpdate::MessagePersisted(message.clone()));
                        Ok(CompletionOutcome::Persisted(message))
                    }
                    Err(EchoError::ConversationNotFound(id)) => {
                        debug!("Conversation {id} vanished before its reply arrived");
                        Ok(CompletionOutcome::Discarded)
                    }
                    Err(err) => {
                        error!("Failed to save AI response: {err}");
                        self.publish(SessionUpdate::Notice(format!("Failed to save response: {err}")));
                        Err(err)
                    }
                }
            }
            Err(err) => {
                warn!("Response provider failed: {err}");
                self.publish(SessionUpdate::Notice(err.to_string()));
                Ok(CompletionOutcome::Failed(err))
            }
        };

        self.dispatch_next().await;
        self.sync_typing();
        outcome
    }

    /// Wait for one completion and apply it.
    ///
    /// # Errors
    /// Returns an error if the assistant message cannot be persisted.
    pub async fn pump_one(&mut self) -> EchoResult<CompletionOutcome> {
        let Some(completion) = self.next_completion().await else {
            return Ok(CompletionOutcome::Discarded);
        };
        self.apply_completion(completion).await
    }

    /// Give up on every pending reply. Used when shutdown cannot wait any longer.
    pub fn abandon_pending(&mut self) {
        if let Some(ticket) = self.in_flight {
            warn!(
                "Abandoning reply {} for {} and {} queued requests",
                ticket.request_id,
                ticket.conversation_id,
                self.queue.len()
            );
        }
        self.invalidate_pending();
    }

    fn invalidate_pending(&mut self) {
        self.generation += 1;
        if let Some(ticket) = self.in_flight.take() {
            debug!("Abandoning in-flight request {}", ticket.request_id);
        }
        self.queue.clear();
        self.sync_typing();
    }

    async fn dispatch_next(&mut self) {
        while self.in_flight.is_none() {
            let Some(request) = self.queue.pop_front() else {
                return;
            };
            if request.generation != self.generation {
                continue;
            }

            let history = match self.store.messages_of(request.conversation_id).await {
                Ok(history) => history,
                Err(err) => {
                    error!("Failed to load history for {}: {err}", request.conversation_id);
                    self.publish(SessionUpdate::Notice(format!("Failed to load history: {err}")));
                    continue;
                }
            };

            let ticket = RequestTicket {
                request_id: RequestId::new(),
                conversation_id: request.conversation_id,
                generation: request.generation,
            };
            self.in_flight = Some(ticket);

            let provider = Arc::clone(&self.provider);
            let completions = self.completions_tx.clone();
            let model = self.selected_model;
            debug!(
                "Requesting {model} reply {} for {} ({} messages)",
                ticket.request_id,
                ticket.conversation_id,
                history.len()
            );
            tokio::spawn(async move {
                let result = provider.generate(history, model).await;
                let _ = completions.send(Completion { ticket, result });
            });
        }
    }

    fn sync_typing(&mut self) {
        let typing = self.in_flight.is_some() || !self.queue.is_empty();
        if typing != self.typing {
            self.typing = typing;
            self.publish(SessionUpdate::TypingChanged(typing));
        }
    }

    fn publish(&self, update: SessionUpdate) {
        let _ = self.updates.send(update);
    }
}
