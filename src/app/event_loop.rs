//! The serialized event loop.
//!
//! One task owns the [`AppContext`] and multiplexes user input, shell events
//! and provider completions, so no two mutations ever run concurrently.

use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::app::context::AppContext;
use crate::app::events::{InputEvent, ShellEvent};
use crate::command::registry::CommandKind;
use crate::core::errors::EchoResult;
use crate::session::controller::Completion;

/// Default capacity of the input channel.
pub const DEFAULT_INPUT_CAPACITY: usize = 64;

/// Drives an [`AppContext`] until [`InputEvent::Shutdown`].
pub struct EventLoop {
    ctx: AppContext,
    inputs: mpsc::Receiver<InputEvent>,
    shell: broadcast::Receiver<ShellEvent>,
}

impl EventLoop {
    /// Build the loop and the sender feeding it.
    #[must_use]
    pub fn new(ctx: AppContext, capacity: usize) -> (Self, mpsc::Sender<InputEvent>) {
        let (sender, inputs) = mpsc::channel(capacity.max(1));
        let shell = ctx.bus.subscribe();
        (Self { ctx, inputs, shell }, sender)
    }

    /// The owned context.
    #[must_use]
    pub const fn context(&self) -> &AppContext {
        &self.ctx
    }

    /// Mutable access, for wiring before [`Self::run`].
    pub const fn context_mut(&mut self) -> &mut AppContext {
        &mut self.ctx
    }

    /// Run until shutdown or until every input sender is dropped.
    ///
    /// Operation failures are logged and the loop keeps going. On shutdown,
    /// pending replies are awaited for `session.shutdown_grace_ms` and then
    /// abandoned.
    ///
    /// # Errors
    /// Currently infallible; reserved for fatal wiring errors.
    pub async fn run(mut self) -> EchoResult<AppContext> {
        info!("Event loop started");
        loop {
            tokio::select! {
                input = self.inputs.recv() => match input {
                    Some(InputEvent::Shutdown) | None => break,
                    Some(event) => self.handle_input(event).await,
                },
                shell = self.shell.recv() => match shell {
                    Ok(event) => self.handle_shell(event).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Dropped {skipped} shell events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                Some(completion) = self.ctx.session.next_completion() => {
                    self.handle_completion(completion).await;
                }
            }
        }
        self.drain_pending().await;
        info!("Event loop stopped");
        Ok(self.ctx)
    }

    async fn drain_pending(&mut self) {
        if !self.ctx.session.is_typing() {
            return;
        }
        let grace = Duration::from_millis(self.ctx.config.session.shutdown_grace_ms);
        info!("Waiting up to {grace:?} for pending replies");
        let deadline = Instant::now() + grace;
        while self.ctx.session.is_typing() {
            match tokio::time::timeout_at(deadline, self.ctx.session.next_completion()).await {
                Ok(Some(completion)) => self.handle_completion(completion).await,
                Ok(None) | Err(_) => break,
            }
        }
        if self.ctx.session.is_typing() {
            self.ctx.session.abandon_pending();
        }
    }

    async fn handle_input(&mut self, event: InputEvent) {
        debug!("Input {event:?}");
        let session = &mut self.ctx.session;
        let window = &mut self.ctx.window;
        let result = match event {
            InputEvent::TextChanged(text) => {
                session.input_changed(text);
                Ok(())
            }
            InputEvent::Key(key) => session.handle_key(key).await.map(drop),
            InputEvent::Submit { attachments } => session.submit(attachments).await.map(drop),
            InputEvent::SelectModel(model) => {
                session.select_model(model);
                Ok(())
            }
            InputEvent::DeleteConversation(id) => session.delete_conversation(id).await,
            InputEvent::ShowWindow => {
                window.show();
                Ok(())
            }
            InputEvent::HideWindow => {
                window.hide();
                Ok(())
            }
            InputEvent::ToggleWindow => {
                window.toggle();
                Ok(())
            }
            InputEvent::SetCollapsed(collapsed) => {
                window.set_collapsed(collapsed);
                Ok(())
            }
            InputEvent::SetAlwaysOnTop(always_on_top) => {
                window.update_always_on_top(always_on_top);
                Ok(())
            }
            InputEvent::Shutdown => Ok(()),
        };
        if let Err(err) = result {
            error!("Input handling failed: {err}");
        }
    }

    async fn handle_shell(&mut self, event: ShellEvent) {
        debug!("Shell event {event:?}");
        let result = match event {
            ShellEvent::StartNewConversation => {
                self.ctx.session.execute_command(CommandKind::EndConversation).await
            }
            ShellEvent::SelectConversation(id) => {
                self.ctx.session.select_conversation(id).await.map(drop)
            }
            ShellEvent::UpdateOpacity(value) => {
                self.ctx.window.set_opacity(value);
                Ok(())
            }
            ShellEvent::WindowWillClose => {
                self.ctx.window.will_close();
                Ok(())
            }
            ShellEvent::WindowDidMiniaturize => {
                self.ctx.window.miniaturized();
                Ok(())
            }
        };
        if let Err(err) = result {
            error!("Shell event handling failed: {err}");
        }
    }

    async fn handle_completion(&mut self, completion: Completion) {
        if let Err(err) = self.ctx.session.apply_completion(completion).await {
            error!("Applying response failed: {err}");
        }
    }
}
