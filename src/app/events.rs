//! Typed events crossing the shell boundary.

use tokio::sync::broadcast;
use tracing::debug;

use crate::command::parser::InputKey;
use crate::conversation::types::Attachment;
use crate::core::ids::ConversationId;
use crate::core::model::ChatModel;

/// Default capacity of the shell event bus.
pub const DEFAULT_BUS_CAPACITY: usize = 32;

/// Signals published by shell components (sidebar, history panel, settings, window).
#[derive(Clone, Debug, PartialEq)]
pub enum ShellEvent {
    /// Sidebar "new chat" button or menu item.
    StartNewConversation,
    /// A conversation was picked in the history panel.
    SelectConversation(ConversationId),
    /// Opacity slider moved.
    UpdateOpacity(f64),
    /// The window is about to close.
    WindowWillClose,
    /// The window was minimised.
    WindowDidMiniaturize,
}

/// Publish/subscribe channel for [`ShellEvent`]s.
#[derive(Clone, Debug)]
pub struct EventBus {
    sender: broadcast::Sender<ShellEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}

impl EventBus {
    /// Bus buffering up to `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event. Returns how many subscribers will see it.
    #[allow(clippy::must_use_candidate)]
    pub fn publish(&self, event: ShellEvent) -> usize {
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(broadcast::error::SendError(event)) => {
                debug!("No subscriber for {event:?}");
                0
            }
        }
    }

    /// Subscribe to events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ShellEvent> {
        self.sender.subscribe()
    }
}

/// Direct user input delivered to the event loop.
#[derive(Clone, Debug, PartialEq)]
pub enum InputEvent {
    /// The draft text changed.
    TextChanged(String),
    /// A navigation key was pressed in the input field.
    Key(InputKey),
    /// Send the draft.
    Submit {
        /// Files attached to the message.
        attachments: Vec<Attachment>,
    },
    /// Model picked in the model selector.
    SelectModel(ChatModel),
    /// Conversation deleted from the history panel.
    DeleteConversation(ConversationId),
    /// Show the window.
    ShowWindow,
    /// Hide the window.
    HideWindow,
    /// Global hotkey or menu bar click.
    ToggleWindow,
    /// Collapse or expand the chat pane.
    SetCollapsed(bool),
    /// Change the window level.
    SetAlwaysOnTop(bool),
    /// Stop the loop.
    Shutdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_reaches_every_subscriber() {
        let bus = EventBus::default();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        assert_eq!(bus.publish(ShellEvent::WindowWillClose), 2);
        assert_eq!(first.try_recv().unwrap(), ShellEvent::WindowWillClose);
        assert_eq!(second.try_recv().unwrap(), ShellEvent::WindowWillClose);
    }

    #[test]
    fn test_publish_without_subscribers_is_dropped() {
        let bus = EventBus::new(4);
        assert_eq!(bus.publish(ShellEvent::StartNewConversation), 0);

        let mut late = bus.subscribe();
        assert!(late.try_recv().is_err());
    }
}
