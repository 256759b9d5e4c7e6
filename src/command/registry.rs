//! Builtin slash commands.
//!
//! The catalog is a compile-time table. Every entry maps to a [`CommandKind`],
//! so dispatch is an exhaustive `match` instead of a string switch.

use serde::Serialize;

use crate::core::model::ChatModel;

/// Maximum number of suggestions shown while typing.
pub const MAX_SUGGESTIONS: usize = 5;

/// What a command does when executed.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(tag = "kind", content = "model", rename_all = "snake_case")]
pub enum CommandKind {
    /// End the current chat and start a new one.
    EndConversation,
    /// Wipe the current conversation's messages.
    Clear,
    /// Switch model, then behave like [`CommandKind::EndConversation`].
    SwitchModel(ChatModel),
    /// Forward to the screenshot collaborator.
    Screenshot,
    /// Forward to the export collaborator.
    Export,
}

/// A catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChatCommand {
    /// Trigger token, including the leading `/`.
    pub trigger: &'static str,
    /// Human-readable description.
    pub description: &'static str,
    /// Icon reference for the shell.
    pub icon: &'static str,
    /// Action performed on execution.
    pub kind: CommandKind,
}

impl ChatCommand {
    const fn new(
        trigger: &'static str,
        description: &'static str,
        icon: &'static str,
        kind: CommandKind,
    ) -> Self {
        Self {
            trigger,
            description,
            icon,
            kind,
        }
    }

    fn matches_query(&self, query: &str) -> bool {
        self.trigger.to_lowercase().contains(query)
            || self.description.to_lowercase().contains(query)
    }
}

static BUILTIN_COMMANDS: [ChatCommand; 10] = [
    ChatCommand::new(
        "/end",
        "End current chat and start new",
        "arrow.right.circle",
        CommandKind::EndConversation,
    ),
    ChatCommand::new("/clear", "Clear current conversation", "trash", CommandKind::Clear),
    ChatCommand::new(
        "/claude",
        "Switch to Claude and start new chat",
        "brain.head.profile",
        CommandKind::SwitchModel(ChatModel::ClaudeSonnet),
    ),
    ChatCommand::new(
        "/sonnet",
        "Switch to Claude Sonnet and start new chat",
        "brain.head.profile",
        CommandKind::SwitchModel(ChatModel::ClaudeSonnet),
    ),
    ChatCommand::new(
        "/gpt4",
        "Switch to GPT-4 and start new chat",
        "cpu",
        CommandKind::SwitchModel(ChatModel::Gpt4),
    ),
    ChatCommand::new(
        "/gpt4o",
        "Switch to GPT-4o and start new chat",
        "cpu",
        CommandKind::SwitchModel(ChatModel::Gpt4o),
    ),
    ChatCommand::new(
        "/ollama",
        "Switch to local Ollama and start new chat",
        "server.rack",
        CommandKind::SwitchModel(ChatModel::Ollama),
    ),
    ChatCommand::new("/screenshot", "Capture screenshot", "camera", CommandKind::Screenshot),
    ChatCommand::new("/ss", "Capture screenshot (short)", "camera", CommandKind::Screenshot),
    ChatCommand::new(
        "/export",
        "Export current conversation",
        "square.and.arrow.up",
        CommandKind::Export,
    ),
];

/// Read-only view over a command catalog.
#[derive(Debug, Clone, Copy)]
pub struct CommandRegistry {
    commands: &'static [ChatCommand],
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl CommandRegistry {
    /// The builtin catalog.
    #[must_use]
    pub const fn builtin() -> Self {
        Self {
            commands: &BUILTIN_COMMANDS,
        }
    }

    /// All commands in catalog order.
    #[must_use]
    pub const fn all(&self) -> &'static [ChatCommand] {
        self.commands
    }

    /// Exact, case-insensitive lookup of a full token such as `" /GPT4 "`.
    #[must_use]
    pub fn lookup(&self, token: &str) -> Option<&'static ChatCommand> {
        let token = token.trim();
        self.commands
            .iter()
            .find(|command| command.trigger.eq_ignore_ascii_case(token))
    }

    /// Commands whose trigger or description contains `query`, case-insensitively.
    ///
    /// Catalog order is preserved and at most [`MAX_SUGGESTIONS`] are returned.
    #[must_use]
    pub fn filter(&self, query: &str) -> Vec<&'static ChatCommand> {
        let query = query.to_lowercase();
        self.commands
            .iter()
            .filter(|command| command.matches_query(&query))
            .take(MAX_SUGGESTIONS)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triggers(commands: &[&ChatCommand]) -> Vec<&'static str> {
        commands.iter().map(|c| c.trigger).collect()
    }

    #[test]
    fn test_lookup_is_case_insensitive_and_trimmed() {
        let registry = CommandRegistry::builtin();
        assert_eq!(registry.lookup("/GPT4").map(|c| c.kind), Some(CommandKind::SwitchModel(ChatModel::Gpt4)));
        assert_eq!(registry.lookup("  /clear \n").map(|c| c.kind), Some(CommandKind::Clear));
        assert!(registry.lookup("/gpt").is_none());
        assert!(registry.lookup("/clear now").is_none());
    }

    #[test]
    fn test_aliases_share_a_kind() {
        let registry = CommandRegistry::builtin();
        assert_eq!(
            registry.lookup("/claude").map(|c| c.kind),
            registry.lookup("/sonnet").map(|c| c.kind)
        );
        assert_eq!(registry.lookup("/ss").map(|c| c.kind), Some(CommandKind::Screenshot));
    }

    #[test]
    fn test_filter_matches_trigger_or_description() {
        let registry = CommandRegistry::builtin();
        let found = triggers(&registry.filter("cl"));
        assert!(found.contains(&"/clear"));
        assert!(found.contains(&"/claude"));

        // "capture" only appears in descriptions
        assert_eq!(triggers(&registry.filter("CAPTURE")), vec!["/screenshot", "/ss"]);
        assert!(registry.filter("xyz").is_empty());
    }

    #[test]
    fn test_filter_caps_results_and_keeps_order() {
        let registry = CommandRegistry::builtin();
        let found = registry.filter("start new");
        assert_eq!(found.len(), MAX_SUGGESTIONS);
        assert_eq!(
            triggers(&found),
            vec!["/end", "/claude", "/sonnet", "/gpt4", "/gpt4o"]
        );
    }
}
