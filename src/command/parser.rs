//! Input classification and live command suggestions.

use crate::command::registry::{ChatCommand, CommandKind, CommandRegistry};

/// Navigation keys understood while suggestions are shown.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InputKey {
    /// Move the selection up.
    Up,
    /// Move the selection down.
    Down,
    /// Commit the selected suggestion.
    Tab,
    /// Commit the selected suggestion.
    Enter,
    /// Hide suggestions, keep the draft.
    Escape,
}

/// Result of feeding a key to the parser.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum KeyOutcome {
    /// The key changed suggestion state.
    Handled,
    /// A suggestion was committed; the caller must execute it.
    Commit(&'static ChatCommand),
    /// The key is not for the suggestion UI.
    Ignored,
}

/// How a submitted input should be handled.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ParsedInput {
    /// Nothing but whitespace.
    Empty,
    /// Plain text to persist and answer.
    Message(String),
    /// A recognised command.
    Command(CommandKind),
    /// A `/` token that is not in the registry.
    UnknownCommand(String),
}

/// Ephemeral autocomplete state derived from the draft.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SuggestionState {
    active: bool,
    candidates: Vec<&'static ChatCommand>,
    selected_index: usize,
}

impl SuggestionState {
    /// Whether the suggestion list is shown.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Candidate commands, at most five.
    #[must_use]
    pub fn candidates(&self) -> &[&'static ChatCommand] {
        &self.candidates
    }

    /// Index of the highlighted candidate.
    #[must_use]
    pub const fn selected_index(&self) -> usize {
        self.selected_index
    }

    /// The highlighted candidate, when active.
    #[must_use]
    pub fn selected(&self) -> Option<&'static ChatCommand> {
        if self.active {
            self.candidates.get(self.selected_index).copied()
        } else {
            None
        }
    }

    const fn deactivate(&mut self) {
        self.active = false;
    }
}

/// Draft text plus the suggestion state machine, re-evaluated on every change.
#[derive(Clone, Debug, Default)]
pub struct CommandParser {
    registry: CommandRegistry,
    draft: String,
    suggestions: SuggestionState,
}

impl CommandParser {
    /// Parser over the given registry.
    #[must_use]
    pub fn new(registry: CommandRegistry) -> Self {
        Self {
            registry,
            draft: String::new(),
            suggestions: SuggestionState::default(),
        }
    }

    /// Current draft text.
    #[must_use]
    pub fn draft(&self) -> &str {
        &self.draft
    }

    /// Current suggestion state.
    #[must_use]
    pub const fn suggestions(&self) -> &SuggestionState {
        &self.suggestions
    }

    /// The registry this parser resolves against.
    #[must_use]
    pub const fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    /// Replace the draft and recompute suggestions.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.draft = text.into();
        self.recompute();
    }

    /// Empty the draft.
    pub fn clear(&mut self) {
        self.set_text(String::new());
    }

    fn recompute(&mut self) {
        // A bare "/" has no query yet and never opens the list.
        let Some(query) = self.draft.strip_prefix('/').filter(|query| !query.is_empty()) else {
            self.suggestions = SuggestionState::default();
            return;
        };

        let candidates = self.registry.filter(query);
        self.suggestions = SuggestionState {
            active: !candidates.is_empty(),
            candidates,
            selected_index: 0,
        };
    }

    /// Feed a navigation key.
    pub fn handle_key(&mut self, key: InputKey) -> KeyOutcome {
        if !self.suggestions.active {
            return KeyOutcome::Ignored;
        }

        let last = self.suggestions.candidates.len().saturating_sub(1);
        match key {
            InputKey::Up => {
                self.suggestions.selected_index = self.suggestions.selected_index.saturating_sub(1);
                KeyOutcome::Handled
            }
            InputKey::Down => {
                self.suggestions.selected_index = (self.suggestions.selected_index + 1).min(last);
                KeyOutcome::Handled
            }
            InputKey::Tab | InputKey::Enter => {
                let Some(command) = self.suggestions.selected() else {
                    return KeyOutcome::Ignored;
                };
                self.draft = command.trigger.to_string();
                self.suggestions.deactivate();
                KeyOutcome::Commit(command)
            }
            InputKey::Escape => {
                self.suggestions.deactivate();
                KeyOutcome::Handled
            }
        }
    }

    /// Classify submitted text.
    #[must_use]
    pub fn classify(&self, raw: &str) -> ParsedInput {
        let text = raw.trim();
        if text.is_empty() {
            return ParsedInput::Empty;
        }
        if !text.starts_with('/') {
            return ParsedInput::Message(text.to_string());
        }
        self.registry.lookup(text).map_or_else(
            || ParsedInput::UnknownCommand(text.to_string()),
            |command| ParsedInput::Command(command.kind),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::ChatModel;

    fn parser() -> CommandParser {
        CommandParser::new(CommandRegistry::builtin())
    }

    #[test]
    fn test_plain_text_is_inactive() {
        let mut parser = parser();
        parser.set_text("hello /clear");
        assert!(!parser.suggestions().is_active());
        assert!(parser.suggestions().candidates().is_empty());
    }

    #[test]
    fn test_bare_slash_never_activates() {
        let mut parser = parser();
        parser.set_text("/");
        assert!(!parser.suggestions().is_active());
        assert!(parser.suggestions().candidates().is_empty());
        assert_eq!(parser.handle_key(InputKey::Enter), KeyOutcome::Ignored);
    }

    #[test]
    fn test_query_activates_with_matches() {
        let mut parser = parser();
        parser.set_text("/cl");
        let state = parser.suggestions();
        assert!(state.is_active());
        assert_eq!(state.selected_index(), 0);
        let triggers: Vec<_> = state.candidates().iter().map(|c| c.trigger).collect();
        assert!(triggers.contains(&"/clear"));
        assert!(triggers.contains(&"/claude"));
    }

    #[test]
    fn test_no_match_is_inactive() {
        let mut parser = parser();
        parser.set_text("/xyz");
        assert!(!parser.suggestions().is_active());
        assert!(parser.suggestions().candidates().is_empty());
    }

    #[test]
    fn test_navigation_is_clamped() {
        let mut parser = parser();
        parser.set_text("/screen");
        assert_eq!(parser.suggestions().candidates().len(), 2);

        assert_eq!(parser.handle_key(InputKey::Up), KeyOutcome::Handled);
        assert_eq!(parser.suggestions().selected_index(), 0);

        parser.handle_key(InputKey::Down);
        parser.handle_key(InputKey::Down);
        parser.handle_key(InputKey::Down);
        assert_eq!(parser.suggestions().selected_index(), 1);
    }

    #[test]
    fn test_retyping_resets_selection() {
        let mut parser = parser();
        parser.set_text("/s");
        parser.handle_key(InputKey::Down);
        assert_eq!(parser.suggestions().selected_index(), 1);
        parser.set_text("/sw");
        assert_eq!(parser.suggestions().selected_index(), 0);
    }

    #[test]
    fn test_commit_replaces_draft_and_deactivates() {
        let mut parser = parser();
        parser.set_text("/gpt");
        parser.handle_key(InputKey::Down);
        let outcome = parser.handle_key(InputKey::Tab);

        let KeyOutcome::Commit(command) = outcome else {
            panic!("expected a commit, got {outcome:?}");
        };
        assert_eq!(command.kind, CommandKind::SwitchModel(ChatModel::Gpt4o));
        assert_eq!(parser.draft(), "/gpt4o");
        assert!(!parser.suggestions().is_active());
    }

    #[test]
    fn test_escape_keeps_draft() {
        let mut parser = parser();
        parser.set_text("/ex");
        assert_eq!(parser.handle_key(InputKey::Escape), KeyOutcome::Handled);
        assert_eq!(parser.draft(), "/ex");
        assert!(!parser.suggestions().is_active());
        assert_eq!(parser.handle_key(InputKey::Down), KeyOutcome::Ignored);
    }

    #[test]
    fn test_classify() {
        let parser = parser();
        assert_eq!(parser.classify("   \n"), ParsedInput::Empty);
        assert_eq!(parser.classify("  hi there "), ParsedInput::Message("hi there".to_string()));
        assert_eq!(parser.classify("/CLEAR"), ParsedInput::Command(CommandKind::Clear));
        assert_eq!(
            parser.classify("/nope"),
            ParsedInput::UnknownCommand("/nope".to_string())
        );
    }
}
