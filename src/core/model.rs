//! Selectable AI model back-ends.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A model the user can chat with.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatModel {
    /// Anthropic's most capable Claude model.
    #[default]
    ClaudeSonnet,
    /// Fast and lightweight Claude model.
    ClaudeHaiku,
    /// Latest GPT model with vision.
    Gpt4o,
    /// GPT-4 reasoning model.
    Gpt4,
    /// Locally served model.
    Ollama,
}

impl ChatModel {
    /// Every model, in selector order.
    pub const ALL: [Self; 5] = [
        Self::ClaudeSonnet,
        Self::ClaudeHaiku,
        Self::Gpt4o,
        Self::Gpt4,
        Self::Ollama,
    ];

    /// Name shown in the UI and handed to providers.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::ClaudeSonnet => "Claude Sonnet",
            Self::ClaudeHaiku => "Claude Haiku",
            Self::Gpt4o => "GPT-4o",
            Self::Gpt4 => "GPT-4",
            Self::Ollama => "Ollama",
        }
    }

    /// Vendor serving the model.
    #[must_use]
    pub const fn provider(self) -> &'static str {
        match self {
            Self::ClaudeSonnet | Self::ClaudeHaiku => "Anthropic",
            Self::Gpt4o | Self::Gpt4 => "OpenAI",
            Self::Ollama => "Local",
        }
    }
}

impl fmt::Display for ChatModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for ChatModel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = value.trim();
        Self::ALL
            .into_iter()
            .find(|model| model.display_name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| value.to_string())
    }
}
