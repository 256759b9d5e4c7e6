//! Slash commands: the builtin catalog and the input parser.

pub mod parser;
pub mod registry;

pub use parser::{CommandParser, InputKey, KeyOutcome, ParsedInput, SuggestionState};
pub use registry::{ChatCommand, CommandKind, CommandRegistry, MAX_SUGGESTIONS};
