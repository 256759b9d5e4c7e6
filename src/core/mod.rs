//! Core types shared by every engine component.

pub mod config;
pub mod errors;
pub mod ids;
pub mod model;

pub use config::{EchoConfig, SessionConfig, StorageConfig, WindowConfig};
pub use errors::{EchoError, EchoResult, ProviderError, ProviderResult};
pub use ids::{ConversationId, MessageId, RequestId};
pub use model::ChatModel;
