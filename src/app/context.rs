//! Process-wide context holding every engine component.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::app::events::EventBus;
use crate::conversation::store::{ConversationStore, SqliteConversationStore};
use crate::core::config::EchoConfig;
use crate::core::errors::EchoResult;
use crate::prefs::store::{Preferences, PreferencesStore, SqlitePreferences};
use crate::session::controller::{SessionController, SessionServices};
use crate::session::provider::{ResponseProvider, SimulatedProvider};
use crate::session::services::{JsonExporter, LoggingCapture};
use crate::window::lifecycle::WindowLifecycleController;

/// Explicitly constructed components shared by the event loop.
pub struct AppContext {
    /// Loaded configuration.
    pub config: EchoConfig,
    /// Conversation persistence.
    pub store: Arc<dyn ConversationStore>,
    /// Typed preferences.
    pub preferences: Preferences,
    /// Shell event bus.
    pub bus: EventBus,
    /// Session state owner.
    pub session: SessionController,
    /// Window lifecycle owner.
    pub window: WindowLifecycleController,
}

impl AppContext {
    /// Wire the components together.
    #[must_use]
    pub fn new(
        config: EchoConfig,
        store: Arc<dyn ConversationStore>,
        preferences: Arc<dyn PreferencesStore>,
        provider: Arc<dyn ResponseProvider>,
        services: SessionServices,
    ) -> Self {
        let preferences = Preferences::new(preferences, config.window.clone());
        let session = SessionController::new(
            Arc::clone(&store),
            provider,
            services,
            config.session.default_model,
        );
        let window = WindowLifecycleController::new(preferences.clone());
        Self {
            config,
            store,
            preferences,
            bus: EventBus::default(),
            session,
            window,
        }
    }

    /// Open the on-disk stores named by `config` with the simulated provider.
    ///
    /// # Errors
    /// Returns an error if a database cannot be opened.
    pub async fn open(config: EchoConfig) -> EchoResult<Self> {
        let storage = &config.storage;
        let store = SqliteConversationStore::open(storage, &config.session).await?;
        let preferences = SqlitePreferences::open(&storage.sqlite_path, storage.preferences_table.clone())?;
        let provider = SimulatedProvider::from_millis(config.session.simulated_latency_ms);
        let services = SessionServices::new(
            Arc::new(LoggingCapture),
            Arc::new(JsonExporter::new(export_dir(&config))),
        );
        info!("Opened {}", storage.sqlite_path.display());
        Ok(Self::new(
            config,
            Arc::new(store),
            Arc::new(preferences),
            Arc::new(provider),
            services,
        ))
    }
}

/// Exports are written next to the database.
fn export_dir(config: &EchoConfig) -> PathBuf {
    config
        .storage
        .sqlite_path
        .parent()
        .map_or_else(|| PathBuf::from("exports"), |dir| dir.join("exports"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ids::ConversationId;
    use crate::core::model::ChatModel;

    #[test]
    fn test_export_dir_sits_next_to_database() {
        let mut config = EchoConfig::default();
        assert_eq!(export_dir(&config), PathBuf::from("exports"));

        config.storage.sqlite_path = PathBuf::from("/tmp/echo/echo.sqlite");
        assert_eq!(export_dir(&config), PathBuf::from("/tmp/echo/exports"));
    }

    #[tokio::test]
    async fn test_open_uses_configured_model_and_starts_hidden() {
        let dir = std::env::temp_dir().join(format!("echo-ctx-{}", ConversationId::new()));
        std::fs::create_dir_all(&dir).unwrap();
        let mut config = EchoConfig::default();
        config.storage.sqlite_path = dir.join("echo.sqlite");
        config.session.default_model = ChatModel::Ollama;

        let ctx = AppContext::open(config).await.unwrap();
        assert_eq!(ctx.session.selected_model(), ChatModel::Ollama);
        assert!(!ctx.window.is_visible());
        assert!(ctx.store.list_conversations().await.unwrap().is_empty());

        drop(ctx);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
