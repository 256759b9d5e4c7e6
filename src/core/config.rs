//! Configuration for the session and interaction engine.

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::errors::{EchoError, EchoResult};
use crate::core::model::ChatModel;

/// Environment variable overriding the `SQLite` database path.
pub const DB_PATH_ENV: &str = "ECHO_DB_PATH";
/// Environment variable selecting the startup model by display name.
pub const MODEL_ENV: &str = "ECHO_MODEL";
/// Environment variable overriding the simulated provider latency.
pub const LATENCY_ENV: &str = "ECHO_RESPONSE_LATENCY_MS";

/// Top-level configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EchoConfig {
    /// Storage settings.
    pub storage: StorageConfig,
    /// Chat session settings.
    pub session: SessionConfig,
    /// Window presentation settings.
    pub window: WindowConfig,
}

impl EchoConfig {
    /// Build the default configuration overlaid with `ECHO_*` environment variables.
    ///
    /// # Errors
    /// Returns an error if a variable cannot be parsed or the result is invalid.
    pub fn from_env() -> EchoResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Self::from_env`] with an injectable variable source.
    ///
    /// # Errors
    /// Returns an error if a variable cannot be parsed or the result is invalid.
    pub fn from_lookup<F>(lookup: F) -> EchoResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup(DB_PATH_ENV) {
            config.storage.sqlite_path = PathBuf::from(path);
        }

        if let Some(model) = lookup(MODEL_ENV) {
            config.session.default_model = ChatModel::from_str(&model)
                .map_err(|raw| EchoError::InvalidConfig(format!("{MODEL_ENV}: unknown model {raw}")))?;
        }

        if let Some(latency) = lookup(LATENCY_ENV) {
            config.session.simulated_latency_ms = latency.trim().parse().map_err(|err| {
                EchoError::InvalidConfig(format!("{LATENCY_ENV}: {err}"))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> EchoResult<()> {
        for (name, table) in [
            ("storage.conversation_table", &self.storage.conversation_table),
            ("storage.message_table", &self.storage.message_table),
            ("storage.preferences_table", &self.storage.preferences_table),
        ] {
            if table.trim().is_empty() {
                return Err(EchoError::InvalidConfig(format!("{name} must not be empty")));
            }
        }

        if self.storage.conversation_table == self.storage.message_table {
            return Err(EchoError::InvalidConfig(
                "storage.conversation_table and storage.message_table must differ".to_string(),
            ));
        }

        if self.session.default_title.trim().is_empty() {
            return Err(EchoError::InvalidConfig(
                "session.default_title must not be empty".to_string(),
            ));
        }

        let window = &self.window;
        if !(0.0..=1.0).contains(&window.min_opacity)
            || !(0.0..=1.0).contains(&window.max_opacity)
            || window.min_opacity > window.max_opacity
        {
            return Err(EchoError::InvalidConfig(format!(
                "window opacity range [{}, {}] is invalid",
                window.min_opacity, window.max_opacity
            )));
        }

        if !(window.min_opacity..=window.max_opacity).contains(&window.default_opacity) {
            return Err(EchoError::InvalidConfig(format!(
                "window.default_opacity {} is outside [{}, {}]",
                window.default_opacity, window.min_opacity, window.max_opacity
            )));
        }

        Ok(())
    }
}

/// Storage configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// `SQLite` database path.
    pub sqlite_path: PathBuf,
    /// Conversation table name.
    pub conversation_table: String,
    /// Message table name.
    pub message_table: String,
    /// Preferences table name.
    pub preferences_table: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from("echo.sqlite"),
            conversation_table: "conversations".to_string(),
            message_table: "messages".to_string(),
            preferences_table: "preferences".to_string(),
        }
    }
}

/// Chat session settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Model selected at startup.
    pub default_model: ChatModel,
    /// Title given to freshly created conversations.
    pub default_title: String,
    /// Latency of the simulated provider, in milliseconds.
    pub simulated_latency_ms: u64,
    /// How long shutdown waits for pending replies, in milliseconds.
    pub shutdown_grace_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_model: ChatModel::ClaudeSonnet,
            default_title: "New Chat".to_string(),
            simulated_latency_ms: 2_000,
            shutdown_grace_ms: 10_000,
        }
    }
}

/// Window presentation settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Opacity used when nothing has been persisted yet.
    pub default_opacity: f64,
    /// Lowest accepted opacity.
    pub min_opacity: f64,
    /// Highest accepted opacity.
    pub max_opacity: f64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            default_opacity: 0.95,
            min_opacity: 0.5,
            max_opacity: 1.0,
        }
    }
}

impl WindowConfig {
    /// Clamp an opacity into the accepted domain.
    #[must_use]
    pub const fn clamp_opacity(&self, value: f64) -> f64 {
        if value.is_nan() {
            return self.default_opacity;
        }
        value.clamp(self.min_opacity, self.max_opacity)
    }
}
