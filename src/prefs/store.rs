//! Key-value preferences behind one interface.
//!
//! Reads and writes are synchronous and touch a single key. The typed
//! [`Preferences`] facade never fails: read errors fall back to defaults and
//! write errors are logged.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::config::WindowConfig;
use crate::core::errors::{EchoError, EchoResult};
use crate::core::model::ChatModel;

/// Persisted preference keys.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum PrefKey {
    /// Window floats above other windows.
    AlwaysOnTop,
    /// Window origin, horizontal.
    WindowOriginX,
    /// Window origin, vertical.
    WindowOriginY,
    /// Chat pane hidden, control rail shown.
    WindowIsCollapsed,
    /// Window opacity.
    WindowOpacity,
    /// `OpenAI` API key.
    OpenAiApiKey,
    /// Anthropic API key.
    AnthropicApiKey,
}

impl PrefKey {
    /// Every key.
    pub const ALL: [Self; 7] = [
        Self::AlwaysOnTop,
        Self::WindowOriginX,
        Self::WindowOriginY,
        Self::WindowIsCollapsed,
        Self::WindowOpacity,
        Self::OpenAiApiKey,
        Self::AnthropicApiKey,
    ];

    /// Storage name of the key.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AlwaysOnTop => "AlwaysOnTop",
            Self::WindowOriginX => "WindowOriginX",
            Self::WindowOriginY => "WindowOriginY",
            Self::WindowIsCollapsed => "WindowIsCollapsed",
            Self::WindowOpacity => "WindowOpacity",
            Self::OpenAiApiKey => "openai_api_key",
            Self::AnthropicApiKey => "anthropic_api_key",
        }
    }

    /// Values under this key are never logged.
    #[must_use]
    pub const fn is_secret(self) -> bool {
        matches!(self, Self::OpenAiApiKey | Self::AnthropicApiKey)
    }
}

impl fmt::Display for PrefKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrefValue {
    /// Boolean flag.
    Bool(bool),
    /// Floating point value.
    Float(f64),
    /// Text, such as an API key.
    Text(String),
}

impl PrefValue {
    /// The flag, if this is a boolean.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            Self::Float(_) | Self::Text(_) => None,
        }
    }

    /// The number, if this is a float.
    #[must_use]
    pub const fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(value) => Some(*value),
            Self::Bool(_) | Self::Text(_) => None,
        }
    }

    /// The text, if this is a string.
    #[must_use]
    pub fn into_text(self) -> Option<String> {
        match self {
            Self::Text(value) => Some(value),
            Self::Bool(_) | Self::Float(_) => None,
        }
    }
}

/// Providers whose API key the shell's settings panel stores.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ApiKeyProvider {
    /// `OpenAI`, for the GPT models.
    OpenAi,
    /// Anthropic, for the Claude models.
    Anthropic,
}

impl ApiKeyProvider {
    /// The provider serving `model`; `None` for local models.
    #[must_use]
    pub const fn for_model(model: ChatModel) -> Option<Self> {
        match model {
            ChatModel::Gpt4o | ChatModel::Gpt4 => Some(Self::OpenAi),
            ChatModel::ClaudeSonnet | ChatModel::ClaudeHaiku => Some(Self::Anthropic),
            ChatModel::Ollama => None,
        }
    }

    /// Key under which this provider's API key is stored.
    #[must_use]
    pub const fn pref_key(self) -> PrefKey {
        match self {
            Self::OpenAi => PrefKey::OpenAiApiKey,
            Self::Anthropic => PrefKey::AnthropicApiKey,
        }
    }
}

/// Synchronous key-value persistence.
pub trait PreferencesStore: Send + Sync {
    /// Read a key.
    ///
    /// # Errors
    /// Returns an error if the backend cannot be read.
    fn get(&self, key: PrefKey) -> EchoResult<Option<PrefValue>>;

    /// Write a key.
    ///
    /// # Errors
    /// Returns an error if the backend cannot be written.
    fn set(&self, key: PrefKey, value: PrefValue) -> EchoResult<()>;
}

fn lock<T>(mutex: &Mutex<T>) -> EchoResult<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| EchoError::Persistence("preferences lock poisoned".to_string()))
}

/// Process-local preferences, used by tests and embedders without a disk.
#[derive(Debug, Default)]
pub struct InMemoryPreferences {
    values: Mutex<HashMap<PrefKey, PrefValue>>,
}

impl InMemoryPreferences {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferencesStore for InMemoryPreferences {
    fn get(&self, key: PrefKey) -> EchoResult<Option<PrefValue>> {
        Ok(lock(&self.values)?.get(&key).cloned())
    }

    fn set(&self, key: PrefKey, value: PrefValue) -> EchoResult<()> {
        lock(&self.values)?.insert(key, value);
        Ok(())
    }
}

/// `SQLite` preferences: one row per key, value stored as JSON.
pub struct SqlitePreferences {
    conn: Mutex<Connection>,
    table: String,
}

impl SqlitePreferences {
    /// Open (or create) the preferences table in the database at `path`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or initialised.
    pub fn open(path: impl AsRef<Path>, table: impl Into<String>) -> EchoResult<Self> {
        Self::new(Connection::open(path)?, table)
    }

    /// In-memory database, for tests.
    ///
    /// # Errors
    /// Returns an error if initialisation fails.
    pub fn in_memory(table: impl Into<String>) -> EchoResult<Self> {
        Self::new(Connection::open_in_memory()?, table)
    }

    /// Wrap an existing connection and ensure the table exists.
    ///
    /// # Errors
    /// Returns an error if the table cannot be created.
    pub fn new(conn: Connection, table: impl Into<String>) -> EchoResult<Self> {
        let table = table.into();
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );"
        ))?;
        Ok(Self {
            conn: Mutex::new(conn),
            table,
        })
    }
}

impl PreferencesStore for SqlitePreferences {
    fn get(&self, key: PrefKey) -> EchoResult<Option<PrefValue>> {
        let raw: Option<String> = lock(&self.conn)?
            .query_row(
                &format!("SELECT value FROM {} WHERE key = ?1", self.table),
                [key.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        raw.map(|json| serde_json::from_str(&json).map_err(EchoError::from))
            .transpose()
    }

    fn set(&self, key: PrefKey, value: PrefValue) -> EchoResult<()> {
        let json = serde_json::to_string(&value)?;
        lock(&self.conn)?.execute(
            &format!(
                "INSERT INTO {} (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                self.table
            ),
            rusqlite::params![key.as_str(), json],
        )?;
        Ok(())
    }
}

/// A window origin in screen coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

impl Point {
    /// Build a point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// `(0, 0)` means "never saved".
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }
}

/// Typed access to the window preferences and provider API keys.
#[derive(Clone)]
pub struct Preferences {
    store: Arc<dyn PreferencesStore>,
    window: WindowConfig,
}

impl Preferences {
    /// Facade over `store`, with opacity bounds from `window`.
    #[must_use]
    pub const fn new(store: Arc<dyn PreferencesStore>, window: WindowConfig) -> Self {
        Self { store, window }
    }

    fn read(&self, key: PrefKey) -> Option<PrefValue> {
        match self.store.get(key) {
            Ok(value) => value,
            Err(err) => {
                warn!("Failed to read preference {key}: {err}");
                None
            }
        }
    }

    fn write(&self, key: PrefKey, value: PrefValue) {
        let shown = if key.is_secret() {
            "<redacted>".to_string()
        } else {
            format!("{value:?}")
        };
        match self.store.set(key, value) {
            Ok(()) => debug!("Saved preference {key} = {shown}"),
            Err(err) => warn!("Failed to save preference {key}: {err}"),
        }
    }

    fn read_bool(&self, key: PrefKey) -> bool {
        self.read(key).as_ref().and_then(PrefValue::as_bool).unwrap_or(false)
    }

    fn read_float(&self, key: PrefKey) -> Option<f64> {
        self.read(key).as_ref().and_then(PrefValue::as_float)
    }

    /// Whether the window floats.
    #[must_use]
    pub fn always_on_top(&self) -> bool {
        self.read_bool(PrefKey::AlwaysOnTop)
    }

    /// Persist the floating flag.
    pub fn set_always_on_top(&self, value: bool) {
        self.write(PrefKey::AlwaysOnTop, PrefValue::Bool(value));
    }

    /// Saved origin, `None` when nothing (or `(0, 0)`) was saved.
    #[must_use]
    pub fn window_origin(&self) -> Option<Point> {
        let origin = Point::new(
            self.read_float(PrefKey::WindowOriginX).unwrap_or(0.0),
            self.read_float(PrefKey::WindowOriginY).unwrap_or(0.0),
        );
        (!origin.is_zero()).then_some(origin)
    }

    /// Persist the origin.
    pub fn set_window_origin(&self, origin: Point) {
        self.write(PrefKey::WindowOriginX, PrefValue::Float(origin.x));
        self.write(PrefKey::WindowOriginY, PrefValue::Float(origin.y));
    }

    /// Whether the window is collapsed to its control rail.
    #[must_use]
    pub fn is_collapsed(&self) -> bool {
        self.read_bool(PrefKey::WindowIsCollapsed)
    }

    /// Persist the collapse flag.
    pub fn set_collapsed(&self, value: bool) {
        self.write(PrefKey::WindowIsCollapsed, PrefValue::Bool(value));
    }

    /// Saved opacity, clamped; the configured default when unset.
    #[must_use]
    pub fn opacity(&self) -> f64 {
        self.read_float(PrefKey::WindowOpacity)
            .map_or(self.window.default_opacity, |value| self.window.clamp_opacity(value))
    }

    /// Clamp and persist the opacity. Returns the stored value.
    #[must_use]
    pub fn set_opacity(&self, value: f64) -> f64 {
        let clamped = self.window.clamp_opacity(value);
        if (clamped - value).abs() > f64::EPSILON {
            debug!("Clamped opacity {value} to {clamped}");
        }
        self.write(PrefKey::WindowOpacity, PrefValue::Float(clamped));
        clamped
    }

    /// Saved API key for `provider`. Blank keys read as `None`.
    #[must_use]
    pub fn api_key(&self, provider: ApiKeyProvider) -> Option<String> {
        self.read(provider.pref_key())
            .and_then(PrefValue::into_text)
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
    }

    /// API key for the provider serving `model`, if it needs one and one is saved.
    #[must_use]
    pub fn api_key_for_model(&self, model: ChatModel) -> Option<String> {
        ApiKeyProvider::for_model(model).and_then(|provider| self.api_key(provider))
    }

    /// Persist the API key for `provider`. A blank key clears it.
    pub fn set_api_key(&self, provider: ApiKeyProvider, key: &str) {
        self.write(provider.pref_key(), PrefValue::Text(key.trim().to_string()));
    }
}
