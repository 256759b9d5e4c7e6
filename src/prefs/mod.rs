//! Persisted user preferences.

pub mod store;

pub use store::{
    ApiKeyProvider, InMemoryPreferences, Point, PrefKey, PrefValue, Preferences, PreferencesStore,
    SqlitePreferences,
};
