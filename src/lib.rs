//! Session and interaction engine for the Echo desktop chat assistant.
//!
//! The engine owns conversations and messages, tells plain text from slash
//! commands (with live suggestions), drives the asynchronous reply lifecycle
//! and keeps the window's visibility, collapse and placement in sync with
//! persisted preferences. Rendering, hotkeys and the menu bar belong to the
//! shell, which drives the engine through [`app::EventLoop`].

// Interdiction stricte de pratiques dangereuses ou non idiomatiques
#![deny(warnings)] // Tous les warnings sont traités comme des erreurs
#![deny(unsafe_code)] // Le code unsafe est interdit
#![deny(missing_docs)] // Toute fonction, struct, enum ou module public doit être documenté
#![deny(dead_code)] // Le code inutilisé est interdit
#![deny(non_camel_case_types)]
// Les types doivent suivre la convention CamelCase (exception explicite possible au besoin)

// Options supplémentaires pour ne rien laisser passer
#![deny(unused_imports)] // Les imports inutilisés sont interdits
#![deny(unused_variables)] // Les variables inutilisés sont interdits
#![deny(unused_must_use)] // Oblige à gérer explicitement les Result et Option
#![deny(non_snake_case)] // Les noms de variables et fonctions doivent être en snake_case
#![deny(non_upper_case_globals)] // Les constantes et globals doivent être en MAJUSCULE
#![deny(nonstandard_style)] // Empêche tout style de code non standard
#![forbid(unsafe_op_in_unsafe_fn)]
// Interdit l'utilisation d'unsafe même dans une fonction unsafe

// Clippy pour stricte discipline
#![deny(clippy::all)] // Active toutes les lints Clippy standard
#![deny(clippy::pedantic)] // Active les lints très strictes de Clippy
#![deny(clippy::nursery)] // Active les lints expérimentales
#![deny(clippy::unwrap_used)] // Interdit unwrap()
#![deny(clippy::expect_used)] // Interdit expect()
#![deny(clippy::panic)] // Interdit panic!()
#![deny(clippy::print_stdout)] // Interdit println!() en production
#![deny(clippy::todo)] // Interdit les TODO dans le code
#![deny(clippy::unimplemented)] // Interdit les fonctions non implémentées
#![deny(clippy::missing_const_for_fn)] // Force const lorsque possible
#![deny(clippy::unwrap_in_result)] // Interdit unwrap() sur Result
#![deny(clippy::module_inception)] // Interdit un module ayant le même nom que le crate
#![deny(clippy::redundant_clone)] // Interdit les clones inutiles
#![deny(clippy::shadow_unrelated)] // Interdit le shadowing de variables non liées
#![deny(clippy::too_many_arguments)] // Limite le nombre d’arguments des fonctions
#![deny(clippy::cognitive_complexity)] // Limite la complexité cognitive des fonctions

// Lints pour sécurité et robustesse
#![deny(overflowing_literals)] // Interdit les littéraux qui débordent

// Les tests peuvent unwrap() et comparer des flottants exacts
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::float_cmp,
        clippy::shadow_unrelated,
        clippy::too_many_lines
    )
)]

/// Shell events, process context and the serialized event loop.
pub mod app;
/// Slash command catalog and input parsing.
pub mod command;
/// Conversation and message persistence.
pub mod conversation;
/// Configuration, errors, identifiers and the model catalog.
pub mod core;
/// Persisted preferences.
pub mod prefs;
/// Session controller, reply providers and command collaborators.
pub mod session;
/// Entry helpers for the `echo` binary.
pub mod start_echo;
/// Window lifecycle.
pub mod window;

pub use app::{AppContext, EventBus, EventLoop, InputEvent, ShellEvent};
pub use crate::core::{ChatModel, EchoConfig, EchoError, EchoResult};
pub use session::{SessionController, SessionUpdate};

/// Install a `tracing` subscriber at `info` unless one is already set.
///
/// Safe to call more than once, e.g. from tests or an embedding shell.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_env_filter("info").try_init();
}
