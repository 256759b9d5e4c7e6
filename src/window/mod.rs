//! Window lifecycle.

pub mod lifecycle;

pub use lifecycle::{WindowHandle, WindowLevel, WindowLifecycleController, WindowState};
