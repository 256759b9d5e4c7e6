//! Application wiring: shell events, the process context and the event loop.

pub mod context;
pub mod event_loop;
pub mod events;

pub use context::AppContext;
pub use event_loop::{DEFAULT_INPUT_CAPACITY, EventLoop};
pub use events::{EventBus, InputEvent, ShellEvent};
