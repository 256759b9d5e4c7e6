//! Startup for the `echo` terminal front end.
//!
//! Standard input stands in for the desktop shell: plain lines and
//! `/commands` are submitted as drafts, `:` lines drive the window.

use std::io::Write;
use std::process::ExitCode;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::app::context::AppContext;
use crate::app::event_loop::{DEFAULT_INPUT_CAPACITY, EventLoop};
use crate::app::events::InputEvent;
use crate::conversation::types::Role;
use crate::core::config::EchoConfig;
use crate::prefs::store::Point;
use crate::session::controller::SessionUpdate;
use crate::window::lifecycle::{WindowHandle, WindowLevel};

/// Run the terminal front end until `:quit` or end of input.
///
/// # Returns
/// `ExitCode::SUCCESS` on a clean exit, `1` on failure.
#[must_use]
pub fn run() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Starting Echo v{}", env!("CARGO_PKG_VERSION"));

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to create runtime: {e}");
            return ExitCode::from(1);
        }
    };

    if let Err(e) = rt.block_on(serve()) {
        tracing::error!("Echo failed: {e:#}");
        return ExitCode::from(1);
    }

    ExitCode::SUCCESS
}

async fn serve() -> anyhow::Result<()> {
    let config = EchoConfig::from_env().context("loading configuration")?;
    let mut ctx = AppContext::open(config).await.context("opening stores")?;
    ctx.window.attach(Box::new(TerminalWindow::default()));

    let updates = ctx.session.subscribe();
    let (event_loop, inputs) = EventLoop::new(ctx, DEFAULT_INPUT_CAPACITY);

    let printer = tokio::spawn(print_updates(updates));
    let reader = tokio::spawn(read_stdin(inputs));

    let stopped = event_loop.run().await.context("running event loop")?;
    reader.abort();

    let conversations = stopped.store.list_conversations().await?;
    info!("Stopped with {} conversations", conversations.len());

    // Closing the update channel lets the printer flush what is left and exit.
    drop(stopped);
    if let Err(err) = printer.await {
        warn!("Update printer failed: {err}");
    }
    Ok(())
}

/// Map one input line to loop events.
#[must_use]
pub fn parse_line(line: &str) -> Vec<InputEvent> {
    let Some(directive) = line.trim().strip_prefix(':') else {
        return vec![
            InputEvent::TextChanged(line.to_string()),
            InputEvent::Submit {
                attachments: Vec::new(),
            },
        ];
    };

    let event = match directive.trim().to_ascii_lowercase().as_str() {
        "show" => InputEvent::ShowWindow,
        "hide" => InputEvent::HideWindow,
        "toggle" => InputEvent::ToggleWindow,
        "collapse" => InputEvent::SetCollapsed(true),
        "expand" => InputEvent::SetCollapsed(false),
        "top" => InputEvent::SetAlwaysOnTop(true),
        "untop" => InputEvent::SetAlwaysOnTop(false),
        "quit" => InputEvent::Shutdown,
        other => {
            warn!("Unknown directive :{other}");
            return Vec::new();
        }
    };
    vec![event]
}

async fn read_stdin(inputs: mpsc::Sender<InputEvent>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                warn!("Failed to read input: {err}");
                break;
            }
        };
        for event in parse_line(&line) {
            if inputs.send(event).await.is_err() {
                return;
            }
        }
    }
    let _ = inputs.send(InputEvent::Shutdown).await;
}

/// Terminal rendering of a session update, if it is worth showing.
#[must_use]
pub fn render_update(update: &SessionUpdate) -> Option<String> {
    match update {
        SessionUpdate::MessagePersisted(message) if message.role == Role::Assistant => {
            Some(format!("assistant> {}", message.content))
        }
        SessionUpdate::MessagePersisted(_) => None,
        SessionUpdate::TypingChanged(true) => Some("...".to_string()),
        SessionUpdate::TypingChanged(false) => None,
        SessionUpdate::ModelChanged(model) => Some(format!("[model: {model}]")),
        SessionUpdate::ConversationActivated(id) => Some(format!("[conversation {id}]")),
        SessionUpdate::ConversationCleared(_) => Some("[cleared]".to_string()),
        SessionUpdate::ConversationDeleted(id) => Some(format!("[deleted {id}]")),
        SessionUpdate::Notice(text) => Some(format!("! {text}")),
    }
}

async fn print_updates(mut updates: broadcast::Receiver<SessionUpdate>) {
    loop {
        match updates.recv().await {
            Ok(update) => {
                if let Some(line) = render_update(&update) {
                    let mut stdout = std::io::stdout().lock();
                    let _ = writeln!(stdout, "{line}");
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                debug!("Skipped {skipped} updates");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Window stand-in that only records geometry and logs.
#[derive(Debug, Default)]
struct TerminalWindow {
    origin: Point,
}

impl WindowHandle for TerminalWindow {
    fn origin(&self) -> Point {
        self.origin
    }

    fn set_origin(&mut self, origin: Point) {
        self.origin = origin;
    }

    fn place_default(&mut self) {
        self.origin = Point::new(20.0, 60.0);
    }

    fn order_front(&mut self) {
        debug!("terminal window: front");
    }

    fn order_out(&mut self) {
        debug!("terminal window: out");
    }

    fn set_level(&mut self, level: WindowLevel) {
        debug!("terminal window: level {level:?}");
    }

    fn resize_for_collapse(&mut self, collapsed: bool) {
        debug!("terminal window: collapsed {collapsed}");
    }

    fn set_opacity(&mut self, opacity: f64) {
        debug!("terminal window: opacity {opacity}");
    }
}
