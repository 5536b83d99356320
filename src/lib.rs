//! Chat bot for organising game sessions: users join or leave an event with
//! inline buttons and the event message is re-rendered in place with the
//! current roster.

use std::path::Path;
use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{filter::EnvFilter, fmt::Layer, prelude::*, registry::Registry};

pub mod bot;
pub mod dispatcher;
pub mod roster;
pub mod transport;
pub mod types;

pub use crate::bot::{RosterBot, RosterConfig};
pub use crate::dispatcher::{ActionOutcome, ActionStage, Dispatcher, RejectReason};
pub use crate::roster::Roster;
pub use crate::roster::attendees::{AddOutcome, Attendee, RemoveOutcome};
pub use crate::roster::database::{Database, DatabaseError};
pub use crate::roster::error::{Result, RosterError};
pub use crate::roster::events::Event;
pub use crate::roster::render::{RenderedView, render_event_text};
pub use crate::roster::store::{EventStore, MemoryStore, StoreError};
pub use crate::transport::telegram::{ParsedUpdate, TelegramClient, TelegramPoller, UpdateParser};
pub use crate::transport::{
    ActionPayload, ButtonKind, InlineAction, Transport, TransportError, event_actions,
};
pub use crate::types::{
    Action, ActionKind, ActionOrigin, CallbackRef, ChatRef, EventId, MessageRef, RetryInfo,
    UserProfile, UserRef,
};

static TRACING_GUARDS: OnceLock<(WorkerGuard, WorkerGuard)> = OnceLock::new();

/// Sets up logging to stdout and to a daily rotated file in `logs_dir`.
///
/// Only the first call installs the subscriber; later calls are no-ops.
pub fn init_tracing(logs_dir: &Path) -> Result<()> {
    if TRACING_GUARDS.get().is_some() {
        return Ok(());
    }

    let file_appender = tracing_appender::rolling::RollingFileAppender::builder()
        .rotation(tracing_appender::rolling::Rotation::DAILY)
        .filename_prefix("rosterbot")
        .filename_suffix("log")
        .build(logs_dir)
        .map_err(|e| RosterError::Configuration(format!("Failed to create file appender: {e}")))?;

    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);
    let (non_blocking_stdout, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());

    if TRACING_GUARDS.set((file_guard, stdout_guard)).is_err() {
        // Another caller won the race and owns the subscriber
        return Ok(());
    }

    let stdout_layer = Layer::new()
        .with_writer(non_blocking_stdout)
        .with_ansi(true)
        .with_target(true);

    let file_layer = Layer::new()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .with_target(true);

    // Fails only if the embedding application installed its own subscriber
    let _ = Registry::default()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(stdout_layer)
        .with(file_layer)
        .try_init();

    Ok(())
}
