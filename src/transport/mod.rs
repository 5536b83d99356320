//! Outbound display of rendered events and inbound parsing of chat updates.
//!
//! The dispatcher only sees the [`Transport`] trait; [`telegram`] holds the
//! Bot API implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{CallbackRef, ChatRef, MessageRef};

pub mod payload;
pub mod telegram;

pub use payload::{ActionPayload, ButtonKind, event_actions};

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error {code}: {description}")]
    Api { code: i64, description: String },
    /// The edit would leave the message unchanged.
    #[error("Message is not modified")]
    MessageNotModified,
    #[error("Message unreachable: {0}")]
    MessageUnreachable(String),
    #[error("Response carried no result")]
    MissingResult,
}

/// An inline button shown under a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineAction {
    pub label: String,
    pub payload: String,
}

impl InlineAction {
    pub fn new(label: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            payload: payload.into(),
        }
    }
}

/// Displays text in a chat and answers button presses.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Posts a new message and returns its reference.
    async fn send_message(
        &self,
        chat: ChatRef,
        text: &str,
        actions: &[InlineAction],
    ) -> Result<MessageRef, TransportError>;

    /// Replaces the text and buttons of an existing message.
    ///
    /// Returns [`TransportError::MessageNotModified`] when the new content is
    /// identical to what is already displayed.
    async fn edit_message(
        &self,
        chat: ChatRef,
        message: MessageRef,
        text: &str,
        actions: &[InlineAction],
    ) -> Result<(), TransportError>;

    /// Stops the client-side spinner of a button press, optionally with a short notice.
    async fn acknowledge(
        &self,
        callback: &CallbackRef,
        notice: Option<&str>,
    ) -> Result<(), TransportError>;
}
