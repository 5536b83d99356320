use chrono::{DateTime, FixedOffset, Local};
use serde::{Deserialize, Serialize};

use crate::roster::Roster;
use crate::roster::error::{Result, RosterError};
use crate::roster::render::RenderedView;
use crate::types::{ChatRef, EventId, MessageRef, UserRef};

/// A sign-up-able occasion.
///
/// Everything except `message` is fixed at creation; `message` is filled in
/// once the event has been displayed for the first time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub chat: ChatRef,
    pub message: Option<MessageRef>,
    pub description: String,
    pub creator: UserRef,
    pub created_at: DateTime<FixedOffset>,
}

impl Roster {
    /// Creates a new event in `chat` and renders its (empty) roster.
    ///
    /// # Arguments
    ///
    /// * `chat` - The conversation the event belongs to
    /// * `raw_description` - Free text typed by the creator; surrounding whitespace is dropped
    /// * `creator` - The user creating the event
    ///
    /// # Errors
    ///
    /// Returns [`RosterError::Validation`] without persisting anything when the
    /// description is blank.
    pub async fn create_event(
        &self,
        chat: ChatRef,
        raw_description: &str,
        creator: UserRef,
    ) -> Result<(EventId, RenderedView)> {
        let description = raw_description.trim();
        if description.is_empty() {
            return Err(RosterError::Validation(
                "event description cannot be empty".to_string(),
            ));
        }

        let now = Local::now().fixed_offset();
        let event_id = self
            .store
            .create_event(chat, description, creator, now)
            .await?;

        tracing::info!(
            target: "rosterbot::roster::create_event",
            "Created event {} in chat {} by user {}",
            event_id,
            chat.0,
            creator.0
        );

        let view = self.render(event_id).await?;
        Ok((event_id, view))
    }

    /// Renders the current state of an event. Reads only.
    pub async fn render(&self, event_id: EventId) -> Result<RenderedView> {
        let event = self.load_event(event_id).await?;
        let attendees = self.store.list_attendees(event_id).await?;
        Ok(RenderedView::new(&event, &attendees))
    }

    /// Remembers which message displays the event.
    pub async fn set_message_ref(&self, event_id: EventId, message: MessageRef) -> Result<()> {
        self.store.set_message_ref(event_id, message).await?;
        tracing::debug!(
            target: "rosterbot::roster::set_message_ref",
            "Event {} is displayed in message {}",
            event_id,
            message.0
        );
        Ok(())
    }

    pub(crate) async fn load_event(&self, event_id: EventId) -> Result<Event> {
        self.store
            .get_event(event_id)
            .await?
            .ok_or(RosterError::EventNotFound(event_id))
    }
}
