//! The narrow persistence interface the roster engine depends on.
//!
//! Two implementations ship with the crate: [`Database`](crate::roster::database::Database)
//! (SQLite, durable) and [`MemoryStore`] (process-local).

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use thiserror::Error;

use crate::roster::attendees::{AddOutcome, Attendee, RemoveOutcome};
use crate::roster::database::DatabaseError;
use crate::roster::events::Event;
use crate::types::{ChatRef, EventId, MessageRef, UserProfile, UserRef};

pub mod memory;

pub use memory::MemoryStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Event {0} not found")]
    EventNotFound(EventId),
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(DatabaseError::Sqlx(err))
    }
}

/// Durable storage of events and their rosters.
///
/// Every method is atomic on its own: a failed call leaves nothing partially
/// written behind.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Inserts a new event and returns the identifier the store assigned to it.
    async fn create_event(
        &self,
        chat: ChatRef,
        description: &str,
        creator: UserRef,
        now: DateTime<FixedOffset>,
    ) -> Result<EventId, StoreError>;

    /// Records the message an event is displayed in. Repeating the call with the
    /// same value is harmless; an unknown event yields [`StoreError::EventNotFound`]
    /// and writes nothing.
    async fn set_message_ref(
        &self,
        event_id: EventId,
        message: MessageRef,
    ) -> Result<(), StoreError>;

    async fn get_event(&self, event_id: EventId) -> Result<Option<Event>, StoreError>;

    /// Returns the roster ascending by join time. Equal join times keep the
    /// order in which the store recorded the rows.
    async fn list_attendees(&self, event_id: EventId) -> Result<Vec<Attendee>, StoreError>;

    /// Adds `profile` to the roster of `event_id`.
    ///
    /// Concurrent calls for the same `(event, user)` pair resolve to exactly one
    /// row; all but one of them observe [`AddOutcome::AlreadyPresent`].
    async fn add_attendee(
        &self,
        event_id: EventId,
        profile: &UserProfile,
        now: DateTime<Utc>,
    ) -> Result<AddOutcome, StoreError>;

    /// Removes `user` from the roster. Removing someone who is not there is not an error.
    async fn remove_attendee(
        &self,
        event_id: EventId,
        user: UserRef,
    ) -> Result<RemoveOutcome, StoreError>;

    /// Administrative removal of an event together with its roster.
    /// Returns whether anything was deleted.
    async fn delete_event(&self, event_id: EventId) -> Result<bool, StoreError>;
}
