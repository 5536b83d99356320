use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};

use super::{EventStore, StoreError};
use crate::roster::attendees::{AddOutcome, Attendee, RemoveOutcome};
use crate::roster::events::Event;
use crate::types::{ChatRef, EventId, MessageRef, UserProfile, UserRef};

#[derive(Debug, Default)]
struct MemoryState {
    last_event_id: i64,
    events: BTreeMap<EventId, Event>,
    /// Rosters in insertion order.
    rosters: BTreeMap<EventId, Vec<Attendee>>,
}

/// An [`EventStore`] that keeps everything in process memory.
///
/// Each operation runs under a single lock that is never held across an
/// await point, so check-and-insert on a roster is atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn create_event(
        &self,
        chat: ChatRef,
        description: &str,
        creator: UserRef,
        now: DateTime<FixedOffset>,
    ) -> Result<EventId, StoreError> {
        let mut state = self.lock()?;
        state.last_event_id += 1;
        let id = EventId(state.last_event_id);
        state.events.insert(
            id,
            Event {
                id,
                chat,
                message: None,
                description: description.to_string(),
                creator,
                created_at: now,
            },
        );
        state.rosters.insert(id, Vec::new());
        Ok(id)
    }

    async fn set_message_ref(
        &self,
        event_id: EventId,
        message: MessageRef,
    ) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        let event = state
            .events
            .get_mut(&event_id)
            .ok_or(StoreError::EventNotFound(event_id))?;
        event.message = Some(message);
        Ok(())
    }

    async fn get_event(&self, event_id: EventId) -> Result<Option<Event>, StoreError> {
        Ok(self.lock()?.events.get(&event_id).cloned())
    }

    async fn list_attendees(&self, event_id: EventId) -> Result<Vec<Attendee>, StoreError> {
        let state = self.lock()?;
        let mut attendees = state.rosters.get(&event_id).cloned().unwrap_or_default();
        // Stable: equal join times keep insertion order
        attendees.sort_by_key(|a| a.joined_at);
        Ok(attendees)
    }

    async fn add_attendee(
        &self,
        event_id: EventId,
        profile: &UserProfile,
        now: DateTime<Utc>,
    ) -> Result<AddOutcome, StoreError> {
        let mut state = self.lock()?;
        let roster = state
            .rosters
            .get_mut(&event_id)
            .ok_or(StoreError::EventNotFound(event_id))?;

        if roster.iter().any(|a| a.user == profile.user) {
            return Ok(AddOutcome::AlreadyPresent);
        }

        roster.push(Attendee {
            event_id,
            user: profile.user,
            username: profile.username.clone(),
            first_name: profile.first_name.clone(),
            joined_at: now,
        });
        Ok(AddOutcome::Added)
    }

    async fn remove_attendee(
        &self,
        event_id: EventId,
        user: UserRef,
    ) -> Result<RemoveOutcome, StoreError> {
        let mut state = self.lock()?;
        let Some(roster) = state.rosters.get_mut(&event_id) else {
            return Ok(RemoveOutcome::WasNotPresent);
        };

        let before = roster.len();
        roster.retain(|a| a.user != user);
        if roster.len() < before {
            Ok(RemoveOutcome::Removed)
        } else {
            Ok(RemoveOutcome::WasNotPresent)
        }
    }

    async fn delete_event(&self, event_id: EventId) -> Result<bool, StoreError> {
        let mut state = self.lock()?;
        state.rosters.remove(&event_id);
        Ok(state.events.remove(&event_id).is_some())
    }
}
