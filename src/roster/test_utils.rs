use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};

use crate::roster::Roster;
use crate::roster::attendees::{AddOutcome, Attendee, RemoveOutcome};
use crate::roster::events::Event;
pub(crate) use crate::roster::store::EventStore;
use crate::roster::store::{MemoryStore, StoreError};
use crate::transport::{InlineAction, Transport, TransportError};
use crate::types::{CallbackRef, ChatRef, EventId, MessageRef, UserProfile, UserRef};

pub(crate) fn create_memory_roster() -> (Roster, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    (Roster::new(store.clone()), store)
}

pub(crate) fn create_failing_roster() -> Roster {
    Roster::new(Arc::new(FailingStore))
}

pub(crate) fn alice() -> UserProfile {
    UserProfile::new(
        UserRef(1),
        Some("alice".to_string()),
        Some("Alice".to_string()),
    )
}

pub(crate) fn bob() -> UserProfile {
    UserProfile::new(UserRef(2), None, Some("Bob".to_string()))
}

pub(crate) fn profile(user: i64) -> UserProfile {
    UserProfile::new(UserRef(user), Some(format!("player{user}")), None)
}

/// A store whose every operation fails as if the disk went away.
pub(crate) struct FailingStore;

fn unavailable() -> StoreError {
    StoreError::Unavailable("simulated I/O failure".to_string())
}

#[async_trait]
impl EventStore for FailingStore {
    async fn create_event(
        &self,
        _chat: ChatRef,
        _description: &str,
        _creator: UserRef,
        _now: DateTime<FixedOffset>,
    ) -> Result<EventId, StoreError> {
        Err(unavailable())
    }

    async fn set_message_ref(
        &self,
        _event_id: EventId,
        _message: MessageRef,
    ) -> Result<(), StoreError> {
        Err(unavailable())
    }

    async fn get_event(&self, _event_id: EventId) -> Result<Option<Event>, StoreError> {
        Err(unavailable())
    }

    async fn list_attendees(&self, _event_id: EventId) -> Result<Vec<Attendee>, StoreError> {
        Err(unavailable())
    }

    async fn add_attendee(
        &self,
        _event_id: EventId,
        _profile: &UserProfile,
        _now: DateTime<Utc>,
    ) -> Result<AddOutcome, StoreError> {
        Err(unavailable())
    }

    async fn remove_attendee(
        &self,
        _event_id: EventId,
        _user: UserRef,
    ) -> Result<RemoveOutcome, StoreError> {
        Err(unavailable())
    }

    async fn delete_event(&self, _event_id: EventId) -> Result<bool, StoreError> {
        Err(unavailable())
    }
}

/// Everything a [`RecordingTransport`] was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TransportCall {
    Send {
        chat: ChatRef,
        text: String,
        actions: Vec<InlineAction>,
    },
    Edit {
        chat: ChatRef,
        message: MessageRef,
        text: String,
        actions: Vec<InlineAction>,
    },
    Acknowledge {
        callback: CallbackRef,
        notice: Option<String>,
    },
}

/// Which transport operations should fail, and how.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) enum FailureMode {
    #[default]
    Never,
    SendUnreachable,
    EditUnreachable,
    EditNotModified,
}

/// In-memory transport that records calls and hands out increasing message ids.
#[derive(Debug, Default)]
pub(crate) struct RecordingTransport {
    calls: Mutex<Vec<TransportCall>>,
    next_message: Mutex<i64>,
    failure: FailureMode,
}

impl RecordingTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing(failure: FailureMode) -> Self {
        Self {
            failure,
            ..Self::default()
        }
    }

    pub(crate) fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: TransportCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_message(
        &self,
        chat: ChatRef,
        text: &str,
        actions: &[InlineAction],
    ) -> Result<MessageRef, TransportError> {
        self.record(TransportCall::Send {
            chat,
            text: text.to_string(),
            actions: actions.to_vec(),
        });
        if self.failure == FailureMode::SendUnreachable {
            return Err(TransportError::MessageUnreachable(
                "bot was kicked from the group chat".to_string(),
            ));
        }
        let mut next = self.next_message.lock().unwrap();
        *next += 1;
        Ok(MessageRef(1000 + *next))
    }

    async fn edit_message(
        &self,
        chat: ChatRef,
        message: MessageRef,
        text: &str,
        actions: &[InlineAction],
    ) -> Result<(), TransportError> {
        self.record(TransportCall::Edit {
            chat,
            message,
            text: text.to_string(),
            actions: actions.to_vec(),
        });
        match self.failure {
            FailureMode::EditUnreachable => Err(TransportError::MessageUnreachable(
                "message to edit not found".to_string(),
            )),
            FailureMode::EditNotModified => Err(TransportError::MessageNotModified),
            _ => Ok(()),
        }
    }

    async fn acknowledge(
        &self,
        callback: &CallbackRef,
        notice: Option<&str>,
    ) -> Result<(), TransportError> {
        self.record(TransportCall::Acknowledge {
            callback: callback.clone(),
            notice: notice.map(str::to_string),
        });
        Ok(())
    }
}
