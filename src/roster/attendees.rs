use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::roster::Roster;
use crate::roster::error::Result;
use crate::roster::render::{RenderedView, UNNAMED_ATTENDEE};
use crate::types::{EventId, UserProfile, UserRef};

/// One user's current membership in an event's roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attendee {
    pub event_id: EventId,
    pub user: UserRef,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub joined_at: DateTime<Utc>,
}

impl Attendee {
    /// `@username` if the user has one, their first name otherwise.
    pub fn display_name(&self) -> String {
        match (&self.username, &self.first_name) {
            (Some(username), _) if !username.is_empty() => format!("@{username}"),
            (_, Some(first_name)) if !first_name.is_empty() => first_name.clone(),
            _ => UNNAMED_ATTENDEE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    AlreadyPresent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    WasNotPresent,
}

impl Roster {
    /// Signs a user up for an event and returns the resulting view.
    ///
    /// Joining twice is not an error: the second call leaves the roster untouched
    /// and returns the same view.
    pub async fn join(&self, event_id: EventId, profile: &UserProfile) -> Result<RenderedView> {
        self.load_event(event_id).await?;

        let outcome = self
            .store
            .add_attendee(event_id, profile, Utc::now())
            .await?;

        tracing::debug!(
            target: "rosterbot::roster::join",
            "User {} joining event {}: {:?}",
            profile.user.0,
            event_id,
            outcome
        );

        self.render(event_id).await
    }

    /// Removes a user from an event's roster and returns the resulting view.
    /// Leaving an event one never joined succeeds without changing anything.
    pub async fn leave(&self, event_id: EventId, user: UserRef) -> Result<RenderedView> {
        self.load_event(event_id).await?;

        let outcome = self.store.remove_attendee(event_id, user).await?;

        tracing::debug!(
            target: "rosterbot::roster::leave",
            "User {} leaving event {}: {:?}",
            user.0,
            event_id,
            outcome
        );

        self.render(event_id).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::roster::error::RosterError;
    use crate::roster::render::EMPTY_ROSTER_LINE;
    use crate::roster::test_utils::*;
    use crate::types::ChatRef;

    async fn create_event(roster: &Roster) -> EventId {
        roster
            .create_event(ChatRef(-1), "Session 0: Friday 16:00", UserRef(99))
            .await
            .unwrap()
            .0
    }

    fn roster_lines(view: &RenderedView) -> Vec<String> {
        view.text
            .lines()
            .filter(|line| line.chars().next().is_some_and(|c| c.is_ascii_digit()))
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_display_name_preference() {
        let mut attendee = Attendee {
            event_id: EventId(1),
            user: UserRef(1),
            username: Some("alice".to_string()),
            first_name: Some("Alice".to_string()),
            joined_at: Utc::now(),
        };
        assert_eq!(attendee.display_name(), "@alice");

        attendee.username = None;
        assert_eq!(attendee.display_name(), "Alice");

        attendee.first_name = Some(String::new());
        assert_eq!(attendee.display_name(), "(no name)");
    }

    #[tokio::test]
    async fn test_join_and_leave_scenario() {
        let (roster, _store) = create_memory_roster();
        let event_id = create_event(&roster).await;

        let view = roster.render(event_id).await.unwrap();
        assert!(view.text.contains(EMPTY_ROSTER_LINE));

        let view = roster.join(event_id, &alice()).await.unwrap();
        assert_eq!(roster_lines(&view), vec!["1. @alice"]);

        let view = roster.join(event_id, &bob()).await.unwrap();
        assert_eq!(roster_lines(&view), vec!["1. @alice", "2. Bob"]);

        let view = roster.leave(event_id, alice().user).await.unwrap();
        assert_eq!(roster_lines(&view), vec!["1. Bob"]);
    }

    #[tokio::test]
    async fn test_join_twice_keeps_one_entry() {
        let (roster, store) = create_memory_roster();
        let event_id = create_event(&roster).await;

        let first = roster.join(event_id, &alice()).await.unwrap();
        let second = roster.join(event_id, &alice()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.list_attendees(event_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_leave_when_absent_is_noop() {
        let (roster, store) = create_memory_roster();
        let event_id = create_event(&roster).await;
        roster.join(event_id, &bob()).await.unwrap();

        let before = roster.render(event_id).await.unwrap();
        let after = roster.leave(event_id, alice().user).await.unwrap();

        assert_eq!(before, after);
        assert_eq!(store.list_attendees(event_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rejoin_moves_user_to_the_end() {
        let (roster, _store) = create_memory_roster();
        let event_id = create_event(&roster).await;

        roster.join(event_id, &alice()).await.unwrap();
        roster.join(event_id, &bob()).await.unwrap();
        roster.leave(event_id, alice().user).await.unwrap();
        let view = roster.join(event_id, &alice()).await.unwrap();

        assert_eq!(roster_lines(&view), vec!["1. Bob", "2. @alice"]);
    }

    #[tokio::test]
    async fn test_join_missing_event() {
        let (roster, _store) = create_memory_roster();
        let result = roster.join(EventId(12), &alice()).await;
        assert!(matches!(result, Err(RosterError::EventNotFound(EventId(12)))));
    }

    #[tokio::test]
    async fn test_leave_deleted_event() {
        let (roster, store) = create_memory_roster();
        let event_id = create_event(&roster).await;
        roster.join(event_id, &alice()).await.unwrap();

        assert!(store.delete_event(event_id).await.unwrap());

        let result = roster.leave(event_id, alice().user).await;
        assert!(matches!(result, Err(RosterError::EventNotFound(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_joins_from_distinct_users() {
        let (roster, store) = create_memory_roster();
        let event_id = create_event(&roster).await;
        let roster = Arc::new(roster);

        let mut handles = Vec::new();
        for i in 0..50 {
            let roster = roster.clone();
            handles.push(tokio::spawn(async move {
                roster.join(event_id, &profile(1_000 + i)).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let attendees = store.list_attendees(event_id).await.unwrap();
        assert_eq!(attendees.len(), 50);
        let view = roster.render(event_id).await.unwrap();
        assert_eq!(roster_lines(&view).len(), 50);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_joins_from_same_user() {
        let (roster, store) = create_memory_roster();
        let event_id = create_event(&roster).await;
        let roster = Arc::new(roster);

        let mut handles = Vec::new();
        for _ in 0..20 {
            let roster = roster.clone();
            handles.push(tokio::spawn(
                async move { roster.join(event_id, &alice()).await },
            ));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }

        assert_eq!(store.list_attendees(event_id).await.unwrap().len(), 1);
    }
}
