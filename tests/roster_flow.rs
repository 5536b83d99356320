use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use rosterbot::{
    Action, ActionKind, ActionOrigin, ActionOutcome, CallbackRef, ChatRef, Database, Dispatcher,
    EventId, EventStore, InlineAction, MessageRef, RejectReason, Roster, RosterError, Transport,
    TransportError, UserProfile, UserRef,
};

const CHAT: ChatRef = ChatRef(-1001);

async fn create_sqlite_roster() -> (Roster, Arc<Database>, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let db = Arc::new(
        Database::new(temp_dir.path().join("roster.sqlite"))
            .await
            .expect("Failed to create database"),
    );
    (Roster::new(db.clone()), db, temp_dir)
}

fn alice() -> UserProfile {
    UserProfile::new(UserRef(1), Some("alice".to_string()), None)
}

fn bob() -> UserProfile {
    UserProfile::new(UserRef(2), None, Some("Bob".to_string()))
}

fn attendee_lines(text: &str) -> Vec<String> {
    text.lines()
        .skip_while(|line| !line.starts_with("👥"))
        .skip(1)
        .take_while(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Transport that keeps the latest text of every message it displayed.
#[derive(Default)]
struct ScreenTransport {
    messages: Mutex<Vec<(ChatRef, String)>>,
}

impl ScreenTransport {
    fn text_of(&self, message: MessageRef) -> String {
        let messages = self.messages.lock().unwrap();
        messages[message.0 as usize].1.clone()
    }
}

#[async_trait]
impl Transport for ScreenTransport {
    async fn send_message(
        &self,
        chat: ChatRef,
        text: &str,
        _actions: &[InlineAction],
    ) -> Result<MessageRef, TransportError> {
        let mut messages = self.messages.lock().unwrap();
        messages.push((chat, text.to_string()));
        Ok(MessageRef(messages.len() as i64 - 1))
    }

    async fn edit_message(
        &self,
        _chat: ChatRef,
        message: MessageRef,
        text: &str,
        _actions: &[InlineAction],
    ) -> Result<(), TransportError> {
        let mut messages = self.messages.lock().unwrap();
        let slot = messages
            .get_mut(message.0 as usize)
            .ok_or_else(|| TransportError::MessageUnreachable("no such message".to_string()))?;
        if slot.1 == text {
            return Err(TransportError::MessageNotModified);
        }
        slot.1 = text.to_string();
        Ok(())
    }

    async fn acknowledge(
        &self,
        _callback: &CallbackRef,
        _notice: Option<&str>,
    ) -> Result<(), TransportError> {
        Ok(())
    }
}

fn button(kind: ActionKind, actor: UserProfile, message: MessageRef) -> Action {
    Action {
        kind,
        chat: CHAT,
        actor,
        origin: ActionOrigin::Button {
            message,
            callback: CallbackRef("cb".to_string()),
        },
    }
}

#[tokio::test]
async fn test_session_scenario_against_sqlite() {
    let (roster, _db, _temp_dir) = create_sqlite_roster().await;

    let (event_id, view) = roster
        .create_event(CHAT, "Session 0: Friday 16:00", UserRef(99))
        .await
        .unwrap();
    assert_eq!(event_id, EventId(1));
    assert_eq!(attendee_lines(&view.text), vec!["(nobody signed up yet)"]);

    let view = roster.join(event_id, &alice()).await.unwrap();
    assert_eq!(attendee_lines(&view.text), vec!["1. @alice"]);

    let view = roster.join(event_id, &bob()).await.unwrap();
    assert_eq!(attendee_lines(&view.text), vec!["1. @alice", "2. Bob"]);

    let view = roster.leave(event_id, UserRef(1)).await.unwrap();
    assert_eq!(attendee_lines(&view.text), vec!["1. Bob"]);

    // Rendering without mutation is byte-identical
    let again = roster.render(event_id).await.unwrap();
    assert_eq!(again.text, view.text);
}

#[tokio::test]
async fn test_idempotent_join_and_leave() {
    let (roster, _db, _temp_dir) = create_sqlite_roster().await;
    let (event_id, _) = roster.create_event(CHAT, "Chess", UserRef(1)).await.unwrap();

    let first = roster.join(event_id, &alice()).await.unwrap();
    let second = roster.join(event_id, &alice()).await.unwrap();
    assert_eq!(first.text, second.text);
    assert_eq!(attendee_lines(&second.text), vec!["1. @alice"]);

    let untouched = roster.leave(event_id, UserRef(42)).await.unwrap();
    assert_eq!(untouched.text, second.text);
}

#[tokio::test]
async fn test_rejoin_moves_to_the_end() {
    let (roster, _db, _temp_dir) = create_sqlite_roster().await;
    let (event_id, _) = roster.create_event(CHAT, "Chess", UserRef(1)).await.unwrap();

    roster.join(event_id, &alice()).await.unwrap();
    roster.join(event_id, &bob()).await.unwrap();
    roster.leave(event_id, UserRef(1)).await.unwrap();
    let view = roster.join(event_id, &alice()).await.unwrap();

    assert_eq!(attendee_lines(&view.text), vec!["1. Bob", "2. @alice"]);
}

#[tokio::test]
async fn test_blank_description_persists_nothing() {
    let (roster, db, _temp_dir) = create_sqlite_roster().await;

    let result = roster.create_event(CHAT, " \t\n", UserRef(1)).await;
    assert!(matches!(result, Err(RosterError::Validation(_))));
    assert!(db.get_event(EventId(1)).await.unwrap().is_none());

    let (event_id, _) = roster.create_event(CHAT, "Chess", UserRef(1)).await.unwrap();
    assert_eq!(event_id, EventId(1));
}

#[tokio::test]
async fn test_unknown_event() {
    let (roster, db, _temp_dir) = create_sqlite_roster().await;
    assert!(matches!(
        roster.join(EventId(5), &alice()).await,
        Err(RosterError::EventNotFound(EventId(5)))
    ));

    let (event_id, _) = roster.create_event(CHAT, "Chess", UserRef(1)).await.unwrap();
    roster.join(event_id, &alice()).await.unwrap();
    assert!(db.delete_event(event_id).await.unwrap());

    assert!(matches!(
        roster.leave(event_id, UserRef(1)).await,
        Err(RosterError::EventNotFound(_))
    ));
    assert!(db.list_attendees(event_id).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_joins_from_distinct_users() {
    let (roster, db, _temp_dir) = create_sqlite_roster().await;
    let (event_id, _) = roster.create_event(CHAT, "Raid", UserRef(1)).await.unwrap();

    let mut handles = Vec::new();
    for user in 0..60 {
        let roster = roster.clone();
        handles.push(tokio::spawn(async move {
            let profile = UserProfile::new(UserRef(1000 + user), Some(format!("p{user}")), None);
            roster.join(event_id, &profile).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let attendees = db.list_attendees(event_id).await.unwrap();
    assert_eq!(attendees.len(), 60);
    assert!(
        attendees
            .windows(2)
            .all(|pair| pair[0].joined_at <= pair[1].joined_at)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_interleaved_join_leave_is_serializable() {
    let (roster, db, _temp_dir) = create_sqlite_roster().await;
    let (event_id, _) = roster.create_event(CHAT, "Raid", UserRef(1)).await.unwrap();

    let mut handles = Vec::new();
    for round in 0..30 {
        let roster = roster.clone();
        handles.push(tokio::spawn(async move {
            if round % 2 == 0 {
                roster.join(event_id, &alice()).await
            } else {
                roster.leave(event_id, UserRef(1)).await
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let attendees = db.list_attendees(event_id).await.unwrap();
    assert!(attendees.len() <= 1);
}

#[tokio::test]
async fn test_dispatcher_keeps_message_in_sync() {
    let (roster, db, _temp_dir) = create_sqlite_roster().await;
    let screen = Arc::new(ScreenTransport::default());
    let dispatcher = Dispatcher::new(roster, screen.clone(), "partida");

    let outcome = dispatcher
        .dispatch(Action {
            kind: ActionKind::Create {
                description: "Session 0: <Friday> & snacks".to_string(),
            },
            chat: CHAT,
            actor: alice(),
            origin: ActionOrigin::Command {
                message: MessageRef(77),
            },
        })
        .await;
    assert_eq!(outcome, ActionOutcome::Delivered);

    let event = db.get_event(EventId(1)).await.unwrap().unwrap();
    let message = event.message.expect("message reference was not stored");
    assert!(
        screen
            .text_of(message)
            .contains("Session 0: &lt;Friday&gt; &amp; snacks")
    );

    let join = ActionKind::Join {
        event_id: EventId(1),
    };
    assert_eq!(
        dispatcher.dispatch(button(join.clone(), bob(), message)).await,
        ActionOutcome::Delivered
    );
    assert_eq!(attendee_lines(&screen.text_of(message)), vec!["1. Bob"]);

    // Same press again leaves the text unchanged, which still counts as delivered
    assert_eq!(
        dispatcher.dispatch(button(join, bob(), message)).await,
        ActionOutcome::Delivered
    );

    db.delete_event(EventId(1)).await.unwrap();
    let outcome = dispatcher
        .dispatch(button(
            ActionKind::Leave {
                event_id: EventId(1),
            },
            bob(),
            message,
        ))
        .await;
    assert_eq!(
        outcome,
        ActionOutcome::Rejected(RejectReason::EventNotFound(EventId(1)))
    );
    assert_eq!(screen.text_of(message), "This event no longer exists.");
}
