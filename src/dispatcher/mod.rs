//! Maps inbound actions onto roster operations and hands the result to the transport.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Semaphore;
use tokio::sync::mpsc::Receiver;
use tokio::task::JoinSet;

use crate::roster::Roster;
use crate::roster::error::RosterError;
use crate::roster::render::RenderedView;
use crate::transport::{Transport, TransportError, event_actions};
use crate::types::{Action, ActionKind, ActionOrigin, CallbackRef, ChatRef, EventId, MessageRef};

pub mod notices;
pub mod outcome;

use notices::{EVENT_GONE_NOTICE, GENERIC_FAILURE_NOTICE, help_notice, usage_notice};
pub use outcome::{ActionOutcome, ActionStage, RejectReason};
use outcome::ActionProgress;

pub struct Dispatcher {
    roster: Roster,
    transport: Arc<dyn Transport>,
    create_command: String,
    /// Per-event guards that serialize redisplaying a roster
    delivery_guards: DashMap<EventId, Arc<Semaphore>>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("roster", &self.roster)
            .field("transport", &"<REDACTED>")
            .field("create_command", &self.create_command)
            .finish()
    }
}

impl Dispatcher {
    /// # Arguments
    ///
    /// * `roster` - The engine actions are applied to
    /// * `transport` - Where rendered views and notices are displayed
    /// * `create_command` - Command name quoted in usage and help notices
    pub fn new(roster: Roster, transport: Arc<dyn Transport>, create_command: &str) -> Self {
        Self {
            roster,
            transport,
            create_command: create_command.trim_start_matches('/').to_string(),
            delivery_guards: DashMap::new(),
        }
    }

    /// Handles one action to completion and returns its terminal outcome.
    pub async fn dispatch(&self, action: Action) -> ActionOutcome {
        tracing::debug!(
            target: "rosterbot::dispatcher::dispatch",
            "Dispatching {:?} from user {} in chat {}",
            action.kind,
            action.actor.user.0,
            action.chat.0
        );

        let progress = ActionProgress::new();
        let outcome = match &action.kind {
            ActionKind::Create { description } => {
                self.handle_create(&action, description, progress).await
            }
            ActionKind::Join { event_id } | ActionKind::Leave { event_id } => {
                self.handle_membership(&action, *event_id, progress).await
            }
            ActionKind::Help => self.handle_help(&action, progress).await,
        };

        tracing::debug!(
            target: "rosterbot::dispatcher::dispatch",
            "{:?} finished with {:?}",
            action.kind,
            outcome
        );
        outcome
    }

    async fn handle_create(
        &self,
        action: &Action,
        description: &str,
        mut progress: ActionProgress,
    ) -> ActionOutcome {
        if description.trim().is_empty() {
            return self.reject_create(action.chat).await;
        }
        progress.advance(ActionStage::Validated);

        let (event_id, view) = match self
            .roster
            .create_event(action.chat, description, action.actor.user)
            .await
        {
            Ok(created) => created,
            Err(RosterError::Validation(_)) => return self.reject_create(action.chat).await,
            Err(e) => {
                tracing::error!(
                    target: "rosterbot::dispatcher::create",
                    "Failed to create event in chat {} for user {}: {}",
                    action.chat.0,
                    action.actor.user.0,
                    e
                );
                self.send_notice(action.chat, GENERIC_FAILURE_NOTICE).await;
                return progress.failed(e);
            }
        };
        progress.advance(ActionStage::Applied);
        progress.advance(ActionStage::Rendered);

        match self.post_view(event_id, &view).await {
            Ok(()) => progress.delivered(),
            Err(e) => {
                tracing::warn!(
                    target: "rosterbot::dispatcher::create",
                    "Event {} was created but could not be displayed in chat {}: {}",
                    event_id,
                    action.chat.0,
                    e
                );
                progress.failed(e)
            }
        }
    }

    async fn reject_create(&self, chat: ChatRef) -> ActionOutcome {
        tracing::debug!(
            target: "rosterbot::dispatcher::create",
            "Rejected create with empty description in chat {}",
            chat.0
        );
        self.send_notice(chat, &usage_notice(&self.create_command))
            .await;
        ActionOutcome::Rejected(RejectReason::Validation(
            "event description cannot be empty".to_string(),
        ))
    }

    async fn handle_membership(
        &self,
        action: &Action,
        event_id: EventId,
        mut progress: ActionProgress,
    ) -> ActionOutcome {
        let ActionOrigin::Button { message, callback } = &action.origin else {
            tracing::debug!(
                target: "rosterbot::dispatcher::membership",
                "Rejected {:?} from user {} without a button press",
                action.kind,
                action.actor.user.0
            );
            return ActionOutcome::Rejected(RejectReason::Validation(
                "joining and leaving happen through the event buttons".to_string(),
            ));
        };
        // The payload was parsed into a typed id at the transport boundary
        progress.advance(ActionStage::Validated);

        let applied = match &action.kind {
            ActionKind::Join { .. } => self.roster.join(event_id, &action.actor).await,
            _ => self.roster.leave(event_id, action.actor.user).await,
        };
        match applied {
            Ok(_) => {}
            Err(RosterError::EventNotFound(_)) => {
                return self
                    .reject_missing_event(action, event_id, *message, callback)
                    .await;
            }
            Err(e) => {
                tracing::error!(
                    target: "rosterbot::dispatcher::membership",
                    "Failed to apply {:?} for user {} in chat {}: {}",
                    action.kind,
                    action.actor.user.0,
                    action.chat.0,
                    e
                );
                self.acknowledge(callback, Some(GENERIC_FAILURE_NOTICE))
                    .await;
                return progress.failed(e);
            }
        }
        progress.advance(ActionStage::Applied);
        self.acknowledge(callback, None).await;

        // Presses on one event may finish their mutations in any order. Each
        // delivery renders the store as it is once the guard is held, so the
        // last edit to land always shows the latest roster.
        let guard = self
            .delivery_guards
            .entry(event_id)
            .or_insert_with(|| Arc::new(Semaphore::new(1)))
            .clone();
        let _permit = match guard.acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => return progress.failed(e),
        };

        let view = match self.roster.render(event_id).await {
            Ok(view) => view,
            Err(RosterError::EventNotFound(_)) => {
                return self
                    .reject_missing_event(action, event_id, *message, callback)
                    .await;
            }
            Err(e) => {
                tracing::error!(
                    target: "rosterbot::dispatcher::membership",
                    "Failed to render event {} after {:?}: {}",
                    event_id,
                    action.kind,
                    e
                );
                return progress.failed(e);
            }
        };
        progress.advance(ActionStage::Rendered);

        match self.update_view(*message, &view).await {
            Ok(()) => progress.delivered(),
            Err(e) => {
                tracing::warn!(
                    target: "rosterbot::dispatcher::membership",
                    "Roster of event {} changed but could not be redisplayed: {}",
                    event_id,
                    e
                );
                progress.failed(e)
            }
        }
    }

    async fn reject_missing_event(
        &self,
        action: &Action,
        event_id: EventId,
        message: MessageRef,
        callback: &CallbackRef,
    ) -> ActionOutcome {
        tracing::debug!(
            target: "rosterbot::dispatcher::membership",
            "Event {} no longer exists ({:?} by user {})",
            event_id,
            action.kind,
            action.actor.user.0
        );
        self.delivery_guards.remove(&event_id);

        self.acknowledge(callback, None).await;
        if let Err(e) = self
            .transport
            .edit_message(action.chat, message, EVENT_GONE_NOTICE, &[])
            .await
        {
            tracing::warn!(
                target: "rosterbot::dispatcher::membership",
                "Failed to mark message {} as stale: {}",
                message.0,
                e
            );
        }

        ActionOutcome::Rejected(RejectReason::EventNotFound(event_id))
    }

    async fn handle_help(&self, action: &Action, mut progress: ActionProgress) -> ActionOutcome {
        progress.advance(ActionStage::Validated);
        progress.advance(ActionStage::Applied);
        let text = help_notice(&self.create_command);
        progress.advance(ActionStage::Rendered);

        match self.transport.send_message(action.chat, &text, &[]).await {
            Ok(_) => progress.delivered(),
            Err(e) => {
                tracing::warn!(
                    target: "rosterbot::dispatcher::help",
                    "Failed to send help to chat {}: {}",
                    action.chat.0,
                    e
                );
                progress.failed(e)
            }
        }
    }

    /// Sends the view as a new message and remembers where it went.
    async fn post_view(&self, event_id: EventId, view: &RenderedView) -> Result<(), TransportError> {
        let message = self
            .transport
            .send_message(view.chat, &view.text, &event_actions(event_id))
            .await?;

        if let Err(e) = self.roster.set_message_ref(event_id, message).await {
            tracing::warn!(
                target: "rosterbot::dispatcher::post_view",
                "Event {} was displayed in message {} but the reference was not stored: {}",
                event_id,
                message.0,
                e
            );
        }
        Ok(())
    }

    async fn update_view(&self, message: MessageRef, view: &RenderedView) -> Result<(), TransportError> {
        match self
            .transport
            .edit_message(view.chat, message, &view.text, &event_actions(view.event_id))
            .await
        {
            Ok(()) => Ok(()),
            Err(TransportError::MessageNotModified) => {
                tracing::debug!(
                    target: "rosterbot::dispatcher::update_view",
                    "Message {} already shows the current roster of event {}",
                    message.0,
                    view.event_id
                );
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn acknowledge(&self, callback: &CallbackRef, notice: Option<&str>) {
        if let Err(e) = self.transport.acknowledge(callback, notice).await {
            tracing::warn!(
                target: "rosterbot::dispatcher::acknowledge",
                "Failed to acknowledge button press {}: {}",
                callback.0,
                e
            );
        }
    }

    async fn send_notice(&self, chat: ChatRef, text: &str) {
        if let Err(e) = self.transport.send_message(chat, text, &[]).await {
            tracing::warn!(
                target: "rosterbot::dispatcher::send_notice",
                "Failed to send notice to chat {}: {}",
                chat.0,
                e
            );
        }
    }

    /// Processes queued actions until shutdown.
    ///
    /// Every action runs in its own task, so a slow store or transport call
    /// never holds up unrelated actions. On shutdown the queue stops accepting
    /// new actions, the buffered ones are still dispatched and in-flight tasks
    /// are awaited.
    pub async fn run(self: Arc<Self>, mut receiver: Receiver<Action>, mut shutdown: Receiver<()>) {
        tracing::debug!(
            target: "rosterbot::dispatcher::run",
            "Starting action processing loop"
        );

        let mut tasks = JoinSet::new();
        let mut shutting_down = false;

        loop {
            tokio::select! {
                action = receiver.recv() => {
                    let Some(action) = action else {
                        tracing::debug!(
                            target: "rosterbot::dispatcher::run",
                            "Action queue drained, leaving processing loop"
                        );
                        break;
                    };
                    let dispatcher = self.clone();
                    tasks.spawn(async move { dispatcher.dispatch(action).await });
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    log_join_result(joined);
                }
                Some(_) = shutdown.recv(), if !shutting_down => {
                    tracing::info!(
                        target: "rosterbot::dispatcher::run",
                        "Received shutdown signal, finishing current queue..."
                    );
                    shutting_down = true;
                    receiver.close();
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            log_join_result(joined);
        }

        tracing::debug!(
            target: "rosterbot::dispatcher::run",
            "All in-flight actions finished"
        );
    }
}

fn log_join_result(joined: Result<ActionOutcome, tokio::task::JoinError>) {
    if let Err(e) = joined {
        tracing::error!(
            target: "rosterbot::dispatcher::run",
            "Action task ended abnormally: {}",
            e
        );
    }
}
