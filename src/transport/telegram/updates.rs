//! Turns raw Bot API updates into typed [`Action`]s.
//!
//! This is the only place where command text and button payloads are parsed.

use crate::transport::payload::{ActionPayload, ButtonKind};
use crate::transport::telegram::types::{CallbackQuery, Message, Update, User};
use crate::types::{
    Action, ActionKind, ActionOrigin, CallbackRef, ChatRef, MessageRef, UserProfile, UserRef,
};

/// Command names recognised besides the configurable create command.
const HELP_COMMANDS: [&str; 2] = ["start", "help"];

/// What the poller should do with one update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedUpdate {
    /// Hand the action to the dispatcher.
    Action(Action),
    /// Answer the button press without acting on it, so the client stops
    /// showing a spinner.
    Dismiss(CallbackRef),
}

/// Parses updates for one bot.
#[derive(Debug, Clone)]
pub struct UpdateParser {
    create_command: String,
    bot_username: Option<String>,
}

impl UpdateParser {
    /// `bot_username` is used to ignore `/command@otherbot` in group chats;
    /// when unknown every addressed command is accepted.
    pub fn new(create_command: &str, bot_username: Option<String>) -> Self {
        Self {
            create_command: create_command.trim_start_matches('/').to_string(),
            bot_username,
        }
    }

    pub fn parse(&self, update: &Update) -> Option<ParsedUpdate> {
        if let Some(message) = &update.message {
            return self.parse_message(message).map(ParsedUpdate::Action);
        }
        if let Some(callback) = &update.callback_query {
            return Some(parse_callback(callback));
        }
        tracing::debug!(
            target: "rosterbot::telegram::parse",
            "Ignoring update {} without message or callback",
            update.update_id
        );
        None
    }

    fn parse_message(&self, message: &Message) -> Option<Action> {
        let text = message.text.as_deref()?;
        let from = message.from.as_ref()?;
        let (command, argument) = split_command(text)?;

        let (name, addressee) = match command.split_once('@') {
            Some((name, addressee)) => (name, Some(addressee)),
            None => (command, None),
        };
        if let (Some(addressee), Some(own)) = (addressee, self.bot_username.as_deref()) {
            if !addressee.eq_ignore_ascii_case(own) {
                return None;
            }
        }

        let kind = if name == self.create_command {
            ActionKind::Create {
                description: argument.to_string(),
            }
        } else if HELP_COMMANDS.contains(&name) {
            ActionKind::Help
        } else {
            tracing::debug!(
                target: "rosterbot::telegram::parse",
                "Ignoring unknown command /{}",
                name
            );
            return None;
        };

        Some(Action {
            kind,
            chat: ChatRef(message.chat.id),
            actor: profile_of(from),
            origin: ActionOrigin::Command {
                message: MessageRef(message.message_id),
            },
        })
    }
}

fn parse_callback(callback: &CallbackQuery) -> ParsedUpdate {
    let dismiss = || ParsedUpdate::Dismiss(CallbackRef(callback.id.clone()));

    let Some(message) = &callback.message else {
        tracing::debug!(
            target: "rosterbot::telegram::parse",
            "Dismissing callback {} without an attached message",
            callback.id
        );
        return dismiss();
    };
    let payload = match callback.data.as_deref().unwrap_or_default().parse::<ActionPayload>() {
        Ok(payload) => payload,
        Err(e) => {
            tracing::debug!(
                target: "rosterbot::telegram::parse",
                "Dismissing callback {} with malformed payload: {}",
                callback.id,
                e
            );
            return dismiss();
        }
    };

    let kind = match payload.kind {
        ButtonKind::Join => ActionKind::Join {
            event_id: payload.event_id,
        },
        ButtonKind::Leave => ActionKind::Leave {
            event_id: payload.event_id,
        },
    };

    ParsedUpdate::Action(Action {
        kind,
        chat: ChatRef(message.chat.id),
        actor: profile_of(&callback.from),
        origin: ActionOrigin::Button {
            message: MessageRef(message.message_id),
            callback: CallbackRef(callback.id.clone()),
        },
    })
}

/// Splits `"/cmd rest of text"` into `("cmd", "rest of text")`.
fn split_command(text: &str) -> Option<(&str, &str)> {
    let text = text.trim_start();
    let rest = text.strip_prefix('/')?;
    match rest.split_once(char::is_whitespace) {
        Some((command, argument)) => Some((command, argument.trim())),
        None => Some((rest, "")),
    }
}

fn profile_of(user: &User) -> UserProfile {
    UserProfile::new(
        UserRef(user.id),
        user.username.clone(),
        user.first_name.clone(),
    )
}
