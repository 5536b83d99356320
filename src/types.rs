use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identifier of an event, assigned by the store on creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub i64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EventId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<i64>().map(EventId)
    }
}

/// Opaque identifier of the conversation an event lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatRef(pub i64);

/// Opaque identifier of a message inside a chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageRef(pub i64);

/// Opaque identifier of a chat user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserRef(pub i64);

/// Handle the transport needs to acknowledge a button press.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallbackRef(pub String);

/// The display identity of a user, captured when they act.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub user: UserRef,
    pub username: Option<String>,
    pub first_name: Option<String>,
}

impl UserProfile {
    pub fn new(user: UserRef, username: Option<String>, first_name: Option<String>) -> Self {
        Self {
            user,
            username: username.filter(|u| !u.is_empty()),
            first_name: first_name.filter(|n| !n.is_empty()),
        }
    }
}

/// What the user asked for. Payload strings are parsed into these at the
/// transport boundary and never re-parsed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionKind {
    Create { description: String },
    Join { event_id: EventId },
    Leave { event_id: EventId },
    Help,
}

/// Where an action came from, which decides how its result is displayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOrigin {
    /// A typed command; replies go to the chat as new messages.
    Command { message: MessageRef },
    /// An inline button press on the message carrying the button.
    Button {
        message: MessageRef,
        callback: CallbackRef,
    },
}

/// One inbound user-triggered request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub kind: ActionKind,
    pub chat: ChatRef,
    pub actor: UserProfile,
    pub origin: ActionOrigin,
}

/// Retry information for operations that may hit transient failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryInfo {
    /// Number of times this operation has been retried
    pub attempt: u32,
    /// Maximum number of retry attempts allowed
    pub max_attempts: u32,
    /// Base delay in milliseconds for exponential backoff
    pub base_delay_ms: u64,
}

impl RetryInfo {
    pub fn new() -> Self {
        Self {
            attempt: 0,
            max_attempts: 5,
            base_delay_ms: 50,
        }
    }

    pub fn with_limits(max_attempts: u32, base_delay_ms: u64) -> Self {
        Self {
            attempt: 0,
            max_attempts,
            base_delay_ms,
        }
    }

    pub fn next_attempt(&self) -> Option<Self> {
        if self.attempt >= self.max_attempts {
            None
        } else {
            Some(Self {
                attempt: self.attempt + 1,
                max_attempts: self.max_attempts,
                base_delay_ms: self.base_delay_ms,
            })
        }
    }

    pub fn delay_ms(&self) -> u64 {
        self.base_delay_ms
            .saturating_mul(2_u64.saturating_pow(self.attempt))
    }

    pub fn should_retry(&self) -> bool {
        self.attempt < self.max_attempts
    }
}

impl Default for RetryInfo {
    fn default() -> Self {
        Self::new()
    }
}
