use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::transport::InlineAction;
use crate::types::EventId;

pub const JOIN_LABEL: &str = "✅ Join";
pub const LEAVE_LABEL: &str = "❌ Leave";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ButtonKind {
    Join,
    Leave,
}

impl ButtonKind {
    fn as_str(&self) -> &'static str {
        match self {
            ButtonKind::Join => "join",
            ButtonKind::Leave => "leave",
        }
    }
}

/// The data carried by an inline button, `"<kind>:<event id>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActionPayload {
    pub kind: ButtonKind,
    pub event_id: EventId,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PayloadError {
    #[error("Missing ':' separator in payload {0:?}")]
    MissingSeparator(String),
    #[error("Unknown button kind {0:?}")]
    UnknownKind(String),
    #[error("Invalid event id {0:?}")]
    InvalidEventId(String),
}

impl fmt::Display for ActionPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.event_id)
    }
}

impl FromStr for ActionPayload {
    type Err = PayloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = s
            .split_once(':')
            .ok_or_else(|| PayloadError::MissingSeparator(s.to_string()))?;

        let kind = match kind {
            "join" => ButtonKind::Join,
            "leave" => ButtonKind::Leave,
            other => return Err(PayloadError::UnknownKind(other.to_string())),
        };
        let event_id = id
            .parse::<EventId>()
            .map_err(|_| PayloadError::InvalidEventId(id.to_string()))?;

        Ok(Self { kind, event_id })
    }
}

/// The Join/Leave button pair attached to every event message.
pub fn event_actions(event_id: EventId) -> Vec<InlineAction> {
    vec![
        InlineAction::new(
            JOIN_LABEL,
            ActionPayload {
                kind: ButtonKind::Join,
                event_id,
            }
            .to_string(),
        ),
        InlineAction::new(
            LEAVE_LABEL,
            ActionPayload {
                kind: ButtonKind::Leave,
                event_id,
            }
            .to_string(),
        ),
    ]
}
