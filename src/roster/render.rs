use crate::roster::attendees::Attendee;
use crate::roster::events::Event;
use crate::types::{ChatRef, EventId, MessageRef};

pub(crate) const EMPTY_ROSTER_LINE: &str = "(nobody signed up yet)";
pub(crate) const UNNAMED_ATTENDEE: &str = "(no name)";
const CREATED_AT_FORMAT: &str = "%Y-%m-%d %H:%M";

/// The canonical text of an event and its roster, ready to be displayed verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedView {
    pub event_id: EventId,
    pub chat: ChatRef,
    /// The message the event was last delivered in, if any.
    pub message: Option<MessageRef>,
    pub text: String,
}

impl RenderedView {
    /// Renders `event` with `attendees`, which must already be in roster order.
    pub fn new(event: &Event, attendees: &[Attendee]) -> Self {
        Self {
            event_id: event.id,
            chat: event.chat,
            message: event.message,
            text: render_event_text(event, attendees),
        }
    }
}

/// Builds the message body for an event.
///
/// Identical inputs always produce identical output. User-supplied text is
/// escaped here and nowhere else.
pub fn render_event_text(event: &Event, attendees: &[Attendee]) -> String {
    let mut lines = vec![
        format!("📅 <b>Event</b>\n{}", escape_html(&event.description)),
        String::new(),
        "👥 <b>Attendees</b>:".to_string(),
    ];

    if attendees.is_empty() {
        lines.push(EMPTY_ROSTER_LINE.to_string());
    } else {
        for (rank, attendee) in attendees.iter().enumerate() {
            lines.push(format!(
                "{}. {}",
                rank + 1,
                escape_html(&attendee.display_name())
            ));
        }
    }

    lines.push(String::new());
    lines.push(format!(
        "🕒 Created: {}",
        event.created_at.format(CREATED_AT_FORMAT)
    ));
    lines.push(format!("🆔 Event #{}", event.id));

    lines.join("\n")
}

/// Escapes the characters that carry meaning in the transport's HTML subset.
pub(crate) fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}
