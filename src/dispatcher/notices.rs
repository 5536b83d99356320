//! Fixed texts shown to users. Internal error details never end up here.

use crate::roster::render::escape_html;

pub const EVENT_GONE_NOTICE: &str = "This event no longer exists.";
pub const GENERIC_FAILURE_NOTICE: &str = "Something went wrong, please try again later.";

/// Usage hint for the create command, escaped for the HTML parse mode.
pub fn usage_notice(create_command: &str) -> String {
    escape_html(&format!(
        "Usage: /{create_command} <event description>"
    ))
}

/// Greeting sent for `/start` and `/help`.
pub fn help_notice(create_command: &str) -> String {
    escape_html(&format!(
        "Hi! Use /{create_command} <description> to create an event with sign-up buttons.\n\
         Example: /{create_command} Session 0: Friday 16:00 at the library"
    ))
}
