//! Telegram Bot API transport.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};

use crate::transport::{InlineAction, Transport, TransportError};
use crate::types::{CallbackRef, ChatRef, MessageRef};

pub mod poller;
pub mod types;
pub mod updates;

pub use poller::TelegramPoller;
pub use updates::{ParsedUpdate, UpdateParser};

use types::{
    AnswerCallbackQueryRequest, ApiResponse, EditMessageTextRequest, GetUpdatesRequest,
    InlineKeyboardMarkup, Message, SendMessageRequest, Update, User,
};

pub const DEFAULT_API_BASE_URL: &str = "https://api.telegram.org";

const REQUEST_TIMEOUT_SECS: u64 = 30;
/// Extra time granted to a long poll beyond the server-side wait.
const LONG_POLL_GRACE_SECS: u64 = 10;
const PARSE_MODE_HTML: &str = "HTML";

const NOT_MODIFIED_MARKER: &str = "message is not modified";
const UNREACHABLE_MARKERS: [&str; 4] = [
    "message to edit not found",
    "chat not found",
    "bot was kicked",
    "bot was blocked",
];

/// Client for the Bot API methods the bot uses.
#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    api_base_url: String,
    token: String,
}

impl std::fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramClient")
            .field("api_base_url", &self.api_base_url)
            .field("token", &"<REDACTED>")
            .finish()
    }
}

impl TelegramClient {
    /// Creates a client for the bot identified by `token`.
    ///
    /// # Arguments
    /// * `api_base_url` - Base URL of the Bot API, without the `/bot<token>` part
    /// * `token` - The bot token issued by BotFather
    pub fn new(api_base_url: &str, token: &str) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            http,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base_url, self.token, method)
    }

    async fn call<B, T>(
        &self,
        method: &str,
        body: &B,
        timeout: Option<Duration>,
    ) -> Result<T, TransportError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut request = self.http.post(self.method_url(method)).json(body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        // Failed calls still answer with the JSON envelope, so the status code is not checked here
        let response: ApiResponse<T> = request.send().await?.json().await?;

        if !response.ok {
            let code = response.error_code.unwrap_or_default();
            let description = response.description.unwrap_or_default();
            tracing::debug!(
                target: "rosterbot::telegram::call",
                "{} failed with {}: {}",
                method,
                code,
                description
            );
            return Err(classify_api_error(code, description));
        }

        response.result.ok_or(TransportError::MissingResult)
    }

    /// The bot's own account, used to recognise `/command@botname`.
    pub async fn get_me(&self) -> Result<User, TransportError> {
        self.call("getMe", &serde_json::json!({}), None).await
    }

    /// Long-polls for updates starting at `offset`, waiting up to `timeout_secs`
    /// on the server side.
    pub async fn get_updates(
        &self,
        offset: i64,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, TransportError> {
        let request = GetUpdatesRequest {
            offset,
            timeout: timeout_secs,
            allowed_updates: ["message", "callback_query"],
        };
        self.call(
            "getUpdates",
            &request,
            Some(Duration::from_secs(timeout_secs + LONG_POLL_GRACE_SECS)),
        )
        .await
    }
}

fn classify_api_error(code: i64, description: String) -> TransportError {
    let lowered = description.to_lowercase();
    if lowered.contains(NOT_MODIFIED_MARKER) {
        TransportError::MessageNotModified
    } else if code == 403 || UNREACHABLE_MARKERS.iter().any(|m| lowered.contains(m)) {
        TransportError::MessageUnreachable(description)
    } else {
        TransportError::Api { code, description }
    }
}

fn reply_markup(actions: &[InlineAction]) -> Option<InlineKeyboardMarkup> {
    if actions.is_empty() {
        None
    } else {
        Some(InlineKeyboardMarkup::from_actions(actions))
    }
}

#[async_trait]
impl Transport for TelegramClient {
    async fn send_message(
        &self,
        chat: ChatRef,
        text: &str,
        actions: &[InlineAction],
    ) -> Result<MessageRef, TransportError> {
        let request = SendMessageRequest {
            chat_id: chat.0,
            text,
            parse_mode: PARSE_MODE_HTML,
            reply_markup: reply_markup(actions),
        };
        let message: Message = self.call("sendMessage", &request, None).await?;
        Ok(MessageRef(message.message_id))
    }

    async fn edit_message(
        &self,
        chat: ChatRef,
        message: MessageRef,
        text: &str,
        actions: &[InlineAction],
    ) -> Result<(), TransportError> {
        let request = EditMessageTextRequest {
            chat_id: chat.0,
            message_id: message.0,
            text,
            parse_mode: PARSE_MODE_HTML,
            reply_markup: reply_markup(actions),
        };
        // The result is the edited message, or `true` for inline messages
        let _: serde_json::Value = self.call("editMessageText", &request, None).await?;
        Ok(())
    }

    async fn acknowledge(
        &self,
        callback: &CallbackRef,
        notice: Option<&str>,
    ) -> Result<(), TransportError> {
        let request = AnswerCallbackQueryRequest {
            callback_query_id: &callback.0,
            text: notice,
        };
        let _: bool = self.call("answerCallbackQuery", &request, None).await?;
        Ok(())
    }
}
