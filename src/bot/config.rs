use std::path::{Path, PathBuf};

use crate::roster::error::{Result, RosterError};
use crate::transport::telegram::DEFAULT_API_BASE_URL;
use crate::types::RetryInfo;

pub const DEFAULT_CREATE_COMMAND: &str = "partida";
pub const DEFAULT_POLL_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_ACTION_QUEUE_CAPACITY: usize = 500;
const DATABASE_FILE_NAME: &str = "rosterbot.sqlite";

/// Everything [`RosterBot`](crate::bot::RosterBot) needs to start.
#[derive(Clone)]
pub struct RosterConfig {
    /// Directory for application data
    pub data_dir: PathBuf,

    /// Directory for application logs
    pub logs_dir: PathBuf,

    /// SQLite database file, `<data_dir>/rosterbot.sqlite` unless overridden
    pub database_path: PathBuf,

    pub bot_token: String,

    /// Bot API base URL, without the `/bot<token>` part
    pub api_base_url: String,

    /// Name of the create command, without the leading slash
    pub create_command: String,

    /// Server-side wait of each `getUpdates` long poll
    pub poll_timeout_secs: u64,

    /// Bound of the queue between the poller and the dispatcher
    pub action_queue_capacity: usize,

    /// Backoff for writes that hit a locked database
    pub store_retry: RetryInfo,
}

impl std::fmt::Debug for RosterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RosterConfig")
            .field("data_dir", &self.data_dir)
            .field("logs_dir", &self.logs_dir)
            .field("database_path", &self.database_path)
            .field("bot_token", &"<REDACTED>")
            .field("api_base_url", &self.api_base_url)
            .field("create_command", &self.create_command)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .field("action_queue_capacity", &self.action_queue_capacity)
            .field("store_retry", &self.store_retry)
            .finish()
    }
}

impl RosterConfig {
    /// Builds a configuration with defaults for everything but the directories
    /// and the token. Debug and release builds get separate subdirectories.
    pub fn new(data_dir: &Path, logs_dir: &Path, bot_token: &str) -> Self {
        let env_suffix = if cfg!(debug_assertions) {
            "dev"
        } else {
            "release"
        };
        let formatted_data_dir = data_dir.join(env_suffix);
        let formatted_logs_dir = logs_dir.join(env_suffix);

        Self {
            database_path: formatted_data_dir.join(DATABASE_FILE_NAME),
            data_dir: formatted_data_dir,
            logs_dir: formatted_logs_dir,
            bot_token: bot_token.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            create_command: DEFAULT_CREATE_COMMAND.to_string(),
            poll_timeout_secs: DEFAULT_POLL_TIMEOUT_SECS,
            action_queue_capacity: DEFAULT_ACTION_QUEUE_CAPACITY,
            store_retry: RetryInfo::default(),
        }
    }

    pub fn with_database_path(mut self, database_path: PathBuf) -> Self {
        self.database_path = database_path;
        self
    }

    pub fn with_api_base_url(mut self, api_base_url: &str) -> Self {
        self.api_base_url = api_base_url.to_string();
        self
    }

    pub fn with_create_command(mut self, create_command: &str) -> Self {
        self.create_command = create_command.trim_start_matches('/').to_string();
        self
    }

    pub fn with_poll_timeout_secs(mut self, poll_timeout_secs: u64) -> Self {
        self.poll_timeout_secs = poll_timeout_secs;
        self
    }

    pub fn with_action_queue_capacity(mut self, action_queue_capacity: usize) -> Self {
        self.action_queue_capacity = action_queue_capacity;
        self
    }

    pub fn with_store_retry(mut self, store_retry: RetryInfo) -> Self {
        self.store_retry = store_retry;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.bot_token.trim().is_empty() {
            return Err(RosterError::Configuration(
                "bot token must not be empty".to_string(),
            ));
        }
        if self.create_command.is_empty()
            || !self
                .create_command
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(RosterError::Configuration(format!(
                "invalid create command {:?}: use letters, digits and underscores",
                self.create_command
            )));
        }
        if self.action_queue_capacity == 0 {
            return Err(RosterError::Configuration(
                "action queue capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
