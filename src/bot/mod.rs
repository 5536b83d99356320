//! Wires configuration, logging, storage, the dispatcher and the Telegram
//! transport into a running bot.

use std::future::Future;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;

use crate::dispatcher::Dispatcher;
use crate::init_tracing;
use crate::roster::Roster;
use crate::roster::database::Database;
use crate::roster::error::{Result, RosterError};
use crate::transport::telegram::{TelegramClient, TelegramPoller, UpdateParser};

pub mod config;

pub use config::RosterConfig;

pub struct RosterBot {
    config: RosterConfig,
    roster: Roster,
    client: TelegramClient,
    dispatcher: Arc<Dispatcher>,
}

impl std::fmt::Debug for RosterBot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RosterBot")
            .field("config", &self.config)
            .field("roster", &"<REDACTED>")
            .field("client", &self.client)
            .field("dispatcher", &"<REDACTED>")
            .finish()
    }
}

impl RosterBot {
    /// Initializes the bot with the provided configuration.
    ///
    /// This method validates the configuration, sets up the data and log
    /// directories, configures logging, opens and migrates the database and
    /// builds the Telegram client. Nothing is polled until [`RosterBot::run`].
    ///
    /// # Errors
    ///
    /// This function will return an error if:
    /// - The configuration is invalid.
    /// - The data or log directories cannot be created.
    /// - The database cannot be opened or migrated.
    /// - The HTTP client cannot be built.
    pub async fn initialize(config: RosterConfig) -> Result<Self> {
        config.validate()?;

        let data_dir = &config.data_dir;
        let logs_dir = &config.logs_dir;

        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory: {:?}", data_dir))
            .map_err(RosterError::from)?;
        std::fs::create_dir_all(logs_dir)
            .with_context(|| format!("Failed to create logs directory: {:?}", logs_dir))
            .map_err(RosterError::from)?;

        init_tracing(logs_dir)?;

        tracing::debug!(
            target: "rosterbot::bot::initialize",
            "Logging initialized in directory: {:?}",
            logs_dir
        );

        let database =
            Database::with_retry(config.database_path.clone(), config.store_retry.clone()).await?;
        let roster = Roster::new(Arc::new(database));

        let client = TelegramClient::new(&config.api_base_url, &config.bot_token)?;
        let dispatcher = Arc::new(Dispatcher::new(
            roster.clone(),
            Arc::new(client.clone()),
            &config.create_command,
        ));

        tracing::info!(
            target: "rosterbot::bot::initialize",
            "Bot initialized with database {:?}",
            config.database_path
        );

        Ok(Self {
            config,
            roster,
            client,
            dispatcher,
        })
    }

    pub fn config(&self) -> &RosterConfig {
        &self.config
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Polls for updates and dispatches them until `shutdown` completes.
    ///
    /// Shutdown stops polling first, then lets the dispatcher finish every
    /// queued and in-flight action.
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let bot_username = match self.client.get_me().await {
            Ok(me) => me.username,
            Err(e) => {
                tracing::warn!(
                    target: "rosterbot::bot::run",
                    "Could not look up the bot account, accepting commands addressed to any bot: {}",
                    e
                );
                None
            }
        };
        if let Some(username) = &bot_username {
            tracing::info!(target: "rosterbot::bot::run", "Running as @{}", username);
        }

        let (action_sender, action_receiver) = mpsc::channel(self.config.action_queue_capacity);
        let (poller_shutdown_sender, poller_shutdown_receiver) = mpsc::channel(1);
        let (dispatcher_shutdown_sender, dispatcher_shutdown_receiver) = mpsc::channel(1);

        let poller = TelegramPoller::new(
            self.client.clone(),
            UpdateParser::new(&self.config.create_command, bot_username),
            self.config.poll_timeout_secs,
        );
        let poller_handle = tokio::spawn(poller.run(action_sender, poller_shutdown_receiver));
        let dispatcher_handle = tokio::spawn(
            self.dispatcher
                .clone()
                .run(action_receiver, dispatcher_shutdown_receiver),
        );

        shutdown.await;
        tracing::info!(target: "rosterbot::bot::run", "Shutting down");

        // Either loop may already be gone; a failed send just means that
        let _ = poller_shutdown_sender.send(()).await;
        poller_handle
            .await
            .context("Update poller task failed")
            .map_err(RosterError::from)?;

        let _ = dispatcher_shutdown_sender.send(()).await;
        dispatcher_handle
            .await
            .context("Dispatcher task failed")
            .map_err(RosterError::from)?;

        tracing::info!(target: "rosterbot::bot::run", "Shutdown complete");
        Ok(())
    }
}
