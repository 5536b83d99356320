use tokio::sync::mpsc::{Receiver, Sender};

use crate::transport::Transport;
use crate::transport::telegram::{ParsedUpdate, TelegramClient, UpdateParser};
use crate::types::{Action, CallbackRef, RetryInfo};

/// Upper bound on retries before the backoff delay stops growing.
const POLL_BACKOFF_MAX_STEPS: u32 = 6;
const POLL_BACKOFF_BASE_MS: u64 = 500;

/// Long-polls `getUpdates` and feeds parsed actions into the dispatcher queue.
#[derive(Debug)]
pub struct TelegramPoller {
    client: TelegramClient,
    parser: UpdateParser,
    timeout_secs: u64,
    /// First update id not yet handed off.
    offset: i64,
    /// Offset of the last successful `getUpdates`; the Bot API has
    /// discarded every update below it.
    confirmed: i64,
}

impl TelegramPoller {
    pub fn new(client: TelegramClient, parser: UpdateParser, timeout_secs: u64) -> Self {
        Self {
            client,
            parser,
            timeout_secs,
            offset: 0,
            confirmed: 0,
        }
    }

    /// Polls until `shutdown` fires or the action queue is closed.
    ///
    /// Poll failures are logged and retried with exponential backoff; the
    /// backoff resets after the next successful poll. Before returning, the
    /// offset of every handed-off update is confirmed so a restart does not
    /// replay it.
    pub async fn run(mut self, sender: Sender<Action>, mut shutdown: Receiver<()>) {
        tracing::debug!(
            target: "rosterbot::telegram::poller",
            "Starting update polling loop"
        );

        let mut backoff = RetryInfo::with_limits(POLL_BACKOFF_MAX_STEPS, POLL_BACKOFF_BASE_MS);

        'polling: loop {
            let requested = self.offset;
            let polled = tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!(
                        target: "rosterbot::telegram::poller",
                        "Received shutdown signal, stopping update polling"
                    );
                    break;
                }
                polled = self.client.get_updates(requested, self.timeout_secs) => polled,
            };

            match polled {
                Ok(updates) => {
                    self.confirmed = requested;
                    backoff = RetryInfo::with_limits(POLL_BACKOFF_MAX_STEPS, POLL_BACKOFF_BASE_MS);
                    for update in updates {
                        match self.parser.parse(&update) {
                            Some(ParsedUpdate::Action(action)) => {
                                if sender.send(action).await.is_err() {
                                    tracing::debug!(
                                        target: "rosterbot::telegram::poller",
                                        "Action queue closed, stopping update polling"
                                    );
                                    break 'polling;
                                }
                            }
                            Some(ParsedUpdate::Dismiss(callback)) => self.dismiss(&callback).await,
                            None => {}
                        }
                        self.offset = self.offset.max(update.update_id + 1);
                    }
                }
                Err(e) => {
                    let delay_ms = backoff.delay_ms();
                    tracing::warn!(
                        target: "rosterbot::telegram::poller",
                        "Polling for updates failed (attempt {}), retrying in {}ms: {}",
                        backoff.attempt + 1,
                        delay_ms,
                        e
                    );
                    if let Some(next) = backoff.next_attempt() {
                        backoff = next;
                    }

                    tokio::select! {
                        _ = shutdown.recv() => break,
                        _ = tokio::time::sleep(tokio::time::Duration::from_millis(delay_ms)) => {}
                    }
                }
            }
        }

        self.confirm_offset().await;
    }

    async fn dismiss(&self, callback: &CallbackRef) {
        if let Err(e) = self.client.acknowledge(callback, None).await {
            tracing::warn!(
                target: "rosterbot::telegram::poller",
                "Failed to dismiss button press {}: {}",
                callback.0,
                e
            );
        }
    }

    /// Tells the Bot API that everything below `offset` was consumed.
    async fn confirm_offset(&mut self) {
        if self.offset <= self.confirmed {
            return;
        }
        match self.client.get_updates(self.offset, 0).await {
            Ok(_) => {
                tracing::debug!(
                    target: "rosterbot::telegram::poller",
                    "Confirmed updates up to offset {}",
                    self.offset
                );
                self.confirmed = self.offset;
            }
            Err(e) => tracing::warn!(
                target: "rosterbot::telegram::poller",
                "Failed to confirm update offset {}, those updates may be redelivered: {}",
                self.offset,
                e
            ),
        }
    }
}
