use std::{
    future::Future,
    path::PathBuf,
    sync::LazyLock,
    time::{Duration, SystemTime},
};

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use sqlx::{
    Sqlite, SqlitePool,
    migrate::{MigrateDatabase, Migrator},
    sqlite::SqlitePoolOptions,
};
use thiserror::Error;

use crate::roster::attendees::{AddOutcome, Attendee, RemoveOutcome};
use crate::roster::events::Event;
use crate::roster::store::{EventStore, StoreError};
use crate::types::{ChatRef, EventId, MessageRef, RetryInfo, UserProfile, UserRef};

pub mod attendees;
pub mod events;
pub mod utils;

pub static MIGRATOR: LazyLock<Migrator> = LazyLock::new(|| sqlx::migrate!("./db_migrations"));

const DB_ACQUIRE_TIMEOUT_SECS: u64 = 5;
const DB_MAX_CONNECTIONS: u32 = 10;
const DB_BUSY_TIMEOUT_MS: u32 = 5000;

/// SQLite primary result codes that signal lock contention rather than a real failure.
const SQLITE_BUSY: &str = "5";
const SQLITE_LOCKED: &str = "6";
/// Extended result code for `SQLITE_BUSY_SNAPSHOT`, raised by WAL readers upgrading to writers.
const SQLITE_BUSY_SNAPSHOT: &str = "517";

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),
    #[error("Invalid timestamp: {timestamp} cannot be converted to DateTime")]
    InvalidTimestamp { timestamp: i64 },
}

impl DatabaseError {
    /// Whether retrying the same statement may succeed.
    pub(crate) fn is_transient(&self) -> bool {
        match self {
            DatabaseError::Sqlx(sqlx::Error::Database(db_err)) => matches!(
                db_err.code().as_deref(),
                Some(SQLITE_BUSY) | Some(SQLITE_LOCKED) | Some(SQLITE_BUSY_SNAPSHOT)
            ),
            DatabaseError::Sqlx(sqlx::Error::PoolTimedOut) => true,
            _ => false,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Database {
    pub pool: SqlitePool,
    pub path: PathBuf,
    pub last_connected: SystemTime,
    /// Backoff applied to writes that hit lock contention.
    pub retry: RetryInfo,
}

impl Database {
    pub async fn new(db_path: PathBuf) -> Result<Self, DatabaseError> {
        Self::with_retry(db_path, RetryInfo::default()).await
    }

    pub async fn with_retry(db_path: PathBuf, retry: RetryInfo) -> Result<Self, DatabaseError> {
        // Create parent directories if they don't exist
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db_url = format!("sqlite://{}", db_path.display());

        // Create database if it doesn't exist
        tracing::debug!(target: "rosterbot::database::new", "Checking if DB exists...{:?}", db_url);
        match Sqlite::database_exists(&db_url).await {
            Ok(true) => {
                tracing::debug!(target: "rosterbot::database::new", "DB exists");
            }
            Ok(false) => {
                tracing::debug!(target: "rosterbot::database::new", "DB does not exist, creating...");
                Sqlite::create_database(&db_url).await.map_err(|e| {
                    tracing::error!(target: "rosterbot::database::new", "Error creating DB: {:?}", e);
                    DatabaseError::Sqlx(e)
                })?;
            }
            Err(e) => {
                tracing::warn!(
                    target: "rosterbot::database::new",
                    "Could not check if database exists: {:?}, attempting to create",
                    e
                );
                Sqlite::create_database(&db_url).await.map_err(|e| {
                    tracing::error!(target: "rosterbot::database::new", "Error creating DB: {:?}", e);
                    DatabaseError::Sqlx(e)
                })?;
            }
        }

        let pool = Self::create_connection_pool(&db_url).await?;

        MIGRATOR.run(&pool).await?;

        Ok(Self {
            pool,
            path: db_path,
            last_connected: SystemTime::now(),
            retry,
        })
    }

    /// Creates and configures a SQLite connection pool
    async fn create_connection_pool(db_url: &str) -> Result<SqlitePool, DatabaseError> {
        tracing::debug!(target: "rosterbot::database::new", "Creating connection pool...");
        let pool = SqlitePoolOptions::new()
            .acquire_timeout(Duration::from_secs(DB_ACQUIRE_TIMEOUT_SECS))
            .max_connections(DB_MAX_CONNECTIONS)
            .after_connect(|conn, _| {
                Box::pin(async move {
                    let conn = &mut *conn;
                    sqlx::query("PRAGMA journal_mode=WAL")
                        .execute(&mut *conn)
                        .await?;
                    sqlx::query(&format!("PRAGMA busy_timeout={DB_BUSY_TIMEOUT_MS}"))
                        .execute(&mut *conn)
                        .await?;
                    // Attendee rows cascade with their event
                    sqlx::query("PRAGMA foreign_keys = ON")
                        .execute(&mut *conn)
                        .await?;
                    Ok(())
                })
            })
            .connect(&format!("{db_url}?mode=rwc"))
            .await?;
        Ok(pool)
    }

    /// Runs all pending database migrations
    ///
    /// This method is idempotent - it's safe to call multiple times.
    pub async fn migrate_up(&self) -> Result<(), DatabaseError> {
        MIGRATOR.run(&self.pool).await?;
        Ok(())
    }

    /// Runs `op`, retrying it with exponential backoff while it fails with
    /// lock contention. Any other error is returned immediately.
    pub(crate) async fn with_busy_retry<T, F, Fut>(
        &self,
        operation: &'static str,
        mut op: F,
    ) -> Result<T, DatabaseError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DatabaseError>>,
    {
        let mut retry = RetryInfo::with_limits(self.retry.max_attempts, self.retry.base_delay_ms);
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && retry.should_retry() => {
                    let delay_ms = retry.delay_ms();
                    tracing::warn!(
                        target: "rosterbot::database::with_busy_retry",
                        "{} hit lock contention (attempt {}/{}), retrying in {}ms: {}",
                        operation,
                        retry.attempt + 1,
                        retry.max_attempts,
                        delay_ms,
                        e
                    );
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    retry = match retry.next_attempt() {
                        Some(next) => next,
                        None => return Err(e),
                    };
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl EventStore for Database {
    async fn create_event(
        &self,
        chat: ChatRef,
        description: &str,
        creator: UserRef,
        now: DateTime<FixedOffset>,
    ) -> Result<EventId, StoreError> {
        let id = self
            .with_busy_retry("create_event", move || {
                self.insert_event(chat, description, creator, now)
            })
            .await?;
        Ok(id)
    }

    async fn set_message_ref(
        &self,
        event_id: EventId,
        message: MessageRef,
    ) -> Result<(), StoreError> {
        let updated = self
            .with_busy_retry("set_message_ref", move || {
                self.update_event_message(event_id, message)
            })
            .await?;
        if updated {
            Ok(())
        } else {
            Err(StoreError::EventNotFound(event_id))
        }
    }

    async fn get_event(&self, event_id: EventId) -> Result<Option<Event>, StoreError> {
        Ok(self.find_event(event_id).await?)
    }

    async fn list_attendees(&self, event_id: EventId) -> Result<Vec<Attendee>, StoreError> {
        Ok(self.find_attendees(event_id).await?)
    }

    async fn add_attendee(
        &self,
        event_id: EventId,
        profile: &UserProfile,
        now: DateTime<Utc>,
    ) -> Result<AddOutcome, StoreError> {
        self.with_busy_retry("add_attendee", move || {
            self.insert_attendee(event_id, profile, now)
        })
        .await?
        .ok_or(StoreError::EventNotFound(event_id))
    }

    async fn remove_attendee(
        &self,
        event_id: EventId,
        user: UserRef,
    ) -> Result<RemoveOutcome, StoreError> {
        let outcome = self
            .with_busy_retry("remove_attendee", move || {
                self.delete_attendee(event_id, user)
            })
            .await?;
        Ok(outcome)
    }

    async fn delete_event(&self, event_id: EventId) -> Result<bool, StoreError> {
        let deleted = self
            .with_busy_retry("delete_event", move || self.delete_event_row(event_id))
            .await?;
        Ok(deleted)
    }
}
