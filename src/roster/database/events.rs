use chrono::{DateTime, FixedOffset};

use super::{Database, DatabaseError, utils::parse_offset_timestamp};
use crate::roster::events::Event;
use crate::types::{ChatRef, EventId, MessageRef, UserRef};

/// Row structure for the events table
#[derive(Debug)]
pub(crate) struct EventRow {
    pub id: i64,
    pub chat_id: i64,
    pub message_id: Option<i64>,
    pub description: String,
    pub creator_id: i64,
    pub created_at: DateTime<FixedOffset>,
}

impl<'r, R> sqlx::FromRow<'r, R> for EventRow
where
    R: sqlx::Row,
    &'r str: sqlx::ColumnIndex<R>,
    i64: sqlx::Decode<'r, R::Database> + sqlx::Type<R::Database>,
    Option<i64>: sqlx::Decode<'r, R::Database> + sqlx::Type<R::Database>,
    String: sqlx::Decode<'r, R::Database> + sqlx::Type<R::Database>,
{
    fn from_row(row: &'r R) -> std::result::Result<Self, sqlx::Error> {
        Ok(EventRow {
            id: row.try_get("id")?,
            chat_id: row.try_get("chat_id")?,
            message_id: row.try_get("message_id")?,
            description: row.try_get("description")?,
            creator_id: row.try_get("creator_id")?,
            created_at: parse_offset_timestamp(row, "created_at")?,
        })
    }
}

impl From<EventRow> for Event {
    fn from(row: EventRow) -> Self {
        Event {
            id: EventId(row.id),
            chat: ChatRef(row.chat_id),
            message: row.message_id.map(MessageRef),
            description: row.description,
            creator: UserRef(row.creator_id),
            created_at: row.created_at,
        }
    }
}

impl Database {
    pub(crate) async fn insert_event(
        &self,
        chat: ChatRef,
        description: &str,
        creator: UserRef,
        created_at: DateTime<FixedOffset>,
    ) -> Result<EventId, DatabaseError> {
        let mut txn = self.pool.begin().await?;

        let (id,): (i64,) = sqlx::query_as(
            "INSERT INTO events (chat_id, message_id, description, creator_id, created_at)
             VALUES (?, NULL, ?, ?, ?)
             RETURNING id",
        )
        .bind(chat.0)
        .bind(description)
        .bind(creator.0)
        .bind(created_at.to_rfc3339())
        .fetch_one(&mut *txn)
        .await?;

        txn.commit().await?;

        tracing::debug!(
            target: "rosterbot::database::insert_event",
            "Inserted event {} for chat {}",
            id,
            chat.0
        );
        Ok(EventId(id))
    }

    /// Returns whether a row was matched.
    pub(crate) async fn update_event_message(
        &self,
        event_id: EventId,
        message: MessageRef,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query("UPDATE events SET message_id = ? WHERE id = ?")
            .bind(message.0)
            .bind(event_id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub(crate) async fn find_event(&self, event_id: EventId) -> Result<Option<Event>, DatabaseError> {
        let row = sqlx::query_as::<_, EventRow>(
            "SELECT id, chat_id, message_id, description, creator_id, created_at
             FROM events WHERE id = ?",
        )
        .bind(event_id.0)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Event::from))
    }

    /// Deletes an event; its attendees go with it through the foreign key cascade.
    pub(crate) async fn delete_event_row(&self, event_id: EventId) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM events WHERE id = ?")
            .bind(event_id.0)
            .execute(&self.pool)
            .await?;

        tracing::debug!(
            target: "rosterbot::database::delete_event",
            "Deleted event {} ({} rows)",
            event_id,
            result.rows_affected()
        );
        Ok(result.rows_affected() > 0)
    }
}
