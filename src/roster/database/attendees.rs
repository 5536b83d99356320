use chrono::{DateTime, Utc};

use super::{Database, DatabaseError, utils::parse_timestamp};
use crate::roster::attendees::{AddOutcome, Attendee, RemoveOutcome};
use crate::types::{EventId, UserProfile, UserRef};

/// SQLite extended result code for a failed FOREIGN KEY constraint.
const SQLITE_CONSTRAINT_FOREIGNKEY: &str = "787";

/// Row structure for the attendees table
#[derive(Debug)]
pub(crate) struct AttendeeRow {
    pub event_id: i64,
    pub user_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub joined_at: DateTime<Utc>,
}

impl<'r, R> sqlx::FromRow<'r, R> for AttendeeRow
where
    R: sqlx::Row,
    &'r str: sqlx::ColumnIndex<R>,
    i64: sqlx::Decode<'r, R::Database> + sqlx::Type<R::Database>,
    String: sqlx::Decode<'r, R::Database> + sqlx::Type<R::Database>,
    Option<String>: sqlx::Decode<'r, R::Database> + sqlx::Type<R::Database>,
{
    fn from_row(row: &'r R) -> std::result::Result<Self, sqlx::Error> {
        Ok(AttendeeRow {
            event_id: row.try_get("event_id")?,
            user_id: row.try_get("user_id")?,
            username: row.try_get("username")?,
            first_name: row.try_get("first_name")?,
            joined_at: parse_timestamp(row, "joined_at")?,
        })
    }
}

impl From<AttendeeRow> for Attendee {
    fn from(row: AttendeeRow) -> Self {
        Attendee {
            event_id: EventId(row.event_id),
            user: UserRef(row.user_id),
            username: row.username,
            first_name: row.first_name,
            joined_at: row.joined_at,
        }
    }
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.code().as_deref() == Some(SQLITE_CONSTRAINT_FOREIGNKEY)
        }
        _ => false,
    }
}

impl Database {
    /// Roster of an event ordered by join time, then by insertion sequence.
    pub(crate) async fn find_attendees(
        &self,
        event_id: EventId,
    ) -> Result<Vec<Attendee>, DatabaseError> {
        let rows = sqlx::query_as::<_, AttendeeRow>(
            "SELECT event_id, user_id, username, first_name, joined_at
             FROM attendees
             WHERE event_id = ?
             ORDER BY joined_at ASC, seq ASC",
        )
        .bind(event_id.0)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Attendee::from).collect())
    }

    /// Inserts an attendee unless the pair is already present.
    ///
    /// The `UNIQUE(event_id, user_id)` constraint arbitrates concurrent inserts:
    /// exactly one of them writes a row, the others see zero affected rows.
    /// Returns `None` when the event does not exist.
    pub(crate) async fn insert_attendee(
        &self,
        event_id: EventId,
        profile: &UserProfile,
        joined_at: DateTime<Utc>,
    ) -> Result<Option<AddOutcome>, DatabaseError> {
        let mut txn = self.pool.begin().await?;

        let result = sqlx::query(
            "INSERT INTO attendees (event_id, user_id, username, first_name, joined_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(event_id, user_id) DO NOTHING",
        )
        .bind(event_id.0)
        .bind(profile.user.0)
        .bind(profile.username.as_deref())
        .bind(profile.first_name.as_deref())
        .bind(joined_at.timestamp_millis())
        .execute(&mut *txn)
        .await;

        let outcome = match result {
            Ok(done) if done.rows_affected() > 0 => AddOutcome::Added,
            Ok(_) => AddOutcome::AlreadyPresent,
            Err(e) if is_foreign_key_violation(&e) => {
                tracing::debug!(
                    target: "rosterbot::database::add_attendee",
                    "Event {} vanished before user {} could join",
                    event_id,
                    profile.user.0
                );
                txn.rollback().await?;
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        txn.commit().await?;
        Ok(Some(outcome))
    }

    pub(crate) async fn delete_attendee(
        &self,
        event_id: EventId,
        user: UserRef,
    ) -> Result<RemoveOutcome, DatabaseError> {
        let result = sqlx::query("DELETE FROM attendees WHERE event_id = ? AND user_id = ?")
            .bind(event_id.0)
            .bind(user.0)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() > 0 {
            Ok(RemoveOutcome::Removed)
        } else {
            Ok(RemoveOutcome::WasNotPresent)
        }
    }
}
