use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use sqlx::Row;

/// Parses a timestamp column with flexible type handling for SQLite type affinity.
///
/// INTEGER values are read as milliseconds since the Unix epoch; TEXT values as
/// RFC 3339 or the `YYYY-MM-DD HH:MM[:SS]` forms SQLite itself produces (taken as UTC).
pub(crate) fn parse_timestamp<'r, R>(
    row: &'r R,
    column_name: &'r str,
) -> Result<DateTime<Utc>, sqlx::Error>
where
    R: Row,
    &'r str: sqlx::ColumnIndex<R>,
    i64: sqlx::Decode<'r, R::Database> + sqlx::Type<R::Database>,
    String: sqlx::Decode<'r, R::Database> + sqlx::Type<R::Database>,
{
    if let Ok(timestamp_ms) = row.try_get::<i64, _>(column_name) {
        return DateTime::from_timestamp_millis(timestamp_ms)
            .ok_or_else(|| create_column_decode_error(column_name, "Invalid timestamp value"));
    }

    if let Ok(datetime_str) = row.try_get::<String, _>(column_name) {
        return parse_datetime_string(&datetime_str, column_name)
            .map(|dt| dt.with_timezone(&Utc));
    }

    Err(create_column_decode_error(
        column_name,
        "Could not parse as INTEGER or DATETIME",
    ))
}

/// Parses a TEXT timestamp column while keeping the UTC offset it was written with.
pub(crate) fn parse_offset_timestamp<'r, R>(
    row: &'r R,
    column_name: &'r str,
) -> Result<DateTime<FixedOffset>, sqlx::Error>
where
    R: Row,
    &'r str: sqlx::ColumnIndex<R>,
    String: sqlx::Decode<'r, R::Database> + sqlx::Type<R::Database>,
{
    let datetime_str: String = row.try_get(column_name)?;
    parse_datetime_string(&datetime_str, column_name)
}

fn parse_datetime_string(
    datetime_str: &str,
    column_name: &str,
) -> Result<DateTime<FixedOffset>, sqlx::Error> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(datetime_str) {
        return Ok(dt);
    }

    let formats = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"];
    for format in &formats {
        if let Ok(naive_dt) = NaiveDateTime::parse_from_str(datetime_str, format) {
            return Ok(naive_dt.and_utc().fixed_offset());
        }
    }

    Err(create_column_decode_error(
        column_name,
        &format!("Could not parse datetime string: '{datetime_str}'"),
    ))
}

/// Helper function to create consistent ColumnDecode errors.
pub(crate) fn create_column_decode_error(column_name: &str, message: &str) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: column_name.to_string(),
        source: Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            message.to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};

    async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        sqlx::query(
            "CREATE TABLE test_timestamps (
                id INTEGER PRIMARY KEY,
                int_timestamp INTEGER,
                text_timestamp TEXT
            )",
        )
        .execute(&pool)
        .await
        .unwrap();

        pool
    }

    async fn fetch_row(pool: &SqlitePool) -> SqliteRow {
        sqlx::query("SELECT * FROM test_timestamps WHERE id = 1")
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_parse_timestamp_integer_millis() {
        let pool = setup_test_db().await;
        let now = Utc::now().timestamp_millis();

        sqlx::query("INSERT INTO test_timestamps (id, int_timestamp) VALUES (1, ?)")
            .bind(now)
            .execute(&pool)
            .await
            .unwrap();

        let row = fetch_row(&pool).await;
        let parsed = parse_timestamp(&row, "int_timestamp").unwrap();
        assert_eq!(parsed.timestamp_millis(), now);
    }

    #[tokio::test]
    async fn test_parse_offset_timestamp_keeps_offset() {
        let pool = setup_test_db().await;

        sqlx::query("INSERT INTO test_timestamps (id, text_timestamp) VALUES (1, ?)")
            .bind("2026-10-17T16:00:00+02:00")
            .execute(&pool)
            .await
            .unwrap();

        let row = fetch_row(&pool).await;
        let parsed = parse_offset_timestamp(&row, "text_timestamp").unwrap();
        assert_eq!(parsed.offset().local_minus_utc(), 2 * 3600);
        assert_eq!(parsed.hour(), 16);

        let as_utc = parse_timestamp(&row, "text_timestamp").unwrap();
        assert_eq!(as_utc.hour(), 14);
    }

    #[tokio::test]
    async fn test_parse_offset_timestamp_sqlite_format() {
        let pool = setup_test_db().await;

        sqlx::query("INSERT INTO test_timestamps (id, text_timestamp) VALUES (1, ?)")
            .bind("2025-08-16 11:34")
            .execute(&pool)
            .await
            .unwrap();

        let row = fetch_row(&pool).await;
        let parsed = parse_offset_timestamp(&row, "text_timestamp").unwrap();
        assert_eq!(parsed.year(), 2025);
        assert_eq!(parsed.minute(), 34);
        assert_eq!(parsed.offset().local_minus_utc(), 0);
    }

    #[tokio::test]
    async fn test_parse_timestamp_rejects_garbage() {
        let pool = setup_test_db().await;

        sqlx::query("INSERT INTO test_timestamps (id, text_timestamp) VALUES (1, 'not a date')")
            .execute(&pool)
            .await
            .unwrap();

        let row = fetch_row(&pool).await;
        let result = parse_offset_timestamp(&row, "text_timestamp");
        assert!(matches!(result, Err(sqlx::Error::ColumnDecode { .. })));
    }
}
