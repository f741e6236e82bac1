//! Post ledger operations.
//!
//! The ledger records every photo post seen per channel. Inserts are
//! upsert-or-ignore at (channel_id, message_id) granularity, so re-delivered
//! webhook updates never create duplicate rows.

use crate::models::Post;
use chrono::NaiveDate;
use sqlx::PgPool;

/// Record a photo post, ignoring re-observations of the same message.
///
/// Returns true when a new row was inserted, false for a duplicate.
pub async fn record(
    pool: &PgPool,
    channel_id: i64,
    message_id: i64,
    post_date: NaiveDate,
    photo_file_id: Option<&str>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO posts (channel_id, message_id, post_date, photo_file_id)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (channel_id, message_id) DO NOTHING
        "#,
    )
    .bind(channel_id)
    .bind(message_id)
    .bind(post_date)
    .bind(photo_file_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Number of distinct posts recorded for a channel on a civil date.
/// This is the admission signal for poll eligibility.
pub async fn count_on_date(
    pool: &PgPool,
    channel_id: i64,
    date: NaiveDate,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM posts
        WHERE channel_id = $1 AND post_date = $2
        "#,
    )
    .bind(channel_id)
    .bind(date)
    .fetch_one(pool)
    .await
}

/// Pick one of the day's posts uniformly at random, so the poll does not
/// always reference the first post of the day.
pub async fn pick_random_on_date(
    pool: &PgPool,
    channel_id: i64,
    date: NaiveDate,
) -> Result<Option<Post>, sqlx::Error> {
    sqlx::query_as::<_, Post>(
        r#"
        SELECT id, channel_id, message_id, post_date, photo_file_id, created_at
        FROM posts
        WHERE channel_id = $1 AND post_date = $2
        ORDER BY RANDOM()
        LIMIT 1
        "#,
    )
    .bind(channel_id)
    .bind(date)
    .fetch_optional(pool)
    .await
}

/// Most recent post_date previously recorded for a channel. Drives the
/// first-insert-of-a-new-day retention trigger.
pub async fn latest_post_date(
    pool: &PgPool,
    channel_id: i64,
) -> Result<Option<NaiveDate>, sqlx::Error> {
    sqlx::query_scalar::<_, Option<NaiveDate>>(
        r#"
        SELECT MAX(post_date) FROM posts
        WHERE channel_id = $1
        "#,
    )
    .bind(channel_id)
    .fetch_one(pool)
    .await
}

/// Delete ledger rows older than the cutoff date. Returns rows deleted.
pub async fn delete_older_than(
    pool: &PgPool,
    channel_id: i64,
    cutoff: NaiveDate,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        DELETE FROM posts
        WHERE channel_id = $1 AND post_date < $2
        "#,
    )
    .bind(channel_id)
    .bind(cutoff)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
