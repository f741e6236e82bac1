//! Poll state store operations.
//!
//! One row per (channel_id, poll_date) drives the daily poll state machine:
//! pending -> posted | skipped, with a pending -> pending self-loop on error.
//! Every transition here is a single guarded statement; two racing callers
//! cannot both finalize the same day, whichever process they run in.

use crate::models::DailyPoll;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::types::Json;
use sqlx::PgPool;

const POLL_COLUMNS: &str = "channel_id, poll_date, scheduled_at, posted_at, skipped_at, \
     poll_message_id, chosen_post_message_id, question, options, \
     skip_reason, last_error, last_error_at";

/// Fetch the day's record, creating a pending one if none exists.
///
/// First-writer-wins: concurrent callers for the same key all observe the
/// single row that won the insert, and `scheduled_at` keeps the winner's
/// stamp.
pub async fn get_or_create_pending(
    pool: &PgPool,
    channel_id: i64,
    poll_date: NaiveDate,
    scheduled_at: DateTime<Utc>,
) -> Result<DailyPoll, sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO daily_polls (channel_id, poll_date, scheduled_at)
        VALUES ($1, $2, $3)
        ON CONFLICT (channel_id, poll_date) DO NOTHING
        "#,
    )
    .bind(channel_id)
    .bind(poll_date)
    .bind(scheduled_at)
    .execute(pool)
    .await?;

    sqlx::query_as::<_, DailyPoll>(&format!(
        "SELECT {POLL_COLUMNS} FROM daily_polls WHERE channel_id = $1 AND poll_date = $2"
    ))
    .bind(channel_id)
    .bind(poll_date)
    .fetch_one(pool)
    .await
}

pub async fn get_by_date(
    pool: &PgPool,
    channel_id: i64,
    poll_date: NaiveDate,
) -> Result<Option<DailyPoll>, sqlx::Error> {
    sqlx::query_as::<_, DailyPoll>(&format!(
        "SELECT {POLL_COLUMNS} FROM daily_polls WHERE channel_id = $1 AND poll_date = $2"
    ))
    .bind(channel_id)
    .bind(poll_date)
    .fetch_optional(pool)
    .await
}

/// Transition pending -> posted.
///
/// Returns false without touching the row when it is already finalized,
/// which is the double-posting guard for retried ticks and the manual
/// trigger racing the scheduler.
pub async fn mark_posted(
    pool: &PgPool,
    channel_id: i64,
    poll_date: NaiveDate,
    poll_message_id: i64,
    chosen_post_message_id: Option<i64>,
    question: &str,
    options: &[String],
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE daily_polls
        SET posted_at = NOW(),
            poll_message_id = $3,
            chosen_post_message_id = $4,
            question = $5,
            options = $6
        WHERE channel_id = $1 AND poll_date = $2
          AND posted_at IS NULL AND skipped_at IS NULL
        "#,
    )
    .bind(channel_id)
    .bind(poll_date)
    .bind(poll_message_id)
    .bind(chosen_post_message_id)
    .bind(question)
    .bind(Json(options))
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Transition pending -> skipped. Same already-finalized guard as
/// [`mark_posted`].
pub async fn mark_skipped(
    pool: &PgPool,
    channel_id: i64,
    poll_date: NaiveDate,
    reason: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE daily_polls
        SET skipped_at = NOW(),
            skip_reason = $3
        WHERE channel_id = $1 AND poll_date = $2
          AND posted_at IS NULL AND skipped_at IS NULL
        "#,
    )
    .bind(channel_id)
    .bind(poll_date)
    .bind(reason)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Record a transient failure without closing the state machine. The same
/// day may still be posted or skipped by a later tick; a finalized row is
/// left untouched.
pub async fn record_error(
    pool: &PgPool,
    channel_id: i64,
    poll_date: NaiveDate,
    error_text: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE daily_polls
        SET last_error = $3,
            last_error_at = NOW()
        WHERE channel_id = $1 AND poll_date = $2
          AND posted_at IS NULL AND skipped_at IS NULL
        "#,
    )
    .bind(channel_id)
    .bind(poll_date)
    .bind(error_text)
    .execute(pool)
    .await?;

    Ok(())
}
