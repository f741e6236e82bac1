//! Post ledger front: idempotent recording plus opportunistic retention.
//!
//! Retention runs on the write path, not on a timer: the first insert that
//! starts a new civil day for a channel sweeps that channel's expired rows.
//! "New day" is decided against the maximum post_date already stored, never
//! against ambient process state.

use chrono::NaiveDate;
use sqlx::PgPool;
use tracing::info;

use quip_db::queries::posts;

/// Record one observed photo post. Duplicate (channel, message) pairs are
/// silent no-ops. Returns whether a new row was written.
pub async fn record_post(
    pool: &PgPool,
    channel_id: i64,
    message_id: i64,
    post_date: NaiveDate,
    photo_file_id: Option<&str>,
    retention_days: i64,
) -> Result<bool, sqlx::Error> {
    let last_seen = posts::latest_post_date(pool, channel_id).await?;
    let inserted = posts::record(pool, channel_id, message_id, post_date, photo_file_id).await?;

    if inserted && starts_new_day(last_seen, post_date) {
        sweep(pool, channel_id, post_date, retention_days).await?;
    }

    Ok(inserted)
}

/// Delete the channel's ledger rows older than the retention window.
pub async fn sweep(
    pool: &PgPool,
    channel_id: i64,
    today: NaiveDate,
    retention_days: i64,
) -> Result<u64, sqlx::Error> {
    let cutoff = retention_cutoff(today, retention_days);
    let removed = posts::delete_older_than(pool, channel_id, cutoff).await?;
    if removed > 0 {
        info!(channel_id, removed, %cutoff, "retired expired ledger rows");
    }
    Ok(removed)
}

fn starts_new_day(last_seen: Option<NaiveDate>, post_date: NaiveDate) -> bool {
    last_seen.map_or(true, |seen| post_date > seen)
}

fn retention_cutoff(today: NaiveDate, retention_days: i64) -> NaiveDate {
    today - chrono::Duration::days(retention_days)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_first_post_ever_starts_new_day() {
        assert!(starts_new_day(None, date(2024, 6, 1)));
    }

    #[test]
    fn test_newer_date_starts_new_day() {
        assert!(starts_new_day(Some(date(2024, 6, 1)), date(2024, 6, 2)));
    }

    #[test]
    fn test_same_day_does_not_retrigger() {
        assert!(!starts_new_day(Some(date(2024, 6, 2)), date(2024, 6, 2)));
    }

    #[test]
    fn test_backfilled_older_post_does_not_retrigger() {
        assert!(!starts_new_day(Some(date(2024, 6, 2)), date(2024, 6, 1)));
    }

    #[test]
    fn test_retention_cutoff_keeps_recent_drops_old() {
        let today = date(2024, 6, 30);
        let cutoff = retention_cutoff(today, 30);
        assert_eq!(cutoff, date(2024, 5, 31));

        let forty_days_old = today - chrono::Duration::days(40);
        let ten_days_old = today - chrono::Duration::days(10);
        assert!(forty_days_old < cutoff);
        assert!(ten_days_old >= cutoff);
    }
}
