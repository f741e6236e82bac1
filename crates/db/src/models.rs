use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

/// One observed photo post in a channel. Rows are write-once; only the
/// retention sweep ever deletes them.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Post {
    pub id: i64,
    pub channel_id: i64,
    pub message_id: i64,
    pub post_date: NaiveDate,
    pub photo_file_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One poll lifecycle per (channel, civil date).
///
/// At most one of `posted_at` / `skipped_at` is ever set, and once set it
/// never changes. A row with neither is still pending.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DailyPoll {
    pub channel_id: i64,
    pub poll_date: NaiveDate,
    pub scheduled_at: DateTime<Utc>,
    pub posted_at: Option<DateTime<Utc>>,
    pub skipped_at: Option<DateTime<Utc>>,
    pub poll_message_id: Option<i64>,
    pub chosen_post_message_id: Option<i64>,
    pub question: Option<String>,
    pub options: Option<Json<Vec<String>>>,
    pub skip_reason: Option<String>,
    pub last_error: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PollState {
    Pending,
    Posted,
    Skipped,
}

impl DailyPoll {
    pub fn state(&self) -> PollState {
        if self.posted_at.is_some() {
            PollState::Posted
        } else if self.skipped_at.is_some() {
            PollState::Skipped
        } else {
            PollState::Pending
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.state() != PollState::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn pending() -> DailyPoll {
        DailyPoll {
            channel_id: -100,
            poll_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            scheduled_at: Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap(),
            posted_at: None,
            skipped_at: None,
            poll_message_id: None,
            chosen_post_message_id: None,
            question: None,
            options: None,
            skip_reason: None,
            last_error: None,
            last_error_at: None,
        }
    }

    #[test]
    fn test_state_pending() {
        let poll = pending();
        assert_eq!(poll.state(), PollState::Pending);
        assert!(!poll.is_finalized());
    }

    #[test]
    fn test_state_posted() {
        let mut poll = pending();
        poll.posted_at = Some(Utc.with_ymd_and_hms(2024, 6, 1, 14, 0, 0).unwrap());
        assert_eq!(poll.state(), PollState::Posted);
        assert!(poll.is_finalized());
    }

    #[test]
    fn test_state_skipped() {
        let mut poll = pending();
        poll.skipped_at = Some(Utc.with_ymd_and_hms(2024, 6, 1, 21, 0, 0).unwrap());
        assert_eq!(poll.state(), PollState::Skipped);
        assert!(poll.is_finalized());
    }

    #[test]
    fn test_error_does_not_finalize() {
        let mut poll = pending();
        poll.last_error = Some("ai timeout".to_string());
        poll.last_error_at = Some(Utc.with_ymd_and_hms(2024, 6, 1, 14, 5, 0).unwrap());
        assert_eq!(poll.state(), PollState::Pending);
    }
}
