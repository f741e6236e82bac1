//! The daily poll engine.
//!
//! One decisive action per channel per civil day: a pending record is
//! created inside the publishing window, then driven to posted or skipped.
//! The admission decision (steps worth taking this tick) is separated from
//! execution (AI draft + delivery) so collaborator failures stay retryable
//! until the window closes. Every transition is a guarded single-statement
//! write in the store, so concurrent ticks and the manual trigger cannot
//! double-finalize a day.

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use quip_ai::AiClient;
use quip_core::config::Settings;
use quip_core::time::{self, PublishWindow, WindowPosition};
use quip_db::models::PollState;
use quip_db::queries::{daily_polls, posts};
use quip_telegram::TelegramClient;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("channel {0} is not enabled for daily polls")]
    ChannelNotAllowed(i64),
    #[error("storage error: {0}")]
    Db(#[from] sqlx::Error),
}

/// What a decision pass did for one (channel, day). Also the response body
/// of the manual trigger.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TickOutcome {
    /// The window has not opened yet; nothing was created.
    BeforeWindow,
    /// The window already closed and no record was ever created today.
    NothingPending,
    /// The day is already posted or skipped.
    AlreadyFinalized { state: PollState },
    /// Pending, below the minimum post count, window still open.
    AwaitingPosts { have: i64, need: i64 },
    Skipped { reason: String },
    Posted { poll_message_id: i64 },
    /// A collaborator failed; the day stays pending for the next tick.
    Retrying { error: String },
}

#[derive(Debug, PartialEq, Eq)]
enum Admission {
    Wait { have: i64, need: i64 },
    SkipInsufficient,
    SkipWindowClosed,
    Publish,
}

/// Admission rule for a pending record. `Before` never reaches this point:
/// nothing exists to decide about before the window opens.
fn admit(position: WindowPosition, post_count: i64, min_posts: i64) -> Admission {
    match position {
        WindowPosition::Closed if post_count < min_posts => Admission::SkipInsufficient,
        WindowPosition::Closed => Admission::SkipWindowClosed,
        _ if post_count < min_posts => Admission::Wait {
            have: post_count,
            need: min_posts,
        },
        _ => Admission::Publish,
    }
}

enum PublishFailure {
    /// AI or delivery trouble: recorded, left pending, retried next tick.
    Collaborator(String),
    Db(sqlx::Error),
}

impl From<sqlx::Error> for PublishFailure {
    fn from(err: sqlx::Error) -> Self {
        PublishFailure::Db(err)
    }
}

#[derive(Clone)]
pub struct Engine {
    pub db: PgPool,
    pub telegram: TelegramClient,
    pub ai: AiClient,
    pub settings: Arc<Settings>,
}

impl Engine {
    /// One scheduler pass over every whitelisted channel. Channel failures
    /// and deadline overruns are isolated; the rest of the pass continues.
    pub async fn run_tick(&self) {
        if !self.settings.poll.enabled {
            return;
        }
        if self.settings.poll.channel_ids.is_empty() {
            warn!("daily polls enabled but no channels configured");
            return;
        }

        let deadline = Duration::from_secs(self.settings.scheduler.channel_deadline_secs);
        for &channel_id in &self.settings.poll.channel_ids {
            match tokio::time::timeout(deadline, self.process_channel(channel_id, false)).await {
                Ok(Ok(outcome)) => log_outcome(channel_id, &outcome),
                Ok(Err(err)) => error!(channel_id, error = %err, "channel pass failed"),
                Err(_) => warn!(channel_id, "channel pass exceeded deadline, abandoned"),
            }
        }
    }

    /// Manual trigger: same machinery, window and minimum-post gates
    /// bypassed. The whitelist and the terminal-state guard still apply.
    pub async fn trigger_now(&self, channel_id: i64) -> Result<TickOutcome, EngineError> {
        if !self.settings.poll.channel_ids.contains(&channel_id) {
            return Err(EngineError::ChannelNotAllowed(channel_id));
        }
        self.process_channel(channel_id, true).await
    }

    async fn process_channel(
        &self,
        channel_id: i64,
        force: bool,
    ) -> Result<TickOutcome, EngineError> {
        let cfg = &self.settings.poll;
        let now_local = time::local_now(cfg.timezone);
        let today = now_local.date_naive();
        let window = PublishWindow::new(cfg.start_hour, cfg.end_hour);
        let position = if force {
            WindowPosition::Open
        } else {
            window.position_at(&now_local)
        };

        let record = match position {
            WindowPosition::Before => return Ok(TickOutcome::BeforeWindow),
            WindowPosition::Open => {
                daily_polls::get_or_create_pending(&self.db, channel_id, today, Utc::now()).await?
            }
            // After the window nothing new is created; only a leftover
            // pending row gets finalized.
            WindowPosition::Closed => {
                match daily_polls::get_by_date(&self.db, channel_id, today).await? {
                    Some(record) => record,
                    None => return Ok(TickOutcome::NothingPending),
                }
            }
        };

        if record.is_finalized() {
            return Ok(TickOutcome::AlreadyFinalized { state: record.state() });
        }

        let post_count = posts::count_on_date(&self.db, channel_id, today).await?;
        let admission = if force {
            Admission::Publish
        } else {
            admit(position, post_count, cfg.min_posts)
        };

        match admission {
            Admission::Wait { have, need } => Ok(TickOutcome::AwaitingPosts { have, need }),
            Admission::SkipInsufficient => {
                self.finish_skipped(channel_id, today, "insufficient posts").await
            }
            Admission::SkipWindowClosed => {
                self.finish_skipped(channel_id, today, "window closed").await
            }
            Admission::Publish => match self.try_publish(channel_id, today, post_count).await {
                Ok(outcome) => Ok(outcome),
                Err(PublishFailure::Collaborator(detail)) => {
                    daily_polls::record_error(&self.db, channel_id, today, &detail).await?;
                    warn!(channel_id, %today, error = %detail, "poll attempt failed, staying pending");
                    Ok(TickOutcome::Retrying { error: detail })
                }
                Err(PublishFailure::Db(err)) => Err(err.into()),
            },
        }
    }

    async fn finish_skipped(
        &self,
        channel_id: i64,
        date: NaiveDate,
        reason: &str,
    ) -> Result<TickOutcome, EngineError> {
        if daily_polls::mark_skipped(&self.db, channel_id, date, reason).await? {
            return Ok(TickOutcome::Skipped { reason: reason.to_string() });
        }
        // Lost the finalization race; report what the winner decided.
        let state = daily_polls::get_by_date(&self.db, channel_id, date)
            .await?
            .map(|record| record.state())
            .unwrap_or(PollState::Skipped);
        Ok(TickOutcome::AlreadyFinalized { state })
    }

    async fn try_publish(
        &self,
        channel_id: i64,
        date: NaiveDate,
        post_count: i64,
    ) -> Result<TickOutcome, PublishFailure> {
        let cfg = &self.settings.poll;

        // With a minimum of zero there may be nothing to reference; the
        // poll is still created, just not anchored to a post.
        let chosen = posts::pick_random_on_date(&self.db, channel_id, date).await?;
        let chosen_message_id = chosen.as_ref().map(|post| post.message_id);

        let image = match chosen.as_ref().and_then(|post| post.photo_file_id.as_deref()) {
            Some(file_id) => Some(
                self.fetch_photo(file_id)
                    .await
                    .map_err(PublishFailure::Collaborator)?,
            ),
            None => None,
        };

        let context = format!("the channel shared {post_count} photo posts today");
        let draft = self
            .ai
            .generate_poll_draft(image.as_deref(), &context, cfg.options_count)
            .await
            .map_err(|err| PublishFailure::Collaborator(err.to_string()))?;

        let delivered = self
            .telegram
            .create_poll(
                channel_id,
                &draft.question,
                &draft.options,
                cfg.open_seconds,
                chosen_message_id,
            )
            .await
            .map_err(|err| PublishFailure::Collaborator(err.to_string()))?;

        let recorded = daily_polls::mark_posted(
            &self.db,
            channel_id,
            date,
            delivered.message_id,
            chosen_message_id,
            &draft.question,
            &draft.options,
        )
        .await?;

        if !recorded {
            // Another finalizer won while we were delivering. The poll went
            // out, but the day's record belongs to the winner.
            warn!(channel_id, %date, poll_message_id = delivered.message_id,
                  "delivered poll lost the finalization race");
            return Ok(TickOutcome::AlreadyFinalized { state: PollState::Posted });
        }

        Ok(TickOutcome::Posted { poll_message_id: delivered.message_id })
    }

    async fn fetch_photo(&self, file_id: &str) -> Result<Vec<u8>, String> {
        let file = self
            .telegram
            .get_file(file_id)
            .await
            .map_err(|err| err.to_string())?;
        let path = file.file_path.ok_or_else(|| "file has no path".to_string())?;
        self.telegram
            .download_file(&path)
            .await
            .map_err(|err| err.to_string())
    }
}

fn log_outcome(channel_id: i64, outcome: &TickOutcome) {
    match outcome {
        TickOutcome::Posted { poll_message_id } => {
            info!(channel_id, poll_message_id, "daily poll posted");
        }
        TickOutcome::Skipped { reason } => {
            info!(channel_id, reason = reason.as_str(), "daily poll skipped");
        }
        TickOutcome::Retrying { error } => {
            warn!(channel_id, error = error.as_str(), "daily poll attempt failed");
        }
        TickOutcome::AwaitingPosts { have, need } => {
            debug!(channel_id, have, need, "daily poll waiting for more posts");
        }
        TickOutcome::BeforeWindow
        | TickOutcome::NothingPending
        | TickOutcome::AlreadyFinalized { .. } => {
            debug!(channel_id, ?outcome, "daily poll no-op");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admit_waits_below_minimum_while_open() {
        assert_eq!(
            admit(WindowPosition::Open, 2, 3),
            Admission::Wait { have: 2, need: 3 }
        );
    }

    #[test]
    fn test_admit_publishes_at_minimum() {
        assert_eq!(admit(WindowPosition::Open, 3, 3), Admission::Publish);
        assert_eq!(admit(WindowPosition::Open, 10, 3), Admission::Publish);
    }

    #[test]
    fn test_admit_zero_minimum_publishes_with_no_posts() {
        assert_eq!(admit(WindowPosition::Open, 0, 0), Admission::Publish);
    }

    #[test]
    fn test_admit_skips_insufficient_after_close() {
        assert_eq!(admit(WindowPosition::Closed, 2, 3), Admission::SkipInsufficient);
        assert_eq!(admit(WindowPosition::Closed, 0, 1), Admission::SkipInsufficient);
    }

    #[test]
    fn test_admit_skips_window_closed_when_minimum_met() {
        assert_eq!(admit(WindowPosition::Closed, 5, 3), Admission::SkipWindowClosed);
    }

    #[test]
    fn test_outcome_serializes_with_tag() {
        let outcome = TickOutcome::Posted { poll_message_id: 77 };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["outcome"], "posted");
        assert_eq!(json["poll_message_id"], 77);

        let outcome = TickOutcome::AlreadyFinalized { state: PollState::Skipped };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["outcome"], "already_finalized");
        assert_eq!(json["state"], "skipped");
    }
}
