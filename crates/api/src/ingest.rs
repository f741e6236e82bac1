//! Inbound update processing: ledger writes on channel photo posts, forward
//! correlation from the discussion group, and the caption pipeline.

use chrono::DateTime;
use tracing::{debug, error, info, warn};

use quip_core::time;
use quip_poll::ledger;
use quip_telegram::types::{Message, Update};

use crate::discussion::MapperEvent;
use crate::state::AppState;

/// Dispatch one webhook update. Only storage failures propagate; the
/// webhook answers 500 for those so Telegram re-delivers the update.
pub async fn process_update(state: &AppState, update: Update) -> Result<(), sqlx::Error> {
    if let Some(post) = update.channel_post {
        return handle_channel_post(state, post).await;
    }
    if let Some(message) = update.message {
        handle_group_message(state, &message);
    }
    Ok(())
}

async fn handle_channel_post(state: &AppState, msg: Message) -> Result<(), sqlx::Error> {
    if let Some(allowed) = state.settings.telegram.allowed_channel_id {
        if msg.chat.id != allowed {
            debug!(chat_id = msg.chat.id, "ignoring post from foreign channel");
            return Ok(());
        }
    }

    let Some(photo_file_id) = msg.largest_photo().map(|photo| photo.file_id.clone()) else {
        return Ok(());
    };

    // Re-delivered update for a message we already handled.
    if !state.seen_messages.first_sighting((msg.chat.id, msg.message_id)) {
        return Ok(());
    }

    let tz = state.settings.poll.timezone;
    let post_date = DateTime::from_timestamp(msg.date, 0)
        .map(|utc| utc.with_timezone(&tz).date_naive())
        .unwrap_or_else(|| time::civil_today(tz));

    let inserted = ledger::record_post(
        &state.db,
        msg.chat.id,
        msg.message_id,
        post_date,
        Some(&photo_file_id),
        state.settings.poll.retention_days,
    )
    .await?;
    if inserted {
        info!(channel_id = msg.chat.id, message_id = msg.message_id, %post_date, "post recorded");
    }

    // Every album item lands in the ledger, but only the first one gets a
    // caption comment.
    let caption_worthy = msg
        .media_group_id
        .as_ref()
        .map_or(true, |album| state.seen_albums.first_sighting(album.clone()));
    if caption_worthy {
        let state = state.clone();
        tokio::spawn(async move {
            caption_pipeline(state, msg, photo_file_id).await;
        });
    }

    Ok(())
}

fn handle_group_message(state: &AppState, msg: &Message) {
    if let Some(event) = MapperEvent::from_group_message(msg) {
        state.discussions.apply(event);
    }
}

/// Best-effort: download the photo, generate a caption, reply under the
/// mirrored post in the discussion group. Failures are logged and dropped;
/// the ledger record made above is unaffected.
async fn caption_pipeline(state: AppState, msg: Message, photo_file_id: String) {
    let channel_id = msg.chat.id;
    let message_id = msg.message_id;

    let image = match fetch_photo(&state, &photo_file_id).await {
        Ok(image) => image,
        Err(detail) => {
            warn!(channel_id, message_id, error = %detail, "photo download failed, no caption");
            return;
        }
    };

    let caption = match state.ai.generate_caption(&image, msg.caption.as_deref()).await {
        Ok(caption) => caption,
        Err(err) => {
            warn!(channel_id, message_id, error = %err, "caption generation failed");
            return;
        }
    };

    let Some(target) = state.discussions.resolve_waiting(channel_id, message_id).await else {
        error!(
            channel_id,
            message_id,
            "no discussion mapping appeared; check that comments are enabled \
             and the bot is a member of the linked group"
        );
        return;
    };

    match state
        .telegram
        .reply_in_thread(target.chat_id, target.message_id, &caption)
        .await
    {
        Ok(_) => info!(channel_id, message_id, "caption comment delivered"),
        Err(err) => warn!(channel_id, message_id, error = %err, "caption delivery failed"),
    }
}

async fn fetch_photo(state: &AppState, file_id: &str) -> Result<Vec<u8>, String> {
    let file = state
        .telegram
        .get_file(file_id)
        .await
        .map_err(|err| err.to_string())?;
    let path = file.file_path.ok_or_else(|| "file has no path".to_string())?;
    state
        .telegram
        .download_file(&path)
        .await
        .map_err(|err| err.to_string())
}
