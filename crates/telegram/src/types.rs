//! Inbound Bot API payloads, reduced to the fields this service reads.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub channel_post: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub date: i64,
    #[serde(default)]
    pub photo: Option<Vec<PhotoSize>>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub media_group_id: Option<String>,
    #[serde(default)]
    pub is_automatic_forward: Option<bool>,
    #[serde(default)]
    pub forward_origin: Option<MessageOrigin>,
}

impl Message {
    /// Telegram lists photo sizes smallest first.
    pub fn largest_photo(&self) -> Option<&PhotoSize> {
        self.photo.as_ref().and_then(|sizes| sizes.last())
    }

    pub fn is_auto_forward(&self) -> bool {
        self.is_automatic_forward.unwrap_or(false)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhotoSize {
    pub file_id: String,
    pub file_unique_id: String,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub file_size: Option<i64>,
}

/// Where a forwarded message came from. Only channel origins matter here;
/// everything else collapses to `Other`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageOrigin {
    Channel { chat: Chat, message_id: i64 },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct File {
    pub file_id: String,
    #[serde(default)]
    pub file_path: Option<String>,
}
