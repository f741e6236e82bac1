//! Outbound Bot API client.
//!
//! The bot token is part of every request URL, so errors and logs carry the
//! method name only, never the URL.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::types::{File, Message};

#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("bot api transport failed for {method}: {source}")]
    Transport {
        method: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("bot api rejected {method}: {description} (code {code})")]
    Api {
        method: &'static str,
        code: i64,
        description: String,
    },
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    error_code: Option<i64>,
}

#[derive(Debug, Serialize)]
struct ReplyParameters {
    message_id: i64,
    allow_sending_without_reply: bool,
}

#[derive(Debug, Serialize)]
struct SendMessagePayload<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_parameters: Option<ReplyParameters>,
}

#[derive(Debug, Serialize)]
struct InputPollOption<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct SendPollPayload<'a> {
    chat_id: i64,
    question: &'a str,
    options: Vec<InputPollOption<'a>>,
    is_anonymous: bool,
    allows_multiple_answers: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    open_period: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_parameters: Option<ReplyParameters>,
}

#[derive(Debug, Serialize)]
struct SetWebhookPayload<'a> {
    url: &'a str,
    secret_token: &'a str,
    drop_pending_updates: bool,
}

#[derive(Debug, Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    api_base: String,
    bot_token: String,
}

impl TelegramClient {
    pub fn new(api_base: &str, bot_token: &str, timeout_secs: u64) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            bot_token: bot_token.to_string(),
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &'static str,
        payload: &impl Serialize,
    ) -> Result<T, TelegramError> {
        let url = format!("{}/bot{}/{}", self.api_base, self.bot_token, method);
        let response = self
            .http
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|source| TelegramError::Transport { method, source })?;

        let body: ApiResponse<T> = response
            .json()
            .await
            .map_err(|source| TelegramError::Transport { method, source })?;

        match body {
            ApiResponse { ok: true, result: Some(result), .. } => Ok(result),
            ApiResponse { error_code, description, .. } => Err(TelegramError::Api {
                method,
                code: error_code.unwrap_or(0),
                description: description.unwrap_or_else(|| "no description".to_string()),
            }),
        }
    }

    /// Reply to a message in the discussion thread.
    pub async fn reply_in_thread(
        &self,
        chat_id: i64,
        reply_to_message_id: i64,
        text: &str,
    ) -> Result<Message, TelegramError> {
        self.call(
            "sendMessage",
            &SendMessagePayload {
                chat_id,
                text,
                reply_parameters: Some(ReplyParameters {
                    message_id: reply_to_message_id,
                    allow_sending_without_reply: true,
                }),
            },
        )
        .await
    }

    /// Create an anonymous single-answer poll in a channel.
    /// `open_seconds` of zero means the poll never auto-closes.
    pub async fn create_poll(
        &self,
        chat_id: i64,
        question: &str,
        options: &[String],
        open_seconds: u32,
        reply_to_message_id: Option<i64>,
    ) -> Result<Message, TelegramError> {
        self.call(
            "sendPoll",
            &SendPollPayload {
                chat_id,
                question,
                options: options.iter().map(|text| InputPollOption { text }).collect(),
                is_anonymous: true,
                allows_multiple_answers: false,
                open_period: (open_seconds > 0).then_some(open_seconds),
                reply_parameters: reply_to_message_id.map(|message_id| ReplyParameters {
                    message_id,
                    allow_sending_without_reply: true,
                }),
            },
        )
        .await
    }

    pub async fn get_file(&self, file_id: &str) -> Result<File, TelegramError> {
        self.call("getFile", &serde_json::json!({ "file_id": file_id }))
            .await
    }

    /// Download file content resolved by [`get_file`].
    pub async fn download_file(&self, file_path: &str) -> Result<Vec<u8>, TelegramError> {
        let url = format!("{}/file/bot{}/{}", self.api_base, self.bot_token, file_path);
        let response = self
            .http
            .get(url)
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(|source| TelegramError::Transport { method: "downloadFile", source })?;
        let bytes = response
            .bytes()
            .await
            .map_err(|source| TelegramError::Transport { method: "downloadFile", source })?;
        Ok(bytes.to_vec())
    }

    pub async fn set_webhook(&self, url: &str, secret_token: &str) -> Result<bool, TelegramError> {
        self.call(
            "setWebhook",
            &SetWebhookPayload {
                url,
                secret_token,
                drop_pending_updates: true,
            },
        )
        .await
    }

    pub async fn delete_webhook(&self) -> Result<bool, TelegramError> {
        self.call("deleteWebhook", &serde_json::json!({ "drop_pending_updates": false }))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_poll_payload_shape() {
        let options = vec!["a".to_string(), "b".to_string()];
        let payload = SendPollPayload {
            chat_id: -1001,
            question: "which?",
            options: options.iter().map(|text| InputPollOption { text }).collect(),
            is_anonymous: true,
            allows_multiple_answers: false,
            open_period: None,
            reply_parameters: Some(ReplyParameters {
                message_id: 42,
                allow_sending_without_reply: true,
            }),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["options"][0]["text"], "a");
        assert_eq!(json["reply_parameters"]["message_id"], 42);
        // open_period of "never closes" must be absent, not zero
        assert!(json.get("open_period").is_none());
    }

    #[test]
    fn test_send_message_payload_without_reply() {
        let payload = SendMessagePayload {
            chat_id: 5,
            text: "hi",
            reply_parameters: None,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert!(json.get("reply_parameters").is_none());
    }

    #[test]
    fn test_api_error_response_parsing() {
        let raw = r#"{"ok": false, "error_code": 403, "description": "Forbidden: bot is not a member"}"#;
        let body: ApiResponse<Message> = serde_json::from_str(raw).unwrap();
        assert!(!body.ok);
        assert_eq!(body.error_code, Some(403));
        assert!(body.result.is_none());
    }
}
