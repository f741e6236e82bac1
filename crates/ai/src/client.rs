//! AI collaborator client for an OpenAI-compatible chat-completions API.
//!
//! The rest of the system depends only on two capabilities: one short
//! caption for an image, and one poll question with a fixed number of
//! answer options. The wire format stays contained here.

use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

use quip_core::config::AiConfig;

// Telegram caps for sendPoll payloads.
const MAX_QUESTION_CHARS: usize = 300;
const MAX_OPTION_CHARS: usize = 100;
const MAX_CAPTION_CHARS: usize = 400;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("ai transport failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("ai returned HTTP {status}: {body}")]
    Api { status: u16, body: String },
    #[error("ai response was malformed: {0}")]
    Malformed(String),
    #[error("ai returned an empty completion")]
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollDraft {
    pub question: String,
    pub options: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: Option<f32>,
    send_image: bool,
    language: String,
}

impl AiClient {
    pub fn new(cfg: &AiConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
            temperature: cfg.temperature,
            send_image: cfg.send_image,
            language: cfg.caption_language.clone(),
        })
    }

    /// One short caption for a channel photo. The author's own caption, when
    /// present, is passed along as context.
    pub async fn generate_caption(
        &self,
        image: &[u8],
        original_caption: Option<&str>,
    ) -> Result<String, AiError> {
        let system = format!(
            "You write witty one-line captions for photos, in the language \
             with ISO code {:?}. Be funny but never toxic, insulting or \
             political. Reply with the caption alone.",
            self.language
        );
        let mut user_text = String::from(
            "Write one short funny caption (at most 120 characters) for this \
             picture. Return only the caption, no quotes, no hashtags, no \
             explanations.",
        );
        if let Some(context) = original_caption {
            user_text.push_str("\nThe author captioned the post: ");
            user_text.push_str(context);
        }

        let content = self
            .chat(&system, &user_text, Some(image), 80)
            .await?;
        let caption = content.replace('\n', " ").trim().to_string();
        if caption.is_empty() {
            return Err(AiError::Empty);
        }
        Ok(truncate_chars(&caption, MAX_CAPTION_CHARS))
    }

    /// One poll question plus exactly `options_count` answer options.
    pub async fn generate_poll_draft(
        &self,
        image: Option<&[u8]>,
        context: &str,
        options_count: u32,
    ) -> Result<PollDraft, AiError> {
        let system = format!(
            "You invent light-hearted daily polls for a photo channel, in \
             the language with ISO code {:?}. Keep every option short and \
             distinct.",
            self.language
        );
        let user_text = format!(
            "Invent one poll about today's channel activity. Context: {context}. \
             Respond with strict JSON only, shaped as \
             {{\"question\": \"...\", \"options\": [\"...\"]}} with exactly \
             {options_count} options and nothing else."
        );

        let content = self.chat(&system, &user_text, image, 300).await?;
        parse_poll_draft(&content, options_count as usize)
    }

    async fn chat(
        &self,
        system: &str,
        user_text: &str,
        image: Option<&[u8]>,
        max_tokens: u32,
    ) -> Result<String, AiError> {
        let user_content = match image.filter(|_| self.send_image) {
            Some(bytes) => {
                let data_url = format!(
                    "data:{};base64,{}",
                    guess_mime(bytes),
                    base64::engine::general_purpose::STANDARD.encode(bytes)
                );
                json!([
                    { "type": "text", "text": user_text },
                    { "type": "image_url", "image_url": { "url": data_url } },
                ])
            }
            None => json!(user_text),
        };

        let mut payload = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user_content },
            ],
            "max_tokens": max_tokens,
        });
        if let Some(temperature) = self.temperature {
            payload["temperature"] = json!(temperature);
        }

        let response = self
            .http
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::Api {
                status: status.as_u16(),
                body: truncate_chars(&body, 500),
            });
        }

        let completion: ChatCompletion = response
            .json()
            .await
            .map_err(|err| AiError::Malformed(err.to_string()))?;
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(AiError::Empty)
    }
}

/// Parse the model's JSON poll draft, tolerating markdown code fences, and
/// enforce the option count and Telegram length caps.
fn parse_poll_draft(content: &str, options_count: usize) -> Result<PollDraft, AiError> {
    let stripped = strip_code_fence(content.trim());
    let value: Value = serde_json::from_str(stripped)
        .map_err(|err| AiError::Malformed(format!("not JSON: {err}")))?;

    let question = value["question"]
        .as_str()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| AiError::Malformed("missing question".to_string()))?;

    let options: Vec<String> = value["options"]
        .as_array()
        .ok_or_else(|| AiError::Malformed("missing options".to_string()))?
        .iter()
        .filter_map(|opt| opt.as_str())
        .map(str::trim)
        .filter(|opt| !opt.is_empty())
        .map(|opt| truncate_chars(opt, MAX_OPTION_CHARS))
        .collect();

    if options.len() < options_count {
        return Err(AiError::Malformed(format!(
            "expected {} options, got {}",
            options_count,
            options.len()
        )));
    }

    Ok(PollDraft {
        question: truncate_chars(question, MAX_QUESTION_CHARS),
        options: options.into_iter().take(options_count).collect(),
    })
}

fn strip_code_fence(content: &str) -> &str {
    let Some(rest) = content.strip_prefix("```") else {
        return content;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.trim_start_matches(['\r', '\n'])
        .strip_suffix("```")
        .unwrap_or(rest)
        .trim()
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Enough sniffing for photos coming out of Telegram.
fn guess_mime(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        "image/png"
    } else if bytes.starts_with(b"\xff\xd8") {
        "image/jpeg"
    } else {
        "application/octet-stream"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guess_mime() {
        assert_eq!(guess_mime(b"\x89PNG\r\n\x1a\nrest"), "image/png");
        assert_eq!(guess_mime(b"\xff\xd8\xff\xe0"), "image/jpeg");
        assert_eq!(guess_mime(b"GIF89a"), "application/octet-stream");
    }

    #[test]
    fn test_parse_poll_draft_plain_json() {
        let draft = parse_poll_draft(
            r#"{"question": "Best shot today?", "options": ["first", "second", "third"]}"#,
            3,
        )
        .unwrap();
        assert_eq!(draft.question, "Best shot today?");
        assert_eq!(draft.options, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_parse_poll_draft_strips_code_fence() {
        let content = "```json\n{\"question\": \"q\", \"options\": [\"a\", \"b\"]}\n```";
        let draft = parse_poll_draft(content, 2).unwrap();
        assert_eq!(draft.question, "q");
        assert_eq!(draft.options.len(), 2);
    }

    #[test]
    fn test_parse_poll_draft_truncates_extra_options() {
        let draft = parse_poll_draft(
            r#"{"question": "q", "options": ["a", "b", "c", "d", "e"]}"#,
            4,
        )
        .unwrap();
        assert_eq!(draft.options, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_parse_poll_draft_rejects_too_few_options() {
        let err = parse_poll_draft(r#"{"question": "q", "options": ["a"]}"#, 4).unwrap_err();
        assert!(matches!(err, AiError::Malformed(_)));
    }

    #[test]
    fn test_parse_poll_draft_rejects_non_json() {
        let err = parse_poll_draft("Sure! Here are some options:", 4).unwrap_err();
        assert!(matches!(err, AiError::Malformed(_)));
    }

    #[test]
    fn test_parse_poll_draft_clips_long_option() {
        let long = "x".repeat(150);
        let content = format!(r#"{{"question": "q", "options": ["{long}", "b"]}}"#);
        let draft = parse_poll_draft(&content, 2).unwrap();
        assert_eq!(draft.options[0].chars().count(), 100);
    }

    #[test]
    fn test_truncate_chars_is_char_safe() {
        assert_eq!(truncate_chars("привет", 3), "при");
        assert_eq!(truncate_chars("ab", 5), "ab");
    }
}
