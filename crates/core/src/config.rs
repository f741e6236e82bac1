use chrono_tz::Tz;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} is invalid: {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub api_bind: String,
    pub env: String,
    pub admin_token: String,
    pub telegram: TelegramConfig,
    pub ai: AiConfig,
    pub poll: PollConfig,
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub api_base: String,
    pub public_base_url: String,
    pub webhook_path_secret: String,
    pub webhook_secret_token: String,
    pub allowed_channel_id: Option<i64>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct AiConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout_secs: u64,
    pub temperature: Option<f32>,
    pub send_image: bool,
    pub caption_language: String,
}

#[derive(Debug, Clone)]
pub struct PollConfig {
    pub enabled: bool,
    pub channel_ids: Vec<i64>,
    pub timezone: Tz,
    pub start_hour: u32,
    pub end_hour: u32,
    pub min_posts: i64,
    pub options_count: u32,
    pub open_seconds: u32,
    pub retention_days: i64,
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub tick_secs: u64,
    pub tick_deadline_secs: u64,
    pub channel_deadline_secs: u64,
}

impl TelegramConfig {
    /// Full webhook URL the bot registers with Telegram. The path segment
    /// doubles as a shared secret, so it never appears in logs.
    pub fn webhook_url(&self) -> String {
        format!(
            "{}/webhook/{}",
            self.public_base_url.trim_end_matches('/'),
            self.webhook_path_secret
        )
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = require("DATABASE_URL", var_or("DATABASE_URL", "QUIP_DATABASE_URL"))?;
        let api_bind = std::env::var("QUIP_API_BIND").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let env = std::env::var("QUIP_ENV").unwrap_or_else(|_| "development".to_string());
        let admin_token = require("QUIP_ADMIN_TOKEN", std::env::var("QUIP_ADMIN_TOKEN").ok())?;

        let telegram = TelegramConfig {
            bot_token: require(
                "TELEGRAM_BOT_TOKEN",
                std::env::var("TELEGRAM_BOT_TOKEN").ok().map(normalize_token),
            )?,
            api_base: std::env::var("TELEGRAM_API_BASE")
                .unwrap_or_else(|_| "https://api.telegram.org".to_string()),
            public_base_url: require("PUBLIC_BASE_URL", std::env::var("PUBLIC_BASE_URL").ok())?,
            webhook_path_secret: require(
                "TELEGRAM_WEBHOOK_PATH_SECRET",
                std::env::var("TELEGRAM_WEBHOOK_PATH_SECRET").ok(),
            )?,
            webhook_secret_token: require(
                "TELEGRAM_WEBHOOK_SECRET_TOKEN",
                std::env::var("TELEGRAM_WEBHOOK_SECRET_TOKEN").ok(),
            )?,
            allowed_channel_id: parse_opt("TELEGRAM_ALLOWED_CHANNEL_ID")?,
            timeout_secs: parse_or("TELEGRAM_TIMEOUT_SECS", 30)?,
        };

        let ai = AiConfig {
            base_url: std::env::var("AI_BASE_URL")
                .unwrap_or_else(|_| "https://api.timeweb.cloud".to_string()),
            api_key: require("AI_API_KEY", std::env::var("AI_API_KEY").ok())?,
            model: require("AI_MODEL", std::env::var("AI_MODEL").ok())?,
            timeout_secs: parse_or("AI_TIMEOUT_SECS", 30)?,
            temperature: parse_opt("AI_TEMPERATURE")?,
            send_image: parse_or("AI_SEND_IMAGE", true)?,
            caption_language: std::env::var("CAPTION_LANGUAGE").unwrap_or_else(|_| "ru".to_string()),
        };

        let timezone: Tz = {
            let raw = std::env::var("DAILY_POLL_TIMEZONE")
                .unwrap_or_else(|_| "Europe/Moscow".to_string());
            raw.parse().map_err(|_| ConfigError::Invalid {
                name: "DAILY_POLL_TIMEZONE",
                value: raw,
            })?
        };

        let poll = PollConfig {
            enabled: parse_or("DAILY_POLL_ENABLED", true)?,
            channel_ids: parse_id_list("DAILY_POLL_CHANNEL_IDS")?,
            timezone,
            start_hour: parse_or("DAILY_POLL_START_HOUR", 13)?,
            end_hour: parse_or("DAILY_POLL_END_HOUR", 21)?,
            min_posts: parse_or("DAILY_POLL_MIN_POSTS", 3)?,
            options_count: parse_or("DAILY_POLL_OPTIONS_COUNT", 4)?,
            open_seconds: parse_or("DAILY_POLL_OPEN_SECONDS", 0)?,
            retention_days: parse_or("POST_RETENTION_DAYS", 30)?,
        };

        if poll.start_hour >= poll.end_hour || poll.end_hour > 24 {
            return Err(ConfigError::Invalid {
                name: "DAILY_POLL_START_HOUR/DAILY_POLL_END_HOUR",
                value: format!("[{}, {})", poll.start_hour, poll.end_hour),
            });
        }

        let scheduler = SchedulerConfig {
            tick_secs: parse_or("SCHEDULER_TICK_SECS", 60)?,
            tick_deadline_secs: parse_or("SCHEDULER_TICK_DEADLINE_SECS", 120)?,
            channel_deadline_secs: parse_or("SCHEDULER_CHANNEL_DEADLINE_SECS", 90)?,
        };

        Ok(Self {
            database_url,
            api_bind,
            env,
            admin_token,
            telegram,
            ai,
            poll,
            scheduler,
        })
    }
}

fn var_or(name: &str, fallback: &str) -> Option<String> {
    std::env::var(name).or_else(|_| std::env::var(fallback)).ok()
}

fn require(name: &'static str, value: Option<String>) -> Result<String, ConfigError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::Missing(name)),
    }
}

fn parse_or<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid { name, value: raw }),
        Err(_) => Ok(default),
    }
}

fn parse_opt<T: std::str::FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
        _ => Ok(None),
    }
}

fn parse_id_list(name: &'static str) -> Result<Vec<i64>, ConfigError> {
    let raw = match std::env::var(name) {
        Ok(raw) => raw,
        Err(_) => return Ok(Vec::new()),
    };
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse().map_err(|_| ConfigError::Invalid {
                name,
                value: part.to_string(),
            })
        })
        .collect()
}

// Deploy panels are fond of wrapping tokens in quotes or trailing newlines.
fn normalize_token(raw: String) -> String {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| trimmed.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
        .unwrap_or(trimmed);
    trimmed.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_token_strips_quotes_and_whitespace() {
        assert_eq!(normalize_token("\"123:abc\"\n".to_string()), "123:abc");
        assert_eq!(normalize_token("  '123:abc'  ".to_string()), "123:abc");
        assert_eq!(normalize_token("123:abc".to_string()), "123:abc");
    }

    #[test]
    fn test_normalize_token_keeps_unbalanced_quote() {
        assert_eq!(normalize_token("\"123:abc".to_string()), "\"123:abc");
    }

    #[test]
    fn test_webhook_url_joins_without_double_slash() {
        let cfg = TelegramConfig {
            bot_token: "t".to_string(),
            api_base: "https://api.telegram.org".to_string(),
            public_base_url: "https://bot.example.com/".to_string(),
            webhook_path_secret: "s3cret".to_string(),
            webhook_secret_token: "header".to_string(),
            allowed_channel_id: None,
            timeout_secs: 30,
        };
        assert_eq!(cfg.webhook_url(), "https://bot.example.com/webhook/s3cret");
    }

    #[test]
    fn test_require_rejects_blank() {
        assert!(require("X", Some("  ".to_string())).is_err());
        assert!(require("X", None).is_err());
        assert_eq!(require("X", Some("v".to_string())).unwrap(), "v");
    }
}
