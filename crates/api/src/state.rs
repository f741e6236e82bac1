use sqlx::PgPool;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use quip_ai::AiClient;
use quip_core::config::Settings;
use quip_poll::Engine;
use quip_telegram::TelegramClient;

use crate::dedupe::DedupeCache;
use crate::discussion::DiscussionMapper;

// Inbound updates can be re-delivered for hours; discussion forwards only
// need to outlive the caption pipeline's wait.
const SEEN_MESSAGE_TTL: Duration = Duration::from_secs(6 * 60 * 60);
const SEEN_ALBUM_TTL: Duration = Duration::from_secs(6 * 60 * 60);
const DISCUSSION_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub settings: Arc<Settings>,
    pub telegram: TelegramClient,
    pub ai: AiClient,
    pub engine: Engine,
    pub discussions: Arc<DiscussionMapper>,
    pub seen_messages: Arc<DedupeCache<(i64, i64)>>,
    pub seen_albums: Arc<DedupeCache<String>>,
    pub webhook: Arc<WebhookRegistration>,
}

impl AppState {
    pub fn new(
        db: PgPool,
        settings: Arc<Settings>,
        telegram: TelegramClient,
        ai: AiClient,
        engine: Engine,
    ) -> Self {
        Self {
            db,
            settings,
            telegram,
            ai,
            engine,
            discussions: Arc::new(DiscussionMapper::new(DISCUSSION_TTL)),
            seen_messages: Arc::new(DedupeCache::new(SEEN_MESSAGE_TTL)),
            seen_albums: Arc::new(DedupeCache::new(SEEN_ALBUM_TTL)),
            webhook: Arc::new(WebhookRegistration::default()),
        }
    }
}

#[derive(Clone)]
pub struct RequestId(pub String);

/// Outcome of the background setWebhook call, surfaced by /health.
#[derive(Default)]
pub struct WebhookRegistration {
    inner: RwLock<RegistrationState>,
}

#[derive(Default, Clone)]
struct RegistrationState {
    configured: bool,
    error: Option<String>,
}

impl WebhookRegistration {
    pub fn record_success(&self) {
        let mut state = self.inner.write().expect("webhook state lock");
        state.configured = true;
        state.error = None;
    }

    pub fn record_failure(&self, error: String) {
        let mut state = self.inner.write().expect("webhook state lock");
        state.configured = false;
        state.error = Some(error);
    }

    pub fn snapshot(&self) -> (bool, Option<String>) {
        let state = self.inner.read().expect("webhook state lock");
        (state.configured, state.error.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_webhook_registration_state() {
        let reg = WebhookRegistration::default();
        assert_eq!(reg.snapshot(), (false, None));

        reg.record_failure("boom".to_string());
        assert_eq!(reg.snapshot(), (false, Some("boom".to_string())));

        reg.record_success();
        assert_eq!(reg.snapshot(), (true, None));
    }
}
