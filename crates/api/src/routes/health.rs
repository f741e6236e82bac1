use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use quip_core::secrets;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .with_state(state)
}

// Deploy platforms default to probing "/".
async fn root() -> &'static str {
    "OK"
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    env: String,
    bot_token_fp: String,
    webhook_configured: bool,
    webhook_error: Option<String>,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let (webhook_configured, webhook_error) = state.webhook.snapshot();
    Json(HealthResponse {
        status: "ok",
        env: state.settings.env.clone(),
        bot_token_fp: secrets::token_fingerprint(&state.settings.telegram.bot_token),
        webhook_configured,
        webhook_error,
    })
}
