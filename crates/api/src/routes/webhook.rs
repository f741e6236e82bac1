use axum::{
    extract::{Path, State},
    http::HeaderMap,
    routing::post,
    Extension, Json, Router,
};
use serde::Serialize;
use tracing::error;

use quip_core::secrets;
use quip_telegram::types::Update;

use crate::{
    error::{ApiResult, AppError},
    ingest,
    state::{AppState, RequestId},
};

const SECRET_TOKEN_HEADER: &str = "x-telegram-bot-api-secret-token";

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/webhook/{path_secret}", post(receive_update))
        .with_state(state)
}

#[derive(Serialize)]
struct WebhookAck {
    ok: bool,
}

async fn receive_update(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(path_secret): Path<String>,
    headers: HeaderMap,
    Json(update): Json<Update>,
) -> ApiResult<Json<WebhookAck>> {
    // A wrong path secret looks like any other unknown route.
    if !secrets::secrets_match(&path_secret, &state.settings.telegram.webhook_path_secret) {
        return Err(AppError::NotFound("not found".to_string()).with_request_id(&request_id.0));
    }

    let presented = headers
        .get(SECRET_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if !secrets::secrets_match(presented, &state.settings.telegram.webhook_secret_token) {
        return Err(AppError::Forbidden("bad secret token".to_string()).with_request_id(&request_id.0));
    }

    // Storage failure -> 500 -> Telegram re-delivers the update.
    ingest::process_update(&state, update).await.map_err(|err| {
        error!(request_id = %request_id.0, error = %err, "update processing failed");
        AppError::Internal.with_request_id(&request_id.0)
    })?;

    Ok(Json(WebhookAck { ok: true }))
}
