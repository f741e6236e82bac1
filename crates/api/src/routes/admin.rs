//! Operator surface: trigger today's poll immediately, or inspect today's
//! record. The trigger runs the same engine pass as the scheduler and is
//! subject to the same whitelist and terminal-state guards.

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap},
    routing::post,
    Extension, Json, Router,
};
use tracing::error;

use quip_core::{secrets, time};
use quip_db::models::DailyPoll;
use quip_db::queries::daily_polls;
use quip_poll::{EngineError, TickOutcome};

use crate::{
    error::{ApiResult, AppError},
    state::{AppState, RequestId},
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/v1/admin/channels/{channel_id}/poll",
            post(trigger_poll).get(poll_status),
        )
        .with_state(state)
}

async fn trigger_poll(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    headers: HeaderMap,
    Path(channel_id): Path<i64>,
) -> ApiResult<Json<TickOutcome>> {
    authorize(&state, &headers, &request_id)?;

    match state.engine.trigger_now(channel_id).await {
        Ok(outcome) => Ok(Json(outcome)),
        Err(EngineError::ChannelNotAllowed(_)) => Err(AppError::Forbidden(
            "channel is not enabled for daily polls".to_string(),
        )
        .with_request_id(&request_id.0)),
        Err(EngineError::Db(err)) => {
            error!(request_id = %request_id.0, channel_id, error = %err, "manual trigger failed");
            Err(AppError::Internal.with_request_id(&request_id.0))
        }
    }
}

async fn poll_status(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    headers: HeaderMap,
    Path(channel_id): Path<i64>,
) -> ApiResult<Json<DailyPoll>> {
    authorize(&state, &headers, &request_id)?;

    let today = time::civil_today(state.settings.poll.timezone);
    let record = daily_polls::get_by_date(&state.db, channel_id, today)
        .await
        .map_err(|err| {
            error!(request_id = %request_id.0, channel_id, error = %err, "poll lookup failed");
            AppError::Internal.with_request_id(&request_id.0)
        })?
        .ok_or_else(|| {
            AppError::NotFound("no poll record for today".to_string()).with_request_id(&request_id.0)
        })?;

    Ok(Json(record))
}

fn authorize(state: &AppState, headers: &HeaderMap, request_id: &RequestId) -> ApiResult<()> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_bearer)
        .ok_or_else(|| {
            AppError::Unauthorized("missing bearer token".to_string()).with_request_id(&request_id.0)
        })?;

    if !secrets::secrets_match(token, &state.settings.admin_token) {
        return Err(
            AppError::Unauthorized("invalid admin token".to_string()).with_request_id(&request_id.0)
        );
    }
    Ok(())
}

fn parse_bearer(value: &str) -> Option<&str> {
    let mut parts = value.splitn(2, ' ');
    match (parts.next(), parts.next()) {
        (Some("Bearer"), Some(token)) if !token.is_empty() => Some(token),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bearer() {
        assert_eq!(parse_bearer("Bearer abc"), Some("abc"));
        assert_eq!(parse_bearer("Bearer "), None);
        assert_eq!(parse_bearer("Basic abc"), None);
        assert_eq!(parse_bearer("abc"), None);
    }
}
