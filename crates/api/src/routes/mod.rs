pub mod admin;
pub mod health;
pub mod webhook;

use axum::Router;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(health::router(state.clone()))
        .merge(webhook::router(state.clone()))
        .merge(admin::router(state))
}
