use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

use quip_ai::AiClient;
use quip_core::config::Settings;
use quip_core::secrets;
use quip_poll::Engine;
use quip_telegram::TelegramClient;

mod dedupe;
mod discussion;
mod error;
mod ingest;
mod middleware;
mod routes;
mod state;

use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    let settings = Arc::new(Settings::from_env()?);
    // The fingerprint lets an operator confirm which token the deploy
    // picked up; the token itself stays out of the logs.
    info!(
        bot_token_fp = %secrets::token_fingerprint(&settings.telegram.bot_token),
        "configuration loaded"
    );

    let db = quip_db::connect(&settings.database_url).await?;
    quip_db::ensure_schema(&db).await?;

    let telegram = TelegramClient::new(
        &settings.telegram.api_base,
        &settings.telegram.bot_token,
        settings.telegram.timeout_secs,
    )?;
    let ai = AiClient::new(&settings.ai)?;

    let engine = Engine {
        db: db.clone(),
        telegram: telegram.clone(),
        ai: ai.clone(),
        settings: settings.clone(),
    };

    let state = AppState::new(db, settings.clone(), telegram, ai, engine);

    // Registration talks to Telegram and must not block readiness; the
    // health endpoint reports how it went.
    tokio::spawn(register_webhook(state.clone()));

    let app = Router::new()
        .merge(routes::router(state.clone()))
        .layer(axum::middleware::from_fn(middleware::request_id::request_id));

    let addr: SocketAddr = settings.api_bind.parse()?;
    info!(%addr, "starting api");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn register_webhook(state: AppState) {
    let url = state.settings.telegram.webhook_url();
    match state
        .telegram
        .set_webhook(&url, &state.settings.telegram.webhook_secret_token)
        .await
    {
        Ok(_) => {
            state.webhook.record_success();
            info!("telegram webhook registered");
        }
        Err(err) => {
            state.webhook.record_failure(err.to_string());
            error!(error = %err, "telegram webhook registration failed");
        }
    }
}
