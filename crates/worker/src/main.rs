//! Scheduler binary: a cancellable periodic loop that runs one poll
//! decision pass per tick. All correctness lives in the storage guards, so
//! this process can restart, overlap a redeploy, or run beside the manual
//! trigger without special care.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use quip_ai::AiClient;
use quip_core::config::Settings;
use quip_poll::Engine;
use quip_telegram::TelegramClient;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    let settings = Arc::new(Settings::from_env()?);

    let db = quip_db::connect(&settings.database_url).await?;
    quip_db::ensure_schema(&db).await?;

    let telegram = TelegramClient::new(
        &settings.telegram.api_base,
        &settings.telegram.bot_token,
        settings.telegram.timeout_secs,
    )?;
    let ai = AiClient::new(&settings.ai)?;

    let engine = Engine {
        db,
        telegram,
        ai,
        settings: settings.clone(),
    };

    let tick_deadline = Duration::from_secs(settings.scheduler.tick_deadline_secs);
    let mut ticker = tokio::time::interval(Duration::from_secs(settings.scheduler.tick_secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        tick_secs = settings.scheduler.tick_secs,
        channels = settings.poll.channel_ids.len(),
        "scheduler starting"
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if tokio::time::timeout(tick_deadline, engine.run_tick()).await.is_err() {
                    warn!("tick exceeded deadline, remaining channels postponed to next tick");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                break;
            }
        }
    }

    Ok(())
}
