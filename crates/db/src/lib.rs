pub mod models;
pub mod queries;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// Both tables are idempotently ensured at startup; there is no separate
/// migrations tree for a schema this small.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS posts (
    id BIGSERIAL PRIMARY KEY,
    channel_id BIGINT NOT NULL,
    message_id BIGINT NOT NULL,
    post_date DATE NOT NULL,
    photo_file_id TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    UNIQUE (channel_id, message_id)
);

CREATE INDEX IF NOT EXISTS idx_posts_channel_date ON posts(channel_id, post_date);

CREATE TABLE IF NOT EXISTS daily_polls (
    channel_id BIGINT NOT NULL,
    poll_date DATE NOT NULL,
    scheduled_at TIMESTAMPTZ NOT NULL,
    posted_at TIMESTAMPTZ,
    skipped_at TIMESTAMPTZ,
    poll_message_id BIGINT,
    chosen_post_message_id BIGINT,
    question TEXT,
    options JSONB,
    skip_reason TEXT,
    last_error TEXT,
    last_error_at TIMESTAMPTZ,
    PRIMARY KEY (channel_id, poll_date)
);
"#;

pub async fn connect(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
}

pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA_SQL).execute(pool).await?;
    info!("database schema ensured");
    Ok(())
}
