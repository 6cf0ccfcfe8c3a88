// Bootstrap utilities for binary initialization

use crate::config::Settings;
use crate::cache::RedisPool;
use crate::db::DbPool;
use crate::queue::NatsClient;
use anyhow::{Context, Result};
use tracing::info;

/// Load settings from `config/` and the environment, then validate them
pub fn load_settings() -> Result<Settings> {
    let settings = Settings::load().context("Failed to load configuration")?;
    settings
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;
    Ok(settings)
}

/// Initialize database pool
///
/// # Errors
/// Returns error if database pool initialization fails
#[tracing::instrument(skip(settings))]
pub async fn init_database_pool(settings: &Settings) -> Result<DbPool> {
    info!("Initializing database pool");

    let db_pool = DbPool::new(&settings.database)
        .await
        .context("Failed to initialize database pool")?;

    info!("Database pool initialized");
    Ok(db_pool)
}

/// Initialize Redis pool backing the cache, the trigger queue and the locks
///
/// # Errors
/// Returns error if Redis pool initialization fails
#[tracing::instrument(skip(settings))]
pub async fn init_redis_pool(settings: &Settings) -> Result<RedisPool> {
    info!("Initializing Redis pool");

    let redis_pool = RedisPool::connect(&settings.redis)
        .await
        .context("Failed to initialize Redis pool")?;
    redis_pool
        .ping()
        .await
        .context("Redis health check failed")?;

    info!("Redis pool initialized");
    Ok(redis_pool)
}

/// Initialize NATS client and make sure the run stream exists
///
/// # Errors
/// Returns error if the connection or the stream setup fails
#[tracing::instrument(skip(settings))]
pub async fn init_nats_client(settings: &Settings) -> Result<NatsClient> {
    info!("Initializing NATS client");

    let nats_client = NatsClient::new(settings.nats.clone())
        .await
        .context("Failed to initialize NATS client")?;

    nats_client
        .initialize_stream()
        .await
        .context("Failed to initialize NATS stream")?;

    info!(stream = %settings.nats.stream_name, "NATS client initialized");
    Ok(nats_client)
}
