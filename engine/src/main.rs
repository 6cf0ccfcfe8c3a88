// Engine binary entry point

use anyhow::Result;
use common::bootstrap;
use common::cache::{Cache, RedisCache};
use common::db::repositories::{ListenerRepository, ScheduleRepository, WorkerModelRepository};
use common::engine::Engine;
use common::invoker::{InvokerConfig, InvokerDeps, TriggerInvoker};
use common::lock::{DistributedLock, RedLock};
use common::queue::{NatsPipelineRunner, PipelineRunner};
use common::scheduler::{CronScheduler, SchedulerConfig};
use common::telemetry;
use common::worker::{CapabilityCache, CapabilityLoaderConfig};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = bootstrap::load_settings()?;

    telemetry::init_logging(
        &settings.observability.log_level,
        settings.observability.tracing_endpoint.as_deref(),
    )?;
    telemetry::init_metrics(settings.observability.metrics_port)?;

    info!("Starting cdflow engine");

    let db_pool = bootstrap::init_database_pool(&settings).await?;
    let redis_pool = bootstrap::init_redis_pool(&settings).await?;
    let nats_client = bootstrap::init_nats_client(&settings).await?;

    let cache = Arc::new(RedisCache::new(redis_pool.clone())) as Arc<dyn Cache>;
    let lock = Arc::new(RedLock::new(redis_pool)) as Arc<dyn DistributedLock>;
    let runner = Arc::new(NatsPipelineRunner::new(nats_client)) as Arc<dyn PipelineRunner>;
    let listeners = Arc::new(ListenerRepository::new(db_pool.clone()));

    let scheduler = CronScheduler::new(
        SchedulerConfig::from(&settings.scheduler),
        Arc::new(ScheduleRepository::new(db_pool.clone())),
    );

    let invoker = TriggerInvoker::new(
        InvokerConfig::from(&settings.invoker),
        InvokerDeps {
            cache: cache.clone(),
            availability: Arc::new(db_pool.clone()),
            listeners: listeners.clone(),
            projects: listeners,
            runner,
        },
    );

    let capabilities = CapabilityCache::new(
        CapabilityLoaderConfig::from(&settings.capabilities),
        cache,
        lock,
        Arc::new(WorkerModelRepository::new(db_pool.clone())),
    );

    let mut engine = Engine::new(scheduler, invoker, capabilities);
    engine.start();

    wait_for_shutdown_signal().await;
    info!("Shutdown signal received, stopping engine");

    engine.shutdown().await;
    db_pool.close().await;
    telemetry::shutdown_tracer();

    info!("cdflow engine stopped");
    Ok(())
}

/// Resolve on SIGINT or, on Unix, SIGTERM
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
