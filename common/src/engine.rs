// Engine: owns the three background loops of one process

use crate::invoker::TriggerInvoker;
use crate::scheduler::CronScheduler;
use crate::worker::CapabilityCache;
use futures::future::join_all;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

pub struct Engine {
    scheduler: Arc<CronScheduler>,
    invoker: Arc<TriggerInvoker>,
    capabilities: Arc<CapabilityCache>,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl Engine {
    pub fn new(
        scheduler: CronScheduler,
        invoker: TriggerInvoker,
        capabilities: CapabilityCache,
    ) -> Self {
        Self {
            scheduler: Arc::new(scheduler),
            invoker: Arc::new(invoker),
            capabilities: Arc::new(capabilities),
            tasks: Vec::new(),
        }
    }

    /// Spawn the scheduler, invoker and capability loops
    pub fn start(&mut self) {
        if !self.tasks.is_empty() {
            return;
        }

        let scheduler = self.scheduler.clone();
        let invoker = self.invoker.clone();
        let capabilities = self.capabilities.clone();

        self.tasks = vec![
            ("scheduler", tokio::spawn(async move { scheduler.start().await })),
            ("invoker", tokio::spawn(async move { invoker.start().await })),
            (
                "capabilities",
                tokio::spawn(async move { capabilities.start().await }),
            ),
        ];

        info!("Engine loops started");
    }

    /// Scheduler health: `"OK"` or a warning-decorated diagnostic
    pub fn status(&self) -> String {
        self.scheduler.status().status()
    }

    /// Stop every loop and wait for the in-flight iteration of each to finish
    pub async fn shutdown(&mut self) {
        self.scheduler.stop();
        self.invoker.stop();
        self.capabilities.stop();

        let (names, tasks): (Vec<_>, Vec<_>) = self.tasks.drain(..).unzip();
        for (name, result) in names.into_iter().zip(join_all(tasks).await) {
            if let Err(e) = result {
                error!(task = name, error = %e, "Engine loop terminated abnormally");
            }
        }

        info!("Engine stopped");
    }
}
