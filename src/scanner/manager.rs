//! Scanner Manager
//!
//! Owns the shared pipeline state (registry, vendor resolver, zone tracker,
//! event bus and worker pool) and runs every configured backend with its own
//! scan workers until shutdown.

use crate::backend::api::RadioBackend;
use crate::core::pool::WorkerPool;
use crate::core::shutdown::ShutdownCoordinator;
use crate::notifications::api::EventBus;
use crate::registry::api::DeviceRegistry;
use crate::scanner::error::{ScanError, ScanResult};
use crate::scanner::pipeline::Pipeline;
use crate::scanner::types::{ScanStatistics, ScanSummary, ScannerSettings};
use crate::scanner::worker::ScanWorker;
use crate::vendor::api::VendorResolver;
use crate::zones::api::ZoneTracker;
use chrono::Utc;
use std::sync::Arc;
use tokio::task::JoinSet;

pub struct ScannerManager {
    backends: Vec<Arc<dyn RadioBackend>>,
    registry: Arc<DeviceRegistry>,
    vendors: Arc<VendorResolver>,
    zones: Arc<ZoneTracker>,
    bus: Arc<EventBus>,
    pool: WorkerPool,
    settings: ScannerSettings,
    statistics: Arc<ScanStatistics>,
}

impl ScannerManager {
    pub fn new(
        registry: Arc<DeviceRegistry>,
        vendors: Arc<VendorResolver>,
        zones: Arc<ZoneTracker>,
        bus: Arc<EventBus>,
        pool: WorkerPool,
        settings: ScannerSettings,
    ) -> Self {
        Self {
            backends: Vec::new(),
            registry,
            vendors,
            zones,
            bus,
            pool,
            settings,
            statistics: Arc::new(ScanStatistics::default()),
        }
    }

    pub fn add_backend(&mut self, backend: Arc<dyn RadioBackend>) {
        log::debug!("Backend '{}' added", backend.name());
        self.backends.push(backend);
    }

    pub fn backend_names(&self) -> Vec<String> {
        self.backends.iter().map(|b| b.name().to_string()).collect()
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    pub fn vendors(&self) -> &Arc<VendorResolver> {
        &self.vendors
    }

    pub fn zones(&self) -> &Arc<ZoneTracker> {
        &self.zones
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub fn statistics(&self) -> ScanSummary {
        self.statistics.snapshot()
    }

    /// Pipeline sharing this manager's state, for feeding packets directly
    pub fn pipeline(&self) -> Pipeline {
        Pipeline::new(
            self.registry.clone(),
            self.vendors.clone(),
            self.zones.clone(),
            self.bus.clone(),
            self.statistics.clone(),
        )
    }

    /// Run until shutdown is requested or every worker has stopped on its own
    ///
    /// Workers get `grace_period` to close their sources after the signal;
    /// stragglers are aborted and their sniffer processes are reaped in the
    /// background. The event bus is drained before returning.
    pub async fn run(&self, shutdown: ShutdownCoordinator) -> ScanResult<ScanSummary> {
        if self.backends.is_empty() {
            return Err(ScanError::Configuration {
                message: "no radio backend configured".to_string(),
            });
        }

        let workers_per_backend = self.settings.workers.max(1);
        log::info!(
            "Starting {} scan worker(s) for each of: {}",
            workers_per_backend,
            self.backend_names().join(", ")
        );

        if let Err(e) = self.registry.sweep(Utc::now()).await {
            log::warn!("Startup retention sweep failed: {}", e);
        }
        let sweeper = tokio::spawn(run_sweeps(
            self.registry.clone(),
            self.settings.sweep_interval,
            shutdown.clone(),
        ));

        let mut workers = JoinSet::new();
        for backend in &self.backends {
            for worker_id in 0..workers_per_backend {
                let worker = ScanWorker::new(
                    worker_id,
                    backend.clone(),
                    self.pipeline(),
                    self.settings.clone(),
                    shutdown.clone(),
                );
                workers.spawn(worker.run());
            }
        }

        tokio::select! {
            _ = shutdown.cancelled() => {
                log::info!("Stopping scan workers");
            }
            _ = async { while workers.join_next().await.is_some() {} } => {
                log::warn!("All scan workers have stopped");
                shutdown.trigger_shutdown();
            }
        }

        let grace = self.settings.grace_period;
        let drained = tokio::time::timeout(grace, async {
            while let Some(result) = workers.join_next().await {
                if let Err(e) = result {
                    if e.is_panic() {
                        log::error!("Scan worker panicked: {}", e);
                    }
                }
            }
        })
        .await;
        if drained.is_err() {
            log::warn!(
                "{} scan worker(s) still running after {:?}, aborting",
                workers.len(),
                grace
            );
            workers.shutdown().await;
            log::warn!(
                "Sniffer processes of aborted workers are killed without waiting; \
                 they are reaped in the background"
            );
        }

        sweeper.abort();
        let _ = sweeper.await;
        self.bus.shutdown().await;

        let summary = self.statistics.snapshot();
        log::info!("Scan finished: {}", summary);
        Ok(summary)
    }
}

async fn run_sweeps(
    registry: Arc<DeviceRegistry>,
    every: std::time::Duration,
    shutdown: ShutdownCoordinator,
) {
    let mut ticker = tokio::time::interval(every.max(std::time::Duration::from_secs(1)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately and the startup sweep already ran
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = registry.sweep(Utc::now()).await {
                    log::warn!("Retention sweep failed: {}", e);
                }
            }
            _ = shutdown.cancelled() => break,
        }
    }
}
