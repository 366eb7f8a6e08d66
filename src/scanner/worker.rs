//! Scan worker loop
//!
//! open backend → process packets until the sequence ends → close → wait for
//! the interval → reopen. Every wait races the shutdown signal.

use crate::backend::api::{PacketSource, RadioBackend};
use crate::core::error_handling::{log_dropped_work, log_error_with_context};
use crate::core::retry::retry_async;
use crate::core::shutdown::ShutdownCoordinator;
use crate::scanner::error::ScanError;
use crate::scanner::pipeline::{Ingested, Pipeline};
use crate::scanner::types::{ScannerSettings, MALFORMED_WARN_THRESHOLD};
use std::sync::Arc;

/// How a drained packet source ended
enum CycleEnd {
    Exhausted,
    Shutdown,
}

pub(crate) struct ScanWorker {
    label: String,
    backend: Arc<dyn RadioBackend>,
    pipeline: Pipeline,
    settings: ScannerSettings,
    shutdown: ShutdownCoordinator,
}

impl ScanWorker {
    pub(crate) fn new(
        worker_id: usize,
        backend: Arc<dyn RadioBackend>,
        pipeline: Pipeline,
        settings: ScannerSettings,
        shutdown: ShutdownCoordinator,
    ) -> Self {
        Self {
            label: format!("{}#{}", backend.name(), worker_id),
            backend,
            pipeline,
            settings,
            shutdown,
        }
    }

    pub(crate) async fn run(self) {
        log::info!("Scan worker {} started", self.label);

        while !self.shutdown.is_shutdown_requested() {
            // A source that did open must reach `close`, so the open wins ties
            let opened = tokio::select! {
                biased;
                result = retry_async(
                    &self.label,
                    self.settings.retry.clone(),
                    ScanError::is_transient,
                    || self.backend.scan(),
                ) => result,
                _ = self.shutdown.cancelled() => break,
            };

            match opened {
                Ok(mut source) => {
                    self.pipeline.statistics().record_cycle();
                    log::debug!("Scan worker {} cycle started", self.label);
                    let end = self.drain(source.as_mut()).await;
                    source.close().await;
                    if matches!(end, CycleEnd::Shutdown) {
                        break;
                    }
                    log::debug!("Scan worker {} cycle finished", self.label);
                }
                Err(e @ ScanError::Configuration { .. }) => {
                    log_error_with_context(&e, &format!("Starting backend {}", self.label));
                    break;
                }
                Err(e) => {
                    log::warn!("Scan worker {} could not start: {}", self.label, e);
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.settings.interval) => {}
                _ = self.shutdown.cancelled() => break,
            }
        }

        log::info!("Scan worker {} stopped", self.label);
    }

    async fn drain(&self, source: &mut dyn PacketSource) -> CycleEnd {
        let mut malformed_run = 0usize;

        loop {
            let packet = tokio::select! {
                packet = source.next_packet() => packet,
                _ = self.shutdown.cancelled() => return CycleEnd::Shutdown,
            };
            let Some(packet) = packet else {
                return CycleEnd::Exhausted;
            };

            let result = tokio::select! {
                result = self.pipeline.ingest(packet) => result,
                _ = self.shutdown.cancelled() => return CycleEnd::Shutdown,
            };

            match result {
                Ok(Ingested::Event(_)) => malformed_run = 0,
                Ok(Ingested::Malformed) => {
                    malformed_run += 1;
                    if malformed_run == MALFORMED_WARN_THRESHOLD {
                        log::warn!(
                            "Scan worker {} received {} consecutive packets without address or RSSI; \
                             check the sniffer output format",
                            self.label,
                            malformed_run
                        );
                    }
                }
                Err(e) => {
                    self.pipeline.statistics().record_dropped();
                    log_dropped_work(&e, "observation");
                }
            }
        }
    }
}
