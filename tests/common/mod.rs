//! Shared helpers for integration tests

#![allow(dead_code)]

use bleradar::backend::api::{create_backend, BackendOptions, RadioBackend};
use bleradar::core::pool::WorkerPool;
use bleradar::core::retry::RetryPolicy;
use bleradar::notifications::api::EventBus;
use bleradar::registry::api::{DeviceRegistry, DeviceStore, RegistrySettings};
use bleradar::scanner::api::{ScannerManager, ScannerSettings};
use bleradar::vendor::api::VendorResolver;
use bleradar::zones::api::ZoneTracker;
use std::sync::Arc;
use std::time::Duration;

/// Command line that prints `lines` and exits, like a sniffer that stopped
pub fn printing_command(lines: &[&str]) -> Vec<String> {
    let mut script = String::from("printf '");
    for line in lines {
        script.push_str(line);
        script.push_str("\\n");
    }
    script.push('\'');
    vec!["sh".to_string(), "-c".to_string(), script]
}

pub async fn sniffer(tool: &str, lines: &[&str]) -> Arc<dyn RadioBackend> {
    let mut options = BackendOptions::default();
    options
        .commands
        .insert(tool.to_string(), printing_command(lines));
    create_backend(tool, &options).await.unwrap()
}

/// Settings with a long pause between cycles so each sniffer runs once
pub fn single_cycle_settings() -> ScannerSettings {
    ScannerSettings {
        workers: 1,
        interval: Duration::from_secs(300),
        grace_period: Duration::from_secs(2),
        sweep_interval: Duration::from_secs(3600),
        retry: RetryPolicy {
            max_attempts: 2,
            delay: Duration::from_millis(1),
            backoff: 1,
            max_delay: Duration::from_millis(5),
        },
    }
}

pub fn manager(store: Arc<dyn DeviceStore>, bus: Arc<EventBus>) -> ScannerManager {
    let pool = WorkerPool::new(4);
    let registry = Arc::new(DeviceRegistry::new(
        store,
        pool.clone(),
        RegistrySettings::default(),
    ));
    ScannerManager::new(
        registry,
        Arc::new(VendorResolver::new(pool.clone(), 64)),
        Arc::new(ZoneTracker::default()),
        bus,
        pool,
        single_cycle_settings(),
    )
}

/// Poll `check` until it holds or the deadline passes
pub async fn wait_until<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}
