//! Worker lifecycle and orchestration

use super::helpers::{
    manager_with, packet, test_manager, test_settings, MisconfiguredBackend, ScriptedBackend,
    WedgedBackend,
};
use crate::backend::api::RawPacket;
use crate::core::shutdown::ShutdownCoordinator;
use crate::notifications::api::EventFilter;
use crate::registry::api::RegistrySettings;
use crate::scanner::api::{ScanError, ScannerSettings};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

async fn wait_until(condition: impl Fn() -> bool) {
    timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn test_run_without_backends_is_a_configuration_error() {
    let manager = test_manager();
    let result = manager.run(ShutdownCoordinator::new()).await;
    assert!(matches!(result, Err(ScanError::Configuration { .. })));
}

#[tokio::test]
async fn test_packets_flow_to_registry_and_subscribers() {
    let mut manager = test_manager();
    let backend = Arc::new(ScriptedBackend::new(
        "scripted",
        vec![
            packet("00:00:00:00:00:01", -50, 0),
            packet("00:00:00:00:00:02", -60, 1),
            packet("00:00:00:00:00:01", -52, 2),
        ],
    ));
    manager.add_backend(backend.clone());
    let mut events = manager
        .bus()
        .subscribe("test", EventFilter::All, "manager test")
        .unwrap();

    let manager = Arc::new(manager);
    let shutdown = ShutdownCoordinator::new();
    let run = tokio::spawn({
        let manager = manager.clone();
        let shutdown = shutdown.clone();
        async move { manager.run(shutdown).await }
    });

    let mut addresses = Vec::new();
    for _ in 0..3 {
        let event = timeout(Duration::from_secs(5), events.recv())
            .await
            .unwrap()
            .unwrap();
        addresses.push(event.address);
    }
    assert_eq!(addresses, vec!["000000000001", "000000000002", "000000000001"]);

    shutdown.trigger_shutdown();
    let summary = run.await.unwrap().unwrap();
    assert_eq!(summary.observations, 3);
    assert_eq!(summary.cycles, 1);
    assert_eq!(backend.closed(), 1);

    let record = manager.registry().get("000000000001").await.unwrap().unwrap();
    assert_eq!(record.rssi_history().len(), 2);
    assert_eq!(manager.registry().count().await.unwrap(), 2);
    // Bus is drained and closed with the run
    assert!(events.recv().await.is_none());
}

#[tokio::test]
async fn test_configuration_failure_stops_only_that_worker() {
    let mut manager = test_manager();
    let broken = Arc::new(MisconfiguredBackend {
        opened: AtomicUsize::new(0),
    });
    let good = Arc::new(
        ScriptedBackend::new("good", vec![packet("00:00:00:00:00:09", -40, 0)]).endless(),
    );
    manager.add_backend(broken.clone());
    manager.add_backend(good.clone());
    let mut events = manager
        .bus()
        .subscribe("test", EventFilter::All, "manager test")
        .unwrap();

    let manager = Arc::new(manager);
    let shutdown = ShutdownCoordinator::new();
    let run = tokio::spawn({
        let manager = manager.clone();
        let shutdown = shutdown.clone();
        async move { manager.run(shutdown).await }
    });

    let event = timeout(Duration::from_secs(5), events.recv()).await.unwrap().unwrap();
    assert_eq!(event.address, "000000000009");
    assert!(!shutdown.is_shutdown_requested());

    shutdown.trigger_shutdown();
    run.await.unwrap().unwrap();
    assert_eq!(broken.opened.load(Ordering::SeqCst), 1);
    assert_eq!(good.closed(), 1);
}

#[tokio::test]
async fn test_run_ends_when_every_worker_has_stopped() {
    let mut manager = test_manager();
    manager.add_backend(Arc::new(MisconfiguredBackend {
        opened: AtomicUsize::new(0),
    }));

    let shutdown = ShutdownCoordinator::new();
    let summary = timeout(Duration::from_secs(5), manager.run(shutdown.clone()))
        .await
        .expect("run should end without a signal")
        .unwrap();

    assert_eq!(summary.cycles, 0);
    assert!(shutdown.is_shutdown_requested());
}

#[tokio::test]
async fn test_transient_open_failures_are_retried() {
    let mut manager = test_manager();
    let io = || ScanError::Io {
        message: "sniffer exited during start-up".to_string(),
    };
    let backend = Arc::new(
        ScriptedBackend::new("flaky", vec![packet("00:00:00:00:00:03", -40, 0)])
            .endless()
            .failing_first(vec![io(), io()]),
    );
    manager.add_backend(backend.clone());
    let mut events = manager
        .bus()
        .subscribe("test", EventFilter::All, "manager test")
        .unwrap();

    let manager = Arc::new(manager);
    let shutdown = ShutdownCoordinator::new();
    let run = tokio::spawn({
        let manager = manager.clone();
        let shutdown = shutdown.clone();
        async move { manager.run(shutdown).await }
    });

    assert!(timeout(Duration::from_secs(5), events.recv()).await.unwrap().is_some());
    assert_eq!(backend.opened(), 3);

    shutdown.trigger_shutdown();
    run.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_shutdown_closes_an_idle_source() {
    let mut manager = test_manager();
    let backend = Arc::new(ScriptedBackend::new("idle", Vec::new()).endless());
    manager.add_backend(backend.clone());

    let manager = Arc::new(manager);
    let shutdown = ShutdownCoordinator::new();
    let run = tokio::spawn({
        let manager = manager.clone();
        let shutdown = shutdown.clone();
        async move { manager.run(shutdown).await }
    });

    wait_until(|| backend.opened() == 1).await;
    shutdown.trigger_shutdown();

    timeout(Duration::from_secs(5), run).await.unwrap().unwrap().unwrap();
    assert_eq!(backend.closed(), 1);
}

#[tokio::test]
async fn test_wedged_worker_is_aborted_after_grace_period() {
    let settings = ScannerSettings {
        grace_period: Duration::from_millis(100),
        ..test_settings()
    };
    let mut manager = manager_with(settings, RegistrySettings::default());
    let backend = Arc::new(WedgedBackend::default());
    manager.add_backend(backend.clone());

    let shutdown = ShutdownCoordinator::new();
    let run = tokio::spawn({
        let shutdown = shutdown.clone();
        async move { manager.run(shutdown).await }
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown.trigger_shutdown();

    timeout(Duration::from_secs(5), run).await.unwrap().unwrap().unwrap();
    // The aborted worker dropped its source, which is what kills a child process
    assert_eq!(backend.dropped.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_exhausted_source_is_reopened_after_interval() {
    let settings = ScannerSettings {
        interval: Duration::from_millis(10),
        ..test_settings()
    };
    let mut manager = manager_with(settings, RegistrySettings::default());
    let backend = Arc::new(ScriptedBackend::new(
        "short",
        vec![RawPacket::unparsed(super::helpers::at(0), "noise")],
    ));
    manager.add_backend(backend.clone());

    let manager = Arc::new(manager);
    let shutdown = ShutdownCoordinator::new();
    let run = tokio::spawn({
        let manager = manager.clone();
        let shutdown = shutdown.clone();
        async move { manager.run(shutdown).await }
    });

    wait_until(|| backend.opened() >= 3).await;
    shutdown.trigger_shutdown();
    let summary = run.await.unwrap().unwrap();

    assert!(summary.cycles >= 3);
    assert_eq!(summary.malformed, summary.packets);
    assert_eq!(summary.observations, 0);
    assert_eq!(backend.closed(), backend.opened());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_workers_lose_no_updates() {
    let settings = ScannerSettings {
        workers: 4,
        ..test_settings()
    };
    let mut manager = manager_with(
        settings,
        RegistrySettings {
            history_depth: 1000,
            ..RegistrySettings::default()
        },
    );
    let packets: Vec<RawPacket> = (0..25)
        .map(|i| packet("AA:BB:CC:DD:EE:FF", -60, i))
        .collect();
    let backend = Arc::new(ScriptedBackend::new("shared", packets).endless());
    manager.add_backend(backend.clone());
    let mut events = manager
        .bus()
        .subscribe("test", EventFilter::All, "manager test")
        .unwrap();

    let manager = Arc::new(manager);
    let shutdown = ShutdownCoordinator::new();
    let run = tokio::spawn({
        let manager = manager.clone();
        let shutdown = shutdown.clone();
        async move { manager.run(shutdown).await }
    });

    for _ in 0..100 {
        timeout(Duration::from_secs(5), events.recv()).await.unwrap().unwrap();
    }
    shutdown.trigger_shutdown();
    let summary = run.await.unwrap().unwrap();

    assert_eq!(summary.observations, 100);
    let record = manager.registry().get("AABBCCDDEEFF").await.unwrap().unwrap();
    assert_eq!(record.rssi_history().len(), 100);
    assert_eq!(backend.opened(), 4);
}
