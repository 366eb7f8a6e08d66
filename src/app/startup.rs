//! Application startup
//!
//! Parses arguments, loads configuration, starts logging and runs the scan
//! pipeline until a termination signal arrives.

use crate::app::cli::Args;
use crate::app::config::{self, Settings};
use crate::app::error::AppError;
use crate::backend::api::{create_backend, RadioBackend};
use crate::core::error_handling::log_error_with_context;
use crate::core::logging::init_logging;
use crate::core::pool::WorkerPool;
use crate::core::shutdown::ShutdownCoordinator;
use crate::graph::api::SightingRecorder;
use crate::notifications::api::{EventBus, LogSink, MqttPublisher};
use crate::registry::api::{
    DeviceCategory, DeviceRegistry, DeviceStore, Page, RegistryResult, SqliteDeviceStore,
};
use crate::scanner::api::{ScanError, ScannerManager};
use crate::vendor::api::{HttpVendorLookup, VendorResolver};
use crate::zones::api::ZoneTracker;
use clap::Parser;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use strum::IntoEnumIterator;

/// Run the application and return the process exit code
pub fn startup() -> i32 {
    let args = Args::parse();

    let settings = match load_settings(&args) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    let log_format = settings.log_format().unwrap_or_default();
    let log_file = settings
        .logging
        .file
        .as_ref()
        .map(|path| path.to_string_lossy().to_string());
    if let Err(e) = init_logging(
        Some(settings.logging.level.as_str()),
        log_format,
        log_file.as_deref(),
        args.use_color(),
    ) {
        eprintln!("Error: cannot start logging: {}", e);
        return 1;
    }

    log::info!(
        "bleradar {} ({} built {}) starting",
        env!("CARGO_PKG_VERSION"),
        crate::GIT_HASH,
        crate::BUILD_TIME
    );

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            log::error!("FATAL: cannot start async runtime: {}", e);
            return 1;
        }
    };

    let result = runtime.block_on(ShutdownCoordinator::guard(|shutdown| {
        run(settings, shutdown)
    }));

    match result {
        Ok(()) => 0,
        Err(e) => {
            log_error_with_context(&e, "Running the scan pipeline");
            1
        }
    }
}

fn load_settings(args: &Args) -> Result<Settings, AppError> {
    let mut settings = config::load(args.config.as_deref())?;
    args.apply_to(&mut settings);
    settings.validate()?;
    Ok(settings)
}

fn open_store(settings: &Settings) -> RegistryResult<Arc<dyn DeviceStore>> {
    let store = if settings.is_in_memory() {
        log::info!("Device registry kept in memory for this run");
        SqliteDeviceStore::in_memory()?
    } else {
        let path = Path::new(&settings.registry.database);
        log::info!("Device registry at {}", path.display());
        SqliteDeviceStore::open(path)?
    };
    Ok(Arc::new(store))
}

fn vendor_resolver(settings: &Settings, pool: WorkerPool) -> Result<VendorResolver, AppError> {
    let vendor = &settings.vendor;
    let mut resolver = VendorResolver::new(pool, vendor.memo_capacity);

    if vendor.external_lookup {
        let lookup = HttpVendorLookup::new(&vendor.lookup_url, vendor.lookup_timeout_secs)?;
        resolver = resolver.with_lookup(Arc::new(lookup));
        log::info!("External vendor lookup enabled via {}", vendor.lookup_url);
    }

    match &vendor.override_file {
        Some(path) if path.exists() => {
            resolver.load_overrides(path)?;
        }
        Some(path) => log::debug!("No vendor override file at {}", path.display()),
        None => {}
    }
    Ok(resolver)
}

/// Create every configured backend that can start
///
/// A backend that fails is logged and left out; the run only fails when
/// none is left.
async fn create_backends(settings: &Settings) -> Result<Vec<Arc<dyn RadioBackend>>, AppError> {
    let options = settings.backend_options();
    let mut backends = Vec::with_capacity(settings.scanner.backends.len());
    let mut last_error = None;

    for name in &settings.scanner.backends {
        match create_backend(name, &options).await {
            Ok(backend) => backends.push(backend),
            Err(e) => {
                log_error_with_context(&e, &format!("Creating radio backend '{}'", name));
                last_error = Some(e);
            }
        }
    }

    if backends.is_empty() {
        let error = last_error.unwrap_or_else(|| ScanError::Configuration {
            message: "no radio backend configured".to_string(),
        });
        return Err(error.into());
    }
    Ok(backends)
}

/// Wire the pipeline together and scan until shutdown
pub async fn run(settings: Settings, shutdown: ShutdownCoordinator) -> Result<(), AppError> {
    let pool = WorkerPool::new(settings.scanner.pool_size);
    let registry = Arc::new(DeviceRegistry::new(
        open_store(&settings)?,
        pool.clone(),
        settings.registry_settings(),
    ));
    let vendors = Arc::new(vendor_resolver(&settings, pool.clone())?);
    let zones = Arc::new(ZoneTracker::new(
        settings.zone_map()?,
        settings.zones.movement_window,
    ));

    let backends = create_backends(&settings).await?;

    let bus = Arc::new(
        EventBus::new(settings.events.subscriber_queue, settings.events.sink_queue)
            .with_drain_timeout(Duration::from_secs(settings.scanner.grace_period_secs)),
    );
    if settings.events.log_events {
        bus.register_sink(Arc::new(LogSink))?;
    }
    let sightings = Arc::new(SightingRecorder::new(settings.events.sighting_capacity));
    bus.register_sink(sightings.clone())?;
    if settings.mqtt.enabled {
        match MqttPublisher::start(&settings.mqtt_settings()) {
            Ok(publisher) => bus.register_sink(Arc::new(publisher))?,
            Err(e) => {
                bus.shutdown().await;
                return Err(e.into());
            }
        }
    }

    let mut manager = ScannerManager::new(
        registry.clone(),
        vendors,
        zones.clone(),
        bus.clone(),
        pool.clone(),
        settings.scanner_settings(),
    );
    for backend in backends {
        manager.add_backend(backend);
    }

    let run_result = manager.run(shutdown).await;
    // Make sure sinks are drained even when the run failed to start
    bus.shutdown().await;
    run_result?;

    report(&settings, &registry, &zones, &sightings).await?;
    pool.close();
    Ok(())
}

async fn report(
    settings: &Settings,
    registry: &DeviceRegistry,
    zones: &ZoneTracker,
    sightings: &SightingRecorder,
) -> RegistryResult<()> {
    for (zone, count) in zones.statistics() {
        log::info!("Zone {:<12} {} device(s)", zone, count);
    }

    let mut categories: BTreeMap<&'static str, usize> =
        DeviceCategory::iter().map(|c| (c.name(), 0)).collect();
    let mut page = Page::first(settings.registry.page_size);
    loop {
        let records = registry.list(page).await?;
        for record in &records {
            *categories.entry(record.category().name()).or_insert(0) += 1;
        }
        if records.len() < page.limit {
            break;
        }
        page = page.next();
    }
    let total: usize = categories.values().sum();
    log::info!("{} device(s) known", total);
    for (category, count) in categories.into_iter().filter(|(_, n)| *n > 0) {
        log::info!("  {:<12} {}", category, count);
    }

    let window = chrono::Duration::seconds(settings.graph.window_secs as i64);
    let graph = sightings.graph(window);
    log::info!(
        "{} device(s) seen together with another within {}s",
        graph.len(),
        settings.graph.window_secs
    );
    Ok(())
}
