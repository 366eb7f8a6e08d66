//! Shutdown coordination
//!
//! One coordinator is created per run. Scan workers, the sweep task and the
//! event sinks all race their suspension points against [`ShutdownCoordinator::cancelled`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Broadcasts a single stop request to every component
#[derive(Clone)]
pub struct ShutdownCoordinator {
    shutdown_tx: broadcast::Sender<()>,
    shutdown_requested: Arc<AtomicBool>,
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(8);
        Self {
            shutdown_tx,
            shutdown_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Request shutdown; repeated calls are harmless
    pub fn trigger_shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::Release);
        let _ = self.shutdown_tx.send(());
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::Acquire)
    }

    /// Resolves once shutdown has been requested, including before this call
    pub async fn cancelled(&self) {
        let mut rx = self.shutdown_tx.subscribe();
        if self.is_shutdown_requested() {
            return;
        }
        // Lagged or closed both mean a signal was sent
        let _ = rx.recv().await;
    }

    /// Run a future with signal handlers wired to a fresh coordinator
    pub async fn guard<F, Fut, R, E>(future_fn: F) -> Result<R, E>
    where
        F: FnOnce(Self) -> Fut,
        Fut: std::future::Future<Output = Result<R, E>>,
    {
        let coordinator = Self::new();
        install_signal_handlers(&coordinator);
        future_fn(coordinator).await
    }
}

/// First signal requests a graceful stop, a second one exits immediately
fn install_signal_handlers(coordinator: &ShutdownCoordinator) {
    #[cfg(unix)]
    {
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }

        use std::sync::atomic::AtomicUsize;
        use tokio::signal::unix::{signal, SignalKind};

        let signal_count = Arc::new(AtomicUsize::new(0));
        let kinds = [
            SignalKind::interrupt(),
            SignalKind::terminate(),
            SignalKind::hangup(),
        ];

        for kind in kinds {
            let coordinator = coordinator.clone();
            let counter = signal_count.clone();
            tokio::spawn(async move {
                let Ok(mut stream) = signal(kind) else {
                    return;
                };
                while stream.recv().await.is_some() {
                    let previous = counter.fetch_add(1, Ordering::AcqRel);
                    if previous >= 1 {
                        log::warn!("Second signal received; exiting without cleanup");
                        std::process::exit(130);
                    }
                    log::info!("Signal received; stopping scanners");
                    coordinator.trigger_shutdown();
                }
            });
        }
    }

    #[cfg(not(unix))]
    {
        let coordinator = coordinator.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                coordinator.trigger_shutdown();
            }
        });
    }
}
