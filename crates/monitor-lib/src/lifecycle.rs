//! Monitoring on/off switch and process shutdown signal
//!
//! Background loops are spawned once for the lifetime of the process. The
//! monitoring flag only decides whether an iteration does real work or
//! idles; it never spawns or kills a task. Shutdown is a separate broadcast
//! that ends every loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::info;

/// Handle to the process-wide monitoring flag
///
/// Cheap to clone; all clones share the same flag and shutdown channel.
#[derive(Debug, Clone)]
pub struct LifecycleController {
    enabled: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

impl LifecycleController {
    pub fn new(enabled: bool) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            enabled: Arc::new(AtomicBool::new(enabled)),
            shutdown_tx,
        }
    }

    /// Turn monitoring on. Returns `true` if the flag changed.
    pub fn enable(&self) -> bool {
        let changed = !self.enabled.swap(true, Ordering::AcqRel);
        if changed {
            info!(event = "monitoring_toggled", enabled = true, "Monitoring enabled");
        }
        changed
    }

    /// Turn monitoring off. Returns `true` if the flag changed.
    pub fn disable(&self) -> bool {
        let changed = self.enabled.swap(false, Ordering::AcqRel);
        if changed {
            info!(event = "monitoring_toggled", enabled = false, "Monitoring disabled");
        }
        changed
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Subscribe a loop to the shutdown signal
    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Ask every subscribed loop to exit
    pub fn shutdown(&self) {
        // No receivers just means nothing is running.
        let _ = self.shutdown_tx.send(());
    }
}

impl Default for LifecycleController {
    fn default() -> Self {
        Self::new(false)
    }
}
