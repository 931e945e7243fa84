//! Sampler loop
//!
//! Each sampler runs one long-lived task. Every iteration checks the
//! monitoring flag first: when disabled it idles without touching the
//! source, when enabled it probes, publishes, and waits the configured
//! check interval.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::UsageProbe;
use crate::gauge::UsageGauge;
use crate::health::{sampler_component, HealthRegistry};
use crate::lifecycle::LifecycleController;
use crate::models::ResourceKind;

/// Pause between flag checks while monitoring is disabled
pub const DEFAULT_IDLE_INTERVAL: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone)]
pub struct SamplerConfig {
    /// Pause after each published sample
    pub check_interval: Duration,
    /// Pause between flag checks while disabled
    pub idle_interval: Duration,
}

impl SamplerConfig {
    pub fn new(check_interval: Duration) -> Self {
        Self {
            check_interval,
            idle_interval: DEFAULT_IDLE_INTERVAL,
        }
    }
}

#[derive(Debug, Default)]
struct LoopState {
    running: bool,
    stop_requested: bool,
}

struct SamplerInner {
    probe: Arc<dyn UsageProbe>,
    gauge: Arc<UsageGauge>,
    lifecycle: LifecycleController,
    health: HealthRegistry,
    config: SamplerConfig,
    state: Mutex<LoopState>,
    active_loops: AtomicUsize,
}

/// Handle to a resource sampler; clones share the same loop and gauge
#[derive(Clone)]
pub struct Sampler {
    inner: Arc<SamplerInner>,
}

impl Sampler {
    pub fn new(
        probe: Arc<dyn UsageProbe>,
        gauge: Arc<UsageGauge>,
        lifecycle: LifecycleController,
        health: HealthRegistry,
        config: SamplerConfig,
    ) -> Self {
        Self {
            inner: Arc::new(SamplerInner {
                probe,
                gauge,
                lifecycle,
                health,
                config,
                state: Mutex::new(LoopState::default()),
                active_loops: AtomicUsize::new(0),
            }),
        }
    }

    pub fn resource(&self) -> ResourceKind {
        self.inner.probe.resource()
    }

    /// Spawn the sampling loop unless one is already running
    ///
    /// Returns `None` when a loop is alive; a pending `stop` on that loop is
    /// cancelled so it keeps running.
    pub fn start(&self) -> Option<JoinHandle<()>> {
        {
            let mut state = self.inner.lock_state();
            if state.running {
                state.stop_requested = false;
                debug!(resource = %self.resource(), "Sampler already running");
                return None;
            }
            state.running = true;
            state.stop_requested = false;
        }

        let shutdown = self.inner.lifecycle.subscribe_shutdown();
        Some(tokio::spawn(self.inner.clone().run(shutdown)))
    }

    /// Ask the loop to exit after its current iteration
    pub fn stop(&self) {
        let mut state = self.inner.lock_state();
        if state.running {
            state.stop_requested = true;
        }
    }

    /// Most recently published usage percentage
    pub fn last_usage(&self) -> f64 {
        self.inner.gauge.get()
    }

    pub fn gauge(&self) -> Arc<UsageGauge> {
        self.inner.gauge.clone()
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock_state().running
    }

    /// Number of loop tasks currently alive for this sampler
    pub fn active_loops(&self) -> usize {
        self.inner.active_loops.load(Ordering::Acquire)
    }
}

/// Keeps `active_loops` accurate however the loop exits
struct ActiveLoop<'a>(&'a AtomicUsize);

impl<'a> ActiveLoop<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter)
    }
}

impl Drop for ActiveLoop<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

enum Exit {
    Stopped,
    Shutdown,
    SourceFailed,
}

impl SamplerInner {
    fn lock_state(&self) -> MutexGuard<'_, LoopState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Consume a pending stop request, releasing the running slot
    fn take_stop_request(&self) -> bool {
        let mut state = self.lock_state();
        if state.stop_requested {
            state.stop_requested = false;
            state.running = false;
            true
        } else {
            false
        }
    }

    async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let _active = ActiveLoop::enter(&self.active_loops);
        let kind = self.probe.resource();
        let component = sampler_component(kind);

        info!(
            resource = %kind,
            interval_ms = self.config.check_interval.as_millis() as u64,
            "Starting sampler loop"
        );
        self.health.set_healthy(component).await;

        let exit = self.iterate(kind, &mut shutdown).await;

        match exit {
            Exit::Stopped => info!(resource = %kind, "Sampler loop stopped"),
            Exit::Shutdown => {
                self.lock_state().running = false;
                info!(resource = %kind, "Shutting down sampler loop");
            }
            Exit::SourceFailed => {
                self.lock_state().running = false;
            }
        }
    }

    async fn iterate(&self, kind: ResourceKind, shutdown: &mut broadcast::Receiver<()>) -> Exit {
        loop {
            if self.take_stop_request() {
                return Exit::Stopped;
            }

            if !self.lifecycle.is_enabled() {
                if sleep_or_shutdown(self.config.idle_interval, shutdown).await {
                    return Exit::Shutdown;
                }
                continue;
            }

            let outcome = tokio::select! {
                outcome = self.probe.probe() => outcome,
                _ = shutdown.recv() => return Exit::Shutdown,
            };

            match outcome {
                // A probe that straddled a disable must not publish.
                Ok(Some(percent)) if self.lifecycle.is_enabled() => {
                    self.gauge.publish(percent);
                    debug!(resource = %kind, usage_percent = percent, "Published sample");
                }
                Ok(Some(_)) => {
                    debug!(resource = %kind, "Discarded sample taken across a disable");
                }
                Ok(None) => {
                    debug!(resource = %kind, "Degenerate sample, keeping previous value");
                }
                Err(e) => {
                    error!(
                        event = "sampler_failed",
                        resource = %kind,
                        error = %e,
                        "Counter source failed, sampler stopped"
                    );
                    self.health
                        .set_unhealthy(sampler_component(kind), e.to_string())
                        .await;
                    return Exit::SourceFailed;
                }
            }

            if sleep_or_shutdown(self.config.check_interval, shutdown).await {
                return Exit::Shutdown;
            }
        }
    }
}

/// Sleep for `duration`; returns `true` if shutdown arrived first
async fn sleep_or_shutdown(duration: Duration, shutdown: &mut broadcast::Receiver<()>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        _ = shutdown.recv() => true,
    }
}
