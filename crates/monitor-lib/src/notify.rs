//! Threshold notifications
//!
//! The watcher compares both gauges to their limits every 500 ms while
//! monitoring is enabled. Without a cooldown an alert fires on every tick the
//! usage stays at or above the limit.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::gauge::UsageGauge;
use crate::health::{components, HealthRegistry};
use crate::lifecycle::LifecycleController;
use crate::messaging::Messenger;
use crate::models::{AlertEvent, ResourceKind};
use crate::observability::StructuredLogger;
use crate::settings::ThresholdConfig;

/// Pause between threshold checks while enabled
pub const CHECK_INTERVAL: Duration = Duration::from_millis(500);

/// Pause between flag checks while disabled
pub const IDLE_INTERVAL: Duration = Duration::from_millis(1000);

pub struct NotificationWatcher {
    cpu: Arc<UsageGauge>,
    memory: Arc<UsageGauge>,
    thresholds: ThresholdConfig,
    lifecycle: LifecycleController,
    messenger: Arc<dyn Messenger>,
    chat_id: i64,
    health: HealthRegistry,
    logger: StructuredLogger,
    check_interval: Duration,
    idle_interval: Duration,
    /// Zero disables suppression
    cooldown: Duration,
    last_alert: Mutex<HashMap<ResourceKind, Instant>>,
}

impl NotificationWatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cpu: Arc<UsageGauge>,
        memory: Arc<UsageGauge>,
        thresholds: ThresholdConfig,
        lifecycle: LifecycleController,
        messenger: Arc<dyn Messenger>,
        chat_id: i64,
        health: HealthRegistry,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            cpu,
            memory,
            thresholds,
            lifecycle,
            messenger,
            chat_id,
            health,
            logger,
            check_interval: CHECK_INTERVAL,
            idle_interval: IDLE_INTERVAL,
            cooldown: Duration::ZERO,
            last_alert: Mutex::new(HashMap::new()),
        }
    }

    /// Suppress repeat alerts for the same resource within `cooldown`
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    fn gauge(&self, kind: ResourceKind) -> &UsageGauge {
        match kind {
            ResourceKind::Cpu => &self.cpu,
            ResourceKind::Memory => &self.memory,
        }
    }

    /// Compare both gauges to their limits
    ///
    /// Returns one event per resource at or above a positive limit, minus
    /// any still inside the cooldown window.
    pub fn check_once(&self) -> Vec<AlertEvent> {
        let now = Instant::now();
        let mut events = Vec::new();

        for kind in [ResourceKind::Cpu, ResourceKind::Memory] {
            let Some(limit) = self.thresholds.limit_for(kind) else {
                continue;
            };

            let usage = self.gauge(kind).get();
            if usage < limit as f64 {
                continue;
            }

            if self.suppressed(kind, now) {
                debug!(resource = %kind, usage_percent = usage, "Alert suppressed by cooldown");
                continue;
            }

            events.push(AlertEvent {
                resource: kind,
                usage_percent: usage,
                limit_percent: limit,
                timestamp: chrono::Utc::now().timestamp(),
            });
        }

        events
    }

    fn suppressed(&self, kind: ResourceKind, now: Instant) -> bool {
        if self.cooldown.is_zero() {
            return false;
        }

        let mut last_alert = match self.last_alert.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        match last_alert.get(&kind) {
            Some(last) if now.duration_since(*last) < self.cooldown => true,
            _ => {
                last_alert.insert(kind, now);
                false
            }
        }
    }

    /// Log and send one alert; returns whether delivery succeeded
    pub async fn deliver(&self, event: &AlertEvent) -> bool {
        self.logger.threshold_exceeded(event);

        match self.messenger.send_message(self.chat_id, &event.message()).await {
            Ok(()) => true,
            Err(e) => {
                self.logger.delivery_failed(event.resource, &e.to_string());
                false
            }
        }
    }

    /// One enabled iteration: check, then deliver every event
    ///
    /// Returns the number of alerts delivered.
    pub async fn tick(&self) -> usize {
        let mut delivered = 0;
        let mut failure = None;

        for event in self.check_once() {
            if self.deliver(&event).await {
                delivered += 1;
            } else {
                failure = Some(event.resource);
            }
        }

        match failure {
            Some(resource) => {
                self.health
                    .set_degraded(
                        components::NOTIFIER,
                        format!("failed to deliver {} alert", resource),
                    )
                    .await;
            }
            None if delivered > 0 => self.health.set_healthy(components::NOTIFIER).await,
            None => {}
        }

        delivered
    }

    /// Run until shutdown
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        info!(
            cpu_limit = self.thresholds.cpu_limit_percent,
            memory_limit = self.thresholds.memory_limit_percent,
            "Starting notification watcher"
        );

        loop {
            let pause = if self.lifecycle.is_enabled() {
                // A stuck send must not hold up shutdown.
                tokio::select! {
                    _ = self.tick() => {}
                    _ = shutdown.recv() => break,
                }
                self.check_interval
            } else {
                self.idle_interval
            };

            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = shutdown.recv() => break,
            }
        }

        info!("Shutting down notification watcher");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MessagingError;
    use crate::health::ComponentStatus;
    use crate::messaging::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    const OWNER: i64 = 42;

    #[derive(Default)]
    struct RecordingMessenger {
        sent: Mutex<Vec<(i64, String)>>,
        attempts: AtomicUsize,
        failing: AtomicBool,
        hanging: AtomicBool,
    }

    impl RecordingMessenger {
        fn sent(&self) -> Vec<(i64, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Messenger for RecordingMessenger {
        async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), MessagingError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if self.hanging.load(Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            if self.failing.load(Ordering::SeqCst) {
                return Err(MessagingError::Api {
                    code: 429,
                    description: "Too Many Requests".to_string(),
                });
            }
            self.sent.lock().unwrap().push((chat_id, text.to_string()));
            Ok(())
        }
    }

    struct Fixture {
        watcher: Arc<NotificationWatcher>,
        cpu: Arc<UsageGauge>,
        memory: Arc<UsageGauge>,
        lifecycle: LifecycleController,
        messenger: Arc<RecordingMessenger>,
        health: HealthRegistry,
    }

    fn thresholds(cpu_limit: i64, memory_limit: i64) -> ThresholdConfig {
        ThresholdConfig {
            cpu_limit_percent: cpu_limit,
            memory_limit_percent: memory_limit,
            cpu_interval: Duration::from_secs(1),
            memory_interval: Duration::from_secs(1),
        }
    }

    fn fixture(thresholds: ThresholdConfig, enabled: bool, cooldown: Duration) -> Fixture {
        let cpu = Arc::new(UsageGauge::new());
        let memory = Arc::new(UsageGauge::new());
        let lifecycle = LifecycleController::new(enabled);
        let messenger = Arc::new(RecordingMessenger::default());
        let health = HealthRegistry::new();
        let watcher = NotificationWatcher::new(
            cpu.clone(),
            memory.clone(),
            thresholds,
            lifecycle.clone(),
            messenger.clone(),
            OWNER,
            health.clone(),
            StructuredLogger::new("edge-1"),
        )
        .with_cooldown(cooldown);

        Fixture {
            watcher: Arc::new(watcher),
            cpu,
            memory,
            lifecycle,
            messenger,
            health,
        }
    }

    #[test]
    fn test_check_once_at_and_above_limit() {
        let f = fixture(thresholds(80, 90), true, Duration::ZERO);
        f.cpu.publish(80.0);
        f.memory.publish(89.9);

        let events = f.watcher.check_once();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].resource, ResourceKind::Cpu);
        assert_eq!(events[0].limit_percent, 80);

        f.memory.publish(95.5);
        let events = f.watcher.check_once();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].message(), "Memory Warning!\nMemory : 95%");
    }

    #[test]
    fn test_non_positive_limits_never_alert() {
        let f = fixture(thresholds(0, -5), true, Duration::ZERO);
        f.cpu.publish(100.0);
        f.memory.publish(100.0);
        assert!(f.watcher.check_once().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_alerts_every_tick_while_above_limit() {
        let f = fixture(thresholds(80, 0), true, Duration::ZERO);
        f.cpu.publish(85.0);

        let handle = tokio::spawn(f.watcher.clone().run(f.lifecycle.subscribe_shutdown()));
        // Ticks at 0, 500 and 1000 ms.
        tokio::time::sleep(Duration::from_millis(1200)).await;
        f.lifecycle.shutdown();
        handle.await.unwrap();

        let sent = f.messenger.sent();
        assert_eq!(sent.len(), 3);
        assert!(sent
            .iter()
            .all(|(chat, text)| *chat == OWNER && text == "CPU Warning!\nCpu : 85%"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_suppresses_repeats() {
        let f = fixture(thresholds(80, 0), true, Duration::from_secs(2));
        f.cpu.publish(85.0);

        assert_eq!(f.watcher.tick().await, 1);
        tokio::time::advance(Duration::from_millis(500)).await;
        assert_eq!(f.watcher.tick().await, 0);
        tokio::time::advance(Duration::from_millis(1600)).await;
        assert_eq!(f.watcher.tick().await, 1);
        assert_eq!(f.messenger.sent().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_watcher_sends_nothing() {
        let f = fixture(thresholds(10, 10), false, Duration::ZERO);
        f.cpu.publish(99.0);
        f.memory.publish(99.0);

        let handle = tokio::spawn(f.watcher.clone().run(f.lifecycle.subscribe_shutdown()));
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(f.messenger.attempts.load(Ordering::SeqCst), 0);

        f.lifecycle.enable();
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(f.messenger.attempts.load(Ordering::SeqCst) >= 2);

        f.lifecycle.shutdown();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_stuck_delivery() {
        let f = fixture(thresholds(80, 0), true, Duration::ZERO);
        f.cpu.publish(90.0);
        f.messenger.hanging.store(true, Ordering::SeqCst);

        let handle = tokio::spawn(f.watcher.clone().run(f.lifecycle.subscribe_shutdown()));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(f.messenger.attempts.load(Ordering::SeqCst), 1);

        f.lifecycle.shutdown();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("watcher did not exit while a send was stuck")
            .unwrap();
        assert!(f.messenger.sent().is_empty());
    }

    #[tokio::test]
    async fn test_delivery_failure_degrades_notifier() {
        let f = fixture(thresholds(80, 0), true, Duration::ZERO);
        f.health.register(components::NOTIFIER).await;
        f.cpu.publish(90.0);
        f.messenger.failing.store(true, Ordering::SeqCst);

        assert_eq!(f.watcher.tick().await, 0);
        assert_eq!(f.messenger.attempts.load(Ordering::SeqCst), 1);
        let health = f.health.get(components::NOTIFIER).await.unwrap();
        assert_eq!(health.status, ComponentStatus::Degraded);

        f.messenger.failing.store(false, Ordering::SeqCst);
        assert_eq!(f.watcher.tick().await, 1);
        let health = f.health.get(components::NOTIFIER).await.unwrap();
        assert_eq!(health.status, ComponentStatus::Healthy);
    }
}
