//! Long-poll loop feeding the command dispatcher

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::CommandDispatcher;
use crate::error::MessagingError;
use crate::health::{components, HealthRegistry};
use crate::messaging::{Messenger, UpdateSource};

/// Pause before polling again after a failed poll
pub const POLL_ERROR_PAUSE: Duration = Duration::from_secs(1);

pub struct CommandPoller {
    source: Arc<dyn UpdateSource>,
    messenger: Arc<dyn Messenger>,
    dispatcher: Arc<CommandDispatcher>,
    health: HealthRegistry,
    error_pause: Duration,
}

impl CommandPoller {
    pub fn new(
        source: Arc<dyn UpdateSource>,
        messenger: Arc<dyn Messenger>,
        dispatcher: Arc<CommandDispatcher>,
        health: HealthRegistry,
    ) -> Self {
        Self {
            source,
            messenger,
            dispatcher,
            health,
            error_pause: POLL_ERROR_PAUSE,
        }
    }

    pub fn with_error_pause(mut self, pause: Duration) -> Self {
        self.error_pause = pause;
        self
    }

    /// Poll once and answer every command received
    ///
    /// Returns the number of replies delivered. A failed reply is logged and
    /// does not fail the poll.
    pub async fn poll_once(&self) -> Result<usize, MessagingError> {
        let messages = self.source.poll().await?;
        let mut delivered = 0;

        for message in &messages {
            let Some(reply) = self.dispatcher.dispatch(message).await else {
                continue;
            };

            match self.messenger.send_message(reply.chat_id, &reply.text).await {
                Ok(()) => delivered += 1,
                Err(e) => warn!(
                    chat_id = reply.chat_id,
                    update_id = message.update_id,
                    error = %e,
                    "Failed to send command reply"
                ),
            }
        }

        Ok(delivered)
    }

    /// Run until shutdown; poll errors are logged and polling resumes
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        info!("Starting command poller");
        let mut failing = false;

        loop {
            let outcome = tokio::select! {
                outcome = self.poll_once() => outcome,
                _ = shutdown.recv() => break,
            };

            match outcome {
                Ok(delivered) => {
                    if failing {
                        info!("Bot API reachable again");
                        self.health.set_healthy(components::BOT).await;
                        failing = false;
                    }
                    if delivered > 0 {
                        debug!(replies = delivered, "Answered commands");
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Polling bot API failed, retrying");
                    if !failing {
                        self.health.set_degraded(components::BOT, e.to_string()).await;
                        failing = true;
                    }

                    tokio::select! {
                        _ = tokio::time::sleep(self.error_pause) => {}
                        _ = shutdown.recv() => break,
                    }
                }
            }
        }

        info!("Shutting down command poller");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gauge::UsageGauge;
    use crate::health::ComponentStatus;
    use crate::lifecycle::LifecycleController;
    use crate::messaging::{async_trait, IncomingMessage};
    use crate::observability::StructuredLogger;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const OWNER: i64 = 42;

    /// Replays queued poll results, then returns empty batches
    struct QueuedSource {
        batches: Mutex<VecDeque<Result<Vec<IncomingMessage>, MessagingError>>>,
        polls: AtomicUsize,
    }

    impl QueuedSource {
        fn new(batches: Vec<Result<Vec<IncomingMessage>, MessagingError>>) -> Arc<Self> {
            Arc::new(Self {
                batches: Mutex::new(batches.into()),
                polls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl UpdateSource for QueuedSource {
        async fn poll(&self) -> Result<Vec<IncomingMessage>, MessagingError> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            let next = self.batches.lock().unwrap().pop_front();
            match next {
                Some(batch) => batch,
                None => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(Vec::new())
                }
            }
        }
    }

    #[derive(Default)]
    struct RecordingMessenger {
        sent: Mutex<Vec<(i64, String)>>,
    }

    #[async_trait]
    impl Messenger for RecordingMessenger {
        async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), MessagingError> {
            self.sent.lock().unwrap().push((chat_id, text.to_string()));
            Ok(())
        }
    }

    fn message(update_id: i64, chat_id: i64, text: &str) -> IncomingMessage {
        IncomingMessage {
            update_id,
            chat_id,
            sender_id: None,
            text: text.to_string(),
        }
    }

    fn api_error() -> MessagingError {
        MessagingError::Api {
            code: 502,
            description: "Bad Gateway".to_string(),
        }
    }

    fn poller(
        source: Arc<QueuedSource>,
        messenger: Arc<RecordingMessenger>,
        lifecycle: LifecycleController,
        health: HealthRegistry,
    ) -> CommandPoller {
        let dispatcher = Arc::new(CommandDispatcher::new(
            lifecycle,
            Arc::new(UsageGauge::new()),
            Arc::new(UsageGauge::new()),
            health.clone(),
            OWNER,
            StructuredLogger::new("edge-1"),
        ));
        CommandPoller::new(source, messenger, dispatcher, health)
            .with_error_pause(Duration::from_millis(100))
    }

    #[tokio::test]
    async fn test_poll_once_replies_only_to_owner() {
        let source = QueuedSource::new(vec![Ok(vec![
            message(1, OWNER, "/stop"),
            message(2, 7, "/start"),
            message(3, OWNER, "just chatting"),
            message(4, OWNER, "/status"),
        ])]);
        let messenger = Arc::new(RecordingMessenger::default());
        let lifecycle = LifecycleController::new(true);
        let poller = poller(
            source,
            messenger.clone(),
            lifecycle.clone(),
            HealthRegistry::new(),
        );

        assert_eq!(poller.poll_once().await.unwrap(), 2);
        assert!(!lifecycle.is_enabled());

        let sent = messenger.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|(chat, _)| *chat == OWNER));
        assert!(sent[1].1.starts_with("Monitoring Status : Disable"));
    }

    #[tokio::test]
    async fn test_unauthorized_batch_sends_nothing() {
        let source = QueuedSource::new(vec![Ok(vec![
            message(1, 7, "/stop"),
            message(2, 7, "/usage"),
        ])]);
        let messenger = Arc::new(RecordingMessenger::default());
        let lifecycle = LifecycleController::new(true);
        let poller = poller(
            source,
            messenger.clone(),
            lifecycle.clone(),
            HealthRegistry::new(),
        );

        assert_eq!(poller.poll_once().await.unwrap(), 0);
        assert!(messenger.sent.lock().unwrap().is_empty());
        assert!(lifecycle.is_enabled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_keeps_polling_after_errors() {
        let source = QueuedSource::new(vec![
            Err(api_error()),
            Err(api_error()),
            Ok(vec![message(1, OWNER, "/help")]),
        ]);
        let messenger = Arc::new(RecordingMessenger::default());
        let lifecycle = LifecycleController::new(true);
        let health = HealthRegistry::new();
        health.register(components::BOT).await;

        let poller = poller(source.clone(), messenger.clone(), lifecycle.clone(), health.clone());
        let handle = tokio::spawn(poller.run(lifecycle.subscribe_shutdown()));

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(
            health.get(components::BOT).await.unwrap().status,
            ComponentStatus::Degraded
        );

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(messenger.sent.lock().unwrap().len(), 1);
        assert!(source.polls.load(Ordering::SeqCst) >= 3);
        assert_eq!(
            health.get(components::BOT).await.unwrap().status,
            ComponentStatus::Healthy
        );

        lifecycle.shutdown();
        handle.await.unwrap();
    }
}
