//! Command handling
//!
//! The dispatcher is the only place remote input touches the core. It flips
//! the monitoring flag and reads the gauges; it never waits on a sampler.
//! Messages from any chat other than the allow-listed one are dropped
//! without a reply and without side effects.

use std::sync::Arc;

use super::Command;
use crate::gauge::UsageGauge;
use crate::health::HealthRegistry;
use crate::lifecycle::LifecycleController;
use crate::messaging::IncomingMessage;
use crate::observability::StructuredLogger;

/// Text to send back to a chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub chat_id: i64,
    pub text: String,
}

const HELP_TEXT: &str = "Commands:\n\n\
    /start    start server monitoring\n\
    /stop     stop server monitoring\n\
    /status   get server monitoring status\n\
    /usage    get server usage\n";

const STOP_TEXT: &str = "Monitoring Stopped!\n\
    \nMonitoring Status : Disable\n\
    \n- To re-enable monitoring, please enter the /start command.\n\
    \n- To check monitoring status, please enter the /status command.\n";

const USAGE_DISABLED_TEXT: &str = "Monitoring Status : Disable\n\
    \nTo monitor the server again, please enter the /start command.";

pub struct CommandDispatcher {
    lifecycle: LifecycleController,
    cpu: Arc<UsageGauge>,
    memory: Arc<UsageGauge>,
    health: HealthRegistry,
    allowed_chat_id: i64,
    logger: StructuredLogger,
    bot_username: Option<String>,
}

impl CommandDispatcher {
    pub fn new(
        lifecycle: LifecycleController,
        cpu: Arc<UsageGauge>,
        memory: Arc<UsageGauge>,
        health: HealthRegistry,
        allowed_chat_id: i64,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            lifecycle,
            cpu,
            memory,
            health,
            allowed_chat_id,
            logger,
            bot_username: None,
        }
    }

    /// Ignore `/command@name` messages addressed to other bots
    pub fn with_bot_username(mut self, username: impl Into<String>) -> Self {
        self.bot_username = Some(username.into());
        self
    }

    /// Handle one inbound message, returning the reply to send if any
    pub async fn dispatch(&self, message: &IncomingMessage) -> Option<Reply> {
        let command = Command::parse_addressed(&message.text, self.bot_username.as_deref())?;

        if message.chat_id != self.allowed_chat_id {
            self.logger
                .command_rejected(command.name(), message.chat_id, message.sender_id);
            return None;
        }

        self.logger.command_received(command.name(), message.chat_id);

        let text = match command {
            Command::Start => {
                self.lifecycle.enable();
                self.start_text()
            }
            Command::Stop => {
                self.lifecycle.disable();
                STOP_TEXT.to_string()
            }
            Command::Usage => self.usage_text(),
            Command::Status => self.status_text().await,
            Command::Help => HELP_TEXT.to_string(),
        };

        Some(Reply {
            chat_id: message.chat_id,
            text,
        })
    }

    fn start_text(&self) -> String {
        format!(
            "Welcome to LinuxMonitoring\n\
             \nCommands:\n\
             /start    start monitoring\n\
             /stop     stop monitoring\n\
             /status   monitoring status\n\
             /usage    get server status\n\
             /help     get bot command list\n\
             \nMonitoring Status : Enable\n\
             \nNode : {}",
            self.logger.node_name()
        )
    }

    fn usage_text(&self) -> String {
        if !self.lifecycle.is_enabled() {
            return USAGE_DISABLED_TEXT.to_string();
        }

        // Truncated, not rounded.
        format!(
            "Server Usage :\n\nCPU : {}%\nMemory : {}%",
            self.cpu.get() as i64,
            self.memory.get() as i64
        )
    }

    async fn status_text(&self) -> String {
        let status = if self.lifecycle.is_enabled() {
            "Enable"
        } else {
            "Disable"
        };

        let mut text = format!(
            "Monitoring Status : {}\n\
             \n/start    start server monitoring\n\
             /stop     stop server monitoring\n",
            status
        );

        let failed = self.health.failed().await;
        if !failed.is_empty() {
            text.push_str("\nStopped components:\n");
            for (name, health) in failed {
                let reason = health.message.unwrap_or_default();
                text.push_str(&format!("- {}: {}\n", name, reason));
            }
        }

        text
    }
}
