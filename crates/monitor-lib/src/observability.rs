//! Structured event logging for the host monitor
//!
//! Every significant service event goes through `StructuredLogger` so it is
//! emitted with a stable `event` field and the node name, which keeps the
//! JSON log stream easy to filter.

use tracing::{debug, info, warn};

use crate::models::{AlertEvent, ResourceKind};

#[derive(Debug, Clone)]
pub struct StructuredLogger {
    node_name: String,
}

impl StructuredLogger {
    pub fn new(node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
        }
    }

    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    /// Log service startup
    pub fn service_started(&self, app_version: &str, monitoring_enabled: bool) {
        info!(
            event = "service_started",
            node = %self.node_name,
            app_version = %app_version,
            monitoring_enabled = monitoring_enabled,
            "Linux Monitoring v{} Service Started",
            app_version
        );
    }

    /// Log service shutdown
    pub fn service_shutdown(&self, reason: &str) {
        info!(
            event = "service_shutdown",
            node = %self.node_name,
            reason = %reason,
            "Host monitor shutting down"
        );
    }

    /// Log the bot identity once the API answers
    pub fn bot_connected(&self, username: &str, chat_id: i64) {
        info!(
            event = "bot_connected",
            node = %self.node_name,
            bot_username = %username,
            chat_id = chat_id,
            "Connected to bot API"
        );
    }

    /// Log an accepted remote command
    pub fn command_received(&self, command: &str, chat_id: i64) {
        info!(
            event = "command_received",
            node = %self.node_name,
            command = %command,
            chat_id = chat_id,
            "send /{} command",
            command
        );
    }

    /// Log a command dropped by the identity check
    pub fn command_rejected(&self, command: &str, chat_id: i64, sender_id: Option<i64>) {
        debug!(
            event = "command_rejected",
            node = %self.node_name,
            command = %command,
            chat_id = chat_id,
            sender_id = ?sender_id,
            "Ignoring command from unauthorized chat"
        );
    }

    /// Log a threshold breach
    pub fn threshold_exceeded(&self, alert: &AlertEvent) {
        warn!(
            event = "threshold_exceeded",
            node = %self.node_name,
            resource = %alert.resource,
            usage_percent = alert.usage_percent,
            limit_percent = alert.limit_percent,
            "{} overload ({}%)",
            alert.resource,
            alert.usage_percent as i64
        );
    }

    /// Log a failed outbound message
    pub fn delivery_failed(&self, resource: ResourceKind, error: &str) {
        warn!(
            event = "alert_delivery_failed",
            node = %self.node_name,
            resource = %resource,
            error = %error,
            "Failed to deliver alert"
        );
    }
}
