//! Component health tracking
//!
//! Every background loop reports its state here. A sampler whose counter
//! source fails stops for good, and the registry is where that becomes
//! visible to the command layer.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::models::ResourceKind;

/// Health status of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    /// Component is functioning normally
    Healthy,
    /// Component is failing intermittently but still running
    Degraded,
    /// Component has stopped
    Unhealthy,
}

impl ComponentStatus {
    pub fn is_operational(&self) -> bool {
        matches!(self, ComponentStatus::Healthy | ComponentStatus::Degraded)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    pub fn healthy() -> Self {
        Self {
            status: ComponentStatus::Healthy,
            message: None,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self {
            status: ComponentStatus::Degraded,
            message: Some(message.into()),
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            status: ComponentStatus::Unhealthy,
            message: Some(message.into()),
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// Component names for health tracking
pub mod components {
    pub const CPU_SAMPLER: &str = "cpu_sampler";
    pub const MEMORY_SAMPLER: &str = "memory_sampler";
    pub const NOTIFIER: &str = "notifier";
    pub const BOT: &str = "bot";
}

/// Health component name of the sampler for a resource
pub fn sampler_component(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Cpu => components::CPU_SAMPLER,
        ResourceKind::Memory => components::MEMORY_SAMPLER,
    }
}

/// Shared registry of component health
#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    components: Arc<RwLock<BTreeMap<String, ComponentHealth>>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component with initial healthy status
    pub async fn register(&self, name: &str) {
        let mut components = self.components.write().await;
        components.insert(name.to_string(), ComponentHealth::healthy());
    }

    pub async fn update(&self, name: &str, health: ComponentHealth) {
        let mut components = self.components.write().await;
        components.insert(name.to_string(), health);
    }

    pub async fn set_healthy(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    pub async fn set_degraded(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::degraded(message)).await;
    }

    pub async fn set_unhealthy(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::unhealthy(message)).await;
    }

    pub async fn get(&self, name: &str) -> Option<ComponentHealth> {
        self.components.read().await.get(name).cloned()
    }

    /// Components that have stopped, sorted by name
    pub async fn failed(&self) -> Vec<(String, ComponentHealth)> {
        self.components
            .read()
            .await
            .iter()
            .filter(|(_, health)| !health.status.is_operational())
            .map(|(name, health)| (name.clone(), health.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_registration_starts_healthy() {
        let registry = HealthRegistry::new();
        registry.register(components::CPU_SAMPLER).await;

        let health = registry.get(components::CPU_SAMPLER).await.unwrap();
        assert_eq!(health.status, ComponentStatus::Healthy);
        assert!(health.message.is_none());
        assert!(registry.failed().await.is_empty());
    }

    #[tokio::test]
    async fn test_degraded_is_not_failed() {
        let registry = HealthRegistry::new();
        registry.register(components::BOT).await;
        registry.set_degraded(components::BOT, "poll timeout").await;

        assert_eq!(
            registry.get(components::BOT).await.unwrap().status,
            ComponentStatus::Degraded
        );
        assert!(registry.failed().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_lists_unhealthy_components() {
        let registry = HealthRegistry::new();
        registry.register(components::CPU_SAMPLER).await;
        registry.register(components::MEMORY_SAMPLER).await;
        registry
            .set_unhealthy(components::MEMORY_SAMPLER, "MemTotal not found")
            .await;

        let failed = registry.failed().await;
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].0, components::MEMORY_SAMPLER);
        assert_eq!(failed[0].1.message.as_deref(), Some("MemTotal not found"));
    }

    #[test]
    fn test_sampler_component_names() {
        assert_eq!(sampler_component(ResourceKind::Cpu), "cpu_sampler");
        assert_eq!(sampler_component(ResourceKind::Memory), "memory_sampler");
    }
}
