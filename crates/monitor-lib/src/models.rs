//! Core data models for the host monitor

use serde::{Deserialize, Serialize};

/// Resource tracked by a sampler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Cpu,
    Memory,
}

impl ResourceKind {
    /// Lowercase name used in log fields and component names
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Cpu => "cpu",
            ResourceKind::Memory => "memory",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cumulative CPU jiffies from the aggregate `cpu` line of the stat file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuTimes {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
}

impl CpuTimes {
    /// Sum of all four counters, `None` if it does not fit in a `u64`
    pub fn total(&self) -> Option<u64> {
        self.user
            .checked_add(self.nice)?
            .checked_add(self.system)?
            .checked_add(self.idle)
    }
}

/// The two meminfo values needed for a usage reading, in kB
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemInfo {
    pub total_kb: u64,
    pub available_kb: u64,
}

/// A threshold breach produced by the notification watcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub resource: ResourceKind,
    pub usage_percent: f64,
    pub limit_percent: i64,
    pub timestamp: i64,
}

impl AlertEvent {
    /// Chat text for this alert
    pub fn message(&self) -> String {
        let pct = self.usage_percent as i64;
        match self.resource {
            ResourceKind::Cpu => format!("CPU Warning!\nCpu : {}%", pct),
            ResourceKind::Memory => format!("Memory Warning!\nMemory : {}%", pct),
        }
    }
}
