//! Memory utilization probe

use std::sync::Arc;

use async_trait::async_trait;

use super::{MemInfoSource, UsageProbe};
use crate::error::SourceError;
use crate::models::{MemInfo, ResourceKind};

/// Used share of total memory, where used = total - available
///
/// `None` when the total is zero.
pub fn memory_usage(info: &MemInfo) -> Option<f64> {
    if info.total_kb == 0 {
        return None;
    }
    let used = info.total_kb.saturating_sub(info.available_kb);
    Some(100.0 * used as f64 / info.total_kb as f64)
}

pub struct MemoryProbe {
    source: Arc<dyn MemInfoSource>,
}

impl MemoryProbe {
    pub fn new(source: Arc<dyn MemInfoSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl UsageProbe for MemoryProbe {
    fn resource(&self) -> ResourceKind {
        ResourceKind::Memory
    }

    async fn probe(&self) -> Result<Option<f64>, SourceError> {
        let info = self.source.read_meminfo().await?;
        memory_usage(&info)
            .map(Some)
            .ok_or_else(|| SourceError::MissingField {
                origin: "meminfo".to_string(),
                field: "MemTotal",
            })
    }
}
