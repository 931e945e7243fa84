//! CPU utilization probe
//!
//! Utilization is the busy share of jiffies elapsed between two reads of the
//! cumulative counters taken one comparison window apart.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{CpuTimesSource, UsageProbe};
use crate::error::SourceError;
use crate::models::{CpuTimes, ResourceKind};

/// Gap between the two counter reads of one measurement
pub const CPU_COMPARISON_WINDOW: Duration = Duration::from_millis(1000);

/// Busy percentage between two counter snapshots
///
/// Returns `None` when no jiffies elapsed, the counters went backwards or
/// their sum overflows; callers keep their previous value in that case.
pub fn cpu_usage(before: &CpuTimes, after: &CpuTimes) -> Option<f64> {
    let total_diff = after.total()?.checked_sub(before.total()?)?;
    if total_diff == 0 {
        return None;
    }

    let idle_diff = after.idle.saturating_sub(before.idle).min(total_diff);
    let busy = total_diff - idle_diff;

    Some((100.0 * busy as f64 / total_diff as f64).clamp(0.0, 100.0))
}

pub struct CpuProbe {
    source: Arc<dyn CpuTimesSource>,
    window: Duration,
}

impl CpuProbe {
    pub fn new(source: Arc<dyn CpuTimesSource>) -> Self {
        Self {
            source,
            window: CPU_COMPARISON_WINDOW,
        }
    }

    /// Override the comparison window
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }
}

#[async_trait]
impl UsageProbe for CpuProbe {
    fn resource(&self) -> ResourceKind {
        ResourceKind::Cpu
    }

    async fn probe(&self) -> Result<Option<f64>, SourceError> {
        let before = checked(self.source.read_cpu_times().await?)?;
        tokio::time::sleep(self.window).await;
        let after = checked(self.source.read_cpu_times().await?)?;

        Ok(cpu_usage(&before, &after))
    }
}

fn checked(times: CpuTimes) -> Result<CpuTimes, SourceError> {
    match times.total() {
        Some(_) => Ok(times),
        None => Err(SourceError::Malformed {
            origin: "cpu times".to_string(),
            reason: "cpu counters overflow their sum".to_string(),
        }),
    }
}
