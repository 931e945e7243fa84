//! Resource sampling
//!
//! A sampler owns one background loop that measures a single resource and
//! publishes the result to a `UsageGauge`. The measurement itself sits behind
//! the `UsageProbe` trait, and the raw counters behind the source traits, so
//! loops can be driven by fakes in tests and by `/proc` in production.

mod cpu;
mod r#loop;
mod memory;
mod procfs;


pub use cpu::{cpu_usage, CpuProbe, CPU_COMPARISON_WINDOW};
pub use memory::{memory_usage, MemoryProbe};
pub use procfs::{parse_cpu_times, parse_meminfo, ProcFs};
pub use r#loop::{Sampler, SamplerConfig, DEFAULT_IDLE_INTERVAL};

use crate::error::SourceError;
use crate::models::{CpuTimes, MemInfo, ResourceKind};

pub use async_trait::async_trait;

/// Source of cumulative CPU counters
#[async_trait]
pub trait CpuTimesSource: Send + Sync {
    async fn read_cpu_times(&self) -> Result<CpuTimes, SourceError>;
}

/// Source of total/available memory figures
#[async_trait]
pub trait MemInfoSource: Send + Sync {
    async fn read_meminfo(&self) -> Result<MemInfo, SourceError>;
}

/// One usage measurement for a resource
#[async_trait]
pub trait UsageProbe: Send + Sync {
    /// Resource this probe measures
    fn resource(&self) -> ResourceKind;

    /// Take a measurement
    ///
    /// `Ok(None)` means the reading was degenerate and the previous gauge
    /// value should be kept. `Err` is fatal for the sampler.
    async fn probe(&self) -> Result<Option<f64>, SourceError>;
}
