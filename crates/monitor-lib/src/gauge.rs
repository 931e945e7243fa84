//! Latest-value usage gauges shared between samplers and readers

use std::sync::atomic::{AtomicU64, Ordering};

/// Most recent usage percentage for one resource
///
/// One sampler writes, any number of tasks read. The `f64` is stored as its
/// bit pattern in an `AtomicU64`, so reads never tear and never block. Until
/// the first publish the value reads as `0.0`; `has_sample` distinguishes
/// that from a real 0% reading.
#[derive(Debug, Default)]
pub struct UsageGauge {
    bits: AtomicU64,
    publishes: AtomicU64,
}

impl UsageGauge {
    pub fn new() -> Self {
        Self {
            bits: AtomicU64::new(0f64.to_bits()),
            publishes: AtomicU64::new(0),
        }
    }

    /// Overwrite the current value
    pub fn publish(&self, percent: f64) {
        self.bits.store(percent.to_bits(), Ordering::Release);
        self.publishes.fetch_add(1, Ordering::AcqRel);
    }

    /// Last published value, `0.0` before the first publish
    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }

    /// Number of publishes since creation
    pub fn publish_count(&self) -> u64 {
        self.publishes.load(Ordering::Acquire)
    }

    pub fn has_sample(&self) -> bool {
        self.publish_count() > 0
    }
}
