//! Counter sources backed by the proc filesystem
//!
//! Reads:
//! - `stat` for the aggregate `cpu` line (user, nice, system, idle jiffies)
//! - `meminfo` for `MemTotal` and `MemAvailable`

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;

use super::{CpuTimesSource, MemInfoSource};
use crate::error::SourceError;
use crate::models::{CpuTimes, MemInfo};

/// Reader for `/proc` (or a stand-in directory with the same layout)
#[derive(Debug, Clone)]
pub struct ProcFs {
    root: PathBuf,
}

impl ProcFs {
    pub fn new() -> Self {
        Self::with_root("/proc")
    }

    /// Use a custom proc root (for testing)
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    async fn read(&self, name: &str) -> Result<(PathBuf, String), SourceError> {
        let path = self.root.join(name);
        match fs::read_to_string(&path).await {
            Ok(content) => Ok((path, content)),
            Err(source) => Err(SourceError::Io { path, source }),
        }
    }
}

impl Default for ProcFs {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CpuTimesSource for ProcFs {
    async fn read_cpu_times(&self) -> Result<CpuTimes, SourceError> {
        let (path, content) = self.read("stat").await?;
        parse_cpu_times(&content).map_err(|reason| SourceError::Malformed {
            origin: path.display().to_string(),
            reason,
        })
    }
}

#[async_trait]
impl MemInfoSource for ProcFs {
    async fn read_meminfo(&self) -> Result<MemInfo, SourceError> {
        let (path, content) = self.read("meminfo").await?;
        let info = parse_meminfo(&content);
        if info.total_kb == 0 {
            return Err(SourceError::MissingField {
                origin: path.display().to_string(),
                field: "MemTotal",
            });
        }
        Ok(info)
    }
}

/// Parse the aggregate `cpu` line of a stat file
pub fn parse_cpu_times(content: &str) -> Result<CpuTimes, String> {
    let line = content
        .lines()
        .find(|line| line.split_whitespace().next() == Some("cpu"))
        .ok_or_else(|| "no aggregate cpu line".to_string())?;

    let values: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .take(4)
        .map(|field| field.parse::<u64>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("bad cpu counter: {}", e))?;

    if values.len() < 4 {
        return Err(format!("expected 4 cpu counters, found {}", values.len()));
    }

    let times = CpuTimes {
        user: values[0],
        nice: values[1],
        system: values[2],
        idle: values[3],
    };
    if times.total().is_none() {
        return Err("cpu counters overflow their sum".to_string());
    }

    Ok(times)
}

/// Parse `MemTotal` and `MemAvailable` from meminfo content
///
/// Missing or unparsable keys read as 0; lines are `Key: value unit`.
pub fn parse_meminfo(content: &str) -> MemInfo {
    let mut info = MemInfo::default();

    for line in content.lines() {
        let mut parts = line.split_whitespace();
        let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
            continue;
        };
        let Ok(value) = value.parse::<u64>() else {
            continue;
        };

        match key {
            "MemTotal:" => info.total_kb = value,
            "MemAvailable:" => info.available_kb = value,
            _ => {}
        }
    }

    info
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cpu_times() {
        let content = "cpu  100 0 50 850 3 0 2 0 0 0\n\
                       cpu0 50 0 25 425 1 0 1 0 0 0\n\
                       intr 12345\n";

        let times = parse_cpu_times(content).unwrap();
        assert_eq!(
            times,
            CpuTimes {
                user: 100,
                nice: 0,
                system: 50,
                idle: 850
            }
        );
    }

    #[test]
    fn test_parse_cpu_times_skips_per_core_lines() {
        let content = "cpu0 1 2 3 4\ncpu 10 20 30 40\n";
        let times = parse_cpu_times(content).unwrap();
        assert_eq!(times.user, 10);
        assert_eq!(times.idle, 40);
    }

    #[test]
    fn test_parse_cpu_times_malformed() {
        assert!(parse_cpu_times("intr 1 2 3\n").is_err());
        assert!(parse_cpu_times("cpu 1 2\n").is_err());
        assert!(parse_cpu_times("cpu 1 x 3 4\n").is_err());
    }

    #[test]
    fn test_parse_cpu_times_rejects_overflowing_counters() {
        let err = parse_cpu_times("cpu 18446744073709551615 1 0 0\n").unwrap_err();
        assert!(err.contains("overflow"));

        // The maximum itself is fine as long as the sum fits.
        assert!(parse_cpu_times("cpu 18446744073709551615 0 0 0\n").is_ok());
    }

    #[test]
    fn test_parse_meminfo() {
        let content = "MemTotal:        8000000 kB\n\
                       MemFree:          500000 kB\n\
                       MemAvailable:    2000000 kB\n\
                       Buffers:          100000 kB\n";

        let info = parse_meminfo(content);
        assert_eq!(info.total_kb, 8_000_000);
        assert_eq!(info.available_kb, 2_000_000);
    }

    #[test]
    fn test_parse_meminfo_ignores_memfree() {
        let info = parse_meminfo("MemTotal: 1000 kB\nMemFree: 900 kB\n");
        assert_eq!(info.total_kb, 1000);
        assert_eq!(info.available_kb, 0);
    }
}
