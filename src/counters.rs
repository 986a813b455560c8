//! Host counter sources
//!
//! Counter values are read on their own cadence and fed into the
//! [`RateComputer`](crate::rates::RateComputer). A counter that cannot be
//! read comes back as `None` rather than an error.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Statistics files sampled for every interface
pub const NET_STATISTICS: [&str; 8] = [
    "rx_bytes",
    "tx_bytes",
    "rx_packets",
    "tx_packets",
    "rx_errors",
    "tx_errors",
    "rx_dropped",
    "tx_dropped",
];

/// One counter read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterReading {
    pub name: String,
    /// `None` when the counter was unreadable
    pub value: Option<u64>,
}

/// Anything that can produce a batch of named monotonic counters
#[async_trait]
pub trait CounterSource: Send {
    async fn read_counters(&mut self) -> Vec<CounterReading>;
}

/// Network interface statistics from sysfs
/// (`<root>/<iface>/statistics/<counter>`)
#[derive(Debug, Clone)]
pub struct SysfsNetCounters {
    root: PathBuf,
    interfaces: Vec<String>,
}

impl SysfsNetCounters {
    pub fn new(root: impl Into<PathBuf>, interfaces: Vec<String>) -> Self {
        Self {
            root: root.into(),
            interfaces,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn read_one(path: &Path) -> Option<u64> {
        let text = tokio::fs::read_to_string(path).await.ok()?;
        text.trim().parse().ok()
    }
}

#[async_trait]
impl CounterSource for SysfsNetCounters {
    async fn read_counters(&mut self) -> Vec<CounterReading> {
        let mut readings = Vec::with_capacity(self.interfaces.len() * NET_STATISTICS.len());
        for iface in &self.interfaces {
            let stats_dir = self.root.join(iface).join("statistics");
            for stat in NET_STATISTICS {
                let value = Self::read_one(&stats_dir.join(stat)).await;
                readings.push(CounterReading {
                    name: format!("{}/{}", iface, stat),
                    value,
                });
            }
        }
        readings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_stat(root: &Path, iface: &str, stat: &str, value: &str) {
        let dir = root.join(iface).join("statistics");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(stat), value).unwrap();
    }

    #[tokio::test]
    async fn reads_fake_sysfs_tree() {
        let tmp = tempfile::tempdir().unwrap();
        for stat in NET_STATISTICS {
            write_stat(tmp.path(), "eth0", stat, "0\n");
        }
        write_stat(tmp.path(), "eth0", "rx_bytes", "123456\n");

        let mut src = SysfsNetCounters::new(tmp.path(), vec!["eth0".to_string()]);
        let readings = src.read_counters().await;
        assert_eq!(readings.len(), NET_STATISTICS.len());
        assert_eq!(
            readings[0],
            CounterReading {
                name: "eth0/rx_bytes".to_string(),
                value: Some(123_456),
            }
        );
        assert!(readings.iter().all(|r| r.value.is_some()));
    }

    #[tokio::test]
    async fn missing_interface_reads_as_none() {
        let tmp = tempfile::tempdir().unwrap();
        write_stat(tmp.path(), "eth0", "rx_bytes", "garbage");

        let mut src = SysfsNetCounters::new(tmp.path(), vec!["eth0".into(), "usb0".into()]);
        let readings = src.read_counters().await;
        assert!(readings.iter().all(|r| r.value.is_none()));
        assert!(readings.iter().any(|r| r.name == "usb0/tx_dropped"));
    }
}
