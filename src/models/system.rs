// System-wide counters

use serde::{Deserialize, Serialize};

const BYTES_PER_MEGABYTE: f64 = 1024.0 * 1024.0;

/// One pass over every system metric. `None` means the metric is unavailable,
/// either on this platform or for this call; it never stands for zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemCounters {
    pub cpu_utilization_percent: Option<f64>,
    pub memory_free_megabytes: Option<f64>,
    pub disk_read_operations: Option<u64>,
    pub disk_write_operations: Option<u64>,
    pub disk_read_queue: Option<u64>,
    pub disk_write_queue: Option<u64>,
    pub disk_free_percent: Option<f64>,
    pub disk_free_megabytes: Option<f64>,
    pub disk_size_megabytes: Option<f64>,
    pub disk_used_megabytes: Option<f64>,
}

/// Free and total bytes summed over the volumes that count toward disk space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskSpace {
    pub free_bytes: u64,
    pub total_bytes: u64,
}

impl DiskSpace {
    pub fn used_bytes(&self) -> u64 {
        self.total_bytes.saturating_sub(self.free_bytes)
    }

    /// Free percentage, whole number. `None` when no volume contributed.
    pub fn free_percent(&self) -> Option<f64> {
        if self.total_bytes == 0 {
            return None;
        }
        Some((self.free_bytes as f64 / self.total_bytes as f64 * 100.0).round_ties_even())
    }

    pub fn free_megabytes(&self) -> f64 {
        (self.free_bytes as f64 / BYTES_PER_MEGABYTE).round_ties_even()
    }

    pub fn size_megabytes(&self) -> f64 {
        (self.total_bytes as f64 / BYTES_PER_MEGABYTE).round_ties_even()
    }

    pub fn used_megabytes(&self) -> f64 {
        (self.used_bytes() as f64 / BYTES_PER_MEGABYTE).round_ties_even()
    }
}

impl SystemCounters {
    /// Copy the disk-space fields from one volume pass so free, used and size agree.
    pub fn with_disk_space(mut self, space: Option<DiskSpace>) -> Self {
        match space {
            Some(space) => {
                self.disk_free_percent = space.free_percent();
                self.disk_free_megabytes = Some(space.free_megabytes());
                self.disk_size_megabytes = Some(space.size_megabytes());
                self.disk_used_megabytes = Some(space.used_megabytes());
            }
            None => {
                self.disk_free_percent = None;
                self.disk_free_megabytes = None;
                self.disk_size_megabytes = None;
                self.disk_used_megabytes = None;
            }
        }
        self
    }
}
