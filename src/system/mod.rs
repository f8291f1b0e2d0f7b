// System-wide samplers: one implementation per platform behind `SystemSampler`

pub mod disk_space;
mod linux;
mod mac;
#[cfg(windows)]
mod windows;

pub use disk_space::{SysinfoVolumes, Volume, VolumePolicy, VolumeSource};
pub use linux::LinuxSystemSampler;
pub use mac::MacSystemSampler;
#[cfg(windows)]
pub use windows::WindowsSystemSampler;

use crate::models::{DiskSpace, SystemCounters};

/// Every accessor re-reads its source on the calling thread. Rate metrics
/// return `Some(0)` on the first call and real rates once a baseline exists.
pub trait SystemSampler: Send + Sync {
    fn cpu_utilization_percent(&self) -> Option<f64>;

    fn memory_free_megabytes(&self) -> Option<f64>;

    /// Disk read operations per second.
    fn disk_read_operations(&self) -> Option<u64>;

    /// Disk write operations per second.
    fn disk_write_operations(&self) -> Option<u64>;

    fn disk_read_queue(&self) -> Option<u64>;

    fn disk_write_queue(&self) -> Option<u64>;

    fn disk_space(&self) -> Option<DiskSpace>;

    /// All metrics in one pass. Disk space fields come from a single volume read.
    fn sample(&self) -> SystemCounters {
        SystemCounters {
            cpu_utilization_percent: self.cpu_utilization_percent(),
            memory_free_megabytes: self.memory_free_megabytes(),
            disk_read_operations: self.disk_read_operations(),
            disk_write_operations: self.disk_write_operations(),
            disk_read_queue: self.disk_read_queue(),
            disk_write_queue: self.disk_write_queue(),
            ..Default::default()
        }
        .with_disk_space(self.disk_space())
    }
}
