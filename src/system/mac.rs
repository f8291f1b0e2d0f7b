// macOS system sampler over top, vm_stat, sysctl and iostat output

use std::sync::Arc;

use tracing::instrument;

use super::SystemSampler;
use super::disk_space::{VolumePolicy, VolumeSource};
use crate::models::DiskSpace;
use crate::parse::darwin;
use crate::source::CommandRunner;

const TOP: &str = "/usr/bin/top";
const VM_STAT: &str = "/usr/bin/vm_stat";
const SYSCTL: &str = "/usr/sbin/sysctl";
const IOSTAT: &str = "/usr/sbin/iostat";

/// `top` and `iostat` report rates themselves, so no sample state is kept here.
/// `iostat -c 2` takes its own second sample, which makes disk ops slow (about a second).
pub struct MacSystemSampler {
    commands: Arc<dyn CommandRunner>,
    volumes: Arc<dyn VolumeSource>,
}

impl MacSystemSampler {
    pub fn new(commands: Arc<dyn CommandRunner>, volumes: Arc<dyn VolumeSource>) -> Self {
        Self { commands, volumes }
    }

    fn page_size(&self) -> u64 {
        let out = self.commands.run(SYSCTL, &["-n", "hw.pagesize"]);
        darwin::parse_page_size(out.as_deref())
    }

    /// Transfers per second split evenly between reads and writes; iostat does not separate them.
    fn half_transfers(&self) -> Option<u64> {
        let out = self.commands.run(IOSTAT, &["-d", "-c", "2"])?;
        let tps = darwin::parse_iostat_tps(&out)?;
        Some((tps / 2.0).round_ties_even().max(0.0) as u64)
    }
}

impl SystemSampler for MacSystemSampler {
    #[instrument(skip(self), fields(sampler = "mac", operation = "cpu_utilization_percent"))]
    fn cpu_utilization_percent(&self) -> Option<f64> {
        let out = self.commands.run(TOP, &["-l", "1", "-n", "0", "-s", "0"])?;
        darwin::parse_top_cpu_percent(&out).map(f64::round_ties_even)
    }

    fn memory_free_megabytes(&self) -> Option<f64> {
        let out = self.commands.run(VM_STAT, &[])?;
        let stat = darwin::parse_vm_stat(&out)?;
        let bytes = stat.available_bytes(self.page_size());
        Some((bytes as f64 / (1024.0 * 1024.0)).round_ties_even())
    }

    #[instrument(skip(self), fields(sampler = "mac", operation = "disk_read_operations"))]
    fn disk_read_operations(&self) -> Option<u64> {
        self.half_transfers()
    }

    #[instrument(skip(self), fields(sampler = "mac", operation = "disk_write_operations"))]
    fn disk_write_operations(&self) -> Option<u64> {
        self.half_transfers()
    }

    fn disk_read_queue(&self) -> Option<u64> {
        None
    }

    fn disk_write_queue(&self) -> Option<u64> {
        None
    }

    fn disk_space(&self) -> Option<DiskSpace> {
        Some(VolumePolicy::FixedOnly.sum(&self.volumes.volumes()))
    }
}
