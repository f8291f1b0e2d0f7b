// Linux system sampler over /proc files

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tracing::instrument;

use super::SystemSampler;
use super::disk_space::{VolumePolicy, VolumeSource};
use crate::SamplingOptions;
use crate::lock_unpoisoned;
use crate::models::DiskSpace;
use crate::parse::procfs::{self, CpuTimes, DiskStats};
use crate::rate::{self, SampleState};
use crate::source::FileSystem;

pub(crate) const PROC_STAT: &str = "/proc/stat";
pub(crate) const PROC_MEMINFO: &str = "/proc/meminfo";
pub(crate) const PROC_DISKSTATS: &str = "/proc/diskstats";

/// Read one source file; failures are logged and collapse to `None`.
pub(crate) fn read_source(fs: &dyn FileSystem, path: &str) -> Option<String> {
    match fs.read_to_string(Path::new(path)) {
        Ok(content) => Some(content),
        Err(e) => {
            tracing::debug!(path, error = %e, "source read failed");
            None
        }
    }
}

pub struct LinuxSystemSampler {
    fs: Arc<dyn FileSystem>,
    volumes: Arc<dyn VolumeSource>,
    cpu: Mutex<SampleState<CpuTimes>>,
    disk_reads: Mutex<SampleState<u64>>,
    disk_writes: Mutex<SampleState<u64>>,
}

impl LinuxSystemSampler {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        volumes: Arc<dyn VolumeSource>,
        options: &SamplingOptions,
    ) -> Self {
        Self {
            fs,
            volumes,
            cpu: Mutex::new(SampleState::new(options.min_cpu_interval)),
            disk_reads: Mutex::new(SampleState::new(options.min_disk_interval)),
            disk_writes: Mutex::new(SampleState::new(options.min_disk_interval)),
        }
    }

    fn disk_stats(&self) -> Option<DiskStats> {
        read_source(self.fs.as_ref(), PROC_DISKSTATS).map(|c| procfs::parse_disk_stats(&c))
    }

    fn disk_ops(&self, state: &Mutex<SampleState<u64>>, pick: fn(&DiskStats) -> u64) -> Option<u64> {
        let current = pick(&self.disk_stats()?);
        let mut state = lock_unpoisoned(state);
        Some(match state.advance(current, Instant::now()) {
            Some((prev, elapsed)) => rate::ops_per_second(prev, current, elapsed),
            None => 0,
        })
    }
}

impl SystemSampler for LinuxSystemSampler {
    #[instrument(skip(self), fields(sampler = "linux", operation = "cpu_utilization_percent"))]
    fn cpu_utilization_percent(&self) -> Option<f64> {
        let content = read_source(self.fs.as_ref(), PROC_STAT)?;
        let Some(current) = procfs::parse_cpu_times(&content) else {
            tracing::debug!(path = PROC_STAT, "no aggregate cpu line");
            return None;
        };
        let mut state = lock_unpoisoned(&self.cpu);
        Some(match state.advance(current, Instant::now()) {
            Some((prev, _)) => rate::cpu_percent(prev, current).round_ties_even(),
            None => 0.0,
        })
    }

    fn memory_free_megabytes(&self) -> Option<f64> {
        let content = read_source(self.fs.as_ref(), PROC_MEMINFO)?;
        let kb = procfs::parse_available_memory_kb(&content)?;
        Some((kb as f64 / 1024.0).round_ties_even())
    }

    #[instrument(skip(self), fields(sampler = "linux", operation = "disk_read_operations"))]
    fn disk_read_operations(&self) -> Option<u64> {
        self.disk_ops(&self.disk_reads, |s| s.reads_completed)
    }

    #[instrument(skip(self), fields(sampler = "linux", operation = "disk_write_operations"))]
    fn disk_write_operations(&self) -> Option<u64> {
        self.disk_ops(&self.disk_writes, |s| s.writes_completed)
    }

    fn disk_read_queue(&self) -> Option<u64> {
        // The kernel only exposes a combined in-flight count; split it evenly.
        self.disk_stats().map(|s| s.io_in_progress / 2)
    }

    fn disk_write_queue(&self) -> Option<u64> {
        self.disk_stats().map(|s| s.io_in_progress / 2)
    }

    fn disk_space(&self) -> Option<DiskSpace> {
        Some(VolumePolicy::FixedOrNetwork.sum(&self.volumes.volumes()))
    }
}
