// Tunables shared by every sampler built by the facade

use std::time::Duration;

use crate::rate::{self, MIN_CPU_SAMPLE_INTERVAL, MIN_DISK_SAMPLE_INTERVAL};
use crate::source::DEFAULT_COMMAND_TIMEOUT;

#[derive(Debug, Clone)]
pub struct SamplingOptions {
    /// Minimum gap between CPU snapshots (system and per-process).
    pub min_cpu_interval: Duration,
    /// Minimum gap between disk operation snapshots.
    pub min_disk_interval: Duration,
    /// Deadline for each external diagnostic command.
    pub command_timeout: Duration,
    pub clock_ticks_per_second: u64,
    pub logical_cpus: usize,
}

impl Default for SamplingOptions {
    fn default() -> Self {
        Self {
            min_cpu_interval: MIN_CPU_SAMPLE_INTERVAL,
            min_disk_interval: MIN_DISK_SAMPLE_INTERVAL,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            clock_ticks_per_second: rate::clock_ticks_per_second(),
            logical_cpus: rate::logical_cpu_count(),
        }
    }
}
