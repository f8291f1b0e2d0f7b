//! Rate derivation from two cumulative snapshots.
//!
//! A sampler keeps one [`SampleState`] per rate metric. Each read hands the
//! fresh snapshot to [`SampleState::advance`], which always stores it and yields
//! the previous one only when enough time has passed for a meaningful delta.

use std::time::{Duration, Instant};

use crate::parse::procfs::CpuTimes;

/// Minimum gap between two CPU snapshots before a rate is reported.
pub const MIN_CPU_SAMPLE_INTERVAL: Duration = Duration::from_millis(50);

/// Minimum gap between two disk snapshots before a rate is reported.
pub const MIN_DISK_SAMPLE_INTERVAL: Duration = Duration::from_millis(100);

/// Previous snapshot of one metric and when it was captured.
#[derive(Debug, Clone)]
pub struct SampleState<S> {
    previous: Option<(S, Instant)>,
    min_interval: Duration,
}

impl<S: Copy> SampleState<S> {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            previous: None,
            min_interval,
        }
    }

    /// Store `current` and return the prior snapshot with the elapsed time, if
    /// one exists and the gap strictly exceeds the minimum interval.
    pub fn advance(&mut self, current: S, now: Instant) -> Option<(S, Duration)> {
        let delta = self.previous.and_then(|(prev, at)| {
            let elapsed = now.saturating_duration_since(at);
            (elapsed > self.min_interval).then_some((prev, elapsed))
        });
        self.previous = Some((current, now));
        delta
    }

    pub fn has_baseline(&self) -> bool {
        self.previous.is_some()
    }
}

/// Busy percent between two `/proc/stat` snapshots, clamped to [0, 100].
pub fn cpu_percent(prev: CpuTimes, curr: CpuTimes) -> f64 {
    let delta_total = curr.total as i128 - prev.total as i128;
    let delta_idle = curr.idle as i128 - prev.idle as i128;
    if delta_total == 0 {
        return 0.0;
    }
    let percent = 100.0 * (delta_total - delta_idle) as f64 / delta_total as f64;
    percent.clamp(0.0, 100.0)
}

/// Operations per second, floored at zero and rounded to the nearest integer.
pub fn ops_per_second(prev: u64, curr: u64, elapsed: Duration) -> u64 {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return 0;
    }
    let delta = curr as f64 - prev as f64;
    (delta / secs).round_ties_even().max(0.0) as u64
}

/// CPU percent of one process from clock ticks, normalized by logical CPU
/// count. Floored at zero only: a multi-threaded process can exceed 100.
pub fn process_cpu_percent(
    delta_ticks: i64,
    ticks_per_second: u64,
    elapsed: Duration,
    logical_cpus: usize,
) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 || ticks_per_second == 0 {
        return 0.0;
    }
    let cpu_seconds = delta_ticks as f64 / ticks_per_second as f64;
    let percent = cpu_seconds / secs * 100.0 / logical_cpus.max(1) as f64;
    round_to_hundredths(percent.max(0.0))
}

/// Same as [`process_cpu_percent`] for platforms reporting CPU time directly.
pub fn process_cpu_percent_from_time(
    delta_cpu: Duration,
    elapsed: Duration,
    logical_cpus: usize,
) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return 0.0;
    }
    let percent = delta_cpu.as_secs_f64() / secs * 100.0 / logical_cpus.max(1) as f64;
    round_to_hundredths(percent.max(0.0))
}

pub fn round_to_hundredths(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

/// Logical CPUs visible to this process; 1 if unknown.
pub fn logical_cpu_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Kernel clock ticks per second (`USER_HZ`).
pub fn clock_ticks_per_second() -> u64 {
    #[cfg(unix)]
    {
        // SAFETY: sysconf only reads a configuration value.
        let hz = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
        if hz > 0 {
            return hz as u64;
        }
    }
    100
}
