//! Parsers for Linux `/proc` files.
//!
//! Every function takes file content and returns a snapshot, or `None` when the
//! content does not have the expected shape. Malformed lines are skipped where
//! the format is line-oriented.

use std::collections::HashMap;

const KIB: u64 = 1024;

/// Cumulative CPU jiffies from the aggregate `cpu ` line of `/proc/stat`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuTimes {
    pub total: u64,
    pub idle: u64,
}

/// Cumulative counters summed across whole disks from `/proc/diskstats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiskStats {
    pub reads_completed: u64,
    pub writes_completed: u64,
    pub read_time_ms: u64,
    pub write_time_ms: u64,
    pub io_in_progress: u64,
}

/// User and system clock ticks from `/proc/<pid>/stat`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessCpuTimes {
    pub utime: u64,
    pub stime: u64,
}

impl ProcessCpuTimes {
    pub fn total(&self) -> u64 {
        self.utime.saturating_add(self.stime)
    }
}

/// Memory figures (bytes) and thread count from `/proc/<pid>/status`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcStatus {
    pub name: Option<String>,
    pub vm_rss: Option<u64>,
    pub vm_hwm: Option<u64>,
    pub vm_size: Option<u64>,
    pub vm_peak: Option<u64>,
    pub vm_data: Option<u64>,
    pub rss_anon: Option<u64>,
    pub threads: Option<u64>,
}

impl ProcStatus {
    /// Anonymous resident memory, falling back to the data segment on kernels without `RssAnon`.
    pub fn private_bytes(&self) -> Option<u64> {
        self.rss_anon.or(self.vm_data)
    }
}

pub fn parse_cpu_times(content: &str) -> Option<CpuTimes> {
    let line = content.lines().find(|l| l.starts_with("cpu "))?;
    let values: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .map(|v| v.parse::<u64>())
        .collect::<Result<_, _>>()
        .ok()?;
    if values.len() < 4 {
        return None;
    }
    let field = |i: usize| values.get(i).copied().unwrap_or(0);
    // user nice system idle iowait irq softirq steal; guest time is already in user.
    let (user, nice, system, idle) = (field(0), field(1), field(2), field(3));
    let (iowait, irq, softirq, steal) = (field(4), field(5), field(6), field(7));
    let total = [user, nice, system, idle, iowait, irq, softirq, steal]
        .into_iter()
        .try_fold(0u64, u64::checked_add)?;
    Some(CpuTimes {
        total,
        idle: idle.checked_add(iowait)?,
    })
}

fn parse_kb_table(content: &str) -> HashMap<&str, u64> {
    let mut table = HashMap::new();
    for line in content.lines() {
        let Some((key, rest)) = line.split_once(':') else {
            continue;
        };
        if let Some(value) = rest.split_whitespace().next().and_then(|v| v.parse().ok()) {
            table.insert(key.trim(), value);
        }
    }
    table
}

/// Available memory in kB: `MemAvailable`, else `MemFree + Buffers + Cached`.
pub fn parse_available_memory_kb(content: &str) -> Option<u64> {
    let table = parse_kb_table(content);
    if table.is_empty() {
        return None;
    }
    if let Some(available) = table.get("MemAvailable") {
        return Some(*available);
    }
    let get = |key: &str| table.get(key).copied().unwrap_or(0);
    Some(
        get("MemFree")
            .saturating_add(get("Buffers"))
            .saturating_add(get("Cached")),
    )
}

/// NVMe (`nvme0n1`) and MMC (`mmcblk0`) whole disks end in a digit; their
/// partitions carry a `p<N>` suffix.
fn is_digit_suffixed_whole_disk(name: &str) -> bool {
    if let Some(rest) = name.strip_prefix("nvme") {
        let Some((controller, namespace)) = rest.split_once('n') else {
            return false;
        };
        return !controller.is_empty()
            && controller.bytes().all(|b| b.is_ascii_digit())
            && !namespace.is_empty()
            && namespace.bytes().all(|b| b.is_ascii_digit());
    }
    if let Some(rest) = name.strip_prefix("mmcblk") {
        return !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit());
    }
    false
}

/// Whether a `/proc/diskstats` device counts toward the aggregate.
pub fn is_whole_disk(name: &str) -> bool {
    if name.is_empty()
        || name.starts_with("loop")
        || name.starts_with("ram")
        || name.starts_with("dm-")
    {
        return false;
    }
    if name.bytes().last().is_some_and(|b| b.is_ascii_digit()) {
        return is_digit_suffixed_whole_disk(name);
    }
    true
}

pub fn parse_disk_stats(content: &str) -> DiskStats {
    let mut stats = DiskStats::default();
    for line in content.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 14 || !is_whole_disk(parts[2]) {
            continue;
        }
        let field = |i: usize| parts[i].parse::<u64>().unwrap_or(0);
        stats.reads_completed = stats.reads_completed.saturating_add(field(3));
        stats.read_time_ms = stats.read_time_ms.saturating_add(field(6));
        stats.writes_completed = stats.writes_completed.saturating_add(field(7));
        stats.write_time_ms = stats.write_time_ms.saturating_add(field(10));
        stats.io_in_progress = stats.io_in_progress.saturating_add(field(11));
    }
    stats
}

/// utime and stime, located after the last `)` so command names with spaces or
/// parentheses do not shift the fields.
pub fn parse_process_cpu_times(content: &str) -> Option<ProcessCpuTimes> {
    let close = content.rfind(')')?;
    let fields: Vec<&str> = content[close + 1..].split_whitespace().collect();
    // fields[0] is the state; utime and stime are stat fields 14 and 15.
    let utime = fields.get(11)?.parse().ok()?;
    let stime = fields.get(12)?.parse().ok()?;
    Some(ProcessCpuTimes { utime, stime })
}

/// Command name between the first `(` and the last `)` of `/proc/<pid>/stat`.
pub fn parse_process_comm(content: &str) -> Option<&str> {
    let open = content.find('(')?;
    let close = content.rfind(')')?;
    (close > open).then(|| &content[open + 1..close])
}

pub fn parse_proc_status(content: &str) -> ProcStatus {
    let mut status = ProcStatus::default();
    for line in content.lines() {
        let Some((key, rest)) = line.split_once(':') else {
            continue;
        };
        let rest = rest.trim();
        if key == "Name" {
            status.name = Some(rest.to_string());
            continue;
        }
        let Some(value) = rest
            .split_whitespace()
            .next()
            .and_then(|v| v.parse::<u64>().ok())
        else {
            continue;
        };
        // A kB figure too large for bytes leaves the field unset.
        let bytes = value.checked_mul(KIB);
        match key {
            "VmRSS" => status.vm_rss = bytes,
            "VmHWM" => status.vm_hwm = bytes,
            "VmSize" => status.vm_size = bytes,
            "VmPeak" => status.vm_peak = bytes,
            "VmData" => status.vm_data = bytes,
            "RssAnon" => status.rss_anon = bytes,
            "Threads" => status.threads = Some(value),
            _ => {}
        }
    }
    status
}
