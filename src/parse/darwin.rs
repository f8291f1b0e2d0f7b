// Parsers for macOS diagnostic command output (top, vm_stat, sysctl, iostat, ps)

use regex::Regex;
use std::sync::LazyLock;

pub const DEFAULT_PAGE_SIZE: u64 = 4096;

static IDLE_PERCENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+\.?\d*)\s*%\s*idle").expect("idle percent pattern is valid")
});

static VM_STAT_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":\s*(\d+)").expect("vm_stat value pattern is valid"));

/// Page counts from `vm_stat`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VmStat {
    pub pages_free: u64,
    pub pages_speculative: u64,
    pub pages_purgeable: u64,
}

impl VmStat {
    pub fn available_bytes(&self, page_size: u64) -> u64 {
        self.pages_free
            .saturating_add(self.pages_speculative)
            .saturating_add(self.pages_purgeable)
            .saturating_mul(page_size)
    }
}

/// CPU busy percent from the `CPU usage:` line of `top -l 1 -n 0 -s 0`.
pub fn parse_top_cpu_percent(output: &str) -> Option<f64> {
    output
        .lines()
        .filter(|line| line.contains("CPU usage:"))
        .find_map(|line| {
            let idle: f64 = IDLE_PERCENT.captures(line)?.get(1)?.as_str().parse().ok()?;
            Some((100.0 - idle).max(0.0))
        })
}

fn vm_stat_value(line: &str) -> u64 {
    VM_STAT_VALUE
        .captures(line)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

pub fn parse_vm_stat(output: &str) -> Option<VmStat> {
    if output.trim().is_empty() {
        return None;
    }
    let mut stat = VmStat::default();
    for line in output.lines() {
        if line.starts_with("Pages free:") {
            stat.pages_free = vm_stat_value(line);
        } else if line.starts_with("Pages speculative:") {
            stat.pages_speculative = vm_stat_value(line);
        } else if line.starts_with("Pages purgeable:") {
            stat.pages_purgeable = vm_stat_value(line);
        }
    }
    Some(stat)
}

/// Output of `sysctl -n hw.pagesize`; falls back to 4 KiB.
pub fn parse_page_size(output: Option<&str>) -> u64 {
    output
        .and_then(|s| s.trim().parse::<u64>().ok())
        .filter(|size| *size > 0)
        .unwrap_or(DEFAULT_PAGE_SIZE)
}

/// Total transfers per second from `iostat -d -c 2`: the second data line after
/// the `KB/t` header, summing the `tps` column of every disk.
pub fn parse_iostat_tps(output: &str) -> Option<f64> {
    if output.trim().is_empty() {
        return None;
    }
    let mut in_data = false;
    let mut data_lines = 0;
    for line in output.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.contains("KB/t") {
            in_data = true;
            continue;
        }
        if !in_data {
            continue;
        }
        data_lines += 1;
        if data_lines >= 2 {
            let tps = trimmed
                .split_whitespace()
                .skip(1)
                .step_by(3)
                .filter_map(|v| v.parse::<f64>().ok())
                .sum();
            return Some(tps);
        }
    }
    Some(0.0)
}

/// Thread count from `ps -M -p <pid>`: one line per thread after the header.
pub fn parse_ps_thread_count(output: &str) -> Option<u64> {
    let mut lines = output.lines().filter(|l| !l.trim().is_empty());
    lines.next()?;
    Some(lines.count() as u64)
}
