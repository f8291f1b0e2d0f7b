// Windows system sampler over PDH performance counters

use std::sync::Mutex;

use tracing::instrument;
use windows_sys::Win32::System::Performance::{
    PDH_CSTATUS_INVALID_DATA, PDH_FMT_COUNTERVALUE, PDH_FMT_DOUBLE, PDH_FMT_NOCAP100,
    PDH_HCOUNTER, PDH_HQUERY, PDH_INVALID_DATA, PdhAddEnglishCounterW, PdhCloseQuery, PdhCollectQueryData, PdhGetFormattedCounterValue,
    PdhOpenQueryW,
};

use super::SystemSampler;
use crate::lock_unpoisoned;
use crate::models::DiskSpace;

const BYTES_PER_MEGABYTE: f64 = 1024.0 * 1024.0;

fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

/// How a counter is computed, which decides what a failed first read means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CounterKind {
    /// Needs two collections; the first read has no value yet.
    Rate,
    /// Readable from a single collection.
    Instant,
}

/// Value for a failed read. Only a rate counter's first read, failing because
/// no second sample exists yet, reports the neutral 0.
fn failed_read(kind: CounterKind, first: bool, status: u32, cstatus: u32) -> Option<f64> {
    let no_baseline = status == PDH_INVALID_DATA
        || (status == 0 && cstatus == PDH_CSTATUS_INVALID_DATA);
    (kind == CounterKind::Rate && first && no_baseline).then_some(0.0)
}

/// One PDH query holding one counter, so each metric keeps its own delta window.
struct PerfCounter {
    query: PDH_HQUERY,
    counter: PDH_HCOUNTER,
    kind: CounterKind,
    collected: bool,
}

// PDH handles are process-wide and only touched under the owning mutex.
unsafe impl Send for PerfCounter {}

impl PerfCounter {
    fn open(path: &str, kind: CounterKind) -> Option<Self> {
        let mut query: PDH_HQUERY = std::ptr::null_mut();
        let mut counter: PDH_HCOUNTER = std::ptr::null_mut();
        let wide_path = wide(path);
        // SAFETY: out-pointers are valid locals; the path is NUL-terminated UTF-16.
        unsafe {
            if PdhOpenQueryW(std::ptr::null(), 0, &mut query) != 0 {
                tracing::debug!(path, "PdhOpenQueryW failed");
                return None;
            }
            if PdhAddEnglishCounterW(query, wide_path.as_ptr(), 0, &mut counter) != 0 {
                tracing::debug!(path, "PdhAddEnglishCounterW failed");
                PdhCloseQuery(query);
                return None;
            }
        }
        Some(Self {
            query,
            counter,
            kind,
            collected: false,
        })
    }

    /// Next formatted value, `None` when the counter cannot be read.
    fn next_value(&mut self) -> Option<f64> {
        let first = !self.collected;
        self.collected = true;
        // SAFETY: query and counter were created by `open` and are still open.
        unsafe {
            if PdhCollectQueryData(self.query) != 0 {
                return None;
            }
            let mut value: PDH_FMT_COUNTERVALUE = std::mem::zeroed();
            let status = PdhGetFormattedCounterValue(
                self.counter,
                PDH_FMT_DOUBLE | PDH_FMT_NOCAP100,
                std::ptr::null_mut(),
                &mut value,
            );
            if status != 0 || value.CStatus != 0 {
                tracing::debug!(status, cstatus = value.CStatus, first, "PDH counter read failed");
                return failed_read(self.kind, first, status, value.CStatus);
            }
            Some(value.Anonymous.doubleValue)
        }
    }
}

impl Drop for PerfCounter {
    fn drop(&mut self) {
        // SAFETY: the query handle is owned by this value and closed once.
        unsafe {
            PdhCloseQuery(self.query);
        }
    }
}

struct Slot {
    path: &'static str,
    kind: CounterKind,
    counter: Mutex<Option<PerfCounter>>,
}

impl Slot {
    const fn rate(path: &'static str) -> Self {
        Self::new(path, CounterKind::Rate)
    }

    const fn instant(path: &'static str) -> Self {
        Self::new(path, CounterKind::Instant)
    }

    const fn new(path: &'static str, kind: CounterKind) -> Self {
        Self {
            path,
            kind,
            counter: Mutex::new(None),
        }
    }

    /// Opens lazily and retries the open on a later call if it failed.
    fn next_value(&self) -> Option<f64> {
        let mut guard = lock_unpoisoned(&self.counter);
        if guard.is_none() {
            *guard = PerfCounter::open(self.path, self.kind);
        }
        guard.as_mut()?.next_value()
    }
}

pub struct WindowsSystemSampler {
    cpu: Slot,
    memory_available: Slot,
    disk_reads: Slot,
    disk_writes: Slot,
    disk_read_queue: Slot,
    disk_write_queue: Slot,
    disk_free_percent: Slot,
    disk_free_megabytes: Slot,
}

impl Default for WindowsSystemSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowsSystemSampler {
    pub fn new() -> Self {
        Self {
            cpu: Slot::rate(r"\Processor(_Total)\% Processor Time"),
            memory_available: Slot::instant(r"\Memory\Available MBytes"),
            disk_reads: Slot::rate(r"\LogicalDisk(_Total)\Disk Reads/sec"),
            disk_writes: Slot::rate(r"\LogicalDisk(_Total)\Disk Writes/sec"),
            disk_read_queue: Slot::rate(r"\LogicalDisk(_Total)\Avg. Disk Read Queue Length"),
            disk_write_queue: Slot::rate(r"\LogicalDisk(_Total)\Avg. Disk Write Queue Length"),
            disk_free_percent: Slot::instant(r"\LogicalDisk(_Total)\% Free Space"),
            disk_free_megabytes: Slot::instant(r"\LogicalDisk(_Total)\Free Megabytes"),
        }
    }
}

fn whole(value: f64) -> u64 {
    value.round_ties_even().max(0.0) as u64
}

impl SystemSampler for WindowsSystemSampler {
    #[instrument(skip(self), fields(sampler = "windows", operation = "cpu_utilization_percent"))]
    fn cpu_utilization_percent(&self) -> Option<f64> {
        self.cpu
            .next_value()
            .map(|v| v.clamp(0.0, 100.0).round_ties_even())
    }

    fn memory_free_megabytes(&self) -> Option<f64> {
        self.memory_available.next_value().map(f64::round_ties_even)
    }

    fn disk_read_operations(&self) -> Option<u64> {
        self.disk_reads.next_value().map(whole)
    }

    fn disk_write_operations(&self) -> Option<u64> {
        self.disk_writes.next_value().map(whole)
    }

    fn disk_read_queue(&self) -> Option<u64> {
        self.disk_read_queue.next_value().map(whole)
    }

    fn disk_write_queue(&self) -> Option<u64> {
        self.disk_write_queue.next_value().map(whole)
    }

    /// Only free megabytes and free percent are exposed; size is derived from the two.
    fn disk_space(&self) -> Option<DiskSpace> {
        let free_mb = self.disk_free_megabytes.next_value()?;
        let free_pct = self.disk_free_percent.next_value()?;
        if free_pct <= 0.0 {
            return None;
        }
        let size_mb = free_mb / free_pct * 100.0;
        Some(DiskSpace {
            free_bytes: (free_mb * BYTES_PER_MEGABYTE) as u64,
            total_bytes: (size_mb * BYTES_PER_MEGABYTE) as u64,
        })
    }
}
