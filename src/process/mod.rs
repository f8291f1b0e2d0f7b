// Per-process samplers and the sources that resolve names to live processes

mod linux;
mod mac;
#[cfg(windows)]
mod windows;

pub use linux::{LinuxProcessSampler, ProcfsProcessSource};
pub use mac::{MacProcessSampler, MacProcessSource};
#[cfg(windows)]
pub use windows::{WindowsProcessSampler, WindowsProcessSource};

use std::fmt;
use std::sync::{Arc, Mutex};

use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System};

use crate::lock_unpoisoned;
use crate::models::{ProcessCounters, ProcessMemory};

/// One OS process with its own CPU sample state. After `release` every
/// accessor returns an absent value; releasing twice is a no-op.
pub trait ProcessSampler: Send + Sync + fmt::Debug {
    fn process_id(&self) -> Option<u32>;

    fn process_name(&self) -> String;

    fn machine_name(&self) -> String;

    /// Caption of the process's main window; empty when it has none.
    fn process_title(&self) -> String;

    /// Percent of total machine CPU since the previous call on this sampler.
    fn cpu_utilization_percent(&self) -> Option<f64>;

    /// Open handles (file descriptors on Unix).
    fn handle_count(&self) -> Option<u64>;

    fn thread_count(&self) -> Option<u64>;

    fn memory(&self) -> ProcessMemory;

    fn release(&self);

    fn is_released(&self) -> bool;

    fn sample(&self) -> ProcessCounters {
        ProcessCounters {
            process_id: self.process_id(),
            process_name: self.process_name(),
            machine_name: self.machine_name(),
            process_title: self.process_title(),
            cpu_utilization_percent: self.cpu_utilization_percent(),
            handle_count: self.handle_count(),
            thread_count: self.thread_count(),
            memory: self.memory(),
        }
    }
}

/// Resolves process names to pids and opens samplers for them.
pub trait ProcessSource: Send + Sync {
    fn find_by_name(&self, name: &str) -> Vec<u32>;

    /// `None` when the process exited or cannot be opened.
    fn open(&self, pid: u32) -> Option<Arc<dyn ProcessSampler>>;
}

/// Host name reported as every sampler's machine name.
pub(crate) fn local_machine_name() -> String {
    System::host_name().unwrap_or_default()
}

/// Whether an OS process name matches a monitored name. With `strip_exe`
/// (Windows) the comparison ignores case and a trailing `.exe`.
pub fn process_name_matches(candidate: &str, wanted: &str, strip_exe: bool) -> bool {
    if candidate == wanted {
        return true;
    }
    if !strip_exe {
        return false;
    }
    let base = match candidate.len().checked_sub(4) {
        Some(cut)
            if candidate.is_char_boundary(cut)
                && candidate[cut..].eq_ignore_ascii_case(".exe") =>
        {
            &candidate[..cut]
        }
        _ => candidate,
    };
    base.eq_ignore_ascii_case(wanted)
}

/// Pids whose `sysinfo` name matches `name`. Used where no procfs exists.
pub(crate) fn sysinfo_pids_by_name(
    system: &Mutex<System>,
    name: &str,
    strip_exe: bool,
) -> Vec<u32> {
    let mut sys = lock_unpoisoned(system);
    sys.refresh_processes_specifics(ProcessesToUpdate::All, true, ProcessRefreshKind::nothing());
    let mut pids: Vec<u32> = sys
        .processes()
        .values()
        .filter(|p| process_name_matches(&p.name().to_string_lossy(), name, strip_exe))
        .map(|p| p.pid().as_u32())
        .collect();
    pids.sort_unstable();
    pids
}
