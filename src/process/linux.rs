// Linux process sampler and name resolution over /proc/<pid>

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tracing::instrument;

use super::{ProcessSampler, ProcessSource, local_machine_name};
use crate::SamplingOptions;
use crate::lock_unpoisoned;
use crate::models::ProcessMemory;
use crate::parse::procfs::{self, ProcStatus};
use crate::rate::{self, SampleState};
use crate::source::FileSystem;

const PROC_ROOT: &str = "/proc";

/// `/proc/<pid>/comm` holds at most 15 bytes of the command name.
const COMM_MAX_LEN: usize = 15;

fn pid_path(pid: u32, file: &str) -> PathBuf {
    Path::new(PROC_ROOT).join(pid.to_string()).join(file)
}

fn comm_matches(comm: &str, wanted: &str) -> bool {
    if comm == wanted {
        return true;
    }
    wanted.len() > COMM_MAX_LEN && wanted.get(..COMM_MAX_LEN) == Some(comm)
}

/// Resolves names by scanning `/proc/<pid>/comm`.
pub struct ProcfsProcessSource {
    fs: Arc<dyn FileSystem>,
    options: SamplingOptions,
    machine_name: String,
}

impl ProcfsProcessSource {
    pub fn new(fs: Arc<dyn FileSystem>, options: SamplingOptions) -> Self {
        Self {
            fs,
            options,
            machine_name: local_machine_name(),
        }
    }

    pub fn with_machine_name(mut self, machine_name: impl Into<String>) -> Self {
        self.machine_name = machine_name.into();
        self
    }

    fn comm(&self, pid: u32) -> Option<String> {
        if let Ok(comm) = self.fs.read_to_string(&pid_path(pid, "comm")) {
            return Some(comm.trim_end_matches('\n').to_string());
        }
        let stat = self.fs.read_to_string(&pid_path(pid, "stat")).ok()?;
        procfs::parse_process_comm(&stat).map(str::to_string)
    }
}

impl ProcessSource for ProcfsProcessSource {
    #[instrument(skip(self), fields(source = "procfs", operation = "find_by_name"))]
    fn find_by_name(&self, name: &str) -> Vec<u32> {
        let entries = match self.fs.read_dir(Path::new(PROC_ROOT)) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!(error = %e, "process enumeration failed");
                return Vec::new();
            }
        };
        let mut pids: Vec<u32> = entries
            .iter()
            .filter_map(|p| p.file_name()?.to_str()?.parse::<u32>().ok())
            .filter(|pid| self.comm(*pid).is_some_and(|c| comm_matches(&c, name)))
            .collect();
        pids.sort_unstable();
        pids
    }

    fn open(&self, pid: u32) -> Option<Arc<dyn ProcessSampler>> {
        let name = self.comm(pid)?;
        Some(Arc::new(LinuxProcessSampler::new(
            pid,
            name,
            self.machine_name.clone(),
            self.fs.clone(),
            &self.options,
        )))
    }
}

pub struct LinuxProcessSampler {
    pid: u32,
    name: String,
    machine_name: String,
    fs: Arc<dyn FileSystem>,
    cpu: Mutex<SampleState<u64>>,
    ticks_per_second: u64,
    logical_cpus: usize,
    released: AtomicBool,
}

impl std::fmt::Debug for LinuxProcessSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinuxProcessSampler")
            .field("pid", &self.pid)
            .field("name", &self.name)
            .field("released", &self.is_released())
            .finish()
    }
}

impl LinuxProcessSampler {
    pub fn new(
        pid: u32,
        name: String,
        machine_name: String,
        fs: Arc<dyn FileSystem>,
        options: &SamplingOptions,
    ) -> Self {
        Self {
            pid,
            name,
            machine_name,
            fs,
            cpu: Mutex::new(SampleState::new(options.min_cpu_interval)),
            ticks_per_second: options.clock_ticks_per_second,
            logical_cpus: options.logical_cpus,
            released: AtomicBool::new(false),
        }
    }

    fn live(&self) -> Option<()> {
        (!self.is_released()).then_some(())
    }

    fn read(&self, file: &str) -> Option<String> {
        self.live()?;
        match self.fs.read_to_string(&pid_path(self.pid, file)) {
            Ok(content) => Some(content),
            Err(e) => {
                tracing::debug!(pid = self.pid, file, error = %e, "process source read failed");
                None
            }
        }
    }

    fn status(&self) -> Option<ProcStatus> {
        self.read("status").map(|c| procfs::parse_proc_status(&c))
    }
}

impl ProcessSampler for LinuxProcessSampler {
    fn process_id(&self) -> Option<u32> {
        self.live().map(|_| self.pid)
    }

    fn process_name(&self) -> String {
        if self.is_released() {
            return String::new();
        }
        self.name.clone()
    }

    fn machine_name(&self) -> String {
        if self.is_released() {
            return String::new();
        }
        self.machine_name.clone()
    }

    /// No window titles outside Windows.
    fn process_title(&self) -> String {
        String::new()
    }

    #[instrument(skip(self), fields(sampler = "linux", pid = self.pid, operation = "cpu_utilization_percent"))]
    fn cpu_utilization_percent(&self) -> Option<f64> {
        let stat = self.read("stat")?;
        let current = procfs::parse_process_cpu_times(&stat)?.total();
        let mut state = lock_unpoisoned(&self.cpu);
        Some(match state.advance(current, Instant::now()) {
            Some((prev, elapsed)) => rate::process_cpu_percent(
                current as i64 - prev as i64,
                self.ticks_per_second,
                elapsed,
                self.logical_cpus,
            ),
            None => 0.0,
        })
    }

    fn handle_count(&self) -> Option<u64> {
        self.live()?;
        match self.fs.read_dir(&pid_path(self.pid, "fd")) {
            Ok(entries) => Some(entries.len() as u64),
            Err(e) => {
                tracing::debug!(pid = self.pid, error = %e, "fd directory unreadable");
                None
            }
        }
    }

    fn thread_count(&self) -> Option<u64> {
        self.status()?.threads
    }

    fn memory(&self) -> ProcessMemory {
        let Some(status) = self.status() else {
            return ProcessMemory::default();
        };
        ProcessMemory {
            private: status.private_bytes(),
            virtual_: status.vm_size,
            working_set: status.vm_rss,
            peak_virtual: status.vm_peak,
            peak_working_set: status.vm_hwm,
            ..Default::default()
        }
    }

    fn release(&self) {
        if !self.released.swap(true, Ordering::AcqRel) {
            tracing::trace!(pid = self.pid, "process sampler released");
        }
    }

    fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }
}
