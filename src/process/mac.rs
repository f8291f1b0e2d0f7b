// macOS process sampler over sysinfo, with thread counts from ps

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

use super::{ProcessSampler, ProcessSource, local_machine_name, sysinfo_pids_by_name};
use crate::SamplingOptions;
use crate::lock_unpoisoned;
use crate::models::ProcessMemory;
use crate::parse::darwin;
use crate::rate::{self, SampleState};
use crate::source::CommandRunner;

const PS: &str = "/bin/ps";

pub struct MacProcessSource {
    system: Mutex<System>,
    commands: Arc<dyn CommandRunner>,
    options: SamplingOptions,
    machine_name: String,
}

impl MacProcessSource {
    pub fn new(commands: Arc<dyn CommandRunner>, options: SamplingOptions) -> Self {
        Self {
            system: Mutex::new(System::new()),
            commands,
            options,
            machine_name: local_machine_name(),
        }
    }
}

impl ProcessSource for MacProcessSource {
    fn find_by_name(&self, name: &str) -> Vec<u32> {
        sysinfo_pids_by_name(&self.system, name, false)
    }

    fn open(&self, pid: u32) -> Option<Arc<dyn ProcessSampler>> {
        let sampler = MacProcessSampler::new(
            pid,
            self.machine_name.clone(),
            self.commands.clone(),
            &self.options,
        )?;
        Some(Arc::new(sampler))
    }
}

/// Values read in one refresh of the process entry.
struct Observed {
    cpu_time: Duration,
    resident: u64,
    virtual_: u64,
}

pub struct MacProcessSampler {
    pid: u32,
    name: String,
    machine_name: String,
    system: Mutex<System>,
    commands: Arc<dyn CommandRunner>,
    cpu: Mutex<SampleState<Duration>>,
    logical_cpus: usize,
    released: AtomicBool,
}

impl std::fmt::Debug for MacProcessSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MacProcessSampler")
            .field("pid", &self.pid)
            .field("name", &self.name)
            .field("released", &self.is_released())
            .finish()
    }
}

impl MacProcessSampler {
    /// `None` if the process is already gone.
    pub fn new(
        pid: u32,
        machine_name: String,
        commands: Arc<dyn CommandRunner>,
        options: &SamplingOptions,
    ) -> Option<Self> {
        let mut system = System::new();
        let name = {
            refresh(&mut system, pid);
            system
                .process(Pid::from_u32(pid))?
                .name()
                .to_string_lossy()
                .into_owned()
        };
        Some(Self {
            pid,
            name,
            machine_name,
            system: Mutex::new(system),
            commands,
            cpu: Mutex::new(SampleState::new(options.min_cpu_interval)),
            logical_cpus: options.logical_cpus,
            released: AtomicBool::new(false),
        })
    }

    fn observe(&self) -> Option<Observed> {
        if self.is_released() {
            return None;
        }
        let mut system = lock_unpoisoned(&self.system);
        refresh(&mut system, self.pid);
        let process = system.process(Pid::from_u32(self.pid))?;
        Some(Observed {
            cpu_time: Duration::from_millis(process.accumulated_cpu_time()),
            resident: process.memory(),
            virtual_: process.virtual_memory(),
        })
    }
}

fn refresh(system: &mut System, pid: u32) {
    system.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[Pid::from_u32(pid)]),
        true,
        ProcessRefreshKind::nothing().with_cpu().with_memory(),
    );
}

impl ProcessSampler for MacProcessSampler {
    fn process_id(&self) -> Option<u32> {
        (!self.is_released()).then_some(self.pid)
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

    fn cpu_utilization_percent(&self) -> Option<f64> {
        let current = self.observe()?.cpu_time;
        let mut state = lock_unpoisoned(&self.cpu);
        Some(match state.advance(current, Instant::now()) {
            Some((prev, elapsed)) => rate::process_cpu_percent_from_time(
                current.saturating_sub(prev),
                elapsed,
                self.logical_cpus,
            ),
            None => 0.0,
        })
    }

    /// Not exposed without elevated privileges.
    fn handle_count(&self) -> Option<u64> {
        None
    }

    fn thread_count(&self) -> Option<u64> {
        if self.is_released() {
            return None;
        }
        let pid = self.pid.to_string();
        let out = self.commands.run(PS, &["-M", "-p", &pid])?;
        darwin::parse_ps_thread_count(&out)
    }

    fn memory(&self) -> ProcessMemory {
        let Some(observed) = self.observe() else {
            return ProcessMemory::default();
        };
        ProcessMemory {
            virtual_: Some(observed.virtual_),
            working_set: Some(observed.resident),
            ..Default::default()
        }
    }

    fn release(&self) {
        if !self.released.swap(true, Ordering::AcqRel) {
            // Drop the cached process table along with the handle.
            *lock_unpoisoned(&self.system) = System::new();
        }
    }

    fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }
}
