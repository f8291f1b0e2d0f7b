// Windows process sampler over a process handle plus a Toolhelp thread lookup

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use tracing::instrument;
use windows_sys::Win32::Foundation::{
    CloseHandle, FILETIME, HANDLE, HWND, INVALID_HANDLE_VALUE, LPARAM,
};
use windows_sys::Win32::System::Diagnostics::ToolHelp::{
    CreateToolhelp32Snapshot, PROCESSENTRY32W, Process32FirstW, Process32NextW,
    TH32CS_SNAPPROCESS,
};
use windows_sys::Win32::System::ProcessStatus::{
    K32GetProcessMemoryInfo, PROCESS_MEMORY_COUNTERS, PROCESS_MEMORY_COUNTERS_EX,
};
use windows_sys::Win32::System::Threading::{
    GetProcessHandleCount, GetProcessTimes, OpenProcess, PROCESS_QUERY_LIMITED_INFORMATION,
};
use windows_sys::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GW_OWNER, GetWindow, GetWindowTextW, GetWindowThreadProcessId, IsWindowVisible,
};

use super::{ProcessSampler, ProcessSource, local_machine_name, sysinfo_pids_by_name};
use crate::SamplingOptions;
use crate::lock_unpoisoned;
use crate::models::ProcessMemory;
use crate::rate::{self, SampleState};

pub struct WindowsProcessSource {
    system: Mutex<System>,
    options: SamplingOptions,
    machine_name: String,
}

impl WindowsProcessSource {
    pub fn new(options: SamplingOptions) -> Self {
        Self {
            system: Mutex::new(System::new()),
            options,
            machine_name: local_machine_name(),
        }
    }
}

impl ProcessSource for WindowsProcessSource {
    fn find_by_name(&self, name: &str) -> Vec<u32> {
        sysinfo_pids_by_name(&self.system, name, true)
    }

    fn open(&self, pid: u32) -> Option<Arc<dyn ProcessSampler>> {
        let name = {
            let mut system = lock_unpoisoned(&self.system);
            let pids = [Pid::from_u32(pid)];
            system.refresh_processes_specifics(
                ProcessesToUpdate::Some(&pids),
                true,
                ProcessRefreshKind::nothing(),
            );
            system.process(pids[0])?.name().to_string_lossy().into_owned()
        };
        let sampler =
            WindowsProcessSampler::open(pid, name, self.machine_name.clone(), &self.options);
        Some(Arc::new(sampler))
    }
}

/// Owned process handle, closed exactly once.
struct ProcessHandle(HANDLE);

// The handle is only used under the sampler's mutex.
unsafe impl Send for ProcessHandle {}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        // SAFETY: the handle came from OpenProcess and is closed only here.
        unsafe {
            CloseHandle(self.0);
        }
    }
}

fn filetime_to_duration(ft: &FILETIME) -> Duration {
    let ticks = (u64::from(ft.dwHighDateTime) << 32) | u64::from(ft.dwLowDateTime);
    // FILETIME counts 100ns intervals.
    Duration::from_nanos(ticks.saturating_mul(100))
}

/// `cntThreads` of the Toolhelp entry for `pid`.
fn toolhelp_thread_count(pid: u32) -> Option<u64> {
    // SAFETY: the snapshot is closed before returning; the entry is sized per API contract.
    unsafe {
        let snapshot = CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0);
        if snapshot == INVALID_HANDLE_VALUE {
            return None;
        }
        let mut entry: PROCESSENTRY32W = std::mem::zeroed();
        entry.dwSize = std::mem::size_of::<PROCESSENTRY32W>() as u32;
        let mut found = None;
        let mut more = Process32FirstW(snapshot, &mut entry) != 0;
        while more {
            if entry.th32ProcessID == pid {
                found = Some(u64::from(entry.cntThreads));
                break;
            }
            more = Process32NextW(snapshot, &mut entry) != 0;
        }
        CloseHandle(snapshot);
        found
    }
}

struct TitleSearch {
    pid: u32,
    title: Option<String>,
}

/// `EnumWindows` callback: stops at the first visible, unowned top-level
/// window of the wanted process that has a caption.
unsafe extern "system" fn find_main_window(hwnd: HWND, lparam: LPARAM) -> i32 {
    // SAFETY: lparam is the `TitleSearch` passed by `main_window_title`.
    let search = unsafe { &mut *(lparam as *mut TitleSearch) };
    let mut owner_pid = 0u32;
    // SAFETY: hwnd comes from the enumeration and the out-pointer is a valid local.
    unsafe {
        GetWindowThreadProcessId(hwnd, &mut owner_pid);
        if owner_pid != search.pid
            || IsWindowVisible(hwnd) == 0
            || !GetWindow(hwnd, GW_OWNER).is_null()
        {
            return 1;
        }
        let mut buf = [0u16; 512];
        let len = GetWindowTextW(hwnd, buf.as_mut_ptr(), buf.len() as i32);
        if len <= 0 {
            return 1;
        }
        search.title = Some(String::from_utf16_lossy(&buf[..len as usize]));
    }
    0
}

fn main_window_title(pid: u32) -> String {
    let mut search = TitleSearch { pid, title: None };
    // SAFETY: `search` outlives the synchronous enumeration.
    unsafe {
        EnumWindows(Some(find_main_window), &mut search as *mut TitleSearch as LPARAM);
    }
    search.title.unwrap_or_default()
}

pub struct WindowsProcessSampler {
    pid: u32,
    name: String,
    machine_name: String,
    handle: Mutex<Option<ProcessHandle>>,
    system: Mutex<System>,
    cpu: Mutex<SampleState<Duration>>,
    logical_cpus: usize,
    released: AtomicBool,
}

impl std::fmt::Debug for WindowsProcessSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowsProcessSampler")
            .field("pid", &self.pid)
            .field("name", &self.name)
            .field("released", &self.is_released())
            .finish()
    }
}

impl WindowsProcessSampler {
    /// A process that denies query access (protected services, the idle
    /// process) still gets a sampler; handle-backed metrics are then `None`.
    pub fn open(pid: u32, name: String, machine_name: String, options: &SamplingOptions) -> Self {
        // SAFETY: plain FFI call; a null return signals failure.
        let raw = unsafe { OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, 0, pid) };
        let handle = if raw.is_null() {
            tracing::debug!(pid, "OpenProcess denied, handle metrics unavailable");
            None
        } else {
            Some(ProcessHandle(raw))
        };
        Self {
            pid,
            name,
            machine_name,
            handle: Mutex::new(handle),
            system: Mutex::new(System::new()),
            cpu: Mutex::new(SampleState::new(options.min_cpu_interval)),
            logical_cpus: options.logical_cpus,
            released: AtomicBool::new(false),
        }
    }

    fn with_handle<T>(&self, f: impl FnOnce(HANDLE) -> Option<T>) -> Option<T> {
        let guard = lock_unpoisoned(&self.handle);
        let handle = guard.as_ref()?;
        f(handle.0)
    }

    fn cpu_time(&self) -> Option<Duration> {
        self.with_handle(|h| {
            // SAFETY: out-pointers are valid locals.
            unsafe {
                let mut creation: FILETIME = std::mem::zeroed();
                let mut exit: FILETIME = std::mem::zeroed();
                let mut kernel: FILETIME = std::mem::zeroed();
                let mut user: FILETIME = std::mem::zeroed();
                if GetProcessTimes(h, &mut creation, &mut exit, &mut kernel, &mut user) == 0 {
                    return None;
                }
                Some(filetime_to_duration(&kernel) + filetime_to_duration(&user))
            }
        })
    }

    fn memory_counters(&self) -> Option<PROCESS_MEMORY_COUNTERS_EX> {
        self.with_handle(|h| {
            // SAFETY: the EX struct starts with the base layout and cb carries its size.
            unsafe {
                let mut counters: PROCESS_MEMORY_COUNTERS_EX = std::mem::zeroed();
                let size = std::mem::size_of::<PROCESS_MEMORY_COUNTERS_EX>() as u32;
                counters.cb = size;
                let ok = K32GetProcessMemoryInfo(
                    h,
                    (&mut counters as *mut PROCESS_MEMORY_COUNTERS_EX).cast::<PROCESS_MEMORY_COUNTERS>(),
                    size,
                );
                (ok != 0).then_some(counters)
            }
        })
    }

    fn virtual_bytes(&self) -> Option<u64> {
        let mut system = lock_unpoisoned(&self.system);
        let pids = [Pid::from_u32(self.pid)];
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&pids),
            true,
            ProcessRefreshKind::nothing().with_memory(),
        );
        system.process(pids[0]).map(|p| p.virtual_memory())
    }
}

impl ProcessSampler for WindowsProcessSampler {
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

    fn process_title(&self) -> String {
        if self.is_released() {
            return String::new();
        }
        main_window_title(self.pid)
    }

    #[instrument(skip(self), fields(sampler = "windows", pid = self.pid, operation = "cpu_utilization_percent"))]
    fn cpu_utilization_percent(&self) -> Option<f64> {
        let current = self.cpu_time()?;
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

    fn handle_count(&self) -> Option<u64> {
        self.with_handle(|h| {
            let mut count = 0u32;
            // SAFETY: out-pointer is a valid local.
            let ok = unsafe { GetProcessHandleCount(h, &mut count) };
            (ok != 0).then_some(u64::from(count))
        })
    }

    fn thread_count(&self) -> Option<u64> {
        if self.is_released() {
            return None;
        }
        toolhelp_thread_count(self.pid)
    }

    fn memory(&self) -> ProcessMemory {
        if self.is_released() {
            return ProcessMemory::default();
        }
        let counters = self.memory_counters();
        let field = |f: fn(&PROCESS_MEMORY_COUNTERS_EX) -> usize| counters.as_ref().map(|c| f(c) as u64);
        ProcessMemory {
            private: field(|c| c.PrivateUsage),
            virtual_: self.virtual_bytes(),
            working_set: field(|c| c.WorkingSetSize),
            paged_system: field(|c| c.QuotaPagedPoolUsage),
            non_paged_system: field(|c| c.QuotaNonPagedPoolUsage),
            peak_paged_system: field(|c| c.QuotaPeakPagedPoolUsage),
            peak_virtual: None,
            peak_working_set: field(|c| c.PeakWorkingSetSize),
        }
    }

    fn release(&self) {
        if !self.released.swap(true, Ordering::AcqRel) {
            lock_unpoisoned(&self.handle).take();
        }
    }

    fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }
}
