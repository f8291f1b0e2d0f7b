// Shared test helpers: /proc fixtures, scripted commands, static volumes and connections
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use perfstats::SamplingOptions;
use perfstats::models::TcpConnection;
use perfstats::net::ConnectionSource;
use perfstats::source::{CommandRunner, MemoryFs};
use perfstats::system::{Volume, VolumeSource};

pub const GIB: u64 = 1024 * 1024 * 1024;

/// `cpu` line of `/proc/stat` with the given user/system/idle jiffies.
pub fn proc_stat(user: u64, system: u64, idle: u64) -> String {
    format!(
        "cpu  {user} 0 {system} {idle} 0 0 0 0 0 0\n\
cpu0 {user} 0 {system} {idle} 0 0 0 0 0 0\n\
intr 1462898\n\
ctxt 1990473\n"
    )
}

/// `/proc/diskstats` with one whole disk plus a partition and a loop device
/// that must not count.
pub fn diskstats(reads: u64, writes: u64, in_progress: u64) -> String {
    format!(
        "   7       0 loop0 900 0 900 10 0 0 0 0 0 10 10 0 0 0 0\n\
   8       0 sda {reads} 0 4096 120 {writes} 0 8192 340 {in_progress} 500 460 0 0 0 0\n\
   8       1 sda1 {reads} 0 4096 120 {writes} 0 8192 340 {in_progress} 500 460 0 0 0 0\n"
    )
}

pub const MEMINFO: &str = "MemTotal:       16384000 kB\n\
MemFree:          512000 kB\n\
MemAvailable:    2048000 kB\n\
Buffers:          102400 kB\n\
Cached:          1024000 kB\n";

/// A healthy `/proc` with aggregate CPU, memory and disk counters.
pub fn proc_fs() -> Arc<MemoryFs> {
    let fs = Arc::new(MemoryFs::new());
    fs.set_file("/proc/stat", proc_stat(100, 100, 800));
    fs.set_file("/proc/meminfo", MEMINFO);
    fs.set_file("/proc/diskstats", diskstats(1000, 2000, 6));
    fs
}

/// `/proc/<pid>/stat` with the given utime/stime ticks.
pub fn pid_stat(pid: u32, comm: &str, utime: u64, stime: u64) -> String {
    format!(
        "{pid} ({comm}) S 1 {pid} {pid} 0 -1 4194560 1200 0 3 0 {utime} {stime} 0 0 20 0 4 0 3456 104857600 2048 18446744073709551615\n"
    )
}

pub fn pid_status(comm: &str, threads: u64) -> String {
    format!(
        "Name:\t{comm}\n\
State:\tS (sleeping)\n\
VmPeak:\t  204800 kB\n\
VmSize:\t  102400 kB\n\
VmHWM:\t   16384 kB\n\
VmRSS:\t    8192 kB\n\
RssAnon:\t    4096 kB\n\
VmData:\t   12288 kB\n\
Threads:\t{threads}\n"
    )
}

/// Register a process under `/proc/<pid>` with `fds` open descriptors.
pub fn add_process(fs: &MemoryFs, pid: u32, comm: &str, threads: u64, fds: usize) {
    fs.set_file(format!("/proc/{pid}/comm"), format!("{comm}\n"));
    fs.set_file(format!("/proc/{pid}/stat"), pid_stat(pid, comm, 10, 5));
    fs.set_file(format!("/proc/{pid}/status"), pid_status(comm, threads));
    fs.add_dir(format!("/proc/{pid}/fd"));
    for fd in 0..fds {
        fs.set_file(format!("/proc/{pid}/fd/{fd}"), "");
    }
}

/// Options with deterministic CPU normalisation.
pub fn test_options() -> SamplingOptions {
    SamplingOptions {
        min_cpu_interval: Duration::from_millis(50),
        min_disk_interval: Duration::from_millis(100),
        command_timeout: Duration::from_secs(1),
        clock_ticks_per_second: 100,
        logical_cpus: 1,
    }
}

/// Command runner answering from a table keyed by `program args...`.
/// Unknown commands behave like a timeout or a failed exit: `None`.
#[derive(Default)]
pub struct ScriptedCommands {
    responses: Mutex<HashMap<String, String>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedCommands {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, command_line: &str, output: &str) -> &Self {
        self.responses
            .lock()
            .unwrap()
            .insert(command_line.to_string(), output.to_string());
        self
    }

    pub fn forget(&self, command_line: &str) {
        self.responses.lock().unwrap().remove(command_line);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl CommandRunner for ScriptedCommands {
    fn run(&self, program: &str, args: &[&str]) -> Option<String> {
        let mut line = program.to_string();
        for arg in args {
            line.push(' ');
            line.push_str(arg);
        }
        self.calls.lock().unwrap().push(line.clone());
        self.responses.lock().unwrap().get(&line).cloned()
    }
}

pub struct StaticVolumes(pub Vec<Volume>);

impl VolumeSource for StaticVolumes {
    fn volumes(&self) -> Vec<Volume> {
        self.0.clone()
    }
}

pub fn volume(mount: &str, fs: &str, available: u64, total: u64) -> Volume {
    Volume {
        mount_point: mount.to_string(),
        file_system: fs.to_string(),
        is_removable: false,
        available_bytes: available,
        total_bytes: total,
    }
}

/// A root disk, a network share and mounts that must be ignored.
pub fn host_volumes() -> StaticVolumes {
    StaticVolumes(vec![
        volume("/", "ext4", 40 * GIB, 100 * GIB),
        volume("/mnt/share", "nfs4", 10 * GIB, 50 * GIB),
        volume("/run", "tmpfs", GIB, GIB),
        volume("/snap/core22/1380", "squashfs", 0, GIB / 4),
    ])
}

pub struct StaticConnections(pub Vec<TcpConnection>);

impl ConnectionSource for StaticConnections {
    fn tcp_connections(&self) -> Vec<TcpConnection> {
        self.0.clone()
    }
}
