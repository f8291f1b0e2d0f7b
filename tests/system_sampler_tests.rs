// System sampler tests over an in-memory /proc and scripted diagnostic commands

mod common;

use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;

use common::*;
use perfstats::SamplingOptions;
use perfstats::system::{LinuxSystemSampler, MacSystemSampler, SystemSampler};

fn linux_sampler(fs: Arc<perfstats::source::MemoryFs>, options: &SamplingOptions) -> LinuxSystemSampler {
    LinuxSystemSampler::new(fs, Arc::new(host_volumes()), options)
}

#[test]
fn test_first_cpu_read_is_neutral() {
    let sampler = linux_sampler(proc_fs(), &test_options());
    assert_eq!(sampler.cpu_utilization_percent(), Some(0.0));
}

#[test]
fn test_cpu_rate_after_gate() {
    let fs = proc_fs();
    let sampler = linux_sampler(fs.clone(), &test_options());
    assert_eq!(sampler.cpu_utilization_percent(), Some(0.0));

    // +200 total jiffies, +100 idle.
    fs.set_file("/proc/stat", proc_stat(150, 150, 900));
    sleep(Duration::from_millis(80));
    assert_eq!(sampler.cpu_utilization_percent(), Some(50.0));
}

#[test]
fn test_cpu_rate_is_zero_without_tick_progress() {
    let sampler = linux_sampler(proc_fs(), &test_options());
    sampler.cpu_utilization_percent();
    sleep(Duration::from_millis(80));
    assert_eq!(sampler.cpu_utilization_percent(), Some(0.0));
}

#[test]
fn test_cpu_below_gate_is_neutral_and_advances_baseline() {
    let fs = proc_fs();
    let options = SamplingOptions {
        min_cpu_interval: Duration::from_millis(300),
        ..test_options()
    };
    let sampler = linux_sampler(fs.clone(), &options);
    sampler.cpu_utilization_percent();

    fs.set_file("/proc/stat", proc_stat(1100, 100, 800));
    assert_eq!(sampler.cpu_utilization_percent(), Some(0.0));

    // The fully busy interval above was consumed by the gated call; only the
    // idle interval below is measured.
    fs.set_file("/proc/stat", proc_stat(1100, 100, 1800));
    sleep(Duration::from_millis(350));
    assert_eq!(sampler.cpu_utilization_percent(), Some(0.0));
}

#[test]
fn test_cpu_stays_within_bounds_on_counter_reset() {
    let fs = proc_fs();
    let sampler = linux_sampler(fs.clone(), &test_options());
    sampler.cpu_utilization_percent();
    fs.set_file("/proc/stat", proc_stat(10, 10, 10));
    sleep(Duration::from_millis(80));
    let cpu = sampler.cpu_utilization_percent().unwrap();
    assert!((0.0..=100.0).contains(&cpu), "cpu {cpu}");
}

#[test]
fn test_missing_cpu_source_is_absent_then_recovers() {
    let fs = proc_fs();
    let sampler = linux_sampler(fs.clone(), &test_options());
    fs.remove("/proc/stat");
    assert_eq!(sampler.cpu_utilization_percent(), None);

    fs.set_file("/proc/stat", proc_stat(100, 100, 800));
    assert_eq!(sampler.cpu_utilization_percent(), Some(0.0));
    fs.set_file("/proc/stat", proc_stat(200, 100, 900));
    sleep(Duration::from_millis(80));
    assert_eq!(sampler.cpu_utilization_percent(), Some(50.0));
}

#[test]
fn test_memory_prefers_mem_available() {
    let sampler = linux_sampler(proc_fs(), &test_options());
    assert_eq!(sampler.memory_free_megabytes(), Some(2000.0));
}

#[test]
fn test_memory_falls_back_to_free_buffers_cached() {
    let fs = proc_fs();
    fs.set_file(
        "/proc/meminfo",
        "MemTotal: 16384 kB\nMemFree: 1024 kB\nBuffers: 1024 kB\nCached: 2048 kB\n",
    );
    let sampler = linux_sampler(fs, &test_options());
    assert_eq!(sampler.memory_free_megabytes(), Some(4.0));
}

#[test]
fn test_disk_ops_first_read_is_neutral() {
    let sampler = linux_sampler(proc_fs(), &test_options());
    assert_eq!(sampler.disk_read_operations(), Some(0));
    assert_eq!(sampler.disk_write_operations(), Some(0));
}

#[test]
fn test_disk_ops_after_gate() {
    let fs = proc_fs();
    let sampler = linux_sampler(fs.clone(), &test_options());
    sampler.disk_read_operations();
    sampler.disk_write_operations();

    fs.set_file("/proc/diskstats", diskstats(1100, 2000, 6));
    sleep(Duration::from_millis(150));
    let reads = sampler.disk_read_operations().unwrap();
    // 100 reads over at least 150 ms.
    assert!(reads > 0 && reads <= 667, "reads {reads}");
    assert_eq!(sampler.disk_write_operations(), Some(0));
}

#[test]
fn test_disk_ops_below_gate_are_zero() {
    let fs = proc_fs();
    let options = SamplingOptions {
        min_disk_interval: Duration::from_secs(3600),
        ..test_options()
    };
    let sampler = linux_sampler(fs.clone(), &options);
    sampler.disk_read_operations();
    fs.set_file("/proc/diskstats", diskstats(50_000, 2000, 6));
    assert_eq!(sampler.disk_read_operations(), Some(0));
}

#[test]
fn test_disk_read_and_write_windows_are_independent() {
    let fs = proc_fs();
    let sampler = linux_sampler(fs.clone(), &test_options());
    sampler.disk_read_operations();

    fs.set_file("/proc/diskstats", diskstats(1100, 3000, 6));
    sleep(Duration::from_millis(150));
    // Reading writes for the first time only establishes its baseline.
    assert_eq!(sampler.disk_write_operations(), Some(0));
    assert!(sampler.disk_read_operations().unwrap() > 0);
}

#[test]
fn test_disk_queue_splits_in_flight_count() {
    let fs = proc_fs();
    fs.set_file("/proc/diskstats", diskstats(1000, 2000, 7));
    let sampler = linux_sampler(fs, &test_options());
    assert_eq!(sampler.disk_read_queue(), Some(3));
    assert_eq!(sampler.disk_write_queue(), Some(3));
}

#[test]
fn test_missing_disk_source_is_absent() {
    let fs = proc_fs();
    fs.remove("/proc/diskstats");
    let sampler = linux_sampler(fs, &test_options());
    assert_eq!(sampler.disk_read_operations(), None);
    assert_eq!(sampler.disk_read_queue(), None);
}

#[test]
fn test_disk_space_counts_fixed_and_network_volumes() {
    let sampler = linux_sampler(proc_fs(), &test_options());
    let space = sampler.disk_space().unwrap();
    assert_eq!(space.free_bytes, 50 * GIB);
    assert_eq!(space.total_bytes, 150 * GIB);

    let counters = sampler.sample();
    let free = counters.disk_free_megabytes.unwrap();
    let used = counters.disk_used_megabytes.unwrap();
    let size = counters.disk_size_megabytes.unwrap();
    assert!((free + used - size).abs() <= size * 0.01);
    assert_eq!(counters.disk_free_percent, Some(33.0));
}

#[test]
fn test_sample_collects_every_metric() {
    let sampler = linux_sampler(proc_fs(), &test_options());
    let counters = sampler.sample();
    assert_eq!(counters.cpu_utilization_percent, Some(0.0));
    assert_eq!(counters.memory_free_megabytes, Some(2000.0));
    assert_eq!(counters.disk_read_operations, Some(0));
    assert_eq!(counters.disk_write_queue, Some(3));
    assert!(counters.disk_size_megabytes.is_some());
}

const TOP: &str = "Processes: 512 total, 2 running, 510 sleeping, 2300 threads\n\
2024/01/01 12:00:00\n\
Load Avg: 1.50, 1.60, 1.70\n\
CPU usage: 5.55% user, 8.33% sys, 86.11% idle\n";

const VM_STAT: &str = "Mach Virtual Memory Statistics: (page size of 16384 bytes)\n\
Pages free:                               1000.\n\
Pages active:                           200000.\n\
Pages speculative:                         200.\n\
Pages purgeable:                            80.\n";

const IOSTAT: &str = "              disk0               disk2\n\
    KB/t  tps  MB/s     KB/t  tps  MB/s\n\
   20.00   99  1.93    10.00    1  0.01\n\
   16.00   20  0.31     8.00    2  0.02\n";

fn mac_commands() -> Arc<ScriptedCommands> {
    let commands = Arc::new(ScriptedCommands::new());
    commands
        .respond("/usr/bin/top -l 1 -n 0 -s 0", TOP)
        .respond("/usr/bin/vm_stat", VM_STAT)
        .respond("/usr/sbin/sysctl -n hw.pagesize", "16384\n")
        .respond("/usr/sbin/iostat -d -c 2", IOSTAT);
    commands
}

fn mac_sampler(commands: Arc<ScriptedCommands>) -> MacSystemSampler {
    let volumes = StaticVolumes(vec![
        volume("/", "apfs", 100 * GIB, 500 * GIB),
        volume("/Volumes/share", "smbfs", 10 * GIB, 10 * GIB),
    ]);
    MacSystemSampler::new(commands, Arc::new(volumes))
}

#[test]
fn test_mac_cpu_from_top_idle() {
    let sampler = mac_sampler(mac_commands());
    assert_eq!(sampler.cpu_utilization_percent(), Some(14.0));
}

#[test]
fn test_mac_memory_from_vm_stat_pages() {
    let sampler = mac_sampler(mac_commands());
    // (1000 + 200 + 80) pages * 16 KiB = 20 MiB
    assert_eq!(sampler.memory_free_megabytes(), Some(20.0));
}

#[test]
fn test_mac_memory_uses_default_page_size_when_sysctl_fails() {
    let commands = mac_commands();
    commands.forget("/usr/sbin/sysctl -n hw.pagesize");
    let sampler = mac_sampler(commands);
    assert_eq!(sampler.memory_free_megabytes(), Some(5.0));
}

#[test]
fn test_mac_disk_ops_split_second_iostat_sample() {
    let sampler = mac_sampler(mac_commands());
    // 20 + 2 transfers per second, half attributed to each direction.
    assert_eq!(sampler.disk_read_operations(), Some(11));
    assert_eq!(sampler.disk_write_operations(), Some(11));
    assert_eq!(sampler.disk_read_queue(), None);
    assert_eq!(sampler.disk_write_queue(), None);
}

#[test]
fn test_mac_failed_commands_are_absent() {
    let sampler = mac_sampler(Arc::new(ScriptedCommands::new()));
    assert_eq!(sampler.cpu_utilization_percent(), None);
    assert_eq!(sampler.memory_free_megabytes(), None);
    assert_eq!(sampler.disk_read_operations(), None);
}

#[test]
fn test_mac_disk_space_counts_fixed_volumes_only() {
    let sampler = mac_sampler(mac_commands());
    let space = sampler.disk_space().unwrap();
    assert_eq!(space.free_bytes, 100 * GIB);
    assert_eq!(space.total_bytes, 500 * GIB);
}

#[cfg(target_os = "linux")]
#[test]
fn test_real_host_linux_sampler() {
    use perfstats::source::RealFs;
    use perfstats::system::SysinfoVolumes;

    let sampler = LinuxSystemSampler::new(
        Arc::new(RealFs),
        Arc::new(SysinfoVolumes),
        &SamplingOptions::default(),
    );
    assert_eq!(sampler.cpu_utilization_percent(), Some(0.0));
    sleep(Duration::from_millis(200));
    let cpu = sampler.cpu_utilization_percent().unwrap();
    assert!((0.0..=100.0).contains(&cpu));
    assert!(sampler.memory_free_megabytes().unwrap() > 0.0);
    if let Some(space) = sampler.disk_space() {
        assert!(space.free_bytes <= space.total_bytes);
    }
}
