// Facade tests: name set, monitored processes, TCP filtering and disposal

mod common;

use std::net::SocketAddr;
use std::sync::Arc;

use common::*;
use perfstats::models::{TcpConnection, TcpState};
use perfstats::process::ProcfsProcessSource;
use perfstats::source::MemoryFs;
use perfstats::system::LinuxSystemSampler;
use perfstats::{PerformanceStatistics, PlatformType, StatsError};

fn addr(s: &str) -> SocketAddr {
    s.parse().unwrap()
}

fn conn(local: &str, remote: &str, state: TcpState) -> TcpConnection {
    TcpConnection {
        local: addr(local),
        remote: addr(remote),
        state,
    }
}

fn connections() -> Vec<TcpConnection> {
    vec![
        conn("10.0.0.5:22", "10.0.0.9:51000", TcpState::Established),
        conn("10.0.0.5:443", "10.0.0.9:51001", TcpState::Established),
        conn("10.0.0.5:443", "10.0.0.7:51002", TcpState::TimeWait),
        conn("10.0.0.5:52000", "93.184.216.34:443", TcpState::Established),
    ]
}

fn stats_over(fs: Arc<MemoryFs>, names: &[&str]) -> PerformanceStatistics {
    PerformanceStatistics::from_parts(
        PlatformType::Linux,
        Arc::new(LinuxSystemSampler::new(
            fs.clone(),
            Arc::new(host_volumes()),
            &test_options(),
        )),
        Arc::new(ProcfsProcessSource::new(fs, test_options())),
        Arc::new(StaticConnections(connections())),
        names.iter().copied(),
    )
}

fn host() -> Arc<MemoryFs> {
    let fs = proc_fs();
    add_process(&fs, 100, "nginx", 4, 3);
    add_process(&fs, 200, "postgres", 8, 10);
    fs
}

#[test]
fn test_create_on_supported_host() {
    let platform = PlatformType::current();
    match PerformanceStatistics::create(["nginx"]) {
        Ok(stats) => {
            assert!(platform.is_supported());
            assert_eq!(stats.platform(), platform);
            assert!(stats.monitored_process_names().contains("nginx"));
        }
        Err(StatsError::UnsupportedPlatform(name)) => {
            assert!(!platform.is_supported());
            assert_eq!(name, platform.to_string());
        }
    }
}

#[test]
fn test_unsupported_platform_message_names_supported_ones() {
    let err = StatsError::UnsupportedPlatform("unknown".into());
    let msg = err.to_string();
    assert!(msg.contains("unknown"));
    assert!(msg.contains("Linux"));
}

#[test]
fn test_monitored_names_are_deduplicated_and_mutable() {
    let stats = stats_over(host(), &["nginx", "nginx", "postgres"]);
    assert_eq!(stats.monitored_process_names().len(), 2);

    assert!(stats.add_monitored_process_name("redis"));
    assert!(!stats.add_monitored_process_name("redis"));
    assert!(stats.remove_monitored_process_name("nginx"));
    assert!(!stats.remove_monitored_process_name("nginx"));

    let names: Vec<_> = stats.monitored_process_names().into_iter().collect();
    assert_eq!(names, vec!["postgres".to_string(), "redis".to_string()]);

    stats.set_monitored_process_names(["mysqld"]);
    assert_eq!(stats.monitored_process_names().len(), 1);
}

#[test]
fn test_monitored_processes_follow_name_changes() {
    let stats = stats_over(host(), &["nginx"]);
    let first = stats.monitored_processes();
    assert_eq!(first.keys().collect::<Vec<_>>(), vec!["nginx"]);
    assert_eq!(first["nginx"].len(), 1);

    stats.add_monitored_process_name("redis");
    let second = stats.monitored_processes();
    assert!(second["redis"].is_empty());
    assert!(first["nginx"][0].is_released());
}

#[test]
fn test_system_counters_come_from_system_sampler() {
    let stats = stats_over(host(), &[]);
    let counters = stats.system_counters();
    assert_eq!(counters.memory_free_megabytes, Some(2000.0));
    assert_eq!(stats.system().disk_read_queue(), Some(3));
}

#[test]
fn test_tcp_filter_by_source_port() {
    let stats = stats_over(host(), &[]);
    let https = stats.active_tcp_connections(Some(443), None);
    assert_eq!(https.len(), 2);
    assert!(https.iter().all(|c| c.local_port() == 443));

    assert!(stats.active_tcp_connections(Some(8080), None).is_empty());
}

#[test]
fn test_tcp_filter_by_destination_and_both_ports() {
    let stats = stats_over(host(), &[]);
    let outbound = stats.active_tcp_connections(None, Some(443));
    assert_eq!(outbound.len(), 1);
    assert_eq!(outbound[0].local_port(), 52000);

    let exact = stats.active_tcp_connections(Some(443), Some(51002));
    assert_eq!(exact.len(), 1);
    assert_eq!(exact[0].state, TcpState::TimeWait);

    assert_eq!(stats.active_tcp_connections(None, None).len(), 4);
}

#[test]
fn test_dispose_is_idempotent_and_releases_processes() {
    let stats = stats_over(host(), &["nginx", "postgres"]);
    let generation = stats.monitored_processes();
    assert!(!stats.is_disposed());

    stats.dispose();
    stats.dispose();
    assert!(stats.is_disposed());
    assert!(generation.values().flatten().all(|s| s.is_released()));

    let after = stats.monitored_processes();
    assert_eq!(after.len(), 2);
    assert!(after.values().all(Vec::is_empty));
}

#[test]
fn test_drop_releases_processes() {
    let generation = {
        let stats = stats_over(host(), &["nginx"]);
        stats.monitored_processes()
    };
    assert!(generation["nginx"][0].is_released());
}

#[cfg(target_endian = "little")]
#[test]
fn test_proc_net_tcp_source_skips_listeners() {
    use perfstats::net::{ConnectionSource, ProcNetTcp};

    let fs = proc_fs();
    fs.set_file(
        "/proc/net/tcp",
        "  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode\n\
   0: 00000000:0016 00000000:0000 0A 00000000:00000000 00:00000000 00000000     0        0 11111 1 0000000000000000 100 0 0 10 0\n\
   1: 0100007F:1F90 0100007F:C350 01 00000000:00000000 00:00000000 00000000  1000        0 22222 1 0000000000000000 20 4 30 10 -1\n",
    );
    let source = ProcNetTcp::new(fs);
    let conns = source.tcp_connections();
    assert_eq!(conns.len(), 1);
    assert_eq!(conns[0].local, addr("127.0.0.1:8080"));
    assert_eq!(conns[0].remote, addr("127.0.0.1:50000"));
    assert_eq!(conns[0].state, TcpState::Established);
}
