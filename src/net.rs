// Active TCP connection enumeration and port filtering

use std::path::Path;
use std::sync::Arc;

use tracing::instrument;

use crate::models::{TcpConnection, TcpState};
use crate::parse::netstat;
use crate::source::{CommandRunner, FileSystem};

#[cfg(windows)]
mod windows;

#[cfg(windows)]
pub use windows::IpHelperTcpTable;

const PROC_NET_TCP: &str = "/proc/net/tcp";
const PROC_NET_TCP6: &str = "/proc/net/tcp6";
const NETSTAT_BSD: &str = "/usr/sbin/netstat";

/// Snapshot of the host's TCP table. Never cached; listening sockets are
/// left out.
pub trait ConnectionSource: Send + Sync {
    fn tcp_connections(&self) -> Vec<TcpConnection>;
}

fn active(conns: Vec<TcpConnection>) -> Vec<TcpConnection> {
    conns
        .into_iter()
        .filter(|c| c.state != TcpState::Listen)
        .collect()
}

/// Keep connections whose local port equals `source_port` and whose remote
/// port equals `dest_port`; an absent filter matches everything.
pub fn filter_connections(
    conns: Vec<TcpConnection>,
    source_port: Option<u16>,
    dest_port: Option<u16>,
) -> Vec<TcpConnection> {
    conns
        .into_iter()
        .filter(|c| source_port.is_none_or(|p| c.local_port() == p))
        .filter(|c| dest_port.is_none_or(|p| c.remote_port() == p))
        .collect()
}

/// Linux: `/proc/net/tcp` and `/proc/net/tcp6`.
pub struct ProcNetTcp {
    fs: Arc<dyn FileSystem>,
}

impl ProcNetTcp {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }
}

impl ConnectionSource for ProcNetTcp {
    #[instrument(skip(self), fields(source = "procfs", operation = "tcp_connections"))]
    fn tcp_connections(&self) -> Vec<TcpConnection> {
        let mut conns = Vec::new();
        for path in [PROC_NET_TCP, PROC_NET_TCP6] {
            match self.fs.read_to_string(Path::new(path)) {
                Ok(content) => conns.extend(netstat::parse_proc_net_tcp(&content)),
                // tcp6 is missing when IPv6 is disabled.
                Err(e) => tracing::debug!(path, error = %e, "tcp table unreadable"),
            }
        }
        active(conns)
    }
}

/// macOS: `netstat -anp tcp`.
pub struct BsdNetstat {
    commands: Arc<dyn CommandRunner>,
}

impl BsdNetstat {
    pub fn new(commands: Arc<dyn CommandRunner>) -> Self {
        Self { commands }
    }
}

impl ConnectionSource for BsdNetstat {
    #[instrument(skip(self), fields(source = "netstat", operation = "tcp_connections"))]
    fn tcp_connections(&self) -> Vec<TcpConnection> {
        self.commands
            .run(NETSTAT_BSD, &["-anp", "tcp"])
            .map(|out| active(netstat::parse_bsd_netstat(&out)))
            .unwrap_or_default()
    }
}
