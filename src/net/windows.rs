// Windows TCP table from IP Helper

use std::ptr;

use tracing::instrument;
use windows_sys::Win32::Foundation::{ERROR_INSUFFICIENT_BUFFER, NO_ERROR};
use windows_sys::Win32::NetworkManagement::IpHelper::{
    GetExtendedTcpTable, MIB_TCP6ROW_OWNER_PID, MIB_TCP6TABLE_OWNER_PID, MIB_TCPROW_OWNER_PID,
    MIB_TCPTABLE_OWNER_PID, TCP_TABLE_OWNER_PID_ALL,
};
use windows_sys::Win32::Networking::WinSock::{AF_INET, AF_INET6};

use super::{ConnectionSource, active};
use crate::models::{TcpConnection, TcpState};
use crate::parse::netstat::{mib_endpoint_v4, mib_endpoint_v6};

/// The table can grow between the size query and the copy.
const MAX_ATTEMPTS: usize = 4;

/// Windows: `GetExtendedTcpTable` for the IPv4 and IPv6 tables.
#[derive(Debug, Default)]
pub struct IpHelperTcpTable;

impl IpHelperTcpTable {
    pub fn new() -> Self {
        Self
    }
}

/// Raw table bytes in a `u32` buffer so the rows are 4-byte aligned.
fn extended_table(family: u32) -> Option<Vec<u32>> {
    let mut size = 0u32;
    let mut buf: Vec<u32> = Vec::new();
    for _ in 0..MAX_ATTEMPTS {
        let table = if buf.is_empty() {
            ptr::null_mut()
        } else {
            buf.as_mut_ptr().cast()
        };
        let status = unsafe {
            GetExtendedTcpTable(table, &mut size, 0, family, TCP_TABLE_OWNER_PID_ALL, 0)
        };
        match status {
            NO_ERROR if !buf.is_empty() => return Some(buf),
            NO_ERROR | ERROR_INSUFFICIENT_BUFFER => {
                buf = vec![0u32; (size as usize).div_ceil(4).max(1)];
            }
            status => {
                tracing::debug!(family, status, "GetExtendedTcpTable failed");
                return None;
            }
        }
    }
    tracing::debug!(family, "tcp table kept growing");
    None
}

fn ipv4_connections() -> Vec<TcpConnection> {
    let Some(buf) = extended_table(u32::from(AF_INET)) else {
        return Vec::new();
    };
    // SAFETY: on success the buffer holds a MIB_TCPTABLE_OWNER_PID followed
    // by dwNumEntries rows.
    let rows: &[MIB_TCPROW_OWNER_PID] = unsafe {
        let table = buf.as_ptr().cast::<MIB_TCPTABLE_OWNER_PID>();
        std::slice::from_raw_parts((*table).table.as_ptr(), (*table).dwNumEntries as usize)
    };
    rows.iter()
        .map(|row| TcpConnection {
            local: mib_endpoint_v4(row.dwLocalAddr, row.dwLocalPort),
            remote: mib_endpoint_v4(row.dwRemoteAddr, row.dwRemotePort),
            state: TcpState::from_mib(row.dwState),
        })
        .collect()
}

fn ipv6_connections() -> Vec<TcpConnection> {
    let Some(buf) = extended_table(u32::from(AF_INET6)) else {
        return Vec::new();
    };
    // SAFETY: as above, for MIB_TCP6TABLE_OWNER_PID.
    let rows: &[MIB_TCP6ROW_OWNER_PID] = unsafe {
        let table = buf.as_ptr().cast::<MIB_TCP6TABLE_OWNER_PID>();
        std::slice::from_raw_parts((*table).table.as_ptr(), (*table).dwNumEntries as usize)
    };
    rows.iter()
        .map(|row| TcpConnection {
            local: mib_endpoint_v6(row.ucLocalAddr, row.dwLocalPort),
            remote: mib_endpoint_v6(row.ucRemoteAddr, row.dwRemotePort),
            state: TcpState::from_mib(row.dwState),
        })
        .collect()
}

impl ConnectionSource for IpHelperTcpTable {
    #[instrument(skip(self), fields(source = "iphlpapi", operation = "tcp_connections"))]
    fn tcp_connections(&self) -> Vec<TcpConnection> {
        let mut conns = ipv4_connections();
        conns.extend(ipv6_connections());
        active(conns)
    }
}
