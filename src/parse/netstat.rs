// TCP connection table parsers: /proc/net/tcp{,6}, BSD netstat, IP Helper rows

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use crate::models::{TcpConnection, TcpState};

fn parse_proc_ip(hex: &str) -> Option<IpAddr> {
    match hex.len() {
        8 => {
            let word = u32::from_str_radix(hex, 16).ok()?;
            Some(IpAddr::V4(Ipv4Addr::from(word.to_ne_bytes())))
        }
        32 => {
            // Four 32-bit words, each printed in host byte order.
            let mut octets = [0u8; 16];
            for (i, chunk) in octets.chunks_exact_mut(4).enumerate() {
                let word = u32::from_str_radix(hex.get(i * 8..i * 8 + 8)?, 16).ok()?;
                chunk.copy_from_slice(&word.to_ne_bytes());
            }
            Some(IpAddr::V6(Ipv6Addr::from(octets)))
        }
        _ => None,
    }
}

fn parse_proc_endpoint(field: &str) -> Option<SocketAddr> {
    let (ip, port) = field.split_once(':')?;
    Some(SocketAddr::new(
        parse_proc_ip(ip)?,
        u16::from_str_radix(port, 16).ok()?,
    ))
}

/// Rows of `/proc/net/tcp` or `/proc/net/tcp6`. The header and malformed rows are skipped.
pub fn parse_proc_net_tcp(content: &str) -> Vec<TcpConnection> {
    content
        .lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 4 {
                return None;
            }
            Some(TcpConnection {
                local: parse_proc_endpoint(parts[1])?,
                remote: parse_proc_endpoint(parts[2])?,
                state: TcpState::from_proc_hex(parts[3]),
            })
        })
        .collect()
}

fn parse_host(host: &str, v6: bool) -> Option<IpAddr> {
    let host = host.trim_start_matches('[').trim_end_matches(']');
    let host = host.split_once('%').map_or(host, |(h, _)| h);
    if host == "*" {
        return Some(if v6 {
            IpAddr::V6(Ipv6Addr::UNSPECIFIED)
        } else {
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        });
    }
    host.parse().ok()
}

fn parse_port(port: &str) -> Option<u16> {
    if port == "*" { Some(0) } else { port.parse().ok() }
}

/// BSD style endpoint: `192.168.1.10.52345`, `fe80::1%lo0.1023`, `*.22`, `*.*`.
fn parse_bsd_endpoint(field: &str, v6: bool) -> Option<SocketAddr> {
    let (host, port) = field.rsplit_once('.')?;
    Some(SocketAddr::new(parse_host(host, v6)?, parse_port(port)?))
}

/// `netstat -anp tcp` on macOS.
pub fn parse_bsd_netstat(output: &str) -> Vec<TcpConnection> {
    output
        .lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 6 || !parts[0].starts_with("tcp") {
                return None;
            }
            let v6 = parts[0].ends_with('6');
            Some(TcpConnection {
                local: parse_bsd_endpoint(parts[3], v6)?,
                remote: parse_bsd_endpoint(parts[4], v6)?,
                state: TcpState::from_netstat(parts[5]),
            })
        })
        .collect()
}

/// Endpoint of an IP Helper IPv4 row. The address and the low 16 bits of
/// the port are stored in network byte order.
pub fn mib_endpoint_v4(addr: u32, port: u32) -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::from(addr.to_ne_bytes())), mib_port(port))
}

/// Endpoint of an IP Helper IPv6 row.
pub fn mib_endpoint_v6(addr: [u8; 16], port: u32) -> SocketAddr {
    SocketAddr::new(IpAddr::V6(Ipv6Addr::from(addr)), mib_port(port))
}

fn mib_port(raw: u32) -> u16 {
    u16::from_be(raw as u16)
}
