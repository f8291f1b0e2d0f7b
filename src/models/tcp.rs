// TCP connection records

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TcpState {
    Established,
    SynSent,
    SynReceived,
    FinWait1,
    FinWait2,
    TimeWait,
    Closed,
    CloseWait,
    LastAck,
    Listen,
    Closing,
    DeleteTcb,
    Unknown,
}

impl TcpState {
    /// Kernel state code as printed in `/proc/net/tcp` (`st` column, hex).
    pub fn from_proc_hex(hex: &str) -> Self {
        match hex {
            "01" => TcpState::Established,
            "02" => TcpState::SynSent,
            "03" => TcpState::SynReceived,
            "04" => TcpState::FinWait1,
            "05" => TcpState::FinWait2,
            "06" => TcpState::TimeWait,
            "07" => TcpState::Closed,
            "08" => TcpState::CloseWait,
            "09" => TcpState::LastAck,
            "0A" => TcpState::Listen,
            "0B" => TcpState::Closing,
            _ => TcpState::Unknown,
        }
    }

    /// `MIB_TCP_STATE` value from the Windows IP Helper tables.
    pub fn from_mib(state: u32) -> Self {
        match state {
            1 => TcpState::Closed,
            2 => TcpState::Listen,
            3 => TcpState::SynSent,
            4 => TcpState::SynReceived,
            5 => TcpState::Established,
            6 => TcpState::FinWait1,
            7 => TcpState::FinWait2,
            8 => TcpState::CloseWait,
            9 => TcpState::Closing,
            10 => TcpState::LastAck,
            11 => TcpState::TimeWait,
            12 => TcpState::DeleteTcb,
            _ => TcpState::Unknown,
        }
    }

    /// State label as printed by BSD `netstat`.
    pub fn from_netstat(label: &str) -> Self {
        match label.to_ascii_uppercase().as_str() {
            "ESTABLISHED" => TcpState::Established,
            "SYN_SENT" => TcpState::SynSent,
            "SYN_RECEIVED" | "SYN_RCVD" | "SYN_RECV" => TcpState::SynReceived,
            "FIN_WAIT_1" | "FIN_WAIT1" => TcpState::FinWait1,
            "FIN_WAIT_2" | "FIN_WAIT2" => TcpState::FinWait2,
            "TIME_WAIT" => TcpState::TimeWait,
            "CLOSED" => TcpState::Closed,
            "CLOSE_WAIT" => TcpState::CloseWait,
            "LAST_ACK" => TcpState::LastAck,
            "LISTEN" => TcpState::Listen,
            "CLOSING" => TcpState::Closing,
            _ => TcpState::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TcpConnection {
    pub local: SocketAddr,
    pub remote: SocketAddr,
    pub state: TcpState,
}

impl TcpConnection {
    pub fn local_port(&self) -> u16 {
        self.local.port()
    }

    pub fn remote_port(&self) -> u16 {
        self.remote.port()
    }
}
