// Sample models shared by samplers, the facade and the binary

mod process;
mod report;
mod system;
mod tcp;

pub use process::{ProcessCounters, ProcessMemory};
pub use report::{ProcessReport, StatsReport};
pub use system::{DiskSpace, SystemCounters};
pub use tcp::{TcpConnection, TcpState};
