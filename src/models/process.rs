// Per-process counters

use serde::{Deserialize, Serialize};

/// Memory figures in bytes. Fields a platform does not expose stay `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessMemory {
    pub private: Option<u64>,
    #[serde(rename = "virtual")]
    pub virtual_: Option<u64>,
    pub working_set: Option<u64>,
    pub paged_system: Option<u64>,
    pub non_paged_system: Option<u64>,
    pub peak_paged_system: Option<u64>,
    pub peak_virtual: Option<u64>,
    pub peak_working_set: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessCounters {
    pub process_id: Option<u32>,
    pub process_name: String,
    pub machine_name: String,
    pub process_title: String,
    /// 0 on a sampler's first read; a rate only from the second read on.
    pub cpu_utilization_percent: Option<f64>,
    pub handle_count: Option<u64>,
    pub thread_count: Option<u64>,
    pub memory: ProcessMemory,
}
