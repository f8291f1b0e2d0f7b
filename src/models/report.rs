// One full sampling pass, as printed by the binary

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{ProcessCounters, SystemCounters, TcpConnection};

/// Every pass opens a fresh generation of samplers, so each instance has
/// been sampled exactly once and its `cpuUtilizationPercent` is the
/// first-sample neutral 0. Callers that need per-process CPU rates keep a
/// generation from `monitored_processes` and sample it again.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessReport {
    pub name: String,
    pub instances: Vec<ProcessCounters>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsReport {
    pub timestamp: u64,
    pub platform: String,
    pub system: SystemCounters,
    pub processes: Vec<ProcessReport>,
    pub connections: Vec<TcpConnection>,
}

impl StatsReport {
    pub fn process_reports(
        monitored: BTreeMap<String, Vec<ProcessCounters>>,
    ) -> Vec<ProcessReport> {
        monitored
            .into_iter()
            .map(|(name, instances)| ProcessReport { name, instances })
            .collect()
    }
}
