// Sampling worker: one full pass per tick, reports handed to the caller over a channel

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{Duration, interval};
use tracing::Instrument;

use crate::models::StatsReport;
use crate::stats::{self, PerformanceStatistics};

/// Channel capacity for reports waiting to be printed.
pub const REPORT_CHANNEL_CAPACITY: usize = 16;

pub struct WorkerDeps {
    pub stats: Arc<PerformanceStatistics>,
    pub tx: mpsc::Sender<StatsReport>,
    pub shutdown_rx: oneshot::Receiver<()>,
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub sample_interval_ms: u64,
    /// Stop after this many passes; `None` runs until shutdown.
    pub samples: Option<u64>,
    pub connections_enabled: bool,
    pub source_port: Option<u16>,
    pub dest_port: Option<u16>,
}

fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, operation = "get_timestamp", "system time error");
            0
        })
}

/// One blocking pass over every capability of the facade. Process samplers
/// are rebuilt each pass, so per-process CPU in the report is always the
/// neutral first-sample value.
pub fn collect_report(stats: &PerformanceStatistics, config: &WorkerConfig) -> StatsReport {
    let system = stats.system_counters();
    let generation = stats.monitored_processes();
    let processes = StatsReport::process_reports(stats::sample_generation(&generation));
    let connections = if config.connections_enabled {
        stats.active_tcp_connections(config.source_port, config.dest_port)
    } else {
        Vec::new()
    };
    StatsReport {
        timestamp: now_millis(),
        platform: stats.platform().to_string(),
        system,
        processes,
        connections,
    }
}

/// Spawns the sampling loop. Each pass runs on the blocking pool since every
/// read blocks on files or child processes. The task ends on shutdown, when the
/// pass budget is spent, or when the receiver is dropped.
pub fn spawn(deps: WorkerDeps, config: WorkerConfig) -> tokio::task::JoinHandle<()> {
    let WorkerDeps {
        stats,
        tx,
        mut shutdown_rx,
    } = deps;

    let worker_span = tracing::span!(
        tracing::Level::DEBUG,
        "worker",
        sample_interval_ms = config.sample_interval_ms
    );

    tokio::spawn(
        async move {
            let mut tick = interval(Duration::from_millis(config.sample_interval_ms));
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            let mut passes: u64 = 0;

            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        let stats = stats.clone();
                        let pass_config = config.clone();
                        let report = match tokio::task::spawn_blocking(move || {
                            collect_report(&stats, &pass_config)
                        })
                        .await
                        {
                            Ok(report) => report,
                            Err(e) => {
                                tracing::warn!(error = %e, operation = "collect_report", "sampling pass failed");
                                continue;
                            }
                        };
                        if tx.send(report).await.is_err() {
                            tracing::debug!("report channel closed");
                            break;
                        }
                        passes += 1;
                        if config.samples.is_some_and(|limit| passes >= limit) {
                            tracing::debug!(passes, "sample budget reached");
                            break;
                        }
                    }
                    _ = &mut shutdown_rx => {
                        tracing::debug!("worker shutting down");
                        break;
                    }
                }
            }
        }
        .instrument(worker_span),
    )
}
