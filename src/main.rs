use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use perfstats::*;
use tokio::sync::{mpsc, oneshot};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let app_config = config::AppConfig::load()?;
    let stats = Arc::new(PerformanceStatistics::with_options(
        app_config.processes.names.iter().cloned(),
        app_config.sampling_options(),
    )?);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        platform = %stats.platform(),
        processes = app_config.processes.names.len(),
        sample_interval_ms = app_config.monitoring.sample_interval_ms,
        "perfstats started"
    );

    let (tx, mut rx) = mpsc::channel(worker::REPORT_CHANNEL_CAPACITY);
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let worker_handle = worker::spawn(
        worker::WorkerDeps {
            stats: stats.clone(),
            tx,
            shutdown_rx,
        },
        worker::WorkerConfig {
            sample_interval_ms: app_config.monitoring.sample_interval_ms,
            samples: app_config.monitoring.samples,
            connections_enabled: app_config.connections.enabled,
            source_port: app_config.connections.source_port,
            dest_port: app_config.connections.dest_port,
        },
    );

    let printer = async {
        while let Some(report) = rx.recv().await {
            let mut stdout = std::io::stdout().lock();
            serde_json::to_writer(&mut stdout, &report)?;
            writeln!(stdout)?;
            stdout.flush()?;
        }
        anyhow::Ok(())
    };

    tokio::select! {
        result = printer => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal");
            let _ = shutdown_tx.send(());
        }
    }
    let _ = worker_handle.await;

    stats.dispose();
    Ok(())
}
