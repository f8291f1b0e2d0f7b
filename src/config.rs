// Configuration loaded from TOML; every section is optional and falls back to defaults

use std::time::Duration;

use serde::Deserialize;

use crate::SamplingOptions;

const DEFAULT_CONFIG_PATH: &str = "perfstats.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub monitoring: MonitoringConfig,
    pub processes: ProcessesConfig,
    pub connections: ConnectionsConfig,
    pub sampling: SamplingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub sample_interval_ms: u64,
    /// Number of passes before exiting; absent means run until interrupted.
    pub samples: Option<u64>,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: 1000,
            samples: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProcessesConfig {
    pub names: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConnectionsConfig {
    pub enabled: bool,
    pub source_port: Option<u16>,
    pub dest_port: Option<u16>,
}

impl Default for ConnectionsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            source_port: None,
            dest_port: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub command_timeout_ms: u64,
    pub min_cpu_interval_ms: u64,
    pub min_disk_interval_ms: u64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        let defaults = SamplingOptions::default();
        Self {
            command_timeout_ms: defaults.command_timeout.as_millis() as u64,
            min_cpu_interval_ms: defaults.min_cpu_interval.as_millis() as u64,
            min_disk_interval_ms: defaults.min_disk_interval.as_millis() as u64,
        }
    }
}

impl AppConfig {
    /// Read `$CONFIG_FILE` (or `perfstats.toml`). A missing file yields the defaults.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
        match std::fs::read_to_string(&path) {
            Ok(s) => Self::load_from_str(&s),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path, "config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!("reading {}: {}", path, e)),
        }
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.monitoring.sample_interval_ms > 0,
            "monitoring.sample_interval_ms must be > 0, got {}",
            self.monitoring.sample_interval_ms
        );
        anyhow::ensure!(
            self.monitoring.samples != Some(0),
            "monitoring.samples must be > 0 when set"
        );
        anyhow::ensure!(
            self.processes.names.iter().all(|n| !n.trim().is_empty()),
            "processes.names must not contain empty names"
        );
        anyhow::ensure!(
            self.connections.source_port != Some(0),
            "connections.source_port must be between 1 and 65535"
        );
        anyhow::ensure!(
            self.connections.dest_port != Some(0),
            "connections.dest_port must be between 1 and 65535"
        );
        anyhow::ensure!(
            self.sampling.command_timeout_ms > 0,
            "sampling.command_timeout_ms must be > 0, got {}",
            self.sampling.command_timeout_ms
        );
        anyhow::ensure!(
            self.sampling.min_cpu_interval_ms > 0,
            "sampling.min_cpu_interval_ms must be > 0, got {}",
            self.sampling.min_cpu_interval_ms
        );
        anyhow::ensure!(
            self.sampling.min_disk_interval_ms > 0,
            "sampling.min_disk_interval_ms must be > 0, got {}",
            self.sampling.min_disk_interval_ms
        );
        Ok(())
    }

    pub fn sampling_options(&self) -> SamplingOptions {
        SamplingOptions {
            min_cpu_interval: Duration::from_millis(self.sampling.min_cpu_interval_ms),
            min_disk_interval: Duration::from_millis(self.sampling.min_disk_interval_ms),
            command_timeout: Duration::from_millis(self.sampling.command_timeout_ms),
            ..SamplingOptions::default()
        }
    }
}
