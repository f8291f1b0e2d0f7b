// Capability facade: system counters, monitored processes and TCP connections behind one handle

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use tracing::instrument;

use crate::SamplingOptions;
use crate::error::StatsError;
use crate::models::{ProcessCounters, SystemCounters, TcpConnection};
use crate::net::{self, ConnectionSource};
use crate::platform::PlatformType;
use crate::process::ProcessSource;
use crate::registry::{ProcessGeneration, ProcessRegistry};
use crate::system::SystemSampler;

pub struct PerformanceStatistics {
    platform: PlatformType,
    system: Arc<dyn SystemSampler>,
    registry: ProcessRegistry,
    connections: Arc<dyn ConnectionSource>,
    names: RwLock<BTreeSet<String>>,
    disposed: AtomicBool,
}

struct PlatformParts {
    system: Arc<dyn SystemSampler>,
    processes: Arc<dyn ProcessSource>,
    connections: Arc<dyn ConnectionSource>,
}

fn platform_parts(
    platform: PlatformType,
    options: &SamplingOptions,
) -> Result<PlatformParts, StatsError> {
    use crate::process::{MacProcessSource, ProcfsProcessSource};
    use crate::source::{RealFs, SystemCommand};
    use crate::system::{LinuxSystemSampler, MacSystemSampler, SysinfoVolumes};

    match platform {
        PlatformType::Linux => {
            let fs = Arc::new(RealFs);
            Ok(PlatformParts {
                system: Arc::new(LinuxSystemSampler::new(
                    fs.clone(),
                    Arc::new(SysinfoVolumes),
                    options,
                )),
                processes: Arc::new(ProcfsProcessSource::new(fs.clone(), options.clone())),
                connections: Arc::new(net::ProcNetTcp::new(fs)),
            })
        }
        PlatformType::Mac => {
            let commands = Arc::new(SystemCommand::new(options.command_timeout));
            Ok(PlatformParts {
                system: Arc::new(MacSystemSampler::new(
                    commands.clone(),
                    Arc::new(SysinfoVolumes),
                )),
                processes: Arc::new(MacProcessSource::new(commands.clone(), options.clone())),
                connections: Arc::new(net::BsdNetstat::new(commands)),
            })
        }
        #[cfg(windows)]
        PlatformType::Windows => {
            use crate::process::WindowsProcessSource;
            use crate::system::WindowsSystemSampler;

            Ok(PlatformParts {
                system: Arc::new(WindowsSystemSampler::new()),
                processes: Arc::new(WindowsProcessSource::new(options.clone())),
                connections: Arc::new(net::IpHelperTcpTable::new()),
            })
        }
        other => Err(StatsError::UnsupportedPlatform(other.to_string())),
    }
}

impl PerformanceStatistics {
    /// Build the samplers for the running host with default options.
    pub fn create<I, S>(names: I) -> Result<Self, StatsError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_options(names, SamplingOptions::default())
    }

    pub fn with_options<I, S>(names: I, options: SamplingOptions) -> Result<Self, StatsError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let platform = PlatformType::current();
        let parts = platform_parts(platform, &options)?;
        tracing::info!(platform = %platform, "performance statistics created");
        Ok(Self::from_parts(
            platform,
            parts.system,
            parts.processes,
            parts.connections,
            names,
        ))
    }

    /// Assemble a facade from explicit samplers and sources.
    pub fn from_parts<I, S>(
        platform: PlatformType,
        system: Arc<dyn SystemSampler>,
        processes: Arc<dyn ProcessSource>,
        connections: Arc<dyn ConnectionSource>,
        names: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            platform,
            system,
            registry: ProcessRegistry::new(processes),
            connections,
            names: RwLock::new(names.into_iter().map(Into::into).collect()),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn platform(&self) -> PlatformType {
        self.platform
    }

    pub fn system(&self) -> &dyn SystemSampler {
        self.system.as_ref()
    }

    pub fn system_counters(&self) -> SystemCounters {
        self.system.sample()
    }

    pub fn monitored_process_names(&self) -> BTreeSet<String> {
        self.names
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn set_monitored_process_names<I, S>(&self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        *self.names.write().unwrap_or_else(|e| e.into_inner()) =
            names.into_iter().map(Into::into).collect();
    }

    /// Returns `false` if the name was already monitored.
    pub fn add_monitored_process_name(&self, name: impl Into<String>) -> bool {
        self.names
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.into())
    }

    pub fn remove_monitored_process_name(&self, name: &str) -> bool {
        self.names
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(name)
    }

    /// Fresh samplers for every monitored name; the previous generation is
    /// released first. After `dispose` every name maps to an empty list.
    #[instrument(skip(self), fields(facade = "stats", operation = "monitored_processes"))]
    pub fn monitored_processes(&self) -> ProcessGeneration {
        self.registry.read(&self.monitored_process_names())
    }

    /// Snapshot of active connections, optionally narrowed to a local and/or
    /// remote port.
    #[instrument(skip(self), fields(facade = "stats", operation = "active_tcp_connections"))]
    pub fn active_tcp_connections(
        &self,
        source_port: Option<u16>,
        dest_port: Option<u16>,
    ) -> Vec<TcpConnection> {
        net::filter_connections(self.connections.tcp_connections(), source_port, dest_port)
    }

    /// Release every process sampler. Safe to call more than once.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.registry.release_all();
        tracing::debug!(platform = %self.platform, "performance statistics disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

impl Drop for PerformanceStatistics {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Flatten a generation into `name -> counters`, sampling every live process once.
pub fn sample_generation(generation: &ProcessGeneration) -> BTreeMap<String, Vec<ProcessCounters>> {
    generation
        .iter()
        .map(|(name, samplers)| (name.clone(), samplers.iter().map(|s| s.sample()).collect()))
        .collect()
}
