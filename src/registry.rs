// Monitored-process registry: one live generation of samplers, replaced on every read

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use tracing::instrument;

use crate::lock_unpoisoned;
use crate::process::{ProcessSampler, ProcessSource};

pub type ProcessGeneration = BTreeMap<String, Vec<Arc<dyn ProcessSampler>>>;

#[derive(Default)]
struct Current {
    samplers: ProcessGeneration,
    generation: u64,
    closed: bool,
}

pub struct ProcessRegistry {
    source: Arc<dyn ProcessSource>,
    current: Mutex<Current>,
}

impl ProcessRegistry {
    pub fn new(source: Arc<dyn ProcessSource>) -> Self {
        Self {
            source,
            current: Mutex::new(Current::default()),
        }
    }

    /// Release the previous generation, then resolve every name into fresh
    /// samplers. Names without a running process map to an empty vector, and
    /// after `release_all` every name does.
    #[instrument(skip(self, names), fields(registry = "process", operation = "read", name_count = names.len()))]
    pub fn read(&self, names: &BTreeSet<String>) -> ProcessGeneration {
        let mut current = lock_unpoisoned(&self.current);
        if current.closed {
            return names.iter().map(|n| (n.clone(), Vec::new())).collect();
        }
        release(&current.samplers);

        let mut next = ProcessGeneration::new();
        for name in names {
            let samplers: Vec<_> = self
                .source
                .find_by_name(name)
                .into_iter()
                .filter_map(|pid| self.source.open(pid))
                .collect();
            tracing::debug!(name = %name, matched = samplers.len(), "resolved process name");
            next.insert(name.clone(), samplers);
        }

        current.samplers = next.clone();
        current.generation += 1;
        next
    }

    /// Release and forget the current generation. The registry stays closed:
    /// later reads open nothing.
    pub fn release_all(&self) {
        let mut current = lock_unpoisoned(&self.current);
        current.closed = true;
        release(&current.samplers);
        current.samplers.clear();
    }

    pub fn is_closed(&self) -> bool {
        lock_unpoisoned(&self.current).closed
    }

    /// Number of generations built so far.
    pub fn generation(&self) -> u64 {
        lock_unpoisoned(&self.current).generation
    }

    /// Samplers still held by the registry.
    pub fn live_count(&self) -> usize {
        lock_unpoisoned(&self.current)
            .samplers
            .values()
            .map(Vec::len)
            .sum()
    }
}

fn release(generation: &ProcessGeneration) {
    for sampler in generation.values().flatten() {
        sampler.release();
    }
}
