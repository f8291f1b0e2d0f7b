// Platform-neutral performance statistics: system counters, per-process counters and TCP connections

pub mod config;
pub mod error;
pub mod models;
pub mod net;
pub mod options;
pub mod parse;
pub mod platform;
pub mod process;
pub mod rate;
pub mod registry;
pub mod source;
pub mod stats;
pub mod system;
pub mod worker;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use error::StatsError;
pub use options::SamplingOptions;
pub use platform::PlatformType;
pub use stats::PerformanceStatistics;

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
