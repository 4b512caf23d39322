//! Memory watchdog — tiered process-memory monitoring.
//!
//! Samples resident memory on a fixed period and synchronously at the
//! natural checkpoints (before each agent bring-up, before each console
//! round). Warning pressure requests an advisory reclamation pass;
//! Critical pressure asks the shutdown controller to tear the process
//! down — an operational safety valve, not a bug path.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System};
use tracing::{error, warn};

use troupe_config::WatchdogConfig;

use crate::registry::ResourceRegistry;
use crate::shutdown::{ShutdownCause, ShutdownSignal};

/// A timestamped resident-memory reading. Never persisted; used only for
/// threshold comparison.
#[derive(Debug, Clone, Copy)]
pub struct MemorySample {
    pub taken_at: DateTime<Utc>,
    pub bytes: u64,
}

/// Classification of one sample against the configured thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryPressure {
    Normal,
    Warning,
    Critical,
}

/// Source of memory samples. The production implementation reads the OS
/// process table; tests script their own readings.
pub trait MemorySampler: Send + Sync {
    fn sample(&self) -> MemorySample;
}

/// Reads the current process's resident set via `sysinfo`.
pub struct ProcessMemorySampler {
    system: std::sync::Mutex<System>,
    pid: sysinfo::Pid,
}

impl ProcessMemorySampler {
    pub fn new() -> Self {
        let pid = sysinfo::get_current_pid().expect("current pid unavailable");
        Self {
            system: std::sync::Mutex::new(System::new()),
            pid,
        }
    }
}

impl Default for ProcessMemorySampler {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySampler for ProcessMemorySampler {
    fn sample(&self) -> MemorySample {
        let mut system = self.system.lock().unwrap_or_else(|e| e.into_inner());
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[self.pid]),
            true,
            ProcessRefreshKind::nothing().with_memory(),
        );
        let bytes = system.process(self.pid).map(|p| p.memory()).unwrap_or(0);
        MemorySample {
            taken_at: Utc::now(),
            bytes,
        }
    }
}

/// The watchdog itself. Shared by the periodic task, the bring-up
/// sequencer, and the console loop.
pub struct MemoryWatchdog {
    config: WatchdogConfig,
    sampler: Arc<dyn MemorySampler>,
    registry: Arc<ResourceRegistry>,
}

impl MemoryWatchdog {
    pub fn new(
        config: WatchdogConfig,
        sampler: Arc<dyn MemorySampler>,
        registry: Arc<ResourceRegistry>,
    ) -> Self {
        Self {
            config,
            sampler,
            registry,
        }
    }

    /// Classify a sample against the thresholds. Pure; no side effects.
    pub fn classify(&self, sample: &MemorySample) -> MemoryPressure {
        if sample.bytes >= self.config.critical_bytes {
            MemoryPressure::Critical
        } else if sample.bytes >= self.config.warning_bytes {
            MemoryPressure::Warning
        } else {
            MemoryPressure::Normal
        }
    }

    /// Single-shot check-and-react: sample once, act once, return the
    /// classification. Never blocks waiting for memory to recover.
    pub async fn check(&self) -> MemoryPressure {
        let sample = self.sampler.sample();
        let pressure = self.classify(&sample);
        match pressure {
            MemoryPressure::Normal => {}
            MemoryPressure::Warning => {
                warn!(
                    used_mb = sample.bytes / (1024 * 1024),
                    threshold_mb = self.config.warning_bytes / (1024 * 1024),
                    "Memory pressure warning — requesting reclamation pass"
                );
                self.registry.reclamation_hint().await;
            }
            MemoryPressure::Critical => {
                error!(
                    used_mb = sample.bytes / (1024 * 1024),
                    threshold_mb = self.config.critical_bytes / (1024 * 1024),
                    "Memory usage critical — shutting down"
                );
            }
        }
        pressure
    }

    /// Run the periodic timer. Exits once shutdown is requested; a
    /// Critical sample pre-empts everything by signaling the shutdown
    /// controller.
    pub async fn run_periodic(&self, shutdown: ShutdownSignal) {
        let period = std::time::Duration::from_secs(self.config.interval_secs);
        let mut ticker = tokio::time::interval(period);
        // The first tick fires immediately; skip it so the timer samples
        // on the period edge, not at start-up.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if shutdown.is_requested() {
                return;
            }
            if self.check().await == MemoryPressure::Critical {
                shutdown.request(ShutdownCause::MemoryCritical);
                return;
            }
        }
    }
}

/// Sampler that returns a settable byte count. Shared by the test
/// suites of every component that runs pre-flight checks.
#[cfg(test)]
pub(crate) struct ScriptedSampler {
    bytes: std::sync::atomic::AtomicU64,
}

#[cfg(test)]
impl ScriptedSampler {
    pub(crate) fn new(bytes: u64) -> Self {
        Self {
            bytes: std::sync::atomic::AtomicU64::new(bytes),
        }
    }

    pub(crate) fn set(&self, bytes: u64) {
        self.bytes
            .store(bytes, std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(test)]
impl MemorySampler for ScriptedSampler {
    fn sample(&self) -> MemorySample {
        MemorySample {
            taken_at: Utc::now(),
            bytes: self.bytes.load(std::sync::atomic::Ordering::SeqCst),
        }
    }
}
