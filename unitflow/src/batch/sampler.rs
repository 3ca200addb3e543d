//! Pluggable resource sampling.
//!
//! The governor never reads process memory directly; it asks a
//! [`ResourceSampler`]. Production code uses [`SystemSampler`], tests plug in
//! scripted samplers to simulate pressure deterministically.

use parking_lot::Mutex;
use sysinfo::{Pid, System};
use tracing::warn;

/// A point-in-time resource reading.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResourceUsage {
    /// Resident memory of the process in bytes.
    pub memory_bytes: u64,
}

impl ResourceUsage {
    pub fn from_bytes(memory_bytes: u64) -> Self {
        Self { memory_bytes }
    }

    /// Memory in whole mebibytes, for logging.
    pub fn memory_mb(&self) -> u64 {
        self.memory_bytes / 1024 / 1024
    }
}

/// Source of resource readings for the memory governor.
pub trait ResourceSampler: Send + Sync + 'static {
    /// Takes a fresh reading.
    fn sample(&self) -> ResourceUsage;

    /// Asks the host to release whatever memory it can.
    ///
    /// Called once each time pressure is detected. The default does nothing.
    fn reclaim(&self) {}
}

/// Samples this process's resident memory via `sysinfo`.
pub struct SystemSampler {
    system: Mutex<System>,
    pid: Option<Pid>,
}

impl SystemSampler {
    pub fn new() -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                warn!(error = %e, "Failed to get current process ID, memory sampling disabled");
                None
            }
        };
        Self {
            system: Mutex::new(System::new()),
            pid,
        }
    }
}

impl Default for SystemSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceSampler for SystemSampler {
    fn sample(&self) -> ResourceUsage {
        let Some(pid) = self.pid else {
            return ResourceUsage::default();
        };
        let mut system = self.system.lock();
        system.refresh_process(pid);
        let memory_bytes = system.process(pid).map(|p| p.memory()).unwrap_or(0);
        ResourceUsage { memory_bytes }
    }
}

impl std::fmt::Debug for SystemSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemSampler")
            .field("pid", &self.pid)
            .finish()
    }
}

/// A sampler that always reports zero usage, disabling pressure handling.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSampler;

impl ResourceSampler for NullSampler {
    fn sample(&self) -> ResourceUsage {
        ResourceUsage::default()
    }
}
