//! Configuration for the ordering coordinator.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Coordinator configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Registry shards, indexed by the first identifier byte
    pub registry_buckets: usize,
    /// Pending-request slots per client (must be a power of two)
    pub pending_slots: usize,
    /// How long an admitted operation waits for its dependency data (ms)
    pub dependency_timeout_ms: u64,
    /// How long a parked poll slot waits before replying empty (ms)
    pub poll_timeout_ms: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            registry_buckets: 256,
            pending_slots: 1024,
            dependency_timeout_ms: 2_000,
            poll_timeout_ms: 30_000,
        }
    }
}

impl CoordinatorConfig {
    pub fn dependency_timeout(&self) -> Duration {
        Duration::from_millis(self.dependency_timeout_ms)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}
