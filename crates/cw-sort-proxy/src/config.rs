//! Aggregator tuning knobs.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// Polls kept in flight per replica channel in steady state.
    pub pool_target: usize,
    /// Hard bound on poll slots minted per replica channel; past it,
    /// urgent payloads go out unpooled.
    pub pool_hard_cap: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            pool_target: 4,
            pool_hard_cap: 16,
        }
    }
}
