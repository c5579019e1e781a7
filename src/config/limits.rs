//! Cooldown and concurrency bucket maintenance configuration.

use serde::Deserialize;
use std::time::Duration;

/// Bucket retention configuration.
///
/// Buckets are created lazily and only evicted by the maintenance task;
/// eviction merely resets a limiter, so these values trade memory for
/// nothing but bookkeeping.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Idle cooldown windows are evicted after this many seconds (default: 3600).
    #[serde(default = "default_cooldown_retention_secs")]
    pub cooldown_retention_secs: u64,
    /// Period of the eviction task in seconds (default: 300).
    #[serde(default = "default_maintenance_interval_secs")]
    pub maintenance_interval_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            cooldown_retention_secs: default_cooldown_retention_secs(),
            maintenance_interval_secs: default_maintenance_interval_secs(),
        }
    }
}

impl LimitsConfig {
    pub fn cooldown_retention(&self) -> Duration {
        Duration::from_secs(self.cooldown_retention_secs)
    }

    /// Period of the eviction task, never shorter than one second.
    pub fn maintenance_interval(&self) -> Duration {
        Duration::from_secs(self.maintenance_interval_secs.max(1))
    }
}

fn default_cooldown_retention_secs() -> u64 {
    3600
}

fn default_maintenance_interval_secs() -> u64 {
    300
}
