//! Allocation engine settings

use rackfit_errors::ConfigError;
use serde::{Deserialize, Serialize};

/// Pools whose remaining ratio falls below this are reported as bottlenecks
pub const DEFAULT_BOTTLENECK_THRESHOLD: f64 = 0.20;

/// Settings consumed by the resource registry and pool factory
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AllocationConfig {
    #[serde(default = "default_bottleneck_threshold")]
    pub bottleneck_threshold: f64,
    #[serde(default = "default_warn_on_bottleneck")]
    pub warn_on_bottleneck: bool,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            bottleneck_threshold: DEFAULT_BOTTLENECK_THRESHOLD,
            warn_on_bottleneck: true,
        }
    }
}

impl AllocationConfig {
    /// Check that the threshold is a ratio
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` when the threshold lies outside `[0, 1]`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if (0.0..=1.0).contains(&self.bottleneck_threshold) {
            Ok(())
        } else {
            Err(ConfigError::InvalidValue {
                field: "allocation.bottleneck_threshold".to_string(),
                value: self.bottleneck_threshold.to_string(),
            })
        }
    }
}

fn default_bottleneck_threshold() -> f64 {
    DEFAULT_BOTTLENECK_THRESHOLD
}

fn default_warn_on_bottleneck() -> bool {
    true
}
