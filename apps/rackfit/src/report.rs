//! Command results that can be rendered as tables or JSON

use crate::plan::PlanReport;
use rackfit_resources::{
    absent_resources, Availability, PoolStats, ResourceRegistry, ValidationReport,
};
use rackfit_types::ResourceType;
use serde::Serialize;
use std::collections::BTreeMap;

/// Capacity snapshot of a freshly built registry
#[derive(Debug, Clone, Serialize)]
pub struct Inspection {
    pub stats: BTreeMap<ResourceType, PoolStats>,
    pub availability: BTreeMap<ResourceType, Availability>,
    pub bottlenecks: Vec<ResourceType>,
    pub absent: Vec<ResourceType>,
    pub bottleneck_threshold: f64,
}

impl Inspection {
    pub fn of(registry: &ResourceRegistry) -> Self {
        Self {
            stats: registry.all_stats(),
            availability: registry.availability_summary(),
            bottlenecks: registry.bottleneck_resources(),
            absent: absent_resources(registry),
            bottleneck_threshold: registry.bottleneck_threshold(),
        }
    }
}

/// Result of a CLI command
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum CommandOutput {
    Validation(ValidationReport),
    Inspection(Inspection),
    Plan(PlanReport),
}

impl CommandOutput {
    /// Convert to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Whether the command should exit successfully
    pub fn is_success(&self) -> bool {
        match self {
            Self::Validation(report) => report.valid,
            Self::Inspection(_) => true,
            Self::Plan(report) => report.failed == 0,
        }
    }
}
