#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Core type definitions for the rackfit allocation engine
//!
//! This crate provides the strongly-typed vocabulary shared by the engine and
//! its callers: component records as they arrive from the inventory system,
//! physical slot classifications, allocation identifiers and requests.

pub mod allocation;
pub mod component;
mod de;
pub mod slot;

// Re-export commonly used types
pub use allocation::{AllocationId, AllocationRequest, ComponentId, ResourceType};
pub use component::{
    CaddySpec, ChassisSpec, ComponentKind, CpuSpec, ExpansionSlots, HbaCardSpec, M2SlotSpec,
    MemorySpec, MotherboardSpec, NicSpec, PcieCardSpec, PcieSlotEntry, RamSpec,
    ServerConfiguration, StorageSpec, U2BackplaneSpec, U2SlotSpec,
};
pub use slot::{Exemption, PcieSlotSize, PreferredLocation, SlotSource, StorageInterface};

use serde::{Deserialize, Serialize};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Plain,
    Tty,
    Json,
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::Tty
    }
}

/// Color output choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorChoice {
    Always,
    Auto,
    Never,
}

// Implement clap::ValueEnum for ColorChoice
impl clap::ValueEnum for ColorChoice {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::Always, Self::Auto, Self::Never]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(match self {
            Self::Always => clap::builder::PossibleValue::new("always"),
            Self::Auto => clap::builder::PossibleValue::new("auto"),
            Self::Never => clap::builder::PossibleValue::new("never"),
        })
    }
}

impl Default for ColorChoice {
    fn default() -> Self {
        Self::Auto
    }
}
