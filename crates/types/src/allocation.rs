//! Allocation identifiers and requests

use crate::slot::{Exemption, PcieSlotSize, PreferredLocation, SlotSource};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// The six finite-capacity resource kinds tracked per configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    PcieLanes,
    PcieSlots,
    RamSlots,
    M2Slots,
    U2Slots,
    SataPorts,
}

impl ResourceType {
    pub const ALL: [Self; 6] = [
        Self::PcieLanes,
        Self::PcieSlots,
        Self::RamSlots,
        Self::M2Slots,
        Self::U2Slots,
        Self::SataPorts,
    ];

    /// Stable key used in statistics maps and allocation ids
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PcieLanes => "pcie_lanes",
            Self::PcieSlots => "pcie_slots",
            Self::RamSlots => "ram_slots",
            Self::M2Slots => "m2_slots",
            Self::U2Slots => "u2_slots",
            Self::SataPorts => "sata_ports",
        }
    }

    /// Human-readable label for messages
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::PcieLanes => "PCIe lanes",
            Self::PcieSlots => "PCIe slot",
            Self::RamSlots => "RAM slot",
            Self::M2Slots => "M.2 slot",
            Self::U2Slots => "U.2 slot",
            Self::SataPorts => "SATA port",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of the component that owns an allocation
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentId(String);

impl ComponentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ComponentId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ComponentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Opaque allocation handle, unique within one pool instance until reset
///
/// Rendered as `<resource>-<sequence>`, e.g. `pcie_slots-3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AllocationId {
    resource: ResourceType,
    sequence: u64,
}

impl AllocationId {
    #[must_use]
    pub fn new(resource: ResourceType, sequence: u64) -> Self {
        Self { resource, sequence }
    }

    #[must_use]
    pub fn resource(self) -> ResourceType {
        self.resource
    }

    #[must_use]
    pub fn sequence(self) -> u64 {
        self.sequence
    }
}

impl fmt::Display for AllocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.resource, self.sequence)
    }
}

impl Serialize for AllocationId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Typed allocation metadata
///
/// Carries the lane exemption, placement hints and free-form caller labels
/// that travel with an allocation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct AllocationRequest {
    pub exemption: Exemption,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_location: Option<PreferredLocation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_size: Option<PcieSlotSize>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

impl AllocationRequest {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_exemption(mut self, exemption: Exemption) -> Self {
        self.exemption = exemption;
        self
    }

    #[must_use]
    pub fn with_required_size(mut self, size: PcieSlotSize) -> Self {
        self.required_size = Some(size);
        self
    }

    #[must_use]
    pub fn prefer_slot(mut self, id: impl Into<String>) -> Self {
        self.preferred_location = Some(PreferredLocation::Slot(id.into()));
        self
    }

    #[must_use]
    pub fn prefer_source(mut self, source: SlotSource) -> Self {
        self.preferred_location = Some(PreferredLocation::Source(source));
        self
    }

    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Whether the preference hint names this record
    #[must_use]
    pub fn prefers(&self, id: &str, source: SlotSource) -> bool {
        self.preferred_location
            .as_ref()
            .is_some_and(|pref| pref.matches(id, source))
    }
}
