//! Component records of a server build
//!
//! These mirror the inventory system's per-type records, keeping only the
//! fields the allocation engine reads. Every field is optional on the wire
//! and defaults to zero or empty.

use crate::de::{count_or_list, default_count};
use crate::slot::{PcieSlotSize, StorageInterface};
use serde::Deserialize;
use std::fmt;

/// Component type keys of a configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ComponentKind {
    Motherboard,
    Cpu,
    Ram,
    Storage,
    Nic,
    Caddy,
    Chassis,
    PcieCard,
    HbaCard,
}

impl ComponentKind {
    pub const ALL: [Self; 9] = [
        Self::Motherboard,
        Self::Cpu,
        Self::Ram,
        Self::Storage,
        Self::Nic,
        Self::Caddy,
        Self::Chassis,
        Self::PcieCard,
        Self::HbaCard,
    ];

    /// Key used in the configuration document
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::Motherboard => "motherboard",
            Self::Cpu => "cpu",
            Self::Ram => "ram",
            Self::Storage => "storage",
            Self::Nic => "nic",
            Self::Caddy => "caddy",
            Self::Chassis => "chassis",
            Self::PcieCard => "pciecard",
            Self::HbaCard => "hbacard",
        }
    }

    /// Look up a kind from its configuration key
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.key() == key)
    }

    /// Whether a configuration must contain at least one record of this kind
    #[must_use]
    pub fn is_required(self) -> bool {
        matches!(self, Self::Motherboard | Self::Cpu)
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A server build as assembled by the inventory system
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerConfiguration {
    pub motherboard: Vec<MotherboardSpec>,
    pub cpu: Vec<CpuSpec>,
    pub ram: Vec<RamSpec>,
    pub storage: Vec<StorageSpec>,
    pub nic: Vec<NicSpec>,
    pub caddy: Vec<CaddySpec>,
    pub chassis: Vec<ChassisSpec>,
    pub pciecard: Vec<PcieCardSpec>,
    pub hbacard: Vec<HbaCardSpec>,
}

impl ServerConfiguration {
    /// Number of records present for a component kind
    #[must_use]
    pub fn count(&self, kind: ComponentKind) -> usize {
        match kind {
            ComponentKind::Motherboard => self.motherboard.len(),
            ComponentKind::Cpu => self.cpu.len(),
            ComponentKind::Ram => self.ram.len(),
            ComponentKind::Storage => self.storage.len(),
            ComponentKind::Nic => self.nic.len(),
            ComponentKind::Caddy => self.caddy.len(),
            ComponentKind::Chassis => self.chassis.len(),
            ComponentKind::PcieCard => self.pciecard.len(),
            ComponentKind::HbaCard => self.hbacard.len(),
        }
    }

    /// The first motherboard, which defines the platform
    #[must_use]
    pub fn primary_motherboard(&self) -> Option<&MotherboardSpec> {
        self.motherboard.first()
    }

    /// The first CPU, whose lane count feeds the lane budget
    #[must_use]
    pub fn primary_cpu(&self) -> Option<&CpuSpec> {
        self.cpu.first()
    }

    #[must_use]
    pub fn primary_chassis(&self) -> Option<&ChassisSpec> {
        self.chassis.first()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CpuSpec {
    pub uuid: String,
    pub pcie_lanes: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MotherboardSpec {
    pub uuid: String,
    pub chipset_pcie_lanes: u32,
    #[serde(deserialize_with = "count_or_list")]
    pub sata_ports: u32,
    #[serde(deserialize_with = "count_or_list")]
    pub onboard_nics: u32,
    pub expansion_slots: ExpansionSlots,
    pub memory: MemorySpec,
    pub m2_slots: Vec<M2SlotSpec>,
    pub u2_slots: Vec<U2SlotSpec>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExpansionSlots {
    pub pcie_slots: Vec<PcieSlotEntry>,
}

/// One entry of a PCIe slot list: a bare size or a sized group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PcieSlotEntry {
    Size(PcieSlotSize),
    Group {
        #[serde(alias = "type")]
        size: PcieSlotSize,
        #[serde(default = "default_count")]
        count: u32,
    },
}

impl PcieSlotEntry {
    #[must_use]
    pub fn size(self) -> PcieSlotSize {
        match self {
            Self::Size(size) | Self::Group { size, .. } => size,
        }
    }

    #[must_use]
    pub fn count(self) -> u32 {
        match self {
            Self::Size(_) => 1,
            Self::Group { count, .. } => count,
        }
    }

    /// One size per physical slot described by the entry
    pub fn expand(self) -> impl Iterator<Item = PcieSlotSize> {
        std::iter::repeat_n(self.size(), self.count() as usize)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MemorySpec {
    pub slot_count: u32,
    pub slot_type: String,
    pub channels: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct M2SlotSpec {
    #[serde(rename = "type", alias = "form_factor")]
    pub form_factor: String,
    pub interface: String,
    pub count: u32,
}

impl Default for M2SlotSpec {
    fn default() -> Self {
        Self {
            form_factor: String::new(),
            interface: String::new(),
            count: 1,
        }
    }
}

impl M2SlotSpec {
    #[must_use]
    pub fn storage_interface(&self) -> StorageInterface {
        StorageInterface::from_label(&self.interface)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct U2SlotSpec {
    pub interface: String,
    pub count: u32,
}

impl Default for U2SlotSpec {
    fn default() -> Self {
        Self {
            interface: String::new(),
            count: 1,
        }
    }
}

impl U2SlotSpec {
    #[must_use]
    pub fn storage_interface(&self) -> StorageInterface {
        StorageInterface::from_label(&self.interface)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChassisSpec {
    pub uuid: String,
    pub riser_slots: Vec<Vec<PcieSlotEntry>>,
    pub u2_backplane: Vec<U2BackplaneSpec>,
    #[serde(deserialize_with = "count_or_list")]
    pub sata_backplane_ports: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct U2BackplaneSpec {
    pub u2_slots: Vec<U2SlotSpec>,
}

/// Generic PCIe add-in card, optionally hosting M.2 or U.2 connectors
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PcieCardSpec {
    pub uuid: String,
    pub slot_size: Option<PcieSlotSize>,
    pub pcie_lanes: u32,
    pub m2_slots: Vec<M2SlotSpec>,
    pub u2_slots: Vec<U2SlotSpec>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HbaCardSpec {
    pub uuid: String,
    pub slot_size: Option<PcieSlotSize>,
    pub pcie_lanes: u32,
    #[serde(deserialize_with = "count_or_list")]
    pub sata_ports: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NicSpec {
    pub uuid: String,
    pub slot_size: Option<PcieSlotSize>,
    pub pcie_lanes: u32,
    /// Onboard NICs are already accounted for by the motherboard
    pub onboard: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RamSpec {
    pub uuid: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageSpec {
    pub uuid: String,
    /// Free-form connector label, e.g. `M.2 NVMe`, `U.2`, `SATA`
    pub interface: String,
    pub pcie_lanes: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CaddySpec {
    pub uuid: String,
}
