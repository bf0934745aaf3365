//! Physical connection point classifications

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Electrical width of a PCIe slot or the width a card requires
///
/// Ordering follows lane width, so `X4 < X16`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawSlotSize", into = "String")]
pub enum PcieSlotSize {
    X1,
    X4,
    X8,
    X16,
}

impl PcieSlotSize {
    pub const ALL: [Self; 4] = [Self::X1, Self::X4, Self::X8, Self::X16];

    /// Number of lanes the width represents
    #[must_use]
    pub fn lanes(self) -> u32 {
        match self {
            Self::X1 => 1,
            Self::X4 => 4,
            Self::X8 => 8,
            Self::X16 => 16,
        }
    }

    /// Whether a card of this width seats in a slot of `slot` width
    ///
    /// Narrower cards fit wider slots; the reverse never holds.
    #[must_use]
    pub fn fits_in(self, slot: Self) -> bool {
        self.lanes() <= slot.lanes()
    }

    /// Canonical label, e.g. `x16`
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::X1 => "x1",
            Self::X4 => "x4",
            Self::X8 => "x8",
            Self::X16 => "x16",
        }
    }

    fn from_width(width: u64) -> Option<Self> {
        match width {
            1 => Some(Self::X1),
            4 => Some(Self::X4),
            8 => Some(Self::X8),
            16 => Some(Self::X16),
            _ => None,
        }
    }
}

impl fmt::Display for PcieSlotSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PcieSlotSize {
    type Err = String;

    /// Parses `x8`, `X8`, `8` and vendor labels such as `PCIe 4.0 x8`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let digits = match lower.rfind('x') {
            Some(pos) if lower[pos + 1..].starts_with(|c: char| c.is_ascii_digit()) => {
                &lower[pos + 1..]
            }
            _ => lower.as_str(),
        };
        let digits: String = digits.chars().take_while(char::is_ascii_digit).collect();
        digits
            .parse::<u64>()
            .ok()
            .and_then(Self::from_width)
            .ok_or_else(|| format!("unsupported PCIe slot size: {s}"))
    }
}

impl From<PcieSlotSize> for String {
    fn from(size: PcieSlotSize) -> Self {
        size.as_str().to_string()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSlotSize {
    Width(u64),
    Label(String),
}

impl TryFrom<RawSlotSize> for PcieSlotSize {
    type Error = String;

    fn try_from(raw: RawSlotSize) -> Result<Self, Self::Error> {
        match raw {
            RawSlotSize::Width(w) => {
                Self::from_width(w).ok_or_else(|| format!("unsupported PCIe slot width: {w}"))
            }
            RawSlotSize::Label(label) => label.parse(),
        }
    }
}

/// Where a slot or port physically lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotSource {
    Motherboard,
    Riser,
    Adapter,
    Backplane,
    Hba,
}

impl SlotSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Motherboard => "motherboard",
            Self::Riser => "riser",
            Self::Adapter => "adapter",
            Self::Backplane => "backplane",
            Self::Hba => "hba",
        }
    }
}

impl fmt::Display for SlotSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lane accounting rule attached to an allocation
///
/// Native motherboard M.2 connectors are wired outside the expansion lane
/// budget; the same drive on an add-in adapter is not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Exemption {
    #[default]
    None,
    MotherboardM2,
    AdapterM2,
}

impl Exemption {
    /// Whether an allocation carrying this tag skips the lane budget
    #[must_use]
    pub fn bypasses_lane_budget(self) -> bool {
        matches!(self, Self::MotherboardM2)
    }

    /// Exemption tag of an M.2 slot hosted at `source`
    #[must_use]
    pub fn for_m2_source(source: SlotSource) -> Self {
        match source {
            SlotSource::Motherboard => Self::MotherboardM2,
            _ => Self::AdapterM2,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::MotherboardM2 => "motherboard_m2",
            Self::AdapterM2 => "adapter_m2",
        }
    }
}

/// Caller hint steering slot selection
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreferredLocation {
    /// A specific record by identifier
    Slot(String),
    /// Any record hosted at the given source
    Source(SlotSource),
}

impl PreferredLocation {
    /// Whether a record with this id and source satisfies the preference
    #[must_use]
    pub fn matches(&self, id: &str, source: SlotSource) -> bool {
        match self {
            Self::Slot(wanted) => wanted == id,
            Self::Source(wanted) => *wanted == source,
        }
    }
}

/// Electrical interface of an M.2 or U.2 connector
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageInterface {
    #[default]
    Pcie,
    Sata,
    Other(String),
}

impl StorageInterface {
    /// Classify a free-form interface label from an inventory record
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        let lower = label.to_ascii_lowercase();
        if lower.is_empty() || lower.contains("pcie") || lower.contains("nvme") {
            Self::Pcie
        } else if lower.contains("sata") {
            Self::Sata
        } else {
            Self::Other(lower)
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pcie => "pcie",
            Self::Sata => "sata",
            Self::Other(label) => label,
        }
    }
}

impl fmt::Display for StorageInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
