//! Pool statistics and availability reporting

use rackfit_types::{PcieSlotSize, ResourceType, SlotSource};
use serde::Serialize;
use std::collections::BTreeMap;

/// Snapshot of one pool's capacity and its pool-specific breakdown
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolStats {
    pub resource: ResourceType,
    pub total: u32,
    pub used: u32,
    pub available: u32,
    pub utilization_percent: f64,
    pub allocations: usize,
    pub details: PoolDetails,
}

impl PoolStats {
    pub(crate) fn new(
        resource: ResourceType,
        total: u32,
        available: u32,
        allocations: usize,
        details: PoolDetails,
    ) -> Self {
        let used = total.saturating_sub(available);
        Self {
            resource,
            total,
            used,
            available,
            utilization_percent: utilization_percent(used, total),
            allocations,
            details,
        }
    }
}

/// Used share of total capacity, in percent with two decimals
#[must_use]
pub fn utilization_percent(used: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (f64::from(used) / f64::from(total) * 10_000.0).round() / 100.0
}

/// Total and free records within one group of a breakdown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SlotCounts {
    pub total: u32,
    pub available: u32,
}

impl SlotCounts {
    pub(crate) fn record(&mut self, free: bool) {
        self.total += 1;
        if free {
            self.available += 1;
        }
    }
}

/// Pool-specific breakdowns
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PoolDetails {
    Lanes {
        cpu_lanes: u32,
        chipset_lanes: u32,
        reserved_lanes: u32,
        exempt_lanes: u32,
        exempt_allocations: usize,
    },
    PcieSlots {
        by_size: BTreeMap<PcieSlotSize, SlotCounts>,
        by_source: BTreeMap<SlotSource, SlotCounts>,
    },
    RamSlots {
        slot_type: String,
        channels: u32,
        slots_per_channel: u32,
        by_channel: BTreeMap<u32, SlotCounts>,
    },
    M2Slots {
        by_source: BTreeMap<SlotSource, SlotCounts>,
        by_interface: BTreeMap<String, SlotCounts>,
        lane_consuming_allocations: usize,
    },
    U2Slots {
        by_source: BTreeMap<SlotSource, SlotCounts>,
        by_interface: BTreeMap<String, SlotCounts>,
    },
    SataPorts {
        by_source: BTreeMap<SlotSource, SlotCounts>,
        reserved: u32,
    },
}

/// Headroom of one pool as reported by the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Availability {
    pub total: u32,
    pub available: u32,
    pub exhausted: bool,
}

impl Availability {
    #[must_use]
    pub fn new(total: u32, available: u32) -> Self {
        Self {
            total,
            available,
            exhausted: total > 0 && available == 0,
        }
    }
}
