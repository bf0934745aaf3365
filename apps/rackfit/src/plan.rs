//! Placement of a build's components into its platform's resources
//!
//! Components are placed in a fixed order: memory first, then PCIe devices,
//! then storage. A component that does not fit is reported and released so
//! later components still see an accurate picture.

use rackfit_errors::ResourceError;
use rackfit_resources::{PoolStats, ResourcePool, ResourceRegistry};
use rackfit_types::{
    AllocationId, AllocationRequest, ComponentId, ComponentKind, PcieSlotSize, ResourceType,
    ServerConfiguration, SlotSource, StorageSpec,
};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Lanes an NVMe drive consumes when its record does not say
const DEFAULT_NVME_LANES: u32 = 4;

/// Where a drive is seated, derived from its interface label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBay {
    M2,
    U2,
    Sata,
}

impl StorageBay {
    pub fn classify(label: &str) -> Self {
        let lower = label.to_ascii_lowercase();
        if lower.contains("u.2") || lower.contains("u2") {
            Self::U2
        } else if lower.contains("m.2") || lower.contains("m2") || lower.contains("nvme") {
            Self::M2
        } else {
            Self::Sata
        }
    }
}

/// Outcome of placing one component
#[derive(Debug, Clone, Serialize)]
pub struct Placement {
    pub component: ComponentId,
    pub kind: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub uuid: String,
    /// Slot or port ids the component was bound to
    pub bound_to: Vec<String>,
    /// Lanes charged against the expansion budget
    pub lanes: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Placement {
    fn new(kind: ComponentKind, index: usize, uuid: &str) -> Self {
        Self {
            component: ComponentId::new(format!("{kind}[{index}]")),
            kind: kind.to_string(),
            uuid: uuid.to_string(),
            bound_to: Vec::new(),
            lanes: 0,
            note: None,
            error: None,
        }
    }

    #[must_use]
    pub fn is_placed(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of a full placement walk
#[derive(Debug, Clone, Serialize)]
pub struct PlanReport {
    pub placements: Vec<Placement>,
    pub failed: usize,
    pub stats: BTreeMap<ResourceType, PoolStats>,
    pub bottlenecks: Vec<ResourceType>,
}

/// Place every component of `config` into `registry`
pub fn plan(registry: &mut ResourceRegistry, config: &ServerConfiguration) -> PlanReport {
    let mut placements = Vec::new();

    for (index, ram) in config.ram.iter().enumerate() {
        let mut placement = Placement::new(ComponentKind::Ram, index, &ram.uuid);
        let result = registry
            .allocate(
                ResourceType::RamSlots,
                1,
                &placement.component,
                AllocationRequest::new(),
            )
            .map(|id| bind_slots(registry, id, &mut placement));
        finish(registry, &mut placement, result);
        placements.push(placement);
    }

    for (index, nic) in config.nic.iter().enumerate() {
        let mut placement = Placement::new(ComponentKind::Nic, index, &nic.uuid);
        if nic.onboard {
            placement.note = Some("onboard, reserved with the motherboard".to_string());
        } else {
            let result = seat_card(registry, &mut placement, nic.slot_size, nic.pcie_lanes);
            finish(registry, &mut placement, result);
        }
        placements.push(placement);
    }

    for (index, card) in config.pciecard.iter().enumerate() {
        let mut placement = Placement::new(ComponentKind::PcieCard, index, &card.uuid);
        let result = seat_card(registry, &mut placement, card.slot_size, card.pcie_lanes);
        finish(registry, &mut placement, result);
        placements.push(placement);
    }

    for (index, card) in config.hbacard.iter().enumerate() {
        let mut placement = Placement::new(ComponentKind::HbaCard, index, &card.uuid);
        let result = seat_card(registry, &mut placement, card.slot_size, card.pcie_lanes);
        finish(registry, &mut placement, result);
        placements.push(placement);
    }

    for (index, drive) in config.storage.iter().enumerate() {
        let mut placement = Placement::new(ComponentKind::Storage, index, &drive.uuid);
        let result = seat_drive(registry, &mut placement, drive);
        finish(registry, &mut placement, result);
        placements.push(placement);
    }

    let failed = placements.iter().filter(|p| !p.is_placed()).count();
    PlanReport {
        placements,
        failed,
        stats: registry.all_stats(),
        bottlenecks: registry.bottleneck_resources(),
    }
}

/// Narrowest slot able to carry `lanes`
fn size_for_lanes(lanes: u32) -> PcieSlotSize {
    PcieSlotSize::ALL
        .into_iter()
        .find(|size| size.lanes() >= lanes)
        .unwrap_or(PcieSlotSize::X16)
}

fn seat_card(
    registry: &mut ResourceRegistry,
    placement: &mut Placement,
    slot_size: Option<PcieSlotSize>,
    lanes: u32,
) -> Result<(), ResourceError> {
    let size = slot_size.unwrap_or_else(|| size_for_lanes(lanes));
    let lanes = if lanes == 0 { size.lanes() } else { lanes };

    let slot = registry.pcie_slots_mut().allocate(
        1,
        &placement.component,
        AllocationRequest::new().with_required_size(size),
    )?;
    bind_slots(registry, slot, placement);

    registry.lanes_mut().allocate(
        lanes,
        &placement.component,
        AllocationRequest::new().with_label("pcie_slot", slot.to_string()),
    )?;
    placement.lanes = lanes;
    Ok(())
}

fn seat_drive(
    registry: &mut ResourceRegistry,
    placement: &mut Placement,
    drive: &StorageSpec,
) -> Result<(), ResourceError> {
    match StorageBay::classify(&drive.interface) {
        StorageBay::M2 => {
            let slot = registry.m2_slots_mut().allocate(
                1,
                &placement.component,
                AllocationRequest::new().prefer_source(SlotSource::Motherboard),
            )?;
            bind_slots(registry, slot, placement);

            let lanes = match drive.pcie_lanes {
                0 if drive.interface.to_ascii_lowercase().contains("sata") => 0,
                0 => DEFAULT_NVME_LANES,
                lanes => lanes,
            };
            if lanes > 0 {
                registry.forward_m2_lanes(slot, lanes, &placement.component)?;
                let exempt = registry
                    .m2_slots()
                    .exemption_of(slot)
                    .is_some_and(|exemption| exemption.bypasses_lane_budget());
                placement.lanes = if exempt { 0 } else { lanes };
            }
        }
        StorageBay::U2 => {
            let slot = registry.u2_slots_mut().allocate(
                1,
                &placement.component,
                AllocationRequest::new(),
            )?;
            bind_slots(registry, slot, placement);
        }
        StorageBay::Sata => {
            let port = registry.sata_ports_mut().allocate(
                1,
                &placement.component,
                AllocationRequest::new(),
            )?;
            bind_slots(registry, port, placement);
        }
    }
    Ok(())
}

/// Record the slot ids bound by a slot-pool allocation
fn bind_slots(registry: &ResourceRegistry, id: AllocationId, placement: &mut Placement) {
    let bound = match id.resource() {
        ResourceType::PcieSlots => registry.pcie_slots().allocation(id).map(|a| &a.binding),
        ResourceType::RamSlots => registry.ram_slots().allocation(id).map(|a| &a.binding),
        ResourceType::M2Slots => registry.m2_slots().allocation(id).map(|a| &a.binding),
        ResourceType::U2Slots => registry.u2_slots().allocation(id).map(|a| &a.binding),
        ResourceType::SataPorts => registry.sata_ports().allocation(id).map(|a| &a.binding),
        ResourceType::PcieLanes => None,
    };
    if let Some(bound) = bound {
        placement.bound_to.extend(bound.iter().cloned());
    }
}

fn finish(
    registry: &mut ResourceRegistry,
    placement: &mut Placement,
    result: Result<(), ResourceError>,
) {
    match result {
        Ok(()) => debug!(
            component = %placement.component,
            bound_to = ?placement.bound_to,
            lanes = placement.lanes,
            "placed component"
        ),
        Err(err) => {
            let released = registry.deallocate_component(&placement.component);
            warn!(
                component = %placement.component,
                released,
                error = %err,
                "component does not fit"
            );
            placement.bound_to.clear();
            placement.lanes = 0;
            placement.error = Some(err.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rackfit_config::AllocationConfig;
    use rackfit_resources::PoolFactory;
    use serde_json::json;

    fn registry_for(raw: &serde_json::Value) -> (ResourceRegistry, ServerConfiguration) {
        let config = PoolFactory::parse_configuration(raw).unwrap();
        let registry = PoolFactory::create_registry(&config, &AllocationConfig::default()).unwrap();
        (registry, config)
    }

    #[test]
    fn test_classify_storage() {
        assert_eq!(StorageBay::classify("M.2 NVMe"), StorageBay::M2);
        assert_eq!(StorageBay::classify("NVMe"), StorageBay::M2);
        assert_eq!(StorageBay::classify("U.2 NVMe"), StorageBay::U2);
        assert_eq!(StorageBay::classify("SATA III"), StorageBay::Sata);
        assert_eq!(StorageBay::classify(""), StorageBay::Sata);
    }

    #[test]
    fn test_size_for_lanes() {
        assert_eq!(size_for_lanes(0), PcieSlotSize::X1);
        assert_eq!(size_for_lanes(2), PcieSlotSize::X4);
        assert_eq!(size_for_lanes(8), PcieSlotSize::X8);
        assert_eq!(size_for_lanes(32), PcieSlotSize::X16);
    }

    #[test]
    fn test_plan_places_everything() {
        let (mut registry, config) = registry_for(&json!({
            "motherboard": [{
                "chipset_pcie_lanes": 8,
                "sata_ports": 2,
                "expansion_slots": {"pcie_slots": ["x16", "x8"]},
                "memory": {"slot_count": 4, "channels": 2},
                "m2_slots": [{"count": 1}]
            }],
            "cpu": [{"pcie_lanes": 32}],
            "ram": [{"uuid": "dimm-a"}, {"uuid": "dimm-b"}],
            "nic": [{"uuid": "nic-a", "slot_size": "x8"}, {"uuid": "nic-b", "onboard": true}],
            "storage": [
                {"uuid": "boot", "interface": "M.2 NVMe"},
                {"uuid": "data", "interface": "SATA"}
            ]
        }));

        let report = plan(&mut registry, &config);
        assert_eq!(report.failed, 0);
        assert_eq!(report.placements.len(), 6);
        assert_eq!(report.placements[0].bound_to, vec!["ram_ch0_slot0"]);
        assert_eq!(report.placements[2].bound_to, vec!["mb_pcie_1"]);
        assert_eq!(report.placements[2].lanes, 8);
        assert!(report.placements[3].note.is_some());
        assert_eq!(report.placements[4].bound_to, vec!["mb_m2_0"]);
        assert_eq!(report.placements[4].lanes, 0);
        assert_eq!(report.placements[5].bound_to, vec!["mb_sata_0"]);
        // onboard reservation plus the NIC
        assert_eq!(registry.lanes().used_capacity(), 1 + 8);
    }

    #[test]
    fn test_failed_placement_is_released() {
        let (mut registry, config) = registry_for(&json!({
            "motherboard": [{"expansion_slots": {"pcie_slots": ["x16"]}}],
            "cpu": [{"pcie_lanes": 4}],
            "pciecard": [{"uuid": "gpu", "slot_size": "x16", "pcie_lanes": 16}],
            "hbacard": [{"uuid": "hba", "slot_size": "x4"}]
        }));

        let report = plan(&mut registry, &config);
        assert_eq!(report.failed, 1);
        let gpu = &report.placements[0];
        assert!(!gpu.is_placed());
        assert!(gpu.bound_to.is_empty());
        assert!(gpu.error.as_deref().unwrap().contains("PCIe lanes"));

        let hba = &report.placements[1];
        assert!(hba.is_placed());
        assert_eq!(hba.bound_to, vec!["mb_pcie_0"]);
        assert_eq!(hba.lanes, 4);
    }

    #[test]
    fn test_adapter_m2_charges_lanes() {
        let (mut registry, config) = registry_for(&json!({
            "motherboard": [{"expansion_slots": {"pcie_slots": ["x8"]}}],
            "cpu": [{"pcie_lanes": 16}],
            "pciecard": [{"slot_size": "x8", "m2_slots": [{"count": 2}]}],
            "storage": [{"interface": "NVMe", "pcie_lanes": 4}]
        }));

        let report = plan(&mut registry, &config);
        assert_eq!(report.failed, 0);
        assert_eq!(report.placements[1].bound_to, vec!["adapter_0_m2_0"]);
        assert_eq!(report.placements[1].lanes, 4);
        assert_eq!(registry.lanes().used_capacity(), 8 + 4);
    }
}
