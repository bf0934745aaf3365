//! M.2 connectors on the motherboard and on adapter cards
//!
//! Motherboard connectors are wired outside the expansion lane budget;
//! adapter connectors are not. Each allocation records the exemption of the
//! slots it binds so callers can forward it to the lane pool.

use crate::book::Allocation;
use crate::pool::ResourcePool;
use crate::slots::{saturating_u32, slot_quantity, SlotRecord, SlotTable};
use crate::stats::{PoolDetails, PoolStats, SlotCounts};
use rackfit_errors::ResourceError;
use rackfit_types::{
    AllocationId, AllocationRequest, ComponentId, Exemption, ResourceType, SlotSource,
    StorageInterface,
};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct M2Slot {
    pub id: String,
    pub source: SlotSource,
    pub form_factor: String,
    pub interface: StorageInterface,
    open: bool,
}

impl M2Slot {
    pub fn new(
        id: impl Into<String>,
        source: SlotSource,
        form_factor: impl Into<String>,
        interface: StorageInterface,
    ) -> Self {
        Self {
            id: id.into(),
            source,
            form_factor: form_factor.into(),
            interface,
            open: true,
        }
    }

    /// Lane accounting rule for drives seated here
    #[must_use]
    pub fn exemption(&self) -> Exemption {
        Exemption::for_m2_source(self.source)
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        self.open
    }
}

impl SlotRecord for M2Slot {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn set_open(&mut self, open: bool) {
        self.open = open;
    }
}

#[derive(Debug, Clone)]
pub struct M2SlotPool {
    table: SlotTable<M2Slot>,
}

impl M2SlotPool {
    #[must_use]
    pub fn new(slots: Vec<M2Slot>) -> Self {
        Self {
            table: SlotTable::new(ResourceType::M2Slots, slots),
        }
    }

    #[must_use]
    pub fn slots(&self) -> &[M2Slot] {
        self.table.records()
    }

    #[must_use]
    pub fn allocation(&self, id: AllocationId) -> Option<&Allocation<Vec<String>>> {
        self.table.book().get(id)
    }

    pub fn allocations_for<'a>(
        &'a self,
        component: &'a ComponentId,
    ) -> impl Iterator<Item = &'a Allocation<Vec<String>>> + 'a {
        self.table.book().for_component(component)
    }

    /// Exemption carried by a live allocation
    #[must_use]
    pub fn exemption_of(&self, id: AllocationId) -> Option<Exemption> {
        self.allocation(id).map(|a| a.request.exemption)
    }

    /// Allocations that must be charged against the lane budget
    #[must_use]
    pub fn allocations_consuming_lanes(&self) -> Vec<&Allocation<Vec<String>>> {
        self.table
            .book()
            .iter()
            .filter(|a| !a.request.exemption.bypasses_lane_budget())
            .collect()
    }

    fn candidates(&self, request: &AllocationRequest) -> Vec<usize> {
        self.table.ranked(|slot| {
            (
                !request.prefers(&slot.id, slot.source),
                slot.source != SlotSource::Motherboard,
            )
        })
    }
}

impl ResourcePool for M2SlotPool {
    fn resource_type(&self) -> ResourceType {
        ResourceType::M2Slots
    }

    fn total_capacity(&self) -> u32 {
        self.table.total()
    }

    fn used_capacity(&self) -> u32 {
        self.table.total() - self.table.available()
    }

    fn available_capacity(&self) -> u32 {
        self.table.available()
    }

    fn allocate(
        &mut self,
        quantity: u32,
        component: &ComponentId,
        mut request: AllocationRequest,
    ) -> Result<AllocationId, ResourceError> {
        let quantity = slot_quantity(quantity);
        let candidates = self.candidates(&request);
        if candidates.len() < quantity as usize {
            return Err(ResourceError::exhausted(
                ResourceType::M2Slots.label(),
                quantity,
                saturating_u32(candidates.len()),
            ));
        }

        let picks = &candidates[..quantity as usize];
        // a binding that touches any adapter slot consumes lanes
        request.exemption = if picks
            .iter()
            .all(|&i| self.table.records()[i].exemption().bypasses_lane_budget())
        {
            Exemption::MotherboardM2
        } else {
            Exemption::AdapterM2
        };
        let exemption = request.exemption;

        let id = self.table.commit(picks, component, request);
        debug!(
            resource = %ResourceType::M2Slots,
            component = %component,
            allocation = %id,
            exemption = exemption.as_str(),
            slots = ?self.table.book().get(id).map(|a| &a.binding),
            "allocated M.2 slot"
        );
        Ok(id)
    }

    fn deallocate(&mut self, id: AllocationId) -> bool {
        self.table.release(id).is_some()
    }

    fn deallocate_by_component(&mut self, component: &ComponentId) -> usize {
        self.table.release_component(component)
    }

    fn allocations_of(&self, component: &ComponentId) -> Vec<AllocationId> {
        self.table.book().for_component(component).map(|a| a.id).collect()
    }

    fn allocation_count(&self) -> usize {
        self.table.book().len()
    }

    fn reset(&mut self) {
        self.table.reset();
    }

    fn stats(&self) -> PoolStats {
        let mut by_source: BTreeMap<SlotSource, SlotCounts> = BTreeMap::new();
        let mut by_interface: BTreeMap<String, SlotCounts> = BTreeMap::new();
        for slot in self.table.records() {
            by_source.entry(slot.source).or_default().record(slot.open);
            by_interface
                .entry(slot.interface.to_string())
                .or_default()
                .record(slot.open);
        }
        PoolStats::new(
            ResourceType::M2Slots,
            self.total_capacity(),
            self.available_capacity(),
            self.allocation_count(),
            PoolDetails::M2Slots {
                by_source,
                by_interface,
                lane_consuming_allocations: self.allocations_consuming_lanes().len(),
            },
        )
    }
}
