//! U.2 bays on the motherboard, chassis backplanes and adapter cards

use crate::book::Allocation;
use crate::pool::ResourcePool;
use crate::slots::{saturating_u32, slot_quantity, SlotRecord, SlotTable};
use crate::stats::{PoolDetails, PoolStats, SlotCounts};
use rackfit_errors::ResourceError;
use rackfit_types::{
    AllocationId, AllocationRequest, ComponentId, ResourceType, SlotSource, StorageInterface,
};
use std::collections::BTreeMap;
use tracing::debug;

const BACKPLANE_PREFIX: &str = "backplane";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct U2Slot {
    pub id: String,
    pub source: SlotSource,
    pub interface: StorageInterface,
    open: bool,
}

impl U2Slot {
    pub fn new(id: impl Into<String>, source: SlotSource, interface: StorageInterface) -> Self {
        Self {
            id: id.into(),
            source,
            interface,
            open: true,
        }
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        self.open
    }

    /// Selection tier: motherboard, then backplane, then anything else
    fn tier(&self) -> u8 {
        if self.source == SlotSource::Motherboard {
            0
        } else if self.id.starts_with(BACKPLANE_PREFIX) {
            1
        } else {
            2
        }
    }
}

impl SlotRecord for U2Slot {
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
pub struct U2SlotPool {
    table: SlotTable<U2Slot>,
}

impl U2SlotPool {
    #[must_use]
    pub fn new(slots: Vec<U2Slot>) -> Self {
        Self {
            table: SlotTable::new(ResourceType::U2Slots, slots),
        }
    }

    #[must_use]
    pub fn slots(&self) -> &[U2Slot] {
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
}

impl ResourcePool for U2SlotPool {
    fn resource_type(&self) -> ResourceType {
        ResourceType::U2Slots
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
        request: AllocationRequest,
    ) -> Result<AllocationId, ResourceError> {
        let quantity = slot_quantity(quantity);
        let candidates = self
            .table
            .ranked(|slot| (!request.prefers(&slot.id, slot.source), slot.tier()));
        if candidates.len() < quantity as usize {
            return Err(ResourceError::exhausted(
                ResourceType::U2Slots.label(),
                quantity,
                saturating_u32(candidates.len()),
            ));
        }

        let id = self
            .table
            .commit(&candidates[..quantity as usize], component, request);
        debug!(
            resource = %ResourceType::U2Slots,
            component = %component,
            allocation = %id,
            slots = ?self.table.book().get(id).map(|a| &a.binding),
            "allocated U.2 slot"
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
            ResourceType::U2Slots,
            self.total_capacity(),
            self.available_capacity(),
            self.allocation_count(),
            PoolDetails::U2Slots {
                by_source,
                by_interface,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_tiers() {
        let mut pool = U2SlotPool::new(vec![
            U2Slot::new("adapter_0_u2_0", SlotSource::Adapter, StorageInterface::Pcie),
            U2Slot::new("backplane_0_u2_0", SlotSource::Backplane, StorageInterface::Pcie),
            U2Slot::new("mb_u2_0", SlotSource::Motherboard, StorageInterface::Pcie),
        ]);
        let owner = ComponentId::new("ssd");
        let picks: Vec<String> = (0..3)
            .map(|_| {
                let id = pool.allocate(1, &owner, AllocationRequest::new()).unwrap();
                pool.allocation(id).unwrap().binding[0].clone()
            })
            .collect();
        assert_eq!(picks, vec!["mb_u2_0", "backplane_0_u2_0", "adapter_0_u2_0"]);
    }

    #[test]
    fn test_preferred_source() {
        let mut pool = U2SlotPool::new(vec![
            U2Slot::new("mb_u2_0", SlotSource::Motherboard, StorageInterface::Pcie),
            U2Slot::new("adapter_0_u2_0", SlotSource::Adapter, StorageInterface::Pcie),
        ]);
        let id = pool
            .allocate(
                1,
                &ComponentId::new("ssd"),
                AllocationRequest::new().prefer_source(SlotSource::Adapter),
            )
            .unwrap();
        assert_eq!(pool.allocation(id).unwrap().binding, vec!["adapter_0_u2_0"]);
    }

    #[test]
    fn test_exhaustion_leaves_pool_untouched() {
        let mut pool = U2SlotPool::new(vec![U2Slot::new(
            "mb_u2_0",
            SlotSource::Motherboard,
            StorageInterface::Pcie,
        )]);
        let err = pool
            .allocate(2, &ComponentId::new("ssd"), AllocationRequest::new())
            .unwrap_err();
        assert_eq!(err, ResourceError::exhausted("U.2 slot", 2, 1));
        assert_eq!(pool.available_capacity(), 1);
        assert_eq!(pool.allocation_count(), 0);
    }
}
