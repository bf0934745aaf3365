//! Physical PCIe slots with backward-compatible sizing
//!
//! A card seats in any slot at least as wide as it needs. Candidates are
//! ranked by the caller's preferred location, then motherboard before riser,
//! then the narrowest compatible width, then slot id.

use crate::book::Allocation;
use crate::pool::ResourcePool;
use crate::slots::{saturating_u32, slot_quantity, SlotRecord, SlotTable};
use crate::stats::{PoolDetails, PoolStats, SlotCounts};
use rackfit_errors::ResourceError;
use rackfit_types::{
    AllocationId, AllocationRequest, ComponentId, PcieSlotSize, ResourceType, SlotSource,
};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcieSlot {
    pub id: String,
    pub size: PcieSlotSize,
    pub source: SlotSource,
    open: bool,
}

impl PcieSlot {
    pub fn new(id: impl Into<String>, size: PcieSlotSize, source: SlotSource) -> Self {
        Self {
            id: id.into(),
            size,
            source,
            open: true,
        }
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        self.open
    }
}

impl SlotRecord for PcieSlot {
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
pub struct PcieSlotPool {
    table: SlotTable<PcieSlot>,
}

impl PcieSlotPool {
    #[must_use]
    pub fn new(slots: Vec<PcieSlot>) -> Self {
        Self {
            table: SlotTable::new(ResourceType::PcieSlots, slots),
        }
    }

    /// Build the pool from motherboard slot sizes and chassis riser layouts
    ///
    /// Motherboard slots are named `mb_pcie_<n>`; riser slots
    /// `riser_<r>_slot_<n>`.
    #[must_use]
    pub fn from_layout(motherboard: &[PcieSlotSize], risers: &[Vec<PcieSlotSize>]) -> Self {
        let mut slots: Vec<PcieSlot> = motherboard
            .iter()
            .enumerate()
            .map(|(i, &size)| PcieSlot::new(format!("mb_pcie_{i}"), size, SlotSource::Motherboard))
            .collect();
        for (r, riser) in risers.iter().enumerate() {
            slots.extend(riser.iter().enumerate().map(|(i, &size)| {
                PcieSlot::new(format!("riser_{r}_slot_{i}"), size, SlotSource::Riser)
            }));
        }
        Self::new(slots)
    }

    #[must_use]
    pub fn slots(&self) -> &[PcieSlot] {
        self.table.records()
    }

    /// Free slots able to seat a card of `required` width, best first
    #[must_use]
    pub fn compatible_slots(
        &self,
        required: PcieSlotSize,
        request: &AllocationRequest,
    ) -> Vec<&PcieSlot> {
        self.candidates(required, request)
            .into_iter()
            .map(|i| &self.table.records()[i])
            .collect()
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

    fn candidates(&self, required: PcieSlotSize, request: &AllocationRequest) -> Vec<usize> {
        self.table
            .ranked(|slot| {
                (
                    !request.prefers(&slot.id, slot.source),
                    slot.source != SlotSource::Motherboard,
                    slot.size,
                    slot.id.clone(),
                )
            })
            .into_iter()
            .filter(|&i| required.fits_in(self.table.records()[i].size))
            .collect()
    }
}

impl ResourcePool for PcieSlotPool {
    fn resource_type(&self) -> ResourceType {
        ResourceType::PcieSlots
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
        let required = request.required_size.unwrap_or(PcieSlotSize::X1);
        let candidates = self.candidates(required, &request);
        if candidates.len() < quantity as usize {
            return Err(ResourceError::exhausted(
                format!("PCIe {required} slot"),
                quantity,
                saturating_u32(candidates.len()),
            ));
        }

        let picks = &candidates[..quantity as usize];
        let id = self.table.commit(picks, component, request);
        debug!(
            resource = %ResourceType::PcieSlots,
            component = %component,
            allocation = %id,
            required = %required,
            slots = ?self.table.book().get(id).map(|a| &a.binding),
            "allocated PCIe slot"
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
        let mut by_size: BTreeMap<PcieSlotSize, SlotCounts> = BTreeMap::new();
        let mut by_source: BTreeMap<SlotSource, SlotCounts> = BTreeMap::new();
        for slot in self.table.records() {
            by_size.entry(slot.size).or_default().record(slot.open);
            by_source.entry(slot.source).or_default().record(slot.open);
        }
        PoolStats::new(
            ResourceType::PcieSlots,
            self.total_capacity(),
            self.available_capacity(),
            self.allocation_count(),
            PoolDetails::PcieSlots { by_size, by_source },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sized(size: PcieSlotSize) -> AllocationRequest {
        AllocationRequest::new().with_required_size(size)
    }

    fn selected(pool: &PcieSlotPool, id: AllocationId) -> String {
        pool.allocation(id).unwrap().binding[0].clone()
    }

    #[test]
    fn test_best_fit_prefers_smallest_slot() {
        let mut pool = PcieSlotPool::new(vec![
            PcieSlot::new("mb0", PcieSlotSize::X16, SlotSource::Motherboard),
            PcieSlot::new("mb1", PcieSlotSize::X8, SlotSource::Motherboard),
        ]);
        let id = pool
            .allocate(1, &ComponentId::new("hba"), sized(PcieSlotSize::X8))
            .unwrap();
        assert_eq!(selected(&pool, id), "mb1");
    }

    #[test]
    fn test_narrow_card_in_wide_slot() {
        let mut pool = PcieSlotPool::new(vec![PcieSlot::new(
            "mb0",
            PcieSlotSize::X16,
            SlotSource::Motherboard,
        )]);
        let id = pool
            .allocate(1, &ComponentId::new("nic"), sized(PcieSlotSize::X4))
            .unwrap();
        assert_eq!(selected(&pool, id), "mb0");
        assert_eq!(pool.available_capacity(), 0);
    }

    #[test]
    fn test_wide_card_rejected_by_narrow_slots() {
        let mut pool = PcieSlotPool::from_layout(&[PcieSlotSize::X8, PcieSlotSize::X8], &[]);
        let err = pool
            .allocate(1, &ComponentId::new("gpu"), sized(PcieSlotSize::X16))
            .unwrap_err();
        assert_eq!(err, ResourceError::exhausted("PCIe x16 slot", 1, 0));
        assert_eq!(pool.available_capacity(), 2);
    }

    #[test]
    fn test_motherboard_before_riser() {
        let mut pool =
            PcieSlotPool::from_layout(&[PcieSlotSize::X16], &[vec![PcieSlotSize::X8]]);
        let id = pool
            .allocate(1, &ComponentId::new("nic"), sized(PcieSlotSize::X8))
            .unwrap();
        assert_eq!(selected(&pool, id), "mb_pcie_0");
    }

    #[test]
    fn test_preferred_location_wins() {
        let mut pool =
            PcieSlotPool::from_layout(&[PcieSlotSize::X8], &[vec![PcieSlotSize::X16]]);
        let request = sized(PcieSlotSize::X8).prefer_source(SlotSource::Riser);
        let id = pool.allocate(1, &ComponentId::new("nic"), request).unwrap();
        assert_eq!(selected(&pool, id), "riser_0_slot_0");

        let mut pool = PcieSlotPool::from_layout(&[PcieSlotSize::X8, PcieSlotSize::X8], &[]);
        let request = sized(PcieSlotSize::X4).prefer_slot("mb_pcie_1");
        let id = pool.allocate(1, &ComponentId::new("nic"), request).unwrap();
        assert_eq!(selected(&pool, id), "mb_pcie_1");
    }

    #[test]
    fn test_lexicographic_tie_break() {
        let mut pool = PcieSlotPool::new(vec![
            PcieSlot::new("slot_b", PcieSlotSize::X8, SlotSource::Motherboard),
            PcieSlot::new("slot_a", PcieSlotSize::X8, SlotSource::Motherboard),
        ]);
        let id = pool
            .allocate(1, &ComponentId::new("nic"), sized(PcieSlotSize::X8))
            .unwrap();
        assert_eq!(selected(&pool, id), "slot_a");
    }

    #[test]
    fn test_multi_slot_allocation_is_atomic() {
        let mut pool = PcieSlotPool::from_layout(&[PcieSlotSize::X16, PcieSlotSize::X4], &[]);
        let err = pool
            .allocate(2, &ComponentId::new("gpu"), sized(PcieSlotSize::X16))
            .unwrap_err();
        assert_eq!(err.available(), 1);
        assert_eq!(pool.available_capacity(), 2);

        let id = pool
            .allocate(2, &ComponentId::new("gpu"), sized(PcieSlotSize::X4))
            .unwrap();
        assert_eq!(pool.allocation(id).unwrap().binding.len(), 2);
        assert_eq!(pool.available_capacity(), 0);
    }

    #[test]
    fn test_stats_breakdown() {
        let mut pool = PcieSlotPool::from_layout(
            &[PcieSlotSize::X16, PcieSlotSize::X8],
            &[vec![PcieSlotSize::X8]],
        );
        pool.allocate(1, &ComponentId::new("nic"), sized(PcieSlotSize::X8))
            .unwrap();
        let stats = pool.stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.used, 1);
        let PoolDetails::PcieSlots { by_size, by_source } = stats.details else {
            panic!("unexpected details");
        };
        assert_eq!(by_size[&PcieSlotSize::X8], SlotCounts { total: 2, available: 1 });
        assert_eq!(by_source[&SlotSource::Riser], SlotCounts { total: 1, available: 1 });
    }
}
