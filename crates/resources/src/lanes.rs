//! Additive PCIe lane budget
//!
//! Capacity is the CPU lanes plus the chipset lanes. Onboard SATA
//! controllers (one lane per two ports, rounded up) and onboard NICs (one
//! lane each) are carved out at construction and never show up as
//! allocations. Allocations tagged [`Exemption::MotherboardM2`] are recorded
//! but do not count against the budget.

use crate::book::{Allocation, AllocationBook};
use crate::pool::ResourcePool;
use crate::stats::{PoolDetails, PoolStats};
use rackfit_errors::ResourceError;
use rackfit_types::{AllocationId, AllocationRequest, ComponentId, Exemption, ResourceType};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct PcieLanePool {
    cpu_lanes: u32,
    chipset_lanes: u32,
    reserved_lanes: u32,
    book: AllocationBook<Exemption>,
}

impl PcieLanePool {
    /// Create a lane pool with an explicit reservation
    ///
    /// A reservation larger than the budget is clamped to the budget.
    #[must_use]
    pub fn new(cpu_lanes: u32, chipset_lanes: u32, reserved_lanes: u32) -> Self {
        let total = cpu_lanes.saturating_add(chipset_lanes);
        Self {
            cpu_lanes,
            chipset_lanes,
            reserved_lanes: reserved_lanes.min(total),
            book: AllocationBook::new(ResourceType::PcieLanes),
        }
    }

    /// Create a lane pool reserving lanes for onboard SATA and NICs
    #[must_use]
    pub fn for_platform(
        cpu_lanes: u32,
        chipset_lanes: u32,
        onboard_sata_ports: u32,
        onboard_nics: u32,
    ) -> Self {
        Self::new(
            cpu_lanes,
            chipset_lanes,
            onboard_reservation(onboard_sata_ports, onboard_nics),
        )
    }

    #[must_use]
    pub fn reserved_lanes(&self) -> u32 {
        self.reserved_lanes
    }

    /// Lanes held by allocations that count against the budget
    #[must_use]
    pub fn consumed_lanes(&self) -> u32 {
        self.book
            .iter()
            .filter(|a| !a.binding.bypasses_lane_budget())
            .map(|a| a.quantity)
            .fold(0, u32::saturating_add)
    }

    /// Lanes recorded by exempt allocations, saturating at `u32::MAX`
    #[must_use]
    pub fn exempt_lanes(&self) -> u32 {
        self.book
            .iter()
            .filter(|a| a.binding.bypasses_lane_budget())
            .map(|a| a.quantity)
            .fold(0, u32::saturating_add)
    }

    #[must_use]
    pub fn allocation(&self, id: AllocationId) -> Option<&Allocation<Exemption>> {
        self.book.get(id)
    }

    pub fn allocations_for<'a>(
        &'a self,
        component: &'a ComponentId,
    ) -> impl Iterator<Item = &'a Allocation<Exemption>> + 'a {
        self.book.for_component(component)
    }
}

/// Lanes consumed by onboard controllers
#[must_use]
pub fn onboard_reservation(sata_ports: u32, onboard_nics: u32) -> u32 {
    sata_ports.div_ceil(2).saturating_add(onboard_nics)
}

impl ResourcePool for PcieLanePool {
    fn resource_type(&self) -> ResourceType {
        ResourceType::PcieLanes
    }

    fn total_capacity(&self) -> u32 {
        self.cpu_lanes.saturating_add(self.chipset_lanes)
    }

    fn used_capacity(&self) -> u32 {
        self.reserved_lanes.saturating_add(self.consumed_lanes())
    }

    fn allocate(
        &mut self,
        quantity: u32,
        component: &ComponentId,
        request: AllocationRequest,
    ) -> Result<AllocationId, ResourceError> {
        let exemption = request.exemption;
        if !exemption.bypasses_lane_budget() {
            let available = self.available_capacity();
            if quantity > available {
                debug!(
                    resource = %ResourceType::PcieLanes,
                    component = %component,
                    requested = quantity,
                    available,
                    "lane budget exhausted"
                );
                return Err(ResourceError::exhausted(
                    ResourceType::PcieLanes.label(),
                    quantity,
                    available,
                ));
            }
        }

        let id = self.book.insert(component, quantity, exemption, request);
        debug!(
            resource = %ResourceType::PcieLanes,
            component = %component,
            allocation = %id,
            lanes = quantity,
            exemption = exemption.as_str(),
            "allocated lanes"
        );
        Ok(id)
    }

    fn deallocate(&mut self, id: AllocationId) -> bool {
        let Some(allocation) = self.book.remove(id) else {
            return false;
        };
        debug!(
            resource = %ResourceType::PcieLanes,
            component = %allocation.component,
            allocation = %id,
            lanes = allocation.quantity,
            "released lanes"
        );
        true
    }

    fn deallocate_by_component(&mut self, component: &ComponentId) -> usize {
        let released = self.book.remove_component(component).len();
        if released > 0 {
            debug!(
                resource = %ResourceType::PcieLanes,
                component = %component,
                released,
                "released component lanes"
            );
        }
        released
    }

    fn allocations_of(&self, component: &ComponentId) -> Vec<AllocationId> {
        self.book.for_component(component).map(|a| a.id).collect()
    }

    fn allocation_count(&self) -> usize {
        self.book.len()
    }

    fn reset(&mut self) {
        self.book.clear();
        debug!(resource = %ResourceType::PcieLanes, "reset pool");
    }

    fn stats(&self) -> PoolStats {
        let exempt_allocations = self
            .book
            .iter()
            .filter(|a| a.binding.bypasses_lane_budget())
            .count();
        PoolStats::new(
            ResourceType::PcieLanes,
            self.total_capacity(),
            self.available_capacity(),
            self.book.len(),
            PoolDetails::Lanes {
                cpu_lanes: self.cpu_lanes,
                chipset_lanes: self.chipset_lanes,
                reserved_lanes: self.reserved_lanes,
                exempt_lanes: self.exempt_lanes(),
                exempt_allocations,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component(id: &str) -> ComponentId {
        ComponentId::new(id)
    }

    #[test]
    fn test_reservation_from_onboard_devices() {
        let pool = PcieLanePool::for_platform(0, 24, 4, 1);
        assert_eq!(pool.total_capacity(), 24);
        assert_eq!(pool.reserved_lanes(), 3);
        assert_eq!(pool.used_capacity(), 3);
        assert_eq!(pool.available_capacity(), 21);
    }

    #[test]
    fn test_odd_sata_ports_round_up() {
        assert_eq!(onboard_reservation(5, 0), 3);
        assert_eq!(onboard_reservation(0, 2), 2);
        assert_eq!(onboard_reservation(0, 0), 0);
    }

    #[test]
    fn test_allocate_and_exhaust() {
        let mut pool = PcieLanePool::new(16, 0, 0);
        let id = pool
            .allocate(16, &component("gpu"), AllocationRequest::new())
            .unwrap();
        assert_eq!(pool.available_capacity(), 0);

        let err = pool
            .allocate(1, &component("nic"), AllocationRequest::new())
            .unwrap_err();
        assert_eq!(err, ResourceError::exhausted("PCIe lanes", 1, 0));

        assert!(pool.deallocate(id));
        assert!(!pool.deallocate(id));
        assert_eq!(pool.available_capacity(), 16);
    }

    #[test]
    fn test_motherboard_m2_is_exempt() {
        let mut pool = PcieLanePool::new(4, 0, 0);
        let request = AllocationRequest::new().with_exemption(Exemption::MotherboardM2);
        pool.allocate(4, &component("nvme0"), request.clone()).unwrap();
        // still succeeds beyond the budget
        pool.allocate(8, &component("nvme1"), request).unwrap();

        assert_eq!(pool.used_capacity(), 0);
        assert_eq!(pool.exempt_lanes(), 12);
        assert_eq!(pool.allocation_count(), 2);
    }

    #[test]
    fn test_exempt_totals_saturate() {
        let mut pool = PcieLanePool::new(16, 0, 0);
        let request = AllocationRequest::new().with_exemption(Exemption::MotherboardM2);
        pool.allocate(u32::MAX, &component("nvme0"), request.clone()).unwrap();
        pool.allocate(2, &component("nvme1"), request).unwrap();

        let stats = pool.stats();
        assert_eq!(stats.used, 0);
        assert_eq!(stats.available, 16);
        let PoolDetails::Lanes {
            exempt_lanes,
            exempt_allocations,
            ..
        } = stats.details
        else {
            panic!("unexpected details");
        };
        assert_eq!(exempt_lanes, u32::MAX);
        assert_eq!(exempt_allocations, 2);
    }

    #[test]
    fn test_adapter_m2_consumes_lanes() {
        let mut pool = PcieLanePool::new(8, 0, 0);
        let request = AllocationRequest::new().with_exemption(Exemption::AdapterM2);
        pool.allocate(4, &component("nvme0"), request).unwrap();
        assert_eq!(pool.used_capacity(), 4);
    }

    #[test]
    fn test_reservation_clamped_to_budget() {
        let pool = PcieLanePool::for_platform(0, 2, 8, 1);
        assert_eq!(pool.total_capacity(), 2);
        assert_eq!(pool.used_capacity(), 2);
        assert_eq!(pool.available_capacity(), 0);
    }

    #[test]
    fn test_reset_restarts_ids() {
        let mut pool = PcieLanePool::new(32, 0, 2);
        let first = pool
            .allocate(4, &component("a"), AllocationRequest::new())
            .unwrap();
        pool.allocate(4, &component("b"), AllocationRequest::new())
            .unwrap();
        pool.reset();
        assert_eq!(pool.used_capacity(), 2);
        let again = pool
            .allocate(4, &component("c"), AllocationRequest::new())
            .unwrap();
        assert_eq!(first, again);
    }
}
