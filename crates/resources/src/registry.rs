//! One configuration's six resource pools

use crate::lanes::PcieLanePool;
use crate::m2::M2SlotPool;
use crate::pcie::PcieSlotPool;
use crate::pool::ResourcePool;
use crate::ram::RamSlotPool;
use crate::sata::SataPortPool;
use crate::stats::{Availability, PoolStats};
use crate::u2::U2SlotPool;
use rackfit_config::DEFAULT_BOTTLENECK_THRESHOLD;
use rackfit_errors::ResourceError;
use rackfit_types::{AllocationId, AllocationRequest, ComponentId, Exemption, ResourceType};
use std::collections::BTreeMap;
use tracing::debug;

/// Owns every pool for a single validation pass
///
/// Pools are independent apart from the M.2 to lane coupling, which runs
/// one way through [`ResourceRegistry::forward_m2_lanes`].
#[derive(Debug, Clone)]
pub struct ResourceRegistry {
    lanes: PcieLanePool,
    pcie_slots: PcieSlotPool,
    ram_slots: RamSlotPool,
    m2_slots: M2SlotPool,
    u2_slots: U2SlotPool,
    sata_ports: SataPortPool,
    bottleneck_threshold: f64,
}

impl ResourceRegistry {
    #[must_use]
    pub fn new(
        lanes: PcieLanePool,
        pcie_slots: PcieSlotPool,
        ram_slots: RamSlotPool,
        m2_slots: M2SlotPool,
        u2_slots: U2SlotPool,
        sata_ports: SataPortPool,
    ) -> Self {
        Self {
            lanes,
            pcie_slots,
            ram_slots,
            m2_slots,
            u2_slots,
            sata_ports,
            bottleneck_threshold: DEFAULT_BOTTLENECK_THRESHOLD,
        }
    }

    /// Override the remaining-capacity ratio below which a pool is a bottleneck
    #[must_use]
    pub fn with_bottleneck_threshold(mut self, threshold: f64) -> Self {
        self.bottleneck_threshold = threshold;
        self
    }

    #[must_use]
    pub fn bottleneck_threshold(&self) -> f64 {
        self.bottleneck_threshold
    }

    #[must_use]
    pub fn lanes(&self) -> &PcieLanePool {
        &self.lanes
    }

    pub fn lanes_mut(&mut self) -> &mut PcieLanePool {
        &mut self.lanes
    }

    #[must_use]
    pub fn pcie_slots(&self) -> &PcieSlotPool {
        &self.pcie_slots
    }

    pub fn pcie_slots_mut(&mut self) -> &mut PcieSlotPool {
        &mut self.pcie_slots
    }

    #[must_use]
    pub fn ram_slots(&self) -> &RamSlotPool {
        &self.ram_slots
    }

    pub fn ram_slots_mut(&mut self) -> &mut RamSlotPool {
        &mut self.ram_slots
    }

    #[must_use]
    pub fn m2_slots(&self) -> &M2SlotPool {
        &self.m2_slots
    }

    pub fn m2_slots_mut(&mut self) -> &mut M2SlotPool {
        &mut self.m2_slots
    }

    #[must_use]
    pub fn u2_slots(&self) -> &U2SlotPool {
        &self.u2_slots
    }

    pub fn u2_slots_mut(&mut self) -> &mut U2SlotPool {
        &mut self.u2_slots
    }

    #[must_use]
    pub fn sata_ports(&self) -> &SataPortPool {
        &self.sata_ports
    }

    pub fn sata_ports_mut(&mut self) -> &mut SataPortPool {
        &mut self.sata_ports
    }

    /// Pool for a resource type
    #[must_use]
    pub fn pool(&self, resource: ResourceType) -> &dyn ResourcePool {
        match resource {
            ResourceType::PcieLanes => &self.lanes,
            ResourceType::PcieSlots => &self.pcie_slots,
            ResourceType::RamSlots => &self.ram_slots,
            ResourceType::M2Slots => &self.m2_slots,
            ResourceType::U2Slots => &self.u2_slots,
            ResourceType::SataPorts => &self.sata_ports,
        }
    }

    pub fn pool_mut(&mut self, resource: ResourceType) -> &mut dyn ResourcePool {
        match resource {
            ResourceType::PcieLanes => &mut self.lanes,
            ResourceType::PcieSlots => &mut self.pcie_slots,
            ResourceType::RamSlots => &mut self.ram_slots,
            ResourceType::M2Slots => &mut self.m2_slots,
            ResourceType::U2Slots => &mut self.u2_slots,
            ResourceType::SataPorts => &mut self.sata_ports,
        }
    }

    /// Allocate from the pool for `resource`
    ///
    /// # Errors
    ///
    /// Propagates `ResourceError::Exhausted` from the pool unchanged.
    pub fn allocate(
        &mut self,
        resource: ResourceType,
        quantity: u32,
        component: &ComponentId,
        request: AllocationRequest,
    ) -> Result<AllocationId, ResourceError> {
        self.pool_mut(resource).allocate(quantity, component, request)
    }

    /// Release an allocation in whichever pool issued it
    pub fn deallocate(&mut self, id: AllocationId) -> bool {
        self.pool_mut(id.resource()).deallocate(id)
    }

    /// Charge the lane pool for the drive seated by an M.2 allocation
    ///
    /// The lane allocation inherits the M.2 allocation's exemption, so a
    /// motherboard connector costs no lanes while an adapter connector does.
    /// An unknown M.2 allocation is charged in full.
    ///
    /// # Errors
    ///
    /// Returns `ResourceError::Exhausted` when a charged request exceeds the
    /// remaining lane budget.
    pub fn forward_m2_lanes(
        &mut self,
        m2_allocation: AllocationId,
        lanes: u32,
        component: &ComponentId,
    ) -> Result<AllocationId, ResourceError> {
        let exemption = self
            .m2_slots
            .exemption_of(m2_allocation)
            .unwrap_or(Exemption::None);
        debug!(
            component = %component,
            m2_allocation = %m2_allocation,
            lanes,
            exemption = exemption.as_str(),
            "forwarding M.2 placement to lane pool"
        );
        self.lanes.allocate(
            lanes,
            component,
            AllocationRequest::new()
                .with_exemption(exemption)
                .with_label("m2_allocation", m2_allocation.to_string()),
        )
    }

    /// Release everything a component holds across all pools
    pub fn deallocate_component(&mut self, component: &ComponentId) -> usize {
        let released: usize = ResourceType::ALL
            .into_iter()
            .map(|resource| self.pool_mut(resource).deallocate_by_component(component))
            .sum();
        debug!(component = %component, released, "released component");
        released
    }

    /// Statistics of every pool keyed by resource
    #[must_use]
    pub fn all_stats(&self) -> BTreeMap<ResourceType, PoolStats> {
        ResourceType::ALL
            .into_iter()
            .map(|resource| (resource, self.pool(resource).stats()))
            .collect()
    }

    /// Total, available and exhaustion per resource
    #[must_use]
    pub fn availability_summary(&self) -> BTreeMap<ResourceType, Availability> {
        ResourceType::ALL
            .into_iter()
            .map(|resource| {
                let pool = self.pool(resource);
                (
                    resource,
                    Availability::new(pool.total_capacity(), pool.available_capacity()),
                )
            })
            .collect()
    }

    /// Clear every pool
    pub fn reset_all(&mut self) {
        for resource in ResourceType::ALL {
            self.pool_mut(resource).reset();
        }
        debug!("reset all pools");
    }

    /// Whether any pool still has headroom
    #[must_use]
    pub fn has_available_resources(&self) -> bool {
        ResourceType::ALL
            .into_iter()
            .any(|resource| self.pool(resource).available_capacity() > 0)
    }

    /// Pools whose remaining ratio is below the bottleneck threshold
    ///
    /// A pool with no capacity at all is absent rather than a bottleneck.
    #[must_use]
    pub fn bottleneck_resources(&self) -> Vec<ResourceType> {
        ResourceType::ALL
            .into_iter()
            .filter(|&resource| {
                let pool = self.pool(resource);
                let total = pool.total_capacity();
                total > 0
                    && f64::from(pool.available_capacity()) / f64::from(total)
                        < self.bottleneck_threshold
            })
            .collect()
    }
}
