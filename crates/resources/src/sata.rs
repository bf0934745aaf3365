//! SATA ports on the motherboard, HBA cards and backplane controllers
//!
//! Backplane controller ports are wired to the backplane at construction:
//! they count toward total capacity but are never available.

use crate::book::Allocation;
use crate::pool::ResourcePool;
use crate::slots::{saturating_u32, slot_quantity, SlotRecord, SlotTable};
use crate::stats::{PoolDetails, PoolStats, SlotCounts};
use rackfit_errors::ResourceError;
use rackfit_types::{AllocationId, AllocationRequest, ComponentId, ResourceType, SlotSource};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SataPort {
    pub id: String,
    pub source: SlotSource,
    pub reserved: bool,
    open: bool,
}

impl SataPort {
    pub fn new(id: impl Into<String>, source: SlotSource) -> Self {
        Self {
            id: id.into(),
            source,
            reserved: false,
            open: true,
        }
    }

    /// A port permanently held by a backplane controller
    pub fn reserved(id: impl Into<String>, source: SlotSource) -> Self {
        Self {
            id: id.into(),
            source,
            reserved: true,
            open: false,
        }
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        self.open && !self.reserved
    }

    fn tier(&self) -> u8 {
        match self.source {
            SlotSource::Motherboard => 0,
            SlotSource::Hba => 1,
            _ => 2,
        }
    }
}

impl SlotRecord for SataPort {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn set_open(&mut self, open: bool) {
        self.open = open;
    }

    fn is_reserved(&self) -> bool {
        self.reserved
    }
}

#[derive(Debug, Clone)]
pub struct SataPortPool {
    table: SlotTable<SataPort>,
}

impl SataPortPool {
    #[must_use]
    pub fn new(ports: Vec<SataPort>) -> Self {
        Self {
            table: SlotTable::new(ResourceType::SataPorts, ports),
        }
    }

    /// Build the pool from port counts
    ///
    /// Ports are named `mb_sata_<n>`, `hba_<card>_sata_<n>` and
    /// `backplane_sata_<n>` (reserved).
    #[must_use]
    pub fn from_counts(motherboard: u32, hba_cards: &[u32], backplane_reserved: u32) -> Self {
        let mut ports: Vec<SataPort> = (0..motherboard)
            .map(|i| SataPort::new(format!("mb_sata_{i}"), SlotSource::Motherboard))
            .collect();
        for (card, &count) in hba_cards.iter().enumerate() {
            ports.extend(
                (0..count).map(|i| SataPort::new(format!("hba_{card}_sata_{i}"), SlotSource::Hba)),
            );
        }
        ports.extend(
            (0..backplane_reserved)
                .map(|i| SataPort::reserved(format!("backplane_sata_{i}"), SlotSource::Backplane)),
        );
        Self::new(ports)
    }

    #[must_use]
    pub fn ports(&self) -> &[SataPort] {
        self.table.records()
    }

    /// Number of ports permanently held by backplane controllers
    #[must_use]
    pub fn reserved_ports(&self) -> u32 {
        saturating_u32(self.table.records().iter().filter(|p| p.reserved).count())
    }

    /// The port the next allocation with this request would take
    #[must_use]
    pub fn find_next_available_port(&self, request: &AllocationRequest) -> Option<&SataPort> {
        self.candidates(request)
            .first()
            .map(|&i| &self.table.records()[i])
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

    fn candidates(&self, request: &AllocationRequest) -> Vec<usize> {
        self.table
            .ranked(|port| (!request.prefers(&port.id, port.source), port.tier()))
    }
}

impl ResourcePool for SataPortPool {
    fn resource_type(&self) -> ResourceType {
        ResourceType::SataPorts
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
        let candidates = self.candidates(&request);
        if candidates.len() < quantity as usize {
            return Err(ResourceError::exhausted(
                ResourceType::SataPorts.label(),
                quantity,
                saturating_u32(candidates.len()),
            ));
        }

        let id = self
            .table
            .commit(&candidates[..quantity as usize], component, request);
        debug!(
            resource = %ResourceType::SataPorts,
            component = %component,
            allocation = %id,
            ports = ?self.table.book().get(id).map(|a| &a.binding),
            "allocated SATA port"
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
        for port in self.table.records() {
            by_source
                .entry(port.source)
                .or_default()
                .record(port.is_available());
        }
        PoolStats::new(
            ResourceType::SataPorts,
            self.total_capacity(),
            self.available_capacity(),
            self.allocation_count(),
            PoolDetails::SataPorts {
                by_source,
                reserved: self.reserved_ports(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_ports_excluded() {
        let mut pool = SataPortPool::from_counts(1, &[], 4);
        assert_eq!(pool.total_capacity(), 5);
        assert_eq!(pool.available_capacity(), 1);
        assert_eq!(pool.reserved_ports(), 4);

        let owner = ComponentId::new("hdd");
        pool.allocate(1, &owner, AllocationRequest::new()).unwrap();
        assert!(pool.find_next_available_port(&AllocationRequest::new()).is_none());
        assert!(pool.allocate(1, &owner, AllocationRequest::new()).is_err());

        pool.reset();
        assert_eq!(pool.available_capacity(), 1);
        assert_eq!(pool.used_capacity(), 4);
    }

    #[test]
    fn test_reserved_port_cannot_be_preferred() {
        let pool = SataPortPool::from_counts(0, &[1], 2);
        let request = AllocationRequest::new().prefer_slot("backplane_sata_0");
        let port = pool.find_next_available_port(&request).unwrap();
        assert_eq!(port.id, "hba_0_sata_0");
    }

    #[test]
    fn test_motherboard_then_hba() {
        let mut pool = SataPortPool::new(vec![
            SataPort::new("hba_0_sata_0", SlotSource::Hba),
            SataPort::new("mb_sata_0", SlotSource::Motherboard),
        ]);
        let owner = ComponentId::new("hdd");
        let first = pool.allocate(1, &owner, AllocationRequest::new()).unwrap();
        assert_eq!(pool.allocation(first).unwrap().binding, vec!["mb_sata_0"]);
        let next = pool
            .find_next_available_port(&AllocationRequest::new())
            .unwrap();
        assert_eq!(next.id, "hba_0_sata_0");
    }
}
