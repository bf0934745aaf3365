//! Binary slot bookkeeping shared by the slot and port pools

use crate::book::{Allocation, AllocationBook};
use rackfit_types::{AllocationId, AllocationRequest, ComponentId, ResourceType};
use tracing::debug;

/// A physical connection point that is either free or bound
pub(crate) trait SlotRecord {
    fn id(&self) -> &str;
    fn is_open(&self) -> bool;
    fn set_open(&mut self, open: bool);

    /// Reserved records are never handed out and never reopened
    fn is_reserved(&self) -> bool {
        false
    }

    fn is_free(&self) -> bool {
        self.is_open() && !self.is_reserved()
    }
}

/// Records in insertion order plus the allocations bound to them
///
/// Every bound record is referenced by exactly one live allocation.
#[derive(Debug, Clone)]
pub(crate) struct SlotTable<R> {
    records: Vec<R>,
    book: AllocationBook<Vec<String>>,
}

impl<R: SlotRecord> SlotTable<R> {
    pub(crate) fn new(resource: ResourceType, mut records: Vec<R>) -> Self {
        for record in &mut records {
            let open = !record.is_reserved();
            record.set_open(open);
        }
        Self {
            records,
            book: AllocationBook::new(resource),
        }
    }

    pub(crate) fn records(&self) -> &[R] {
        &self.records
    }

    pub(crate) fn total(&self) -> u32 {
        saturating_u32(self.records.len())
    }

    pub(crate) fn available(&self) -> u32 {
        saturating_u32(self.records.iter().filter(|r| r.is_free()).count())
    }

    /// Indices of free records ordered by `rank`, record order breaking ties
    pub(crate) fn ranked<K, F>(&self, rank: F) -> Vec<usize>
    where
        K: Ord,
        F: Fn(&R) -> K,
    {
        let mut free: Vec<usize> = (0..self.records.len())
            .filter(|&i| self.records[i].is_free())
            .collect();
        free.sort_by_key(|&i| rank(&self.records[i]));
        free
    }

    /// Bind the picked records to a new allocation
    pub(crate) fn commit(
        &mut self,
        picks: &[usize],
        component: &ComponentId,
        request: AllocationRequest,
    ) -> AllocationId {
        let mut bound = Vec::with_capacity(picks.len());
        for &index in picks {
            let record = &mut self.records[index];
            record.set_open(false);
            bound.push(record.id().to_string());
        }
        self.book
            .insert(component, saturating_u32(picks.len()), bound, request)
    }

    pub(crate) fn release(&mut self, id: AllocationId) -> Option<Allocation<Vec<String>>> {
        let allocation = self.book.remove(id)?;
        self.reopen(&allocation.binding);
        debug!(
            resource = %self.book.resource(),
            component = %allocation.component,
            allocation = %id,
            slots = ?allocation.binding,
            "released allocation"
        );
        Some(allocation)
    }

    pub(crate) fn release_component(&mut self, component: &ComponentId) -> usize {
        let released = self.book.remove_component(component);
        for allocation in &released {
            self.reopen(&allocation.binding);
        }
        if !released.is_empty() {
            debug!(
                resource = %self.book.resource(),
                component = %component,
                released = released.len(),
                "released component allocations"
            );
        }
        released.len()
    }

    pub(crate) fn reset(&mut self) {
        self.book.clear();
        for record in &mut self.records {
            let open = !record.is_reserved();
            record.set_open(open);
        }
        debug!(resource = %self.book.resource(), "reset pool");
    }

    pub(crate) fn book(&self) -> &AllocationBook<Vec<String>> {
        &self.book
    }

    fn reopen(&mut self, ids: &[String]) {
        for record in &mut self.records {
            if ids.iter().any(|id| id == record.id()) {
                record.set_open(true);
            }
        }
    }
}

/// Slot pools treat a zero-unit request as a single slot
pub(crate) fn slot_quantity(quantity: u32) -> u32 {
    quantity.max(1)
}

pub(crate) fn saturating_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}
