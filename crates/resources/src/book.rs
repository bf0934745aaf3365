//! Allocation bookkeeping shared by every pool

use chrono::{DateTime, Utc};
use rackfit_types::{AllocationId, AllocationRequest, ComponentId, ResourceType};
use serde::Serialize;
use std::collections::BTreeMap;

/// A live binding between pool capacity and the component consuming it
///
/// `B` is the pool-specific binding: the record ids for slot and port
/// pools, the lane accounting rule for the lane pool.
#[derive(Debug, Clone, Serialize)]
pub struct Allocation<B> {
    pub id: AllocationId,
    pub component: ComponentId,
    pub quantity: u32,
    pub binding: B,
    pub request: AllocationRequest,
    pub created_at: DateTime<Utc>,
}

/// Ordered map of live allocations plus the per-pool id sequence
#[derive(Debug, Clone)]
pub(crate) struct AllocationBook<B> {
    resource: ResourceType,
    next_sequence: u64,
    entries: BTreeMap<AllocationId, Allocation<B>>,
}

impl<B> AllocationBook<B> {
    pub(crate) fn new(resource: ResourceType) -> Self {
        Self {
            resource,
            next_sequence: 1,
            entries: BTreeMap::new(),
        }
    }

    pub(crate) fn insert(
        &mut self,
        component: &ComponentId,
        quantity: u32,
        binding: B,
        request: AllocationRequest,
    ) -> AllocationId {
        let id = AllocationId::new(self.resource, self.next_sequence);
        self.next_sequence += 1;
        self.entries.insert(
            id,
            Allocation {
                id,
                component: component.clone(),
                quantity,
                binding,
                request,
                created_at: Utc::now(),
            },
        );
        id
    }

    pub(crate) fn resource(&self) -> ResourceType {
        self.resource
    }

    pub(crate) fn remove(&mut self, id: AllocationId) -> Option<Allocation<B>> {
        self.entries.remove(&id)
    }

    pub(crate) fn remove_component(&mut self, component: &ComponentId) -> Vec<Allocation<B>> {
        let ids: Vec<AllocationId> = self
            .entries
            .values()
            .filter(|allocation| &allocation.component == component)
            .map(|allocation| allocation.id)
            .collect();
        ids.into_iter()
            .filter_map(|id| self.entries.remove(&id))
            .collect()
    }

    pub(crate) fn get(&self, id: AllocationId) -> Option<&Allocation<B>> {
        self.entries.get(&id)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Allocation<B>> {
        self.entries.values()
    }

    pub(crate) fn for_component<'a>(
        &'a self,
        component: &'a ComponentId,
    ) -> impl Iterator<Item = &'a Allocation<B>> + 'a {
        self.entries
            .values()
            .filter(move |allocation| &allocation.component == component)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Drop every allocation and restart numbering
    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.next_sequence = 1;
    }
}
