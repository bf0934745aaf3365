//! DIMM slots partitioned across memory channels

use crate::book::Allocation;
use crate::pool::ResourcePool;
use crate::slots::{saturating_u32, slot_quantity, SlotRecord, SlotTable};
use crate::stats::{PoolDetails, PoolStats, SlotCounts};
use rackfit_errors::ResourceError;
use rackfit_types::{AllocationId, AllocationRequest, ComponentId, ResourceType};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RamSlot {
    pub id: String,
    pub channel: u32,
    open: bool,
}

impl RamSlot {
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.open
    }
}

impl SlotRecord for RamSlot {
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

/// DIMM slots, filled channel by channel
///
/// All slots are interchangeable here; allocation takes the first free slot
/// in channel-major order.
#[derive(Debug, Clone)]
pub struct RamSlotPool {
    table: SlotTable<RamSlot>,
    slot_type: String,
    channels: u32,
    slots_per_channel: u32,
}

impl RamSlotPool {
    /// Lay out `slot_count` slots over `channels` channels
    ///
    /// Each channel holds `ceil(slot_count / channels)` slots; the last ones
    /// may hold fewer. A channel count of zero is treated as one.
    #[must_use]
    pub fn new(slot_count: u32, channels: u32, slot_type: impl Into<String>) -> Self {
        let channels = channels.max(1);
        let slots_per_channel = slot_count.div_ceil(channels);

        let mut slots = Vec::with_capacity(slot_count as usize);
        'channels: for channel in 0..channels {
            for slot in 0..slots_per_channel {
                if saturating_u32(slots.len()) == slot_count {
                    break 'channels;
                }
                slots.push(RamSlot {
                    id: format!("ram_ch{channel}_slot{slot}"),
                    channel,
                    open: true,
                });
            }
        }

        Self {
            table: SlotTable::new(ResourceType::RamSlots, slots),
            slot_type: slot_type.into(),
            channels,
            slots_per_channel,
        }
    }

    #[must_use]
    pub fn slots(&self) -> &[RamSlot] {
        self.table.records()
    }

    #[must_use]
    pub fn channels(&self) -> u32 {
        self.channels
    }

    #[must_use]
    pub fn slot_type(&self) -> &str {
        &self.slot_type
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

impl ResourcePool for RamSlotPool {
    fn resource_type(&self) -> ResourceType {
        ResourceType::RamSlots
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
        let free = self.table.ranked(|_| ());
        if free.len() < quantity as usize {
            return Err(ResourceError::exhausted(
                ResourceType::RamSlots.label(),
                quantity,
                saturating_u32(free.len()),
            ));
        }

        let id = self.table.commit(&free[..quantity as usize], component, request);
        debug!(
            resource = %ResourceType::RamSlots,
            component = %component,
            allocation = %id,
            slots = ?self.table.book().get(id).map(|a| &a.binding),
            "allocated RAM slot"
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
        let mut by_channel: BTreeMap<u32, SlotCounts> = BTreeMap::new();
        for slot in self.table.records() {
            by_channel.entry(slot.channel).or_default().record(slot.open);
        }
        PoolStats::new(
            ResourceType::RamSlots,
            self.total_capacity(),
            self.available_capacity(),
            self.allocation_count(),
            PoolDetails::RamSlots {
                slot_type: self.slot_type.clone(),
                channels: self.channels,
                slots_per_channel: self.slots_per_channel,
                by_channel,
            },
        )
    }
}
