//! The contract every resource pool implements

use crate::stats::PoolStats;
use rackfit_errors::ResourceError;
use rackfit_types::{AllocationId, AllocationRequest, ComponentId, ResourceType};

/// A finite-capacity pool of one resource type
///
/// Capacity is fixed at construction; only allocations change afterwards.
/// `used_capacity() + available_capacity() == total_capacity()` holds at
/// every point.
pub trait ResourcePool {
    /// Which resource this pool tracks
    fn resource_type(&self) -> ResourceType;

    /// Capacity fixed at construction
    fn total_capacity(&self) -> u32;

    /// Capacity consumed by allocations and reservations
    fn used_capacity(&self) -> u32;

    /// Capacity still open to `allocate`
    fn available_capacity(&self) -> u32 {
        self.total_capacity().saturating_sub(self.used_capacity())
    }

    /// Whether `quantity` units could be allocated right now
    fn is_available(&self, quantity: u32) -> bool {
        self.available_capacity() >= quantity
    }

    /// Bind `quantity` units to `component`
    ///
    /// # Errors
    ///
    /// Returns `ResourceError::Exhausted` when the pool cannot satisfy the
    /// request. Nothing is mutated on failure.
    fn allocate(
        &mut self,
        quantity: u32,
        component: &ComponentId,
        request: AllocationRequest,
    ) -> Result<AllocationId, ResourceError>;

    /// Release an allocation; `false` when the id is unknown
    fn deallocate(&mut self, id: AllocationId) -> bool;

    /// Release every allocation owned by `component`, returning how many
    fn deallocate_by_component(&mut self, component: &ComponentId) -> usize;

    /// Ids of the live allocations owned by `component`, oldest first
    fn allocations_of(&self, component: &ComponentId) -> Vec<AllocationId>;

    /// Number of live allocations
    fn allocation_count(&self) -> usize;

    /// Drop all allocations and restart id numbering
    fn reset(&mut self);

    /// Capacity snapshot with pool-specific breakdown
    fn stats(&self) -> PoolStats;
}
