#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Hardware resource allocation for rackfit
//!
//! This crate tracks the finite physical resources of a server build (PCIe
//! lanes, PCIe slots, DIMM slots, M.2 and U.2 connectors, SATA ports) and
//! hands out deterministic, explainable allocations against them. A
//! [`ResourceRegistry`] holds one pool per resource and is built fresh for
//! each configuration by [`PoolFactory`].

mod book;
pub mod factory;
pub mod lanes;
pub mod m2;
pub mod pcie;
pub mod pool;
pub mod ram;
pub mod registry;
pub mod sata;
mod slots;
pub mod stats;
pub mod u2;

pub use book::Allocation;
pub use factory::{absent_resources, PoolFactory, ValidationReport, MAX_SLOTS_PER_ENTRY};
pub use lanes::{onboard_reservation, PcieLanePool};
pub use m2::{M2Slot, M2SlotPool};
pub use pcie::{PcieSlot, PcieSlotPool};
pub use pool::ResourcePool;
pub use ram::{RamSlot, RamSlotPool};
pub use registry::ResourceRegistry;
pub use sata::{SataPort, SataPortPool};
pub use stats::{utilization_percent, Availability, PoolDetails, PoolStats, SlotCounts};
pub use u2::{U2Slot, U2SlotPool};
