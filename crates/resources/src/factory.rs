//! Guarded construction of pools from a server configuration
//!
//! The configuration shape is checked once here so pool code never has to
//! re-check it. Shape problems surface as `ValidationError`, never as
//! resource exhaustion.

use crate::lanes::PcieLanePool;
use crate::m2::{M2Slot, M2SlotPool};
use crate::pcie::PcieSlotPool;
use crate::pool::ResourcePool;
use crate::ram::RamSlotPool;
use crate::registry::ResourceRegistry;
use crate::sata::SataPortPool;
use crate::u2::{U2Slot, U2SlotPool};
use rackfit_config::AllocationConfig;
use rackfit_errors::{Error, ValidationError};
use rackfit_types::{
    ComponentKind, PcieSlotEntry, PcieSlotSize, ResourceType, ServerConfiguration, SlotSource,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

/// Largest number of physical slots or ports a single entry may describe
pub const MAX_SLOTS_PER_ENTRY: u32 = 256;

/// Outcome of a pre-flight structural check
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }

    /// Convert a failed report into a structural error
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::Structural` carrying every collected problem.
    pub fn into_result(self) -> Result<(), ValidationError> {
        if self.valid {
            Ok(())
        } else {
            Err(ValidationError::Structural {
                errors: self.errors,
            })
        }
    }
}

/// Builds registries and individual pools
pub struct PoolFactory;

impl PoolFactory {
    /// Check the shape of an untyped configuration document
    ///
    /// The document must be an object, every known component section must be
    /// a list of objects, and `motherboard` and `cpu` must each hold at least
    /// one record.
    #[must_use]
    pub fn validate_configuration(raw: &Value) -> ValidationReport {
        let Some(sections) = raw.as_object() else {
            return ValidationReport::from_errors(vec![
                "configuration must be an object keyed by component type".to_string(),
            ]);
        };

        let mut errors = Vec::new();
        for kind in ComponentKind::ALL {
            match sections.get(kind.key()) {
                None => {
                    if kind.is_required() {
                        errors.push(format!("configuration must contain at least one {kind}"));
                    }
                }
                Some(Value::Array(records)) => {
                    if kind.is_required() && records.is_empty() {
                        errors.push(format!("configuration must contain at least one {kind}"));
                    }
                    for (index, record) in records.iter().enumerate() {
                        if !record.is_object() {
                            errors.push(format!("{kind}[{index}] must be an object"));
                        }
                    }
                }
                Some(_) => errors.push(format!("{kind} must be a list of component records")),
            }
        }

        for key in sections.keys() {
            if ComponentKind::from_key(key).is_none() {
                debug!(section = %key, "ignoring unknown component section");
            }
        }

        // Field decoding problems are reported by `parse_configuration`
        if errors.is_empty() {
            if let Ok(config) = ServerConfiguration::deserialize(raw) {
                errors.extend(oversized_entries(&config));
            }
        }

        ValidationReport::from_errors(errors)
    }

    /// Check a typed configuration for the required platform records
    ///
    /// Also rejects any entry describing more than [`MAX_SLOTS_PER_ENTRY`]
    /// slots or ports, so pool construction stays bounded.
    #[must_use]
    pub fn validate(config: &ServerConfiguration) -> ValidationReport {
        let mut errors: Vec<String> = ComponentKind::ALL
            .into_iter()
            .filter(|&kind| kind.is_required() && config.count(kind) == 0)
            .map(|kind| format!("configuration must contain at least one {kind}"))
            .collect();
        errors.extend(oversized_entries(config));
        ValidationReport::from_errors(errors)
    }

    /// Validate and decode an untyped configuration document
    ///
    /// # Errors
    ///
    /// Returns a structural error for a malformed shape and a parse error when
    /// a record's fields cannot be decoded.
    pub fn parse_configuration(raw: &Value) -> Result<ServerConfiguration, Error> {
        Self::validate_configuration(raw).into_result()?;
        Ok(ServerConfiguration::deserialize(raw)?)
    }

    /// Build a registry from an untyped configuration document
    ///
    /// # Errors
    ///
    /// Returns a validation error if the document is malformed.
    pub fn registry_from_value(
        raw: &Value,
        settings: &AllocationConfig,
    ) -> Result<ResourceRegistry, Error> {
        let config = Self::parse_configuration(raw)?;
        Self::create_registry(&config, settings)
    }

    /// Build all six pools for a configuration
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::Structural` when the configuration lacks a
    /// motherboard or CPU; no pool is built in that case.
    pub fn create_registry(
        config: &ServerConfiguration,
        settings: &AllocationConfig,
    ) -> Result<ResourceRegistry, Error> {
        Self::validate(config).into_result()?;

        let registry = ResourceRegistry::new(
            Self::build_lane_pool(config),
            Self::build_pcie_slot_pool(config),
            Self::build_ram_slot_pool(config),
            Self::build_m2_slot_pool(config),
            Self::build_u2_slot_pool(config),
            Self::build_sata_port_pool(config),
        )
        .with_bottleneck_threshold(settings.bottleneck_threshold);

        info!(
            lanes = registry.lanes().total_capacity(),
            pcie_slots = registry.pcie_slots().total_capacity(),
            ram_slots = registry.ram_slots().total_capacity(),
            m2_slots = registry.m2_slots().total_capacity(),
            u2_slots = registry.u2_slots().total_capacity(),
            sata_ports = registry.sata_ports().total_capacity(),
            "built resource registry"
        );
        Ok(registry)
    }

    /// Build the registry and log any pool that is already tight
    ///
    /// Bottlenecks are reported, not treated as failures.
    ///
    /// # Errors
    ///
    /// Returns the same validation errors as [`PoolFactory::create_registry`].
    pub fn create_registry_with_validation(
        config: &ServerConfiguration,
        settings: &AllocationConfig,
    ) -> Result<ResourceRegistry, Error> {
        let registry = Self::create_registry(config, settings)?;

        if settings.warn_on_bottleneck {
            for resource in registry.bottleneck_resources() {
                let pool = registry.pool(resource);
                warn!(
                    resource = %resource,
                    available = pool.available_capacity(),
                    total = pool.total_capacity(),
                    threshold = settings.bottleneck_threshold,
                    "resource is a bottleneck before any allocation"
                );
            }
        }
        Ok(registry)
    }

    /// # Errors
    ///
    /// Returns a structural error for an invalid configuration.
    pub fn create_lane_pool(config: &ServerConfiguration) -> Result<PcieLanePool, Error> {
        Self::validate(config).into_result()?;
        Ok(Self::build_lane_pool(config))
    }

    /// # Errors
    ///
    /// Returns a structural error for an invalid configuration.
    pub fn create_pcie_slot_pool(config: &ServerConfiguration) -> Result<PcieSlotPool, Error> {
        Self::validate(config).into_result()?;
        Ok(Self::build_pcie_slot_pool(config))
    }

    /// # Errors
    ///
    /// Returns a structural error for an invalid configuration.
    pub fn create_ram_slot_pool(config: &ServerConfiguration) -> Result<RamSlotPool, Error> {
        Self::validate(config).into_result()?;
        Ok(Self::build_ram_slot_pool(config))
    }

    /// # Errors
    ///
    /// Returns a structural error for an invalid configuration.
    pub fn create_m2_slot_pool(config: &ServerConfiguration) -> Result<M2SlotPool, Error> {
        Self::validate(config).into_result()?;
        Ok(Self::build_m2_slot_pool(config))
    }

    /// # Errors
    ///
    /// Returns a structural error for an invalid configuration.
    pub fn create_u2_slot_pool(config: &ServerConfiguration) -> Result<U2SlotPool, Error> {
        Self::validate(config).into_result()?;
        Ok(Self::build_u2_slot_pool(config))
    }

    /// # Errors
    ///
    /// Returns a structural error for an invalid configuration.
    pub fn create_sata_port_pool(config: &ServerConfiguration) -> Result<SataPortPool, Error> {
        Self::validate(config).into_result()?;
        Ok(Self::build_sata_port_pool(config))
    }

    fn build_lane_pool(config: &ServerConfiguration) -> PcieLanePool {
        let cpu_lanes = config.primary_cpu().map_or(0, |cpu| cpu.pcie_lanes);
        let (chipset, sata, nics) = config.primary_motherboard().map_or((0, 0, 0), |mb| {
            (mb.chipset_pcie_lanes, mb.sata_ports, mb.onboard_nics)
        });
        PcieLanePool::for_platform(cpu_lanes, chipset, sata, nics)
    }

    fn build_pcie_slot_pool(config: &ServerConfiguration) -> PcieSlotPool {
        let motherboard: Vec<PcieSlotSize> = config
            .primary_motherboard()
            .map(|mb| expand_sizes(&mb.expansion_slots.pcie_slots))
            .unwrap_or_default();
        let risers: Vec<Vec<PcieSlotSize>> = config
            .primary_chassis()
            .map(|chassis| chassis.riser_slots.iter().map(|r| expand_sizes(r)).collect())
            .unwrap_or_default();
        PcieSlotPool::from_layout(&motherboard, &risers)
    }

    fn build_ram_slot_pool(config: &ServerConfiguration) -> RamSlotPool {
        config
            .primary_motherboard()
            .map_or_else(
                || RamSlotPool::new(0, 1, ""),
                |mb| {
                    RamSlotPool::new(
                        mb.memory.slot_count,
                        mb.memory.channels,
                        mb.memory.slot_type.clone(),
                    )
                },
            )
    }

    fn build_m2_slot_pool(config: &ServerConfiguration) -> M2SlotPool {
        let mut slots = Vec::new();
        if let Some(mb) = config.primary_motherboard() {
            for spec in &mb.m2_slots {
                for _ in 0..spec.count {
                    slots.push(M2Slot::new(
                        format!("mb_m2_{}", slots.len()),
                        SlotSource::Motherboard,
                        spec.form_factor.clone(),
                        spec.storage_interface(),
                    ));
                }
            }
        }
        for (card_index, card) in config.pciecard.iter().enumerate() {
            let mut index = 0;
            for spec in &card.m2_slots {
                for _ in 0..spec.count {
                    slots.push(M2Slot::new(
                        format!("adapter_{card_index}_m2_{index}"),
                        SlotSource::Adapter,
                        spec.form_factor.clone(),
                        spec.storage_interface(),
                    ));
                    index += 1;
                }
            }
        }
        M2SlotPool::new(slots)
    }

    fn build_u2_slot_pool(config: &ServerConfiguration) -> U2SlotPool {
        let mut slots = Vec::new();
        if let Some(mb) = config.primary_motherboard() {
            for spec in &mb.u2_slots {
                for _ in 0..spec.count {
                    slots.push(U2Slot::new(
                        format!("mb_u2_{}", slots.len()),
                        SlotSource::Motherboard,
                        spec.storage_interface(),
                    ));
                }
            }
        }
        if let Some(chassis) = config.primary_chassis() {
            for (backplane_index, backplane) in chassis.u2_backplane.iter().enumerate() {
                let mut index = 0;
                for spec in &backplane.u2_slots {
                    for _ in 0..spec.count {
                        slots.push(U2Slot::new(
                            format!("backplane_{backplane_index}_u2_{index}"),
                            SlotSource::Backplane,
                            spec.storage_interface(),
                        ));
                        index += 1;
                    }
                }
            }
        }
        for (card_index, card) in config.pciecard.iter().enumerate() {
            let mut index = 0;
            for spec in &card.u2_slots {
                for _ in 0..spec.count {
                    slots.push(U2Slot::new(
                        format!("adapter_{card_index}_u2_{index}"),
                        SlotSource::Adapter,
                        spec.storage_interface(),
                    ));
                    index += 1;
                }
            }
        }
        U2SlotPool::new(slots)
    }

    fn build_sata_port_pool(config: &ServerConfiguration) -> SataPortPool {
        let motherboard = config.primary_motherboard().map_or(0, |mb| mb.sata_ports);
        let hba: Vec<u32> = config.hbacard.iter().map(|card| card.sata_ports).collect();
        let backplane = config
            .primary_chassis()
            .map_or(0, |chassis| chassis.sata_backplane_ports);
        SataPortPool::from_counts(motherboard, &hba, backplane)
    }
}

/// Entries whose slot or port count exceeds [`MAX_SLOTS_PER_ENTRY`]
fn oversized_entries(config: &ServerConfiguration) -> Vec<String> {
    let mut counts: Vec<(String, u32)> = Vec::new();

    for (m, mb) in config.motherboard.iter().enumerate() {
        for (i, entry) in mb.expansion_slots.pcie_slots.iter().enumerate() {
            counts.push((format!("motherboard[{m}].pcie_slots[{i}]"), entry.count()));
        }
        counts.push((format!("motherboard[{m}].memory.slot_count"), mb.memory.slot_count));
        counts.push((format!("motherboard[{m}].sata_ports"), mb.sata_ports));
        for (i, spec) in mb.m2_slots.iter().enumerate() {
            counts.push((format!("motherboard[{m}].m2_slots[{i}]"), spec.count));
        }
        for (i, spec) in mb.u2_slots.iter().enumerate() {
            counts.push((format!("motherboard[{m}].u2_slots[{i}]"), spec.count));
        }
    }

    for (c, chassis) in config.chassis.iter().enumerate() {
        for (r, riser) in chassis.riser_slots.iter().enumerate() {
            for (i, entry) in riser.iter().enumerate() {
                counts.push((format!("chassis[{c}].riser_slots[{r}][{i}]"), entry.count()));
            }
        }
        for (b, backplane) in chassis.u2_backplane.iter().enumerate() {
            for (i, spec) in backplane.u2_slots.iter().enumerate() {
                counts.push((format!("chassis[{c}].u2_backplane[{b}][{i}]"), spec.count));
            }
        }
        counts.push((format!("chassis[{c}].sata_backplane_ports"), chassis.sata_backplane_ports));
    }

    for (p, card) in config.pciecard.iter().enumerate() {
        for (i, spec) in card.m2_slots.iter().enumerate() {
            counts.push((format!("pciecard[{p}].m2_slots[{i}]"), spec.count));
        }
        for (i, spec) in card.u2_slots.iter().enumerate() {
            counts.push((format!("pciecard[{p}].u2_slots[{i}]"), spec.count));
        }
    }

    for (h, card) in config.hbacard.iter().enumerate() {
        counts.push((format!("hbacard[{h}].sata_ports"), card.sata_ports));
    }

    counts
        .into_iter()
        .filter(|&(_, count)| count > MAX_SLOTS_PER_ENTRY)
        .map(|(path, count)| {
            format!("{path} describes {count} slots, more than the limit of {MAX_SLOTS_PER_ENTRY}")
        })
        .collect()
}

fn expand_sizes(entries: &[PcieSlotEntry]) -> Vec<PcieSlotSize> {
    entries.iter().flat_map(|entry| entry.expand()).collect()
}

/// Resource types a configuration provides no capacity for
#[must_use]
pub fn absent_resources(registry: &ResourceRegistry) -> Vec<ResourceType> {
    ResourceType::ALL
        .into_iter()
        .filter(|&resource| registry.pool(resource).total_capacity() == 0)
        .collect()
}
