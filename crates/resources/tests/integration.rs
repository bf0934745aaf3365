//! Integration tests for resource pools, the registry and the factory

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rackfit_config::AllocationConfig;
    use rackfit_errors::{Error, ResourceError, ValidationError};
    use rackfit_resources::*;
    use rackfit_types::*;
    use serde::Deserialize;
    use serde_json::json;

    fn build() -> serde_json::Value {
        json!({
            "motherboard": [{
                "uuid": "mb-1",
                "chipset_pcie_lanes": 24,
                "sata_ports": 4,
                "onboard_nics": 1,
                "expansion_slots": {"pcie_slots": ["x16", "x16", "x8", "x4"]},
                "memory": {"slot_count": 8, "slot_type": "DDR5 RDIMM", "channels": 4},
                "m2_slots": [{"type": "2280", "interface": "PCIe 4.0 x4", "count": 2}],
                "u2_slots": [{"interface": "NVMe"}]
            }],
            "cpu": [{"uuid": "cpu-1", "pcie_lanes": 64}],
            "chassis": [{
                "uuid": "ch-1",
                "riser_slots": [["x16"], ["x8", "x8"]],
                "u2_backplane": [{"u2_slots": [{"interface": "NVMe", "count": 4}]}],
                "sata_backplane_ports": 2
            }],
            "pciecard": [{
                "uuid": "adapter-1",
                "slot_size": "x8",
                "m2_slots": [{"type": "2280", "interface": "PCIe", "count": 2}]
            }],
            "hbacard": [{"uuid": "hba-1", "sata_ports": 8}]
        })
    }

    fn registry() -> ResourceRegistry {
        PoolFactory::registry_from_value(&build(), &AllocationConfig::default()).unwrap()
    }

    fn owner(id: &str) -> ComponentId {
        ComponentId::new(id)
    }

    fn assert_capacity_invariant(registry: &ResourceRegistry) {
        for resource in ResourceType::ALL {
            let pool = registry.pool(resource);
            assert_eq!(
                pool.used_capacity() + pool.available_capacity(),
                pool.total_capacity(),
                "{resource}"
            );
        }
    }

    #[test]
    fn test_factory_builds_all_pools() {
        let registry = registry();
        assert_eq!(registry.lanes().total_capacity(), 88);
        assert_eq!(registry.lanes().reserved_lanes(), 3);
        assert_eq!(registry.pcie_slots().total_capacity(), 7);
        assert_eq!(registry.ram_slots().total_capacity(), 8);
        assert_eq!(registry.ram_slots().channels(), 4);
        assert_eq!(registry.m2_slots().total_capacity(), 4);
        assert_eq!(registry.u2_slots().total_capacity(), 5);
        assert_eq!(registry.sata_ports().total_capacity(), 14);
        assert_eq!(registry.sata_ports().available_capacity(), 12);
        assert_capacity_invariant(&registry);
    }

    #[test]
    fn test_lane_scenario_without_cpu_lanes() {
        let raw = json!({
            "motherboard": [{"chipset_pcie_lanes": 24, "sata_ports": 4, "onboard_nics": 1}],
            "cpu": [{}]
        });
        let config = PoolFactory::parse_configuration(&raw).unwrap();
        let lanes = PoolFactory::create_lane_pool(&config).unwrap();
        assert_eq!(lanes.total_capacity(), 24);
        assert_eq!(lanes.reserved_lanes(), 3);
        assert_eq!(lanes.available_capacity(), 21);
    }

    #[test]
    fn test_validation_reports_every_problem() {
        let report = PoolFactory::validate_configuration(&json!({
            "motherboard": [],
            "ram": {"uuid": "dimm"},
            "storage": [42]
        }));
        assert!(!report.valid);
        assert_eq!(
            report.errors,
            vec![
                "configuration must contain at least one motherboard",
                "configuration must contain at least one cpu",
                "ram must be a list of component records",
                "storage[0] must be an object",
            ]
        );

        let report = PoolFactory::validate_configuration(&json!([1, 2]));
        assert!(!report.valid);

        let report = PoolFactory::validate_configuration(&build());
        assert_eq!(report, ValidationReport { valid: true, errors: vec![] });
    }

    #[test]
    fn test_structural_error_is_not_exhaustion() {
        let err =
            PoolFactory::registry_from_value(&json!({"cpu": [{}]}), &AllocationConfig::default())
                .unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::Structural { .. })
        ));
        assert!(!err.is_exhaustion());

        let err = PoolFactory::create_registry(
            &ServerConfiguration::default(),
            &AllocationConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_oversized_slot_entries_are_structural() {
        let raw = json!({
            "motherboard": [{
                "expansion_slots": {
                    "pcie_slots": [{"size": "x16", "count": 4_294_967_295_u32}]
                },
                "m2_slots": [{"type": "2280", "count": 257}]
            }],
            "cpu": [{}],
            "hbacard": [{"sata_ports": 100_000}]
        });

        let report = PoolFactory::validate_configuration(&raw);
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 3);
        assert!(report.errors[0].starts_with("motherboard[0].pcie_slots[0] describes 4294967295"));
        assert!(report.errors[1].starts_with("motherboard[0].m2_slots[0] describes 257"));
        assert!(report.errors[2].starts_with("hbacard[0].sata_ports describes 100000"));

        let err =
            PoolFactory::registry_from_value(&raw, &AllocationConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::Structural { .. })
        ));

        let mut config = ServerConfiguration::deserialize(&build()).unwrap();
        config.chassis[0].riser_slots[0] = vec![PcieSlotEntry::Group {
            size: PcieSlotSize::X8,
            count: u32::MAX,
        }];
        let err = PoolFactory::create_pcie_slot_pool(&config).unwrap_err();
        assert!(!err.is_exhaustion());
    }

    #[test]
    fn test_slot_entries_at_limit_are_accepted() {
        let raw = json!({
            "motherboard": [{
                "expansion_slots": {
                    "pcie_slots": [{"size": "x1", "count": MAX_SLOTS_PER_ENTRY}]
                }
            }],
            "cpu": [{}]
        });
        assert!(PoolFactory::validate_configuration(&raw).valid);
        let registry =
            PoolFactory::registry_from_value(&raw, &AllocationConfig::default()).unwrap();
        assert_eq!(registry.pcie_slots().total_capacity(), MAX_SLOTS_PER_ENTRY);
    }

    #[test]
    fn test_undecodable_record_is_parse_error() {
        let raw = json!({
            "motherboard": [{"expansion_slots": {"pcie_slots": ["x3"]}}],
            "cpu": [{}]
        });
        let err = PoolFactory::parse_configuration(&raw).unwrap_err();
        assert!(matches!(err, Error::Validation(ValidationError::Parse { .. })));
    }

    #[test]
    fn test_allocate_deallocate_round_trip() {
        let mut registry = registry();
        for resource in ResourceType::ALL {
            let before = registry.pool(resource).stats();
            let id = registry
                .allocate(resource, 1, &owner("probe"), AllocationRequest::new())
                .unwrap();
            assert_ne!(registry.pool(resource).stats(), before);
            assert!(registry.deallocate(id));
            assert_eq!(registry.pool(resource).stats(), before);
            assert!(!registry.deallocate(id));
        }
    }

    #[test]
    fn test_exhaustion_boundary() {
        let mut registry = registry();
        for resource in ResourceType::ALL {
            let total = registry.pool(resource).available_capacity();
            let pool = registry.pool_mut(resource);
            let err = pool
                .allocate(total + 1, &owner("greedy"), AllocationRequest::new())
                .unwrap_err();
            assert_eq!(err.requested(), total + 1);
            assert_eq!(pool.available_capacity(), total);

            pool.allocate(total, &owner("greedy"), AllocationRequest::new())
                .unwrap();
            assert_eq!(pool.available_capacity(), 0);
        }
    }

    #[test]
    fn test_m2_exemption_through_lane_pool() {
        let mut registry = registry();
        let before = registry.lanes().used_capacity();

        let native = registry
            .m2_slots_mut()
            .allocate(1, &owner("nvme-0"), AllocationRequest::new())
            .unwrap();
        registry
            .forward_m2_lanes(native, 4, &owner("nvme-0"))
            .unwrap();
        assert_eq!(registry.lanes().used_capacity(), before);

        let adapter = registry
            .m2_slots_mut()
            .allocate(
                1,
                &owner("nvme-1"),
                AllocationRequest::new().prefer_source(SlotSource::Adapter),
            )
            .unwrap();
        registry
            .forward_m2_lanes(adapter, 4, &owner("nvme-1"))
            .unwrap();
        assert_eq!(registry.lanes().used_capacity(), before + 4);
        assert_eq!(registry.m2_slots().allocations_consuming_lanes().len(), 1);
    }

    #[test]
    fn test_determinism_across_fresh_registries() {
        fn run(registry: &mut ResourceRegistry) -> Vec<Vec<String>> {
            let sizes = [
                PcieSlotSize::X8,
                PcieSlotSize::X16,
                PcieSlotSize::X4,
                PcieSlotSize::X8,
                PcieSlotSize::X1,
            ];
            let mut picks = Vec::new();
            for (i, size) in sizes.into_iter().enumerate() {
                let component = ComponentId::new(format!("card-{i}"));
                let id = registry
                    .pcie_slots_mut()
                    .allocate(1, &component, AllocationRequest::new().with_required_size(size))
                    .unwrap();
                picks.push(registry.pcie_slots().allocation(id).unwrap().binding.clone());
            }
            for i in 0..6 {
                let component = ComponentId::new(format!("disk-{i}"));
                let id = registry
                    .sata_ports_mut()
                    .allocate(1, &component, AllocationRequest::new())
                    .unwrap();
                picks.push(registry.sata_ports().allocation(id).unwrap().binding.clone());
            }
            picks
        }

        let first = run(&mut registry());
        let second = run(&mut registry());
        assert_eq!(first, second);
        assert_eq!(first[0], vec!["mb_pcie_2"]);
        assert_eq!(first[1], vec!["mb_pcie_0"]);
        assert_eq!(first[2], vec!["mb_pcie_3"]);
        assert_eq!(first[5], vec!["mb_sata_0"]);
        assert_eq!(first[9], vec!["hba_0_sata_0"]);
    }

    #[test]
    fn test_reserved_ports_survive_reset() {
        let mut registry = registry();
        let sata = registry.sata_ports_mut();
        while sata
            .allocate(1, &ComponentId::new("disk"), AllocationRequest::new())
            .is_ok()
        {}
        assert_eq!(sata.available_capacity(), 0);
        assert!(sata.find_next_available_port(&AllocationRequest::new()).is_none());

        registry.reset_all();
        let sata = registry.sata_ports();
        assert_eq!(sata.available_capacity(), 12);
        assert!(sata
            .ports()
            .iter()
            .filter(|port| port.reserved)
            .all(|port| !port.is_available()));
    }

    #[test]
    fn test_bottleneck_threshold() {
        let ram = |slots: u32| RamSlotPool::new(slots, 1, "DDR5");
        let mut registry = ResourceRegistry::new(
            PcieLanePool::new(0, 0, 0),
            PcieSlotPool::new(vec![]),
            ram(10),
            M2SlotPool::new(vec![]),
            U2SlotPool::new(vec![]),
            SataPortPool::from_counts(0, &[], 0),
        );

        registry
            .ram_slots_mut()
            .allocate(8, &owner("dimms"), AllocationRequest::new())
            .unwrap();
        // exactly 20% left
        assert!(registry.bottleneck_resources().is_empty());

        registry
            .ram_slots_mut()
            .allocate(1, &owner("dimm"), AllocationRequest::new())
            .unwrap();
        assert_eq!(registry.bottleneck_resources(), vec![ResourceType::RamSlots]);
    }

    #[test]
    fn test_zero_capacity_pool_is_not_a_bottleneck() {
        let raw = json!({"motherboard": [{}], "cpu": [{}]});
        let registry =
            PoolFactory::registry_from_value(&raw, &AllocationConfig::default()).unwrap();
        assert!(registry.bottleneck_resources().is_empty());
        assert!(!registry.has_available_resources());
        assert_eq!(absent_resources(&registry).len(), 6);
        assert!(registry
            .availability_summary()
            .values()
            .all(|availability| !availability.exhausted));
    }

    #[test]
    fn test_availability_summary_and_stats() {
        let mut registry = registry();
        registry
            .u2_slots_mut()
            .allocate(5, &owner("ssds"), AllocationRequest::new())
            .unwrap();

        let summary = registry.availability_summary();
        assert_eq!(
            summary[&ResourceType::U2Slots],
            Availability {
                total: 5,
                available: 0,
                exhausted: true
            }
        );
        assert!(registry.has_available_resources());
        assert!(registry
            .bottleneck_resources()
            .contains(&ResourceType::U2Slots));

        let stats = registry.all_stats();
        assert_eq!(stats.len(), 6);
        let u2 = &stats[&ResourceType::U2Slots];
        assert!((u2.utilization_percent - 100.0).abs() < f64::EPSILON);

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["u2_slots"]["details"]["kind"], "u2_slots");
        assert_eq!(json["pcie_lanes"]["details"]["reserved_lanes"], 3);
    }

    #[test]
    fn test_deallocate_component_across_pools() {
        let mut registry = registry();
        let card = owner("raid-card");
        registry
            .pcie_slots_mut()
            .allocate(1, &card, AllocationRequest::new().with_required_size(PcieSlotSize::X8))
            .unwrap();
        registry
            .lanes_mut()
            .allocate(8, &card, AllocationRequest::new())
            .unwrap();
        registry
            .u2_slots_mut()
            .allocate(2, &card, AllocationRequest::new())
            .unwrap();

        assert_eq!(registry.pcie_slots().allocations_of(&card).len(), 1);
        assert_eq!(registry.deallocate_component(&card), 3);
        assert_eq!(registry.deallocate_component(&card), 0);
        assert_eq!(registry.lanes().used_capacity(), 3);
        assert_eq!(registry.u2_slots().available_capacity(), 5);
    }

    #[test]
    fn test_reset_restarts_numbering() {
        let mut registry = registry();
        let first = registry
            .allocate(ResourceType::RamSlots, 1, &owner("dimm"), AllocationRequest::new())
            .unwrap();
        registry.reset_all();
        let again = registry
            .allocate(ResourceType::RamSlots, 1, &owner("dimm"), AllocationRequest::new())
            .unwrap();
        assert_eq!(first, again);
        assert_eq!(again.to_string(), "ram_slots-1");
    }

    #[test]
    fn test_exhaustion_error_propagates_unchanged() {
        let mut registry = registry();
        let err = registry
            .allocate(
                ResourceType::PcieLanes,
                1_000,
                &owner("huge"),
                AllocationRequest::new(),
            )
            .unwrap_err();
        assert_eq!(err, ResourceError::exhausted("PCIe lanes", 1_000, 85));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Allocate(usize, u32),
        Release(usize),
        ReleaseComponent(u8),
        Reset(usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            4 => (0usize..6, 0u32..6).prop_map(|(r, q)| Op::Allocate(r, q)),
            2 => (0usize..64).prop_map(Op::Release),
            1 => (0u8..4).prop_map(Op::ReleaseComponent),
            1 => (0usize..6).prop_map(Op::Reset),
        ]
    }

    proptest! {
        #[test]
        fn prop_capacity_invariant_holds(ops in proptest::collection::vec(op(), 1..60)) {
            let mut registry = registry();
            let mut issued: Vec<AllocationId> = Vec::new();

            for (step, op) in ops.into_iter().enumerate() {
                match op {
                    Op::Allocate(r, quantity) => {
                        let resource = ResourceType::ALL[r];
                        let component = ComponentId::new(format!("c{}", step % 4));
                        let before = registry.pool(resource).available_capacity();
                        let request = AllocationRequest::new();
                        match registry.allocate(resource, quantity, &component, request) {
                            Ok(id) => issued.push(id),
                            Err(_) => {
                                let after = registry.pool(resource).available_capacity();
                                prop_assert_eq!(after, before);
                            }
                        }
                    }
                    Op::Release(i) => {
                        if let Some(&id) = issued.get(i) {
                            registry.deallocate(id);
                        }
                    }
                    Op::ReleaseComponent(c) => {
                        registry.deallocate_component(&ComponentId::new(format!("c{c}")));
                    }
                    Op::Reset(r) => {
                        registry.pool_mut(ResourceType::ALL[r]).reset();
                    }
                }

                for resource in ResourceType::ALL {
                    let pool = registry.pool(resource);
                    prop_assert_eq!(
                        pool.used_capacity() + pool.available_capacity(),
                        pool.total_capacity()
                    );
                }
            }
        }
    }
}
