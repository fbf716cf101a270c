//! Integration tests: traffic feeding transport selection and the cost
//! model with catalogs and overhead tables loaded from disk.

use rancost::cost::sites_per_km2;
use rancost::file::load_scenario;
use rancost::overhead::OverheadTable;
use rancost::{
    CostEngine, CostRequest, CpuUtilization, DuplexMode, Error, OverheadModel, ServerType,
    SimulationParameters, TrafficCalculator, VirtualizationType,
};

fn assert_approx(actual: f64, expected: f64, tol: f64, msg: &str) {
    assert!(
        (actual - expected).abs() < tol,
        "{msg}: expected {expected:.4}, got {actual:.4}"
    );
}

fn utilization() -> CpuUtilization {
    CpuUtilization {
        du_utils: 40.0,
        cucp_utils: 20.0,
        cuup_utils: 30.0,
    }
}

#[test]
fn overhead_csv_matches_builtin_table() {
    let loaded = OverheadTable::from_csv_file("files/overhead.csv").unwrap();
    let builtin = OverheadTable::default();
    for vms in [1, 2, 3, 4, 6, 8, 16] {
        let a = loaded
            .overhead(ServerType::DellPowerEdgeT330, VirtualizationType::Kvm, true, vms)
            .unwrap();
        let b = builtin
            .overhead(ServerType::DellPowerEdgeT330, VirtualizationType::Kvm, true, vms)
            .unwrap();
        assert_eq!(a, b, "{vms} VMs");
    }
    // 3 VMs is halfway between 2 and 4
    assert_eq!(
        loaded
            .overhead(ServerType::DellPowerEdgeT330, VirtualizationType::Kvm, true, 3)
            .unwrap(),
        3.4
    );
    assert!(matches!(
        loaded.overhead(ServerType::DellPowerEdgeT330, VirtualizationType::Docker, true, 1),
        Err(Error::Configuration { .. })
    ));
}

#[test]
fn fronthaul_sizes_the_leased_line() {
    let scenario = load_scenario("files/scenario.toml").unwrap();
    let params = &scenario.params;
    let traffic = TrafficCalculator::new(params).unwrap();
    let fronthaul = traffic.ecpri_throughput() * params.sectorization as f64;
    assert!(fronthaul > 10.0 && fronthaul < 100.0, "{fronthaul}");

    let engine = CostEngine::new(params, &scenario.catalog, &scenario.overhead);
    let line = engine
        .cost_optimized("lease_line_rental", &[("speed", fronthaul)])
        .unwrap();
    assert_eq!(line.model.as_deref(), Some("100Gbps"));
}

#[test]
fn cost_scales_with_site_density() {
    let scenario = load_scenario("files/scenario.toml").unwrap();
    let engine = CostEngine::new(&scenario.params, &scenario.catalog, &scenario.overhead);

    let request = |radius: f64| CostRequest {
        sites_per_km2: sites_per_km2(radius).unwrap(),
        capacity_gbps: 0.5,
        rudu_distance: 15_000.0,
        ducu_distance: 10_000.0,
        utilization: utilization(),
    };
    let sparse = engine.get_cost(&request(800.0)).unwrap();
    let dense = engine.get_cost(&request(400.0)).unwrap();

    // halving the radius packs four times the sites
    assert_approx(
        dense.cost_breakdown["tower"],
        4.0 * sparse.cost_breakdown["tower"],
        1e-6,
        "tower",
    );
    assert!(dense.total_cost() > sparse.total_cost());
    assert_eq!(dense.components_breakdown, sparse.components_breakdown);
}

#[test]
fn unreachable_fronthaul_distance_is_not_found() {
    let scenario = load_scenario("files/scenario.toml").unwrap();
    let engine = CostEngine::new(&scenario.params, &scenario.catalog, &scenario.overhead);
    let request = CostRequest {
        sites_per_km2: 2.0,
        capacity_gbps: 0.5,
        rudu_distance: 50_000.0, // no optic reaches 50 km
        ducu_distance: 10_000.0,
        utilization: utilization(),
    };
    match engine.get_cost(&request) {
        Err(Error::NotFound { category, .. }) => assert_eq!(category, "sfp"),
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[test]
fn fdd_moves_more_traffic_to_the_core() {
    let params = SimulationParameters::default();
    let traffic = TrafficCalculator::new(&params).unwrap();
    assert!(traffic.core_traffic(DuplexMode::Fdd) > traffic.core_traffic(DuplexMode::Tdd));
    assert_approx(
        traffic.du_nb_traffic(DuplexMode::Fdd),
        traffic.max_cell_throughput(DuplexMode::Fdd).max() * params.ru_du_ratio,
        1e-9,
        "DU northbound",
    );
}
