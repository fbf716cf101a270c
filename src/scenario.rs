//! End-to-end evaluation of one deployment scenario: link budget, traffic
//! chain, CPU utilization, cost and (optionally) heuristic dimensioning.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cost::{self, CostCatalog, CostEngine, CostReport, CostRequest};
use crate::cpu_estimator::{CpuUtilization, CpuUtilizationEstimator, RegressionArtifact};
use crate::dimensioning::{
    CellTowerRecord, DimensioningConfig, HeuristicDimensioning, OperatorDimensioning,
};
use crate::error::Result;
use crate::geometry::ScenarioGeometry;
use crate::link_budget::{LinkBudgetEngine, LinkBudgetResult, LinkSettings};
use crate::modulation::ModulationCodingTable;
use crate::overhead::{OverheadModel, OverheadTable};
use crate::params::{AntennaType, DuplexMode, SimulationParameters};
use crate::propagation::PropagationModel;
use crate::traffic::{ThroughputGbps, TrafficCalculator};

/// Site layout and transport distances.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Deployment {
    pub site_radius_m: f64,
    pub rudu_distance_m: f64,
    pub ducu_distance_m: f64,
    #[serde(default)]
    pub duplex_mode: DuplexMode,
}

/// Cell tower records and the settings to dimension them with.
#[derive(Clone, Debug)]
pub struct DimensioningInput {
    pub config: DimensioningConfig,
    pub towers: Vec<CellTowerRecord>,
}

/// A fully loaded scenario. See `file::load_scenario`.
#[derive(Clone, Debug)]
pub struct Scenario {
    pub params: SimulationParameters,
    pub link: LinkSettings,
    pub ant_type: AntennaType,
    pub deployment: Deployment,
    pub catalog: CostCatalog,
    pub modulation: ModulationCodingTable,
    pub overhead: OverheadTable,
    pub artifact: RegressionArtifact,
    pub geometry: ScenarioGeometry,
    pub dimensioning: Option<DimensioningInput>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TrafficSummary {
    pub duplex_mode: DuplexMode,
    pub resource_blocks: f64,
    pub max_cell_throughput: ThroughputGbps,
    pub ecpri: f64,
    pub f1c: f64,
    pub f1u: f64,
    pub du_northbound: f64,
    pub cuup_northbound: f64,
    pub cucp_northbound: f64,
    pub core: f64,
    pub smo: f64,
}

impl TrafficSummary {
    pub fn new(traffic: &TrafficCalculator, mode: DuplexMode) -> TrafficSummary {
        TrafficSummary {
            duplex_mode: mode,
            resource_blocks: traffic.resource_blocks(),
            max_cell_throughput: traffic.max_cell_throughput(mode),
            ecpri: traffic.ecpri_throughput(),
            f1c: traffic.f1c_throughput(mode),
            f1u: traffic.f1u_throughput(mode),
            du_northbound: traffic.du_nb_traffic(mode),
            cuup_northbound: traffic.cuup_nb_traffic(mode),
            cucp_northbound: traffic.cucp_nb_traffic(mode),
            core: traffic.core_traffic(mode),
            smo: traffic.smo_traffic(mode),
        }
    }
}

/// Dimensioning outcome of one operator; `result` is `None` when no
/// load candidate survived.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OperatorReport {
    pub mnc: u32,
    pub result: Option<OperatorDimensioning>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScenarioReport {
    pub link_budget: Vec<LinkBudgetResult>,
    pub receiver_density: f64, // receivers per km²
    pub mean_capacity_gbps: f64,
    pub sites_per_km2: f64,
    pub traffic: TrafficSummary,
    pub cpu: CpuUtilization,
    pub cost: CostReport,
    pub total_cost: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensioning: Option<Vec<OperatorReport>>,
}

fn mean_capacity_gbps(results: &[LinkBudgetResult]) -> f64 {
    if results.is_empty() {
        return 0.0;
    }
    let total: f64 = results.iter().map(|r| r.capacity_mbps).sum();
    total / results.len() as f64 / 1000.0
}

/// Run every stage of the pipeline. Any stage error aborts the run.
pub fn evaluate_scenario(
    scenario: &Scenario,
    model: &dyn PropagationModel,
    overhead: &dyn OverheadModel,
) -> Result<ScenarioReport> {
    let params = &scenario.params;

    let engine = LinkBudgetEngine::from_geometry(&scenario.geometry, scenario.ant_type, params)?;
    let link_budget = engine.estimate_link_budget(&scenario.link, &scenario.modulation, model)?;
    let receiver_density = engine.receiver_density();
    let mean_capacity_gbps = mean_capacity_gbps(&link_budget);
    info!(
        receivers = link_budget.len(),
        mean_capacity_gbps, "link budget complete"
    );

    let traffic = TrafficCalculator::new(params)?;
    let traffic = TrafficSummary::new(&traffic, scenario.deployment.duplex_mode);
    debug!(?traffic, "traffic chain");

    let estimator = CpuUtilizationEstimator::new(scenario.artifact.clone())?;
    let cpu = estimator.estimate(params)?;

    let sites_per_km2 = cost::sites_per_km2(scenario.deployment.site_radius_m)?;
    let request = CostRequest {
        sites_per_km2,
        capacity_gbps: mean_capacity_gbps,
        rudu_distance: scenario.deployment.rudu_distance_m,
        ducu_distance: scenario.deployment.ducu_distance_m,
        utilization: cpu,
    };
    let cost = CostEngine::new(params, &scenario.catalog, overhead).get_cost(&request)?;
    let total_cost = cost.total_cost();
    info!(total_cost, "cost complete");

    let dimensioning = match &scenario.dimensioning {
        Some(input) => {
            let heuristic = HeuristicDimensioning::new(input.config.clone())?;
            let reports = heuristic
                .calculate(&input.towers)
                .into_iter()
                .map(|(mnc, result)| OperatorReport { mnc, result })
                .collect();
            Some(reports)
        }
        None => None,
    };

    Ok(ScenarioReport {
        link_budget,
        receiver_density,
        mean_capacity_gbps,
        sites_per_km2,
        traffic,
        cpu,
        cost,
        total_cost,
        dimensioning,
    })
}
