pub mod cli;
pub mod constants;
pub mod cost;
pub mod cpu_estimator;
pub mod dimensioning;
mod error;
pub mod file;
pub mod fronthaul;
pub mod geometry;
pub mod link_budget;
pub mod modulation;
pub mod overhead;
pub mod params;
pub mod propagation;
pub mod scenario;
pub mod site;
pub mod traffic;

use std::path::Path;

pub use cost::{CostCatalog, CostEngine, CostReport, CostRequest};
pub use cpu_estimator::{CpuUtilization, CpuUtilizationEstimator, RegressionArtifact};
pub use dimensioning::{DimensioningConfig, HeuristicDimensioning};
pub use error::{Error, Result};
pub use fronthaul::FronthaulCompressor;
pub use link_budget::{LinkBudgetEngine, LinkBudgetResult, LinkSettings};
pub use modulation::ModulationCodingTable;
pub use overhead::{OverheadModel, OverheadTable};
pub use params::{
    AntennaType, DuplexMode, Environment, Generation, ServerType, SimulationParameters,
    VirtualizationType,
};
pub use propagation::{FreeSpaceModel, PropagationModel, Tr38901Model};
pub use scenario::{evaluate_scenario, Scenario, ScenarioReport};
pub use traffic::TrafficCalculator;

// loads a scenario file and evaluates it with the 38.901 model and the
// scenario's own overhead table
pub fn evaluate_scenario_file(path: impl AsRef<Path>) -> Result<ScenarioReport> {
    let scenario = file::load_scenario(path)?;
    evaluate_scenario(&scenario, &Tr38901Model, &scenario.overhead)
}

// writes the report as pretty JSON
pub fn write_report(report: &ScenarioReport, path: impl AsRef<Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json)?;
    Ok(())
}
