use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

use crate::cost::CostCatalog;
use crate::cpu_estimator::RegressionArtifact;
use crate::dimensioning::{self, DimensioningConfig};
use crate::error::{Error, Result};
use crate::geometry::ScenarioGeometry;
use crate::link_budget::LinkSettings;
use crate::modulation::{ModulationCodingEntry, ModulationCodingTable};
use crate::overhead::{OverheadPoint, OverheadTable};
use crate::params::{AntennaType, Environment, Generation, SimulationParameters};
use crate::scenario::{Deployment, DimensioningInput, Scenario};

#[derive(Deserialize, Debug)]
struct ScenarioFile {
    geometry: String,
    artifact: String,
    link: LinkConfig,
    deployment: Deployment,
    simulation: SimulationParameters,
    catalog: CostCatalog,
    #[serde(default)]
    modulation: Vec<ModulationCodingEntry>,
    #[serde(default)]
    overhead: Vec<OverheadPoint>,
    #[serde(default)]
    dimensioning: Option<DimensioningSection>,
}

#[derive(Deserialize, Debug)]
struct LinkConfig {
    frequency_ghz: f64,
    bandwidth_mhz: Option<f64>,
    generation: Generation,
    ant_type: AntennaType,
    environment: Environment,
    #[serde(default = "default_transmission_type")]
    transmission_type: String,
}

fn default_transmission_type() -> String {
    "MIMO".to_string()
}

#[derive(Deserialize, Debug)]
struct DimensioningSection {
    cell_towers: String,
    #[serde(flatten)]
    config: DimensioningConfig,
}

/// Parse the scenario TOML without touching referenced files.
fn parse_scenario(content: &str) -> Result<ScenarioFile> {
    Ok(toml::from_str(content)?)
}

fn resolve(base_dir: &Path, path: &str) -> PathBuf {
    base_dir.join(path)
}

pub fn load_geometry(path: impl AsRef<Path>) -> Result<ScenarioGeometry> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let geometry: ScenarioGeometry = serde_json::from_str(&content)?;
    info!(
        path = %path.display(),
        interferers = geometry.interfering_transmitters.len(),
        receivers = geometry.receivers.len(),
        "loaded geometry"
    );
    Ok(geometry)
}

/// Load a scenario and everything it references. Relative paths are
/// resolved against the scenario file's directory.
pub fn load_scenario(path: impl AsRef<Path>) -> Result<Scenario> {
    let path = path.as_ref();
    info!(path = %path.display(), "loading scenario");
    let content = fs::read_to_string(path)?;
    let file = parse_scenario(&content)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

    let params = file.simulation.validated()?;

    let modulation = if file.modulation.is_empty() {
        ModulationCodingTable::default()
    } else {
        ModulationCodingTable::new(file.modulation)?
    };
    let overhead = overhead_table(file.overhead)?;

    let geometry = load_geometry(resolve(base_dir, &file.geometry))?;
    let artifact = RegressionArtifact::load(resolve(base_dir, &file.artifact))?;

    let dimensioning = match file.dimensioning {
        Some(section) => {
            section.config.validate()?;
            let towers = dimensioning::load_cell_towers(resolve(base_dir, &section.cell_towers))?;
            Some(DimensioningInput {
                config: section.config,
                towers,
            })
        }
        None => None,
    };

    let link = LinkSettings {
        frequency_ghz: file.link.frequency_ghz,
        bandwidth_mhz: file
            .link
            .bandwidth_mhz
            .unwrap_or(params.bandwidth as f64),
        generation: file.link.generation,
        transmission_type: file.link.transmission_type,
        environment: file.link.environment,
    };
    if !(link.bandwidth_mhz > 0.0) {
        return Err(Error::configuration("link.bandwidth_mhz", "must be positive"));
    }

    Ok(Scenario {
        params,
        link,
        ant_type: file.link.ant_type,
        deployment: file.deployment,
        catalog: file.catalog,
        modulation,
        overhead,
        artifact,
        geometry,
        dimensioning,
    })
}

// scenarios without [[overhead]] points fall back to the built-in sample
// measurements, which are not real benchmark data
fn overhead_table(points: Vec<OverheadPoint>) -> Result<OverheadTable> {
    if points.is_empty() {
        warn!("no [[overhead]] measurements in scenario, using built-in sample overhead table");
        return Ok(OverheadTable::default());
    }
    OverheadTable::new(points)
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use tracing_subscriber::util::SubscriberInitExt;

    use super::*;
    use crate::params::{DuplexMode, ServerType, VirtualizationType};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    const MINIMAL: &str = r#"
        geometry = "geometry.json"
        artifact = "cpu_models.toml"

        [link]
        frequency_ghz = 3.5
        generation = "5G"
        ant_type = "macro"
        environment = "urban"

        [deployment]
        site_radius_m = 400.0
        rudu_distance_m = 15000.0
        ducu_distance_m = 10000.0
        duplex_mode = "TDD"

        [simulation]
        iterations = 20
        seed_value1 = 1
        seed_value2 = 2
        los_breakpoint_m = 500.0
        building_height = 5.0
        street_width = 20.0
        above_roof = false
        network_load = 50.0
        tx_macro_baseline_height = 30.0
        tx_macro_power = 40.0
        tx_macro_gain = 16.0
        tx_macro_losses = 1.0
        tx_micro_baseline_height = 10.0
        tx_micro_power = 24.0
        tx_micro_gain = 5.0
        tx_micro_losses = 1.0
        rx_gain = 4.0
        rx_losses = 4.0
        rx_misc_losses = 4.0
        rx_height = 1.5
        sectorization = 3
        asset_lifetime = 10
        discount_rate = 3.5
        opex_percentage_of_capex = 10.0
        signaling_overhead = 0.18
        modulation_compression = true
        ru_du_ratio = 4.0
        du_cuup_ratio = 2.0
        cucp_cuup_ratio = 2.0
        Numerology = 1
        Bandwidth = 100
        Modulation = 256
        Number_of_carriers = 2.0
        Number_of_UEs = 64.0
        DL = 2000.0
        UL = 500.0
        number_of_aggregated_component_carriers = 1.0
        DL_MIMO_Layers = 4.0
        UL_MIMO_Layers = 4.0
        MU_MIMO = 1.0
        Number_of_logical_antenna_ports = 4.0
        Rmax = 0.92578125
        Scaling_factor = 1.0
        DL_UP_ratio = 0.7
        IQ_mantissa_bitwidth = 8.0
        IQ_exp_bitwidth = 4.0
        type_of_server = "Dell PowerEdge T330 server"
        type_of_virtualization = "KVM"
        prop_or_not = true
        n_virtual_machines = 2

        [simulation.compression_ratio]
        QPSK = 0.06
        16QAM = 0.12
        64QAM = 0.18
        256QAM = 0.25

        [catalog]
        ru = [{ price = 4000 }]
    "#;

    #[test]
    fn parses_capitalized_aliases() {
        let file = parse_scenario(MINIMAL).unwrap();
        assert_eq!(file.simulation.numerology, 1);
        assert_eq!(file.simulation.dl_ul_ratio, 0.7);
        assert_eq!(file.simulation.compression_ratio["256QAM"], 0.25);
        assert_eq!(file.simulation, SimulationParameters::default());
        assert_eq!(file.link.transmission_type, "MIMO");
        assert_eq!(file.deployment.duplex_mode, DuplexMode::Tdd);
        assert!(file.modulation.is_empty());
        assert!(file.dimensioning.is_none());
    }

    #[test]
    fn unknown_antenna_type_fails_to_parse() {
        let text = MINIMAL.replace(r#"ant_type = "macro""#, r#"ant_type = "pico""#);
        assert!(matches!(parse_scenario(&text), Err(Error::Toml(_))));
    }

    #[test]
    fn missing_geometry_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scenario.toml");
        fs::write(&path, MINIMAL).unwrap();
        assert!(matches!(load_scenario(&path), Err(Error::Io(_))));
    }

    #[test]
    fn duplex_strings() {
        assert_eq!("fdd".parse::<DuplexMode>().unwrap(), DuplexMode::Fdd);
        assert!("half".parse::<DuplexMode>().is_err());
    }

    #[test]
    fn builtin_overhead_table_is_logged() {
        let logs = Captured::default();
        let writer = logs.clone();
        let _guard = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish()
            .set_default();

        let table = overhead_table(Vec::new()).unwrap();
        assert_eq!(table, OverheadTable::default());
        assert!(logs.text().contains("built-in sample overhead table"), "{}", logs.text());

        let measured = overhead_table(vec![OverheadPoint {
            server: ServerType::DellPowerEdgeT330,
            virtualization: VirtualizationType::Kvm,
            proportional: true,
            vm_count: 1,
            overhead: 2.5,
        }])
        .unwrap();
        assert_ne!(measured, OverheadTable::default());
        assert_eq!(logs.text().matches("built-in").count(), 1);
    }
}
