//! Per-receiver link budget: path loss, interference, noise, SINR and the
//! capacity that follows from the modulation and coding table.
//!
//! Powers are combined on a log10 ("bel") scale: a dB figure `x` becomes
//! `10^x` before summation and the SINR is `log10` of the power ratio. The
//! SINR thresholds of [`ModulationCodingTable`] are calibrated to this scale.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::debug;

use crate::constants::{
    BOLTZMANN, MAX_AGGREGATED_INTERFERERS, MIN_LINK_DISTANCE_M, REFERENCE_TEMPERATURE_K,
    UE_NOISE_FIGURE_DB,
};
use crate::error::{Error, Result};
use crate::fronthaul::FronthaulCompressor;
use crate::geometry::{self, ScenarioGeometry};
use crate::modulation::ModulationCodingTable;
use crate::params::{AntennaType, Environment, Generation, SimulationParameters};
use crate::propagation::{PathLossRequest, PropagationModel, SightType};
use crate::site::{Receiver, SiteArea, Transmitter, TransmitterRole};

/// Carrier and technology settings of one link budget run.
#[derive(Clone, Debug, PartialEq)]
pub struct LinkSettings {
    pub frequency_ghz: f64,
    pub bandwidth_mhz: f64,
    pub generation: Generation,
    pub transmission_type: String, // SISO, MIMO, ...
    pub environment: Environment,
}

/// Path between one transmitter and one receiver.
#[derive(Clone, Debug, PartialEq)]
pub struct LinkPath {
    pub path_loss: f64, // dB
    pub model: String,
    pub distance: f64, // m, floored
    pub sight: SightType,
}

/// Interference seen by one receiver.
#[derive(Clone, Debug, PartialEq)]
pub struct Interference {
    pub received_powers: Vec<f64>, // dB, one per interferer
    pub model: String,
    pub ave_distance: f64,
    pub ave_path_loss: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Sinr {
    pub received_power: f64,
    pub interference: f64, // linear, after load scaling
    pub noise: f64,
    pub i_plus_n: f64, // linear
    pub sinr: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LinkBudgetResult {
    pub id: String,
    pub path_loss: f64,
    pub r_model: String,
    pub type_of_sight: SightType,
    pub ave_inf_pl: f64,
    pub received_power: f64,
    pub distance: f64,
    pub interference: f64, // log10 of the linear interference
    pub i_model: String,
    pub network_load: f64,
    pub ave_distance: f64,
    pub noise: f64,
    pub i_plus_n: f64, // log10 of the linear interference plus noise
    pub transmission_type: String,
    pub sinr: f64,
    pub spectral_efficiency: f64,
    pub modulation: Option<String>,
    pub capacity_mbps: f64,
    pub capacity_mbps_km2: f64,
    pub receiver_x: f64,
    pub receiver_y: f64,
    pub fronthaul_capacity_mbps: f64,
    pub signaling_overhead_mbps: f64,
}

// bel scale: 10^x, not 10^(x/10); the CQI thresholds are calibrated to it
fn to_linear(value: f64) -> f64 {
    10f64.powf(value)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Keep the strongest interferers and scale by the share of occupied
/// resource blocks.
pub fn aggregate_interference(mut linear: Vec<f64>, network_load: f64) -> f64 {
    linear.sort_by(|a, b| b.total_cmp(a));
    linear.truncate(MAX_AGGREGATED_INTERFERERS);
    let summed: f64 = linear.iter().sum();
    summed * (network_load / 100.0)
}

/// Thermal noise floor in dBm for a bandwidth in MHz, fixed UE noise figure.
pub fn estimate_noise(bandwidth_mhz: f64) -> f64 {
    let bandwidth_hz = bandwidth_mhz * 1e6;
    rfconversions::power::watts_to_dbm(BOLTZMANN * REFERENCE_TEMPERATURE_K)
        + UE_NOISE_FIGURE_DB
        + 10.0 * bandwidth_hz.log10()
}

/// One serving site, its interferers and the receivers in its area.
#[derive(Clone, Debug)]
pub struct LinkBudgetEngine<'a> {
    pub transmitter: Transmitter,
    pub interfering_transmitters: Vec<Transmitter>,
    pub receivers: Vec<Receiver>,
    pub site_area: SiteArea,
    pub fronthaul: FronthaulCompressor,
    params: &'a SimulationParameters,
}

impl<'a> LinkBudgetEngine<'a> {
    pub fn new(
        transmitter: Transmitter,
        interfering_transmitters: Vec<Transmitter>,
        receivers: Vec<Receiver>,
        site_area: SiteArea,
        params: &'a SimulationParameters,
    ) -> Result<LinkBudgetEngine<'a>> {
        if interfering_transmitters.is_empty() {
            return Err(Error::DegenerateInput(
                "no interfering transmitters, average interferer distance is undefined"
                    .to_string(),
            ));
        }
        if receivers.is_empty() {
            return Err(Error::DegenerateInput("no receivers to evaluate".to_string()));
        }
        let mut seen = BTreeSet::new();
        for receiver in &receivers {
            if !seen.insert(receiver.id.as_str()) {
                return Err(Error::configuration(
                    format!("receivers.{}", receiver.id),
                    "duplicate ue_id",
                ));
            }
        }
        let mut seen = BTreeSet::new();
        for site in &interfering_transmitters {
            if !seen.insert(site.id.as_str()) {
                return Err(Error::configuration(
                    format!("interfering_transmitters.{}", site.id),
                    "duplicate site_id",
                ));
            }
        }

        Ok(LinkBudgetEngine {
            transmitter,
            interfering_transmitters,
            receivers,
            site_area,
            fronthaul: FronthaulCompressor::from_parameters(params),
            params,
        })
    }

    /// Build from GeoJSON features; the first transmitter and site area
    /// feature are used.
    pub fn from_geometry(
        geometry: &ScenarioGeometry,
        ant_type: AntennaType,
        params: &'a SimulationParameters,
    ) -> Result<LinkBudgetEngine<'a>> {
        let serving = geometry
            .transmitter
            .first()
            .ok_or_else(|| Error::DegenerateInput("no serving transmitter".to_string()))?;
        let transmitter =
            Transmitter::from_feature(serving, TransmitterRole::Serving, ant_type, params)?;
        let interferers = geometry
            .interfering_transmitters
            .iter()
            .map(|f| Transmitter::from_feature(f, TransmitterRole::Interfering, ant_type, params))
            .collect::<Result<Vec<_>>>()?;
        let receivers = geometry
            .receivers
            .iter()
            .map(|f| Receiver::from_feature(f, params))
            .collect::<Result<Vec<_>>>()?;
        let area = geometry
            .site_area
            .first()
            .ok_or_else(|| Error::DegenerateInput("no site area polygon".to_string()))?;
        let site_area = SiteArea::from_feature(area)?;

        LinkBudgetEngine::new(transmitter, interferers, receivers, site_area, params)
    }

    /// Evaluate every receiver; the first failing receiver aborts the run.
    pub fn estimate_link_budget(
        &self,
        settings: &LinkSettings,
        table: &ModulationCodingTable,
        model: &dyn PropagationModel,
    ) -> Result<Vec<LinkBudgetResult>> {
        self.receivers
            .iter()
            .map(|receiver| self.evaluate_receiver(receiver, settings, table, model))
            .collect()
    }

    pub fn evaluate_receiver(
        &self,
        receiver: &Receiver,
        settings: &LinkSettings,
        table: &ModulationCodingTable,
        model: &dyn PropagationModel,
    ) -> Result<LinkBudgetResult> {
        let path = self.estimate_path_loss(
            &self.transmitter,
            receiver,
            settings,
            self.params.seed_value1,
            model,
        )?;
        let received_power = self.estimate_received_power(&self.transmitter, receiver, path.path_loss);
        let interference = self.estimate_interference(receiver, settings, model)?;
        let noise = estimate_noise(settings.bandwidth_mhz);
        let sinr = self.estimate_sinr(received_power, &interference.received_powers, noise);

        let lookup = table.lookup(sinr.sinr, settings.generation)?;
        let (capacity_mbps, capacity_mbps_km2) =
            self.estimate_average_capacity(settings.bandwidth_mhz, lookup.spectral_efficiency);
        let fronthaul_capacity_mbps = self
            .fronthaul
            .compress(capacity_mbps, lookup.modulation.as_deref())?;
        let signaling_overhead_mbps = self.estimate_signaling_overhead(capacity_mbps);

        debug!(
            ue = %receiver.id,
            path_loss = path.path_loss,
            sinr = sinr.sinr,
            capacity_mbps,
            "evaluated receiver"
        );

        Ok(LinkBudgetResult {
            id: receiver.id.clone(),
            path_loss: path.path_loss,
            r_model: path.model,
            type_of_sight: path.sight,
            ave_inf_pl: interference.ave_path_loss,
            received_power: sinr.received_power,
            distance: path.distance,
            interference: sinr.interference.log10(),
            i_model: interference.model,
            network_load: self.params.network_load,
            ave_distance: interference.ave_distance,
            noise: sinr.noise,
            i_plus_n: sinr.i_plus_n.log10(),
            transmission_type: settings.transmission_type.clone(),
            sinr: sinr.sinr,
            spectral_efficiency: lookup.spectral_efficiency,
            modulation: lookup.modulation,
            capacity_mbps,
            capacity_mbps_km2,
            receiver_x: receiver.coordinates[0],
            receiver_y: receiver.coordinates[1],
            fronthaul_capacity_mbps,
            signaling_overhead_mbps,
        })
    }

    /// Path loss between `transmitter` and `receiver`, distance floored at 20 m.
    pub fn estimate_path_loss(
        &self,
        transmitter: &Transmitter,
        receiver: &Receiver,
        settings: &LinkSettings,
        seed: u64,
        model: &dyn PropagationModel,
    ) -> Result<LinkPath> {
        let distance =
            geometry::distance(receiver.coordinates, transmitter.coordinates).max(MIN_LINK_DISTANCE_M);
        let sight = SightType::classify(distance, self.params.los_breakpoint_m);

        let request = PathLossRequest {
            frequency_ghz: settings.frequency_ghz,
            distance_m: distance,
            ant_height: transmitter.ant_height,
            ant_type: transmitter.ant_type,
            building_height: self.params.building_height,
            street_width: self.params.street_width,
            environment: settings.environment,
            sight,
            ue_height: receiver.ue_height,
            above_roof: self.params.above_roof,
            indoor: receiver.indoor,
            seed,
            iterations: self.params.iterations,
        };
        let loss = model.path_loss(&request)?;

        Ok(LinkPath {
            path_loss: loss.path_loss_db,
            model: loss.model,
            distance,
            sight,
        })
    }

    /// EIRP minus path loss and UE losses, plus UE gain (dB).
    pub fn estimate_received_power(
        &self,
        transmitter: &Transmitter,
        receiver: &Receiver,
        path_loss: f64,
    ) -> f64 {
        transmitter.eirp() - path_loss - receiver.misc_losses + receiver.gain - receiver.losses
    }

    /// Received power from every interferer, drawn with the second seed.
    pub fn estimate_interference(
        &self,
        receiver: &Receiver,
        settings: &LinkSettings,
        model: &dyn PropagationModel,
    ) -> Result<Interference> {
        let mut received_powers = Vec::with_capacity(self.interfering_transmitters.len());
        let mut total_distance = 0.0;
        let mut total_path_loss = 0.0;
        let mut last_model = String::new();

        for interferer in &self.interfering_transmitters {
            let path = self.estimate_path_loss(
                interferer,
                receiver,
                settings,
                self.params.seed_value2,
                model,
            )?;
            received_powers.push(self.estimate_received_power(interferer, receiver, path.path_loss));
            total_distance += path.distance;
            total_path_loss += path.path_loss;
            last_model = path.model;
        }

        // non-empty, checked in new()
        let count = self.interfering_transmitters.len() as f64;
        Ok(Interference {
            received_powers,
            model: last_model,
            ave_distance: total_distance / count,
            ave_path_loss: total_path_loss / count,
        })
    }

    pub fn estimate_sinr(&self, received_power: f64, interference: &[f64], noise: f64) -> Sinr {
        let raw_received_power = to_linear(received_power);
        let linear = interference.iter().map(|&v| to_linear(v)).collect();
        let raw_interference = aggregate_interference(linear, self.params.network_load);
        let i_plus_n = raw_interference + to_linear(noise);

        Sinr {
            received_power,
            interference: raw_interference,
            noise,
            i_plus_n,
            sinr: round2((raw_received_power / i_plus_n).log10()),
        }
    }

    /// Capacity in Mbps and Mbps per km² of site area.
    pub fn estimate_average_capacity(&self, bandwidth_mhz: f64, spectral_efficiency: f64) -> (f64, f64) {
        let bandwidth_hz = bandwidth_mhz * 1e6;
        let capacity_mbps = bandwidth_hz * spectral_efficiency / 1e6;
        (capacity_mbps, capacity_mbps / self.site_area.area_km2())
    }

    pub fn estimate_signaling_overhead(&self, capacity_mbps: f64) -> f64 {
        capacity_mbps * self.params.signaling_overhead
    }

    /// Receivers per km² of site area.
    pub fn receiver_density(&self) -> f64 {
        self.receivers.len() as f64 / self.site_area.area_km2()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::propagation::{FreeSpaceModel, PathLoss};
    use std::cell::RefCell;

    /// Records every request and answers with free space loss.
    struct RecordingModel {
        requests: RefCell<Vec<PathLossRequest>>,
    }

    impl PropagationModel for RecordingModel {
        fn path_loss(&self, request: &PathLossRequest) -> Result<PathLoss> {
            self.requests.borrow_mut().push(request.clone());
            FreeSpaceModel.path_loss(request)
        }
    }

    fn receiver(id: &str, x: f64, y: f64) -> Receiver {
        Receiver {
            id: id.to_string(),
            coordinates: [x, y],
            ue_height: 1.5,
            gain: 4.0,
            losses: 4.0,
            misc_losses: 4.0,
            indoor: false,
        }
    }

    fn settings() -> LinkSettings {
        LinkSettings {
            frequency_ghz: 3.5,
            bandwidth_mhz: 100.0,
            generation: Generation::FiveG,
            transmission_type: "MIMO".to_string(),
            environment: Environment::Urban,
        }
    }

    fn engine(params: &SimulationParameters, receivers: Vec<Receiver>) -> LinkBudgetEngine<'_> {
        let tx = Transmitter::new(
            "serving".to_string(),
            [0.0, 0.0],
            TransmitterRole::Serving,
            AntennaType::Macro,
            params,
        );
        let interferers = vec![
            Transmitter::new(
                "i1".to_string(),
                [1000.0, 0.0],
                TransmitterRole::Interfering,
                AntennaType::Macro,
                params,
            ),
            Transmitter::new(
                "i2".to_string(),
                [0.0, 1000.0],
                TransmitterRole::Interfering,
                AntennaType::Macro,
                params,
            ),
        ];
        let area = SiteArea::new("serving".to_string(), 1.0e6).unwrap();
        LinkBudgetEngine::new(tx, interferers, receivers, area, params).unwrap()
    }

    #[test]
    fn top_three_interferers_only() {
        let summed = aggregate_interference(vec![3.0, 9.0, 1.0, 7.0, 5.0], 100.0);
        assert_eq!(summed, 21.0);
        let half_load = aggregate_interference(vec![3.0, 9.0, 1.0, 7.0, 5.0], 50.0);
        assert_eq!(half_load, 10.5);
    }

    #[test]
    fn noise_floor_for_ten_megahertz() {
        // -173.98 dBm/Hz + 1.5 dB + 70 dB-Hz
        let noise = estimate_noise(10.0);
        assert!((noise - (-102.48)).abs() < 0.01, "{noise}");
    }

    #[test]
    fn short_distance_is_clamped_to_twenty_meters() {
        let params = SimulationParameters::default();
        let engine = engine(&params, vec![receiver("ue", 3.0, 4.0)]);
        let model = RecordingModel {
            requests: RefCell::new(Vec::new()),
        };
        engine
            .estimate_link_budget(&settings(), &ModulationCodingTable::default(), &model)
            .unwrap();
        let requests = model.requests.borrow();
        // serving link first, then the two interferers
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].distance_m, 20.0);
        assert_eq!(requests[0].seed, params.seed_value1);
        assert_eq!(requests[1].seed, params.seed_value2);
        assert_eq!(requests[0].sight, SightType::Los);
        assert_eq!(requests[1].sight, SightType::Nlos);
    }

    #[test]
    fn received_power_budget() {
        let params = SimulationParameters::default();
        let engine = engine(&params, vec![receiver("ue", 100.0, 0.0)]);
        let rx = &engine.receivers[0];
        // 55 dBm EIRP - 100 dB - 4 misc + 4 gain - 4 losses
        let p = engine.estimate_received_power(&engine.transmitter, rx, 100.0);
        assert_eq!(p, -49.0);
    }

    #[test]
    fn sinr_on_log_scale() {
        let params = SimulationParameters {
            network_load: 100.0,
            ..Default::default()
        };
        let engine = engine(&params, vec![receiver("ue", 100.0, 0.0)]);
        // noise negligible next to a single interferer at -10
        let sinr = engine.estimate_sinr(-5.0, &[-10.0], -200.0);
        assert_eq!(sinr.sinr, 5.0);
    }

    #[test]
    fn capacity_per_square_kilometer() {
        let params = SimulationParameters::default();
        let engine = engine(&params, vec![receiver("ue", 100.0, 0.0)]);
        let (mbps, per_km2) = engine.estimate_average_capacity(20.0, 2.5);
        assert_eq!(mbps, 50.0);
        assert_eq!(per_km2, 50.0);
        assert_eq!(engine.estimate_signaling_overhead(mbps), 50.0 * 0.18);
    }

    #[test]
    fn results_follow_receiver_order() {
        let params = SimulationParameters::default();
        let engine = engine(
            &params,
            vec![receiver("b", 150.0, 0.0), receiver("a", 300.0, 50.0)],
        );
        let results = engine
            .estimate_link_budget(&settings(), &ModulationCodingTable::default(), &FreeSpaceModel)
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "b");
        assert_eq!(results[1].id, "a");
        assert_eq!(results[1].receiver_y, 50.0);
        for r in &results {
            assert!(r.sinr.is_finite());
            assert_eq!(r.r_model, "fspl");
            assert_eq!(r.signaling_overhead_mbps, r.capacity_mbps * 0.18);
        }
        assert_eq!(engine.receiver_density(), 2.0);
    }

    #[test]
    fn zero_interferers_is_degenerate() {
        let params = SimulationParameters::default();
        let tx = Transmitter::new(
            "serving".to_string(),
            [0.0, 0.0],
            TransmitterRole::Serving,
            AntennaType::Micro,
            &params,
        );
        let area = SiteArea::new("serving".to_string(), 1.0e6).unwrap();
        let err = LinkBudgetEngine::new(tx, vec![], vec![receiver("ue", 1.0, 1.0)], area, &params)
            .unwrap_err();
        assert!(matches!(err, Error::DegenerateInput(_)));
    }

    #[test]
    fn zero_receivers_is_degenerate() {
        let params = SimulationParameters::default();
        let tx = Transmitter::new(
            "serving".to_string(),
            [0.0, 0.0],
            TransmitterRole::Serving,
            AntennaType::Macro,
            &params,
        );
        let interferer = Transmitter::new(
            "i1".to_string(),
            [500.0, 0.0],
            TransmitterRole::Interfering,
            AntennaType::Macro,
            &params,
        );
        let area = SiteArea::new("serving".to_string(), 1.0e6).unwrap();
        let err = LinkBudgetEngine::new(tx, vec![interferer], vec![], area, &params).unwrap_err();
        assert!(matches!(err, Error::DegenerateInput(_)));
    }

    #[test]
    fn duplicate_receiver_ids_are_rejected() {
        let params = SimulationParameters::default();
        let tx = Transmitter::new(
            "serving".to_string(),
            [0.0, 0.0],
            TransmitterRole::Serving,
            AntennaType::Macro,
            &params,
        );
        let interferer = Transmitter::new(
            "i1".to_string(),
            [500.0, 0.0],
            TransmitterRole::Interfering,
            AntennaType::Macro,
            &params,
        );
        let area = SiteArea::new("serving".to_string(), 1.0e6).unwrap();
        let receivers = vec![receiver("ue", 1.0, 1.0), receiver("ue", 2.0, 2.0)];
        assert!(LinkBudgetEngine::new(tx, vec![interferer], receivers, area, &params).is_err());
    }
}
