//! Path loss models consumed by the link budget engine.
//!
//! The engine only depends on the [`PropagationModel`] trait. Two models
//! ship with the crate: deterministic free space loss and a 3GPP TR 38.901
//! model (UMa, UMi street canyon, RMa) with seeded log-normal shadow fading.

use std::f64::consts::PI;
use std::fmt;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::constants::SPEED_OF_LIGHT;
use crate::error::{Error, Result};
use crate::params::{AntennaType, Environment};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SightType {
    Los,
    Nlos,
}

impl SightType {
    /// Line of sight below the breakpoint distance, non line of sight at or above it.
    pub fn classify(distance_m: f64, los_breakpoint_m: f64) -> SightType {
        if distance_m < los_breakpoint_m {
            SightType::Los
        } else {
            SightType::Nlos
        }
    }
}

impl fmt::Display for SightType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SightType::Los => write!(f, "los"),
            SightType::Nlos => write!(f, "nlos"),
        }
    }
}

/// Inputs of one path loss evaluation.
#[derive(Clone, Debug, PartialEq)]
pub struct PathLossRequest {
    pub frequency_ghz: f64,
    pub distance_m: f64,
    pub ant_height: f64,
    pub ant_type: AntennaType,
    pub building_height: f64,
    pub street_width: f64,
    pub environment: Environment,
    pub sight: SightType,
    pub ue_height: f64,
    pub above_roof: bool,
    pub indoor: bool,
    pub seed: u64,
    pub iterations: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PathLoss {
    pub path_loss_db: f64,
    pub model: String,
}

pub trait PropagationModel {
    fn path_loss(&self, request: &PathLossRequest) -> Result<PathLoss>;
}

/// Free space path loss in dB, distance in meters and frequency in GHz.
pub fn free_space_path_loss(distance_m: f64, frequency_ghz: f64) -> f64 {
    20.0 * (4.0 * PI * distance_m * frequency_ghz * 1e9 / SPEED_OF_LIGHT).log10()
}

/// Deterministic free space propagation, ignores sight type and seed.
#[derive(Clone, Copy, Debug, Default)]
pub struct FreeSpaceModel;

impl PropagationModel for FreeSpaceModel {
    fn path_loss(&self, request: &PathLossRequest) -> Result<PathLoss> {
        check_request(request)?;
        Ok(PathLoss {
            path_loss_db: free_space_path_loss(request.distance_m, request.frequency_ghz),
            model: "fspl".to_string(),
        })
    }
}

/// 3GPP TR 38.901 mean path loss plus shadow fading averaged over
/// `iterations` draws from an RNG seeded with the request seed.
#[derive(Clone, Copy, Debug, Default)]
pub struct Tr38901Model;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Scenario {
    UrbanMacro,
    UrbanMicro,
    RuralMacro,
}

impl Scenario {
    fn select(request: &PathLossRequest) -> Scenario {
        match (request.environment, request.ant_type) {
            (Environment::Rural, _) => Scenario::RuralMacro,
            (Environment::Urban, AntennaType::Macro) => Scenario::UrbanMacro,
            // rooftop small cells behave like macro sites
            (_, AntennaType::Micro) if request.above_roof => Scenario::UrbanMacro,
            _ => Scenario::UrbanMicro,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Scenario::UrbanMacro => "tr38901_uma",
            Scenario::UrbanMicro => "tr38901_umi",
            Scenario::RuralMacro => "tr38901_rma",
        }
    }

    fn shadow_fading_std(self, sight: SightType) -> f64 {
        match (self, sight) {
            (Scenario::UrbanMacro, SightType::Los) => 4.0,
            (Scenario::UrbanMacro, SightType::Nlos) => 6.0,
            (Scenario::UrbanMicro, SightType::Los) => 4.0,
            (Scenario::UrbanMicro, SightType::Nlos) => 7.82,
            (Scenario::RuralMacro, SightType::Los) => 4.0,
            (Scenario::RuralMacro, SightType::Nlos) => 8.0,
        }
    }
}

fn check_request(request: &PathLossRequest) -> Result<()> {
    if !(0.5..=100.0).contains(&request.frequency_ghz) {
        return Err(Error::configuration(
            "frequency",
            format!(
                "{} GHz is outside the supported 0.5-100 GHz range",
                request.frequency_ghz
            ),
        ));
    }
    if !(request.distance_m > 0.0) {
        return Err(Error::DegenerateInput(format!(
            "path loss distance must be positive, got {} m",
            request.distance_m
        )));
    }
    Ok(())
}

/// Effective-height breakpoint distance (meters).
fn breakpoint_distance(h_bs: f64, h_ut: f64, fc_ghz: f64) -> f64 {
    let h_bs_eff = (h_bs - 1.0).max(0.1);
    let h_ut_eff = (h_ut - 1.0).max(0.1);
    4.0 * h_bs_eff * h_ut_eff * fc_ghz * 1e9 / SPEED_OF_LIGHT
}

fn uma_los(d_2d: f64, d_3d: f64, fc: f64, h_bs: f64, h_ut: f64) -> f64 {
    let d_bp = breakpoint_distance(h_bs, h_ut, fc);
    if d_2d <= d_bp {
        28.0 + 22.0 * d_3d.log10() + 20.0 * fc.log10()
    } else {
        28.0 + 40.0 * d_3d.log10() + 20.0 * fc.log10()
            - 9.0 * (d_bp.powi(2) + (h_bs - h_ut).powi(2)).log10()
    }
}

fn uma_nlos(d_2d: f64, d_3d: f64, fc: f64, h_bs: f64, h_ut: f64) -> f64 {
    let nlos = 13.54 + 39.08 * d_3d.log10() + 20.0 * fc.log10() - 0.6 * (h_ut - 1.5);
    nlos.max(uma_los(d_2d, d_3d, fc, h_bs, h_ut))
}

fn umi_los(d_2d: f64, d_3d: f64, fc: f64, h_bs: f64, h_ut: f64) -> f64 {
    let d_bp = breakpoint_distance(h_bs, h_ut, fc);
    if d_2d <= d_bp {
        32.4 + 21.0 * d_3d.log10() + 20.0 * fc.log10()
    } else {
        32.4 + 40.0 * d_3d.log10() + 20.0 * fc.log10()
            - 9.5 * (d_bp.powi(2) + (h_bs - h_ut).powi(2)).log10()
    }
}

fn umi_nlos(d_2d: f64, d_3d: f64, fc: f64, h_bs: f64, h_ut: f64) -> f64 {
    let nlos = 35.3 * d_3d.log10() + 22.4 + 21.3 * fc.log10() - 0.3 * (h_ut - 1.5);
    nlos.max(umi_los(d_2d, d_3d, fc, h_bs, h_ut))
}

// building height h and street width w follow the RMa definitions
fn rma_los(d_3d: f64, fc: f64, h: f64) -> f64 {
    let h = h.max(1.0);
    20.0 * (40.0 * PI * d_3d * fc / 3.0).log10() + (0.03 * h.powf(1.72)).min(10.0) * d_3d.log10()
        - (0.044 * h.powf(1.72)).min(14.77)
        + 0.002 * h.log10() * d_3d
}

fn rma_nlos(d_3d: f64, fc: f64, h: f64, w: f64, h_bs: f64, h_ut: f64) -> f64 {
    let h = h.max(1.0);
    let w = w.max(1.0);
    let nlos = 161.04 - 7.1 * w.log10() + 7.5 * h.log10()
        - (24.37 - 3.7 * (h / h_bs).powi(2)) * h_bs.log10()
        + (43.42 - 3.1 * h_bs.log10()) * (d_3d.log10() - 3.0)
        + 20.0 * fc.log10()
        - (3.2 * (11.75 * h_ut).log10().powi(2) - 4.97);
    nlos.max(rma_los(d_3d, fc, h))
}

/// Low-loss outdoor to indoor penetration (glass and concrete mix) plus a
/// fixed 5 m indoor path.
fn outdoor_to_indoor_loss(fc: f64) -> f64 {
    let glass = 2.0 + 0.2 * fc;
    let concrete = 5.0 + 4.0 * fc;
    let through_wall =
        5.0 - 10.0 * (0.3 * 10f64.powf(-glass / 10.0) + 0.7 * 10f64.powf(-concrete / 10.0)).log10();
    through_wall + 0.5 * 5.0
}

impl Tr38901Model {
    /// Mean path loss without shadow fading.
    pub fn mean_path_loss(&self, request: &PathLossRequest) -> Result<(f64, &'static str)> {
        check_request(request)?;
        let scenario = Scenario::select(request);
        let fc = request.frequency_ghz;
        let h_bs = request.ant_height;
        let h_ut = request.ue_height;
        let d_2d = request.distance_m;
        let d_3d = (d_2d.powi(2) + (h_bs - h_ut).powi(2)).sqrt();

        let mut loss = match (scenario, request.sight) {
            (Scenario::UrbanMacro, SightType::Los) => uma_los(d_2d, d_3d, fc, h_bs, h_ut),
            (Scenario::UrbanMacro, SightType::Nlos) => uma_nlos(d_2d, d_3d, fc, h_bs, h_ut),
            (Scenario::UrbanMicro, SightType::Los) => umi_los(d_2d, d_3d, fc, h_bs, h_ut),
            (Scenario::UrbanMicro, SightType::Nlos) => umi_nlos(d_2d, d_3d, fc, h_bs, h_ut),
            (Scenario::RuralMacro, SightType::Los) => rma_los(d_3d, fc, request.building_height),
            (Scenario::RuralMacro, SightType::Nlos) => rma_nlos(
                d_3d,
                fc,
                request.building_height,
                request.street_width,
                h_bs,
                h_ut,
            ),
        };
        if request.indoor {
            loss += outdoor_to_indoor_loss(fc);
        }
        Ok((loss, scenario.name()))
    }
}

impl PropagationModel for Tr38901Model {
    fn path_loss(&self, request: &PathLossRequest) -> Result<PathLoss> {
        let (mean, model) = self.mean_path_loss(request)?;
        let sigma = Scenario::select(request).shadow_fading_std(request.sight);
        let shadowing = Normal::new(0.0, sigma)
            .map_err(|e| Error::configuration("shadow_fading", e.to_string()))?;
        let mut rng = StdRng::seed_from_u64(request.seed);

        let iterations = request.iterations.max(1);
        let total: f64 = (0..iterations)
            .map(|_| mean + shadowing.sample(&mut rng))
            .sum();

        Ok(PathLoss {
            path_loss_db: total / iterations as f64,
            model: model.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(distance_m: f64, sight: SightType) -> PathLossRequest {
        PathLossRequest {
            frequency_ghz: 3.5,
            distance_m,
            ant_height: 30.0,
            ant_type: AntennaType::Macro,
            building_height: 5.0,
            street_width: 20.0,
            environment: Environment::Urban,
            sight,
            ue_height: 1.5,
            above_roof: false,
            indoor: false,
            seed: 42,
            iterations: 20,
        }
    }

    #[test]
    fn free_space_at_one_kilometer() {
        // 20log10(1 km) + 20log10(1 GHz) + 92.45
        let fspl = free_space_path_loss(1000.0, 1.0);
        assert!((fspl - 92.45).abs() < 0.01, "{fspl}");
    }

    #[test]
    fn sight_classification_at_breakpoint() {
        assert_eq!(SightType::classify(499.9, 500.0), SightType::Los);
        assert_eq!(SightType::classify(500.0, 500.0), SightType::Nlos);
    }

    #[test]
    fn same_seed_same_loss() {
        let model = Tr38901Model;
        let a = model.path_loss(&request(300.0, SightType::Los)).unwrap();
        let b = model.path_loss(&request(300.0, SightType::Los)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.model, "tr38901_uma");
    }

    #[test]
    fn nlos_is_never_below_los_mean() {
        let model = Tr38901Model;
        for d in [50.0, 200.0, 800.0, 2000.0] {
            let (los, _) = model.mean_path_loss(&request(d, SightType::Los)).unwrap();
            let (nlos, _) = model.mean_path_loss(&request(d, SightType::Nlos)).unwrap();
            assert!(nlos >= los, "d={d}: nlos {nlos} < los {los}");
        }
    }

    #[test]
    fn loss_grows_with_distance() {
        let model = Tr38901Model;
        let (near, _) = model.mean_path_loss(&request(100.0, SightType::Nlos)).unwrap();
        let (far, _) = model.mean_path_loss(&request(1000.0, SightType::Nlos)).unwrap();
        assert!(far > near);
    }

    #[test]
    fn indoor_adds_penetration_loss() {
        let model = Tr38901Model;
        let outdoor = request(300.0, SightType::Los);
        let indoor = PathLossRequest {
            indoor: true,
            ..outdoor.clone()
        };
        let (a, _) = model.mean_path_loss(&outdoor).unwrap();
        let (b, _) = model.mean_path_loss(&indoor).unwrap();
        assert!(b - a > 5.0);
    }

    #[test]
    fn micro_and_rural_select_their_scenarios() {
        let model = Tr38901Model;
        let micro = PathLossRequest {
            ant_type: AntennaType::Micro,
            ant_height: 10.0,
            ..request(200.0, SightType::Los)
        };
        assert_eq!(model.path_loss(&micro).unwrap().model, "tr38901_umi");
        let rural = PathLossRequest {
            environment: Environment::Rural,
            ..request(2000.0, SightType::Nlos)
        };
        assert_eq!(model.path_loss(&rural).unwrap().model, "tr38901_rma");
    }

    #[test]
    fn unsupported_frequency_is_rejected() {
        let bad = PathLossRequest {
            frequency_ghz: 150.0,
            ..request(100.0, SightType::Los)
        };
        assert!(matches!(
            Tr38901Model.path_loss(&bad),
            Err(Error::Configuration { .. })
        ));
    }
}
