use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::traffic;

/// Transmitter antenna class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AntennaType {
    Macro,
    Micro,
}

impl FromStr for AntennaType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "macro" => Ok(AntennaType::Macro),
            "micro" => Ok(AntennaType::Micro),
            other => Err(Error::configuration(
                "ant_type",
                format!("unsupported antenna type `{other}`, expected `macro` or `micro`"),
            )),
        }
    }
}

impl fmt::Display for AntennaType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AntennaType::Macro => write!(f, "macro"),
            AntennaType::Micro => write!(f, "micro"),
        }
    }
}

/// Radio access technology generation, used to filter the modulation table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Generation {
    FourG,
    FiveG,
}

impl FromStr for Generation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "4G" => Ok(Generation::FourG),
            "5G" => Ok(Generation::FiveG),
            other => Err(Error::configuration(
                "generation",
                format!("unsupported generation `{other}`, expected `4G` or `5G`"),
            )),
        }
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Generation::FourG => write!(f, "4G"),
            Generation::FiveG => write!(f, "5G"),
        }
    }
}

/// Duplexing scheme used by the throughput formulas.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DuplexMode {
    #[default]
    Tdd,
    Fdd,
}

impl FromStr for DuplexMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "TDD" => Ok(DuplexMode::Tdd),
            "FDD" => Ok(DuplexMode::Fdd),
            _ => Err(Error::configuration(
                "mode",
                format!("unsupported duplex mode `{s}`, expected `TDD` or `FDD`"),
            )),
        }
    }
}

impl fmt::Display for DuplexMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DuplexMode::Tdd => write!(f, "TDD"),
            DuplexMode::Fdd => write!(f, "FDD"),
        }
    }
}

/// Propagation environment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Environment {
    Urban,
    Suburban,
    Rural,
}

impl FromStr for Environment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "urban" => Ok(Environment::Urban),
            "suburban" => Ok(Environment::Suburban),
            "rural" => Ok(Environment::Rural),
            other => Err(Error::configuration(
                "environment",
                format!("unsupported environment `{other}`"),
            )),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Environment::Urban => write!(f, "urban"),
            Environment::Suburban => write!(f, "suburban"),
            Environment::Rural => write!(f, "rural"),
        }
    }
}

/// Physical server models with virtualization overhead benchmarks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ServerType {
    DellPowerEdgeT330,
    DellPowerEdgeT430,
}

impl FromStr for ServerType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Dell PowerEdge T330 server" | "t330" => Ok(ServerType::DellPowerEdgeT330),
            "Dell PowerEdge T430 server" | "t430" => Ok(ServerType::DellPowerEdgeT430),
            other => Err(Error::configuration(
                "type_of_server",
                format!("unsupported server type `{other}`"),
            )),
        }
    }
}

impl fmt::Display for ServerType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ServerType::DellPowerEdgeT330 => write!(f, "Dell PowerEdge T330 server"),
            ServerType::DellPowerEdgeT430 => write!(f, "Dell PowerEdge T430 server"),
        }
    }
}

/// Virtualization layer running the RAN functions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum VirtualizationType {
    Kvm,
    VirtualBox,
    Docker,
}

impl FromStr for VirtualizationType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "KVM" => Ok(VirtualizationType::Kvm),
            "VirtualBox" => Ok(VirtualizationType::VirtualBox),
            "Docker" => Ok(VirtualizationType::Docker),
            other => Err(Error::configuration(
                "type_of_virtualization",
                format!("unsupported virtualization type `{other}`"),
            )),
        }
    }
}

impl fmt::Display for VirtualizationType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            VirtualizationType::Kvm => write!(f, "KVM"),
            VirtualizationType::VirtualBox => write!(f, "VirtualBox"),
            VirtualizationType::Docker => write!(f, "Docker"),
        }
    }
}

macro_rules! string_conversions {
    ($($ty:ty),*) => {
        $(
            impl TryFrom<String> for $ty {
                type Error = Error;

                fn try_from(value: String) -> Result<Self> {
                    value.parse()
                }
            }

            impl From<$ty> for String {
                fn from(value: $ty) -> String {
                    value.to_string()
                }
            }
        )*
    };
}

string_conversions!(
    AntennaType,
    Generation,
    DuplexMode,
    Environment,
    ServerType,
    VirtualizationType
);

/// Height, power, gain and losses of one antenna class.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AntennaProfile {
    pub height: f64, // m
    pub power: f64,  // dBm
    pub gain: f64,   // dBi
    pub losses: f64, // dB
}

/// Immutable configuration shared by every model.
///
/// Field names follow snake_case; the capitalized spellings used by older
/// parameter files are accepted as aliases.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationParameters {
    // propagation
    pub iterations: u32,
    pub seed_value1: u64,
    pub seed_value2: u64,
    pub los_breakpoint_m: f64,
    pub building_height: f64,
    pub street_width: f64,
    pub above_roof: bool,
    pub network_load: f64, // percent of resource blocks occupied

    // antennas
    pub tx_macro_baseline_height: f64,
    pub tx_macro_power: f64,
    pub tx_macro_gain: f64,
    pub tx_macro_losses: f64,
    pub tx_micro_baseline_height: f64,
    pub tx_micro_power: f64,
    pub tx_micro_gain: f64,
    pub tx_micro_losses: f64,
    pub rx_gain: f64,
    pub rx_losses: f64,
    pub rx_misc_losses: f64,
    pub rx_height: f64,

    // deployment and economics
    pub sectorization: u32,
    pub asset_lifetime: u32, // years
    pub discount_rate: f64,  // percent
    pub opex_percentage_of_capex: f64,
    pub signaling_overhead: f64, // fraction for control channels

    // fronthaul compression
    pub modulation_compression: bool,
    #[serde(default)]
    pub compression_ratio: BTreeMap<String, f64>,

    // functional split
    pub ru_du_ratio: f64,
    pub du_cuup_ratio: f64,
    pub cucp_cuup_ratio: f64,

    // air interface
    #[serde(alias = "Numerology")]
    pub numerology: u32, // µ(0)=15kHz, µ(1)=30kHz, µ(2)=60kHz
    #[serde(alias = "Bandwidth")]
    pub bandwidth: u32, // MHz
    #[serde(alias = "Modulation")]
    pub modulation: u32, // QAM constellation size
    #[serde(alias = "Number_of_carriers")]
    pub number_of_carriers: f64,
    #[serde(alias = "Number_of_UEs")]
    pub number_of_ues: f64, // per cell
    #[serde(alias = "DL")]
    pub dl: f64, // Mbps per cell
    #[serde(alias = "UL")]
    pub ul: f64, // Mbps per cell
    pub number_of_aggregated_component_carriers: f64,
    #[serde(alias = "DL_MIMO_Layers")]
    pub dl_mimo_layers: f64,
    #[serde(alias = "UL_MIMO_Layers")]
    pub ul_mimo_layers: f64,
    #[serde(alias = "MU_MIMO")]
    pub mu_mimo: f64,
    #[serde(alias = "Number_of_logical_antenna_ports")]
    pub number_of_logical_antenna_ports: f64,
    #[serde(alias = "Rmax")]
    pub rmax: f64,
    #[serde(alias = "Scaling_factor")]
    pub scaling_factor: f64,
    #[serde(alias = "DL_UP_ratio")]
    pub dl_ul_ratio: f64,
    #[serde(alias = "IQ_mantissa_bitwidth")]
    pub iq_mantissa_bitwidth: f64,
    #[serde(alias = "IQ_exp_bitwidth")]
    pub iq_exp_bitwidth: f64,

    // servers
    pub type_of_server: ServerType,
    pub type_of_virtualization: VirtualizationType,
    pub prop_or_not: bool,
    pub n_virtual_machines: u32,
}

impl Default for SimulationParameters {
    fn default() -> Self {
        let compression_ratio = BTreeMap::from([
            ("QPSK".to_string(), 0.06),
            ("16QAM".to_string(), 0.12),
            ("64QAM".to_string(), 0.18),
            ("256QAM".to_string(), 0.25),
        ]);
        Self {
            iterations: 20,
            seed_value1: 1,
            seed_value2: 2,
            los_breakpoint_m: 500.0,
            building_height: 5.0,
            street_width: 20.0,
            above_roof: false,
            network_load: 50.0,
            tx_macro_baseline_height: 30.0,
            tx_macro_power: 40.0,
            tx_macro_gain: 16.0,
            tx_macro_losses: 1.0,
            tx_micro_baseline_height: 10.0,
            tx_micro_power: 24.0,
            tx_micro_gain: 5.0,
            tx_micro_losses: 1.0,
            rx_gain: 4.0,
            rx_losses: 4.0,
            rx_misc_losses: 4.0,
            rx_height: 1.5,
            sectorization: 3,
            asset_lifetime: 10,
            discount_rate: 3.5,
            opex_percentage_of_capex: 10.0,
            signaling_overhead: 0.18,
            modulation_compression: true,
            compression_ratio,
            ru_du_ratio: 4.0,
            du_cuup_ratio: 2.0,
            cucp_cuup_ratio: 2.0,
            numerology: 1,
            bandwidth: 100,
            modulation: 256,
            number_of_carriers: 2.0,
            number_of_ues: 64.0,
            dl: 2000.0,
            ul: 500.0,
            number_of_aggregated_component_carriers: 1.0,
            dl_mimo_layers: 4.0,
            ul_mimo_layers: 4.0,
            mu_mimo: 1.0,
            number_of_logical_antenna_ports: 4.0,
            rmax: crate::constants::R_MAX,
            scaling_factor: 1.0,
            dl_ul_ratio: 0.7,
            iq_mantissa_bitwidth: 8.0,
            iq_exp_bitwidth: 4.0,
            type_of_server: ServerType::DellPowerEdgeT330,
            type_of_virtualization: VirtualizationType::Kvm,
            prop_or_not: true,
            n_virtual_machines: 2,
        }
    }
}

fn require(condition: bool, key: &str, reason: &str) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(Error::configuration(key, reason))
    }
}

impl SimulationParameters {
    /// Consume and return the parameters if every field is in range.
    pub fn validated(self) -> Result<Self> {
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        require(self.iterations > 0, "iterations", "must be at least 1")?;
        require(
            (0.0..=100.0).contains(&self.network_load),
            "network_load",
            "must be a percentage in 0..=100",
        )?;
        require(
            (0.0..1.0).contains(&self.signaling_overhead),
            "signaling_overhead",
            "must be a fraction in [0, 1)",
        )?;
        require(
            (0.0..=1.0).contains(&self.dl_ul_ratio),
            "dl_ul_ratio",
            "must be a fraction in [0, 1]",
        )?;
        require(self.sectorization > 0, "sectorization", "must be at least 1")?;
        require(self.asset_lifetime > 0, "asset_lifetime", "must be at least 1 year")?;
        require(self.discount_rate >= 0.0, "discount_rate", "must not be negative")?;
        require(
            self.opex_percentage_of_capex >= 0.0,
            "opex_percentage_of_capex",
            "must not be negative",
        )?;
        require(self.ru_du_ratio > 0.0, "ru_du_ratio", "must be positive")?;
        require(self.du_cuup_ratio > 0.0, "du_cuup_ratio", "must be positive")?;
        require(self.cucp_cuup_ratio > 0.0, "cucp_cuup_ratio", "must be positive")?;
        require(
            self.modulation >= 2 && self.modulation.is_power_of_two(),
            "modulation",
            "must be a power of two constellation size",
        )?;
        require(self.los_breakpoint_m > 0.0, "los_breakpoint_m", "must be positive")?;
        require(
            self.n_virtual_machines > 0,
            "n_virtual_machines",
            "must be at least 1",
        )?;
        for (label, ratio) in &self.compression_ratio {
            require(
                *ratio > 0.0,
                &format!("compression_ratio.{label}"),
                "must be positive",
            )?;
        }
        traffic::max_resource_blocks(self.bandwidth, self.numerology)?;
        Ok(())
    }

    /// Antenna height, power, gain and losses for the given class.
    pub fn antenna_profile(&self, ant_type: AntennaType) -> AntennaProfile {
        match ant_type {
            AntennaType::Macro => AntennaProfile {
                height: self.tx_macro_baseline_height,
                power: self.tx_macro_power,
                gain: self.tx_macro_gain,
                losses: self.tx_macro_losses,
            },
            AntennaType::Micro => AntennaProfile {
                height: self.tx_micro_baseline_height,
                power: self.tx_micro_power,
                gain: self.tx_micro_gain,
                losses: self.tx_micro_losses,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_parameters_are_valid() {
        assert!(SimulationParameters::default().validate().is_ok());
    }

    #[test]
    fn unknown_antenna_type_is_configuration_error() {
        let err = "femto".parse::<AntennaType>().unwrap_err();
        assert!(matches!(err, Error::Configuration { ref key, .. } if key == "ant_type"));
    }

    #[test]
    fn antenna_profile_is_total() {
        let params = SimulationParameters::default();
        let macro_profile = params.antenna_profile(AntennaType::Macro);
        assert_eq!(macro_profile.height, 30.0);
        assert_eq!(macro_profile.power, 40.0);
        let micro_profile = params.antenna_profile(AntennaType::Micro);
        assert_eq!(micro_profile.height, 10.0);
        assert_eq!(micro_profile.gain, 5.0);
    }

    #[test]
    fn network_load_out_of_range() {
        let params = SimulationParameters {
            network_load: 150.0,
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn unsupported_numerology_bandwidth_pair() {
        let params = SimulationParameters {
            bandwidth: 100,
            numerology: 0,
            ..Default::default()
        };
        let err = params.validate().unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn enums_round_trip_through_strings() {
        assert_eq!("5G".parse::<Generation>().unwrap(), Generation::FiveG);
        assert_eq!("fdd".parse::<DuplexMode>().unwrap(), DuplexMode::Fdd);
        assert_eq!(
            "Dell PowerEdge T430 server".parse::<ServerType>().unwrap(),
            ServerType::DellPowerEdgeT430
        );
        assert_eq!(VirtualizationType::Docker.to_string(), "Docker");
        assert!("LXC".parse::<VirtualizationType>().is_err());
    }
}
