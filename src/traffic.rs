//! Closed-form traffic chain: air interface throughput, eCPRI fronthaul,
//! F1 midhaul and the aggregated loads towards the CU and the core.
//!
//! Throughputs are in Gbps unless noted.

use serde::Serialize;

use crate::constants::{SUBCARRIERS_PER_RB, SYMBOLS_PER_SLOT};
use crate::error::{Error, Result};
use crate::params::{DuplexMode, SimulationParameters};

/// Maximum transmission bandwidth configuration N_RB, 3GPP TS 38.101-1
/// table 5.3.2-1, keyed by (channel bandwidth MHz, numerology).
const MAX_RESOURCE_BLOCKS: &[(u32, u32, u32)] = &[
    (5, 0, 25),
    (10, 0, 52),
    (15, 0, 79),
    (20, 0, 106),
    (25, 0, 133),
    (30, 0, 160),
    (40, 0, 216),
    (50, 0, 270),
    (5, 1, 11),
    (10, 1, 24),
    (15, 1, 38),
    (20, 1, 51),
    (25, 1, 65),
    (30, 1, 78),
    (40, 1, 106),
    (50, 1, 133),
    (60, 1, 162),
    (70, 1, 189),
    (80, 1, 217),
    (90, 1, 245),
    (100, 1, 273),
    (10, 2, 11),
    (15, 2, 18),
    (20, 2, 24),
    (25, 2, 31),
    (30, 2, 38),
    (40, 2, 51),
    (50, 2, 65),
    (60, 2, 79),
    (70, 2, 93),
    (80, 2, 107),
    (90, 2, 121),
    (100, 2, 135),
];

/// N_RB for a channel bandwidth (MHz) and numerology.
pub fn max_resource_blocks(bandwidth: u32, numerology: u32) -> Result<f64> {
    MAX_RESOURCE_BLOCKS
        .iter()
        .find(|(bw, mu, _)| *bw == bandwidth && *mu == numerology)
        .map(|(_, _, nbr)| *nbr as f64)
        .ok_or_else(|| {
            Error::configuration(
                "bandwidth",
                format!("{bandwidth} MHz is not defined for numerology {numerology}"),
            )
        })
}

/// Average OFDM symbol duration in seconds for numerology `mu`.
pub fn symbol_duration(numerology: u32) -> f64 {
    1e-3 / (SYMBOLS_PER_SLOT * 2f64.powi(numerology as i32))
}

/// Downlink and uplink pair.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ThroughputGbps {
    pub dl: f64,
    pub ul: f64,
}

impl ThroughputGbps {
    pub fn max(&self) -> f64 {
        self.dl.max(self.ul)
    }
}

/// Evaluates the traffic chain for one parameter set.
#[derive(Clone, Debug)]
pub struct TrafficCalculator<'a> {
    params: &'a SimulationParameters,
    nbr: f64,
}

impl<'a> TrafficCalculator<'a> {
    pub fn new(params: &'a SimulationParameters) -> Result<TrafficCalculator<'a>> {
        let nbr = max_resource_blocks(params.bandwidth, params.numerology)?;
        Ok(TrafficCalculator { params, nbr })
    }

    pub fn resource_blocks(&self) -> f64 {
        self.nbr
    }

    /// Peak cell throughput, 3GPP TS 38.306 section 4.1.2. In TDD mode
    /// the downlink keeps `dl_ul_ratio` of the airtime and the uplink the rest.
    pub fn max_cell_throughput(&self, mode: DuplexMode) -> ThroughputGbps {
        let p = self.params;
        let ts = symbol_duration(p.numerology);
        let overhead = p.signaling_overhead;
        let per_layer = 1e-6
            * p.number_of_aggregated_component_carriers
            * p.mu_mimo
            * (p.modulation as f64).log2()
            * p.rmax
            * p.scaling_factor
            * self.nbr
            * SUBCARRIERS_PER_RB
            / ts;

        let mut dl = per_layer * p.dl_mimo_layers * (1.0 - overhead);
        let mut ul = per_layer * p.ul_mimo_layers * (1.0 - overhead / 1.75);
        if mode == DuplexMode::Tdd {
            dl *= p.dl_ul_ratio;
            ul *= 1.0 - p.dl_ul_ratio;
        }

        ThroughputGbps {
            dl: dl / 1000.0,
            ul: ul / 1000.0,
        }
    }

    /// eCPRI split 7.2x fronthaul in Gbps for one cell, including the
    /// signaling share.
    pub fn ecpri_throughput(&self) -> f64 {
        let p = self.params;
        let symbol_rate = SYMBOLS_PER_SLOT / (1e-3 / 2f64.powi(p.numerology as i32));
        let iq_bits = 2.0 * p.iq_mantissa_bitwidth + p.iq_exp_bitwidth;
        p.number_of_logical_antenna_ports * symbol_rate * self.nbr * SUBCARRIERS_PER_RB * iq_bits
            / 1e9
            * (1.0 + p.signaling_overhead)
    }

    /// F1-C control plane load of one DU.
    pub fn f1c_throughput(&self, mode: DuplexMode) -> f64 {
        self.max_cell_throughput(mode).max() * self.params.signaling_overhead * self.params.ru_du_ratio
    }

    /// F1-U user plane load of one DU.
    pub fn f1u_throughput(&self, mode: DuplexMode) -> f64 {
        self.max_cell_throughput(mode).max()
            * (1.0 - self.params.signaling_overhead)
            * self.params.ru_du_ratio
    }

    /// DU northbound: F1-C plus F1-U.
    pub fn du_nb_traffic(&self, mode: DuplexMode) -> f64 {
        self.f1c_throughput(mode) + self.f1u_throughput(mode)
    }

    pub fn cuup_nb_traffic(&self, mode: DuplexMode) -> f64 {
        self.f1u_throughput(mode) * self.params.du_cuup_ratio
    }

    pub fn cucp_nb_traffic(&self, mode: DuplexMode) -> f64 {
        self.f1c_throughput(mode) * self.params.du_cuup_ratio * self.params.cucp_cuup_ratio
    }

    pub fn core_traffic(&self, mode: DuplexMode) -> f64 {
        self.cuup_nb_traffic(mode) * self.params.cucp_cuup_ratio
    }

    /// Service management and orchestration link carries the CU-CP load.
    pub fn smo_traffic(&self, mode: DuplexMode) -> f64 {
        self.cucp_nb_traffic(mode)
    }
}
