//! Heuristic network dimensioning from crowd-sourced cell tower records.
//!
//! For the three operators with the most samples the dimensioning balances
//! a coverage-limited cell range (UMi LOS path loss inverted at the cell
//! edge) against a capacity-limited one (binomial device activity per
//! numerology service) and reports the number of sites each one needs.
//!
//! Candidates whose numerics leave the real domain (log of a non-positive
//! value, zero density, non-finite radius) are skipped; an operator with no
//! surviving candidate has no result.

use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::constants::{R_MAX, SPEED_OF_LIGHT, SUBCARRIERS_PER_RB};
use crate::error::{Error, Result};
use crate::traffic::symbol_duration;

/// DL overhead used to size the per-service transmission rate.
const DL_OVERHEAD: f64 = 0.08;

/// Shadowing margin of the coverage computation (dB).
const SHADOWING_MARGIN_DB: f64 = 5.0;

/// Share of the PRBs needed at the cell edge that is actually scheduled.
const CELL_EDGE_PRB_EFFICIENCY: f64 = 0.95;

/// Hexagon packing factor of the coverage site count.
const HEXAGON_FACTOR: f64 = 1.95;

const MAX_RADIUS_MISMATCH_M: f64 = 10.0;
const MAX_LOAD_MISMATCH: f64 = 1.0;
const OPERATOR_COUNT: usize = 3;

/// Air interface settings of one numerology service.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ServiceProfile {
    pub numerology: u32,
    pub mimo_layers: f64,
    pub modulation_order: f64, // bits per symbol
    pub resource_blocks: f64,
    pub data_rate_mbps: f64, // per device
}

pub const SERVICES: [ServiceProfile; 3] = [
    ServiceProfile {
        numerology: 0,
        mimo_layers: 4.0,
        modulation_order: 8.0,
        resource_blocks: 160.0,
        data_rate_mbps: 100.0,
    },
    ServiceProfile {
        numerology: 1,
        mimo_layers: 4.0,
        modulation_order: 8.0,
        resource_blocks: 24.0,
        data_rate_mbps: 15.0,
    },
    ServiceProfile {
        numerology: 2,
        mimo_layers: 2.0,
        modulation_order: 6.0,
        resource_blocks: 11.0,
        data_rate_mbps: 7.0,
    },
];

/// One OpenCelliD-style record. The CSV has no header row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CellTowerRecord {
    pub radio: String,
    pub mcc: u32,
    pub mnc: u32,
    pub lac: u64,
    pub cid: u64,
    pub unit: Option<i64>,
    pub lon: f64,
    pub lat: f64,
    pub range: f64,
    pub samples: f64,
    pub changeable: Option<u8>,
    pub created: Option<i64>,
    pub updated: Option<i64>,
    pub average_signal: Option<f64>,
}

pub fn load_cell_towers(path: impl AsRef<Path>) -> Result<Vec<CellTowerRecord>> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    let records = reader
        .deserialize()
        .collect::<std::result::Result<Vec<CellTowerRecord>, csv::Error>>()?;
    info!(path = %path.display(), records = records.len(), "loaded cell tower records");
    Ok(records)
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DimensioningConfig {
    pub p_inactive: f64,          // probability a device is RRC inactive
    pub p_connected: f64,         // probability a device is RRC connected
    pub sample_min: f64,          // exclusive
    pub sample_max: f64,          // exclusive
    pub cell_load: f64,           // percent
    pub device_threshold: u32,    // devices per gNB
    pub zeta: f64,                // required probability of serving every device
    pub radius_m: f64,            // deployment area radius
    pub frequency_ghz: f64,
    pub sectors: u32,
    #[serde(default = "default_antenna_height")]
    pub antenna_height: f64,
    #[serde(default = "default_ue_height")]
    pub ue_height: f64,
    #[serde(default = "default_max_tx_power")]
    pub max_tx_power_dbm: u32, // swept from 0
}

fn default_antenna_height() -> f64 {
    10.0
}

fn default_ue_height() -> f64 {
    12.5
}

fn default_max_tx_power() -> u32 {
    10
}

impl DimensioningConfig {
    pub fn validate(&self) -> Result<()> {
        let p = self.p_inactive + self.p_connected;
        if !(0.0..=1.0).contains(&p) {
            return Err(Error::configuration(
                "dimensioning.p_connected",
                "activity probabilities must sum to at most 1",
            ));
        }
        if !(0.0..=1.0).contains(&self.zeta) {
            return Err(Error::configuration("dimensioning.zeta", "must be a probability"));
        }
        if self.sample_min >= self.sample_max {
            return Err(Error::configuration(
                "dimensioning.sample_min",
                "sample window is empty",
            ));
        }
        if !(self.radius_m > 0.0) || !(self.frequency_ghz > 0.0) || self.sectors == 0 {
            return Err(Error::configuration(
                "dimensioning",
                "radius, frequency and sectors must be positive",
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OperatorDimensioning {
    pub mnc: u32,
    pub cell_range_m: f64,
    pub sites_for_coverage: f64,
    pub sites_for_capacity: f64,
    pub tx_power_dbm: u32,
    pub cell_load: u32,
}

/// Peak DL rate of a service in Mbps after `overhead`.
pub fn transmission_model(service: &ServiceProfile, overhead: f64) -> f64 {
    let v = service.mimo_layers * service.modulation_order * R_MAX;
    let ts = symbol_duration(service.numerology);
    1e-6 * (v * service.resource_blocks * SUBCARRIERS_PER_RB / ts) * (1.0 - overhead)
}

/// P(X <= k) for X ~ Binomial(n, p), summed in log space.
pub fn binomial_cdf(k: u64, n: u64, p: f64) -> f64 {
    if k >= n {
        return 1.0;
    }
    if p <= 0.0 {
        return 1.0;
    }
    if p >= 1.0 {
        return 0.0;
    }
    let (ln_p, ln_q) = (p.ln(), (1.0 - p).ln());
    let mut ln_choose = 0.0;
    let mut total = 0.0;
    for i in 0..=k {
        if i > 0 {
            ln_choose += ((n - i + 1) as f64).ln() - (i as f64).ln();
        }
        total += (ln_choose + i as f64 * ln_p + (n - i) as f64 * ln_q).exp();
    }
    total.min(1.0)
}

pub struct HeuristicDimensioning {
    config: DimensioningConfig,
}

impl HeuristicDimensioning {
    pub fn new(config: DimensioningConfig) -> Result<HeuristicDimensioning> {
        config.validate()?;
        Ok(HeuristicDimensioning { config })
    }

    /// Top three operators by total samples, busiest first.
    pub fn top_operators(records: &[CellTowerRecord]) -> Vec<(u32, f64)> {
        let mut totals: BTreeMap<u32, f64> = BTreeMap::new();
        for r in records {
            *totals.entry(r.mnc).or_default() += r.samples;
        }
        let mut ranked: Vec<(u32, f64)> = totals.into_iter().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.truncate(OPERATOR_COUNT);
        ranked
    }

    /// Cells of `mnc` inside the sample window, restricted to the LAC with
    /// the most samples and sorted by samples, busiest first.
    pub fn network_acquisition<'r>(
        &self,
        records: &'r [CellTowerRecord],
        mnc: u32,
    ) -> Vec<&'r CellTowerRecord> {
        let in_window: Vec<&CellTowerRecord> = records
            .iter()
            .filter(|r| r.mnc == mnc)
            .filter(|r| r.samples > self.config.sample_min && r.samples < self.config.sample_max)
            .collect();

        let mut per_lac: BTreeMap<u64, f64> = BTreeMap::new();
        for r in &in_window {
            *per_lac.entry(r.lac).or_default() += r.samples;
        }
        let busiest = per_lac
            .into_iter()
            .max_by(|a, b| a.1.total_cmp(&b.1).then(b.0.cmp(&a.0)))
            .map(|(lac, _)| lac);

        let mut cells: Vec<&CellTowerRecord> = match busiest {
            Some(lac) => in_window.into_iter().filter(|r| r.lac == lac).collect(),
            None => Vec::new(),
        };
        cells.sort_by(|a, b| b.samples.total_cmp(&a.samples));
        cells
    }

    /// Largest device count up to the threshold for which all active
    /// devices still get the service rate with probability `zeta`. Zero
    /// when even the smallest count misses it.
    pub fn capacity_model(&self, service: &ServiceProfile) -> u32 {
        let p = self.config.p_inactive + self.config.p_connected;
        let served = (transmission_model(service, DL_OVERHEAD) / service.data_rate_mbps).floor() as u64;
        let mut result = 0;
        for devices in served..=self.config.device_threshold as u64 {
            if binomial_cdf(served, devices, p) >= self.config.zeta {
                result = devices as u32;
            }
        }
        result
    }

    /// Coverage radius (m) per cell for one service at `tx_power_dbm`.
    /// Cells whose numerics leave the real domain yield `None`.
    pub fn coverage(
        &self,
        cells: &[&CellTowerRecord],
        tx_power_dbm: f64,
        service: &ServiceProfile,
    ) -> Vec<Option<f64>> {
        let total_rb: f64 = SERVICES.iter().map(|s| s.resource_blocks).sum();
        let service_power = tx_power_dbm - 10.0 * (service.resource_blocks / total_rb).log10();
        let subcarriers = service.resource_blocks * SUBCARRIERS_PER_RB;
        let per_subcarrier = service_power - 10.0 * subcarriers.log10();
        let load_margin = -10.0 * (1.0 - self.config.cell_load / 100.0).log10();

        let h_bs = self.config.antenna_height;
        let h_ue = self.config.ue_height;
        let fc = self.config.frequency_ghz;
        let d_bp = 4.0 * h_bs * h_ue * fc * 1e9 / SPEED_OF_LIGHT;
        let intercept = 32.4 + 20.0 * fc.log10()
            - 9.5 * (d_bp.powi(2) + (h_bs - h_ue).powi(2)).log10()
            + SHADOWING_MARGIN_DB;

        cells
            .iter()
            .map(|cell| {
                let edge_prbs = service.resource_blocks / (CELL_EDGE_PRB_EFFICIENCY * cell.samples);
                let edge_power = per_subcarrier + 10.0 * (edge_prbs * SUBCARRIERS_PER_RB).log10();
                let max_path_loss = edge_power - load_margin;
                let radius = 10f64.powf((max_path_loss - intercept) / 40.0);
                if radius.is_finite() && radius > 0.0 {
                    Some(radius)
                } else {
                    debug!(cid = cell.cid, numerology = service.numerology, "skipping coverage");
                    None
                }
            })
            .collect()
    }

    /// Coverage-limited range at one power: the tightest service, each
    /// service averaged over the operator's cells.
    fn coverage_range(&self, cells: &[&CellTowerRecord], tx_power_dbm: f64) -> Option<f64> {
        SERVICES
            .iter()
            .filter_map(|service| {
                let radii: Vec<f64> = self
                    .coverage(cells, tx_power_dbm, service)
                    .into_iter()
                    .flatten()
                    .collect();
                if radii.is_empty() {
                    None
                } else {
                    Some(radii.iter().sum::<f64>() / radii.len() as f64)
                }
            })
            .min_by(f64::total_cmp)
    }

    fn dimension_operator(
        &self,
        mnc: u32,
        operator_samples: f64,
        cells: &[&CellTowerRecord],
        beta: f64,
    ) -> Option<OperatorDimensioning> {
        let area = PI * self.config.radius_m.powi(2);
        let density = operator_samples / (1e6 * PI);
        let mut best: Option<OperatorDimensioning> = None;

        for tx_power in 0..=self.config.max_tx_power_dbm {
            let Some(r_cov) = self.coverage_range(cells, tx_power as f64) else {
                continue;
            };
            for load in 1..=100u32 {
                let capacity_area = beta * load as f64 / density;
                if !(capacity_area.is_finite() && capacity_area > 0.0) {
                    debug!(mnc, load, "skipping load without capacity area");
                    continue;
                }
                let r_cap = (capacity_area / area).sqrt();
                if (self.config.cell_load - load as f64).abs() > MAX_LOAD_MISMATCH
                    || (r_cov - r_cap).abs() > MAX_RADIUS_MISMATCH_M
                {
                    continue;
                }
                let candidate = OperatorDimensioning {
                    mnc,
                    cell_range_m: r_cov,
                    sites_for_coverage: area / (HEXAGON_FACTOR * r_cov.powi(2)),
                    sites_for_capacity: area / capacity_area,
                    tx_power_dbm: tx_power,
                    cell_load: load,
                };
                let better = match &best {
                    None => true,
                    Some(current) => {
                        (candidate.sites_for_coverage, candidate.sites_for_capacity)
                            < (current.sites_for_coverage, current.sites_for_capacity)
                    }
                };
                if better {
                    best = Some(candidate);
                }
            }
        }
        best
    }

    /// One entry per top operator, `None` where no candidate survives.
    pub fn calculate(&self, records: &[CellTowerRecord]) -> Vec<(u32, Option<OperatorDimensioning>)> {
        let beta = self.config.sectors as f64
            * SERVICES
                .iter()
                .map(|s| self.capacity_model(s) as f64)
                .sum::<f64>();

        HeuristicDimensioning::top_operators(records)
            .into_iter()
            .map(|(mnc, samples)| {
                let cells = self.network_acquisition(records, mnc);
                let result = self.dimension_operator(mnc, samples, &cells, beta);
                debug!(mnc, cells = cells.len(), found = result.is_some(), "dimensioned operator");
                (mnc, result)
            })
            .collect()
    }
}
