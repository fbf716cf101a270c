use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::params::SimulationParameters;

/// Fronthaul load after modulation-aware IQ compression.
#[derive(Clone, Debug, PartialEq)]
pub struct FronthaulCompressor {
    pub enabled: bool,
    pub ratios: BTreeMap<String, f64>, // modulation label -> compression ratio
}

impl FronthaulCompressor {
    pub fn new(enabled: bool, ratios: BTreeMap<String, f64>) -> FronthaulCompressor {
        FronthaulCompressor { enabled, ratios }
    }

    pub fn from_parameters(params: &SimulationParameters) -> FronthaulCompressor {
        FronthaulCompressor::new(params.modulation_compression, params.compression_ratio.clone())
    }

    /// Compressed capacity in Mbps. Passes the capacity through when
    /// compression is off, the modulation is unknown to the link (`None`)
    /// or there is no capacity to carry.
    pub fn compress(&self, capacity_mbps: f64, modulation: Option<&str>) -> Result<f64> {
        match modulation {
            Some(label) if self.enabled && capacity_mbps > 0.0 => {
                let ratio = self.ratios.get(label).ok_or_else(|| {
                    Error::configuration(
                        format!("compression_ratio.{label}"),
                        "no compression ratio for this modulation",
                    )
                })?;
                Ok(capacity_mbps * ratio)
            }
            _ => Ok(capacity_mbps),
        }
    }
}
