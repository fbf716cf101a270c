//! Modulation and coding lookup: SINR to spectral efficiency and
//! modulation label, per generation.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::params::Generation;

/// One CQI row: generation, MIMO setup, CQI index, modulation label,
/// code rate (x1024), spectral efficiency (bps/Hz) and SINR threshold (dB).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModulationCodingEntry {
    pub generation: Generation,
    pub mimo: String,
    pub cqi: u32,
    pub modulation: String,
    pub coding_rate: u32,
    pub spectral_efficiency: f64,
    pub sinr_threshold: f64,
}

/// Result of a table lookup; `modulation` is `None` below the lowest threshold.
#[derive(Clone, Debug, PartialEq)]
pub struct ModulationLookup {
    pub spectral_efficiency: f64,
    pub modulation: Option<String>,
}

impl ModulationLookup {
    fn from_entry(entry: &ModulationCodingEntry) -> ModulationLookup {
        ModulationLookup {
            spectral_efficiency: entry.spectral_efficiency,
            modulation: Some(entry.modulation.clone()),
        }
    }

    fn none() -> ModulationLookup {
        ModulationLookup {
            spectral_efficiency: 0.0,
            modulation: None,
        }
    }
}

/// Ordered table; within a generation rows ascend by SINR threshold.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModulationCodingTable {
    entries: Vec<ModulationCodingEntry>,
}

impl ModulationCodingTable {
    /// Rejects tables whose rows are not ascending by threshold within a generation.
    pub fn new(entries: Vec<ModulationCodingEntry>) -> Result<ModulationCodingTable> {
        for generation in [Generation::FourG, Generation::FiveG] {
            let rows: Vec<&ModulationCodingEntry> = entries
                .iter()
                .filter(|e| e.generation == generation)
                .collect();
            for pair in rows.windows(2) {
                if pair[1].sinr_threshold < pair[0].sinr_threshold {
                    return Err(Error::configuration(
                        format!("modulation_and_coding_lut.{generation}.cqi{}", pair[1].cqi),
                        "rows must ascend by SINR threshold",
                    ));
                }
            }
        }
        Ok(ModulationCodingTable { entries })
    }

    pub fn entries(&self) -> &[ModulationCodingEntry] {
        &self.entries
    }

    /// Sliding-window scan of the rows of `generation`.
    ///
    /// A SINR in `[lower, upper)` maps to the lower row; at or above the
    /// highest threshold it saturates at the top row; below the lowest
    /// threshold there is no usable modulation.
    pub fn lookup(&self, sinr: f64, generation: Generation) -> Result<ModulationLookup> {
        let rows: Vec<&ModulationCodingEntry> = self
            .entries
            .iter()
            .filter(|e| e.generation == generation)
            .collect();

        let (lowest, highest) = match (rows.first(), rows.last()) {
            (Some(lowest), Some(highest)) => (*lowest, *highest),
            _ => {
                return Err(Error::configuration(
                    "modulation_and_coding_lut",
                    format!("no rows for generation {generation}"),
                ))
            }
        };

        for pair in rows.windows(2) {
            let (lower, upper) = (pair[0], pair[1]);
            if sinr >= lower.sinr_threshold && sinr < upper.sinr_threshold {
                return Ok(ModulationLookup::from_entry(lower));
            }
        }
        if sinr >= highest.sinr_threshold {
            return Ok(ModulationLookup::from_entry(highest));
        }
        if sinr < lowest.sinr_threshold {
            return Ok(ModulationLookup::none());
        }
        // only reachable with NaN
        Err(Error::DegenerateInput(format!(
            "SINR {sinr} cannot be placed in the modulation table"
        )))
    }

    pub fn spectral_efficiency(&self, sinr: f64, generation: Generation) -> Result<f64> {
        Ok(self.lookup(sinr, generation)?.spectral_efficiency)
    }

    pub fn modulation(&self, sinr: f64, generation: Generation) -> Result<Option<String>> {
        Ok(self.lookup(sinr, generation)?.modulation)
    }
}

fn row(
    generation: Generation,
    mimo: &str,
    cqi: u32,
    modulation: &str,
    coding_rate: u32,
    spectral_efficiency: f64,
    sinr_threshold: f64,
) -> ModulationCodingEntry {
    ModulationCodingEntry {
        generation,
        mimo: mimo.to_string(),
        cqi,
        modulation: modulation.to_string(),
        coding_rate,
        spectral_efficiency,
        sinr_threshold,
    }
}

impl Default for ModulationCodingTable {
    /// CQI tables of 3GPP TS 36.213 (4G, 1x1) and TS 38.214 (5G, 8x8).
    fn default() -> Self {
        use Generation::{FiveG, FourG};
        let entries = vec![
            row(FourG, "1x1", 1, "QPSK", 78, 0.1523, -6.7),
            row(FourG, "1x1", 2, "QPSK", 120, 0.2344, -4.7),
            row(FourG, "1x1", 3, "QPSK", 193, 0.377, -2.3),
            row(FourG, "1x1", 4, "QPSK", 308, 0.6016, 0.2),
            row(FourG, "1x1", 5, "QPSK", 449, 0.877, 2.4),
            row(FourG, "1x1", 6, "QPSK", 602, 1.1758, 4.3),
            row(FourG, "1x1", 7, "16QAM", 378, 1.4766, 5.9),
            row(FourG, "1x1", 8, "16QAM", 490, 1.9141, 8.1),
            row(FourG, "1x1", 9, "16QAM", 616, 2.4063, 10.3),
            row(FourG, "1x1", 10, "64QAM", 466, 2.7305, 11.7),
            row(FourG, "1x1", 11, "64QAM", 567, 3.3223, 14.1),
            row(FourG, "1x1", 12, "64QAM", 666, 3.9023, 16.3),
            row(FourG, "1x1", 13, "64QAM", 772, 4.5234, 18.7),
            row(FourG, "1x1", 14, "64QAM", 873, 5.1152, 21.0),
            row(FourG, "1x1", 15, "64QAM", 948, 5.5547, 22.7),
            row(FiveG, "8x8", 1, "QPSK", 78, 0.30, -6.7),
            row(FiveG, "8x8", 2, "QPSK", 193, 2.05, -4.7),
            row(FiveG, "8x8", 3, "QPSK", 449, 4.42, -2.3),
            row(FiveG, "8x8", 4, "16QAM", 378, 6.40, 0.2),
            row(FiveG, "8x8", 5, "16QAM", 490, 8.00, 2.4),
            row(FiveG, "8x8", 6, "16QAM", 616, 10.82, 4.3),
            row(FiveG, "8x8", 7, "64QAM", 466, 12.40, 5.9),
            row(FiveG, "8x8", 8, "64QAM", 567, 16.00, 8.1),
            row(FiveG, "8x8", 9, "64QAM", 666, 19.00, 10.3),
            row(FiveG, "8x8", 10, "64QAM", 772, 22.00, 11.7),
            row(FiveG, "8x8", 11, "64QAM", 873, 28.00, 14.1),
            row(FiveG, "8x8", 12, "256QAM", 711, 32.00, 16.3),
            row(FiveG, "8x8", 13, "256QAM", 797, 38.00, 18.7),
            row(FiveG, "8x8", 14, "256QAM", 885, 44.00, 21.0),
            row(FiveG, "8x8", 15, "256QAM", 948, 50.00, 22.7),
        ];
        ModulationCodingTable { entries }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_boundary_uses_lower_row() {
        let table = ModulationCodingTable::default();
        // exactly at the 16QAM (cqi 4) threshold of 5G
        let hit = table.lookup(0.2, Generation::FiveG).unwrap();
        assert_eq!(hit.spectral_efficiency, 6.40);
        assert_eq!(hit.modulation.as_deref(), Some("16QAM"));
        // just under it stays on cqi 3
        let below = table.lookup(0.19, Generation::FiveG).unwrap();
        assert_eq!(below.spectral_efficiency, 4.42);
        assert_eq!(below.modulation.as_deref(), Some("QPSK"));
    }

    #[test]
    fn saturates_at_top_row() {
        let table = ModulationCodingTable::default();
        let top = table.lookup(22.7, Generation::FiveG).unwrap();
        assert_eq!(top.spectral_efficiency, 50.0);
        let far = table.lookup(60.0, Generation::FourG).unwrap();
        assert_eq!(far.spectral_efficiency, 5.5547);
        assert_eq!(far.modulation.as_deref(), Some("64QAM"));
    }

    #[test]
    fn below_lowest_threshold_has_no_modulation() {
        let table = ModulationCodingTable::default();
        let none = table.lookup(-10.0, Generation::FourG).unwrap();
        assert_eq!(none.spectral_efficiency, 0.0);
        assert_eq!(none.modulation, None);
    }

    #[test]
    fn generation_filter_applies() {
        let table = ModulationCodingTable::default();
        assert_eq!(table.spectral_efficiency(5.9, Generation::FourG).unwrap(), 1.4766);
        assert_eq!(table.spectral_efficiency(5.9, Generation::FiveG).unwrap(), 12.40);
    }

    #[test]
    fn missing_generation_is_configuration_error() {
        let four_g_only: Vec<ModulationCodingEntry> = ModulationCodingTable::default()
            .entries()
            .iter()
            .filter(|e| e.generation == Generation::FourG)
            .cloned()
            .collect();
        let table = ModulationCodingTable::new(four_g_only).unwrap();
        assert!(matches!(
            table.lookup(3.0, Generation::FiveG),
            Err(Error::Configuration { .. })
        ));
    }

    #[test]
    fn unordered_rows_are_rejected() {
        let mut entries = ModulationCodingTable::default().entries().to_vec();
        entries.swap(0, 1);
        assert!(ModulationCodingTable::new(entries).is_err());
    }
}
