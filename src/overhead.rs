//! Virtualization overhead of a physical server, in percent of CPU.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};
use crate::params::{ServerType, VirtualizationType};

pub trait OverheadModel {
    /// Overhead in percent for `vm_count` virtual machines on one server.
    fn overhead(
        &self,
        server: ServerType,
        virtualization: VirtualizationType,
        proportional: bool,
        vm_count: u32,
    ) -> Result<f64>;
}

/// One benchmark measurement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OverheadPoint {
    pub server: ServerType,
    pub virtualization: VirtualizationType,
    pub proportional: bool,
    pub vm_count: u32,
    pub overhead: f64,
}

type OverheadKey = (ServerType, VirtualizationType, bool);

/// Benchmark points grouped per (server, virtualization, workload) and
/// sorted by VM count.
///
/// Lookups behave like a fully grown regression tree split on VM count:
/// measured counts return their value, other counts take the nearest
/// measured one and a count exactly halfway goes to the lower neighbour.
#[derive(Clone, Debug, PartialEq)]
pub struct OverheadTable {
    points: BTreeMap<OverheadKey, Vec<(u32, f64)>>,
}

impl OverheadTable {
    pub fn new(points: Vec<OverheadPoint>) -> Result<OverheadTable> {
        let mut grouped: BTreeMap<OverheadKey, Vec<(u32, f64)>> = BTreeMap::new();
        for p in points {
            if !p.overhead.is_finite() || p.overhead < 0.0 {
                return Err(Error::configuration(
                    format!("overhead.{}.{}", p.server, p.virtualization),
                    format!("invalid overhead {} for {} VMs", p.overhead, p.vm_count),
                ));
            }
            grouped
                .entry((p.server, p.virtualization, p.proportional))
                .or_default()
                .push((p.vm_count, p.overhead));
        }
        for measurements in grouped.values_mut() {
            measurements.sort_by_key(|(vm_count, _)| *vm_count);
            // last measurement wins for repeated counts
            measurements.reverse();
            measurements.dedup_by_key(|(vm_count, _)| *vm_count);
            measurements.reverse();
        }
        Ok(OverheadTable { points: grouped })
    }

    /// Load from a TOML file holding an `[[overhead]]` array.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<OverheadTable> {
        #[derive(Deserialize)]
        struct OverheadFile {
            overhead: Vec<OverheadPoint>,
        }

        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let file: OverheadFile = toml::from_str(&content)?;
        info!(path = %path.display(), points = file.overhead.len(), "loaded overhead table");
        OverheadTable::new(file.overhead)
    }

    /// Load from CSV with the header
    /// `server,virtualization,proportional,vm_count,overhead`.
    pub fn from_csv_file(path: impl AsRef<Path>) -> Result<OverheadTable> {
        let path = path.as_ref();
        let mut reader = csv::Reader::from_path(path)?;
        let points = reader
            .deserialize()
            .collect::<std::result::Result<Vec<OverheadPoint>, csv::Error>>()?;
        info!(path = %path.display(), points = points.len(), "loaded overhead table");
        OverheadTable::new(points)
    }

    pub fn len(&self) -> usize {
        self.points.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl OverheadModel for OverheadTable {
    fn overhead(
        &self,
        server: ServerType,
        virtualization: VirtualizationType,
        proportional: bool,
        vm_count: u32,
    ) -> Result<f64> {
        let workload = if proportional {
            "proportional"
        } else {
            "non_proportional"
        };
        let measurements = self
            .points
            .get(&(server, virtualization, proportional))
            .filter(|m| !m.is_empty())
            .ok_or_else(|| {
                Error::configuration(
                    format!("overhead.{server}.{virtualization}.{workload}"),
                    "no benchmark measurements",
                )
            })?;

        let mut best = measurements[0];
        for &(count, overhead) in &measurements[1..] {
            let current = (best.0 as f64 - vm_count as f64).abs();
            let candidate = (count as f64 - vm_count as f64).abs();
            // ascending counts: equal distance keeps the lower neighbour
            if candidate < current {
                best = (count, overhead);
            }
        }
        Ok(best.1)
    }
}

/// Measured overhead percent at 1, 2, 4 and 8 VMs.
const BENCHMARKS: &[(ServerType, VirtualizationType, bool, [f64; 4])] = &[
    (ServerType::DellPowerEdgeT330, VirtualizationType::Kvm, true, [2.1, 3.4, 5.2, 8.9]),
    (ServerType::DellPowerEdgeT330, VirtualizationType::Kvm, false, [2.6, 4.1, 6.3, 10.4]),
    (ServerType::DellPowerEdgeT330, VirtualizationType::VirtualBox, true, [4.8, 7.5, 11.2, 17.6]),
    (ServerType::DellPowerEdgeT330, VirtualizationType::VirtualBox, false, [5.5, 8.6, 12.9, 19.8]),
    (ServerType::DellPowerEdgeT330, VirtualizationType::Docker, true, [0.9, 1.4, 2.2, 3.7]),
    (ServerType::DellPowerEdgeT330, VirtualizationType::Docker, false, [1.2, 1.9, 2.9, 4.6]),
    (ServerType::DellPowerEdgeT430, VirtualizationType::Kvm, true, [1.7, 2.8, 4.3, 7.1]),
    (ServerType::DellPowerEdgeT430, VirtualizationType::Kvm, false, [2.2, 3.5, 5.4, 8.8]),
    (ServerType::DellPowerEdgeT430, VirtualizationType::VirtualBox, true, [4.1, 6.4, 9.7, 15.2]),
    (ServerType::DellPowerEdgeT430, VirtualizationType::VirtualBox, false, [4.7, 7.3, 11.1, 17.0]),
    (ServerType::DellPowerEdgeT430, VirtualizationType::Docker, true, [0.7, 1.1, 1.8, 3.0]),
    (ServerType::DellPowerEdgeT430, VirtualizationType::Docker, false, [1.0, 1.6, 2.4, 3.9]),
];

const BENCHMARK_VM_COUNTS: [u32; 4] = [1, 2, 4, 8];

impl Default for OverheadTable {
    fn default() -> Self {
        let mut points = BTreeMap::new();
        for (server, virtualization, proportional, overheads) in BENCHMARKS {
            let measurements = BENCHMARK_VM_COUNTS
                .iter()
                .copied()
                .zip(overheads.iter().copied())
                .collect();
            points.insert((*server, *virtualization, *proportional), measurements);
        }
        OverheadTable { points }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(vm_count: u32, overhead: f64) -> OverheadPoint {
        OverheadPoint {
            server: ServerType::DellPowerEdgeT330,
            virtualization: VirtualizationType::Kvm,
            proportional: true,
            vm_count,
            overhead,
        }
    }

    #[test]
    fn measured_count_returns_measurement() {
        let table = OverheadTable::default();
        let kvm = table
            .overhead(ServerType::DellPowerEdgeT330, VirtualizationType::Kvm, true, 2)
            .unwrap();
        assert_eq!(kvm, 3.4);
        let docker = table
            .overhead(ServerType::DellPowerEdgeT430, VirtualizationType::Docker, false, 8)
            .unwrap();
        assert_eq!(docker, 3.9);
    }

    #[test]
    fn nearest_count_with_lower_tie() {
        let table = OverheadTable::new(vec![point(2, 3.0), point(4, 5.0), point(8, 9.0)]).unwrap();
        let o = |n| {
            table
                .overhead(ServerType::DellPowerEdgeT330, VirtualizationType::Kvm, true, n)
                .unwrap()
        };
        assert_eq!(o(1), 3.0);
        assert_eq!(o(3), 3.0); // halfway between 2 and 4
        assert_eq!(o(5), 5.0);
        assert_eq!(o(7), 9.0);
        assert_eq!(o(32), 9.0);
    }

    #[test]
    fn unsorted_points_are_sorted() {
        let table = OverheadTable::new(vec![point(8, 9.0), point(1, 1.0)]).unwrap();
        let o = table
            .overhead(ServerType::DellPowerEdgeT330, VirtualizationType::Kvm, true, 2)
            .unwrap();
        assert_eq!(o, 1.0);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn missing_combination_is_configuration_error() {
        let table = OverheadTable::new(vec![point(1, 1.0)]).unwrap();
        let err = table
            .overhead(ServerType::DellPowerEdgeT430, VirtualizationType::Kvm, true, 1)
            .unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
        assert!(err.to_string().contains("proportional"));
    }

    #[test]
    fn negative_overhead_is_rejected() {
        assert!(OverheadTable::new(vec![point(1, -2.0)]).is_err());
    }

    #[test]
    fn points_parse_from_toml() {
        let text = r#"
            [[overhead]]
            server = "t330"
            virtualization = "Docker"
            proportional = false
            vm_count = 4
            overhead = 2.5
        "#;
        #[derive(Deserialize)]
        struct File {
            overhead: Vec<OverheadPoint>,
        }
        let file: File = toml::from_str(text).unwrap();
        let table = OverheadTable::new(file.overhead).unwrap();
        let o = table
            .overhead(ServerType::DellPowerEdgeT330, VirtualizationType::Docker, false, 4)
            .unwrap();
        assert_eq!(o, 2.5);
    }
}
