//! CPU utilization of the DU, CU-CP and CU-UP from linear regression
//! models trained on measured benchmark runs.
//!
//! The artifact holds two regressors (CU and DU) and the feature scaler
//! they were trained with. CU-CP and CU-UP share the CU regressor and
//! differ only in the traffic share fed to it.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::params::SimulationParameters;

/// Feature order shared by training and estimation.
pub const FEATURE_NAMES: [&str; 8] = [
    "numerology",
    "bandwidth",
    "modulation",
    "cells",
    "number_of_ues",
    "dl",
    "ul",
    "cell_x_ue",
];

pub const FEATURE_COUNT: usize = FEATURE_NAMES.len();

/// Diagonal load added when the normal equations are singular.
const RIDGE: f64 = 1e-9;
const PIVOT_EPSILON: f64 = 1e-12;

/// Scales every feature to [0, 1] over the training range. Constant
/// features map to zero.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    pub data_min: Vec<f64>,
    pub data_max: Vec<f64>,
}

impl MinMaxScaler {
    pub fn fit(rows: &[Vec<f64>]) -> Result<MinMaxScaler> {
        let first = rows
            .first()
            .ok_or_else(|| Error::DegenerateInput("cannot fit a scaler on no rows".to_string()))?;
        let mut data_min = first.clone();
        let mut data_max = first.clone();
        for row in &rows[1..] {
            if row.len() != first.len() {
                return Err(Error::DegenerateInput(format!(
                    "ragged feature rows: {} and {} columns",
                    first.len(),
                    row.len()
                )));
            }
            for (j, &value) in row.iter().enumerate() {
                data_min[j] = data_min[j].min(value);
                data_max[j] = data_max[j].max(value);
            }
        }
        Ok(MinMaxScaler { data_min, data_max })
    }

    pub fn n_features(&self) -> usize {
        self.data_min.len()
    }

    pub fn transform(&self, row: &[f64]) -> Result<Vec<f64>> {
        if row.len() != self.n_features() {
            return Err(Error::Artifact(format!(
                "scaler expects {} features, got {}",
                self.n_features(),
                row.len()
            )));
        }
        Ok(row
            .iter()
            .zip(self.data_min.iter().zip(&self.data_max))
            .map(|(&x, (&lo, &hi))| {
                let range = hi - lo;
                if range == 0.0 {
                    x - lo
                } else {
                    (x - lo) / range
                }
            })
            .collect())
    }
}

/// Ordinary least squares with an intercept.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinearRegression {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

/// Gaussian elimination with partial pivoting. `None` when singular.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < PIVOT_EPSILON {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }
    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Some(x)
}

impl LinearRegression {
    /// Fit through the normal equations. Singular systems (constant or
    /// collinear features) are retried with a small ridge term.
    pub fn fit(x: &[Vec<f64>], y: &[f64]) -> Result<LinearRegression> {
        if x.len() != y.len() {
            return Err(Error::DegenerateInput(format!(
                "{} feature rows for {} targets",
                x.len(),
                y.len()
            )));
        }
        if x.len() < 2 {
            return Err(Error::DegenerateInput(
                "at least two samples are needed to fit a regression".to_string(),
            ));
        }
        let p = x[0].len() + 1;

        let mut xtx = vec![vec![0.0; p]; p];
        let mut xty = vec![0.0; p];
        for (row, &target) in x.iter().zip(y) {
            let augmented: Vec<f64> = std::iter::once(1.0).chain(row.iter().copied()).collect();
            for i in 0..p {
                xty[i] += augmented[i] * target;
                for j in 0..p {
                    xtx[i][j] += augmented[i] * augmented[j];
                }
            }
        }

        let beta = match solve(xtx.clone(), xty.clone()) {
            Some(beta) => beta,
            None => {
                for (i, row) in xtx.iter_mut().enumerate().skip(1) {
                    row[i] += RIDGE;
                }
                solve(xtx, xty).ok_or_else(|| {
                    Error::DegenerateInput("regression system is singular".to_string())
                })?
            }
        };

        Ok(LinearRegression {
            intercept: beta[0],
            coefficients: beta[1..].to_vec(),
        })
    }

    pub fn predict(&self, row: &[f64]) -> Result<f64> {
        if row.len() != self.coefficients.len() {
            return Err(Error::Artifact(format!(
                "regressor expects {} features, got {}",
                self.coefficients.len(),
                row.len()
            )));
        }
        Ok(self.intercept + self.coefficients.iter().zip(row).map(|(c, x)| c * x).sum::<f64>())
    }
}

/// One measured benchmark run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkSample {
    #[serde(rename = "Numerology")]
    pub numerology: f64,
    #[serde(rename = "Bandwidth MHz")]
    pub bandwidth: f64,
    #[serde(rename = "Modulation (QAM)")]
    pub modulation: f64,
    #[serde(rename = "Number of cells")]
    pub cells: f64,
    #[serde(rename = "Number of UEs")]
    pub number_of_ues: f64,
    #[serde(rename = "DL (Mbps)")]
    pub dl: f64,
    #[serde(rename = "UL (Mbps)")]
    pub ul: f64,
    #[serde(rename = "CU CPU Util %")]
    pub cu_utilization: f64,
    #[serde(rename = "DU CPU Util %")]
    pub du_utilization: f64,
}

impl BenchmarkSample {
    pub fn features(&self) -> Vec<f64> {
        vec![
            self.numerology,
            self.bandwidth,
            self.modulation,
            self.cells,
            self.number_of_ues,
            self.dl,
            self.ul,
            self.cells * self.number_of_ues,
        ]
    }
}

pub fn load_benchmarks(path: impl AsRef<Path>) -> Result<Vec<BenchmarkSample>> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)?;
    let samples = reader
        .deserialize()
        .collect::<std::result::Result<Vec<BenchmarkSample>, csv::Error>>()?;
    info!(path = %path.display(), samples = samples.len(), "loaded CPU benchmarks");
    Ok(samples)
}

/// Two fitted regressors and the scaler they share.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegressionArtifact {
    pub cu_model: LinearRegression,
    pub du_model: LinearRegression,
    pub scaler: MinMaxScaler,
}

impl RegressionArtifact {
    pub fn train(samples: &[BenchmarkSample]) -> Result<RegressionArtifact> {
        let raw: Vec<Vec<f64>> = samples.iter().map(BenchmarkSample::features).collect();
        let scaler = MinMaxScaler::fit(&raw)?;
        let scaled = raw
            .iter()
            .map(|row| scaler.transform(row))
            .collect::<Result<Vec<_>>>()?;

        let cu: Vec<f64> = samples.iter().map(|s| s.cu_utilization).collect();
        let du: Vec<f64> = samples.iter().map(|s| s.du_utilization).collect();
        let artifact = RegressionArtifact {
            cu_model: LinearRegression::fit(&scaled, &cu)?,
            du_model: LinearRegression::fit(&scaled, &du)?,
            scaler,
        };
        info!(samples = samples.len(), "trained CPU regression models");
        Ok(artifact)
    }

    /// Both regressors and the scaler must use the fixed feature set.
    pub fn validate(&self) -> Result<()> {
        let shapes = [
            ("scaler.data_min", self.scaler.data_min.len()),
            ("scaler.data_max", self.scaler.data_max.len()),
            ("cu_model", self.cu_model.coefficients.len()),
            ("du_model", self.du_model.coefficients.len()),
        ];
        for (name, len) in shapes {
            if len != FEATURE_COUNT {
                return Err(Error::Artifact(format!(
                    "{name} has {len} features, expected {FEATURE_COUNT}"
                )));
            }
        }
        Ok(())
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let text = toml::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<RegressionArtifact> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Artifact(format!("cannot read {}: {e}", path.display()))
        })?;
        let artifact: RegressionArtifact = toml::from_str(&text)
            .map_err(|e| Error::Artifact(format!("{}: {e}", path.display())))?;
        artifact.validate()?;
        info!(path = %path.display(), "loaded CPU regression artifact");
        Ok(artifact)
    }
}

/// Utilization in percent of the CPU cores. Values above 100 signal an
/// overloaded node.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CpuUtilization {
    #[serde(rename = "DU_utils")]
    pub du_utils: f64,
    #[serde(rename = "CUCP_utils")]
    pub cucp_utils: f64,
    #[serde(rename = "CUUP_utils")]
    pub cuup_utils: f64,
}

/// Raw (unscaled) feature rows per node class.
#[derive(Clone, Debug, PartialEq)]
pub struct RoleFeatures {
    pub du: Vec<f64>,
    pub cucp: Vec<f64>,
    pub cuup: Vec<f64>,
}

impl RoleFeatures {
    pub fn from_parameters(params: &SimulationParameters) -> RoleFeatures {
        let so = params.signaling_overhead;
        let ru_du = params.ru_du_ratio;
        let du_cuup = params.du_cuup_ratio;
        let cucp_cuup = params.cucp_cuup_ratio;
        let ue_load = ru_du * params.number_of_ues * params.number_of_carriers;

        let row = |dl_share: f64, cell_x_ue: f64| {
            vec![
                params.numerology as f64,
                params.bandwidth as f64,
                params.modulation as f64,
                ru_du,
                params.number_of_ues,
                params.dl * dl_share,
                params.ul * dl_share,
                cell_x_ue,
            ]
        };

        RoleFeatures {
            du: row(ru_du, ue_load),
            cucp: row(
                so * ru_du * du_cuup * cucp_cuup,
                ue_load * du_cuup * cucp_cuup * so,
            ),
            cuup: row((1.0 - so) * ru_du * du_cuup, ue_load * du_cuup * (1.0 - so)),
        }
    }
}

pub struct CpuUtilizationEstimator {
    artifact: RegressionArtifact,
}

impl CpuUtilizationEstimator {
    pub fn new(artifact: RegressionArtifact) -> Result<CpuUtilizationEstimator> {
        artifact.validate()?;
        Ok(CpuUtilizationEstimator { artifact })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<CpuUtilizationEstimator> {
        CpuUtilizationEstimator::new(RegressionArtifact::load(path)?)
    }

    fn predict(&self, model: &LinearRegression, row: &[f64], role: &str) -> Result<f64> {
        let scaled = self.artifact.scaler.transform(row)?;
        let utilization = model.predict(&scaled)?;
        if !utilization.is_finite() {
            return Err(Error::DegenerateInput(format!(
                "{role} utilization is not finite"
            )));
        }
        if utilization > 100.0 {
            warn!(role, utilization, "CPU overloaded");
        }
        Ok(utilization)
    }

    pub fn estimate(&self, params: &SimulationParameters) -> Result<CpuUtilization> {
        let features = RoleFeatures::from_parameters(params);
        Ok(CpuUtilization {
            du_utils: self.predict(&self.artifact.du_model, &features.du, "DU")?,
            cucp_utils: self.predict(&self.artifact.cu_model, &features.cucp, "CU-CP")?,
            cuup_utils: self.predict(&self.artifact.cu_model, &features.cuup, "CU-UP")?,
        })
    }
}
