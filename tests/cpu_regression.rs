//! Integration tests: training the CPU regression artifact from benchmark
//! runs and estimating node utilization with it.

use rancost::cpu_estimator::{load_benchmarks, FEATURE_COUNT};
use rancost::{CpuUtilizationEstimator, Error, RegressionArtifact, SimulationParameters};

fn assert_approx(actual: f64, expected: f64, tol: f64, msg: &str) {
    assert!(
        (actual - expected).abs() < tol,
        "{msg}: expected {expected:.6}, got {actual:.6}"
    );
}

#[test]
fn training_reproduces_shipped_artifact() {
    let samples = load_benchmarks("files/cpu_benchmark.csv").unwrap();
    assert_eq!(samples.len(), 30);

    let trained = RegressionArtifact::train(&samples).unwrap();
    let shipped = RegressionArtifact::load("files/cpu_models.toml").unwrap();

    assert_eq!(trained.scaler, shipped.scaler);
    for (model, expected) in [
        (&trained.cu_model, &shipped.cu_model),
        (&trained.du_model, &shipped.du_model),
    ] {
        assert_eq!(model.coefficients.len(), FEATURE_COUNT);
        assert_approx(model.intercept, expected.intercept, 1e-6, "intercept");
        for (a, b) in model.coefficients.iter().zip(&expected.coefficients) {
            assert_approx(*a, *b, 1e-6, "coefficient");
        }
    }
}

#[test]
fn saved_artifact_loads_back() {
    let samples = load_benchmarks("files/cpu_benchmark.csv").unwrap();
    let trained = RegressionArtifact::train(&samples).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("models.toml");
    trained.save(&path).unwrap();
    let estimator = CpuUtilizationEstimator::from_file(&path).unwrap();

    let params = SimulationParameters::default();
    let utilization = estimator.estimate(&params).unwrap();
    assert_approx(utilization.du_utils, 62.16, 1e-6, "DU");
}

#[test]
fn more_ues_cost_more_cpu() {
    let estimator = CpuUtilizationEstimator::from_file("files/cpu_models.toml").unwrap();
    let base = estimator.estimate(&SimulationParameters::default()).unwrap();
    let busy = estimator
        .estimate(&SimulationParameters {
            number_of_ues: 128.0,
            ..Default::default()
        })
        .unwrap();
    assert!(busy.du_utils > base.du_utils);
    assert!(busy.cucp_utils > base.cucp_utils);
    assert!(busy.cuup_utils > base.cuup_utils);
}

#[test]
fn truncated_artifact_is_rejected() {
    let text = std::fs::read_to_string("files/cpu_models.toml").unwrap();
    let truncated = text.replace(
        "coefficients = [2.0, 1.6, 1.2, 1.5, 1.2, 3.1, 0.76, 2.52]",
        "coefficients = [2.0, 1.6, 1.2]",
    );
    assert_ne!(text, truncated);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("models.toml");
    std::fs::write(&path, truncated).unwrap();
    assert!(matches!(
        RegressionArtifact::load(&path),
        Err(Error::Artifact(_))
    ));
}

#[test]
fn missing_artifact_is_an_artifact_error() {
    assert!(matches!(
        CpuUtilizationEstimator::from_file("files/no_such_models.toml"),
        Err(Error::Artifact(_))
    ));
}
