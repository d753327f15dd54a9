//! # Batch Pipeline
//!
//! Sequential analyst run: load the return series, evaluate both
//! allocation paradigms independently, aggregate whatever succeeded.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;
use tracing::warn;

use crate::error::PerpallocError;
use crate::error::Result;
use crate::optimizer::MeanVarianceConfig;
use crate::optimizer::MeanVarianceOptimizer;
use crate::optimizer::Optimizer;
use crate::optimizer::OptimizerOutcome;
use crate::optimizer::RiskParityConfig;
use crate::optimizer::RiskParityOptimizer;
use crate::performance::SamplingFrequency;
use crate::report::WeightsReport;
use crate::returns::ReturnSeriesRepository;

/// Static configuration for one batch run.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
  /// Persisted return-series CSV produced by the ingestion collaborator.
  pub data_path: PathBuf,
  /// Directory receiving per-optimizer weight records.
  pub result_dir: PathBuf,
  /// Symbols required in the return series; empty accepts all columns.
  pub symbols: Vec<String>,
  /// Sampling frequency of the series, fixing the annualization factor.
  pub frequency: SamplingFrequency,
  pub mean_variance: MeanVarianceConfig,
  pub risk_parity: RiskParityConfig,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      data_path: PathBuf::from("./data/perp_return.csv"),
      result_dir: PathBuf::from("./result"),
      symbols: vec!["BTC".into(), "ETH".into(), "LTC".into()],
      frequency: SamplingFrequency::Hourly,
      mean_variance: MeanVarianceConfig::default(),
      risk_parity: RiskParityConfig::default(),
    }
  }
}

/// Run the full batch: load, optimize under both paradigms, aggregate.
///
/// A failed solve is logged and excluded from the report; the other
/// paradigm still runs. Load and persistence failures are fatal.
pub fn run(config: &PipelineConfig) -> Result<WeightsReport> {
  let repository = ReturnSeriesRepository::new(&config.data_path, config.symbols.clone());
  let returns = Arc::new(repository.load()?);
  let periods_per_year = config.frequency.periods_per_year();

  info!(
    n_obs = returns.n_obs(),
    n_assets = returns.n_assets(),
    periods_per_year,
    "starting allocation run"
  );

  let mut report = WeightsReport::new();

  let mean_variance =
    MeanVarianceOptimizer::new(Arc::clone(&returns), config.mean_variance.clone());
  collect(
    mean_variance.run(&config.result_dir, periods_per_year),
    &mut report,
  )?;

  match RiskParityOptimizer::new(Arc::clone(&returns), config.risk_parity.clone()) {
    Ok(risk_parity) => collect(
      risk_parity.run(&config.result_dir, periods_per_year),
      &mut report,
    )?,
    Err(err) => warn!(optimizer = "RiskParity", %err, "skipping optimizer"),
  }

  Ok(report)
}

/// Fold one optimizer result into the report.
///
/// Solver failures degrade to a partial report; anything else (I/O,
/// serialization) aborts the run.
fn collect(outcome: Result<OptimizerOutcome>, report: &mut WeightsReport) -> Result<()> {
  match outcome {
    Ok(outcome) => {
      report.push(outcome);
      Ok(())
    }
    Err(PerpallocError::Optimization(err)) => {
      warn!(%err, "optimizer failed, continuing with remaining paradigms");
      Ok(())
    }
    Err(err) => Err(err),
  }
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;
  use ndarray::Array2;

  use super::*;
  use crate::returns::ReturnMatrix;

  fn write_return_csv(dir: &std::path::Path, values: Array2<f64>) -> PathBuf {
    let start = NaiveDate::from_ymd_opt(2023, 9, 1)
      .unwrap()
      .and_hms_opt(0, 0, 0)
      .unwrap();
    let timestamps = (0..values.nrows())
      .map(|i| start + chrono::Duration::hours(i as i64))
      .collect();
    let symbols = vec!["BTC".to_string(), "ETH".to_string(), "LTC".to_string()];
    let matrix = ReturnMatrix::new(timestamps, symbols, values).unwrap();

    let path = dir.join("perp_return.csv");
    ReturnSeriesRepository::new(&path, vec![])
      .save(&matrix)
      .unwrap();
    path
  }

  fn diverse_returns() -> Array2<f64> {
    ndarray::array![
      [0.012, -0.008, 0.003],
      [-0.007, 0.011, -0.002],
      [0.004, 0.002, 0.009],
      [-0.003, -0.005, -0.006],
      [0.008, 0.006, 0.001],
      [-0.002, 0.004, -0.004],
    ]
  }

  #[test]
  fn batch_run_produces_both_paradigms() {
    let dir = tempfile::tempdir().unwrap();
    let data_path = write_return_csv(dir.path(), diverse_returns());

    let config = PipelineConfig {
      data_path,
      result_dir: dir.path().join("result"),
      ..PipelineConfig::default()
    };
    let report = run(&config).unwrap();

    let names: Vec<_> = report.outcomes().iter().map(|o| o.name).collect();
    assert_eq!(names, vec!["MeanVariance", "RiskParity"]);
    assert!(dir.path().join("result/MeanVariance_weights.json").exists());
    assert!(dir.path().join("result/RiskParity_weights.json").exists());
  }

  #[test]
  fn failed_optimizer_yields_partial_report() {
    let dir = tempfile::tempdir().unwrap();
    let data_path = write_return_csv(dir.path(), diverse_returns());

    // Poison only the risk-parity paradigm via an inadmissible decay.
    let config = PipelineConfig {
      data_path,
      result_dir: dir.path().join("result"),
      risk_parity: RiskParityConfig {
        decay: 2.0,
        ..RiskParityConfig::default()
      },
      ..PipelineConfig::default()
    };
    let report = run(&config).unwrap();

    let names: Vec<_> = report.outcomes().iter().map(|o| o.name).collect();
    assert_eq!(names, vec!["MeanVariance"]);
  }

  #[test]
  fn missing_data_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig {
      data_path: dir.path().join("absent.csv"),
      result_dir: dir.path().join("result"),
      ..PipelineConfig::default()
    };
    assert!(run(&config).is_err());
  }
}
