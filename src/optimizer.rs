//! # Allocation Optimizers
//!
//! $$
//! \mathbf{w}^\* = \arg\max_{\mathbf{w}\in\mathcal{C}} U(\mathbf{w};\mu,\Sigma)
//! $$
//!
//! Capability contract shared by the allocation paradigms, plus the weight
//! containers they produce.

pub mod mean_variance;
pub mod risk_parity;

use std::path::Path;

use ndarray::Array1;
use tracing::info;
use tracing::warn;

use crate::error::OptimizationError;
use crate::error::Result;
use crate::moments::MomentEstimates;
use crate::performance::analyze_performance;
use crate::performance::PerformanceRecord;
use crate::report::save_weights;

pub use mean_variance::MeanVarianceConfig;
pub use mean_variance::MeanVarianceOptimizer;
pub use risk_parity::RiskParityConfig;
pub use risk_parity::RiskParityOptimizer;

/// Weight vector keyed by symbol, in return-matrix column order.
///
/// Created once per optimizer run and immutable afterward.
#[derive(Clone, Debug)]
pub struct AssetWeights {
  symbols: Vec<String>,
  weights: Array1<f64>,
}

impl AssetWeights {
  pub fn new(symbols: Vec<String>, weights: Array1<f64>) -> Self {
    debug_assert_eq!(symbols.len(), weights.len());
    Self { symbols, weights }
  }

  /// Symbols in weight order.
  pub fn symbols(&self) -> &[String] {
    &self.symbols
  }

  /// Raw weight vector.
  pub fn values(&self) -> &Array1<f64> {
    &self.weights
  }

  /// Weight for one symbol, if allocated.
  pub fn get(&self, symbol: &str) -> Option<f64> {
    let idx = self.symbols.iter().position(|s| s == symbol)?;
    Some(self.weights[idx])
  }

  /// Iterate `(symbol, weight)` pairs in order.
  pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
    self
      .symbols
      .iter()
      .map(String::as_str)
      .zip(self.weights.iter().copied())
  }

  /// Sum of weights.
  pub fn total(&self) -> f64 {
    self.weights.sum()
  }

  pub fn len(&self) -> usize {
    self.weights.len()
  }

  pub fn is_empty(&self) -> bool {
    self.weights.is_empty()
  }
}

/// Everything one optimizer run produces.
///
/// `performance` is `None` when the diagnostics hit a degenerate domain
/// condition; the report renders that cell as undefined instead of
/// propagating a non-finite value.
#[derive(Clone, Debug)]
pub struct OptimizerOutcome {
  pub name: &'static str,
  pub weights: AssetWeights,
  pub performance: Option<PerformanceRecord>,
}

/// Capability contract implemented by each allocation paradigm.
///
/// An optimizer estimates its own moments at construction and owns them;
/// no state is shared between optimizer instances. `run` consumes the
/// optimizer, so a second run on the same instance is unrepresentable.
pub trait Optimizer {
  /// Paradigm name, used for persisted records and report columns.
  fn name(&self) -> &'static str;

  /// Symbols in weight order.
  fn symbols(&self) -> &[String];

  /// Moment estimates this optimizer solves against.
  fn moments(&self) -> &MomentEstimates;

  /// Solve for the allocation weights.
  fn solve(&self) -> std::result::Result<AssetWeights, OptimizationError>;

  /// Solve, persist the weight record, and derive performance diagnostics.
  fn run(self, result_dir: &Path, periods_per_year: f64) -> Result<OptimizerOutcome>
  where
    Self: Sized,
  {
    let weights = self.solve()?;
    let path = save_weights(result_dir, self.name(), &weights)?;
    info!(optimizer = self.name(), path = %path.display(), "persisted asset weights");

    let performance = match analyze_performance(self.moments(), &weights, periods_per_year) {
      Ok(record) => Some(record),
      Err(err) => {
        warn!(optimizer = self.name(), %err, "performance diagnostics undefined");
        None
      }
    };

    Ok(OptimizerOutcome {
      name: self.name(),
      weights,
      performance,
    })
  }
}

#[cfg(test)]
mod tests {
  use ndarray::array;

  use super::*;

  #[test]
  fn weights_lookup_by_symbol() {
    let weights = AssetWeights::new(
      vec!["BTC".into(), "ETH".into()],
      array![0.6, 0.4],
    );
    assert_eq!(weights.get("ETH"), Some(0.4));
    assert_eq!(weights.get("XRP"), None);
    assert!((weights.total() - 1.0).abs() < 1e-12);
  }

  #[test]
  fn weights_iterate_in_order() {
    let weights = AssetWeights::new(
      vec!["BTC".into(), "ETH".into(), "LTC".into()],
      array![0.5, 0.3, 0.2],
    );
    let pairs: Vec<_> = weights.iter().collect();
    assert_eq!(pairs[0], ("BTC", 0.5));
    assert_eq!(pairs[2], ("LTC", 0.2));
  }
}
