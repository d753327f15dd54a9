//! # Risk-Parity Optimizer
//!
//! $$
//! RC_i(\mathbf{w}) = \frac{w_i\,(\Sigma\mathbf{w})_i}{\sqrt{\mathbf{w}^\top\Sigma\mathbf{w}}},
//! \qquad RC_1 = \dots = RC_n
//! $$
//!
//! Equal-risk-contribution allocation on the long-only simplex, with an
//! exponentially weighted covariance estimate.

use std::sync::Arc;

use ndarray::Array1;
use ndarray::Array2;
use serde::Deserialize;
use serde::Serialize;

use super::AssetWeights;
use super::Optimizer;
use crate::error::OptimizationError;
use crate::moments::MomentEstimates;
use crate::returns::ReturnMatrix;

/// Static parameters for [`RiskParityOptimizer`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RiskParityConfig {
  /// Exponential decay factor for the covariance estimate.
  pub decay: f64,
  /// Risk-free rate used for contribution accounting.
  pub risk_free: f64,
  /// Convergence tolerance on the maximum pairwise contribution gap.
  pub tolerance: f64,
  /// Coordinate-cycle iteration budget.
  pub max_iters: u64,
}

impl Default for RiskParityConfig {
  fn default() -> Self {
    Self {
      decay: 0.94,
      risk_free: 0.0,
      tolerance: 1e-6,
      max_iters: 10_000,
    }
  }
}

/// Equal-risk-contribution allocator.
///
/// Owns its moment estimates; the return matrix is shared read-only.
#[derive(Clone, Debug)]
pub struct RiskParityOptimizer {
  returns: Arc<ReturnMatrix>,
  config: RiskParityConfig,
  moments: MomentEstimates,
}

impl RiskParityOptimizer {
  /// Estimate exponentially weighted moments over `returns` and prepare a
  /// single-run optimizer.
  pub fn new(
    returns: Arc<ReturnMatrix>,
    config: RiskParityConfig,
  ) -> Result<Self, OptimizationError> {
    let moments = MomentEstimates::exp_weighted(&returns, config.decay)?;
    Ok(Self {
      returns,
      config,
      moments,
    })
  }

  /// Borrow optimizer configuration.
  pub fn config(&self) -> &RiskParityConfig {
    &self.config
  }
}

impl Optimizer for RiskParityOptimizer {
  fn name(&self) -> &'static str {
    "RiskParity"
  }

  fn symbols(&self) -> &[String] {
    self.returns.symbols()
  }

  fn moments(&self) -> &MomentEstimates {
    &self.moments
  }

  /// Cyclical coordinate updates from the equal-weight start.
  ///
  /// With every other coordinate held fixed, the first-order condition for
  /// `x_i` is the quadratic `a_i x_i^2 + c_i x_i - b sigma_p = 0` with
  /// `a_i = Sigma_ii` and `c_i = (Sigma x)_i - a_i x_i`; its positive root
  /// keeps the iterate strictly positive. The iteration runs on the
  /// unnormalized system, whose fixed point has unit volatility; the
  /// convergence check and the returned weights use the unit-sum
  /// projection, where equal contributions are scale invariant.
  fn solve(&self) -> Result<AssetWeights, OptimizationError> {
    self.moments.ensure_positive_definite()?;

    let cov = &self.moments.cov;
    let n = self.moments.n_assets();
    let budget = 1.0 / n as f64;

    let mut x = Array1::from_elem(n, budget);
    let mut residual = f64::INFINITY;

    for _ in 0..self.config.max_iters {
      for i in 0..n {
        let sigma_x = cov.dot(&x);
        let sigma_p = x.dot(&sigma_x).max(0.0).sqrt();
        let a = cov[[i, i]];
        let c = sigma_x[i] - a * x[i];
        x[i] = (-c + (c * c + 4.0 * a * budget * sigma_p).sqrt()) / (2.0 * a);
      }

      let total = x.sum();
      let w = x.mapv(|v| v / total);

      residual = contribution_gap(cov, &w);
      if residual < self.config.tolerance {
        return Ok(AssetWeights::new(self.returns.symbols().to_vec(), w));
      }
    }

    Err(OptimizationError::NotConverged {
      max_iters: self.config.max_iters,
      residual,
    })
  }
}

/// Per-asset risk contributions `w_i (Sigma w)_i / sigma_p`.
///
/// Their sum equals total portfolio volatility by construction.
pub fn risk_contributions(cov: &Array2<f64>, weights: &Array1<f64>) -> Array1<f64> {
  let sigma_w = cov.dot(weights);
  let sigma_p = weights.dot(&sigma_w).max(0.0).sqrt();
  if sigma_p < f64::EPSILON {
    return Array1::zeros(weights.len());
  }
  (weights * &sigma_w) / sigma_p
}

fn contribution_gap(cov: &Array2<f64>, weights: &Array1<f64>) -> f64 {
  let rc = risk_contributions(cov, weights);
  let max = rc.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
  let min = rc.iter().cloned().fold(f64::INFINITY, f64::min);
  max - min
}
