//! # Mean-Variance Optimizer
//!
//! $$
//! \max_{\mathbf{w}\in[l,u]^n,\ \mathbf{1}^\top\mathbf{w}=1}
//! \ \mathbf{w}^\top\mu - \tfrac{\lambda}{2}\,\mathbf{w}^\top\Sigma\,\mathbf{w}
//! $$
//!
//! Variance-penalized expected-utility allocation with box-bounded weights.

use std::sync::Arc;

use argmin::core::CostFunction;
use argmin::core::Executor;
use argmin::solver::neldermead::NelderMead;
use ndarray::Array1;
use ndarray::Array2;
use serde::Deserialize;
use serde::Serialize;

use super::AssetWeights;
use super::Optimizer;
use crate::error::OptimizationError;
use crate::moments::MomentEstimates;
use crate::returns::ReturnMatrix;

/// Quadratic penalty coefficient keeping the budget constraint tight
/// relative to the utility term.
const BUDGET_PENALTY: f64 = 1e3;

/// Simplex spread tolerance for the Nelder-Mead solve.
const SD_TOLERANCE: f64 = 1e-10;

/// Largest admissible budget violation after renormalization.
const BUDGET_TOLERANCE: f64 = 1e-2;

/// Static parameters for [`MeanVarianceOptimizer`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MeanVarianceConfig {
  /// Risk-aversion coefficient lambda.
  pub risk_aversion: f64,
  /// Per-asset lower weight bound.
  pub lower_bound: f64,
  /// Per-asset upper weight bound.
  pub upper_bound: f64,
  /// Market-neutral allocations target zero net exposure instead of a
  /// unit budget.
  pub market_neutral: bool,
  /// Weights below this magnitude are rounded to exactly zero.
  pub weight_cutoff: f64,
  /// Solver iteration budget.
  pub max_iters: u64,
}

impl Default for MeanVarianceConfig {
  fn default() -> Self {
    Self {
      risk_aversion: 500.0,
      lower_bound: -1.0,
      upper_bound: 1.0,
      market_neutral: false,
      weight_cutoff: 1e-4,
      max_iters: 5000,
    }
  }
}

/// Variance-penalized expected-utility allocator.
///
/// Owns its moment estimates; the return matrix is shared read-only.
#[derive(Clone, Debug)]
pub struct MeanVarianceOptimizer {
  returns: Arc<ReturnMatrix>,
  config: MeanVarianceConfig,
  moments: MomentEstimates,
}

struct QuadraticUtilityCost {
  mean: Array1<f64>,
  cov: Array2<f64>,
  risk_aversion: f64,
  lower: f64,
  upper: f64,
  budget_target: f64,
}

impl QuadraticUtilityCost {
  /// Map raw solver parameters into the weight box via tanh.
  fn to_weights(&self, x: &[f64]) -> Array1<f64> {
    let half_span = 0.5 * (self.upper - self.lower);
    x.iter()
      .map(|&v| self.lower + half_span * (v.tanh() + 1.0))
      .collect()
  }
}

impl CostFunction for QuadraticUtilityCost {
  type Param = Vec<f64>;
  type Output = f64;

  fn cost(&self, x: &Self::Param) -> Result<Self::Output, argmin::core::Error> {
    let w = self.to_weights(x);
    let sigma_w = self.cov.dot(&w);
    let utility = w.dot(&self.mean) - 0.5 * self.risk_aversion * w.dot(&sigma_w);
    let budget_gap = w.sum() - self.budget_target;

    Ok(-utility + BUDGET_PENALTY * budget_gap * budget_gap)
  }
}

impl MeanVarianceOptimizer {
  /// Estimate sample moments over `returns` and prepare a single-run
  /// optimizer.
  pub fn new(returns: Arc<ReturnMatrix>, config: MeanVarianceConfig) -> Self {
    let moments = MomentEstimates::sample(&returns);
    Self {
      returns,
      config,
      moments,
    }
  }

  /// Borrow optimizer configuration.
  pub fn config(&self) -> &MeanVarianceConfig {
    &self.config
  }
}

impl Optimizer for MeanVarianceOptimizer {
  fn name(&self) -> &'static str {
    "MeanVariance"
  }

  fn symbols(&self) -> &[String] {
    self.returns.symbols()
  }

  fn moments(&self) -> &MomentEstimates {
    &self.moments
  }

  fn solve(&self) -> Result<AssetWeights, OptimizationError> {
    self.moments.ensure_positive_definite()?;

    let n = self.moments.n_assets();
    let budget_target = if self.config.market_neutral { 0.0 } else { 1.0 };

    let cost = QuadraticUtilityCost {
      mean: self.moments.mean.clone(),
      cov: self.moments.cov.clone(),
      risk_aversion: self.config.risk_aversion,
      lower: self.config.lower_bound,
      upper: self.config.upper_bound,
      budget_target,
    };

    let x0 = vec![0.0; n];
    let mut simplex = Vec::with_capacity(n + 1);
    simplex.push(x0.clone());
    for i in 0..n {
      let mut point = x0.clone();
      point[i] = 1.0;
      simplex.push(point);
    }

    let solver = NelderMead::new(simplex)
      .with_sd_tolerance(SD_TOLERANCE)
      .map_err(|e| OptimizationError::Solver(e.to_string()))?;

    let res = Executor::new(cost, solver)
      .configure(|state| state.max_iters(self.config.max_iters))
      .run()
      .map_err(|e| OptimizationError::Solver(e.to_string()))?;

    let best_x = res
      .state
      .best_param
      .ok_or_else(|| OptimizationError::Solver("solver produced no parameters".into()))?;

    let half_span = 0.5 * (self.config.upper_bound - self.config.lower_bound);
    let mut weights: Array1<f64> = best_x
      .iter()
      .map(|&v| self.config.lower_bound + half_span * (v.tanh() + 1.0))
      .collect();

    if weights.iter().any(|w| !w.is_finite()) {
      return Err(OptimizationError::Solver("non-finite weight vector".into()));
    }

    let total = weights.sum();
    if self.config.market_neutral {
      if total.abs() > BUDGET_TOLERANCE {
        return Err(OptimizationError::Infeasible(format!(
          "net exposure {total:.4} exceeds market-neutral tolerance"
        )));
      }
    } else {
      // The budget constraint is authoritative: rescale the penalized
      // solution onto the unit-sum hyperplane.
      if total.abs() < 0.5 {
        return Err(OptimizationError::Infeasible(format!(
          "weight sum {total:.4} too degenerate to renormalize"
        )));
      }
      weights.mapv_inplace(|w| w / total);
      let eps = 1e-9;
      if weights
        .iter()
        .any(|&w| w < self.config.lower_bound - eps || w > self.config.upper_bound + eps)
      {
        return Err(OptimizationError::Infeasible(
          "unit-budget renormalization violates weight bounds".into(),
        ));
      }
    }

    clean_weights(&mut weights, self.config.weight_cutoff);

    Ok(AssetWeights::new(self.returns.symbols().to_vec(), weights))
  }
}

/// Round solver noise below `cutoff` to exactly zero.
fn clean_weights(weights: &mut Array1<f64>, cutoff: f64) {
  weights.mapv_inplace(|w| if w.abs() < cutoff { 0.0 } else { w });
}
