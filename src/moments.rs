//! # Moment Estimation
//!
//! $$
//! \hat\Sigma_{ij} = \sum_{t} \lambda_t (r_{ti}-\bar r_i)(r_{tj}-\bar r_j)
//! $$
//!
//! Mean vector and covariance matrix estimators over a return matrix.

use nalgebra::DMatrix;
use ndarray::Array1;
use ndarray::Array2;

use crate::error::OptimizationError;
use crate::returns::ReturnMatrix;

/// Mean-return vector and covariance matrix for one return matrix.
///
/// Estimated once at optimizer construction and never mutated afterward.
#[derive(Clone, Debug)]
pub struct MomentEstimates {
  /// Per-symbol mean period return, in matrix column order.
  pub mean: Array1<f64>,
  /// Symmetric covariance matrix of period returns.
  pub cov: Array2<f64>,
}

impl MomentEstimates {
  /// Plain historical mean and unbiased (n-1) sample covariance.
  pub fn sample(matrix: &ReturnMatrix) -> Self {
    let mean = column_means(matrix);
    let n = matrix.n_assets();
    let t = matrix.n_obs();
    let values = matrix.values();

    let mut cov = Array2::zeros((n, n));
    for i in 0..n {
      for j in i..n {
        let mut acc = 0.0;
        for row in 0..t {
          acc += (values[[row, i]] - mean[i]) * (values[[row, j]] - mean[j]);
        }
        let c = acc / (t - 1) as f64;
        cov[[i, j]] = c;
        cov[[j, i]] = c;
      }
    }

    Self { mean, cov }
  }

  /// Plain historical mean with an exponentially weighted covariance.
  ///
  /// The observation `k` periods in the past carries weight proportional
  /// to `(1 - decay) * decay^k`, normalized over the window, so recent
  /// observations dominate. `decay` must lie strictly inside (0, 1).
  pub fn exp_weighted(
    matrix: &ReturnMatrix,
    decay: f64,
  ) -> Result<Self, OptimizationError> {
    if !(0.0 < decay && decay < 1.0) {
      return Err(OptimizationError::InvalidParameter(format!(
        "covariance decay must lie in (0, 1), got {decay}"
      )));
    }

    let mean = column_means(matrix);
    let n = matrix.n_assets();
    let t = matrix.n_obs();
    let values = matrix.values();

    // Row t - 1 is the most recent observation.
    let mut lambdas: Vec<f64> = (0..t)
      .map(|row| (1.0 - decay) * decay.powi((t - 1 - row) as i32))
      .collect();
    let total: f64 = lambdas.iter().sum();
    for l in &mut lambdas {
      *l /= total;
    }

    let mut cov = Array2::zeros((n, n));
    for i in 0..n {
      for j in i..n {
        let mut acc = 0.0;
        for row in 0..t {
          acc += lambdas[row] * (values[[row, i]] - mean[i]) * (values[[row, j]] - mean[j]);
        }
        cov[[i, j]] = acc;
        cov[[j, i]] = acc;
      }
    }

    Ok(Self { mean, cov })
  }

  /// Number of assets covered by these estimates.
  pub fn n_assets(&self) -> usize {
    self.mean.len()
  }

  /// Probe the covariance for positive definiteness via Cholesky.
  ///
  /// A rank-deficient or near-singular covariance admits no stable
  /// allocation, so both optimizers reject it up front instead of
  /// emitting unstable weights. The diagonal is shifted down by a
  /// relative tolerance before factorization so that an exactly singular
  /// matrix cannot pass on rounding noise alone.
  pub fn ensure_positive_definite(&self) -> Result<(), OptimizationError> {
    let n = self.n_assets();
    if self.cov.iter().any(|v| !v.is_finite()) {
      return Err(OptimizationError::SingularCovariance);
    }

    let max_diag = (0..n).map(|i| self.cov[[i, i]]).fold(0.0, f64::max);
    if max_diag <= 0.0 {
      return Err(OptimizationError::SingularCovariance);
    }

    let shift = max_diag * 1e-10;
    let shifted = DMatrix::from_fn(n, n, |i, j| {
      self.cov[[i, j]] - if i == j { shift } else { 0.0 }
    });
    if shifted.cholesky().is_none() {
      return Err(OptimizationError::SingularCovariance);
    }
    Ok(())
  }
}

fn column_means(matrix: &ReturnMatrix) -> Array1<f64> {
  let n = matrix.n_assets();
  let t = matrix.n_obs();
  let values = matrix.values();

  let mut mean = Array1::zeros(n);
  for col in 0..n {
    let mut acc = 0.0;
    for row in 0..t {
      acc += values[[row, col]];
    }
    mean[col] = acc / t as f64;
  }
  mean
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use chrono::NaiveDate;
  use ndarray::array;

  use super::*;

  fn matrix_from(values: Array2<f64>) -> ReturnMatrix {
    let start = NaiveDate::from_ymd_opt(2023, 9, 1)
      .unwrap()
      .and_hms_opt(0, 0, 0)
      .unwrap();
    let timestamps = (0..values.nrows())
      .map(|i| start + chrono::Duration::hours(i as i64))
      .collect();
    let symbols = (0..values.ncols()).map(|i| format!("A{i}")).collect();
    ReturnMatrix::new(timestamps, symbols, values).unwrap()
  }

  #[test]
  fn sample_moments_match_hand_computation() {
    let matrix = matrix_from(array![[0.01, 0.02], [0.03, -0.02], [0.02, 0.0]]);
    let moments = MomentEstimates::sample(&matrix);

    assert_abs_diff_eq!(moments.mean[0], 0.02, epsilon = 1e-12);
    assert_abs_diff_eq!(moments.mean[1], 0.0, epsilon = 1e-12);
    // var(A0) = (1e-4 + 1e-4) / 2
    assert_abs_diff_eq!(moments.cov[[0, 0]], 1e-4, epsilon = 1e-12);
    // cov(A0, A1) = ((-0.01)(0.02) + (0.01)(-0.02) + 0) / 2
    assert_abs_diff_eq!(moments.cov[[0, 1]], -2e-4, epsilon = 1e-12);
    assert_abs_diff_eq!(moments.cov[[0, 1]], moments.cov[[1, 0]], epsilon = 1e-15);
  }

  #[test]
  fn ewma_weights_are_normalized() {
    let matrix = matrix_from(array![
      [0.01, -0.01],
      [0.02, 0.01],
      [-0.01, 0.02],
      [0.0, -0.02]
    ]);
    let sample = MomentEstimates::sample(&matrix);
    let ewma = MomentEstimates::exp_weighted(&matrix, 0.94).unwrap();

    // Same centering, so a constant-weight limit reproduces the biased
    // sample covariance scale; here we only require finite, symmetric
    // output of the right shape.
    assert_eq!(ewma.cov.dim(), sample.cov.dim());
    for i in 0..2 {
      for j in 0..2 {
        assert!(ewma.cov[[i, j]].is_finite());
        assert_abs_diff_eq!(ewma.cov[[i, j]], ewma.cov[[j, i]], epsilon = 1e-15);
      }
    }
    assert!(ewma.cov[[0, 0]] > 0.0);
    assert!(ewma.cov[[1, 1]] > 0.0);
  }

  #[test]
  fn ewma_rejects_decay_outside_unit_interval() {
    let matrix = matrix_from(array![[0.01, 0.02], [0.03, -0.02]]);
    assert!(matches!(
      MomentEstimates::exp_weighted(&matrix, 1.0),
      Err(OptimizationError::InvalidParameter(_))
    ));
    assert!(matches!(
      MomentEstimates::exp_weighted(&matrix, 0.0),
      Err(OptimizationError::InvalidParameter(_))
    ));
  }

  #[test]
  fn ewma_upweights_recent_observations() {
    // Large move in the most recent row should dominate the EWMA variance
    // relative to the equally weighted sample variance.
    let matrix = matrix_from(array![
      [0.001, 0.001],
      [0.001, -0.001],
      [-0.001, 0.001],
      [0.05, 0.001]
    ]);
    let sample = MomentEstimates::sample(&matrix);
    let ewma = MomentEstimates::exp_weighted(&matrix, 0.5).unwrap();
    assert!(ewma.cov[[0, 0]] > sample.cov[[0, 0]]);
  }

  #[test]
  fn cholesky_probe_rejects_duplicated_asset() {
    // Two identical columns give a rank-1 covariance.
    let matrix = matrix_from(array![[0.01, 0.01], [0.03, 0.03], [-0.02, -0.02]]);
    let moments = MomentEstimates::sample(&matrix);
    assert!(matches!(
      moments.ensure_positive_definite(),
      Err(OptimizationError::SingularCovariance)
    ));
  }

  #[test]
  fn cholesky_probe_accepts_full_rank_covariance() {
    let matrix = matrix_from(array![[0.01, -0.02], [0.03, 0.01], [-0.02, 0.02]]);
    let moments = MomentEstimates::sample(&matrix);
    assert!(moments.ensure_positive_definite().is_ok());
  }
}
