//! # Performance Diagnostics
//!
//! $$
//! \text{Sharpe} = \frac{\mu_p \cdot f}{\sqrt{\mathbf{w}^\top\Sigma\,\mathbf{w}\cdot f}}
//! $$
//!
//! Annualized return, volatility and Sharpe ratio for a weight vector.

use serde::Deserialize;
use serde::Serialize;

use crate::error::DomainError;
use crate::moments::MomentEstimates;
use crate::optimizer::AssetWeights;

/// Sampling frequency of the return series, fixing the annualization
/// factor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SamplingFrequency {
  #[default]
  Hourly,
  Daily,
  Weekly,
}

impl SamplingFrequency {
  /// Parse a sampling frequency from a feed-style interval string.
  pub fn from_str(s: &str) -> Self {
    match s.to_lowercase().as_str() {
      "1d" | "daily" | "day" => Self::Daily,
      "1w" | "weekly" | "week" => Self::Weekly,
      _ => Self::Hourly,
    }
  }

  /// Periods per year implied by the frequency.
  pub fn periods_per_year(self) -> f64 {
    match self {
      Self::Hourly => 24.0 * 365.0,
      Self::Daily => 365.0,
      Self::Weekly => 52.0,
    }
  }
}

/// Annualized diagnostics for one weight vector.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct PerformanceRecord {
  pub annual_return: f64,
  pub annual_volatility: f64,
  pub sharpe: f64,
}

/// Annualize portfolio return and volatility and derive the Sharpe ratio.
///
/// Pure and deterministic; fails only on a degenerate volatility
/// denominator, so no non-finite value ever leaves this function.
pub fn analyze_performance(
  moments: &MomentEstimates,
  weights: &AssetWeights,
  periods_per_year: f64,
) -> Result<PerformanceRecord, DomainError> {
  let w = weights.values();
  let annual_return = moments.mean.dot(w) * periods_per_year;
  let variance = w.dot(&moments.cov.dot(w)) * periods_per_year;
  let annual_volatility = variance.max(0.0).sqrt();

  if annual_volatility < 1e-12 {
    return Err(DomainError::DegenerateVolatility);
  }

  Ok(PerformanceRecord {
    annual_return,
    annual_volatility,
    sharpe: annual_return / annual_volatility,
  })
}
