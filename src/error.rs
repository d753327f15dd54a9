//! # Errors
//!
//! Error taxonomy for return-series ingestion, optimization and
//! performance diagnostics.

use std::path::PathBuf;

use thiserror::Error;

/// Malformed or incomplete return-series input.
#[derive(Error, Debug)]
pub enum FormatError {
  /// A required symbol column is absent from the persisted series.
  #[error("missing symbol column '{0}' in return series")]
  MissingSymbol(String),

  /// A cell could not be parsed as a floating point return.
  #[error("non-numeric return for '{symbol}' at row {row}: '{value}'")]
  NonNumericCell {
    symbol: String,
    row: usize,
    value: String,
  },

  /// A parsed cell is NaN or infinite.
  #[error("non-finite return for '{symbol}' at row {row}")]
  NonFiniteCell { symbol: String, row: usize },

  /// The timestamp index could not be parsed.
  #[error("invalid timestamp '{value}' at row {row}")]
  InvalidTimestamp { value: String, row: usize },

  /// Timestamps must be strictly increasing.
  #[error("timestamps not strictly increasing at row {row}")]
  UnorderedTimestamps { row: usize },

  /// Covariance needs at least two observations.
  #[error("return matrix has {0} observation(s), need at least 2")]
  TooFewObservations(usize),

  /// Covariance needs at least two symbols.
  #[error("return matrix has {0} symbol(s), need at least 2")]
  TooFewSymbols(usize),

  /// Row length disagrees with the header.
  #[error("row {row} has {got} cells, header has {expected}")]
  RaggedRow {
    row: usize,
    got: usize,
    expected: usize,
  },
}

/// Solver failed to converge or the problem is infeasible.
#[derive(Error, Debug)]
pub enum OptimizationError {
  /// Covariance matrix is rank deficient; no stable solution exists.
  #[error("covariance matrix is singular or not positive definite")]
  SingularCovariance,

  /// Iteration budget exhausted before the convergence criterion was met.
  #[error("no convergence within {max_iters} iterations (residual {residual:.3e})")]
  NotConverged { max_iters: u64, residual: f64 },

  /// Constraints cannot be satisfied.
  #[error("infeasible allocation problem: {0}")]
  Infeasible(String),

  /// The underlying numerical solver reported an error.
  #[error("solver error: {0}")]
  Solver(String),

  /// A configuration parameter is outside its admissible range.
  #[error("invalid parameter: {0}")]
  InvalidParameter(String),
}

/// Degenerate numeric condition in performance analysis.
#[derive(Error, Debug)]
pub enum DomainError {
  /// Zero portfolio volatility leaves the Sharpe ratio undefined.
  #[error("portfolio volatility is zero, Sharpe ratio undefined")]
  DegenerateVolatility,
}

/// Crate-level roll-up of the error taxonomy plus I/O failures.
#[derive(Error, Debug)]
pub enum PerpallocError {
  #[error(transparent)]
  Format(#[from] FormatError),

  #[error(transparent)]
  Optimization(#[from] OptimizationError),

  #[error(transparent)]
  Domain(#[from] DomainError),

  /// Persistence failure; fatal, never silently swallowed.
  #[error("i/o error on '{path}': {source}")]
  Io {
    path: PathBuf,
    source: std::io::Error,
  },

  #[error("csv error: {0}")]
  Csv(#[from] csv::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),
}

impl PerpallocError {
  pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    Self::Io {
      path: path.into(),
      source,
    }
  }
}

pub type Result<T> = std::result::Result<T, PerpallocError>;
