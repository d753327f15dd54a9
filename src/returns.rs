//! # Return Series
//!
//! $$
//! r_t = \frac{p_t - p_{t-1}}{p_{t-1}}
//! $$
//!
//! Time-indexed return matrix and its CSV-backed repository.

use std::path::Path;
use std::path::PathBuf;

use chrono::NaiveDate;
use chrono::NaiveDateTime;
use ndarray::Array2;
use ndarray::ArrayView1;
use tracing::info;

use crate::error::FormatError;
use crate::error::PerpallocError;
use crate::error::Result;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Convert a close-price series to fractional period returns.
///
/// The leading undefined element is dropped, so the output is one shorter
/// than the input. Non-positive prices terminate the usable window.
pub fn pct_change(closes: &[f64]) -> Vec<f64> {
  let mut out = Vec::with_capacity(closes.len().saturating_sub(1));
  for i in 1..closes.len() {
    if closes[i - 1] > 0.0 && closes[i] > 0.0 {
      out.push(closes[i] / closes[i - 1] - 1.0);
    }
  }
  out
}

/// Chronologically indexed, symbol-columned matrix of period returns.
///
/// Immutable after construction and free of non-finite cells, so it can be
/// shared read-only across optimizer runs.
#[derive(Clone, Debug)]
pub struct ReturnMatrix {
  timestamps: Vec<NaiveDateTime>,
  symbols: Vec<String>,
  values: Array2<f64>,
}

impl ReturnMatrix {
  /// Validate and assemble a return matrix.
  ///
  /// Requires at least 2 strictly increasing timestamps and at least 2
  /// symbols, with one finite cell per (timestamp, symbol) pair.
  pub fn new(
    timestamps: Vec<NaiveDateTime>,
    symbols: Vec<String>,
    values: Array2<f64>,
  ) -> std::result::Result<Self, FormatError> {
    if timestamps.len() < 2 {
      return Err(FormatError::TooFewObservations(timestamps.len()));
    }
    if symbols.len() < 2 {
      return Err(FormatError::TooFewSymbols(symbols.len()));
    }
    if values.nrows() != timestamps.len() || values.ncols() != symbols.len() {
      return Err(FormatError::RaggedRow {
        row: values.nrows(),
        got: values.ncols(),
        expected: symbols.len(),
      });
    }

    for row in 1..timestamps.len() {
      if timestamps[row] <= timestamps[row - 1] {
        return Err(FormatError::UnorderedTimestamps { row });
      }
    }

    for ((row, col), &v) in values.indexed_iter() {
      if !v.is_finite() {
        return Err(FormatError::NonFiniteCell {
          symbol: symbols[col].clone(),
          row,
        });
      }
    }

    Ok(Self {
      timestamps,
      symbols,
      values,
    })
  }

  /// Symbols in column order.
  pub fn symbols(&self) -> &[String] {
    &self.symbols
  }

  /// Timestamp index in row order.
  pub fn timestamps(&self) -> &[NaiveDateTime] {
    &self.timestamps
  }

  /// Full matrix, rows = timestamps, columns = symbols.
  pub fn values(&self) -> &Array2<f64> {
    &self.values
  }

  /// Number of observations (rows).
  pub fn n_obs(&self) -> usize {
    self.timestamps.len()
  }

  /// Number of symbols (columns).
  pub fn n_assets(&self) -> usize {
    self.symbols.len()
  }

  /// Return series for one symbol, if present.
  pub fn column(&self, symbol: &str) -> Option<ArrayView1<'_, f64>> {
    let idx = self.symbols.iter().position(|s| s == symbol)?;
    Some(self.values.column(idx))
  }
}

/// CSV-backed store for one return matrix.
///
/// Layout matches the ingestion collaborator's dump: first column is the
/// timestamp index, each further column is one symbol's period return.
#[derive(Clone, Debug)]
pub struct ReturnSeriesRepository {
  path: PathBuf,
  required_symbols: Vec<String>,
}

impl ReturnSeriesRepository {
  /// Repository over `path`, restricted to `required_symbols`.
  ///
  /// An empty symbol list accepts every column in the file.
  pub fn new(path: impl Into<PathBuf>, required_symbols: Vec<String>) -> Self {
    Self {
      path: path.into(),
      required_symbols,
    }
  }

  /// Read and validate the persisted return series.
  ///
  /// Fails with a [`FormatError`] when a required symbol column is absent,
  /// a cell is non-numeric, or the matrix is too small for covariance
  /// estimation. No transformation beyond type coercion is applied.
  pub fn load(&self) -> Result<ReturnMatrix> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(&self.path)?;
    let headers = reader.headers()?.clone();
    let file_symbols: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();

    let selected: Vec<String> = if self.required_symbols.is_empty() {
      file_symbols.clone()
    } else {
      self.required_symbols.clone()
    };

    // Column index in the file for each selected symbol, offset past the
    // timestamp column.
    let mut col_indices = Vec::with_capacity(selected.len());
    for symbol in &selected {
      match file_symbols.iter().position(|s| s == symbol) {
        Some(pos) => col_indices.push(1 + pos),
        None => return Err(FormatError::MissingSymbol(symbol.clone()).into()),
      }
    }

    let mut timestamps = Vec::new();
    let mut cells = Vec::new();

    for (row, record) in reader.records().enumerate() {
      let record = record?;
      if record.len() != headers.len() {
        return Err(
          FormatError::RaggedRow {
            row,
            got: record.len(),
            expected: headers.len(),
          }
          .into(),
        );
      }

      let raw_ts = record.get(0).unwrap_or_default();
      timestamps.push(parse_timestamp(raw_ts, row)?);

      for (&col, symbol) in col_indices.iter().zip(&selected) {
        let raw = record.get(col).unwrap_or_default();
        let value: f64 = raw.trim().parse().map_err(|_| FormatError::NonNumericCell {
          symbol: symbol.clone(),
          row,
          value: raw.to_string(),
        })?;
        cells.push(value);
      }
    }

    let n_rows = timestamps.len();
    let n_cols = selected.len();
    let values = Array2::from_shape_vec((n_rows, n_cols), cells)
      .map_err(|_| FormatError::TooFewObservations(n_rows))?;

    let matrix = ReturnMatrix::new(timestamps, selected, values)?;
    info!(
      path = %self.path.display(),
      n_obs = matrix.n_obs(),
      n_assets = matrix.n_assets(),
      "loaded return series"
    );
    Ok(matrix)
  }

  /// Persist `matrix` verbatim, timestamp index included.
  pub fn save(&self, matrix: &ReturnMatrix) -> Result<()> {
    if let Some(parent) = self.path.parent() {
      if !parent.as_os_str().is_empty() {
        std::fs::create_dir_all(parent).map_err(|e| PerpallocError::io(parent, e))?;
      }
    }

    let mut writer = csv::Writer::from_path(&self.path)?;

    let mut header = vec!["time".to_string()];
    header.extend(matrix.symbols().iter().cloned());
    writer.write_record(&header)?;

    for (row, ts) in matrix.timestamps().iter().enumerate() {
      let mut record = vec![ts.format(TIMESTAMP_FORMAT).to_string()];
      for col in 0..matrix.n_assets() {
        record.push(matrix.values()[[row, col]].to_string());
      }
      writer.write_record(&record)?;
    }

    writer.flush().map_err(|e| PerpallocError::io(&self.path, e))?;
    info!(path = %self.path.display(), "saved return series");
    Ok(())
  }
}

fn parse_timestamp(raw: &str, row: usize) -> std::result::Result<NaiveDateTime, FormatError> {
  let trimmed = raw.trim();
  if let Ok(ts) = NaiveDateTime::parse_from_str(trimmed, TIMESTAMP_FORMAT) {
    return Ok(ts);
  }
  // Daily dumps carry a bare date index.
  if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
    if let Some(ts) = date.and_hms_opt(0, 0, 0) {
      return Ok(ts);
    }
  }
  Err(FormatError::InvalidTimestamp {
    value: raw.to_string(),
    row,
  })
}

#[cfg(test)]
mod tests {
  use ndarray::array;

  use super::*;

  fn hourly_timestamps(n: usize) -> Vec<NaiveDateTime> {
    let start = NaiveDate::from_ymd_opt(2023, 9, 1)
      .unwrap()
      .and_hms_opt(0, 0, 0)
      .unwrap();
    (0..n)
      .map(|i| start + chrono::Duration::hours(i as i64))
      .collect()
  }

  fn sample_matrix() -> ReturnMatrix {
    let values = array![
      [0.010, -0.004, 0.002],
      [-0.006, 0.003, 0.001],
      [0.002, 0.001, -0.005],
      [0.004, -0.002, 0.003],
    ];
    ReturnMatrix::new(
      hourly_timestamps(4),
      vec!["BTC".into(), "ETH".into(), "LTC".into()],
      values,
    )
    .unwrap()
  }

  #[test]
  fn pct_change_drops_leading_element() {
    let returns = pct_change(&[100.0, 110.0, 99.0]);
    assert_eq!(returns.len(), 2);
    assert!((returns[0] - 0.1).abs() < 1e-12);
    assert!((returns[1] + 0.1).abs() < 1e-12);
  }

  #[test]
  fn matrix_rejects_nan_cells() {
    let values = array![[0.01, f64::NAN], [0.02, 0.01]];
    let result = ReturnMatrix::new(
      hourly_timestamps(2),
      vec!["BTC".into(), "ETH".into()],
      values,
    );
    assert!(matches!(result, Err(FormatError::NonFiniteCell { .. })));
  }

  #[test]
  fn matrix_rejects_single_observation() {
    let values = array![[0.01, 0.02]];
    let result = ReturnMatrix::new(
      hourly_timestamps(1),
      vec!["BTC".into(), "ETH".into()],
      values,
    );
    assert!(matches!(result, Err(FormatError::TooFewObservations(1))));
  }

  #[test]
  fn matrix_rejects_single_symbol() {
    let values = array![[0.01], [0.02]];
    let result = ReturnMatrix::new(hourly_timestamps(2), vec!["BTC".into()], values);
    assert!(matches!(result, Err(FormatError::TooFewSymbols(1))));
  }

  #[test]
  fn matrix_rejects_unordered_timestamps() {
    let mut timestamps = hourly_timestamps(3);
    timestamps.swap(1, 2);
    let values = array![[0.01, 0.02], [0.03, 0.04], [0.05, 0.06]];
    let result = ReturnMatrix::new(timestamps, vec!["BTC".into(), "ETH".into()], values);
    assert!(matches!(
      result,
      Err(FormatError::UnorderedTimestamps { .. })
    ));
  }

  #[test]
  fn repository_round_trips_matrix() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("perp_return.csv");
    let repo = ReturnSeriesRepository::new(&path, vec![]);

    let matrix = sample_matrix();
    repo.save(&matrix).unwrap();
    let loaded = repo.load().unwrap();

    assert_eq!(loaded.symbols(), matrix.symbols());
    assert_eq!(loaded.timestamps(), matrix.timestamps());
    assert_eq!(loaded.n_obs(), matrix.n_obs());
    for (a, b) in loaded.values().iter().zip(matrix.values().iter()) {
      assert!((a - b).abs() < 1e-12);
    }
  }

  #[test]
  fn repository_rejects_missing_symbol() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("perp_return.csv");
    ReturnSeriesRepository::new(&path, vec![])
      .save(&sample_matrix())
      .unwrap();

    let repo = ReturnSeriesRepository::new(&path, vec!["BTC".into(), "XRP".into()]);
    let result = repo.load();
    assert!(matches!(
      result,
      Err(PerpallocError::Format(FormatError::MissingSymbol(s))) if s == "XRP"
    ));
  }

  #[test]
  fn repository_projects_required_symbols_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("perp_return.csv");
    ReturnSeriesRepository::new(&path, vec![])
      .save(&sample_matrix())
      .unwrap();

    let repo = ReturnSeriesRepository::new(&path, vec!["LTC".into(), "BTC".into()]);
    let loaded = repo.load().unwrap();
    assert_eq!(loaded.symbols(), &["LTC".to_string(), "BTC".to_string()]);
    assert!((loaded.values()[[0, 0]] - 0.002).abs() < 1e-12);
    assert!((loaded.values()[[0, 1]] - 0.010).abs() < 1e-12);
  }

  #[test]
  fn repository_rejects_non_numeric_cell() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("perp_return.csv");
    std::fs::write(
      &path,
      "time,BTC,ETH\n2023-09-01 00:00:00,0.01,abc\n2023-09-01 01:00:00,0.02,0.01\n",
    )
    .unwrap();

    let repo = ReturnSeriesRepository::new(&path, vec![]);
    assert!(matches!(
      repo.load(),
      Err(PerpallocError::Format(FormatError::NonNumericCell { .. }))
    ));
  }
}
