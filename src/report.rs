//! # Weights Report
//!
//! Keyed weight-record persistence and side-by-side comparison tables for
//! the allocation paradigms. Aggregation and formatting only.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use prettytable::Cell;
use prettytable::Row;
use prettytable::Table;
use serde_json::json;
use serde_json::Value;
use tracing::info;

use crate::error::PerpallocError;
use crate::error::Result;
use crate::optimizer::AssetWeights;
use crate::optimizer::OptimizerOutcome;

/// Persist a weight record as a flat `{symbol: weight}` JSON object under
/// `<dir>/<name>_weights.json`, creating `dir` if needed.
pub fn save_weights(dir: &Path, name: &str, weights: &AssetWeights) -> Result<PathBuf> {
  fs::create_dir_all(dir).map_err(|e| PerpallocError::io(dir, e))?;
  let path = dir.join(format!("{name}_weights.json"));

  let mut record = serde_json::Map::new();
  for (symbol, weight) in weights.iter() {
    record.insert(symbol.to_string(), json!(weight));
  }
  let body = serde_json::to_string_pretty(&Value::Object(record))?;
  fs::write(&path, body).map_err(|e| PerpallocError::io(&path, e))?;

  Ok(path)
}

/// Read a weight record written by [`save_weights`].
///
/// Symbols come back sorted; values survive within floating-point
/// round-trip accuracy. Non-numeric entries fail deserialization.
pub fn load_weights(path: &Path) -> Result<AssetWeights> {
  let body = fs::read_to_string(path).map_err(|e| PerpallocError::io(path, e))?;
  let record: BTreeMap<String, f64> = serde_json::from_str(&body)?;

  let mut symbols = Vec::with_capacity(record.len());
  let mut values = Vec::with_capacity(record.len());
  for (symbol, weight) in record {
    symbols.push(symbol);
    values.push(weight);
  }

  Ok(AssetWeights::new(symbols, values.into()))
}

/// Side-by-side comparison of optimizer outcomes.
///
/// Tolerates partial input: a failed optimizer simply contributes no
/// column.
#[derive(Debug, Default)]
pub struct WeightsReport {
  outcomes: Vec<OptimizerOutcome>,
}

impl WeightsReport {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push(&mut self, outcome: OptimizerOutcome) {
    info!(optimizer = outcome.name, "added outcome to report");
    self.outcomes.push(outcome);
  }

  pub fn outcomes(&self) -> &[OptimizerOutcome] {
    &self.outcomes
  }

  pub fn is_empty(&self) -> bool {
    self.outcomes.is_empty()
  }

  /// Weights table: rows = symbols, columns = optimizer names.
  pub fn weights_table(&self) -> Table {
    let mut table = Table::new();

    let mut header = vec![Cell::new("symbol")];
    header.extend(self.outcomes.iter().map(|o| Cell::new(o.name)));
    table.set_titles(Row::new(header));

    for symbol in self.symbol_union() {
      let mut cells = vec![Cell::new(&symbol)];
      for outcome in &self.outcomes {
        let text = match outcome.weights.get(&symbol) {
          Some(w) => format!("{w:.6}"),
          None => "-".to_string(),
        };
        cells.push(Cell::new(&text));
      }
      table.add_row(Row::new(cells));
    }

    table
  }

  /// Performance table: rows = metrics, columns = optimizer names.
  ///
  /// A degenerate Sharpe ratio renders as `undefined` rather than a
  /// non-finite number.
  pub fn performance_table(&self) -> Table {
    let mut table = Table::new();

    let mut header = vec![Cell::new("metric")];
    header.extend(self.outcomes.iter().map(|o| Cell::new(o.name)));
    table.set_titles(Row::new(header));

    let metrics: [(&str, fn(&crate::performance::PerformanceRecord) -> f64); 3] = [
      ("Annualized Return", |p| p.annual_return),
      ("Annualized Volatility", |p| p.annual_volatility),
      ("Sharpe Ratio", |p| p.sharpe),
    ];

    for (label, extract) in metrics {
      let mut cells = vec![Cell::new(label)];
      for outcome in &self.outcomes {
        let text = match &outcome.performance {
          Some(record) => format!("{:.6}", extract(record)),
          None => "undefined".to_string(),
        };
        cells.push(Cell::new(&text));
      }
      table.add_row(Row::new(cells));
    }

    table
  }

  /// Render both comparison tables for terminal output.
  pub fn render(&self) -> String {
    if self.is_empty() {
      return "no optimizer produced a result\n".to_string();
    }
    format!(
      "------ Asset Weights ------\n{}\n------ Strategy Performance ------\n{}",
      self.weights_table(),
      self.performance_table()
    )
  }

  fn symbol_union(&self) -> Vec<String> {
    let mut symbols: Vec<String> = Vec::new();
    for outcome in &self.outcomes {
      for symbol in outcome.weights.symbols() {
        if !symbols.contains(symbol) {
          symbols.push(symbol.clone());
        }
      }
    }
    symbols
  }
}
