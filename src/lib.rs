//! # Perp Portfolio Allocation Engine
//!
//! `perpalloc` turns a historical return series for a small basket of
//! crypto perpetual-futures instruments into allocation weights under two
//! competing paradigms, then reports comparative diagnostics. It targets a
//! single analyst-style batch run: load returns, optimize, report.
//!
//! ## Modules
//!
//! | Module          | Description                                                           |
//! |-----------------|-----------------------------------------------------------------------|
//! | [`returns`]     | Time-indexed return matrix and its CSV-backed repository.             |
//! | [`moments`]     | Mean/covariance estimation, plain and exponentially weighted.         |
//! | [`optimizer`]   | Mean-variance and risk-parity allocators behind one capability trait. |
//! | [`performance`] | Annualized return, volatility and Sharpe diagnostics.                 |
//! | [`report`]      | Weight-record persistence and side-by-side comparison tables.         |
//! | [`pipeline`]    | Sequential batch orchestration tolerant of per-paradigm failure.      |
//! | [`error`]       | Format, optimization and domain error taxonomy.                       |
//!
//! ## Example Usage
//!
//! ```rust
//! use perpalloc::pipeline::{self, PipelineConfig};
//!
//! let report = pipeline::run(&PipelineConfig::default())?;
//! println!("{}", report.render());
//! ```
//!
//! Price retrieval and chart generation live in external collaborators;
//! this crate consumes their return CSV and emits weight records and
//! tables for them.

pub mod error;
pub mod moments;
pub mod optimizer;
pub mod performance;
pub mod pipeline;
pub mod report;
pub mod returns;

pub use error::DomainError;
pub use error::FormatError;
pub use error::OptimizationError;
pub use error::PerpallocError;
pub use moments::MomentEstimates;
pub use optimizer::AssetWeights;
pub use optimizer::MeanVarianceConfig;
pub use optimizer::MeanVarianceOptimizer;
pub use optimizer::Optimizer;
pub use optimizer::OptimizerOutcome;
pub use optimizer::RiskParityConfig;
pub use optimizer::RiskParityOptimizer;
pub use performance::analyze_performance;
pub use performance::PerformanceRecord;
pub use performance::SamplingFrequency;
pub use report::WeightsReport;
pub use returns::ReturnMatrix;
pub use returns::ReturnSeriesRepository;
