use std::env;
use std::path::PathBuf;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use perpalloc::pipeline;
use perpalloc::pipeline::PipelineConfig;

/// Batch entry point: `perpalloc [return_csv] [result_dir]`.
fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    )
    .init();

  let mut args = env::args().skip(1);
  let mut config = PipelineConfig::default();
  if let Some(data_path) = args.next() {
    config.data_path = PathBuf::from(data_path);
  }
  if let Some(result_dir) = args.next() {
    config.result_dir = PathBuf::from(result_dir);
  }

  let report = pipeline::run(&config).with_context(|| {
    format!(
      "allocation run failed for '{}'",
      config.data_path.display()
    )
  })?;
  print!("{}", report.render());

  Ok(())
}
