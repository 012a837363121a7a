use std::io;

use anyhow::Result;
use clap::Parser;
use imdsget::Cli;
use tracing_log::AsTrace;
use tracing_subscriber::FmtSubscriber;

#[cfg(not(tarpaulin_include))]
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
  let cli = Cli::parse();
  let subscriber = FmtSubscriber::builder()
    .with_max_level(cli.verbose.log_level_filter().as_trace())
    .with_writer(io::stderr)
    .without_time()
    .finish();
  tracing::subscriber::set_global_default(subscriber)?;

  // Failures are reported as JSON on stdout, never through the exit status
  let output = cli.run().await?;
  println!("{output}");

  Ok(())
}
