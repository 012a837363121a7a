use anyhow::Result;
use clap::Parser;
use clap_verbosity_flag::Verbosity;
use tokio::time::Duration;
use tracing::debug;

use crate::{imds, output};

/// Styles for CLI
fn get_styles() -> clap::builder::Styles {
  clap::builder::Styles::styled()
    .header(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))),
    )
    .literal(
      anstyle::Style::new()
        .bold()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::BrightCyan))),
    )
    .usage(
      anstyle::Style::new()
        .bold()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))),
    )
    .placeholder(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
    )
}

/// Read EC2 instance metadata over IMDSv2 and print it as JSON
///
/// With no key, every top-level metadata key is fetched
#[derive(Debug, Parser)]
#[command(author, about, version)]
#[command(styles=get_styles())]
pub struct Cli {
  /// The metadata key to fetch (e.g. `instance-id` or `placement/region`)
  pub key: Option<String>,

  /// Base URL of the instance metadata service
  #[arg(long, env = "IMDSGET_ENDPOINT", default_value = imds::DEFAULT_ENDPOINT)]
  pub endpoint: String,

  /// Lifetime of the session token, in seconds
  #[arg(long, env = "IMDSGET_TOKEN_TTL", default_value_t = imds::DEFAULT_TOKEN_TTL)]
  pub token_ttl: u64,

  /// Timeout for each request, in seconds
  #[arg(long, env = "IMDSGET_TIMEOUT", default_value_t = imds::DEFAULT_TIMEOUT)]
  pub timeout: u64,

  #[clap(flatten)]
  pub verbose: Verbosity,
}

impl Cli {
  /// Fetch the requested metadata and produce the text to print
  pub async fn run(&self) -> Result<String> {
    let client = imds::Client::new(&self.endpoint, self.token_ttl, Duration::from_secs(self.timeout))?;
    let key = self.key.as_deref();
    debug!("Fetching metadata for key {key:?}");

    let metadata = client.get_metadata(key).await;

    Ok(output::render(key, &metadata))
  }
}
