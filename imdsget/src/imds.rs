use anyhow::{Context, Result};
use reqwest::Client as HttpClient;
use serde_json::{Map, Value};
use tokio::time::Duration;
use tracing::{debug, trace, warn};

use crate::output;

/// Link-local address of the instance metadata service
pub const DEFAULT_ENDPOINT: &str = "http://169.254.169.254";

/// Lifetime requested for session tokens (6 hours)
pub const DEFAULT_TOKEN_TTL: u64 = 21600;

/// Per-request timeout in seconds
pub const DEFAULT_TIMEOUT: u64 = 5;

const TOKEN_PATH: &str = "latest/api/token";
const METADATA_PATH: &str = "latest/meta-data/";

const TOKEN_TTL_HEADER: &str = "X-aws-ec2-metadata-token-ttl-seconds";
const TOKEN_HEADER: &str = "X-aws-ec2-metadata-token";

pub const TOKEN_ERROR: &str = "Failed to fetch IMDSv2 token";

/// An IMDSv2 client
///
/// A new session token is requested for every call to [`Client::get_metadata`]
#[derive(Debug, Clone)]
pub struct Client {
  http: HttpClient,
  token_url: String,
  metadata_url: String,
  token_ttl: u64,
  timeout: Duration,
}

impl Client {
  /// Create a client for the given endpoint (scheme and host, e.g. `http://169.254.169.254`)
  pub fn new(endpoint: &str, token_ttl: u64, timeout: Duration) -> Result<Self> {
    let http = HttpClient::builder().build().context("Failed to build HTTP client")?;
    let endpoint = endpoint.trim_end_matches('/');

    Ok(Self {
      http,
      token_url: format!("{endpoint}/{TOKEN_PATH}"),
      metadata_url: format!("{endpoint}/{METADATA_PATH}"),
      token_ttl,
      timeout,
    })
  }

  /// Request a new IMDSv2 session token
  ///
  /// Any failure, including an empty response body, yields `None`
  pub async fn fetch_token(&self) -> Option<String> {
    debug!("Requesting session token from {}", self.token_url);
    let response = self
      .http
      .put(&self.token_url)
      .header(TOKEN_TTL_HEADER, self.token_ttl.to_string())
      .timeout(self.timeout)
      .send()
      .await
      .and_then(|rsp| rsp.error_for_status());

    let token = match response {
      Ok(rsp) => rsp.text().await,
      Err(err) => {
        warn!("Token request failed: {err}");
        return None;
      }
    };

    match token {
      Ok(token) if !token.is_empty() => Some(token),
      Ok(_) => {
        warn!("Token endpoint returned an empty token");
        None
      }
      Err(err) => {
        warn!("Unable to read token response: {err}");
        None
      }
    }
  }

  /// Fetch instance metadata, rendered as JSON
  ///
  /// With a key, returns `{key: value}`. Without a key (or with an empty one), every top-level
  /// key listed at the metadata root is fetched in turn and returned as a single object.
  /// Failures are rendered as `{"Error": "..."}`; a single failed key aborts the whole listing.
  pub async fn get_metadata(&self, key: Option<&str>) -> String {
    let token = match self.fetch_token().await {
      Some(token) => token,
      None => return output::error_value(TOKEN_ERROR),
    };

    let result = match key.filter(|k| !k.is_empty()) {
      Some(key) => self.get_key(&token, key).await,
      None => self.get_all(&token).await,
    };

    match result.and_then(|metadata| output::to_string_pretty(&metadata)) {
      Ok(rendered) => rendered,
      Err(err) => {
        warn!("Metadata request failed: {err:#}");
        output::error_value(format!("{err:#}"))
      }
    }
  }

  /// Fetch a single key, failing on a non-success status
  async fn get_key(&self, token: &str, key: &str) -> Result<Map<String, Value>> {
    let url = format!("{}{key}", self.metadata_url);
    let body = self
      .get(token, &url)
      .await?
      .error_for_status()?
      .text()
      .await
      .with_context(|| format!("Unable to read response body from {url}"))?;

    let mut metadata = Map::new();
    metadata.insert(key.to_owned(), Value::String(body));

    Ok(metadata)
  }

  /// List the metadata root and fetch each listed key
  ///
  /// Sub-key bodies are taken as returned, regardless of status
  async fn get_all(&self, token: &str) -> Result<Map<String, Value>> {
    let listing = self
      .get(token, &self.metadata_url)
      .await?
      .error_for_status()?
      .text()
      .await
      .with_context(|| format!("Unable to read response body from {}", self.metadata_url))?;

    let keys: Vec<&str> = listing.split('\n').collect();
    debug!("Discovered {} metadata keys", keys.len());

    let mut metadata = Map::new();
    for key in keys {
      let url = format!("{}{key}", self.metadata_url);
      let body = self
        .get(token, &url)
        .await?
        .text()
        .await
        .with_context(|| format!("Unable to read response body from {url}"))?;
      metadata.insert(key.to_owned(), Value::String(body));
    }

    Ok(metadata)
  }

  async fn get(&self, token: &str, url: &str) -> Result<reqwest::Response> {
    debug!("Requesting {url}");
    let response = self
      .http
      .get(url)
      .header(TOKEN_HEADER, token)
      .timeout(self.timeout)
      .send()
      .await?;
    trace!("IMDS response: {response:?}");

    Ok(response)
  }
}
