//! HTTP(S) source fetching.
//!
//! A single [`reqwest::Client`] is built at startup and shared by every
//! fetch; the per-source timeout is applied on each request.

use crate::error::PipelineError;
use crate::models::RawContent;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Default timeout in seconds for source requests.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const USER_AGENT: &str = concat!("digest_courier/", env!("CARGO_PKG_VERSION"));

/// Build the shared HTTP client.
pub fn build_client() -> Result<Client, PipelineError> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
        .build()
        .map_err(|e| PipelineError::config(format!("failed to build HTTP client: {e}")))
}

/// GET `url` and return its body.
///
/// `headers` are sent as-is and override the client's defaults (a profile
/// may need a browser User-Agent or an `Origin` header).
///
/// # Arguments
///
/// * `client` - The shared client from [`build_client`]
/// * `url` - Absolute URL of the source
/// * `headers` - Extra request headers
/// * `timeout` - Budget for the whole request, body included
///
/// # Returns
///
/// The body bytes tagged with `url` as origin and, when the server sent
/// one, the `Content-Type` without parameters.
///
/// # Errors
///
/// [`PipelineError::Fetch`] when the request cannot be sent, the status is
/// not 2xx (message `HTTP <code>`), or the body cannot be read.
#[instrument(level = "info", skip(client, headers), fields(%url))]
pub async fn fetch(
    client: &Client,
    url: &str,
    headers: &BTreeMap<String, String>,
    timeout: Duration,
) -> Result<RawContent, PipelineError> {
    let mut request = client.get(url).timeout(timeout);
    for (name, value) in headers {
        request = request.header(name.as_str(), value.as_str());
    }

    let response = request
        .send()
        .await
        .map_err(|e| PipelineError::fetch(url, e))?;

    let status = response.status();
    if !status.is_success() {
        warn!(%status, "Source returned non-success status");
        return Err(PipelineError::fetch(url, format!("HTTP {}", status.as_u16())));
    }

    let mime_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_string());

    let bytes = response
        .bytes()
        .await
        .map_err(|e| PipelineError::fetch(url, format!("failed to read body: {e}")))?;

    info!(bytes = bytes.len(), ?mime_type, "Fetched source");
    let raw = RawContent::new(url, bytes.to_vec());
    Ok(match mime_type {
        Some(m) => raw.with_mime(m),
        None => raw,
    })
}
