//! Utility functions for talking to the proxy-provisioning API.

use crate::error::FetchError;

use reqwest::{Client, StatusCode};
use serde::de::Error as _;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// JSON shape accepted from the provisioning API.
#[derive(Debug, Default, Deserialize)]
struct ProviderResponse {
    #[serde(default)]
    proxy: String,
    #[serde(default)]
    error: Option<String>,
}

/// Build the client shared by one round of provider fetches.
pub(crate) fn provider_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder().timeout(timeout).build()
}

/// Fetch a single proxy URL from the provisioning API.
pub(crate) async fn fetch_proxy_from_provider(client: &Client, api: &str) -> Result<String, FetchError> {
    let response = client.get(api).send().await?;

    let status = response.status();
    if status != StatusCode::OK {
        return Err(FetchError::Status(status.as_u16()));
    }

    let body = response.text().await?;
    parse_provider_response(&body)
}

/// Parse a provider response: either a bare proxy URL or a JSON object
/// carrying `proxy` and an optional `error`.
pub(crate) fn parse_provider_response(body: &str) -> Result<String, FetchError> {
    let body = body.trim();
    if body.is_empty() {
        return Err(FetchError::EmptyBody);
    }

    if body.starts_with("http://") || body.starts_with("https://") {
        return Ok(body.to_string());
    }

    let parse_error = |source: serde_json::Error| FetchError::Parse {
        body: body.to_string(),
        source,
    };

    // a struct derive also accepts a positional array
    let value: Value = serde_json::from_str(body).map_err(parse_error)?;
    if !value.is_object() {
        return Err(parse_error(serde_json::Error::custom("expected a JSON object")));
    }
    let parsed: ProviderResponse = serde_json::from_value(value).map_err(parse_error)?;

    if let Some(error) = parsed.error.filter(|e| !e.is_empty()) {
        return Err(FetchError::Provider(error));
    }

    let proxy = parsed.proxy.trim();
    if proxy.is_empty() {
        return Err(FetchError::EmptyProxy);
    }

    Ok(proxy.to_string())
}
