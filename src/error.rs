//! Error types for the gateway-proxy-pool crate.

use thiserror::Error;

/// Error returned when the pool holds no proxy to select.
#[derive(Debug, Error)]
#[error("No proxy available in pool")]
pub struct NoProxyAvailable;

/// A single failed fetch against the proxy-provisioning API.
///
/// These never escape the pool: a failed fetch is logged and simply
/// contributes no proxy.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to request proxy API: {0}")]
    Request(#[from] reqwest::Error),

    #[error("proxy API returned status code: {0}")]
    Status(u16),

    #[error("empty response from proxy API")]
    EmptyBody,

    #[error("failed to parse proxy response as JSON (body: {body}): {source}")]
    Parse {
        body: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("proxy API error: {0}")]
    Provider(String),

    #[error("empty proxy returned from API")]
    EmptyProxy,
}
