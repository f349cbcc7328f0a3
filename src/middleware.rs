//! Middleware implementation for reqwest.

use crate::error::NoProxyAvailable;
use crate::pool::ProxyPool;

use anyhow::anyhow;
use async_trait::async_trait;
use http::StatusCode;
use log::{info, warn};
use reqwest_middleware::{Error, Middleware, Next, Result};
use std::sync::Arc;

/// Status reported to the pool when a request through a proxy fails
/// before any response arrives.
pub const CONNECTION_FAILURE_STATUS: StatusCode = StatusCode::BAD_GATEWAY;

/// Middleware that routes each request through a proxy from the pool and
/// reports the outcome back to it.
///
/// With an empty pool the request proceeds without a proxy.
#[derive(Clone)]
pub struct ProxyPoolMiddleware {
    /// The proxy pool.
    pool: Arc<ProxyPool>,
}

impl ProxyPoolMiddleware {
    /// Create a middleware drawing proxies from `pool`.
    pub fn new(pool: Arc<ProxyPool>) -> Self {
        let size = pool.size();
        if size == 0 {
            warn!("Proxy pool middleware created with an empty pool");
        } else {
            info!("Proxy pool middleware created with {} proxies", size);
        }
        Self { pool }
    }

    /// The pool this middleware draws from.
    pub fn pool(&self) -> &Arc<ProxyPool> {
        &self.pool
    }

    fn client_for(&self, proxy_url: &str) -> std::result::Result<reqwest::Client, reqwest::Error> {
        reqwest::Client::builder()
            .proxy(reqwest::Proxy::all(proxy_url)?)
            .timeout(self.pool.config.request_timeout)
            .build()
    }
}

#[async_trait]
impl Middleware for ProxyPoolMiddleware {
    async fn handle(
        &self,
        req: reqwest::Request,
        extensions: &mut http::Extensions,
        next: Next<'_>,
    ) -> Result<reqwest::Response> {
        let max_retries = self.pool.config.retry_count;
        let mut attempt = 0;

        loop {
            let proxy_url = match self.pool.get_proxy() {
                Ok(url) => url,
                Err(NoProxyAvailable) => {
                    warn!("No proxy available, sending request without proxy");
                    return next.run(req, extensions).await;
                }
            };

            let proxied_request = req.try_clone().ok_or_else(|| {
                Error::Middleware(anyhow!(
                    "Request object is not cloneable. Are you passing a streaming body?"
                ))
            })?;

            attempt += 1;
            info!("Using proxy: {} (attempt {})", proxy_url, attempt);

            let client = match self.client_for(&proxy_url) {
                Ok(client) => client,
                Err(e) => {
                    warn!("Failed to build client with proxy {}: {}", proxy_url, e);
                    self.pool.report_outcome(&proxy_url, CONNECTION_FAILURE_STATUS.as_u16());
                    if attempt > max_retries {
                        return Err(Error::Reqwest(e));
                    }
                    continue;
                }
            };

            match client.execute(proxied_request).await {
                Ok(response) => {
                    let status = response.status();
                    self.pool.report_outcome(&proxy_url, status.as_u16());

                    if status == StatusCode::PROXY_AUTHENTICATION_REQUIRED && attempt <= max_retries {
                        warn!("Proxy {} rejected credentials (attempt {})", proxy_url, attempt);
                        continue;
                    }
                    return Ok(response);
                }
                Err(err) => {
                    warn!("Request failed with proxy {} (attempt {}): {}", proxy_url, attempt, err);
                    self.pool.report_outcome(&proxy_url, CONNECTION_FAILURE_STATUS.as_u16());

                    if attempt > max_retries {
                        return Err(Error::Reqwest(err));
                    }
                }
            }
        }
    }
}
