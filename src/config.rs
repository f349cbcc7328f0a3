//! Configuration for the proxy pool.

use std::time::Duration;

/// Strategy for selecting a proxy from the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxySelectionStrategy {
    /// Select proxies in round-robin fashion, in insertion order.
    RoundRobin,
    /// Select a uniformly random proxy.
    Random,
}

/// Configuration for the proxy pool and its refresher.
#[derive(Debug, Clone)]
pub struct ProxyPoolConfig {
    /// Whether the pool is populated and refreshed at all.
    pub enabled: bool,
    /// Provisioning API handing out one proxy per GET request.
    pub provider_api: Option<String>,
    /// Number of proxies requested from the provider on each population.
    pub pool_size: usize,
    /// Timeout for a single provider request.
    pub fetch_timeout: Duration,
    /// Age of the oldest proxy after which the pool is considered stale.
    pub max_age: Duration,
    /// Number of soft failures after which a proxy is evicted.
    pub max_error_count: u32,
    /// Interval between staleness checks of the refresher.
    pub refresh_interval: Duration,
    /// Strategy for selecting proxies.
    pub selection_strategy: ProxySelectionStrategy,
    /// Number of times the middleware retries a request with different proxies.
    pub retry_count: usize,
    /// Timeout for requests sent through a proxy by the middleware.
    pub request_timeout: Duration,
}

impl ProxyPoolConfig {
    /// Create a new configuration builder.
    pub fn builder() -> ProxyPoolConfigBuilder {
        ProxyPoolConfigBuilder::new()
    }
}

impl Default for ProxyPoolConfig {
    fn default() -> Self {
        ProxyPoolConfigBuilder::new().build()
    }
}

/// Builder for `ProxyPoolConfig`.
pub struct ProxyPoolConfigBuilder {
    enabled: Option<bool>,
    provider_api: Option<String>,
    pool_size: Option<usize>,
    fetch_timeout: Option<Duration>,
    max_age: Option<Duration>,
    max_error_count: Option<u32>,
    refresh_interval: Option<Duration>,
    selection_strategy: Option<ProxySelectionStrategy>,
    retry_count: Option<usize>,
    request_timeout: Option<Duration>,
}

impl ProxyPoolConfigBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self {
            enabled: None,
            provider_api: None,
            pool_size: None,
            fetch_timeout: None,
            max_age: None,
            max_error_count: None,
            refresh_interval: None,
            selection_strategy: None,
            retry_count: None,
            request_timeout: None,
        }
    }

    /// Enable or disable the pool.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    /// Set the provisioning API URL.
    pub fn provider_api(mut self, url: impl Into<String>) -> Self {
        self.provider_api = Some(url.into());
        self
    }

    /// Set the number of proxies fetched on each population.
    pub fn pool_size(mut self, size: usize) -> Self {
        self.pool_size = Some(size);
        self
    }

    /// Set the timeout for a single provider request.
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = Some(timeout);
        self
    }

    /// Set the staleness threshold.
    pub fn max_age(mut self, age: Duration) -> Self {
        self.max_age = Some(age);
        self
    }

    /// Set the soft-failure ceiling.
    pub fn max_error_count(mut self, count: u32) -> Self {
        self.max_error_count = Some(count);
        self
    }

    /// Set the interval between refresher ticks.
    pub fn refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = Some(interval);
        self
    }

    /// Set the strategy for selecting proxies.
    pub fn selection_strategy(mut self, strategy: ProxySelectionStrategy) -> Self {
        self.selection_strategy = Some(strategy);
        self
    }

    /// Set the number of times to retry a request with different proxies.
    pub fn retry_count(mut self, count: usize) -> Self {
        self.retry_count = Some(count);
        self
    }

    /// Set the timeout for proxied requests.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> ProxyPoolConfig {
        ProxyPoolConfig {
            enabled: self.enabled.unwrap_or(true),
            provider_api: self.provider_api.filter(|api| !api.trim().is_empty()),
            pool_size: self.pool_size.unwrap_or(10),
            fetch_timeout: self.fetch_timeout.unwrap_or(Duration::from_secs(30)),
            max_age: self.max_age.unwrap_or(Duration::from_secs(6 * 60 * 60)),
            max_error_count: self.max_error_count.unwrap_or(5),
            refresh_interval: self.refresh_interval.unwrap_or(Duration::from_secs(6 * 60 * 60)),
            selection_strategy: self.selection_strategy.unwrap_or(ProxySelectionStrategy::RoundRobin),
            retry_count: self.retry_count.unwrap_or(2),
            request_timeout: self.request_timeout.unwrap_or(Duration::from_secs(60)),
        }
    }
}

impl Default for ProxyPoolConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
