//! Core proxy pool implementation.

use crate::config::{ProxyPoolConfig, ProxySelectionStrategy};
use crate::error::NoProxyAvailable;
use crate::proxy::ProxyEndpoint;
use crate::utils;

use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use http::StatusCode;
use log::{debug, error, info, warn};
use parking_lot::RwLock;
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OnceCell};

static GLOBAL_POOL: OnceCell<Arc<ProxyPool>> = OnceCell::const_new();

/// Proxies and the round-robin cursor, guarded together.
#[derive(Debug, Default)]
struct PoolState {
    proxies: Vec<ProxyEndpoint>,
    /// Always `< proxies.len()` while `proxies` is non-empty.
    next_index: usize,
}

impl PoolState {
    fn position(&self, url: &str) -> Option<usize> {
        self.proxies.iter().position(|p| p.url == url)
    }

    fn insert(&mut self, proxy: ProxyEndpoint) -> bool {
        if self.position(&proxy.url).is_some() {
            return false;
        }
        self.proxies.push(proxy);
        true
    }

    fn remove_at(&mut self, index: usize) -> ProxyEndpoint {
        let removed = self.proxies.remove(index);
        if self.next_index >= self.proxies.len() {
            self.next_index = 0;
        }
        removed
    }

    fn clear(&mut self) {
        self.proxies.clear();
        self.next_index = 0;
    }
}

/// Snapshot of the pool for operational status endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct PoolStatus {
    /// Whether the pool is enabled.
    pub enabled: bool,
    /// Number of proxies in the pool.
    pub size: usize,
    /// Every proxy with its metadata, in pool order.
    pub proxies: Vec<ProxyEndpoint>,
}

/// A pool of outbound proxies that can be used for HTTP requests.
pub struct ProxyPool {
    /// All proxies in the pool plus the round-robin cursor.
    state: RwLock<PoolState>,
    /// Configuration for the pool.
    pub config: ProxyPoolConfig,
    /// Serializes refreshes so two of them never interleave their fetches.
    refresh_lock: AsyncMutex<()>,
}

impl ProxyPool {
    /// Create a new, empty proxy pool. Nothing is fetched until
    /// [`initialize`](Self::initialize) or [`refresh`](Self::refresh) runs.
    pub fn new(config: ProxyPoolConfig) -> Arc<Self> {
        Arc::new(Self {
            state: RwLock::new(PoolState::default()),
            config,
            refresh_lock: AsyncMutex::new(()),
        })
    }

    /// Get the process-wide pool, creating and populating it on first access.
    ///
    /// Only the first caller's `config` is used; concurrent first callers
    /// wait for that single initialization and share its result.
    pub async fn global(config: ProxyPoolConfig) -> Arc<Self> {
        GLOBAL_POOL
            .get_or_init(move || async move {
                let pool = Self::new(config);
                pool.initialize().await;
                pool
            })
            .await
            .clone()
    }

    /// Get the process-wide pool if it has been initialized.
    pub fn try_global() -> Option<Arc<Self>> {
        GLOBAL_POOL.get().cloned()
    }

    /// Populate the pool from the configured provider.
    ///
    /// Does nothing when the pool is disabled or no provider is configured.
    /// Returns the number of proxies added.
    pub async fn initialize(&self) -> usize {
        if !self.config.enabled {
            info!("Proxy pool is disabled, skipping initialization");
            return 0;
        }

        let Some(api) = self.config.provider_api.as_deref() else {
            error!("Proxy pool API not configured");
            return 0;
        };

        info!("Initializing proxy pool with {} proxies", self.config.pool_size);
        let added = self.populate(api, self.config.pool_size).await;
        info!("Successfully initialized proxy pool with {} proxies", self.size());
        added
    }

    /// Fetch `count` proxies from `api` concurrently and add every one that
    /// parses. Failed fetches are logged and skipped.
    ///
    /// No lock is held while requests are in flight; each result is merged
    /// under its own short write lock as soon as it arrives.
    pub async fn populate(&self, api: &str, count: usize) -> usize {
        let client = match utils::provider_client(self.config.fetch_timeout) {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to build proxy API client: {}", e);
                return 0;
            }
        };

        let mut fetches: FuturesUnordered<_> = (0..count)
            .map(|index| {
                let client = &client;
                async move { (index, utils::fetch_proxy_from_provider(client, api).await) }
            })
            .collect();

        let mut added = 0;
        while let Some((index, result)) = fetches.next().await {
            match result {
                Ok(url) => {
                    if self.insert_fresh(&url) {
                        info!("Fetched proxy: {}", url);
                        added += 1;
                    } else {
                        warn!("Proxy API returned duplicate proxy {}, skipping", url);
                    }
                }
                Err(e) => error!("Failed to fetch proxy {}: {}", index, e),
            }
        }

        added
    }

    fn insert_fresh(&self, url: &str) -> bool {
        self.state.write().insert(ProxyEndpoint::new(url))
    }

    /// Get the next proxy in round-robin order.
    ///
    /// Returns `None` when the pool is empty.
    pub fn next_proxy(&self) -> Option<String> {
        let mut guard = self.state.write();
        let state = &mut *guard;

        if state.proxies.is_empty() {
            error!("No proxies available in pool");
            return None;
        }

        let url = state.proxies[state.next_index].url.clone();
        state.next_index = (state.next_index + 1) % state.proxies.len();

        Some(url)
    }

    /// Get a uniformly random proxy without moving the round-robin cursor.
    pub fn random_proxy(&self) -> Option<String> {
        let state = self.state.read();

        if state.proxies.is_empty() {
            error!("No proxies available in pool");
            return None;
        }

        let index = rand::rng().random_range(0..state.proxies.len());
        Some(state.proxies[index].url.clone())
    }

    /// Get a proxy from the pool according to the configured selection strategy.
    pub fn get_proxy(&self) -> Result<String, NoProxyAvailable> {
        let selected = match self.config.selection_strategy {
            ProxySelectionStrategy::RoundRobin => self.next_proxy(),
            ProxySelectionStrategy::Random => self.random_proxy(),
        };
        selected.ok_or(NoProxyAvailable)
    }

    /// Number of proxies currently in the pool.
    pub fn size(&self) -> usize {
        self.state.read().proxies.len()
    }

    /// Drop every proxy and repopulate from the provider.
    ///
    /// Selections running concurrently may see an empty pool until the new
    /// proxies arrive. Returns the number of proxies added.
    pub async fn refresh(&self) -> usize {
        let _refreshing = self.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    /// Refresh the pool only if [`should_rotate`](Self::should_rotate) holds.
    ///
    /// Staleness is checked after any running refresh has finished, so a pool
    /// that was just rebuilt is kept. Returns whether the pool was refreshed.
    pub async fn refresh_if_stale(&self) -> bool {
        let _refreshing = self.refresh_lock.lock().await;

        if !self.should_rotate() {
            return false;
        }

        self.refresh_locked().await;
        true
    }

    async fn refresh_locked(&self) -> usize {
        info!("Refreshing proxy pool");
        self.state.write().clear();

        self.initialize().await
    }

    /// Whether the pool is empty or its oldest proxy is older than `max_age`.
    pub fn should_rotate(&self) -> bool {
        self.should_rotate_at(Utc::now())
    }

    /// [`should_rotate`](Self::should_rotate) evaluated at `now`.
    pub fn should_rotate_at(&self, now: DateTime<Utc>) -> bool {
        let state = self.state.read();

        match state.proxies.iter().min_by_key(|p| p.created_at) {
            None => true,
            Some(oldest) => oldest.age_at(now) > self.config.max_age,
        }
    }

    /// Add a proxy. Does nothing if it is already in the pool.
    pub fn add_proxy(&self, url: &str) {
        if self.insert_fresh(url) {
            info!("Added proxy to pool: {}", url);
        }
    }

    /// Remove a proxy. Does nothing if it is not in the pool.
    pub fn remove_proxy(&self, url: &str) {
        let mut state = self.state.write();

        if let Some(index) = state.position(url) {
            state.remove_at(index);
            info!("Removed proxy: {}", url);
        }
    }

    /// Report the HTTP status observed through a proxy.
    ///
    /// A 407 evicts the proxy at once. Any other status of 400 or above
    /// counts as one error, and the proxy is evicted once it reaches
    /// `max_error_count`. Lower statuses are ignored.
    pub fn report_outcome(&self, url: &str, status: u16) {
        if status == StatusCode::PROXY_AUTHENTICATION_REQUIRED.as_u16() {
            error!("Proxy authentication failed (407), removing proxy: {}", url);
            self.remove_proxy(url);
            return;
        }

        if status < 400 {
            return;
        }

        let mut state = self.state.write();
        let Some(index) = state.position(url) else {
            debug!("Ignoring status {} for unknown proxy {}", status, url);
            return;
        };

        let proxy = &mut state.proxies[index];
        proxy.error_count = proxy.error_count.saturating_add(1);
        let error_count = proxy.error_count;
        info!("Proxy error count increased for {}: {}", url, error_count);

        if error_count >= self.config.max_error_count {
            error!("Proxy error count exceeded limit, removing proxy: {}", url);
            state.remove_at(index);
        }
    }

    /// Copy of every proxy with its metadata.
    pub fn proxy_info(&self) -> Vec<ProxyEndpoint> {
        self.state.read().proxies.clone()
    }

    /// URLs of every proxy in pool order.
    pub fn all_proxies(&self) -> Vec<String> {
        self.state.read().proxies.iter().map(|p| p.url.clone()).collect()
    }

    /// Status snapshot for operational endpoints.
    pub fn status(&self) -> PoolStatus {
        let state = self.state.read();
        PoolStatus {
            enabled: self.config.enabled,
            size: state.proxies.len(),
            proxies: state.proxies.clone(),
        }
    }
}
