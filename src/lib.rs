//! # gateway-proxy-pool
//!
//! A self-refreshing pool of outbound HTTP forward proxies for reqwest.
//!
//! The pool is populated from a proxy-provisioning API, hands out proxies in
//! round-robin or random order, evicts proxies that keep failing, and is
//! rebuilt by a background [`ProxyRefresher`] once its contents go stale.
//! [`ProxyPoolMiddleware`] plugs the pool into a `reqwest_middleware` client.

pub mod config;
pub mod error;
pub mod middleware;
pub mod pool;
pub mod proxy;
pub mod refresher;
mod utils;

pub use config::{ProxyPoolConfig, ProxyPoolConfigBuilder, ProxySelectionStrategy};
pub use error::{FetchError, NoProxyAvailable};
pub use middleware::ProxyPoolMiddleware;
pub use pool::{PoolStatus, ProxyPool};
pub use proxy::ProxyEndpoint;
pub use refresher::ProxyRefresher;
