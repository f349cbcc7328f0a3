//! Simple example of using gateway-proxy-pool.
//!
//! Set `PROXY_POOL_API` to a provider returning one proxy URL per GET.

use gateway_proxy_pool::{ProxyPool, ProxyPoolConfig, ProxyPoolMiddleware, ProxyRefresher, ProxySelectionStrategy};
use reqwest_middleware::ClientBuilder;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    println!("Initializing proxy pool...");

    let mut builder = ProxyPoolConfig::builder()
        .pool_size(5)
        .fetch_timeout(Duration::from_secs(10))
        .selection_strategy(ProxySelectionStrategy::RoundRobin)
        .retry_count(2);
    if let Ok(api) = std::env::var("PROXY_POOL_API") {
        builder = builder.provider_api(api);
    }

    let pool = ProxyPool::global(builder.build()).await;
    println!("Pool status: {}", serde_json::to_string_pretty(&pool.status())?);

    let refresher = ProxyRefresher::global(pool.clone());
    refresher.start();

    let client = ClientBuilder::new(reqwest::Client::new())
        .with(ProxyPoolMiddleware::new(pool.clone()))
        .build();

    println!("Sending request...");
    let response = client.get("https://httpbin.org/ip").send().await?;

    println!("Status: {}", response.status());
    println!("Response: {}", response.text().await?);

    refresher.stop();
    Ok(())
}
