mod common;

use common::{init_logger, provider_requests, provider_url, provider_with, CyclingResponses, SequentialProxies};
use gateway_proxy_pool::{ProxyPool, ProxyPoolConfig};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use wiremock::ResponseTemplate;

fn config_for(api: String, pool_size: usize) -> ProxyPoolConfig {
    ProxyPoolConfig::builder().provider_api(api).pool_size(pool_size).build()
}

#[tokio::test]
async fn test_initialize_and_round_robin() {
    init_logger();
    let provider = provider_with(SequentialProxies::default()).await;

    let pool = ProxyPool::new(config_for(provider_url(&provider), 3));
    assert_eq!(pool.initialize().await, 3);
    assert_eq!(pool.size(), 3);

    let expected: HashSet<&str> = ["http://p1", "http://p2", "http://p3"].into();
    let fetched: Vec<String> = pool.all_proxies();
    assert_eq!(fetched.iter().map(String::as_str).collect::<HashSet<_>>(), expected);

    let picks: Vec<String> = (0..3).filter_map(|_| pool.next_proxy()).collect();
    assert_eq!(picks, fetched);
    assert_eq!(pool.next_proxy().as_ref(), Some(&picks[0]));

    pool.report_outcome("http://p1", 407);
    assert!(!pool.all_proxies().contains(&"http://p1".to_string()));
    assert_eq!(pool.size(), 2);
}

#[tokio::test]
async fn test_refresh_replaces_every_proxy() {
    init_logger();
    let provider = provider_with(SequentialProxies::default()).await;

    let pool = ProxyPool::new(config_for(provider_url(&provider), 3));
    pool.initialize().await;
    pool.report_outcome("http://p2", 500);
    let before: HashSet<String> = pool.all_proxies().into_iter().collect();

    assert_eq!(pool.refresh().await, 3);

    let after: HashSet<String> = pool.all_proxies().into_iter().collect();
    assert!(after.len() <= 3);
    assert!(before.is_disjoint(&after));
    assert!(pool.proxy_info().iter().all(|p| p.error_count == 0));
    assert!(!pool.should_rotate());
}

#[tokio::test]
async fn test_concurrent_refreshes_stay_within_target() {
    init_logger();
    let provider = provider_with(SequentialProxies::default()).await;
    let pool = ProxyPool::new(config_for(provider_url(&provider), 4));

    let refreshes: Vec<_> = (0..3)
        .map(|_| {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move { pool.refresh().await })
        })
        .collect();
    for refresh in refreshes {
        refresh.await.unwrap();
    }

    assert_eq!(pool.size(), 4);
    assert_eq!(provider_requests(&provider).await, 12);
}

#[tokio::test]
async fn test_failed_fetches_are_skipped() {
    init_logger();
    let provider = provider_with(CyclingResponses::new(vec![
        ResponseTemplate::new(200).set_body_string("http://a:8080"),
        ResponseTemplate::new(500).set_body_string("http://not-used:8080"),
        ResponseTemplate::new(200).set_body_string(r#"{"proxy": "http://b:8080"}"#),
        ResponseTemplate::new(200).set_body_string(r#"{"proxy": "", "error": "out of stock"}"#),
        ResponseTemplate::new(200).set_body_string(""),
        ResponseTemplate::new(200).set_body_string("not a proxy"),
    ]))
    .await;

    let pool = ProxyPool::new(config_for(provider_url(&provider), 6));
    assert_eq!(pool.initialize().await, 2);

    let proxies: HashSet<String> = pool.all_proxies().into_iter().collect();
    assert_eq!(proxies, HashSet::from(["http://a:8080".to_string(), "http://b:8080".to_string()]));
}

#[tokio::test]
async fn test_duplicate_proxies_are_merged() {
    init_logger();
    let provider = provider_with(ResponseTemplate::new(200).set_body_string("http://same:3128")).await;

    let pool = ProxyPool::new(config_for(provider_url(&provider), 4));
    assert_eq!(pool.initialize().await, 1);
    assert_eq!(pool.all_proxies(), vec!["http://same:3128"]);
}

#[tokio::test]
async fn test_slow_provider_times_out() {
    init_logger();
    let provider = provider_with(
        ResponseTemplate::new(200)
            .set_body_string("http://slow:8080")
            .set_delay(Duration::from_secs(2)),
    )
    .await;

    let config = ProxyPoolConfig::builder()
        .provider_api(provider_url(&provider))
        .pool_size(2)
        .fetch_timeout(Duration::from_millis(200))
        .build();
    let pool = ProxyPool::new(config);

    assert_eq!(pool.initialize().await, 0);
    assert_eq!(pool.size(), 0);
    assert_eq!(pool.next_proxy(), None);
}

#[tokio::test]
async fn test_disabled_pool_never_fetches() {
    init_logger();
    let provider = provider_with(SequentialProxies::default()).await;

    let config = ProxyPoolConfig::builder()
        .enabled(false)
        .provider_api(provider_url(&provider))
        .pool_size(3)
        .build();
    let pool = ProxyPool::new(config);

    assert_eq!(pool.initialize().await, 0);
    assert_eq!(pool.refresh().await, 0);
    assert_eq!(pool.size(), 0);
    assert_eq!(pool.random_proxy(), None);
    assert_eq!(provider_requests(&provider).await, 0);
}

#[tokio::test]
async fn test_global_pool_is_created_once() {
    init_logger();
    let provider = provider_with(SequentialProxies::default()).await;

    let first = ProxyPool::global(config_for(provider_url(&provider), 2)).await;
    let second = ProxyPool::global(ProxyPoolConfig::builder().enabled(false).build()).await;

    assert!(Arc::ptr_eq(&first, &second));
    assert!(second.config.enabled);
    assert_eq!(second.size(), 2);
    assert!(ProxyPool::try_global().is_some_and(|pool| Arc::ptr_eq(&pool, &first)));
    assert_eq!(provider_requests(&provider).await, 2);
}
