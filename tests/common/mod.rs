#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

pub const PROVIDER_PATH: &str = "/proxy";

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Hands out `http://p1`, `http://p2`, ... one per request.
#[derive(Default)]
pub struct SequentialProxies {
    served: AtomicUsize,
    delay: Duration,
}

impl SequentialProxies {
    /// Answer every request only after `delay`.
    pub fn delayed(delay: Duration) -> Self {
        Self {
            served: AtomicUsize::new(0),
            delay,
        }
    }
}

impl Respond for SequentialProxies {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let n = self.served.fetch_add(1, Ordering::SeqCst) + 1;
        ResponseTemplate::new(200)
            .set_body_string(format!("http://p{}", n))
            .set_delay(self.delay)
    }
}

/// Cycles through a fixed list of responses.
pub struct CyclingResponses {
    served: AtomicUsize,
    responses: Vec<ResponseTemplate>,
}

impl CyclingResponses {
    pub fn new(responses: Vec<ResponseTemplate>) -> Self {
        Self {
            served: AtomicUsize::new(0),
            responses,
        }
    }
}

impl Respond for CyclingResponses {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let n = self.served.fetch_add(1, Ordering::SeqCst);
        self.responses[n % self.responses.len()].clone()
    }
}

/// Start a provider mock answering GET `/proxy` with `responder`.
pub async fn provider_with<R: Respond + 'static>(responder: R) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(PROVIDER_PATH))
        .respond_with(responder)
        .mount(&server)
        .await;
    server
}

pub fn provider_url(server: &MockServer) -> String {
    format!("{}{}", server.uri(), PROVIDER_PATH)
}

pub async fn provider_requests(server: &MockServer) -> usize {
    server.received_requests().await.map(|r| r.len()).unwrap_or(0)
}
