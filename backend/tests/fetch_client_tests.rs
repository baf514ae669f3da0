//! Fetch client tests
//!
//! Spacing, timeout and retry behaviour of the rate-limited client, run on
//! tokio's paused clock against a scripted transport.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use shelfwise_backend::external::{ApiRequest, ApiResponse, FetchClient, FetchPolicy, Transport};
use shelfwise_backend::{AppError, AppResult};
use tokio::time::Instant;

enum Step {
    Fail(AppError),
    Hang,
}

/// Plays back `steps` in order, then answers every further call with success
#[derive(Default)]
struct ScriptedTransport {
    steps: Mutex<VecDeque<Step>>,
    sent_at: Mutex<Vec<Instant>>,
}

impl ScriptedTransport {
    fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            sent_at: Mutex::new(Vec::new()),
        })
    }

    fn sent_at(&self) -> Vec<Instant> {
        self.sent_at.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, _request: &ApiRequest) -> AppResult<ApiResponse> {
        self.sent_at.lock().unwrap().push(Instant::now());
        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(Step::Fail(error)) => Err(error),
            Some(Step::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                unreachable!("timeout should fire first")
            }
            None => Ok(ApiResponse {
                body: json!({ "ok": true }),
                next_page: None,
            }),
        }
    }
}

fn policy(max_retries: u32) -> FetchPolicy {
    FetchPolicy {
        min_spacing: Duration::from_millis(200),
        timeout: Duration::from_secs(15),
        max_retries,
        rate_limit_backoff: Duration::from_secs(2),
        timeout_backoff: Duration::from_secs(1),
    }
}

fn request() -> ApiRequest {
    ApiRequest::rest("orders.json", vec![("limit".to_string(), "250".to_string())])
}

fn rate_limited() -> Step {
    Step::Fail(AppError::RateLimited { retry_after_secs: 1 })
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// Consecutive calls never start closer than the minimum spacing
    #[tokio::test(start_paused = true)]
    async fn test_calls_are_spaced() {
        let transport = ScriptedTransport::new(vec![]);
        let client = FetchClient::new(transport.clone(), policy(2));

        for _ in 0..4 {
            client.call(&request()).await.unwrap();
        }

        let sent = transport.sent_at();
        assert_eq!(sent.len(), 4);
        for pair in sent.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(200));
        }
    }

    /// Spacing also holds for calls issued concurrently
    #[tokio::test(start_paused = true)]
    async fn test_concurrent_calls_are_spaced() {
        let transport = ScriptedTransport::new(vec![]);
        let client = Arc::new(FetchClient::new(transport.clone(), policy(2)));

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let client = client.clone();
                tokio::spawn(async move { client.call(&request()).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let mut sent = transport.sent_at();
        sent.sort();
        for pair in sent.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(200));
        }
    }

    /// 429 responses back off exponentially and then succeed
    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_retries_then_succeeds() {
        let transport = ScriptedTransport::new(vec![rate_limited(), rate_limited()]);
        let client = FetchClient::new(transport.clone(), policy(2));

        let started = Instant::now();
        let response = client.call(&request()).await.unwrap();
        assert_eq!(response.body["ok"], true);

        // 2s then 4s of backoff
        assert!(started.elapsed() >= Duration::from_secs(6));
        let stats = client.stats();
        assert_eq!(stats.calls, 3);
        assert_eq!(stats.retries, 2);
        assert_eq!(stats.rate_limited, 2);
    }

    /// Retries are bounded; the last error surfaces
    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_exhausts_retries() {
        let transport =
            ScriptedTransport::new(vec![rate_limited(), rate_limited(), rate_limited(), rate_limited()]);
        let client = FetchClient::new(transport.clone(), policy(2));

        let result = client.call(&request()).await;
        assert!(matches!(result, Err(AppError::RateLimited { .. })));
        assert_eq!(transport.sent_at().len(), 3);
    }

    /// A hung call is cut off at the timeout and retried
    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_retried() {
        let transport = ScriptedTransport::new(vec![Step::Hang]);
        let client = FetchClient::new(transport.clone(), policy(1));

        let started = Instant::now();
        client.call(&request()).await.unwrap();

        assert!(started.elapsed() >= Duration::from_secs(16));
        assert!(started.elapsed() < Duration::from_secs(60));
        let stats = client.stats();
        assert_eq!(stats.timeouts, 1);
        assert_eq!(stats.retries, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_exhausts_retries() {
        let transport = ScriptedTransport::new(vec![Step::Hang, Step::Hang]);
        let client = FetchClient::new(transport.clone(), policy(1));

        let result = client.call(&request()).await;
        assert!(matches!(result, Err(AppError::Timeout)));
        assert_eq!(client.stats().timeouts, 2);
    }

    /// Client errors are not retried
    #[tokio::test(start_paused = true)]
    async fn test_not_found_is_not_retried() {
        let transport = ScriptedTransport::new(vec![Step::Fail(AppError::Http {
            status: 404,
            body: "Not Found".to_string(),
        })]);
        let client = FetchClient::new(transport.clone(), policy(2));

        let result = client.call(&request()).await;
        assert!(matches!(result, Err(AppError::Http { status: 404, .. })));
        assert_eq!(transport.sent_at().len(), 1);
        assert_eq!(client.stats().retries, 0);
    }

    /// Server errors are retried with the ordinary backoff
    #[tokio::test(start_paused = true)]
    async fn test_server_error_is_retried() {
        let transport = ScriptedTransport::new(vec![Step::Fail(AppError::Http {
            status: 502,
            body: "Bad Gateway".to_string(),
        })]);
        let client = FetchClient::new(transport.clone(), policy(2));

        client.call(&request()).await.unwrap();
        assert_eq!(transport.sent_at().len(), 2);
    }
}
