//! Rate-limited fetch client for the commerce platform
//!
//! Every external call goes through [`FetchClient::call`], which enforces a
//! minimum spacing between calls, a hard wall-clock timeout, and bounded
//! retries with exponential backoff. The wire itself sits behind the
//! [`Transport`] trait so tests can script responses.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, LINK, RETRY_AFTER};
use reqwest::{Client, StatusCode, Url};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, warn};

use crate::config::CommerceConfig;
use crate::error::{AppError, AppResult};

/// Retry-After fallback when a 429 carries no usable header
const DEFAULT_RETRY_AFTER_SECS: u64 = 2;

/// One call against the commerce API
#[derive(Debug, Clone, PartialEq)]
pub enum ApiRequest {
    /// `GET /admin/api/{version}/{path}` with query parameters
    Rest {
        path: String,
        query: Vec<(String, String)>,
    },
    /// `POST /admin/api/{version}/graphql.json`
    GraphQl { query: String, variables: Value },
}

impl ApiRequest {
    pub fn rest(path: impl Into<String>, query: Vec<(String, String)>) -> Self {
        ApiRequest::Rest {
            path: path.into(),
            query,
        }
    }

    pub fn graphql(query: impl Into<String>, variables: Value) -> Self {
        ApiRequest::GraphQl {
            query: query.into(),
            variables,
        }
    }

    /// Short label for logs
    pub fn label(&self) -> &str {
        match self {
            ApiRequest::Rest { path, .. } => path,
            ApiRequest::GraphQl { .. } => "graphql",
        }
    }
}

/// Decoded response body plus the next-page token from the `Link` header
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub body: Value,
    pub next_page: Option<String>,
}

/// The wire under the fetch client
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ApiRequest) -> AppResult<ApiResponse>;
}

/// reqwest-backed transport for the Admin API
pub struct HttpTransport {
    client: Client,
    shop_domain: String,
    api_version: String,
    access_token: String,
}

impl HttpTransport {
    pub fn new(config: &CommerceConfig) -> AppResult<Self> {
        if config.shop_domain.trim().is_empty() {
            return Err(AppError::Configuration(
                "commerce.shop_domain is not set".to_string(),
            ));
        }
        if config.access_token.trim().is_empty() {
            return Err(AppError::Configuration(
                "commerce.access_token is not set".to_string(),
            ));
        }

        let client = Client::builder()
            .user_agent(concat!("shelfwise/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            shop_domain: config.shop_domain.trim().to_string(),
            api_version: config.api_version.clone(),
            access_token: config.access_token.clone(),
        })
    }

    /// Build API URL for an endpoint
    fn api_url(&self, endpoint: &str) -> String {
        format!(
            "https://{}/admin/api/{}/{}",
            self.shop_domain, self.api_version, endpoint
        )
    }

    async fn read(&self, response: reqwest::Response) -> AppResult<ApiResponse> {
        let status = response.status();
        let headers = response.headers().clone();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(AppError::RateLimited {
                retry_after_secs: retry_after_secs(&headers),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response.json().await?;
        if let Some(error) = graphql_error(&body) {
            return Err(error);
        }

        let next_page = headers
            .get(LINK)
            .and_then(|value| value.to_str().ok())
            .and_then(next_page_info);

        Ok(ApiResponse { body, next_page })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &ApiRequest) -> AppResult<ApiResponse> {
        let builder = match request {
            ApiRequest::Rest { path, query } => {
                let mut url = self.api_url(path);
                if !query.is_empty() {
                    let encoded: Vec<String> = query
                        .iter()
                        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
                        .collect();
                    url = format!("{}?{}", url, encoded.join("&"));
                }
                self.client.get(url)
            }
            ApiRequest::GraphQl { query, variables } => self
                .client
                .post(self.api_url("graphql.json"))
                .json(&serde_json::json!({ "query": query, "variables": variables })),
        };

        let response = builder
            .header("X-Shopify-Access-Token", &self.access_token)
            .send()
            .await?;

        self.read(response).await
    }
}

fn retry_after_secs(headers: &HeaderMap) -> u64 {
    headers
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<f64>().ok())
        .map(|secs| secs.ceil().max(0.0) as u64)
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
}

/// Extract `page_info` from the `rel="next"` entry of a `Link` header
pub fn next_page_info(link: &str) -> Option<String> {
    link.split(',').find_map(|part| {
        let mut pieces = part.split(';');
        let target = pieces.next()?.trim();
        let is_next = pieces.any(|p| p.trim().eq_ignore_ascii_case("rel=\"next\""));
        if !is_next {
            return None;
        }

        let url = Url::parse(target.trim_start_matches('<').trim_end_matches('>')).ok()?;
        url.query_pairs()
            .find(|(key, _)| key == "page_info")
            .map(|(_, value)| value.into_owned())
    })
}

/// Map a GraphQL `errors` array to an error; `THROTTLED` becomes `RateLimited`
pub fn graphql_error(body: &Value) -> Option<AppError> {
    let errors = body.get("errors")?.as_array()?;
    if errors.is_empty() {
        return None;
    }

    let throttled = errors.iter().any(|e| {
        e.pointer("/extensions/code").and_then(Value::as_str) == Some("THROTTLED")
    });
    if throttled {
        return Some(AppError::RateLimited {
            retry_after_secs: DEFAULT_RETRY_AFTER_SECS,
        });
    }

    let messages: Vec<&str> = errors
        .iter()
        .filter_map(|e| e.get("message").and_then(Value::as_str))
        .collect();
    Some(AppError::GraphQl(messages.join("; ")))
}

/// Spacing, timeout and retry discipline
#[derive(Debug, Clone)]
pub struct FetchPolicy {
    pub min_spacing: Duration,
    pub timeout: Duration,
    pub max_retries: u32,
    pub rate_limit_backoff: Duration,
    pub timeout_backoff: Duration,
}

impl FetchPolicy {
    pub fn from_config(config: &CommerceConfig) -> Self {
        Self {
            min_spacing: config.min_call_spacing(),
            timeout: config.request_timeout(),
            max_retries: config.max_retries,
            rate_limit_backoff: Duration::from_secs(config.rate_limit_backoff_secs),
            timeout_backoff: Duration::from_secs(config.timeout_backoff_secs),
        }
    }

    /// Delay before retry `attempt` (0-based): `base * 2^attempt`
    pub fn retry_delay(&self, error: &AppError, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.min(6);
        match error {
            AppError::RateLimited { retry_after_secs } => {
                (self.rate_limit_backoff * factor).max(Duration::from_secs(*retry_after_secs))
            }
            _ => self.timeout_backoff * factor,
        }
    }
}

#[derive(Debug, Default)]
struct FetchCounters {
    calls: AtomicU64,
    retries: AtomicU64,
    rate_limited: AtomicU64,
    timeouts: AtomicU64,
}

/// Snapshot of the client's counters
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct FetchStats {
    pub calls: u64,
    pub retries: u64,
    pub rate_limited: u64,
    pub timeouts: u64,
}

/// Throttled, retrying front door to the commerce API
pub struct FetchClient {
    transport: Arc<dyn Transport>,
    policy: FetchPolicy,
    /// Start of the previous call; held across the spacing sleep
    last_call: Mutex<Option<Instant>>,
    counters: FetchCounters,
}

impl FetchClient {
    pub fn new(transport: Arc<dyn Transport>, policy: FetchPolicy) -> Self {
        Self {
            transport,
            policy,
            last_call: Mutex::new(None),
            counters: FetchCounters::default(),
        }
    }

    pub fn policy(&self) -> &FetchPolicy {
        &self.policy
    }

    pub fn stats(&self) -> FetchStats {
        FetchStats {
            calls: self.counters.calls.load(Ordering::Relaxed),
            retries: self.counters.retries.load(Ordering::Relaxed),
            rate_limited: self.counters.rate_limited.load(Ordering::Relaxed),
            timeouts: self.counters.timeouts.load(Ordering::Relaxed),
        }
    }

    /// Issue one logical call, retrying transient failures
    pub async fn call(&self, request: &ApiRequest) -> AppResult<ApiResponse> {
        let mut attempt: u32 = 0;

        loop {
            self.throttle().await;
            self.counters.calls.fetch_add(1, Ordering::Relaxed);

            let result = match timeout(self.policy.timeout, self.transport.send(request)).await {
                Ok(result) => result,
                Err(_) => Err(AppError::Timeout),
            };

            let error = match result {
                Ok(response) => return Ok(response),
                Err(error) => error,
            };

            match &error {
                AppError::RateLimited { .. } => {
                    self.counters.rate_limited.fetch_add(1, Ordering::Relaxed);
                }
                AppError::Timeout => {
                    self.counters.timeouts.fetch_add(1, Ordering::Relaxed);
                }
                _ => {}
            }

            if !error.is_retryable() || attempt >= self.policy.max_retries {
                if error.is_retryable() {
                    warn!(
                        request = request.label(),
                        attempts = attempt + 1,
                        error = %error,
                        "request failed after retries"
                    );
                }
                return Err(error);
            }

            let delay = self.policy.retry_delay(&error, attempt);
            debug!(
                request = request.label(),
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "retrying after delay"
            );
            self.counters.retries.fetch_add(1, Ordering::Relaxed);
            sleep(delay).await;
            attempt += 1;
        }
    }

    async fn throttle(&self) {
        let mut last_call = self.last_call.lock().await;
        if let Some(previous) = *last_call {
            let elapsed = previous.elapsed();
            if elapsed < self.policy.min_spacing {
                sleep(self.policy.min_spacing - elapsed).await;
            }
        }
        *last_call = Some(Instant::now());
    }
}
