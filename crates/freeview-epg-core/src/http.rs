//! HTTP capability used by provider adapters, and its reqwest transport.

#![allow(clippy::future_not_send)]

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::Value;
use tracing::instrument;

use crate::error::FetchError;

/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default total request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default base delay; attempt `n` waits `backoff * 2^n`.
pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(300);

/// Upper bound for a server-provided `Retry-After`.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(30);

/// Statuses that trigger a retry.
const RETRY_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// HTTP GET.
    Get,
    /// HTTP POST.
    Post,
}

/// A transport-agnostic request description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Request method.
    pub method: Method,
    /// Absolute URL without query string.
    pub url: String,
    /// Query pairs, appended in order.
    pub query: Vec<(String, String)>,
    /// Extra request headers.
    pub headers: Vec<(String, String)>,
    /// Optional request body.
    pub body: Option<String>,
}

impl HttpRequest {
    fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Creates a GET request.
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    /// Creates a POST request with a text body.
    #[must_use]
    pub fn post(url: impl Into<String>, body: impl Into<String>) -> Self {
        let mut request = Self::new(Method::Post, url);
        request.body = Some(body.into());
        request
    }

    /// Appends a query parameter.
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Appends a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Appends several headers.
    #[must_use]
    pub fn headers(mut self, headers: &[(&str, &str)]) -> Self {
        self.headers.extend(
            headers
                .iter()
                .map(|(name, value)| (String::from(*name), String::from(*value))),
        );
        self
    }
}

/// Response status and body text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Body text.
    pub body: String,
}

impl HttpResponse {
    /// Returns `true` for 2xx statuses.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Decodes the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::MalformedPayload`] if the body is not valid JSON.
    pub fn json(&self) -> Result<Value, FetchError> {
        serde_json::from_str(&self.body).map_err(|e| {
            let preview: String = self.body.chars().take(200).collect();
            FetchError::malformed(format!("{e} (body starts with {preview:?})"))
        })
    }
}

/// HTTP capability.
///
/// Abstracts the transport for mock substitution in tests.
/// Uses `trait_variant::make` to generate a `Send`-bound async trait.
#[allow(clippy::module_name_repetitions)]
#[trait_variant::make(HttpFetch: Send)]
pub trait LocalHttpFetch {
    /// Executes a request and returns the final response.
    ///
    /// Non-success statuses are returned as responses, not errors.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Network`] on transport failure or timeout.
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, FetchError>;
}

/// reqwest-backed transport with bounded retries.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct HttpClient {
    /// HTTP client (reqwest, gzip and cookies enabled).
    http_client: Client,
    /// Retries after the first attempt.
    max_retries: u32,
    /// Base delay between attempts.
    backoff: Duration,
}

/// Builder for `HttpClient`.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct HttpClientBuilder {
    user_agent: Option<String>,
    connect_timeout: Option<Duration>,
    timeout: Option<Duration>,
    max_retries: Option<u32>,
    backoff: Option<Duration>,
}

impl HttpClientBuilder {
    /// Creates a new builder.
    const fn new() -> Self {
        Self {
            user_agent: None,
            connect_timeout: None,
            timeout: None,
            max_retries: None,
            backoff: None,
        }
    }

    /// Sets the User-Agent (required).
    #[must_use]
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Sets the connect timeout (default: 5s).
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Sets the total request timeout (default: 30s).
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the number of retries after the first attempt (default: 3).
    #[must_use]
    pub const fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    /// Sets the base backoff delay (default: 300ms).
    #[must_use]
    pub const fn backoff(mut self, backoff: Duration) -> Self {
        self.backoff = Some(backoff);
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// - `user_agent` is not set.
    /// - `reqwest::Client` build fails.
    pub fn build(self) -> Result<HttpClient> {
        let user_agent = self.user_agent.context("user_agent is required")?;

        let http_client = Client::builder()
            .user_agent(&user_agent)
            .connect_timeout(self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT))
            .timeout(self.timeout.unwrap_or(DEFAULT_TIMEOUT))
            .gzip(true)
            .cookie_store(true)
            .build()
            .context("failed to build HTTP client")?;

        Ok(HttpClient {
            http_client,
            max_retries: self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            backoff: self.backoff.unwrap_or(DEFAULT_BACKOFF),
        })
    }
}

impl HttpClient {
    /// Creates a new builder.
    #[must_use]
    pub const fn builder() -> HttpClientBuilder {
        HttpClientBuilder::new()
    }

    /// Delay before retry number `attempt` (zero-based).
    fn backoff_for(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(2_u32.saturating_pow(attempt))
    }

    /// Builds the reqwest request for one attempt.
    fn build_request(&self, request: &HttpRequest) -> reqwest::RequestBuilder {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        };
        let mut builder = self.http_client.request(method, &request.url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }
        builder
    }
}

/// Reads a delay in whole seconds from a `Retry-After` header.
fn retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(|secs| Duration::from_secs(secs).min(MAX_RETRY_AFTER))
}

impl LocalHttpFetch for HttpClient {
    #[instrument(skip_all, fields(url = %request.url))]
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, FetchError> {
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            let can_retry = attempt < self.max_retries;

            let send_result = self.build_request(request).send().await;
            let response = match send_result {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "Request failed");
                    last_err = Some(FetchError::Network(format!("{}: {e}", request.url)));
                    if can_retry {
                        tokio::time::sleep(self.backoff_for(attempt)).await;
                    }
                    continue;
                }
            };

            let status = response.status().as_u16();
            if can_retry && RETRY_STATUSES.contains(&status) {
                let delay = if status == 429 {
                    retry_after(response.headers()).unwrap_or_else(|| self.backoff_for(attempt))
                } else {
                    self.backoff_for(attempt)
                };
                tracing::warn!(
                    attempt,
                    code = status,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "Retryable status, waiting before retry"
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            match response.text().await {
                Ok(body) => {
                    tracing::debug!(code = status, body_len = body.len(), "Response received");
                    return Ok(HttpResponse { status, body });
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "Failed to read response body");
                    last_err = Some(FetchError::Network(format!(
                        "failed to read body from {}: {e}",
                        request.url
                    )));
                    if can_retry {
                        tokio::time::sleep(self.backoff_for(attempt)).await;
                    }
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            FetchError::Network(format!("{} failed after retries", request.url))
        }))
    }
}
