// src/utils/http.rs

//! HTTP transport and document loading.
//!
//! Every remote call goes through a [`Transport`]. The default stack is a
//! [`RateLimitedTransport`] over a `reqwest::Client`, which retries
//! `429 Too Many Requests` responses with exponential backoff.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, Request, Response, StatusCode};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::{AppError, Result};
use crate::models::CrawlerConfig;

/// Attempts made before a rate-limited response is handed back.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 15;

/// Backoff base; the delay after attempt `n` is `base * 2^n`.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(100);

/// Something that can send a prepared request.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: Request) -> reqwest::Result<Response>;
}

#[async_trait]
impl Transport for Client {
    async fn send(&self, request: Request) -> reqwest::Result<Response> {
        self.execute(request).await
    }
}

/// Retries `429` responses with exponential backoff and no jitter.
///
/// Exhausting the attempts returns the last `429` response instead of an
/// error; callers inspect the status themselves. Connection-level errors
/// from the inner transport propagate unchanged.
///
/// The backoff window is shared: while any caller waits out a `429`, every
/// other request through the same transport (or a clone of it) waits too.
#[derive(Debug, Clone)]
pub struct RateLimitedTransport<T> {
    inner: T,
    max_attempts: u32,
    base_delay: Duration,
    blocked_until: Arc<Mutex<Option<Instant>>>,
}

impl<T: Transport> RateLimitedTransport<T> {
    /// Wrap a transport with the default policy.
    pub fn new(inner: T) -> Self {
        Self::with_policy(inner, DEFAULT_MAX_ATTEMPTS, DEFAULT_BASE_DELAY)
    }

    /// Wrap a transport with a custom attempt budget and base delay.
    pub fn with_policy(inner: T, max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            inner,
            max_attempts: max_attempts.max(1),
            base_delay,
            blocked_until: Arc::new(Mutex::new(None)),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay slept after the given (1-based) rate-limited attempt.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    /// Sleep until no backoff window is open.
    async fn wait_for_window(&self) {
        loop {
            let until = *self.blocked_until.lock().await;
            match until {
                Some(until) if until > Instant::now() => tokio::time::sleep_until(until).await,
                _ => return,
            }
        }
    }

    /// Open (or extend) the shared backoff window.
    async fn hold_off(&self, delay: Duration) {
        let until = Instant::now() + delay;
        let mut blocked = self.blocked_until.lock().await;
        if (*blocked).is_none_or(|current| current < until) {
            *blocked = Some(until);
        }
    }
}

#[async_trait]
impl<T: Transport> Transport for RateLimitedTransport<T> {
    async fn send(&self, request: Request) -> reqwest::Result<Response> {
        let mut attempt = 1;
        let mut pending = request;

        loop {
            // Streaming bodies cannot be cloned; those requests get one shot.
            let retry = if attempt < self.max_attempts {
                pending.try_clone()
            } else {
                None
            };

            self.wait_for_window().await;
            let response = self.inner.send(pending).await?;
            if response.status() != StatusCode::TOO_MANY_REQUESTS {
                return Ok(response);
            }

            let Some(next) = retry else {
                log::warn!(
                    "Rate limited after {} attempt(s): {}",
                    attempt,
                    response.url()
                );
                return Ok(response);
            };

            let delay = self.backoff(attempt);
            log::debug!(
                "Rate limited on {}, waiting {:.1}s",
                response.url(),
                delay.as_secs_f64()
            );
            self.hold_off(delay).await;

            pending = next;
            attempt += 1;
        }
    }
}

/// Create a configured asynchronous HTTP client.
pub fn create_async_client(config: &CrawlerConfig) -> Result<Client> {
    let mut headers = HeaderMap::new();
    if let Some(cookie) = config.session_cookie.as_deref() {
        let value = HeaderValue::from_str(cookie)
            .map_err(|e| AppError::config(format!("crawler.session_cookie: {e}")))?;
        headers.insert(header::COOKIE, value);
    }

    let client = Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .default_headers(headers)
        .build()?;
    Ok(client)
}

/// A downloaded resource.
#[derive(Debug, Clone)]
pub struct FetchedResource {
    /// Final URL after redirects
    pub url: String,
    pub status: StatusCode,
    /// Raw `Last-Modified` header
    pub last_modified: Option<String>,
    pub body: Vec<u8>,
}

impl FetchedResource {
    async fn read(response: Response) -> Result<Self> {
        let url = response.url().to_string();
        let status = response.status();
        let last_modified = response
            .headers()
            .get(header::LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?.to_vec();

        Ok(Self {
            url,
            status,
            last_modified,
            body,
        })
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Site-scoped document loader used for pages, probes and images.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    transport: Arc<dyn Transport>,
}

impl Fetcher {
    /// Build a client and wrap it in the rate-limited transport.
    pub fn new(config: &CrawlerConfig) -> Result<Self> {
        let client = create_async_client(config)?;
        let transport = RateLimitedTransport::with_policy(
            client.clone(),
            config.max_attempts,
            Duration::from_millis(config.base_delay_ms),
        );
        Ok(Self::with_transport(client, Arc::new(transport)))
    }

    /// Use a custom transport; `client` is only used to build requests.
    pub fn with_transport(client: Client, transport: Arc<dyn Transport>) -> Self {
        Self { client, transport }
    }

    /// GET a resource, whatever its status.
    pub async fn get(&self, url: &str) -> Result<FetchedResource> {
        let request = self.client.get(url).build()?;
        let response = self.transport.send(request).await?;
        FetchedResource::read(response).await
    }

    /// GET an HTML page, failing on a non-success status.
    pub async fn get_page(&self, url: &str) -> Result<FetchedResource> {
        let resource = self.get(url).await?;
        if !resource.status.is_success() {
            return Err(AppError::crawl(url, format!("HTTP {}", resource.status)));
        }
        Ok(resource)
    }

    /// HEAD a resource, whatever its status.
    pub async fn head(&self, url: &str) -> Result<FetchedResource> {
        let request = self.client.head(url).build()?;
        let response = self.transport.send(request).await?;
        FetchedResource::read(response).await
    }
}
