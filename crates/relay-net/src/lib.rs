//! # Relay Net
//!
//! Outbound networking for the Relay worker host.
//!
//! ## Design Goals
//!
//! 1. **Async HTTP**: Non-blocking network requests
//! 2. **Transparency**: requests leave with the parameters they were given
//! 3. **Seam**: the [`Fetch`] trait lets hosts and tests swap the network

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::FutureExt;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use mime::Mime;
use relay_common::NetworkConfig;
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, info, trace};
use url::Url;

/// Errors that can occur in networking.
#[derive(Error, Debug)]
pub enum NetError {
    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Request cancelled")]
    Cancelled,

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl NetError {
    /// Name the kind of failure, as a page would observe it.
    pub fn category(&self) -> &'static str {
        match self {
            NetError::RequestFailed(_) => "request",
            NetError::InvalidUrl(_) => "invalid_url",
            NetError::Timeout(_) => "timeout",
            NetError::Cancelled => "cancelled",
            NetError::HttpError(e) if e.is_timeout() => "timeout",
            NetError::HttpError(e) if e.is_connect() => "connect",
            NetError::HttpError(e) if e.is_redirect() => "redirect",
            NetError::HttpError(e) if e.is_body() || e.is_decode() => "body",
            NetError::HttpError(e) if e.is_builder() => "builder",
            NetError::HttpError(_) => "http",
        }
    }
}

/// Unique identifier for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(u64);

impl RequestId {
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

/// HTTP request.
#[derive(Debug, Clone)]
pub struct Request {
    pub id: RequestId,
    pub url: Url,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    /// Per-request timeout, overriding the loader default.
    pub timeout: Option<Duration>,
}

impl Request {
    /// Create a request with an arbitrary method.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            id: RequestId::new(),
            url,
            method,
            headers: HeaderMap::new(),
            body: None,
            timeout: None,
        }
    }

    /// Create a GET request.
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Parse a URL and create a GET request.
    pub fn parse_get(url: &str) -> Result<Self, NetError> {
        let url = Url::parse(url).map_err(|e| NetError::InvalidUrl(e.to_string()))?;
        Ok(Self::get(url))
    }

    /// Add a header.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set timeout.
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }
}

/// HTTP response.
#[derive(Debug, Clone)]
pub struct Response {
    pub request_id: RequestId,
    pub url: Url,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub content_type: Option<Mime>,
    pub content_length: Option<u64>,
    body: Bytes,
}

impl Response {
    /// Build a response from parts already received.
    pub fn new(
        request_id: RequestId,
        url: Url,
        status: StatusCode,
        headers: HeaderMap,
        body: Bytes,
    ) -> Self {
        let content_type = headers
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<Mime>().ok());

        let content_length = headers
            .get(http::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());

        Self {
            request_id,
            url,
            status,
            headers,
            content_type,
            content_length,
            body,
        }
    }

    /// Check if request was successful (2xx).
    pub fn ok(&self) -> bool {
        self.status.is_success()
    }

    /// Borrow the body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Take the body as bytes.
    pub fn bytes(self) -> Bytes {
        self.body
    }

    /// Get the body as text.
    pub fn text(self) -> Result<String, NetError> {
        String::from_utf8(self.body.to_vec()).map_err(|e| NetError::RequestFailed(e.to_string()))
    }
}

/// Something that can perform a network fetch.
pub trait Fetch: Send + Sync {
    /// Issue one request and resolve to its response or failure.
    fn fetch(&self, request: Request) -> BoxFuture<'_, Result<Response, NetError>>;
}

/// Resource loader configuration.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// User agent string.
    pub user_agent: String,
    /// Default timeout.
    pub default_timeout: Duration,
    /// Maximum redirects.
    pub max_redirects: usize,
    /// Enable cookies.
    pub cookies_enabled: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self::from_settings(&NetworkConfig::default())
    }
}

impl LoaderConfig {
    /// Build from the network section of the host config.
    pub fn from_settings(settings: &NetworkConfig) -> Self {
        Self {
            user_agent: settings.user_agent.clone(),
            default_timeout: Duration::from_secs(settings.timeout_secs),
            max_redirects: settings.max_redirects,
            cookies_enabled: settings.cookies_enabled,
        }
    }
}

/// Resource loader for fetching URLs.
pub struct ResourceLoader {
    client: Client,
}

impl ResourceLoader {
    /// Create a new resource loader.
    pub fn new(config: LoaderConfig) -> Result<Self, NetError> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.default_timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .cookie_store(config.cookies_enabled)
            .build()
            .map_err(|e| NetError::RequestFailed(e.to_string()))?;

        info!(user_agent = %config.user_agent, "ResourceLoader initialized");

        Ok(Self { client })
    }

    /// Fetch a URL.
    pub async fn fetch(&self, request: Request) -> Result<Response, NetError> {
        debug!(url = %request.url, method = %request.method, "Fetching resource");

        let mut req_builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone());

        if let Some(body) = request.body {
            req_builder = req_builder.body(body);
        }

        if let Some(timeout) = request.timeout {
            req_builder = req_builder.timeout(timeout);
        }

        let response = req_builder.send().await?;

        let status = response.status();
        let headers = response.headers().clone();
        let url = response.url().clone();
        let body = response.bytes().await?;

        trace!(
            url = %url,
            status = %status,
            body_len = body.len(),
            "Response received"
        );

        Ok(Response::new(request.id, url, status, headers, body))
    }
}

impl Fetch for ResourceLoader {
    fn fetch(&self, request: Request) -> BoxFuture<'_, Result<Response, NetError>> {
        ResourceLoader::fetch(self, request).boxed()
    }
}
