//! Lightweight strategy: one HTTP GET with browser-like headers.

use std::time::{Duration, Instant};

use pricecheck_core::{AppConfig, Error, ProductQuery};
use reqwest::{Client, header};

use super::{FetchError, FetchStrategy, RawDocument, search_url};

/// Configuration for the HTTP strategy.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// User agent string presented to the storefront.
    pub user_agent: String,

    /// Search address template containing `{query}`.
    pub search_url: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        let app = AppConfig::default();
        Self { user_agent: app.user_agent, search_url: app.search_url, max_bytes: app.max_bytes, max_redirects: 5 }
    }
}

impl From<&AppConfig> for HttpConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            search_url: config.search_url.clone(),
            max_bytes: config.max_bytes,
            ..Default::default()
        }
    }
}

/// Plain HTTP fetch of the search results page.
///
/// Cheap, but may be blocked or see an incomplete page on JS-heavy storefronts.
pub struct HttpStrategy {
    http: Client,
    config: HttpConfig,
}

impl HttpStrategy {
    pub const NAME: &'static str = "http";

    /// Create a new HTTP strategy with the given configuration.
    pub fn new(config: HttpConfig) -> Result<Self, Error> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(header::ACCEPT_LANGUAGE, header::HeaderValue::from_static("en-US,en;q=0.9"));
        headers.insert(header::UPGRADE_INSECURE_REQUESTS, header::HeaderValue::from_static("1"));

        let http = Client::builder()
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::ClientInit(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    async fn get(&self, url: &::url::Url, timeout: Duration) -> Result<String, FetchError> {
        let response = self
            .http
            .get(url.as_str())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::TransportRejected(format!("status {}", status.as_u16())));
        }

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(FetchError::TransportRejected(format!(
                "{} bytes exceeds {}",
                len, self.config.max_bytes
            )));
        }

        let bytes = response.bytes().await.map_err(|e| classify(e, timeout))?;

        if bytes.len() > self.config.max_bytes {
            return Err(FetchError::TransportRejected(format!(
                "{} bytes exceeds {}",
                bytes.len(),
                self.config.max_bytes
            )));
        }

        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

fn classify(err: reqwest::Error, timeout: Duration) -> FetchError {
    if err.is_timeout() {
        FetchError::timeout(timeout)
    } else if err.is_connect() {
        FetchError::TransportRejected(format!("connection failed: {}", err))
    } else if let Some(status) = err.status() {
        FetchError::TransportRejected(format!("status {}", status.as_u16()))
    } else {
        FetchError::TransportException(err.to_string())
    }
}

#[async_trait::async_trait]
impl FetchStrategy for HttpStrategy {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn fetch(&self, query: &ProductQuery, timeout: Duration) -> Result<RawDocument, FetchError> {
        let url = search_url(&self.config.search_url, query)?;
        let start = Instant::now();

        let html = tokio::time::timeout(timeout, self.get(&url, timeout))
            .await
            .map_err(|_| FetchError::timeout(timeout))??;

        let fetch_ms = start.elapsed().as_millis() as u64;
        tracing::debug!("fetched {} in {}ms ({} bytes)", url, fetch_ms, html.len());

        Ok(RawDocument { url, html, fetch_ms })
    }
}
