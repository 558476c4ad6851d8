//! Heavyweight strategy: headless browser rendering for JS-heavy storefronts.
//!
//! Each fetch launches its own Chromium via chromiumoxide, waits for the
//! result grid to appear, captures the rendered DOM, and shuts the browser
//! down. Nothing is shared between invocations, so launch cost is paid per
//! call; the resolver only reaches this strategy when `http` has failed.

use std::time::{Duration, Instant};

use chromiumoxide::browser::{Browser, BrowserConfig};
use futures_util::StreamExt;
use pricecheck_core::{AppConfig, ProductQuery};
use tokio::task::JoinHandle;
use url::Url;

use crate::fetch::{FetchError, FetchStrategy, RawDocument, search_url};

/// Chromium flags suited to containers and CI hosts.
const LAUNCH_ARGS: &[&str] = &[
    "--no-sandbox",
    "--disable-dev-shm-usage",
    "--disable-gpu",
    "--disable-extensions",
    "--no-first-run",
    "--disable-default-apps",
];

/// Options for the browser strategy.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// User agent presented by the page.
    pub user_agent: String,

    /// Search address template containing `{query}`.
    pub search_url: String,

    /// CSS selector to wait for before capturing content.
    pub wait_for: Option<String>,

    /// Longest wait for `wait_for`; the page is captured as-is afterwards.
    pub settle_timeout: Duration,

    /// Delay between `wait_for` probes.
    pub poll_interval: Duration,

    /// Viewport dimensions (default: 1280x720).
    pub viewport: (u32, u32),
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for RenderOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            search_url: config.search_url.clone(),
            wait_for: Some(config.selectors.grid.clone()),
            settle_timeout: config.render_settle(),
            poll_interval: config.render_poll(),
            viewport: (1280, 720),
        }
    }
}

/// A launched browser plus the task pumping its DevTools events.
struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl BrowserSession {
    async fn launch(opts: &RenderOptions) -> Result<Self, FetchError> {
        let mut builder = BrowserConfig::builder().window_size(opts.viewport.0, opts.viewport.1);
        for arg in LAUNCH_ARGS {
            builder = builder.arg(*arg);
        }
        let config = builder
            .build()
            .map_err(|e| FetchError::TransportException(format!("browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| FetchError::TransportException(format!("browser launch failed: {e}")))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("browser handler event error: {e}");
                    break;
                }
            }
        });

        Ok(Self { browser, handler })
    }

    async fn capture(&self, url: &Url, opts: &RenderOptions) -> Result<String, FetchError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| FetchError::TransportException(format!("failed to open page: {e}")))?;

        page.set_user_agent(opts.user_agent.as_str())
            .await
            .map_err(|e| FetchError::TransportException(format!("failed to set user agent: {e}")))?;

        page.goto(url.as_str())
            .await
            .map_err(|e| FetchError::TransportRejected(format!("navigation failed: {e}")))?;

        if let Some(selector) = &opts.wait_for {
            let appeared = tokio::time::timeout(opts.settle_timeout, async {
                while page.find_element(selector.as_str()).await.is_err() {
                    tokio::time::sleep(opts.poll_interval).await;
                }
            })
            .await;

            if appeared.is_err() {
                tracing::debug!(%url, selector = %selector, "wait_for selector never appeared; capturing page as-is");
            }
        }

        let html = page
            .content()
            .await
            .map_err(|e| FetchError::TransportException(format!("content retrieval failed: {e}")))?;

        page.close().await.ok();
        Ok(html)
    }

    async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            tracing::debug!("browser close failed: {e}");
        }
        self.browser.wait().await.ok();
        self.handler.abort();
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

/// Full browser fetch of the search results page.
pub struct BrowserStrategy {
    opts: RenderOptions,
}

impl BrowserStrategy {
    pub const NAME: &'static str = "browser";

    pub fn new(opts: RenderOptions) -> Self {
        Self { opts }
    }

    async fn render(&self, url: &Url) -> Result<String, FetchError> {
        let session = BrowserSession::launch(&self.opts).await?;
        let result = session.capture(url, &self.opts).await;
        session.close().await;
        result
    }
}

#[async_trait::async_trait]
impl FetchStrategy for BrowserStrategy {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn fetch(&self, query: &ProductQuery, timeout: Duration) -> Result<RawDocument, FetchError> {
        let url = search_url(&self.opts.search_url, query)?;
        let start = Instant::now();

        let html = tokio::time::timeout(timeout, self.render(&url))
            .await
            .map_err(|_| FetchError::timeout(timeout))??;

        let fetch_ms = start.elapsed().as_millis() as u64;
        tracing::debug!("rendered {} in {}ms ({} bytes)", url, fetch_ms, html.len());

        Ok(RawDocument { url, html, fetch_ms })
    }
}
