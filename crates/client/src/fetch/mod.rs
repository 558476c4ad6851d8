//! Fetch strategies: transport-specific ways to obtain a search results page.
//!
//! ### Strategy Chain
//! - Every transport implements [`FetchStrategy`]; the resolver walks them in
//!   priority order, cheapest first.
//! - `http` ([`HttpStrategy`]) is a single GET with browser-like headers.
//! - `browser` (`render::BrowserStrategy`, feature `render`) executes
//!   client-side rendering and is only reached when `http` fails.
//!
//! ### Failure Model
//! - Each attempt is bounded by the timeout it is handed.
//! - Failures are typed [`FetchError`] values; none of them are fatal.
//! - Strategies keep no mutable state between calls.

pub mod http;
pub mod url;

use std::time::Duration;

use pricecheck_core::ProductQuery;

pub use self::http::{HttpConfig, HttpStrategy};
pub use self::url::{UrlError, encode_query, search_url};

/// Raw markup returned by a strategy.
#[derive(Debug, Clone)]
pub struct RawDocument {
    /// The address that was fetched.
    pub url: ::url::Url,
    /// Response body or rendered DOM.
    pub html: String,
    /// Time taken to fetch in milliseconds.
    pub fetch_ms: u64,
}

/// Why a single strategy attempt produced no document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// The attempt exceeded its time budget.
    #[error("timed out after {0}ms")]
    Timeout(u64),

    /// The remote side refused: non-2xx status, connection refused, oversized body.
    #[error("transport rejected: {0}")]
    TransportRejected(String),

    /// Anything else the transport threw.
    #[error("transport exception: {0}")]
    TransportException(String),
}

impl FetchError {
    pub(crate) fn timeout(timeout: Duration) -> Self {
        FetchError::Timeout(timeout.as_millis() as u64)
    }
}

impl From<UrlError> for FetchError {
    fn from(err: UrlError) -> Self {
        FetchError::TransportException(format!("cannot build search address: {err}"))
    }
}

/// One transport-specific attempt to obtain raw markup for a query.
#[async_trait::async_trait]
pub trait FetchStrategy: Send + Sync {
    /// Stable identifier recorded as the source of a resolved value.
    fn name(&self) -> &str;

    /// Fetch the search results page for `query` within `timeout`.
    async fn fetch(&self, query: &ProductQuery, timeout: Duration) -> Result<RawDocument, FetchError>;
}
