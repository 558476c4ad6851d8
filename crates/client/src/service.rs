//! Price lookup entry point.
//!
//! Per call the service runs a short state machine:
//!
//! ```text
//! CHECK_CACHE ──hit──▶ return cached
//!      │ miss / force_refresh
//!      ▼
//!   RESOLVE ──success──▶ WRITE_BACK ──▶ return resolved
//!      │ failure
//!      ▼
//!   return "N/A" when every strategy saw an empty result grid,
//!   "unavailable" otherwise (nothing written)
//! ```
//!
//! Failures are never cached, so the next call retries resolution.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use pricecheck_core::{AppConfig, CacheRecord, CacheStatus, CacheStore, Error, PriceQuantity, ProductQuery, Source};
use serde::Serialize;

use crate::extract::SelectorExtractor;
use crate::fetch::{HttpConfig, HttpStrategy};
use crate::resolve::{ResolutionOutcome, Resolver, StrategyFailure};

/// Where a returned value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOrigin {
    /// Fresh cache hit.
    Cache { resolved_at: DateTime<Utc>, source: Source },
    /// Resolved by the strategy chain during this call.
    Resolved { source: Source },
    /// Every strategy reached the storefront and found no listed item; the
    /// value holds `N/A` in both fields.
    NotListed { failures: Vec<StrategyFailure> },
    /// Every strategy failed; the value holds the unavailable sentinel.
    Unavailable { failures: Vec<StrategyFailure> },
    /// The name was empty or an image-analysis "no product" sentinel.
    Unrecognized,
}

impl LookupOrigin {
    pub fn label(&self) -> &'static str {
        match self {
            LookupOrigin::Cache { .. } => "cache",
            LookupOrigin::Resolved { .. } => "resolved",
            LookupOrigin::NotListed { .. } => "not_listed",
            LookupOrigin::Unavailable { .. } => "unavailable",
            LookupOrigin::Unrecognized => "unrecognized",
        }
    }
}

/// Result of one lookup: the value plus how it was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceLookup {
    /// Capitalized product name.
    pub name: String,
    pub value: PriceQuantity,
    pub origin: LookupOrigin,
}

/// Service health for probes.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub cache: CacheStatus,
    pub strategies: Vec<String>,
}

/// Cache-first price lookup over a strategy chain.
pub struct PriceService {
    resolver: Resolver,
    cache: CacheStore,
    freshness: chrono::Duration,
}

impl PriceService {
    pub fn new(resolver: Resolver, cache: CacheStore, freshness: chrono::Duration) -> Self {
        Self { resolver, cache, freshness }
    }

    /// Build the full service from configuration.
    ///
    /// The chain is `http`, then `browser` when rendering is enabled and the
    /// `render` feature is compiled in. A cache that cannot be opened leaves
    /// the service running without one.
    ///
    /// # Errors
    ///
    /// Returns an error if a selector does not parse or the HTTP client
    /// cannot be built.
    pub async fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let cache = if config.cache_enabled {
            CacheStore::open(&config.db_path).await.with_timeout(config.cache_timeout())
        } else {
            CacheStore::disabled()
        };

        let extractor = Arc::new(SelectorExtractor::new(&config.selectors)?);
        let http = Arc::new(HttpStrategy::new(HttpConfig::from(config))?);

        #[allow(unused_mut)]
        let mut resolver = Resolver::new(extractor).with_strategy(http, config.http_timeout());

        #[cfg(feature = "render")]
        if config.render_enabled {
            let browser = Arc::new(crate::render::BrowserStrategy::new(crate::render::RenderOptions::from(config)));
            resolver = resolver.with_strategy(browser, config.render_timeout());
        }

        #[cfg(not(feature = "render"))]
        if config.render_enabled {
            tracing::warn!("render_enabled is set but the `render` feature is not compiled in; browser fallback skipped");
        }

        tracing::info!(strategies = ?resolver.strategy_names(), cache = cache.is_enabled(), "price service ready");

        Ok(Self::new(resolver, cache, config.freshness_window()))
    }

    /// Value-only lookup. Never fails; absence is expressed with sentinels.
    pub async fn resolve_price(&self, name: &str, force_refresh: bool) -> PriceQuantity {
        self.lookup(name, force_refresh).await.value
    }

    /// Look up `name`, preferring a fresh cache record unless `force_refresh`.
    pub async fn lookup(&self, name: &str, force_refresh: bool) -> PriceLookup {
        self.lookup_at(&ProductQuery::new(name), force_refresh, Utc::now())
            .await
    }

    /// [`lookup`](Self::lookup) with an explicit clock reading.
    ///
    /// `now` decides freshness and is stored as the record's `resolved_at`.
    pub async fn lookup_at(&self, query: &ProductQuery, force_refresh: bool, now: DateTime<Utc>) -> PriceLookup {
        let name = query.display_name();

        if !query.is_recognizable() {
            tracing::debug!(product = %query, "unrecognized product name; skipping lookup");
            return PriceLookup { name, value: PriceQuantity::unavailable(), origin: LookupOrigin::Unrecognized };
        }

        if !force_refresh
            && let Some(record) = self.cache.get(query).await
            && self.is_fresh(&record, now)
        {
            tracing::debug!(product = %query, resolved_at = %record.resolved_at, "cache hit");
            return PriceLookup {
                name,
                value: record.value,
                origin: LookupOrigin::Cache { resolved_at: record.resolved_at, source: record.source },
            };
        }

        match self.resolver.resolve(query).await {
            ResolutionOutcome::Success { value, source } => {
                self.cache.put(query, &value, &source, now).await;
                PriceLookup { name, value, origin: LookupOrigin::Resolved { source } }
            }
            ResolutionOutcome::Failure(failures) => {
                tracing::warn!(
                    product = %query,
                    attempts = failures.len(),
                    reasons = %failures.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "),
                    "price resolution exhausted"
                );
                if !failures.is_empty() && failures.iter().all(StrategyFailure::is_item_not_found) {
                    PriceLookup { name, value: PriceQuantity::not_listed(), origin: LookupOrigin::NotListed { failures } }
                } else {
                    PriceLookup { name, value: PriceQuantity::unavailable(), origin: LookupOrigin::Unavailable { failures } }
                }
            }
        }
    }

    /// A record is fresh while its age is strictly below the window.
    pub fn is_fresh(&self, record: &CacheRecord, now: DateTime<Utc>) -> bool {
        record.age(now) < self.freshness
    }

    /// The stored record for `name`, fresh or not.
    pub async fn cached(&self, name: &str) -> Option<CacheRecord> {
        self.cache.get(&ProductQuery::new(name)).await
    }

    pub async fn health(&self) -> HealthReport {
        HealthReport { cache: self.cache.status().await, strategies: self.resolver.strategy_names() }
    }

    pub fn freshness(&self) -> chrono::Duration {
        self.freshness
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ExtractionFailure;
    use crate::fetch::{FetchError, FetchStrategy, RawDocument};
    use crate::resolve::StrategyError;
    use chrono::Duration as ChronoDuration;
    use pricecheck_core::{CacheDb, NOT_AVAILABLE, PriceCache, SelectorConfig, UNAVAILABLE};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const PRICE: &str = "Label-sc-15v1nk5-0 Pricing___StyledLabel-sc-pldi2d-1 gJxZPQ AypOi";
    const PACK: &str = "Label-sc-15v1nk5-0 PackChanger___StyledLabel-sc-newjpv-1 gJxZPQ cWbtUx";

    fn tomato_page() -> String {
        format!(
            r#"<html><body><ul class="mt-5 grid gap-6 grid-cols-9">
                <li><span class="{PACK}">500 g</span><span class="{PRICE}">₹40</span></li>
            </ul></body></html>"#
        )
    }

    fn empty_grid_page() -> String {
        r#"<html><body><ul class="mt-5 grid gap-6 grid-cols-9"></ul></body></html>"#.to_string()
    }

    /// Strategy serving fixed markup and counting calls.
    struct Canned {
        name: &'static str,
        result: Result<String, FetchError>,
        calls: AtomicUsize,
    }

    impl Canned {
        fn new(name: &'static str, result: Result<String, FetchError>) -> Arc<Self> {
            Arc::new(Self { name, result, calls: AtomicUsize::new(0) })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl FetchStrategy for Canned {
        fn name(&self) -> &str {
            self.name
        }

        async fn fetch(&self, query: &ProductQuery, _timeout: Duration) -> Result<RawDocument, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let html = self.result.clone()?;
            let url = crate::fetch::search_url("https://www.bigbasket.com/ps/?q={query}", query)?;
            Ok(RawDocument { url, html, fetch_ms: 3 })
        }
    }

    /// Cache backend that is always unreachable.
    struct Unreachable;

    #[async_trait::async_trait]
    impl PriceCache for Unreachable {
        async fn get(&self, _key: &ProductQuery) -> Result<Option<CacheRecord>, Error> {
            Err(Error::CacheUnavailable("connection refused".into()))
        }

        async fn put(&self, _record: &CacheRecord) -> Result<(), Error> {
            Err(Error::CacheUnavailable("connection refused".into()))
        }

        async fn ping(&self) -> Result<(), Error> {
            Err(Error::CacheUnavailable("connection refused".into()))
        }
    }

    fn chain(strategies: &[Arc<Canned>]) -> Resolver {
        let extractor = Arc::new(SelectorExtractor::new(&SelectorConfig::default()).unwrap());
        strategies
            .iter()
            .fold(Resolver::new(extractor), |resolver, s| resolver.with_strategy(s.clone(), Duration::from_secs(1)))
    }

    async fn memory_db() -> CacheDb {
        CacheDb::open_in_memory().await.unwrap()
    }

    fn service(strategies: &[Arc<Canned>], db: &CacheDb) -> PriceService {
        PriceService::new(chain(strategies), CacheStore::new(Arc::new(db.clone())), ChronoDuration::hours(24))
    }

    #[tokio::test]
    async fn test_tomato_resolves_and_writes_back() {
        let db = memory_db().await;
        let http = Canned::new("http", Ok(tomato_page()));
        let service = service(&[http.clone()], &db);

        let lookup = service.lookup("tomato", false).await;

        assert_eq!(lookup.name, "Tomato");
        assert_eq!(lookup.value, PriceQuantity::new("₹40", "500 g"));
        assert_eq!(lookup.origin.label(), "resolved");

        let record = db.get_price(&ProductQuery::new("Tomato")).await.unwrap().unwrap();
        assert_eq!(record.key.display_name(), "Tomato");
        assert_eq!(record.value, PriceQuantity::new("₹40", "500 g"));
        assert_eq!(record.source.strategy, "http");
        assert_eq!(record.source.url, "https://www.bigbasket.com/ps/?q=tomato");
        assert_eq!(http.calls(), 1);
    }

    #[tokio::test]
    async fn test_forced_refresh_then_cached_read() {
        let db = memory_db().await;
        let http = Canned::new("http", Ok(tomato_page()));
        let service = service(&[http.clone()], &db);

        let first = service.resolve_price("tomato", true).await;
        let second = service.lookup(" TOMATO ", false).await;

        assert_eq!(second.value, first);
        assert!(matches!(second.origin, LookupOrigin::Cache { .. }));
        assert_eq!(http.calls(), 1);
    }

    #[tokio::test]
    async fn test_force_refresh_skips_fresh_cache() {
        let db = memory_db().await;
        let http = Canned::new("http", Ok(tomato_page()));
        let service = service(&[http.clone()], &db);
        let now = Utc::now();

        service
            .cache
            .put(&ProductQuery::new("tomato"), &PriceQuantity::new("₹35", "500 g"), &Source::new("http", "x"), now)
            .await;

        let lookup = service.lookup_at(&ProductQuery::new("tomato"), true, now).await;
        assert_eq!(lookup.value.price, "₹40");
        assert_eq!(http.calls(), 1);
        assert_eq!(db.get_price(&ProductQuery::new("tomato")).await.unwrap().unwrap().value.price, "₹40");
    }

    #[tokio::test]
    async fn test_freshness_boundary() {
        let db = memory_db().await;
        let http = Canned::new("http", Ok(tomato_page()));
        let service = service(&[http.clone()], &db);
        let now = Utc::now();
        let key = ProductQuery::new("tomato");
        let cached = PriceQuantity::new("₹35", "500 g");
        let source = Source::new("http", "https://www.bigbasket.com/ps/?q=tomato");

        service
            .cache
            .put(&key, &cached, &source, now - ChronoDuration::hours(24) + ChronoDuration::seconds(1))
            .await;
        let hit = service.lookup_at(&key, false, now).await;
        assert_eq!(hit.value, cached);
        assert_eq!(http.calls(), 0);

        service
            .cache
            .put(&key, &cached, &source, now - ChronoDuration::hours(24) - ChronoDuration::seconds(1))
            .await;
        let miss = service.lookup_at(&key, false, now).await;
        assert_eq!(miss.value, PriceQuantity::new("₹40", "500 g"));
        assert_eq!(http.calls(), 1);
    }

    #[tokio::test]
    async fn test_exact_window_age_is_stale() {
        let db = memory_db().await;
        let service = service(&[], &db);
        let now = Utc::now();
        let record = CacheRecord {
            key: ProductQuery::new("tomato"),
            value: PriceQuantity::new("₹40", "500 g"),
            resolved_at: now - ChronoDuration::hours(24),
            source: Source::new("http", "x"),
        };
        assert!(!service.is_fresh(&record, now));
    }

    #[tokio::test]
    async fn test_empty_grid_everywhere_is_not_listed() {
        let db = memory_db().await;
        let http = Canned::new("http", Ok(empty_grid_page()));
        let browser = Canned::new("browser", Ok(empty_grid_page()));
        let service = service(&[http.clone(), browser.clone()], &db);

        let lookup = service.lookup("xyzzy", false).await;

        assert_eq!(lookup.value, PriceQuantity::new(NOT_AVAILABLE, NOT_AVAILABLE));
        assert_eq!(lookup.origin.label(), "not_listed");
        let LookupOrigin::NotListed { failures } = &lookup.origin else {
            panic!("expected not listed, got {:?}", lookup.origin);
        };
        assert_eq!(failures.len(), 2);
        assert!(
            failures
                .iter()
                .all(|f| f.error == StrategyError::from(ExtractionFailure::ItemNotFound { query: "xyzzy".into() }))
        );
        assert!(db.get_price(&ProductQuery::new("xyzzy")).await.unwrap().is_none());
        assert_eq!(db.count_prices().await.unwrap(), 0);
        assert_eq!((http.calls(), browser.calls()), (1, 1));
    }

    #[tokio::test]
    async fn test_single_strategy_empty_grid_resolves_to_na() {
        let db = memory_db().await;
        let service = service(&[Canned::new("http", Ok(empty_grid_page()))], &db);

        let value = service.resolve_price("xyzzy", false).await;

        assert_eq!(value, PriceQuantity::new("N/A", "N/A"));
        assert_eq!(db.count_prices().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_transport_failures_return_unavailable() {
        let db = memory_db().await;
        let http = Canned::new("http", Err(FetchError::TransportRejected("status 403".into())));
        let browser = Canned::new("browser", Err(FetchError::Timeout(30_000)));
        let service = service(&[http, browser], &db);

        let lookup = service.lookup("tomato", false).await;

        assert_eq!(lookup.value, PriceQuantity::new(UNAVAILABLE, UNAVAILABLE));
        assert!(matches!(&lookup.origin, LookupOrigin::Unavailable { failures } if failures.len() == 2));
        assert_eq!(db.count_prices().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_mixed_failures_return_unavailable() {
        let db = memory_db().await;
        let http = Canned::new("http", Err(FetchError::TransportRejected("status 403".into())));
        let browser = Canned::new("browser", Ok(empty_grid_page()));
        let service = service(&[http, browser], &db);

        let value = service.resolve_price("xyzzy", false).await;

        assert_eq!(value, PriceQuantity::unavailable());
        assert_eq!(db.count_prices().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_missing_grid_returns_unavailable() {
        let db = memory_db().await;
        let service = service(&[Canned::new("http", Ok("<html><body>blocked</body></html>".into()))], &db);

        let lookup = service.lookup("tomato", false).await;

        assert_eq!(lookup.value, PriceQuantity::unavailable());
        assert_eq!(lookup.origin.label(), "unavailable");
    }

    #[tokio::test]
    async fn test_failures_are_retried_not_cached() {
        let db = memory_db().await;
        let http = Canned::new("http", Err(FetchError::TransportRejected("status 403".into())));
        let service = service(&[http.clone()], &db);

        service.resolve_price("tomato", false).await;
        service.resolve_price("tomato", false).await;

        assert_eq!(http.calls(), 2);
    }

    #[tokio::test]
    async fn test_cache_down_still_resolves() {
        let http = Canned::new("http", Ok(tomato_page()));
        let service = PriceService::new(chain(&[http.clone()]), CacheStore::new(Arc::new(Unreachable)), ChronoDuration::hours(24));

        let first = service.resolve_price("tomato", false).await;
        let second = service.resolve_price("tomato", false).await;

        assert_eq!(first, PriceQuantity::new("₹40", "500 g"));
        assert_eq!(second, first);
        assert_eq!(http.calls(), 2);
        assert_eq!(service.health().await.cache, CacheStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_unrecognized_names_skip_resolution() {
        let db = memory_db().await;
        let http = Canned::new("http", Ok(tomato_page()));
        let service = service(&[http.clone()], &db);

        for name in ["", "   ", "Not a fruit or vegetable", "unknown"] {
            let lookup = service.lookup(name, false).await;
            assert_eq!(lookup.origin, LookupOrigin::Unrecognized);
            assert_eq!(lookup.value, PriceQuantity::unavailable());
        }
        assert_eq!(http.calls(), 0);
    }

    #[tokio::test]
    async fn test_cached_ignores_freshness() {
        let db = memory_db().await;
        let service = service(&[], &db);
        let old = Utc::now() - ChronoDuration::days(10);

        service
            .cache
            .put(&ProductQuery::new("onion"), &PriceQuantity::new("₹30", "1 kg"), &Source::new("http", "x"), old)
            .await;

        let record = service.cached("Onion").await.unwrap();
        assert_eq!(record.resolved_at.timestamp(), old.timestamp());
        assert!(service.cached("garlic").await.is_none());
    }

    #[tokio::test]
    async fn test_health_report() {
        let db = memory_db().await;
        let service = service(&[Canned::new("http", Ok(String::new())), Canned::new("browser", Ok(String::new()))], &db);

        let health = service.health().await;
        assert_eq!(health.cache, CacheStatus::Connected);
        assert_eq!(health.strategies, vec!["http".to_string(), "browser".to_string()]);
    }

    #[tokio::test]
    async fn test_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            db_path: dir.path().join("prices.sqlite"),
            render_enabled: false,
            freshness_secs: 3600,
            ..Default::default()
        };

        let service = PriceService::from_config(&config).await.unwrap();
        let health = service.health().await;

        assert_eq!(health.strategies, vec!["http".to_string()]);
        assert_eq!(health.cache, CacheStatus::Connected);
        assert_eq!(service.freshness(), ChronoDuration::hours(1));
    }

    #[cfg(feature = "render")]
    #[tokio::test]
    async fn test_from_config_with_browser_fallback() {
        let config = AppConfig { cache_enabled: false, ..Default::default() };

        let service = PriceService::from_config(&config).await.unwrap();
        let health = service.health().await;

        assert_eq!(health.strategies, vec!["http".to_string(), "browser".to_string()]);
        assert_eq!(health.cache, CacheStatus::Disabled);
    }

    #[tokio::test]
    async fn test_from_config_invalid_selector() {
        let config = AppConfig {
            cache_enabled: false,
            selectors: SelectorConfig { grid: "ul[[".into(), ..Default::default() },
            ..Default::default()
        };
        assert!(matches!(PriceService::from_config(&config).await, Err(Error::InvalidSelector(_))));
    }
}
